/// Arithmetic, bitwise, length and concatenation instructions
///
/// Integer/integer operands stay integers (wrapping), otherwise operands
/// are converted to floats; `/` and `^` always produce floats. Operands that
/// do not coerce fall back to the operator's metamethod.
use crate::lua_value::LuaValue;
use crate::lua_vm::execute::helper::arith_raw;
use crate::lua_vm::{ArithOp, Instruction, LuaResult, LuaState};

/// ADD/SUB/MUL/MOD/POW/DIV/IDIV/BAND/BOR/BXOR/SHL/SHR A B C
/// R(A) := RK(B) op RK(C)
#[inline]
pub fn exec_arith(state: &mut LuaState, instr: Instruction, op: ArithOp) -> LuaResult<()> {
    let a = state.rk(instr.get_b());
    let b = state.rk(instr.get_c());
    // fast path for plain numbers
    let result = match (&a, &b) {
        (LuaValue::Integer(_) | LuaValue::Float(_), LuaValue::Integer(_) | LuaValue::Float(_)) => {
            match arith_raw(op, &a, &b) {
                Ok(Some(v)) => v,
                _ => state.arith_values(op, &a, &b)?,
            }
        }
        _ => state.arith_values(op, &a, &b)?,
    };
    state.set_reg(instr.get_a(), result);
    Ok(())
}

/// UNM/BNOT A B
/// R(A) := op R(B)
pub fn exec_unary(state: &mut LuaState, instr: Instruction, op: ArithOp) -> LuaResult<()> {
    let operand = state.reg(instr.get_b());
    let result = state.arith_values(op, &operand, &operand)?;
    state.set_reg(instr.get_a(), result);
    Ok(())
}

/// NOT A B
/// R(A) := not R(B)
pub fn exec_not(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let value = state.reg(instr.get_b());
    state.set_reg(instr.get_a(), LuaValue::Boolean(!value.to_boolean()));
    Ok(())
}

/// LEN A B
/// R(A) := length of R(B)
pub fn exec_len(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let value = state.reg(instr.get_b());
    let len = state.length_of(&value)?;
    state.set_reg(instr.get_a(), len);
    Ok(())
}

/// CONCAT A B C
/// R(A) := R(B).. ... ..R(C)
///
/// Folds right to left, so `__concat` sees the same operand pairs as the
/// right-associative `..` operator.
pub fn exec_concat(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    concat_from(state, instr.get_a(), instr.get_b(), instr.get_c())
}

/// Folds R(b)..R(top) into R(A). Each partial result replaces its left
/// operand, so the fold picks up where it stopped after `__concat` yields.
pub(crate) fn concat_from(state: &mut LuaState, a: u32, b: u32, top: u32) -> LuaResult<()> {
    let mut r = top;
    while r > b {
        r -= 1;
        state.frame_mut().concat_at = r;
        let left = state.reg(r);
        let right = state.reg(r + 1);
        let value = state.concat_pair(&left, &right)?;
        state.set_reg(r, value);
    }
    let value = state.reg(b);
    state.set_reg(a, value);
    Ok(())
}
