/// Load and Move instructions
///
/// These instructions copy registers and load constants, booleans and nils.
use crate::lua_value::LuaValue;
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaState, OpCode};

/// MOVE A B
/// R(A) := R(B)
#[inline]
pub fn exec_move(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let value = state.reg(instr.get_b());
    state.set_reg(instr.get_a(), value);
    Ok(())
}

/// LOADK A Bx
/// R(A) := Kst(Bx)
#[inline]
pub fn exec_loadk(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let value = state.constant(instr.get_bx());
    state.set_reg(instr.get_a(), value);
    Ok(())
}

/// LOADKX A
/// R(A) := Kst(extra arg)
pub fn exec_loadkx(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let extra = state.fetch()?;
    if extra.get_opcode() != Some(OpCode::ExtraArg) {
        return Err(state.rt_error(LuaError::TypeError(
            "LOADKX without EXTRAARG".to_string(),
        )));
    }
    let value = state.constant(extra.get_ax());
    state.set_reg(instr.get_a(), value);
    Ok(())
}

/// LOADBOOL A B C
/// R(A) := (Bool)B; if (C) pc++
pub fn exec_loadbool(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    state.set_reg(instr.get_a(), LuaValue::Boolean(instr.get_b() != 0));
    if instr.get_c() != 0 {
        state.jump(1);
    }
    Ok(())
}

/// LOADNIL A B
/// R(A), R(A+1), ..., R(A+B) := nil
pub fn exec_loadnil(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    for r in a..=a + instr.get_b() {
        state.set_reg(r, LuaValue::Nil);
    }
    Ok(())
}
