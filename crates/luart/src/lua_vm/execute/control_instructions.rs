/// Jumps, comparisons and tests
///
/// Comparison and test instructions are always followed by a JMP; skipping
/// means jumping over it.
use crate::lua_vm::{Instruction, LuaResult, LuaState};

/// JMP A sBx
/// pc += sBx; if (A) close all upvalues >= R(A - 1)
pub fn exec_jmp(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    state.jump(instr.get_sbx());
    if a != 0 {
        state.frame_mut().close_upvalues(a as usize - 1);
    }
    Ok(())
}

/// EQ A B C
/// if ((RK(B) == RK(C)) ~= A) then pc++
pub fn exec_eq(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let b = state.rk(instr.get_b());
    let c = state.rk(instr.get_c());
    if state.equal_values(&b, &c)? != (instr.get_a() != 0) {
        state.jump(1);
    }
    Ok(())
}

/// LT A B C
/// if ((RK(B) <  RK(C)) ~= A) then pc++
pub fn exec_lt(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let b = state.rk(instr.get_b());
    let c = state.rk(instr.get_c());
    if state.less_than(&b, &c)? != (instr.get_a() != 0) {
        state.jump(1);
    }
    Ok(())
}

/// LE A B C
/// if ((RK(B) <= RK(C)) ~= A) then pc++
pub fn exec_le(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let b = state.rk(instr.get_b());
    let c = state.rk(instr.get_c());
    if state.less_equal(&b, &c)? != (instr.get_a() != 0) {
        state.jump(1);
    }
    Ok(())
}

/// TEST A C
/// if not (R(A) <=> C) then pc++
pub fn exec_test(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    if state.reg(instr.get_a()).to_boolean() != (instr.get_c() != 0) {
        state.jump(1);
    }
    Ok(())
}

/// TESTSET A B C
/// if (R(B) <=> C) then R(A) := R(B) else pc++
pub fn exec_testset(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let value = state.reg(instr.get_b());
    if value.to_boolean() == (instr.get_c() != 0) {
        state.set_reg(instr.get_a(), value);
    } else {
        state.jump(1);
    }
    Ok(())
}
