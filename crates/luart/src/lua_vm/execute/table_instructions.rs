/// Table instructions: creation, indexing and list construction.
use crate::lua_value::{LuaTable, LuaValue};
use crate::lua_vm::execute::helper::fb2int;
use crate::lua_vm::lua_limits::LFIELDS_PER_FLUSH;
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaState, OpCode};

/// Upper bound on preallocation from NEWTABLE size hints.
const MAX_PREALLOC: usize = 1 << 16;

/// GETTABLE A B C
/// R(A) := R(B)[RK(C)]
pub fn exec_gettable(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let t = state.reg(instr.get_b());
    let key = state.rk(instr.get_c());
    let value = state.index_value(&t, &key)?;
    state.set_reg(instr.get_a(), value);
    Ok(())
}

/// SETTABLE A B C
/// R(A)[RK(B)] := RK(C)
pub fn exec_settable(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let t = state.reg(instr.get_a());
    let key = state.rk(instr.get_b());
    let value = state.rk(instr.get_c());
    state.new_index_value(&t, key, value)
}

/// NEWTABLE A B C
/// R(A) := {} (size = B,C)
pub fn exec_newtable(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let narr = fb2int(instr.get_b()).min(MAX_PREALLOC);
    let nrec = fb2int(instr.get_c()).min(MAX_PREALLOC);
    state.set_reg(instr.get_a(), LuaValue::table(LuaTable::new(narr, nrec)));
    Ok(())
}

/// SELF A B C
/// R(A+1) := R(B); R(A) := R(B)[RK(C)]
pub fn exec_self(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    let obj = state.reg(instr.get_b());
    let key = state.rk(instr.get_c());
    state.set_reg(a + 1, obj.clone());
    let method = state.index_value(&obj, &key)?;
    state.set_reg(a, method);
    Ok(())
}

/// SETLIST A B C
/// R(A)[(C-1)*FPF+i] := R(A+i), 1 <= i <= B
///
/// B == 0: the items run up to the top of the variable list left by the
/// previous instruction. C == 0: the block number is in the next EXTRAARG.
pub fn exec_setlist(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    let mut b = instr.get_b() as i64;
    let block = match instr.get_c() {
        0 => {
            let extra = state.fetch()?;
            if extra.get_opcode() != Some(OpCode::ExtraArg) {
                return Err(state.rt_error(LuaError::TypeError(
                    "SETLIST without EXTRAARG".to_string(),
                )));
            }
            extra.get_ax() as i64
        }
        c => c as i64 - 1,
    };

    let LuaValue::Table(t) = state.reg(a) else {
        let target = state.reg(a);
        return Err(state.type_error("index", &target));
    };

    let from_top = b == 0;
    if from_top {
        // marker holds the stack index where the variable part begins
        b = state.to_integer(-1) - a as i64 - 2;
        state.pop(1);
    }

    let mut idx = block * LFIELDS_PER_FLUSH;
    for j in 1..=b.max(0) {
        idx += 1;
        let value = state.reg(a + j as u32);
        t.borrow_mut().put_int(idx, value);
    }

    if from_top {
        let n_regs = state.n_regs();
        let top = state.frame().top;
        for slot in n_regs..top {
            idx += 1;
            let value = state.frame().slot(slot);
            t.borrow_mut().put_int(idx, value);
        }
        state.frame_mut().set_top(n_regs);
    }
    Ok(())
}
