/// Upvalue and closure instructions
use std::rc::Rc;

use tracing::trace;

use crate::lua_value::{LuaClosure, LuaValue};
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaState};

/// GETUPVAL A B
/// R(A) := UpValue[B]
pub fn exec_getupval(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let value = state.upvalue_ref(instr.get_b())?.get_value();
    state.set_reg(instr.get_a(), value);
    Ok(())
}

/// SETUPVAL A B
/// UpValue[B] := R(A)
pub fn exec_setupval(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let value = state.reg(instr.get_a());
    state.upvalue_ref(instr.get_b())?.set_value(value);
    Ok(())
}

/// GETTABUP A B C
/// R(A) := UpValue[B][RK(C)]
pub fn exec_gettabup(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let t = state.upvalue_ref(instr.get_b())?.get_value();
    let key = state.rk(instr.get_c());
    let value = state.index_value(&t, &key)?;
    state.set_reg(instr.get_a(), value);
    Ok(())
}

/// SETTABUP A B C
/// UpValue[A][RK(B)] := RK(C)
pub fn exec_settabup(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let t = state.upvalue_ref(instr.get_a())?.get_value();
    let key = state.rk(instr.get_b());
    let value = state.rk(instr.get_c());
    state.new_index_value(&t, key, value)
}

/// CLOSURE A Bx
/// R(A) := closure(KPROTO[Bx])
///
/// Captures of enclosing registers reuse the frame's open upvalue for that
/// register, so every closure over one variable shares its cell.
pub fn exec_closure(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let Some(proto) = state
        .frame()
        .chunk()
        .and_then(|c| c.child_protos.get(instr.get_bx() as usize).cloned())
    else {
        return Err(state.rt_error(LuaError::IndexError(format!(
            "invalid prototype index {}",
            instr.get_bx()
        ))));
    };

    let mut upvalues = Vec::with_capacity(proto.upvalue_descs.len());
    for desc in &proto.upvalue_descs {
        let up = if desc.is_local {
            state.frame_mut().capture(desc.index as usize)
        } else {
            state.upvalue_ref(desc.index)?
        };
        upvalues.push(up);
    }
    trace!(upvalues = upvalues.len(), "closure created");
    let closure = LuaClosure::new_lua(proto, upvalues);
    state.set_reg(instr.get_a(), LuaValue::Function(Rc::new(closure)));
    Ok(())
}
