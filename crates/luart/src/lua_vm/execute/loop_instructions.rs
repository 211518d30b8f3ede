/// Numeric and generic for-loop instructions
use crate::lua_value::LuaValue;
use crate::lua_vm::{Instruction, LuaError, LuaResult, LuaState};

/// Integer limit for an integer loop; the flag says the loop must not run.
/// `None` when the limit is not a number.
fn for_limit(limit: &LuaValue, step: i64) -> Option<(i64, bool)> {
    if let Some(i) = limit.to_integer() {
        return Some((i, false));
    }
    let f = limit.to_number()?;
    let f = if step < 0 { f.ceil() } else { f.floor() };
    if f >= 9_223_372_036_854_775_808.0 {
        Some((i64::MAX, step < 0))
    } else if f >= -9_223_372_036_854_775_808.0 {
        Some((f as i64, false))
    } else {
        // below the integer range, or NaN
        Some((i64::MIN, step > 0))
    }
}

/// FORPREP A sBx
/// R(A)-=R(A+2); pc+=sBx
pub fn exec_forprep(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    let init = state.reg(a);
    let limit = state.reg(a + 1);
    let step = state.reg(a + 2);

    if let (LuaValue::Integer(i), LuaValue::Integer(s)) = (&init, &step) {
        if let Some((ilimit, stop)) = for_limit(&limit, *s) {
            let start = if stop { 0 } else { *i };
            let ilimit = if stop {
                if *s < 0 { i64::MAX } else { i64::MIN }
            } else {
                ilimit
            };
            state.set_reg(a, LuaValue::Integer(start.wrapping_sub(*s)));
            state.set_reg(a + 1, LuaValue::Integer(ilimit));
            state.jump(instr.get_sbx());
            return Ok(());
        }
    }

    let Some(flimit) = limit.to_number() else {
        return Err(for_error(state, "limit"));
    };
    let Some(fstep) = step.to_number() else {
        return Err(for_error(state, "step"));
    };
    let Some(finit) = init.to_number() else {
        return Err(for_error(state, "initial value"));
    };
    state.set_reg(a, LuaValue::Float(finit - fstep));
    state.set_reg(a + 1, LuaValue::Float(flimit));
    state.set_reg(a + 2, LuaValue::Float(fstep));
    state.jump(instr.get_sbx());
    Ok(())
}

fn for_error(state: &LuaState, what: &str) -> LuaError {
    state.rt_error(LuaError::TypeError(format!("'for' {} must be a number", what)))
}

/// FORLOOP A sBx
/// R(A)+=R(A+2); if R(A) <?= R(A+1) then { pc+=sBx; R(A+3)=R(A) }
pub fn exec_forloop(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    let idx = state.reg(a);
    let limit = state.reg(a + 1);
    let step = state.reg(a + 2);

    let next = match (&idx, &limit, &step) {
        (LuaValue::Integer(i), LuaValue::Integer(l), LuaValue::Integer(s)) => {
            let i = i.wrapping_add(*s);
            let go_on = if *s > 0 { i <= *l } else { *l <= i };
            go_on.then_some(LuaValue::Integer(i))
        }
        _ => {
            let (Some(i), Some(l), Some(s)) = (idx.to_number(), limit.to_number(), step.to_number())
            else {
                return Err(for_error(state, "step"));
            };
            let i = i + s;
            let go_on = if s > 0.0 { i <= l } else { l <= i };
            go_on.then_some(LuaValue::Float(i))
        }
    };

    if let Some(value) = next {
        state.jump(instr.get_sbx());
        state.set_reg(a, value.clone());
        state.set_reg(a + 3, value);
    }
    Ok(())
}

/// TFORLOOP A sBx
/// if R(A+1) ~= nil then { R(A)=R(A+1); pc += sBx }
pub fn exec_tforloop(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    let control = state.reg(a + 1);
    if !control.is_nil() {
        state.set_reg(a, control);
        state.jump(instr.get_sbx());
    }
    Ok(())
}
