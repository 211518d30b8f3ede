// Coroutine library
// Implements: create, resume, yield, status, running, wrap, isyieldable

use std::rc::Rc;

use crate::lua_value::{LuaThread, LuaType, LuaValue};
use crate::lua_vm::lua_limits::lua_upvalue_index;
use crate::lua_vm::{CFunction, LuaError, LuaResult, LuaState, LuaStatus};

const COROUTINE_FUNCS: &[(&str, CFunction)] = &[
    ("create", coroutine_create),
    ("isyieldable", coroutine_isyieldable),
    ("resume", coroutine_resume),
    ("running", coroutine_running),
    ("status", coroutine_status),
    ("wrap", coroutine_wrap),
    ("yield", coroutine_yield),
];

pub fn open_coroutine(l: &mut LuaState) -> LuaResult<usize> {
    l.new_lib(COROUTINE_FUNCS)?;
    Ok(1)
}

fn get_co(l: &LuaState) -> LuaResult<Rc<LuaThread>> {
    match l.to_thread(1) {
        Some(co) => Ok(co),
        None => Err(l.arg_error(1, "coroutine expected")),
    }
}

/// Moves `narg` values into `co` and resumes it. On success the values it
/// yielded or returned are on top of `l` and their count is returned; on
/// failure the error object is returned instead.
fn aux_resume(l: &mut LuaState, co: &LuaThread, narg: usize) -> Result<usize, LuaValue> {
    let outcome = co.with_state(|cs| {
        if !cs.check_stack(narg) {
            return Err(LuaValue::from("too many arguments to resume"));
        }
        l.xmove(cs, narg);
        let (status, nres) = cs.resume(Some(&*l), narg);
        match status {
            LuaStatus::Ok | LuaStatus::Yield => {
                if !l.check_stack(nres + 1) {
                    cs.pop(nres);
                    return Err(LuaValue::from("too many results to resume"));
                }
                cs.xmove(l, nres);
                Ok(nres)
            }
            _ => {
                cs.xmove(l, 1);
                Err(l.pop_value())
            }
        }
    });
    match outcome {
        Some(result) => result,
        None => {
            l.pop(narg);
            Err(LuaValue::from("cannot resume non-suspended coroutine"))
        }
    }
}

/// coroutine.create(f) - Create a new coroutine running f
fn coroutine_create(l: &mut LuaState) -> LuaResult<usize> {
    l.check_type(1, LuaType::Function)?;
    let co = l.new_thread();
    l.push_value(1);
    co.with_state(|cs| l.xmove(cs, 1));
    Ok(1)
}

/// coroutine.resume(co, ...) - true plus yielded values, or false plus the
/// error object
fn coroutine_resume(l: &mut LuaState) -> LuaResult<usize> {
    let co = get_co(l)?;
    let narg = l.get_top() as usize - 1;
    match aux_resume(l, &co, narg) {
        Ok(n) => {
            l.push_boolean(true);
            l.insert(-(n as i32 + 1));
            Ok(n + 1)
        }
        Err(value) => {
            l.push_boolean(false);
            l.push(value);
            Ok(2)
        }
    }
}

fn aux_wrap(l: &mut LuaState) -> LuaResult<usize> {
    let Some(co) = l.to_thread(lua_upvalue_index(1)) else {
        return Err(l.caller_error("coroutine expected"));
    };
    let narg = l.get_top() as usize;
    match aux_resume(l, &co, narg) {
        Ok(n) => Ok(n),
        Err(value) => {
            let value = match value {
                LuaValue::String(s) => {
                    let mut msg = l.where_(1).into_bytes();
                    msg.extend_from_slice(s.as_bytes());
                    LuaValue::String(msg.into())
                }
                other => other,
            };
            Err(LuaError::Runtime(value))
        }
    }
}

/// coroutine.wrap(f) - Function resuming a new coroutine on every call
fn coroutine_wrap(l: &mut LuaState) -> LuaResult<usize> {
    coroutine_create(l)?;
    l.push_native_closure(aux_wrap, 1);
    Ok(1)
}

/// coroutine.yield(...) - Suspend the running coroutine
fn coroutine_yield(l: &mut LuaState) -> LuaResult<usize> {
    let n = l.get_top() as usize;
    Err(l.yield_(n))
}

/// coroutine.status(co) - "running", "suspended", "normal" or "dead"
fn coroutine_status(l: &mut LuaState) -> LuaResult<usize> {
    let co = get_co(l)?;
    let running = l.thread().is_some_and(|t| Rc::ptr_eq(&t, &co));
    let status = if running { "running" } else { co.status().as_str() };
    l.push_string(status);
    Ok(1)
}

/// coroutine.running() - Running coroutine plus whether it is the main one
fn coroutine_running(l: &mut LuaState) -> LuaResult<usize> {
    let is_main = l.push_thread();
    l.push_boolean(is_main);
    Ok(2)
}

/// coroutine.isyieldable()
fn coroutine_isyieldable(l: &mut LuaState) -> LuaResult<usize> {
    let yieldable = l.is_yieldable();
    l.push_boolean(yieldable);
    Ok(1)
}
