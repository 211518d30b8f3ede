/// Call, return and vararg instructions
///
/// Argument and result counts are biased by one; zero means "variable",
/// i.e. the values left above the registers by the previous instruction,
/// up to the marker it pushed.
use crate::lua_vm::lua_call_frame::CallSite;
use crate::lua_vm::{Instruction, LuaResult, LuaState};

/// Pushes R(A) and its arguments; returns the argument count.
fn push_func_and_args(state: &mut LuaState, a: i32, b: i32) -> usize {
    if b >= 1 {
        state.frame_mut().ensure(b as usize);
        for i in a..a + b {
            state.push_value(i);
        }
        (b - 1) as usize
    } else {
        state.fix_stack(a);
        let n_regs = state.n_regs();
        state.frame().top - n_regs - 1
    }
}

/// CALL A B C
/// R(A), ... ,R(A+C-2) := R(A)(R(A+1), ... ,R(A+B-1))
pub fn exec_call(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    call_with(state, instr.get_a(), instr.get_b(), instr.get_c())
}

/// TAILCALL A B C
/// return R(A)(R(A+1), ... ,R(A+B-1))
///
/// Runs as a call keeping every result; the RETURN that follows passes them
/// on. The caller's frame is not reused.
pub fn exec_tailcall(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    call_with(state, instr.get_a(), instr.get_b(), 0)
}

fn call_with(state: &mut LuaState, a: u32, b: u32, c: u32) -> LuaResult<()> {
    let nargs = push_func_and_args(state, a as i32 + 1, b as i32);
    let site = CallSite::Call { a, c };
    if !state.precall(nargs, c as i32 - 1, site)? {
        state.pop_results(a as i32 + 1, c as i32);
    }
    Ok(())
}

/// RETURN A B
/// return R(A), ... ,R(A+B-2)
///
/// Returns true when the loop running down to `stop` is done.
pub fn exec_return(state: &mut LuaState, instr: Instruction, stop: usize) -> LuaResult<bool> {
    let a = instr.get_a() as i32 + 1;
    let b = instr.get_b() as i32;
    let first_result = if b == 1 {
        state.frame().top
    } else if b > 1 {
        let base = state.frame().top;
        state.frame_mut().ensure((b - 1) as usize);
        for i in a..=a + b - 2 {
            state.push_value(i);
        }
        base
    } else {
        state.fix_stack(a);
        state.n_regs()
    };

    let Some(frame) = state.frames.pop() else {
        return Ok(true);
    };
    let site = state.post_call(frame, first_result);
    state.finish_call(site, stop)
}

/// VARARG A B
/// R(A), R(A+1), ..., R(A+B-2) = vararg
pub fn exec_vararg(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a() as i32 + 1;
    let b = instr.get_b() as i32;
    if b != 1 {
        let varargs = state.frame().varargs.clone();
        state.frame_mut().push_n(varargs, b - 1);
        state.pop_results(a, b);
    }
    Ok(())
}

/// TFORCALL A C
/// R(A+3), ... ,R(A+2+C) := R(A)(R(A+1), R(A+2))
pub fn exec_tforcall(state: &mut LuaState, instr: Instruction) -> LuaResult<()> {
    let a = instr.get_a();
    let c = instr.get_c();
    push_func_and_args(state, a as i32 + 1, 3);
    let site = CallSite::TForCall { a, c };
    if !state.precall(2, c as i32, site)? {
        state.pop_results(a as i32 + 4, c as i32 + 1);
    }
    Ok(())
}
