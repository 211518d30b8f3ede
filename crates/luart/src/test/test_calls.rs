// Tests for calls, returns, varargs and protected calls
use super::asm::{ChunkBuilder, k, new_state, run, run_protected};
use crate::lua_value::LuaValue;
use crate::lua_vm::lua_limits::{LUA_MULTRET, lua_upvalue_index};
use crate::lua_vm::{LuaError, LuaResult, LuaState, LuaStatus, OpCode, SafeOption};

fn sum_args(l: &mut LuaState) -> LuaResult<usize> {
    let mut total = 0;
    for i in 1..=l.get_top() {
        total += l.check_integer(i)?;
    }
    l.push_integer(total);
    Ok(1)
}

fn counter(l: &mut LuaState) -> LuaResult<usize> {
    let n = l.to_integer(lua_upvalue_index(1)) + 1;
    l.push_integer(n);
    l.copy(-1, lua_upvalue_index(1));
    Ok(1)
}

#[test]
fn test_return_constants() {
    let mut l = new_state();
    let chunk = ChunkBuilder::main()
        .constant(1i64)
        .constant(2i64)
        .abx(OpCode::LoadK, 0, 0)
        .abx(OpCode::LoadK, 1, 1)
        .abc(OpCode::Return, 0, 3, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 2);
    assert_eq!(l.to_integer(1), 1);
    assert_eq!(l.to_integer(2), 2);
}

#[test]
fn test_host_call_adjusts_results() {
    let mut l = new_state();
    let chunk = ChunkBuilder::main()
        .constant(1i64)
        .constant(2i64)
        .abx(OpCode::LoadK, 0, 0)
        .abx(OpCode::LoadK, 1, 1)
        .abc(OpCode::Return, 0, 3, 0)
        .build();
    l.load(chunk);
    l.call(0, 4).unwrap();
    assert_eq!(l.get_top(), 4);
    assert!(l.is_nil(3));
    assert!(l.is_nil(4));

    l.set_top(0);
    l.load(ChunkBuilder::main().abc(OpCode::Return, 0, 1, 0).build());
    l.call(0, 0).unwrap();
    assert_eq!(l.get_top(), 0);
}

#[test]
fn test_vararg_passthrough() {
    // return select('#', ...)
    let mut l = new_state();
    let chunk = ChunkBuilder::main()
        .constant("select")
        .constant("#")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abx(OpCode::LoadK, 1, 1)
        .abc(OpCode::Vararg, 2, 0, 0)
        .abc(OpCode::Call, 0, 0, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    l.load(chunk);
    l.push_integer(10);
    l.push_integer(20);
    l.push_integer(30);
    l.call(3, LUA_MULTRET).unwrap();
    assert_eq!(l.get_top(), 1);
    assert_eq!(l.to_integer(1), 3);
}

#[test]
fn test_open_result_chaining() {
    // local function id(...) return ... end
    // return id(id(1, 2, 3))
    let mut l = new_state();
    let id = ChunkBuilder::function(0)
        .vararg()
        .abc(OpCode::Vararg, 0, 0, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant(1i64)
        .constant(2i64)
        .constant(3i64)
        .proto(id)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Move, 1, 0, 0)
        .abc(OpCode::Move, 2, 0, 0)
        .abx(OpCode::LoadK, 3, 0)
        .abx(OpCode::LoadK, 4, 1)
        .abx(OpCode::LoadK, 5, 2)
        .abc(OpCode::Call, 2, 4, 0)
        .abc(OpCode::Call, 1, 0, 0)
        .abc(OpCode::Return, 1, 0, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 3);
    assert_eq!(l.to_integer(1), 1);
    assert_eq!(l.to_integer(2), 2);
    assert_eq!(l.to_integer(3), 3);
}

#[test]
fn test_fixed_params_and_missing_args() {
    // local function f(a, b, c) return c, b, a end
    // return f(1, 2)
    let mut l = new_state();
    let f = ChunkBuilder::function(3)
        .abc(OpCode::Move, 3, 2, 0)
        .abc(OpCode::Move, 4, 1, 0)
        .abc(OpCode::Move, 5, 0, 0)
        .abc(OpCode::Return, 3, 4, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant(1i64)
        .constant(2i64)
        .proto(f)
        .abx(OpCode::Closure, 0, 0)
        .abx(OpCode::LoadK, 1, 0)
        .abx(OpCode::LoadK, 2, 1)
        .abc(OpCode::Call, 0, 3, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 3);
    assert!(l.is_nil(1));
    assert_eq!(l.to_integer(2), 2);
    assert_eq!(l.to_integer(3), 1);
}

#[test]
fn test_native_function_from_bytecode() {
    // return sum(1, 2, 3)
    let mut l = new_state();
    l.register("sum", sum_args).unwrap();
    let chunk = ChunkBuilder::main()
        .constant("sum")
        .constant(1i64)
        .constant(2i64)
        .constant(3i64)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abx(OpCode::LoadK, 1, 1)
        .abx(OpCode::LoadK, 2, 2)
        .abx(OpCode::LoadK, 3, 3)
        .abc(OpCode::Call, 0, 4, 2)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.to_integer(-1), 6);
}

#[test]
fn test_native_closure_upvalues() {
    let mut l = new_state();
    l.push_integer(0);
    l.push_native_closure(counter, 1);
    for expected in 1..=3 {
        l.push_value(1);
        l.call(0, 1).unwrap();
        assert_eq!(l.to_integer(-1), expected);
        l.pop(1);
    }
}

#[test]
fn test_tailcall_results() {
    // local function f(...) return sum(...) end
    // return f(4, 5)
    let mut l = new_state();
    l.register("sum", sum_args).unwrap();
    let f = ChunkBuilder::function(0)
        .vararg()
        .env()
        .constant("sum")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::Vararg, 1, 0, 0)
        .abc(OpCode::TailCall, 0, 0, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant(4i64)
        .constant(5i64)
        .proto(f)
        .abx(OpCode::Closure, 0, 0)
        .abx(OpCode::LoadK, 1, 0)
        .abx(OpCode::LoadK, 2, 1)
        .abc(OpCode::TailCall, 0, 3, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 1);
    assert_eq!(l.to_integer(1), 9);
}

#[test]
fn test_call_non_function() {
    let mut l = new_state();
    let chunk = ChunkBuilder::main()
        .abc(OpCode::LoadNil, 0, 0, 0)
        .abc(OpCode::Call, 0, 1, 1)
        .abc(OpCode::Return, 0, 1, 0)
        .build();
    let err = run_protected(&mut l, chunk).unwrap_err();
    assert_eq!(err, "test.lua:2: attempt to call a nil value");
}

#[test]
fn test_stack_overflow() {
    // function r() return 1 + r() end; r()
    let mut l = LuaState::with_options(SafeOption {
        max_call_depth: 100,
        ..SafeOption::default()
    });
    l.open_libs().unwrap();
    let r = ChunkBuilder::function(0)
        .env()
        .constant("r")
        .constant(1i64)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::Call, 0, 1, 2)
        .abc(OpCode::Add, 0, k(1), 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant("r")
        .proto(r)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::SetTabUp, 0, k(0), 0)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::Call, 0, 1, 1)
        .abc(OpCode::Return, 0, 1, 0)
        .build();
    let err = run_protected(&mut l, chunk).unwrap_err();
    assert!(err.ends_with("stack overflow"), "{}", err);
    // the state stays usable
    assert_eq!(l.call_depth(), 0);
    l.set_top(0);
    l.push_native_function(sum_args);
    l.push_integer(2);
    l.call(1, 1).unwrap();
    assert_eq!(l.to_integer(1), 2);
}

#[test]
fn test_pcall_from_bytecode() {
    // return pcall(error, "boom")
    let mut l = new_state();
    let chunk = ChunkBuilder::main()
        .constant("pcall")
        .constant("error")
        .constant("boom")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::GetTabUp, 1, 0, k(1))
        .abx(OpCode::LoadK, 2, 2)
        .abc(OpCode::Call, 0, 3, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 2);
    assert!(!l.to_boolean(1));
    assert_eq!(l.to_value(2), LuaValue::from("boom"));
}

#[test]
fn test_error_location() {
    // error("bad")
    let mut l = new_state();
    let chunk = ChunkBuilder::main()
        .constant("error")
        .constant("bad")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abx(OpCode::LoadK, 1, 1)
        .abc(OpCode::Call, 0, 2, 1)
        .abc(OpCode::Return, 0, 1, 0)
        .build();
    let err = run_protected(&mut l, chunk).unwrap_err();
    assert_eq!(err, "test.lua:3: bad");
}

fn error_chunk() -> std::rc::Rc<crate::lua_value::Chunk> {
    ChunkBuilder::main()
        .constant("error")
        .constant("bad")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abx(OpCode::LoadK, 1, 1)
        .abc(OpCode::Call, 0, 2, 1)
        .abc(OpCode::Return, 0, 1, 0)
        .build()
}

fn prefix_handler(l: &mut LuaState) -> LuaResult<usize> {
    let msg = l.to_value(1).to_string();
    l.push_fstring(format!("handled: {}", msg));
    Ok(1)
}

fn failing_handler(_l: &mut LuaState) -> LuaResult<usize> {
    Err(LuaError::Runtime(LuaValue::from("again")))
}

#[test]
fn test_pcall_message_handler() {
    let mut l = new_state();
    l.push_native_function(prefix_handler);
    l.load(error_chunk());
    let status = l.pcall(0, 0, 1);
    assert_eq!(status, LuaStatus::RuntimeError);
    assert_eq!(l.get_top(), 2);
    assert_eq!(l.to_value(-1), LuaValue::from("handled: test.lua:3: bad"));
}

#[test]
fn test_error_in_error_handling() {
    let mut l = new_state();
    l.push_native_function(failing_handler);
    l.load(error_chunk());
    let status = l.pcall(0, 0, 1);
    assert_eq!(status, LuaStatus::ErrorInErrorHandling);
    assert_eq!(l.to_value(-1), LuaValue::from("error in error handling"));
}

#[test]
fn test_pcall_with_non_string_error() {
    let mut l = new_state();
    let chunk = ChunkBuilder::main()
        .constant("error")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::NewTable, 1, 0, 0)
        .abc(OpCode::Call, 0, 2, 1)
        .abc(OpCode::Return, 0, 1, 0)
        .build();
    l.load(chunk);
    assert_eq!(l.pcall(0, 0, 0), LuaStatus::RuntimeError);
    assert!(l.is_table(-1));
}
