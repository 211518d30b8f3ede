// Tests for coroutines: host-level resume/yield and the coroutine library
use super::asm::{ChunkBuilder, k, new_state, run};
use crate::lua_value::{CoroutineStatus, LuaValue};
use crate::lua_vm::{LuaResult, LuaState, LuaStatus, OpCode};

/// function() local x = coroutine.yield(3, 4); return x end
fn yield_body() -> std::rc::Rc<crate::lua_value::Chunk> {
    let body = ChunkBuilder::function(0)
        .env()
        .constant("coroutine")
        .constant("yield")
        .constant(3i64)
        .constant(4i64)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::GetTable, 0, 0, k(1))
        .abx(OpCode::LoadK, 1, 2)
        .abx(OpCode::LoadK, 2, 3)
        .abc(OpCode::Call, 0, 3, 2)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    ChunkBuilder::main()
        .proto(body)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build()
}

#[test]
fn test_resume_yield_round_trip() {
    let mut l = new_state();
    run(&mut l, yield_body()).unwrap();
    let co = l.new_thread();
    l.push_value(1);
    co.with_state(|cs| l.xmove(cs, 1)).unwrap();
    assert_eq!(co.status(), CoroutineStatus::Suspended);

    let yielded = co
        .with_state(|cs| {
            let (status, n) = cs.resume(Some(&l), 0);
            let values = (cs.to_integer(-2), cs.to_integer(-1));
            cs.pop(n);
            (status, n, values)
        })
        .unwrap();
    assert_eq!(yielded, (LuaStatus::Yield, 2, (3, 4)));
    assert_eq!(co.status(), CoroutineStatus::Suspended);

    let finished = co
        .with_state(|cs| {
            cs.push_integer(5);
            let (status, n) = cs.resume(Some(&l), 1);
            (status, n, cs.to_integer(-1))
        })
        .unwrap();
    assert_eq!(finished, (LuaStatus::Ok, 1, 5));
    assert_eq!(co.status(), CoroutineStatus::Dead);

    let again = co
        .with_state(|cs| {
            let (status, _) = cs.resume(Some(&l), 0);
            (status, cs.to_value(-1))
        })
        .unwrap();
    assert_eq!(
        again,
        (LuaStatus::RuntimeError, LuaValue::from("cannot resume dead coroutine"))
    );
}

#[test]
fn test_resume_restores_unpopped_yield_values() {
    let mut l = new_state();
    run(&mut l, yield_body()).unwrap();
    let co = l.new_thread();
    l.push_value(1);
    co.with_state(|cs| l.xmove(cs, 1)).unwrap();

    let finished = co
        .with_state(|cs| {
            let (status, _) = cs.resume(Some(&l), 0);
            assert_eq!(status, LuaStatus::Yield);
            // yielded values left in place
            cs.push_integer(9);
            let (status, n) = cs.resume(Some(&l), 1);
            (status, n, cs.to_integer(-1), cs.get_top())
        })
        .unwrap();
    assert_eq!(finished, (LuaStatus::Ok, 1, 9, 1));
}

#[test]
fn test_error_kills_coroutine() {
    // function() error("oops") end
    let mut l = new_state();
    let body = ChunkBuilder::function(0)
        .env()
        .constant("error")
        .constant("oops")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abx(OpCode::LoadK, 1, 1)
        .abc(OpCode::Call, 0, 2, 1)
        .abc(OpCode::Return, 0, 1, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .proto(body)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    let co = l.new_thread();
    l.push_value(1);
    co.with_state(|cs| l.xmove(cs, 1)).unwrap();

    let (status, msg) = co
        .with_state(|cs| {
            let (status, n) = cs.resume(Some(&l), 0);
            assert_eq!(n, 1);
            (status, cs.to_value(-1))
        })
        .unwrap();
    assert_eq!(status, LuaStatus::RuntimeError);
    assert_eq!(msg, LuaValue::from("test.lua:3: oops"));
    assert_eq!(co.status(), CoroutineStatus::Dead);
}

#[test]
fn test_yield_outside_coroutine() {
    let mut l = new_state();
    assert!(!l.is_yieldable());
    let err = l.yield_(0);
    assert_eq!(
        err.into_value(),
        LuaValue::from("attempt to yield from outside a coroutine")
    );
}

fn native_yielder(l: &mut LuaState) -> LuaResult<usize> {
    l.push_integer(l.get_top() as i64);
    Err(l.yield_(1))
}

#[test]
fn test_native_body_yield() {
    // a native body yields its argument count; the next resume's values
    // become its results
    let mut l = new_state();
    let co = l.new_thread();
    let result = co
        .with_state(|cs| {
            cs.push_native_function(native_yielder);
            cs.push_boolean(true);
            cs.push_boolean(false);
            let (status, n) = cs.resume(Some(&l), 2);
            assert_eq!((status, n), (LuaStatus::Yield, 1));
            assert_eq!(cs.to_integer(-1), 2);
            cs.pop(1);
            cs.push_string("a");
            cs.push_string("b");
            let (status, n) = cs.resume(Some(&l), 2);
            (status, n, cs.to_value(-2), cs.to_value(-1))
        })
        .unwrap();
    assert_eq!(
        result,
        (LuaStatus::Ok, 2, LuaValue::from("a"), LuaValue::from("b"))
    );
}

#[test]
fn test_wrap_generator() {
    // local gen = coroutine.wrap(function()
    //   for i = 1, 3 do coroutine.yield(i) end
    //   return "end"
    // end)
    // return gen(), gen(), gen(), gen()
    let mut l = new_state();
    let body = ChunkBuilder::function(0)
        .env()
        .constant("coroutine")
        .constant("yield")
        .constant(1i64)
        .constant(3i64)
        .constant("end")
        .abx(OpCode::LoadK, 0, 2)
        .abx(OpCode::LoadK, 1, 3)
        .abx(OpCode::LoadK, 2, 2)
        .asbx(OpCode::ForPrep, 0, 4)
        .abc(OpCode::GetTabUp, 4, 0, k(0))
        .abc(OpCode::GetTable, 4, 4, k(1))
        .abc(OpCode::Move, 5, 3, 0)
        .abc(OpCode::Call, 4, 2, 1)
        .asbx(OpCode::ForLoop, 0, -5)
        .abx(OpCode::LoadK, 0, 4)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant("coroutine")
        .constant("wrap")
        .proto(body)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::GetTable, 0, 0, k(1))
        .abx(OpCode::Closure, 1, 0)
        .abc(OpCode::Call, 0, 2, 2)
        .abc(OpCode::Move, 1, 0, 0)
        .abc(OpCode::Call, 1, 1, 2)
        .abc(OpCode::Move, 2, 0, 0)
        .abc(OpCode::Call, 2, 1, 2)
        .abc(OpCode::Move, 3, 0, 0)
        .abc(OpCode::Call, 3, 1, 2)
        .abc(OpCode::Move, 4, 0, 0)
        .abc(OpCode::Call, 4, 1, 2)
        .abc(OpCode::Return, 1, 5, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 4);
    assert_eq!(l.to_integer(1), 1);
    assert_eq!(l.to_integer(2), 2);
    assert_eq!(l.to_integer(3), 3);
    assert_eq!(l.to_value(4), LuaValue::from("end"));
}

#[test]
fn test_library_resume_and_status() {
    // local co = coroutine.create(body)
    // local ok, a, b = coroutine.resume(co)
    // local ok2, r = coroutine.resume(co, 5)
    // local ok3, e = coroutine.resume(co)
    // return ok, a, b, ok2, r, ok3, e, coroutine.status(co)
    let mut l = new_state();
    let body = ChunkBuilder::function(0)
        .env()
        .constant("coroutine")
        .constant("yield")
        .constant(3i64)
        .constant(4i64)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::GetTable, 0, 0, k(1))
        .abx(OpCode::LoadK, 1, 2)
        .abx(OpCode::LoadK, 2, 3)
        .abc(OpCode::Call, 0, 3, 2)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .stack(16)
        .constant("coroutine")
        .constant("create")
        .constant("resume")
        .constant("status")
        .constant(5i64)
        .proto(body)
        // R0 = coroutine.create(body)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::GetTable, 0, 0, k(1))
        .abx(OpCode::Closure, 1, 0)
        .abc(OpCode::Call, 0, 2, 2)
        // R1, R2, R3 = coroutine.resume(R0)
        .abc(OpCode::GetTabUp, 1, 0, k(0))
        .abc(OpCode::GetTable, 1, 1, k(2))
        .abc(OpCode::Move, 2, 0, 0)
        .abc(OpCode::Call, 1, 2, 4)
        // R4, R5 = coroutine.resume(R0, 5)
        .abc(OpCode::GetTabUp, 4, 0, k(0))
        .abc(OpCode::GetTable, 4, 4, k(2))
        .abc(OpCode::Move, 5, 0, 0)
        .abx(OpCode::LoadK, 6, 4)
        .abc(OpCode::Call, 4, 3, 3)
        // R6, R7 = coroutine.resume(R0)
        .abc(OpCode::GetTabUp, 6, 0, k(0))
        .abc(OpCode::GetTable, 6, 6, k(2))
        .abc(OpCode::Move, 7, 0, 0)
        .abc(OpCode::Call, 6, 2, 3)
        // R8 = coroutine.status(R0)
        .abc(OpCode::GetTabUp, 8, 0, k(0))
        .abc(OpCode::GetTable, 8, 8, k(3))
        .abc(OpCode::Move, 9, 0, 0)
        .abc(OpCode::Call, 8, 2, 2)
        .abc(OpCode::Return, 1, 9, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 8);
    assert!(l.to_boolean(1));
    assert_eq!(l.to_integer(2), 3);
    assert_eq!(l.to_integer(3), 4);
    assert!(l.to_boolean(4));
    assert_eq!(l.to_integer(5), 5);
    assert!(!l.to_boolean(6));
    assert_eq!(l.to_value(7), LuaValue::from("cannot resume dead coroutine"));
    assert_eq!(l.to_value(8), LuaValue::from("dead"));
}

#[test]
fn test_yield_inside_pcall() {
    // coroutine body: return pcall(coroutine.yield, 1)
    let mut l = new_state();
    let body = ChunkBuilder::function(0)
        .env()
        .constant("pcall")
        .constant("coroutine")
        .constant("yield")
        .constant(1i64)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::GetTabUp, 1, 0, k(1))
        .abc(OpCode::GetTable, 1, 1, k(2))
        .abx(OpCode::LoadK, 2, 3)
        .abc(OpCode::Call, 0, 3, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .proto(body)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    let co = l.new_thread();
    l.push_value(1);
    co.with_state(|cs| l.xmove(cs, 1)).unwrap();

    let yielded = co
        .with_state(|cs| {
            let (status, n) = cs.resume(Some(&l), 0);
            let value = cs.to_integer(-1);
            cs.pop(n);
            (status, n, value)
        })
        .unwrap();
    assert_eq!(yielded, (LuaStatus::Yield, 1, 1));
    assert_eq!(co.status(), CoroutineStatus::Suspended);

    let finished = co
        .with_state(|cs| {
            cs.push_string("a");
            cs.push_string("b");
            let (status, n) = cs.resume(Some(&l), 2);
            (status, n, cs.to_boolean(-3), cs.to_value(-2), cs.to_value(-1))
        })
        .unwrap();
    assert_eq!(
        finished,
        (
            LuaStatus::Ok,
            3,
            true,
            LuaValue::from("a"),
            LuaValue::from("b")
        )
    );
    assert_eq!(co.status(), CoroutineStatus::Dead);
}

#[test]
fn test_error_after_resume_is_caught_by_pcall() {
    // coroutine body: return pcall(function() coroutine.yield(); error("late") end)
    let mut l = new_state();
    let inner = ChunkBuilder::function(0)
        .env()
        .constant("coroutine")
        .constant("yield")
        .constant("error")
        .constant("late")
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abc(OpCode::GetTable, 0, 0, k(1))
        .abc(OpCode::Call, 0, 1, 1)
        .abc(OpCode::GetTabUp, 0, 0, k(2))
        .abx(OpCode::LoadK, 1, 3)
        .abc(OpCode::Call, 0, 2, 1)
        .abc(OpCode::Return, 0, 1, 0)
        .build();
    let body = ChunkBuilder::function(0)
        .env()
        .constant("pcall")
        .proto(inner)
        .abc(OpCode::GetTabUp, 0, 0, k(0))
        .abx(OpCode::Closure, 1, 0)
        .abc(OpCode::Call, 0, 2, 0)
        .abc(OpCode::Return, 0, 0, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .proto(body)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    let co = l.new_thread();
    l.push_value(1);
    co.with_state(|cs| l.xmove(cs, 1)).unwrap();

    let result = co
        .with_state(|cs| {
            let (status, n) = cs.resume(Some(&l), 0);
            assert_eq!((status, n), (LuaStatus::Yield, 0));
            let (status, n) = cs.resume(Some(&l), 0);
            (status, n, cs.to_boolean(-2), cs.to_value(-1))
        })
        .unwrap();
    assert_eq!(
        result,
        (LuaStatus::Ok, 2, false, LuaValue::from("test.lua:6: late"))
    );
    assert_eq!(co.status(), CoroutineStatus::Dead);
}

#[test]
fn test_yield_inside_index_metamethod() {
    // index = function(t, key) return (coroutine.yield(key)) end
    // body = function(t) return t.x, "after" end
    let mut l = new_state();
    let index = ChunkBuilder::function(2)
        .env()
        .constant("coroutine")
        .constant("yield")
        .abc(OpCode::GetTabUp, 2, 0, k(0))
        .abc(OpCode::GetTable, 2, 2, k(1))
        .abc(OpCode::Move, 3, 1, 0)
        .abc(OpCode::Call, 2, 2, 2)
        .abc(OpCode::Return, 2, 2, 0)
        .build();
    let body = ChunkBuilder::function(1)
        .constant("x")
        .constant("after")
        .abc(OpCode::GetTable, 1, 0, k(0))
        .abx(OpCode::LoadK, 2, 1)
        .abc(OpCode::Return, 1, 3, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .proto(body)
        .proto(index)
        .abx(OpCode::Closure, 0, 0)
        .abx(OpCode::Closure, 1, 1)
        .abc(OpCode::Return, 0, 3, 0)
        .build();
    run(&mut l, chunk).unwrap();
    // 3: t with metatable { __index = index }
    l.new_table();
    l.new_table();
    l.push_value(2);
    l.set_field(-2, "__index").unwrap();
    l.set_metatable(-2).unwrap();
    let co = l.new_thread();
    l.push_value(1);
    l.push_value(3);
    co.with_state(|cs| l.xmove(cs, 2)).unwrap();

    let yielded = co
        .with_state(|cs| {
            let (status, n) = cs.resume(Some(&l), 1);
            let value = cs.to_value(-1);
            cs.pop(n);
            (status, n, value)
        })
        .unwrap();
    assert_eq!(yielded, (LuaStatus::Yield, 1, LuaValue::from("x")));

    let finished = co
        .with_state(|cs| {
            cs.push_integer(7);
            let (status, n) = cs.resume(Some(&l), 1);
            (status, n, cs.to_integer(-2), cs.to_value(-1))
        })
        .unwrap();
    assert_eq!(finished, (LuaStatus::Ok, 2, 7, LuaValue::from("after")));
}

#[test]
fn test_yield_inside_concat_metamethod() {
    // body = function(t) return "a" .. t .. "c" end, with __concat = coroutine.yield
    let mut l = new_state();
    let body = ChunkBuilder::function(1)
        .constant("a")
        .constant("c")
        .abx(OpCode::LoadK, 1, 0)
        .abc(OpCode::Move, 2, 0, 0)
        .abx(OpCode::LoadK, 3, 1)
        .abc(OpCode::Concat, 1, 1, 3)
        .abc(OpCode::Return, 1, 2, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .proto(body)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    // 2: t with metatable { __concat = coroutine.yield }
    l.new_table();
    l.new_table();
    l.get_global("coroutine").unwrap();
    l.get_field(-1, "yield").unwrap();
    l.set_field(-3, "__concat").unwrap();
    l.pop(1);
    l.set_metatable(-2).unwrap();
    let co = l.new_thread();
    l.push_value(1);
    l.push_value(2);
    co.with_state(|cs| l.xmove(cs, 2)).unwrap();

    let yielded = co
        .with_state(|cs| {
            let (status, n) = cs.resume(Some(&l), 1);
            let right = cs.to_value(-1);
            cs.pop(n);
            (status, n, right)
        })
        .unwrap();
    // the fold starts with the rightmost pair
    assert_eq!(yielded, (LuaStatus::Yield, 2, LuaValue::from("c")));

    let finished = co
        .with_state(|cs| {
            cs.push_string("X");
            let (status, n) = cs.resume(Some(&l), 1);
            (status, n, cs.to_value(-1))
        })
        .unwrap();
    assert_eq!(finished, (LuaStatus::Ok, 1, LuaValue::from("aX")));
}

fn status_of_self(l: &mut LuaState) -> LuaResult<usize> {
    let co = l.to_thread(1);
    let yieldable = l.is_yieldable();
    l.push_boolean(yieldable);
    l.push_boolean(co.is_none());
    Ok(2)
}

#[test]
fn test_running_thread_is_yieldable() {
    let mut l = new_state();
    let co = l.new_thread();
    let result = co
        .with_state(|cs| {
            cs.push_native_function(status_of_self);
            let (status, _) = cs.resume(Some(&l), 0);
            (status, cs.to_boolean(-2), cs.to_boolean(-1))
        })
        .unwrap();
    assert_eq!(result, (LuaStatus::Ok, true, true));
    assert!(co.with_state(|_| ()).is_some());
}

#[test]
fn test_main_thread_handle() {
    let l = new_state();
    let main = l.thread().unwrap();
    assert!(main.is_main());
    assert!(main.with_state(|_| ()).is_none());
    assert_eq!(main.status(), CoroutineStatus::Running);
}
