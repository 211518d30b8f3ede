// Tests for closures and upvalue capture
use super::asm::{ChunkBuilder, k, new_state, run};
use crate::lua_value::UpvalueDesc;
use crate::lua_vm::OpCode;

#[test]
fn test_upvalue_shared_after_scope_close() {
    // local function counter()
    //   local n = 0
    //   local function inc() n = n + 1; return n end
    //   local function get() return n end
    //   return inc, get
    // end
    // local inc, get = counter()
    // inc(); inc()
    // return get()
    let mut l = new_state();
    let inc = ChunkBuilder::function(0)
        .upvalue(UpvalueDesc::local(0))
        .constant(1i64)
        .abc(OpCode::GetUpval, 0, 0, 0)
        .abc(OpCode::Add, 0, 0, k(0))
        .abc(OpCode::SetUpval, 0, 0, 0)
        .abc(OpCode::GetUpval, 0, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let get = ChunkBuilder::function(0)
        .upvalue(UpvalueDesc::local(0))
        .abc(OpCode::GetUpval, 0, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let counter = ChunkBuilder::function(0)
        .constant(0i64)
        .proto(inc)
        .proto(get)
        .abx(OpCode::LoadK, 0, 0)
        .abx(OpCode::Closure, 1, 0)
        .abx(OpCode::Closure, 2, 1)
        .abc(OpCode::Move, 3, 1, 0)
        .abc(OpCode::Move, 4, 2, 0)
        .abc(OpCode::Return, 3, 3, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .proto(counter)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Move, 1, 0, 0)
        .abc(OpCode::Call, 1, 1, 3)
        .abc(OpCode::Move, 3, 1, 0)
        .abc(OpCode::Call, 3, 1, 1)
        .abc(OpCode::Move, 3, 1, 0)
        .abc(OpCode::Call, 3, 1, 1)
        .abc(OpCode::Move, 3, 2, 0)
        .abc(OpCode::Call, 3, 1, 2)
        .abc(OpCode::Return, 3, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 1);
    assert_eq!(l.to_integer(1), 2);
}

#[test]
fn test_open_upvalue_sees_register_writes() {
    // local x = 1
    // local function f() return x end
    // x = 5
    // return f()
    let mut l = new_state();
    let f = ChunkBuilder::function(0)
        .upvalue(UpvalueDesc::local(0))
        .abc(OpCode::GetUpval, 0, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant(1i64)
        .constant(5i64)
        .proto(f)
        .abx(OpCode::LoadK, 0, 0)
        .abx(OpCode::Closure, 1, 0)
        .abx(OpCode::LoadK, 0, 1)
        .abc(OpCode::Move, 2, 1, 0)
        .abc(OpCode::Call, 2, 1, 2)
        .abc(OpCode::Return, 2, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.to_integer(-1), 5);
}

#[test]
fn test_fresh_upvalue_per_iteration() {
    // local fns = {}
    // for i = 1, 3 do fns[i] = function() return i end end
    // return fns[1](), fns[3]()
    let mut l = new_state();
    let f = ChunkBuilder::function(0)
        .upvalue(UpvalueDesc::local(4))
        .abc(OpCode::GetUpval, 0, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant(1i64)
        .constant(3i64)
        .proto(f)
        .abc(OpCode::NewTable, 0, 0, 0)
        .abx(OpCode::LoadK, 1, 0)
        .abx(OpCode::LoadK, 2, 1)
        .abx(OpCode::LoadK, 3, 0)
        .asbx(OpCode::ForPrep, 1, 3)
        .abx(OpCode::Closure, 5, 0)
        .abc(OpCode::SetTable, 0, 4, 5)
        .asbx(OpCode::Jmp, 5, 0)
        .asbx(OpCode::ForLoop, 1, -4)
        .abc(OpCode::GetTable, 1, 0, k(0))
        .abc(OpCode::Call, 1, 1, 2)
        .abc(OpCode::GetTable, 2, 0, k(1))
        .abc(OpCode::Call, 2, 1, 2)
        .abc(OpCode::Return, 1, 3, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.get_top(), 2);
    assert_eq!(l.to_integer(1), 1);
    assert_eq!(l.to_integer(2), 3);
}

#[test]
fn test_nested_upvalue_capture() {
    // local x = 7
    // local function outer() return function() return x end end
    // return outer()()
    let mut l = new_state();
    let inner = ChunkBuilder::function(0)
        .upvalue(UpvalueDesc::upvalue(0))
        .abc(OpCode::GetUpval, 0, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let outer = ChunkBuilder::function(0)
        .upvalue(UpvalueDesc::local(0))
        .proto(inner)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant(7i64)
        .proto(outer)
        .abx(OpCode::LoadK, 0, 0)
        .abx(OpCode::Closure, 1, 0)
        .abc(OpCode::Move, 2, 1, 0)
        .abc(OpCode::Call, 2, 1, 2)
        .abc(OpCode::Call, 2, 1, 2)
        .abc(OpCode::Return, 2, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.to_integer(-1), 7);
}

#[test]
fn test_setupval_through_closed_upvalue() {
    // local function make()
    //   local v = 1
    //   return function(x) v = x end, function() return v end
    // end
    // local set, get = make()
    // set(42)
    // return get()
    let mut l = new_state();
    let set = ChunkBuilder::function(1)
        .upvalue(UpvalueDesc::local(0))
        .abc(OpCode::SetUpval, 0, 0, 0)
        .abc(OpCode::Return, 0, 1, 0)
        .build();
    let get = ChunkBuilder::function(0)
        .upvalue(UpvalueDesc::local(0))
        .abc(OpCode::GetUpval, 0, 0, 0)
        .abc(OpCode::Return, 0, 2, 0)
        .build();
    let make = ChunkBuilder::function(0)
        .constant(1i64)
        .proto(set)
        .proto(get)
        .abx(OpCode::LoadK, 0, 0)
        .abx(OpCode::Closure, 1, 0)
        .abx(OpCode::Closure, 2, 1)
        .abc(OpCode::Return, 1, 3, 0)
        .build();
    let chunk = ChunkBuilder::main()
        .constant(42i64)
        .proto(make)
        .abx(OpCode::Closure, 0, 0)
        .abc(OpCode::Call, 0, 1, 3)
        .abc(OpCode::Move, 2, 0, 0)
        .abx(OpCode::LoadK, 3, 0)
        .abc(OpCode::Call, 2, 2, 1)
        .abc(OpCode::Move, 2, 1, 0)
        .abc(OpCode::Call, 2, 1, 2)
        .abc(OpCode::Return, 2, 2, 0)
        .build();
    run(&mut l, chunk).unwrap();
    assert_eq!(l.to_integer(-1), 42);
}
