// Lua Runtime
// An embeddable Lua 5.3 register VM: runs precompiled chunks, driven by the
// host through a stack-indexed API

#[cfg(test)]
mod test;

pub mod lua_value;
pub mod lua_vm;
pub mod stdlib;

pub use lua_value::{
    Chunk, CoroutineStatus, LocVar, LuaString, LuaTable, LuaThread, LuaType, LuaValue, UpvalueDesc,
};
pub use lua_vm::lua_limits::{
    LUA_MINSTACK, LUA_MULTRET, LUA_REGISTRYINDEX, LUA_RIDX_GLOBALS, LUA_RIDX_MAINTHREAD,
    lua_upvalue_index,
};
pub use lua_vm::{
    ArithOp, CFunction, CompareOp, Instruction, LuaError, LuaResult, LuaState, LuaStatus, OpCode,
    SafeOption,
};
pub use stdlib::Stdlib;
