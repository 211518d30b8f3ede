// Stack-indexed host API, the equivalents of the `lua_*` and `luaL_*`
// functions. Indices are 1-based from the bottom of the running
// function's window, negative from its top, or pseudo-indices.
mod access;
mod arith;
mod auxlib;
mod call;
mod compare;
mod coroutine;
mod get;
mod misc;
mod push;
mod set;
mod stack;

pub use arith::ArithOp;
pub use compare::CompareOp;
