// Value model: tagged values, tables, closures, prototypes and threads
mod chunk;
mod lua_closure;
pub mod lua_number;
mod lua_table;
mod lua_thread;
mod lua_value;

pub use chunk::{Chunk, LocVar, UpvalueDesc};
pub use lua_closure::{ClosureKind, LuaClosure, LuaUpvalue, RegisterWindow, UpvalueState};
pub use lua_table::LuaTable;
pub use lua_thread::{CoroutineStatus, LuaThread};
pub use lua_value::*;
