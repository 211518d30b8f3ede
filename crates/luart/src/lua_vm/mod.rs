// Lua virtual machine: state, frames, dispatch loop and the stack API
mod api;
mod execute;
mod lua_call_frame;
mod lua_error;
pub mod lua_limits;
mod lua_state;
mod metamethod;
pub mod opcode;
mod safe_option;

pub use api::{ArithOp, CompareOp};
pub use lua_call_frame::LuaCallFrame;
pub use lua_error::{LuaError, LuaResult, LuaStatus};
pub use lua_state::{LuaState, LuaVM};
pub use metamethod::TmKind;
pub use opcode::{Instruction, OpArgMode, OpCode, OpMode};
pub use safe_option::SafeOption;

/// Native function: receives its arguments as stack indices `1..=n` and
/// returns how many values on top of its stack are results.
pub type CFunction = fn(&mut LuaState) -> LuaResult<usize>;
