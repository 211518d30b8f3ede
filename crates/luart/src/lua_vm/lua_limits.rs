//! Centralized VM limits and configuration constants, mirroring the
//! values of Lua 5.3's `luaconf.h` / `lua.h`.

// ===== Stack =====

/// Minimum number of free slots guaranteed to every native function, and the
/// reserve added on top of a prototype's register count.
pub const LUA_MINSTACK: usize = 20;

/// Maximum number of slots in one register window.
pub const LUAI_MAXSTACK: usize = 1_000_000;

/// Default maximum number of live frames per thread.
pub const MAX_CALL_DEPTH: usize = 20_000;

/// Default maximum nesting of host-level calls (native code calling back
/// into the VM), which consume native stack.
pub const LUAI_MAXCCALLS: usize = 200;

// ===== Pseudo-indices =====

/// Stack index addressing the registry table.
pub const LUA_REGISTRYINDEX: i32 = -(LUAI_MAXSTACK as i32) - 1000;

/// Pseudo-index of the `i`-th (1-based) upvalue of the running function.
#[inline]
pub const fn lua_upvalue_index(i: i32) -> i32 {
    LUA_REGISTRYINDEX - i
}

// ===== Registry =====

pub const LUA_RIDX_MAINTHREAD: i64 = 1;
pub const LUA_RIDX_GLOBALS: i64 = 2;

// ===== Calls =====

/// Result count meaning "all results".
pub const LUA_MULTRET: i32 = -1;

// ===== Bytecode =====

/// Number of list items flushed per SETLIST.
pub const LFIELDS_PER_FLUSH: i64 = 50;

// ===== Metamethods =====

/// Bound on `__index`/`__newindex`/`__call` chains that are not functions.
pub const MAXTAGLOOP: usize = 2000;
