use super::lua_limits::{LUAI_MAXCCALLS, LUAI_MAXSTACK, MAX_CALL_DEPTH};

/// Runtime limits of a state and every thread created from it.
#[derive(Debug, Clone)]
pub struct SafeOption {
    /// Maximum slots in a single register window.
    pub max_stack_size: usize,
    /// Maximum frames per thread; exceeding it raises "stack overflow".
    pub max_call_depth: usize,
    /// Maximum nesting of host-level calls; exceeding it raises
    /// "C stack overflow".
    pub max_c_calls: usize,
}

impl Default for SafeOption {
    fn default() -> Self {
        Self {
            max_stack_size: LUAI_MAXSTACK,
            max_call_depth: MAX_CALL_DEPTH,
            max_c_calls: LUAI_MAXCCALLS,
        }
    }
}
