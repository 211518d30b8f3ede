use std::cell::{Cell, RefCell};

use crate::lua_vm::LuaState;

/// Coroutine status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoroutineStatus {
    Suspended, // created or yielded, can be resumed
    Running,   // currently executing
    Normal,    // resumed another coroutine
    Dead,      // finished or errored
}

impl CoroutineStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CoroutineStatus::Suspended => "suspended",
            CoroutineStatus::Running => "running",
            CoroutineStatus::Normal => "normal",
            CoroutineStatus::Dead => "dead",
        }
    }
}

/// Lua thread handle.
///
/// A coroutine's state lives in `state` while suspended and is taken out for
/// the duration of a resume, so at most one borrower ever runs it. The main
/// thread's state is owned by the host and never parked here.
pub struct LuaThread {
    pub(crate) state: RefCell<Option<LuaState>>,
    pub(crate) status: Cell<CoroutineStatus>,
    is_main: bool,
}

impl LuaThread {
    pub(crate) fn new_main() -> Self {
        LuaThread {
            state: RefCell::new(None),
            status: Cell::new(CoroutineStatus::Running),
            is_main: true,
        }
    }

    pub(crate) fn new_coroutine(state: LuaState) -> Self {
        LuaThread {
            state: RefCell::new(Some(state)),
            status: Cell::new(CoroutineStatus::Suspended),
            is_main: false,
        }
    }

    pub fn status(&self) -> CoroutineStatus {
        self.status.get()
    }

    pub fn is_main(&self) -> bool {
        self.is_main
    }

    /// Runs `f` with exclusive access to the coroutine's state. `None` for
    /// the main thread and while the coroutine is running or resuming
    /// another one.
    pub fn with_state<R>(&self, f: impl FnOnce(&mut LuaState) -> R) -> Option<R> {
        let mut state = self.state.borrow_mut().take()?;
        let result = f(&mut state);
        *self.state.borrow_mut() = Some(state);
        Some(result)
    }

    pub(crate) fn set_status(&self, status: CoroutineStatus) {
        self.status.set(status);
    }
}
