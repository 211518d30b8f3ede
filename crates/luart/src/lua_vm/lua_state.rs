// Lua execution state (equivalent to lua_State in the C API)
// Each thread/coroutine owns one; all states derived from the same root
// share a LuaVM (registry, per-type metatables, limits)

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::trace;

use crate::lua_value::{
    Chunk, LUA_NUMTAGS, LuaTable, LuaThread, LuaType, LuaValue, TableRef,
};
use crate::lua_vm::lua_call_frame::{CallSite, LuaCallFrame};
use crate::lua_vm::lua_limits::{
    LUA_MINSTACK, LUA_REGISTRYINDEX, LUA_RIDX_GLOBALS, LUA_RIDX_MAINTHREAD,
};
use crate::lua_vm::{LuaError, LuaStatus, SafeOption};

/// Global state shared by every thread of one root state.
pub struct LuaVM {
    pub(crate) registry: TableRef,
    // metatables of non-table values, indexed by basic type tag
    pub(crate) type_metatables: RefCell<[Option<TableRef>; LUA_NUMTAGS]>,
    pub(crate) options: SafeOption,
}

impl LuaVM {
    pub(crate) fn globals(&self) -> LuaValue {
        self.registry.borrow().get_int(LUA_RIDX_GLOBALS)
    }
}

/// A call interrupted by a yield: where the values passed to the next
/// resume must be delivered.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PendingCall {
    pub(crate) site: CallSite,
    pub(crate) n_results: i32,
    /// Top of the suspended frame before the yielded values were pushed.
    pub(crate) base: usize,
}

/// Execution state for a Lua thread/coroutine
pub struct LuaState {
    pub(crate) vm: Rc<LuaVM>,

    /// Frame arena; index 0 is the base frame used by the host, the last
    /// entry is the running function.
    pub(crate) frames: Vec<LuaCallFrame>,

    pub(crate) handle: Weak<LuaThread>,

    /// Nesting of host-level calls; yields are refused while non-zero.
    pub(crate) nny: usize,
    /// Nesting of native stack use (host-level calls and resumes).
    pub(crate) n_ccalls: usize,

    pub(crate) pending: Option<PendingCall>,
    /// Values handed over by the last yield.
    pub(crate) transfer: Vec<LuaValue>,
    pub(crate) status: LuaStatus,
}

impl LuaState {
    /// Creates a fresh root state with default limits.
    pub fn new() -> Self {
        Self::with_options(SafeOption::default())
    }

    /// Creates a fresh root state: empty registry with the main thread and
    /// an empty globals table.
    pub fn with_options(options: SafeOption) -> Self {
        let main = Rc::new(LuaThread::new_main());
        let mut registry = LuaTable::new(2, 0);
        registry.put_int(LUA_RIDX_MAINTHREAD, LuaValue::Thread(main.clone()));
        registry.put_int(LUA_RIDX_GLOBALS, LuaValue::table(LuaTable::new(0, 0)));

        let vm = Rc::new(LuaVM {
            registry: Rc::new(RefCell::new(registry)),
            type_metatables: RefCell::new(Default::default()),
            options,
        });
        trace!("main state created");
        Self::with_vm(vm, Rc::downgrade(&main))
    }

    pub(crate) fn with_vm(vm: Rc<LuaVM>, handle: Weak<LuaThread>) -> Self {
        LuaState {
            vm,
            frames: vec![LuaCallFrame::new(LUA_MINSTACK, None)],
            handle,
            nny: 0,
            n_ccalls: 0,
            pending: None,
            transfer: Vec::new(),
            status: LuaStatus::Ok,
        }
    }

    pub fn options(&self) -> &SafeOption {
        &self.vm.options
    }

    /// Handle of this state's thread, if still alive.
    pub fn thread(&self) -> Option<Rc<LuaThread>> {
        self.handle.upgrade()
    }

    pub fn is_main_thread(&self) -> bool {
        self.handle.upgrade().is_some_and(|t| t.is_main())
    }

    /// Number of live frames above the base frame.
    pub fn call_depth(&self) -> usize {
        self.frames.len() - 1
    }

    #[inline]
    pub(crate) fn frame(&self) -> &LuaCallFrame {
        let i = self.frames.len() - 1;
        &self.frames[i]
    }

    #[inline]
    pub(crate) fn frame_mut(&mut self) -> &mut LuaCallFrame {
        let i = self.frames.len() - 1;
        &mut self.frames[i]
    }

    /// Pops frames down to `depth`, closing their open upvalues.
    pub(crate) fn unwind_to(&mut self, depth: usize) {
        if self.frames.len() > depth {
            trace!(from = self.frames.len(), to = depth, "unwinding frames");
            self.frames.truncate(depth.max(1));
        }
    }

    // ===== index resolution =====

    /// Value at a stack index or pseudo-index; none/invalid reads as nil.
    pub(crate) fn index_to_value(&self, idx: i32) -> LuaValue {
        if idx < LUA_REGISTRYINDEX {
            let uv = (LUA_REGISTRYINDEX - idx - 1) as usize;
            return self
                .frame()
                .closure
                .as_ref()
                .and_then(|c| c.upvalue(uv).map(|u| u.get_value()))
                .unwrap_or_default();
        }
        if idx == LUA_REGISTRYINDEX {
            return LuaValue::Table(self.vm.registry.clone());
        }
        let abs = self.abs_index(idx);
        let frame = self.frame();
        if abs > 0 && abs as usize <= frame.top {
            frame.slot(abs as usize - 1)
        } else {
            LuaValue::Nil
        }
    }

    /// Stores into a stack index or upvalue pseudo-index; invalid targets
    /// are ignored.
    pub(crate) fn set_index_value(&mut self, idx: i32, value: LuaValue) {
        if idx < LUA_REGISTRYINDEX {
            let uv = (LUA_REGISTRYINDEX - idx - 1) as usize;
            if let Some(up) = self.frame().closure.as_ref().and_then(|c| c.upvalue(uv)) {
                up.set_value(value);
            }
            return;
        }
        if idx == LUA_REGISTRYINDEX {
            return;
        }
        let abs = self.abs_index(idx);
        let frame = self.frame();
        if abs > 0 && abs as usize <= frame.top {
            frame.set_slot(abs as usize - 1, value);
        }
    }

    pub(crate) fn is_valid_index(&self, idx: i32) -> bool {
        if idx < LUA_REGISTRYINDEX {
            let uv = (LUA_REGISTRYINDEX - idx - 1) as usize;
            return self
                .frame()
                .closure
                .as_ref()
                .is_some_and(|c| uv < c.upvalues().len());
        }
        if idx == LUA_REGISTRYINDEX {
            return true;
        }
        let abs = self.abs_index(idx);
        abs > 0 && abs as usize <= self.frame().top
    }

    #[inline]
    pub(crate) fn push(&mut self, value: LuaValue) {
        self.frame_mut().push(value);
    }

    #[inline]
    pub(crate) fn pop_value(&mut self) -> LuaValue {
        self.frame_mut().pop()
    }

    // ===== metatables =====

    /// Metatable of any value: own metatable for tables, the per-type
    /// metatable otherwise.
    pub(crate) fn metatable_of(&self, value: &LuaValue) -> Option<TableRef> {
        match value {
            LuaValue::Table(t) => t.borrow().metatable(),
            other => {
                let tag = other.type_of().tag();
                self.vm.type_metatables.borrow()[tag as usize].clone()
            }
        }
    }

    pub(crate) fn set_metatable_of(&mut self, value: &LuaValue, mt: Option<TableRef>) {
        match value {
            LuaValue::Table(t) => t.borrow_mut().set_metatable(mt),
            other => {
                let tag = other.type_of();
                if tag != LuaType::None {
                    self.vm.type_metatables.borrow_mut()[tag.tag() as usize] = mt;
                }
            }
        }
    }

    // ===== error helpers =====

    /// `source:line:` of the running bytecode instruction, if any.
    pub(crate) fn location(&self) -> Option<String> {
        self.location_at(self.frames.len() - 1)
    }

    pub(crate) fn location_at(&self, frame_idx: usize) -> Option<String> {
        let frame = self.frames.get(frame_idx)?;
        let chunk: Rc<Chunk> = frame.chunk()?;
        chunk.location(frame.pc.saturating_sub(1))
    }

    /// Attaches the current position to an error raised by the VM itself.
    pub(crate) fn rt_error(&self, err: LuaError) -> LuaError {
        err.with_location(self.location())
    }

    pub(crate) fn type_error(&self, what: &str, value: &LuaValue) -> LuaError {
        self.rt_error(LuaError::TypeError(format!(
            "attempt to {} a {} value",
            what,
            value.type_name()
        )))
    }
}

impl Default for LuaState {
    fn default() -> Self {
        Self::new()
    }
}
