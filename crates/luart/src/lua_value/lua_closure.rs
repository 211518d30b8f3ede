use std::cell::RefCell;
use std::rc::{Rc, Weak};

use super::{Chunk, LuaValue};
use crate::lua_vm::CFunction;

/// Register window shared between a frame and the open upvalues aliasing it.
pub type RegisterWindow = Rc<RefCell<Vec<LuaValue>>>;

/// Upvalue state: open upvalues alias a live register slot, closed ones own
/// their value.
#[derive(Debug)]
pub enum UpvalueState {
    Open {
        window: Weak<RefCell<Vec<LuaValue>>>,
        slot: usize,
    },
    Closed(LuaValue),
}

/// A captured variable, shared by every closure that captured the same slot.
#[derive(Debug)]
pub struct LuaUpvalue {
    state: RefCell<UpvalueState>,
}

impl LuaUpvalue {
    pub fn new_open(window: &RegisterWindow, slot: usize) -> Self {
        LuaUpvalue {
            state: RefCell::new(UpvalueState::Open {
                window: Rc::downgrade(window),
                slot,
            }),
        }
    }

    pub fn new_closed(value: LuaValue) -> Self {
        LuaUpvalue {
            state: RefCell::new(UpvalueState::Closed(value)),
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(*self.state.borrow(), UpvalueState::Open { .. })
    }

    pub fn get_value(&self) -> LuaValue {
        match &*self.state.borrow() {
            UpvalueState::Open { window, slot } => window
                .upgrade()
                .and_then(|w| w.borrow().get(*slot).cloned())
                .unwrap_or_default(),
            UpvalueState::Closed(v) => v.clone(),
        }
    }

    pub fn set_value(&self, value: LuaValue) {
        let mut state = self.state.borrow_mut();
        match &mut *state {
            UpvalueState::Open { window, slot } => {
                if let Some(w) = window.upgrade() {
                    let mut regs = w.borrow_mut();
                    if *slot >= regs.len() {
                        regs.resize(*slot + 1, LuaValue::Nil);
                    }
                    regs[*slot] = value;
                }
            }
            UpvalueState::Closed(v) => *v = value,
        }
    }

    /// Copies the aliased slot into the upvalue; later accesses no longer
    /// touch the register window.
    pub fn close(&self) {
        let value = self.get_value();
        *self.state.borrow_mut() = UpvalueState::Closed(value);
    }
}

pub enum ClosureKind {
    Lua(Rc<Chunk>),
    Native(CFunction),
}

/// A function instance: bytecode prototype or native function, plus its
/// upvalue cells.
pub struct LuaClosure {
    kind: ClosureKind,
    upvalues: Vec<Rc<LuaUpvalue>>,
}

impl LuaClosure {
    pub fn new_lua(chunk: Rc<Chunk>, upvalues: Vec<Rc<LuaUpvalue>>) -> Self {
        LuaClosure {
            kind: ClosureKind::Lua(chunk),
            upvalues,
        }
    }

    pub fn new_native(func: CFunction, upvalues: Vec<Rc<LuaUpvalue>>) -> Self {
        LuaClosure {
            kind: ClosureKind::Native(func),
            upvalues,
        }
    }

    pub fn kind(&self) -> &ClosureKind {
        &self.kind
    }

    pub fn chunk(&self) -> Option<&Rc<Chunk>> {
        match &self.kind {
            ClosureKind::Lua(chunk) => Some(chunk),
            ClosureKind::Native(_) => None,
        }
    }

    pub fn native(&self) -> Option<CFunction> {
        match &self.kind {
            ClosureKind::Native(f) => Some(*f),
            ClosureKind::Lua(_) => None,
        }
    }

    pub fn is_native(&self) -> bool {
        matches!(self.kind, ClosureKind::Native(_))
    }

    pub fn upvalues(&self) -> &[Rc<LuaUpvalue>] {
        &self.upvalues
    }

    pub fn upvalue(&self, index: usize) -> Option<&Rc<LuaUpvalue>> {
        self.upvalues.get(index)
    }
}
