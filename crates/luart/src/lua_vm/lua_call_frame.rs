use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use ahash::RandomState;

use crate::lua_value::{Chunk, LuaClosure, LuaUpvalue, LuaValue, RegisterWindow};

/// Where the results of a frame go once it returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum CallSite {
    /// Returns to native code (`call`, `pcall`, resume); the dispatch loop
    /// that runs this frame stops when it returns.
    Host,
    /// CALL/TAILCALL instruction of the caller: results are stored from
    /// register A according to C.
    Call { a: u32, c: u32 },
    /// TFORCALL instruction of the caller: results go to R(A+3)...
    TForCall { a: u32, c: u32 },
    /// Metamethod called by an instruction of the caller; its result
    /// completes that instruction.
    Meta,
    /// Callee of a `pcall`/`xpcall` frame; returning completes the
    /// protected call with `true` and the results.
    Protected,
}

/// Marks the native frame of `pcall`/`xpcall` while its callee runs in the
/// dispatch loop; errors raised by the frames above it unwind to it.
#[derive(Debug, Clone)]
pub(crate) struct ProtectedCall {
    pub(crate) handler: Option<LuaValue>,
}

/// One activation record: a register window plus bookkeeping.
///
/// Slots `0..top` are addressable through stack indices `1..=top`; for
/// bytecode frames the first `max_stack_size` slots are the registers and
/// anything above is the transient results area used by variable-result
/// instructions.
pub struct LuaCallFrame {
    pub(crate) window: RegisterWindow,
    pub(crate) top: usize,
    pub(crate) closure: Option<Rc<LuaClosure>>,
    pub(crate) varargs: Vec<LuaValue>,
    pub(crate) pc: usize,
    pub(crate) open_upvalues: HashMap<usize, Rc<LuaUpvalue>, RandomState>,
    pub(crate) call_site: CallSite,
    pub(crate) n_results: i32,
    pub(crate) protect: Option<ProtectedCall>,
    /// Left operand register of the CONCAT pair being folded.
    pub(crate) concat_at: u32,
    /// Set while `a <= b` is answered by `not (b < a)` through `__lt`.
    pub(crate) negate_result: bool,
}

impl LuaCallFrame {
    pub(crate) fn new(size: usize, closure: Option<Rc<LuaClosure>>) -> Self {
        LuaCallFrame {
            window: Rc::new(RefCell::new(vec![LuaValue::Nil; size])),
            top: 0,
            closure,
            varargs: Vec::new(),
            pc: 0,
            open_upvalues: HashMap::default(),
            call_site: CallSite::Host,
            n_results: 0,
            protect: None,
            concat_at: 0,
            negate_result: false,
        }
    }

    /// Prototype of the running function, for bytecode frames.
    pub(crate) fn chunk(&self) -> Option<Rc<Chunk>> {
        self.closure.as_ref().and_then(|c| c.chunk().cloned())
    }

    pub(crate) fn is_lua(&self) -> bool {
        self.closure.as_ref().is_some_and(|c| !c.is_native())
    }

    pub(crate) fn capacity(&self) -> usize {
        self.window.borrow().len()
    }

    /// Grows the backing storage so `n` more values fit above `top`.
    /// Existing slots keep their positions.
    pub(crate) fn ensure(&mut self, n: usize) {
        let mut w = self.window.borrow_mut();
        let needed = self.top + n;
        if w.len() < needed {
            w.resize(needed, LuaValue::Nil);
        }
    }

    #[inline]
    pub(crate) fn slot(&self, i: usize) -> LuaValue {
        self.window.borrow().get(i).cloned().unwrap_or_default()
    }

    #[inline]
    pub(crate) fn set_slot(&self, i: usize, value: LuaValue) {
        let mut w = self.window.borrow_mut();
        if i >= w.len() {
            w.resize(i + 1, LuaValue::Nil);
        }
        w[i] = value;
    }

    #[inline]
    pub(crate) fn push(&mut self, value: LuaValue) {
        {
            let mut w = self.window.borrow_mut();
            if self.top < w.len() {
                w[self.top] = value;
            } else {
                w.push(value);
            }
        }
        self.top += 1;
    }

    #[inline]
    pub(crate) fn pop(&mut self) -> LuaValue {
        if self.top == 0 {
            return LuaValue::Nil;
        }
        self.top -= 1;
        std::mem::take(&mut self.window.borrow_mut()[self.top])
    }

    /// Pushes `n` values taken from `values`, padding with nil; a negative
    /// `n` pushes all of them.
    pub(crate) fn push_n(&mut self, values: Vec<LuaValue>, n: i32) {
        if n < 0 {
            self.ensure(values.len());
            for v in values {
                self.push(v);
            }
            return;
        }
        let n = n as usize;
        self.ensure(n);
        let mut iter = values.into_iter();
        for _ in 0..n {
            self.push(iter.next().unwrap_or_default());
        }
    }

    /// Pops the top `n` values, returned bottom to top.
    pub(crate) fn pop_n(&mut self, n: usize) -> Vec<LuaValue> {
        let n = n.min(self.top);
        let start = self.top - n;
        let mut w = self.window.borrow_mut();
        let values = w[start..self.top].iter_mut().map(std::mem::take).collect();
        self.top = start;
        values
    }

    /// Moves `top`, clearing dropped slots or nil-filling new ones.
    pub(crate) fn set_top(&mut self, new_top: usize) {
        if new_top < self.top {
            let mut w = self.window.borrow_mut();
            for v in &mut w[new_top..self.top] {
                *v = LuaValue::Nil;
            }
        } else if new_top > self.top {
            self.ensure(new_top - self.top);
        }
        self.top = new_top;
    }

    /// Reverses slots `from..=to`.
    pub(crate) fn reverse(&self, from: usize, to: usize) {
        if from < to {
            self.window.borrow_mut()[from..=to].reverse();
        }
    }

    /// Existing open upvalue for `slot`, or a new one registered in the map.
    pub(crate) fn capture(&mut self, slot: usize) -> Rc<LuaUpvalue> {
        if let Some(up) = self.open_upvalues.get(&slot) {
            return up.clone();
        }
        let up = Rc::new(LuaUpvalue::new_open(&self.window, slot));
        self.open_upvalues.insert(slot, up.clone());
        up
    }

    /// Closes every open upvalue aliasing a slot `>= from`.
    pub(crate) fn close_upvalues(&mut self, from: usize) {
        if self.open_upvalues.is_empty() {
            return;
        }
        self.open_upvalues.retain(|&slot, up| {
            if slot >= from {
                up.close();
                false
            } else {
                true
            }
        });
    }
}

impl Drop for LuaCallFrame {
    // no open upvalue may outlive the window it aliases
    fn drop(&mut self) {
        self.close_upvalues(0);
    }
}
