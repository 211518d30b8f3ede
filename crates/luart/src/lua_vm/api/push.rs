use std::rc::Rc;

use crate::lua_value::{LuaClosure, LuaString, LuaUpvalue, LuaValue};
use crate::lua_vm::{CFunction, LuaState};

impl LuaState {
    pub fn push_nil(&mut self) {
        self.push(LuaValue::Nil);
    }

    pub fn push_boolean(&mut self, b: bool) {
        self.push(LuaValue::Boolean(b));
    }

    pub fn push_integer(&mut self, n: i64) {
        self.push(LuaValue::Integer(n));
    }

    pub fn push_number(&mut self, n: f64) {
        self.push(LuaValue::Float(n));
    }

    pub fn push_string(&mut self, s: impl Into<LuaString>) {
        self.push(LuaValue::String(s.into()));
    }

    /// Pushes an already formatted message; use with `format!`.
    pub fn push_fstring(&mut self, s: String) {
        self.push(LuaValue::from(s));
    }

    pub fn push_native_function(&mut self, f: CFunction) {
        self.push_native_closure(f, 0);
    }

    /// Pops `n` values and pushes a native closure holding them as its
    /// upvalues, reachable through `lua_upvalue_index(1..=n)`.
    pub fn push_native_closure(&mut self, f: CFunction, n: usize) {
        let upvalues = self
            .frame_mut()
            .pop_n(n)
            .into_iter()
            .map(|v| Rc::new(LuaUpvalue::new_closed(v)))
            .collect();
        self.push(LuaValue::Function(Rc::new(LuaClosure::new_native(f, upvalues))));
    }

    pub fn push_global_table(&mut self) {
        let globals = self.vm.globals();
        self.push(globals);
    }

    /// Pushes this state's thread; true if it is the main thread.
    pub fn push_thread(&mut self) -> bool {
        match self.thread() {
            Some(t) => {
                let is_main = t.is_main();
                self.push(LuaValue::Thread(t));
                is_main
            }
            None => {
                self.push(LuaValue::Nil);
                false
            }
        }
    }
}
