use std::rc::Rc;

use crate::lua_value::{LuaString, LuaThread, LuaType, LuaValue};
use crate::lua_vm::{CFunction, LuaState};

impl LuaState {
    /// Copy of the value at `idx`; nil for invalid indices.
    pub fn to_value(&self, idx: i32) -> LuaValue {
        self.index_to_value(idx)
    }

    /// Type at `idx`, `LuaType::None` for an invalid index.
    pub fn type_of(&self, idx: i32) -> LuaType {
        if self.is_valid_index(idx) {
            self.index_to_value(idx).type_of()
        } else {
            LuaType::None
        }
    }

    pub fn type_name(&self, tp: LuaType) -> &'static str {
        tp.name()
    }

    pub fn is_none(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::None
    }

    pub fn is_nil(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Nil
    }

    pub fn is_none_or_nil(&self, idx: i32) -> bool {
        matches!(self.type_of(idx), LuaType::None | LuaType::Nil)
    }

    pub fn is_boolean(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Boolean
    }

    pub fn is_integer(&self, idx: i32) -> bool {
        matches!(self.index_to_value(idx), LuaValue::Integer(_))
    }

    /// True for numbers and strings convertible to numbers.
    pub fn is_number(&self, idx: i32) -> bool {
        self.index_to_value(idx).to_number().is_some()
    }

    /// True for strings and numbers.
    pub fn is_string(&self, idx: i32) -> bool {
        matches!(self.type_of(idx), LuaType::String | LuaType::Number)
    }

    pub fn is_table(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Table
    }

    pub fn is_thread(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Thread
    }

    pub fn is_function(&self, idx: i32) -> bool {
        self.type_of(idx) == LuaType::Function
    }

    pub fn is_native_function(&self, idx: i32) -> bool {
        match self.index_to_value(idx) {
            LuaValue::Function(f) => f.is_native(),
            _ => false,
        }
    }

    pub fn to_boolean(&self, idx: i32) -> bool {
        self.index_to_value(idx).to_boolean()
    }

    /// Integer value at `idx`, with float and string conversion.
    pub fn to_integerx(&self, idx: i32) -> Option<i64> {
        self.index_to_value(idx).to_integer()
    }

    /// Like `to_integerx` but 0 when the value does not convert.
    pub fn to_integer(&self, idx: i32) -> i64 {
        self.to_integerx(idx).unwrap_or(0)
    }

    pub fn to_numberx(&self, idx: i32) -> Option<f64> {
        self.index_to_value(idx).to_number()
    }

    pub fn to_number(&self, idx: i32) -> f64 {
        self.to_numberx(idx).unwrap_or(0.0)
    }

    /// String at `idx`. A number is converted and the slot is updated to
    /// hold the resulting string.
    pub fn to_string(&mut self, idx: i32) -> Option<LuaString> {
        let value = self.index_to_value(idx);
        match value {
            LuaValue::String(s) => Some(s),
            LuaValue::Integer(_) | LuaValue::Float(_) => {
                let s = value.to_lua_string()?;
                self.set_index_value(idx, LuaValue::String(s.clone()));
                Some(s)
            }
            _ => None,
        }
    }

    pub fn to_native_function(&self, idx: i32) -> Option<CFunction> {
        match self.index_to_value(idx) {
            LuaValue::Function(f) => f.native(),
            _ => None,
        }
    }

    pub fn to_thread(&self, idx: i32) -> Option<Rc<LuaThread>> {
        match self.index_to_value(idx) {
            LuaValue::Thread(t) => Some(t),
            _ => None,
        }
    }

    /// Raw length: bytes of a string, border of a table, 0 otherwise.
    pub fn raw_len(&self, idx: i32) -> usize {
        match self.index_to_value(idx) {
            LuaValue::String(s) => s.len(),
            LuaValue::Table(t) => t.borrow().length().max(0) as usize,
            _ => 0,
        }
    }

    /// Identity of a reference value, for hashing and debugging only.
    pub fn to_pointer(&self, idx: i32) -> Option<usize> {
        self.index_to_value(idx).to_pointer()
    }
}
