use crate::lua_vm::{LuaResult, LuaState};

/// Comparison operators accepted by `compare`, numbered as `LUA_OP*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum CompareOp {
    Eq = 0,
    Lt,
    Le,
}

impl LuaState {
    /// Compares the values at two indices, honoring metamethods. Invalid
    /// indices compare false.
    pub fn compare(&mut self, idx1: i32, idx2: i32, op: CompareOp) -> LuaResult<bool> {
        if !self.is_valid_index(idx1) || !self.is_valid_index(idx2) {
            return Ok(false);
        }
        let a = self.index_to_value(idx1);
        let b = self.index_to_value(idx2);
        match op {
            CompareOp::Eq => self.equal_values(&a, &b),
            CompareOp::Lt => self.less_than(&a, &b),
            CompareOp::Le => self.less_equal(&a, &b),
        }
    }

    /// Primitive equality, without metamethods.
    pub fn raw_equal(&self, idx1: i32, idx2: i32) -> bool {
        self.is_valid_index(idx1)
            && self.is_valid_index(idx2)
            && self.index_to_value(idx1) == self.index_to_value(idx2)
    }
}
