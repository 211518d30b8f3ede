use crate::lua_value::{LuaTable, LuaType, LuaValue, TableRef};
use crate::lua_vm::{LuaError, LuaResult, LuaState};

impl LuaState {
    pub fn new_table(&mut self) {
        self.create_table(0, 0);
    }

    /// Pushes an empty table with room for `narr` sequence items and
    /// `nrec` other fields.
    pub fn create_table(&mut self, narr: usize, nrec: usize) {
        self.push(LuaValue::table(LuaTable::new(narr, nrec)));
    }

    /// Pops a key and pushes `t[key]`, where `t` is at `idx`.
    pub fn get_table(&mut self, idx: i32) -> LuaResult<LuaType> {
        let t = self.index_to_value(idx);
        let key = self.pop_value();
        self.push_indexed(&t, &key)
    }

    /// Pushes `t[k]` for a string key.
    pub fn get_field(&mut self, idx: i32, k: &str) -> LuaResult<LuaType> {
        let t = self.index_to_value(idx);
        self.push_indexed(&t, &LuaValue::from(k))
    }

    pub fn get_i(&mut self, idx: i32, i: i64) -> LuaResult<LuaType> {
        let t = self.index_to_value(idx);
        self.push_indexed(&t, &LuaValue::Integer(i))
    }

    /// Like `get_table` without metamethods.
    pub fn raw_get(&mut self, idx: i32) -> LuaResult<LuaType> {
        let t = self.table_at(idx)?;
        let key = self.pop_value();
        let value = t.borrow().get(&key);
        let tp = value.type_of();
        self.push(value);
        Ok(tp)
    }

    pub fn raw_get_i(&mut self, idx: i32, i: i64) -> LuaResult<LuaType> {
        let t = self.table_at(idx)?;
        let value = t.borrow().get_int(i);
        let tp = value.type_of();
        self.push(value);
        Ok(tp)
    }

    /// Pushes the metatable of the value at `idx`, if it has one.
    pub fn get_metatable(&mut self, idx: i32) -> bool {
        let value = self.index_to_value(idx);
        match self.metatable_of(&value) {
            Some(mt) => {
                self.push(LuaValue::Table(mt));
                true
            }
            None => false,
        }
    }

    /// Pushes the global `name`.
    pub fn get_global(&mut self, name: &str) -> LuaResult<LuaType> {
        let globals = self.vm.globals();
        self.push_indexed(&globals, &LuaValue::from(name))
    }

    fn push_indexed(&mut self, t: &LuaValue, key: &LuaValue) -> LuaResult<LuaType> {
        let value = self.index_value(t, key)?;
        let tp = value.type_of();
        self.push(value);
        Ok(tp)
    }

    pub(crate) fn table_at(&self, idx: i32) -> LuaResult<TableRef> {
        match self.index_to_value(idx) {
            LuaValue::Table(t) => Ok(t),
            other => Err(LuaError::TypeError(format!(
                "table expected, got {}",
                other.type_name()
            ))),
        }
    }
}
