use crate::lua_value::LuaValue;
use crate::lua_vm::{CFunction, LuaError, LuaResult, LuaState};

impl LuaState {
    /// `t[k] = v` with `t` at `idx`, `v` on top and `k` just below it;
    /// pops both.
    pub fn set_table(&mut self, idx: i32) -> LuaResult<()> {
        let t = self.index_to_value(idx);
        let value = self.pop_value();
        let key = self.pop_value();
        self.new_index_value(&t, key, value)
    }

    /// `t[k] = v` for a string key, popping `v`.
    pub fn set_field(&mut self, idx: i32, k: &str) -> LuaResult<()> {
        let t = self.index_to_value(idx);
        let value = self.pop_value();
        self.new_index_value(&t, LuaValue::from(k), value)
    }

    pub fn set_i(&mut self, idx: i32, i: i64) -> LuaResult<()> {
        let t = self.index_to_value(idx);
        let value = self.pop_value();
        self.new_index_value(&t, LuaValue::Integer(i), value)
    }

    /// Like `set_table` without metamethods.
    pub fn raw_set(&mut self, idx: i32) -> LuaResult<()> {
        let t = self.table_at(idx)?;
        let value = self.pop_value();
        let key = self.pop_value();
        let stored = t.borrow_mut().put(key, value);
        stored.map_err(|e| self.rt_error(e))
    }

    pub fn raw_set_i(&mut self, idx: i32, i: i64) -> LuaResult<()> {
        let t = self.table_at(idx)?;
        let value = self.pop_value();
        t.borrow_mut().put_int(i, value);
        Ok(())
    }

    /// Pops a table (or nil) and makes it the metatable of the value at
    /// `idx`. Non-table values share one metatable per type.
    pub fn set_metatable(&mut self, idx: i32) -> LuaResult<()> {
        let target = self.index_to_value(idx);
        let mt = match self.pop_value() {
            LuaValue::Nil => None,
            LuaValue::Table(t) => Some(t),
            other => {
                return Err(LuaError::TypeError(format!(
                    "table expected, got {}",
                    other.type_name()
                )));
            }
        };
        self.set_metatable_of(&target, mt);
        Ok(())
    }

    /// Pops a value into the global `name`.
    pub fn set_global(&mut self, name: &str) -> LuaResult<()> {
        let globals = self.vm.globals();
        let value = self.pop_value();
        self.new_index_value(&globals, LuaValue::from(name), value)
    }

    /// Sets the global `name` to the native function `f`.
    pub fn register(&mut self, name: &str, f: CFunction) -> LuaResult<()> {
        self.push_native_function(f);
        self.set_global(name)
    }
}
