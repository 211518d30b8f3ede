use crate::lua_value::LuaValue;
use crate::lua_value::lua_number::parse_number;
use crate::lua_vm::{LuaError, LuaResult, LuaState};

impl LuaState {
    /// Pushes the length of the value at `idx` (the `#` operator).
    pub fn len(&mut self, idx: i32) -> LuaResult<()> {
        let value = self.index_to_value(idx);
        let n = self.length_of(&value)?;
        self.push(n);
        Ok(())
    }

    /// Concatenates the top `n` values, right to left, leaving the result.
    /// `n == 0` pushes the empty string.
    pub fn concat(&mut self, n: usize) -> LuaResult<()> {
        if n == 0 {
            self.push(LuaValue::from(""));
            return Ok(());
        }
        for _ in 1..n {
            let b = self.pop_value();
            let a = self.pop_value();
            let joined = self.concat_pair(&a, &b)?;
            self.push(joined);
        }
        Ok(())
    }

    /// Pops a key and pushes the next key/value pair of the table at `idx`;
    /// false (nothing pushed) once traversal is over.
    pub fn next(&mut self, idx: i32) -> LuaResult<bool> {
        let t = self.table_at(idx)?;
        let key = self.pop_value();
        let next = t.borrow_mut().next_key(&key);
        match next {
            Ok(Some(k)) => {
                let v = t.borrow().get(&k);
                self.push(k);
                self.push(v);
                Ok(true)
            }
            Ok(None) => Ok(false),
            Err(e) => Err(self.rt_error(e)),
        }
    }

    /// Pops the error object and returns it as an error to propagate.
    pub fn error(&mut self) -> LuaError {
        LuaError::Runtime(self.pop_value())
    }

    /// Pushes the number denoted by `s`; false if `s` is not a numeral.
    pub fn string_to_number(&mut self, s: &str) -> bool {
        match parse_number(s.as_bytes()) {
            Some(n) => {
                self.push(n);
                true
            }
            None => false,
        }
    }
}
