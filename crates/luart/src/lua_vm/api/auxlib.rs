// Auxiliary library (luaL_*): argument checking, metafields, module
// registration.

use crate::lua_value::{LuaString, LuaType, LuaValue};
use crate::lua_vm::lua_limits::LUA_REGISTRYINDEX;
use crate::lua_vm::{CFunction, LuaError, LuaResult, LuaState};

/// Registry field holding the loaded modules table.
pub const LUA_LOADED_TABLE: &str = "_LOADED";

impl LuaState {
    // ===== argument errors =====

    /// Error raised by a native function, positioned at its caller.
    pub fn caller_error(&self, msg: &str) -> LuaError {
        LuaError::Runtime(LuaValue::from(format!("{}{}", self.where_(1), msg)))
    }

    /// "bad argument #arg to 'fname' (extramsg)"
    pub fn arg_error(&self, arg: i32, extramsg: &str) -> LuaError {
        let name = self.running_function_name();
        self.caller_error(&format!(
            "bad argument #{} to '{}' ({})",
            arg, name, extramsg
        ))
    }

    pub fn arg_check(&self, cond: bool, arg: i32, extramsg: &str) -> LuaResult<()> {
        if cond {
            Ok(())
        } else {
            Err(self.arg_error(arg, extramsg))
        }
    }

    fn tag_error(&self, arg: i32, expected: &str) -> LuaError {
        let value = self.index_to_value(arg);
        let actual = if !self.is_valid_index(arg) {
            "no value".to_string()
        } else {
            match self.get_metamethod(&value, crate::lua_vm::TmKind::Name) {
                LuaValue::String(s) => s.to_string(),
                _ => value.type_name().to_string(),
            }
        };
        self.arg_error(arg, &format!("{} expected, got {}", expected, actual))
    }

    /// Name under which the running native function is reachable from the
    /// globals table (`name` or `lib.name`), `?` if none.
    fn running_function_name(&self) -> String {
        let Some(current) = self.frame().closure.clone() else {
            return "?".to_string();
        };
        let target = LuaValue::Function(current);
        let LuaValue::Table(globals) = self.vm.globals() else {
            return "?".to_string();
        };
        let mut libs = Vec::new();
        for (k, v) in globals.borrow().iter() {
            if v == target {
                return k.to_string();
            }
            if let (LuaValue::String(lib), LuaValue::Table(t)) = (k, v) {
                libs.push((lib, t));
            }
        }
        for (lib, t) in libs {
            let found = t.borrow().iter().find(|(_, v)| *v == target);
            if let Some((k, _)) = found {
                return format!("{}.{}", lib, k);
            }
        }
        "?".to_string()
    }

    /// `source:line: ` of the function `level` calls below the running one
    /// (level 1 is its caller); empty when that is not a bytecode frame.
    pub fn where_(&self, level: usize) -> String {
        self.frames
            .len()
            .checked_sub(level + 1)
            .and_then(|i| self.location_at(i))
            .map(|loc| format!("{} ", loc))
            .unwrap_or_default()
    }

    // ===== argument checks =====

    pub fn check_any(&self, arg: i32) -> LuaResult<()> {
        if self.type_of(arg) == LuaType::None {
            return Err(self.arg_error(arg, "value expected"));
        }
        Ok(())
    }

    pub fn check_type(&self, arg: i32, tp: LuaType) -> LuaResult<()> {
        if self.type_of(arg) != tp {
            return Err(self.tag_error(arg, tp.name()));
        }
        Ok(())
    }

    pub fn check_integer(&self, arg: i32) -> LuaResult<i64> {
        match self.to_integerx(arg) {
            Some(n) => Ok(n),
            None if self.is_number(arg) => {
                Err(self.arg_error(arg, "number has no integer representation"))
            }
            None => Err(self.tag_error(arg, LuaType::Number.name())),
        }
    }

    pub fn check_number(&self, arg: i32) -> LuaResult<f64> {
        self.to_numberx(arg)
            .ok_or_else(|| self.tag_error(arg, LuaType::Number.name()))
    }

    pub fn check_string(&mut self, arg: i32) -> LuaResult<LuaString> {
        match self.to_string(arg) {
            Some(s) => Ok(s),
            None => Err(self.tag_error(arg, LuaType::String.name())),
        }
    }

    pub fn opt_integer(&self, arg: i32, default: i64) -> LuaResult<i64> {
        if self.is_none_or_nil(arg) {
            Ok(default)
        } else {
            self.check_integer(arg)
        }
    }

    pub fn opt_number(&self, arg: i32, default: f64) -> LuaResult<f64> {
        if self.is_none_or_nil(arg) {
            Ok(default)
        } else {
            self.check_number(arg)
        }
    }

    pub fn opt_string(&mut self, arg: i32, default: &str) -> LuaResult<LuaString> {
        if self.is_none_or_nil(arg) {
            Ok(LuaString::from(default))
        } else {
            self.check_string(arg)
        }
    }

    // ===== conversions =====

    /// Length of the value at `idx` as an integer, honoring `__len`.
    pub fn len_l(&mut self, idx: i32) -> LuaResult<i64> {
        self.len(idx)?;
        let n = self.to_integerx(-1);
        self.pop(1);
        n.ok_or_else(|| {
            self.rt_error(LuaError::TypeError(
                "object length is not an integer".to_string(),
            ))
        })
    }

    /// Converts the value at `idx` to a string in the manner of `tostring`
    /// and pushes it.
    pub fn to_string_meta(&mut self, idx: i32) -> LuaResult<LuaString> {
        let value = self.index_to_value(idx);
        let s = self.tostring_value(&value)?;
        self.push(LuaValue::String(s.clone()));
        Ok(s)
    }

    // ===== metafields =====

    /// Pushes field `event` of the metatable of the value at `obj`; returns
    /// its type, `LuaType::Nil` (nothing pushed) when absent.
    pub fn get_metafield(&mut self, obj: i32, event: &str) -> LuaType {
        let value = self.index_to_value(obj);
        let Some(mt) = self.metatable_of(&value) else {
            return LuaType::Nil;
        };
        let field = mt.borrow().get_str(event);
        if field.is_nil() {
            return LuaType::Nil;
        }
        let tp = field.type_of();
        self.push(field);
        tp
    }

    /// Calls metafield `event` of the value at `obj` with that value,
    /// pushing its single result. False (nothing pushed) without one.
    pub fn call_meta(&mut self, obj: i32, event: &str) -> LuaResult<bool> {
        let obj = self.abs_index(obj);
        if self.get_metafield(obj, event) == LuaType::Nil {
            return Ok(false);
        }
        self.push_value(obj);
        self.call(1, 1)?;
        Ok(true)
    }

    // ===== modules =====

    /// Pushes table `t[fname]` for `t` at `idx`, creating it when missing.
    /// True if it already existed.
    pub fn get_sub_table(&mut self, idx: i32, fname: &str) -> LuaResult<bool> {
        if self.get_field(idx, fname)? == LuaType::Table {
            return Ok(true);
        }
        self.pop(1);
        let idx = self.abs_index(idx);
        self.new_table();
        self.push_value(-1);
        self.set_field(idx, fname)?;
        Ok(false)
    }

    /// Opens module `modname` with `openf` unless already loaded, pushes
    /// the module and, when `glb` is set, stores it in the global of the
    /// same name.
    pub fn require_f(&mut self, modname: &str, openf: CFunction, glb: bool) -> LuaResult<()> {
        self.get_sub_table(LUA_REGISTRYINDEX, LUA_LOADED_TABLE)?;
        self.get_field(-1, modname)?;
        if !self.to_boolean(-1) {
            self.pop(1);
            self.push_native_function(openf);
            self.push_string(modname);
            self.call(1, 1)?;
            self.push_value(-1);
            self.set_field(-3, modname)?;
        }
        self.remove(-2);
        if glb {
            self.push_value(-1);
            self.set_global(modname)?;
        }
        Ok(())
    }

    /// Pushes a new table holding `funcs`.
    pub fn new_lib(&mut self, funcs: &[(&str, CFunction)]) -> LuaResult<()> {
        self.create_table(0, funcs.len());
        self.set_funcs(funcs, 0)
    }

    /// Registers `funcs` into the table below the top `nup` values, each
    /// closing over those values; pops them.
    pub fn set_funcs(&mut self, funcs: &[(&str, CFunction)], nup: usize) -> LuaResult<()> {
        let nup_i = nup as i32;
        for (name, f) in funcs {
            for _ in 0..nup {
                self.push_value(-nup_i);
            }
            self.push_native_closure(*f, nup);
            self.set_field(-(nup_i + 2), name)?;
        }
        self.pop(nup);
        Ok(())
    }
}
