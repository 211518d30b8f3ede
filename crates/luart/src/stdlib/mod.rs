// Standard libraries available to scripts: the base functions and the
// coroutine table

pub mod basic;
pub mod coroutine;

use crate::lua_vm::{CFunction, LuaResult, LuaState};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stdlib {
    Basic,
    Coroutine,

    All,
}

const LOADED_LIBS: &[(&str, CFunction, Stdlib)] = &[
    ("_G", basic::open_base, Stdlib::Basic),
    ("coroutine", coroutine::open_coroutine, Stdlib::Coroutine),
];

impl LuaState {
    /// Opens every standard library into the globals table.
    pub fn open_libs(&mut self) -> LuaResult<()> {
        self.open_stdlib(Stdlib::All)
    }

    /// Opens one library (or all), registering it in the loaded-modules
    /// table and as a global.
    pub fn open_stdlib(&mut self, lib: Stdlib) -> LuaResult<()> {
        for (name, openf, kind) in LOADED_LIBS {
            if lib == Stdlib::All || lib == *kind {
                self.require_f(name, *openf, true)?;
                self.pop(1);
            }
        }
        Ok(())
    }
}
