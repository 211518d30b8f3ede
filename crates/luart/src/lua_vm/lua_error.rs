use thiserror::Error;

use crate::lua_value::LuaValue;

/// Errors raised while running Lua code or manipulating a state.
///
/// Message-carrying variants already include the `source:line:` prefix when
/// they were raised by a bytecode frame with line info.
#[derive(Debug, Clone, Error)]
pub enum LuaError {
    /// Wrong operand type for an operation (calling or indexing a nil, ...).
    #[error("{0}")]
    TypeError(String),

    /// Operand of an arithmetic or bitwise operator cannot be coerced.
    #[error("{0}")]
    ArithmeticError(String),

    /// Indexing a value that is neither a table nor has `__index`/`__newindex`.
    #[error("{0}")]
    IndexError(String),

    /// Ordering two values with no numeric, string or metamethod comparison.
    #[error("{0}")]
    ComparisonError(String),

    /// Register window or frame depth exhausted.
    #[error("{0}")]
    StackOverflow(String),

    /// Nil or NaN used as a table key.
    #[error("{0}")]
    InvalidKey(String),

    /// A key passed to `next` is no longer part of the table.
    #[error("invalid key to 'next'")]
    InvalidIterationKey,

    /// Error raised with an arbitrary value (`error(v)` or a host error).
    #[error("{}", describe(.0))]
    Runtime(LuaValue),

    /// The message handler of a protected call failed.
    #[error("error in error handling")]
    ErrorInErrorHandling,

    #[error("not enough memory")]
    Memory,

    /// Coroutine suspension travelling up to the resume boundary; never
    /// escapes a resume.
    #[error("attempt to yield from outside a coroutine")]
    Yield,
}

fn describe(value: &LuaValue) -> String {
    match value {
        LuaValue::String(s) => s.to_string(),
        LuaValue::Integer(_) | LuaValue::Float(_) => value.to_string(),
        other => format!("(error object is a {} value)", other.type_name()),
    }
}

impl LuaError {
    /// The error object a protected call leaves on the stack.
    pub fn into_value(self) -> LuaValue {
        match self {
            LuaError::Runtime(value) => value,
            other => LuaValue::from(other.to_string()),
        }
    }

    /// Status code a protected boundary reports for this error.
    pub fn status(&self) -> LuaStatus {
        match self {
            LuaError::ErrorInErrorHandling => LuaStatus::ErrorInErrorHandling,
            LuaError::Memory => LuaStatus::MemoryError,
            LuaError::Yield => LuaStatus::Yield,
            _ => LuaStatus::RuntimeError,
        }
    }

    /// Prepends a location prefix to message-carrying variants.
    pub(crate) fn with_location(self, location: Option<String>) -> Self {
        let Some(loc) = location else {
            return self;
        };
        match self {
            LuaError::TypeError(m) => LuaError::TypeError(format!("{} {}", loc, m)),
            LuaError::ArithmeticError(m) => LuaError::ArithmeticError(format!("{} {}", loc, m)),
            LuaError::IndexError(m) => LuaError::IndexError(format!("{} {}", loc, m)),
            LuaError::ComparisonError(m) => LuaError::ComparisonError(format!("{} {}", loc, m)),
            LuaError::StackOverflow(m) => LuaError::StackOverflow(format!("{} {}", loc, m)),
            LuaError::InvalidKey(m) => LuaError::InvalidKey(format!("{} {}", loc, m)),
            other => other,
        }
    }
}

pub type LuaResult<T> = Result<T, LuaError>;

/// Thread and protected-call status codes, numbered as in `lua.h`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum LuaStatus {
    Ok = 0,
    Yield = 1,
    RuntimeError = 2,
    SyntaxError = 3,
    MemoryError = 4,
    ErrorInErrorHandling = 6,
    FileError = 7,
}

impl LuaStatus {
    pub fn is_ok(self) -> bool {
        self == LuaStatus::Ok
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_values() {
        let err = LuaError::Runtime(LuaValue::Integer(42));
        assert_eq!(err.to_string(), "42");
        assert_eq!(err.into_value(), LuaValue::Integer(42));

        let err = LuaError::TypeError("attempt to call a nil value".to_string())
            .with_location(Some("main.lua:3:".to_string()));
        assert_eq!(
            err.into_value(),
            LuaValue::from("main.lua:3: attempt to call a nil value")
        );
        assert_eq!(LuaError::InvalidIterationKey.status(), LuaStatus::RuntimeError);
        assert_eq!(LuaStatus::ErrorInErrorHandling as i32, 6);
    }
}
