use std::cell::RefCell;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::rc::Rc;

use super::lua_number::{float_to_integer, format_float, parse_number};
use super::{LuaClosure, LuaTable, LuaThread};

// Basic type tags, numbered as in lua.h
pub const LUA_TNONE: i32 = -1;
pub const LUA_TNIL: i32 = 0;
pub const LUA_TBOOLEAN: i32 = 1;
pub const LUA_TLIGHTUSERDATA: i32 = 2;
pub const LUA_TNUMBER: i32 = 3;
pub const LUA_TSTRING: i32 = 4;
pub const LUA_TTABLE: i32 = 5;
pub const LUA_TFUNCTION: i32 = 6;
pub const LUA_TUSERDATA: i32 = 7;
pub const LUA_TTHREAD: i32 = 8;
pub const LUA_NUMTAGS: usize = 9;

pub type TableRef = Rc<RefCell<LuaTable>>;
pub type FunctionRef = Rc<LuaClosure>;
pub type ThreadRef = Rc<LuaThread>;

/// Basic type of a stack slot, as reported by `type_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LuaType {
    None,
    Nil,
    Boolean,
    Number,
    String,
    Table,
    Function,
    Thread,
}

impl LuaType {
    pub fn tag(self) -> i32 {
        match self {
            LuaType::None => LUA_TNONE,
            LuaType::Nil => LUA_TNIL,
            LuaType::Boolean => LUA_TBOOLEAN,
            LuaType::Number => LUA_TNUMBER,
            LuaType::String => LUA_TSTRING,
            LuaType::Table => LUA_TTABLE,
            LuaType::Function => LUA_TFUNCTION,
            LuaType::Thread => LUA_TTHREAD,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            LuaType::None => "no value",
            LuaType::Nil => "nil",
            LuaType::Boolean => "boolean",
            LuaType::Number => "number",
            LuaType::String => "string",
            LuaType::Table => "table",
            LuaType::Function => "function",
            LuaType::Thread => "thread",
        }
    }
}

/// Immutable byte string shared by reference.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LuaString(Rc<[u8]>);

impl LuaString {
    pub fn new(bytes: &[u8]) -> Self {
        LuaString(Rc::from(bytes))
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Lossy UTF-8 view, for messages and printing.
    pub fn to_str_lossy(&self) -> std::borrow::Cow<'_, str> {
        String::from_utf8_lossy(&self.0)
    }
}

impl From<&str> for LuaString {
    fn from(s: &str) -> Self {
        LuaString::new(s.as_bytes())
    }
}

impl From<String> for LuaString {
    fn from(s: String) -> Self {
        LuaString(Rc::from(s.into_bytes().into_boxed_slice()))
    }
}

impl From<Vec<u8>> for LuaString {
    fn from(v: Vec<u8>) -> Self {
        LuaString(Rc::from(v.into_boxed_slice()))
    }
}

impl fmt::Debug for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.to_str_lossy())
    }
}

impl fmt::Display for LuaString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_str_lossy())
    }
}

/// A Lua value.
///
/// Reference types (tables, functions, threads) compare and hash by identity;
/// numbers compare by mathematical value so that `3` and `3.0` address the
/// same table slot.
#[derive(Clone, Default)]
pub enum LuaValue {
    #[default]
    Nil,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(LuaString),
    Table(TableRef),
    Function(FunctionRef),
    Thread(ThreadRef),
}

impl LuaValue {
    pub fn string(s: impl Into<LuaString>) -> Self {
        LuaValue::String(s.into())
    }

    pub fn table(t: LuaTable) -> Self {
        LuaValue::Table(Rc::new(RefCell::new(t)))
    }

    pub fn type_of(&self) -> LuaType {
        match self {
            LuaValue::Nil => LuaType::Nil,
            LuaValue::Boolean(_) => LuaType::Boolean,
            LuaValue::Integer(_) | LuaValue::Float(_) => LuaType::Number,
            LuaValue::String(_) => LuaType::String,
            LuaValue::Table(_) => LuaType::Table,
            LuaValue::Function(_) => LuaType::Function,
            LuaValue::Thread(_) => LuaType::Thread,
        }
    }

    pub fn type_name(&self) -> &'static str {
        self.type_of().name()
    }

    #[inline]
    pub fn is_nil(&self) -> bool {
        matches!(self, LuaValue::Nil)
    }

    #[inline]
    pub fn is_number(&self) -> bool {
        matches!(self, LuaValue::Integer(_) | LuaValue::Float(_))
    }

    /// `nil` and `false` are falsy, everything else is truthy.
    #[inline]
    pub fn to_boolean(&self) -> bool {
        !matches!(self, LuaValue::Nil | LuaValue::Boolean(false))
    }

    pub fn as_table(&self) -> Option<&TableRef> {
        match self {
            LuaValue::Table(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_function(&self) -> Option<&FunctionRef> {
        match self {
            LuaValue::Function(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_thread(&self) -> Option<&ThreadRef> {
        match self {
            LuaValue::Thread(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_lua_string(&self) -> Option<&LuaString> {
        match self {
            LuaValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// Numeric view with string coercion.
    pub fn to_number(&self) -> Option<f64> {
        match self {
            LuaValue::Integer(i) => Some(*i as f64),
            LuaValue::Float(f) => Some(*f),
            LuaValue::String(s) => parse_number(s.as_bytes()).and_then(|v| v.to_number()),
            _ => None,
        }
    }

    /// Integer view: floats must be integral, strings go through the number grammar.
    pub fn to_integer(&self) -> Option<i64> {
        match self {
            LuaValue::Integer(i) => Some(*i),
            LuaValue::Float(f) => float_to_integer(*f),
            LuaValue::String(s) => parse_number(s.as_bytes()).and_then(|v| v.to_integer()),
            _ => None,
        }
    }

    /// Coerces a string operand to a number value, leaving numbers untouched.
    pub fn to_numeric(&self) -> Option<LuaValue> {
        match self {
            LuaValue::Integer(_) | LuaValue::Float(_) => Some(self.clone()),
            LuaValue::String(s) => parse_number(s.as_bytes()),
            _ => None,
        }
    }

    /// String view with number coercion (numbers format like `tostring`).
    pub fn to_lua_string(&self) -> Option<LuaString> {
        match self {
            LuaValue::String(s) => Some(s.clone()),
            LuaValue::Integer(i) => {
                let mut buf = itoa::Buffer::new();
                Some(LuaString::from(buf.format(*i)))
            }
            LuaValue::Float(f) => Some(LuaString::from(format_float(*f))),
            _ => None,
        }
    }

    /// Identity address for reference values.
    pub fn to_pointer(&self) -> Option<usize> {
        match self {
            LuaValue::Table(t) => Some(Rc::as_ptr(t) as *const u8 as usize),
            LuaValue::Function(f) => Some(Rc::as_ptr(f) as *const u8 as usize),
            LuaValue::Thread(t) => Some(Rc::as_ptr(t) as *const u8 as usize),
            _ => None,
        }
    }

    /// Float keys with an exact integer value become integers.
    pub(crate) fn normalize_key(self) -> LuaValue {
        match self {
            LuaValue::Float(f) => match float_to_integer(f) {
                Some(i) => LuaValue::Integer(i),
                None => LuaValue::Float(f),
            },
            other => other,
        }
    }
}

/// Raw equality: no metamethods, mixed integer/float compare numerically.
impl PartialEq for LuaValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (LuaValue::Nil, LuaValue::Nil) => true,
            (LuaValue::Boolean(a), LuaValue::Boolean(b)) => a == b,
            (LuaValue::Integer(a), LuaValue::Integer(b)) => a == b,
            (LuaValue::Float(a), LuaValue::Float(b)) => a == b,
            (LuaValue::Integer(i), LuaValue::Float(f)) | (LuaValue::Float(f), LuaValue::Integer(i)) => {
                float_to_integer(*f) == Some(*i)
            }
            (LuaValue::String(a), LuaValue::String(b)) => a == b,
            (LuaValue::Table(a), LuaValue::Table(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Function(a), LuaValue::Function(b)) => Rc::ptr_eq(a, b),
            (LuaValue::Thread(a), LuaValue::Thread(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}

// NaN never reaches a table, so equality is reflexive for every stored key.
impl Eq for LuaValue {}

impl Hash for LuaValue {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            LuaValue::Nil => 0u8.hash(state),
            LuaValue::Boolean(b) => b.hash(state),
            LuaValue::Integer(i) => i.hash(state),
            LuaValue::Float(f) => match float_to_integer(*f) {
                Some(i) => i.hash(state),
                None => f.to_bits().hash(state),
            },
            LuaValue::String(s) => s.hash(state),
            LuaValue::Table(_) | LuaValue::Function(_) | LuaValue::Thread(_) => {
                self.to_pointer().hash(state)
            }
        }
    }
}

impl fmt::Debug for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::String(s) => write!(f, "{:?}", s),
            other => write!(f, "{}", other),
        }
    }
}

impl fmt::Display for LuaValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LuaValue::Nil => write!(f, "nil"),
            LuaValue::Boolean(b) => write!(f, "{}", b),
            LuaValue::Integer(i) => write!(f, "{}", i),
            LuaValue::Float(n) => f.write_str(&format_float(*n)),
            LuaValue::String(s) => write!(f, "{}", s),
            LuaValue::Table(_) => write!(f, "table: {:#x}", self.to_pointer().unwrap_or(0)),
            LuaValue::Function(_) => write!(f, "function: {:#x}", self.to_pointer().unwrap_or(0)),
            LuaValue::Thread(_) => write!(f, "thread: {:#x}", self.to_pointer().unwrap_or(0)),
        }
    }
}

impl From<bool> for LuaValue {
    fn from(b: bool) -> Self {
        LuaValue::Boolean(b)
    }
}

impl From<i64> for LuaValue {
    fn from(i: i64) -> Self {
        LuaValue::Integer(i)
    }
}

impl From<f64> for LuaValue {
    fn from(f: f64) -> Self {
        LuaValue::Float(f)
    }
}

impl From<&str> for LuaValue {
    fn from(s: &str) -> Self {
        LuaValue::String(LuaString::from(s))
    }
}

impl From<String> for LuaValue {
    fn from(s: String) -> Self {
        LuaValue::String(LuaString::from(s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_numeric_equality_and_hash() {
        let mut set = HashSet::new();
        set.insert(LuaValue::Integer(3));
        assert!(set.contains(&LuaValue::Float(3.0)));
        assert_eq!(LuaValue::Integer(1), LuaValue::Float(1.0));
        assert_ne!(LuaValue::Integer(1), LuaValue::from("1"));
    }

    #[test]
    fn test_truthiness() {
        assert!(!LuaValue::Nil.to_boolean());
        assert!(!LuaValue::Boolean(false).to_boolean());
        assert!(LuaValue::Integer(0).to_boolean());
        assert!(LuaValue::from("").to_boolean());
    }

    #[test]
    fn test_coercions() {
        assert_eq!(LuaValue::from(" 0x10 ").to_integer(), Some(16));
        assert_eq!(LuaValue::Float(2.5).to_integer(), None);
        assert_eq!(LuaValue::from("2.5").to_number(), Some(2.5));
        assert_eq!(
            LuaValue::Float(3.0).to_lua_string().map(|s| s.to_string()),
            Some("3.0".to_string())
        );
        assert_eq!(
            LuaValue::Integer(-7).to_lua_string().map(|s| s.to_string()),
            Some("-7".to_string())
        );
    }
}
