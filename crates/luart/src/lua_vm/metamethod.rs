// Metamethod lookup and the slow paths of indexing, arithmetic,
// comparison, length, concatenation and tostring.

use tracing::trace;

use crate::lua_value::{LuaString, LuaValue};
use crate::lua_vm::execute::helper::arith_raw;
use crate::lua_vm::lua_limits::MAXTAGLOOP;
use crate::lua_vm::{ArithOp, LuaError, LuaResult, LuaState};

/// Metamethod events, in `ltm.h` order plus the library-level fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TmKind {
    Index,
    NewIndex,
    Len,
    Eq,
    Add,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    Band,
    Bor,
    Bxor,
    Shl,
    Shr,
    Unm,
    Bnot,
    Lt,
    Le,
    Concat,
    Call,
    ToString,
    Name,
    Pairs,
    Metatable,
}

impl TmKind {
    /// Field name looked up in the metatable.
    pub const fn name(self) -> &'static str {
        match self {
            TmKind::Index => "__index",
            TmKind::NewIndex => "__newindex",
            TmKind::Len => "__len",
            TmKind::Eq => "__eq",
            TmKind::Add => "__add",
            TmKind::Sub => "__sub",
            TmKind::Mul => "__mul",
            TmKind::Mod => "__mod",
            TmKind::Pow => "__pow",
            TmKind::Div => "__div",
            TmKind::IDiv => "__idiv",
            TmKind::Band => "__band",
            TmKind::Bor => "__bor",
            TmKind::Bxor => "__bxor",
            TmKind::Shl => "__shl",
            TmKind::Shr => "__shr",
            TmKind::Unm => "__unm",
            TmKind::Bnot => "__bnot",
            TmKind::Lt => "__lt",
            TmKind::Le => "__le",
            TmKind::Concat => "__concat",
            TmKind::Call => "__call",
            TmKind::ToString => "__tostring",
            TmKind::Name => "__name",
            TmKind::Pairs => "__pairs",
            TmKind::Metatable => "__metatable",
        }
    }
}

#[inline]
fn is_concatable(v: &LuaValue) -> bool {
    matches!(
        v,
        LuaValue::String(_) | LuaValue::Integer(_) | LuaValue::Float(_)
    )
}

impl LuaState {
    /// Metatable field for `event`, nil when absent.
    pub(crate) fn get_metamethod(&self, value: &LuaValue, event: TmKind) -> LuaValue {
        match self.metatable_of(value) {
            Some(mt) => mt.borrow().get_str(event.name()),
            None => LuaValue::Nil,
        }
    }

    /// Calls `tm` with `args` on top of the current frame; returns the first
    /// result, or nil when `want_result` is false. Called from bytecode, the
    /// metamethod may yield.
    pub(crate) fn call_tm(
        &mut self,
        tm: LuaValue,
        args: &[LuaValue],
        want_result: bool,
    ) -> LuaResult<LuaValue> {
        self.frame_mut().ensure(args.len() + 1);
        self.push(tm);
        for arg in args {
            self.push(arg.clone());
        }
        let nresults = i32::from(want_result);
        if self.frame().is_lua() {
            self.call_yieldable(args.len(), nresults)?;
        } else {
            self.call(args.len(), nresults)?;
        }
        if want_result {
            Ok(self.pop_value())
        } else {
            Ok(LuaValue::Nil)
        }
    }

    /// Binary event handler: left operand first, then right.
    pub(crate) fn try_binary_tm(
        &mut self,
        a: &LuaValue,
        b: &LuaValue,
        event: TmKind,
    ) -> LuaResult<Option<LuaValue>> {
        let mut tm = self.get_metamethod(a, event);
        if tm.is_nil() {
            tm = self.get_metamethod(b, event);
        }
        if tm.is_nil() {
            return Ok(None);
        }
        trace!(event = event.name(), "calling binary metamethod");
        self.call_tm(tm, &[a.clone(), b.clone()], true).map(Some)
    }

    // ===== indexing =====

    /// `t[k]` with `__index` fallback.
    pub(crate) fn index_value(&mut self, obj: &LuaValue, key: &LuaValue) -> LuaResult<LuaValue> {
        let mut t = obj.clone();
        for _ in 0..MAXTAGLOOP {
            let tm = if let LuaValue::Table(table) = &t {
                let table = table.borrow();
                let value = table.get(key);
                if !value.is_nil() {
                    return Ok(value);
                }
                let Some(mt) = table.metatable() else {
                    return Ok(LuaValue::Nil);
                };
                let tm = mt.borrow().get_str(TmKind::Index.name());
                if tm.is_nil() {
                    return Ok(LuaValue::Nil);
                }
                tm
            } else {
                let tm = self.get_metamethod(&t, TmKind::Index);
                if tm.is_nil() {
                    return Err(self.type_error("index", &t));
                }
                tm
            };
            if let LuaValue::Function(_) = tm {
                return self.call_tm(tm, &[t, key.clone()], true);
            }
            t = tm;
        }
        Err(self.rt_error(LuaError::IndexError(
            "'__index' chain too long; possible loop".to_string(),
        )))
    }

    /// `t[k] = v` with `__newindex` fallback.
    pub(crate) fn new_index_value(
        &mut self,
        obj: &LuaValue,
        key: LuaValue,
        value: LuaValue,
    ) -> LuaResult<()> {
        let mut t = obj.clone();
        for _ in 0..MAXTAGLOOP {
            let tm = if let LuaValue::Table(table) = &t {
                let tm = {
                    let tb = table.borrow();
                    match tb.metatable() {
                        Some(mt) if tb.get(&key).is_nil() => {
                            mt.borrow().get_str(TmKind::NewIndex.name())
                        }
                        _ => LuaValue::Nil,
                    }
                };
                if tm.is_nil() {
                    let stored = table.borrow_mut().put(key, value);
                    return stored.map_err(|e| self.rt_error(e));
                }
                tm
            } else {
                let tm = self.get_metamethod(&t, TmKind::NewIndex);
                if tm.is_nil() {
                    return Err(self.type_error("index", &t));
                }
                tm
            };
            if let LuaValue::Function(_) = tm {
                self.call_tm(tm, &[t, key, value], false)?;
                return Ok(());
            }
            t = tm;
        }
        Err(self.rt_error(LuaError::IndexError(
            "'__newindex' chain too long; possible loop".to_string(),
        )))
    }

    // ===== arithmetic =====

    pub(crate) fn arith_values(
        &mut self,
        op: ArithOp,
        a: &LuaValue,
        b: &LuaValue,
    ) -> LuaResult<LuaValue> {
        match arith_raw(op, a, b) {
            Ok(Some(v)) => Ok(v),
            Err(msg) => Err(self.rt_error(LuaError::ArithmeticError(msg.to_string()))),
            Ok(None) => {
                if let Some(v) = self.try_binary_tm(a, b, op.event())? {
                    return Ok(v);
                }
                Err(self.arith_error(op, a, b))
            }
        }
    }

    fn arith_error(&self, op: ArithOp, a: &LuaValue, b: &LuaValue) -> LuaError {
        let culprit = if a.to_number().is_some() { b } else { a };
        let msg = if op.is_bitwise() {
            if a.to_number().is_some() && b.to_number().is_some() {
                "number has no integer representation".to_string()
            } else {
                format!(
                    "attempt to perform bitwise operation on a {} value",
                    culprit.type_name()
                )
            }
        } else {
            format!(
                "attempt to perform arithmetic on a {} value",
                culprit.type_name()
            )
        };
        self.rt_error(LuaError::ArithmeticError(msg))
    }

    // ===== comparison =====

    pub(crate) fn equal_values(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        match (a, b) {
            (LuaValue::Table(x), LuaValue::Table(y)) => {
                if std::rc::Rc::ptr_eq(x, y) {
                    return Ok(true);
                }
                match self.try_binary_tm(a, b, TmKind::Eq)? {
                    Some(v) => Ok(v.to_boolean()),
                    None => Ok(false),
                }
            }
            _ => Ok(a == b),
        }
    }

    pub(crate) fn less_than(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        if let Some(r) = raw_less(a, b, false) {
            return Ok(r);
        }
        match self.try_binary_tm(a, b, TmKind::Lt)? {
            Some(v) => Ok(v.to_boolean()),
            None => Err(self.compare_error(a, b)),
        }
    }

    pub(crate) fn less_equal(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<bool> {
        if let Some(r) = raw_less(a, b, true) {
            return Ok(r);
        }
        if let Some(v) = self.try_binary_tm(a, b, TmKind::Le)? {
            return Ok(v.to_boolean());
        }
        // a <= b  <=>  not (b < a); the flag survives a yield in __lt
        let level = self.frames.len() - 1;
        self.frames[level].negate_result = true;
        let res = self.try_binary_tm(b, a, TmKind::Lt);
        if !matches!(res, Err(LuaError::Yield)) {
            if let Some(frame) = self.frames.get_mut(level) {
                frame.negate_result = false;
            }
        }
        match res? {
            Some(v) => Ok(!v.to_boolean()),
            None => Err(self.compare_error(a, b)),
        }
    }

    fn compare_error(&self, a: &LuaValue, b: &LuaValue) -> LuaError {
        let (ta, tb) = (a.type_name(), b.type_name());
        let msg = if ta == tb {
            format!("attempt to compare two {} values", ta)
        } else {
            format!("attempt to compare {} with {}", ta, tb)
        };
        self.rt_error(LuaError::ComparisonError(msg))
    }

    // ===== length / concat / tostring =====

    pub(crate) fn length_of(&mut self, value: &LuaValue) -> LuaResult<LuaValue> {
        if let LuaValue::String(s) = value {
            return Ok(LuaValue::Integer(s.len() as i64));
        }
        let tm = self.get_metamethod(value, TmKind::Len);
        if !tm.is_nil() {
            return self.call_tm(tm, &[value.clone(), value.clone()], true);
        }
        match value {
            LuaValue::Table(t) => Ok(LuaValue::Integer(t.borrow().length())),
            other => Err(self.type_error("get length of", other)),
        }
    }

    /// `a .. b` for one pair of operands.
    pub(crate) fn concat_pair(&mut self, a: &LuaValue, b: &LuaValue) -> LuaResult<LuaValue> {
        if is_concatable(a) && is_concatable(b) {
            if let (Some(x), Some(y)) = (a.to_lua_string(), b.to_lua_string()) {
                let mut bytes = Vec::with_capacity(x.len() + y.len());
                bytes.extend_from_slice(x.as_bytes());
                bytes.extend_from_slice(y.as_bytes());
                return Ok(LuaValue::string(bytes));
            }
        }
        if let Some(v) = self.try_binary_tm(a, b, TmKind::Concat)? {
            return Ok(v);
        }
        let culprit = if is_concatable(a) { b } else { a };
        Err(self.type_error("concatenate", culprit))
    }

    /// `tostring` conversion honoring `__tostring` and `__name`.
    pub(crate) fn tostring_value(&mut self, value: &LuaValue) -> LuaResult<LuaString> {
        let tm = self.get_metamethod(value, TmKind::ToString);
        if !tm.is_nil() {
            return match self.call_tm(tm, &[value.clone()], true)? {
                LuaValue::String(s) => Ok(s),
                _ => Err(self.rt_error(LuaError::TypeError(
                    "'__tostring' must return a string".to_string(),
                ))),
            };
        }
        if let Some(s) = value.to_lua_string() {
            return Ok(s);
        }
        match value {
            LuaValue::Nil => Ok(LuaString::from("nil")),
            LuaValue::Boolean(b) => Ok(LuaString::from(if *b { "true" } else { "false" })),
            other => {
                let name = match self.get_metamethod(other, TmKind::Name) {
                    LuaValue::String(s) => s.to_string(),
                    _ => other.type_name().to_string(),
                };
                let addr = other.to_pointer().unwrap_or_default();
                Ok(LuaString::from(format!("{}: 0x{:08x}", name, addr)))
            }
        }
    }
}

/// Primitive ordering for number/number and string/string pairs; `None`
/// when the pair needs a metamethod.
fn raw_less(a: &LuaValue, b: &LuaValue, or_equal: bool) -> Option<bool> {
    match (a, b) {
        (LuaValue::Integer(x), LuaValue::Integer(y)) => {
            Some(if or_equal { x <= y } else { x < y })
        }
        (LuaValue::String(x), LuaValue::String(y)) => {
            let (x, y) = (x.as_bytes(), y.as_bytes());
            Some(if or_equal { x <= y } else { x < y })
        }
        _ if a.is_number() && b.is_number() => {
            let (x, y) = (a.to_number()?, b.to_number()?);
            Some(if or_equal { x <= y } else { x < y })
        }
        _ => None,
    }
}
