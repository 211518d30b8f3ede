use crate::lua_vm::{LuaResult, LuaState, TmKind};

/// Operators accepted by `arith`, numbered as `LUA_OP*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ArithOp {
    Add = 0,
    Sub,
    Mul,
    Mod,
    Pow,
    Div,
    IDiv,
    BAnd,
    BOr,
    BXor,
    Shl,
    Shr,
    Unm,
    BNot,
}

impl ArithOp {
    /// Metamethod event consulted when the operands do not coerce.
    pub fn event(self) -> TmKind {
        match self {
            ArithOp::Add => TmKind::Add,
            ArithOp::Sub => TmKind::Sub,
            ArithOp::Mul => TmKind::Mul,
            ArithOp::Mod => TmKind::Mod,
            ArithOp::Pow => TmKind::Pow,
            ArithOp::Div => TmKind::Div,
            ArithOp::IDiv => TmKind::IDiv,
            ArithOp::BAnd => TmKind::Band,
            ArithOp::BOr => TmKind::Bor,
            ArithOp::BXor => TmKind::Bxor,
            ArithOp::Shl => TmKind::Shl,
            ArithOp::Shr => TmKind::Shr,
            ArithOp::Unm => TmKind::Unm,
            ArithOp::BNot => TmKind::Bnot,
        }
    }

    pub fn is_bitwise(self) -> bool {
        matches!(
            self,
            ArithOp::BAnd | ArithOp::BOr | ArithOp::BXor | ArithOp::Shl | ArithOp::Shr | ArithOp::BNot
        )
    }

    pub fn is_unary(self) -> bool {
        matches!(self, ArithOp::Unm | ArithOp::BNot)
    }
}

impl LuaState {
    /// Applies `op` to the top two values (top one for unary operators),
    /// popping them and pushing the result.
    pub fn arith(&mut self, op: ArithOp) -> LuaResult<()> {
        let b = self.pop_value();
        let a = if op.is_unary() { b.clone() } else { self.pop_value() };
        let result = self.arith_values(op, &a, &b)?;
        self.push(result);
        Ok(())
    }
}
