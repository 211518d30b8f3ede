// Numeric primitives shared by the arithmetic instructions and `arith`
use crate::lua_value::LuaValue;
use crate::lua_vm::ArithOp;

/// Floor division of integers; `b` must be non-zero.
#[inline]
pub fn lua_idiv(a: i64, b: i64) -> i64 {
    if b == -1 {
        // avoids overflow of MIN / -1
        return a.wrapping_neg();
    }
    let q = a / b;
    if (a % b != 0) && ((a ^ b) < 0) { q - 1 } else { q }
}

/// Floor modulo of integers; `b` must be non-zero.
#[inline]
pub fn lua_imod(a: i64, b: i64) -> i64 {
    if b == -1 {
        return 0;
    }
    let r = a % b;
    if r != 0 && (r ^ b) < 0 { r + b } else { r }
}

/// Float modulo with the sign of the divisor.
#[inline]
pub fn lua_fmod(a: f64, b: f64) -> f64 {
    if b.is_infinite() && a.is_finite() {
        if (a >= 0.0) == (b > 0.0) {
            return a;
        }
        return b;
    }
    let m = a % b;
    if m != 0.0 && (m < 0.0) != (b < 0.0) { m + b } else { m }
}

#[inline]
pub fn lua_shiftl(x: i64, y: i64) -> i64 {
    if y <= -64 || y >= 64 {
        0
    } else if y >= 0 {
        ((x as u64) << y) as i64
    } else {
        ((x as u64) >> (-y)) as i64
    }
}

#[inline]
pub fn lua_shiftr(x: i64, y: i64) -> i64 {
    lua_shiftl(x, y.wrapping_neg())
}

/// Decodes the "floating point byte" size hints of NEWTABLE:
/// (eeeeexxx) is 1xxx * 2^(eeeee-1) when eeeee != 0, else xxx.
pub fn fb2int(x: u32) -> usize {
    if x < 8 {
        x as usize
    } else {
        let mantissa = ((x & 7) + 8) as usize;
        let exp = (x >> 3) - 1;
        if exp >= usize::BITS - 4 { usize::MAX } else { mantissa << exp }
    }
}

/// Operator applied to numeric (or numeric string) operands without
/// metamethods. `Ok(None)` means the operands do not coerce; `Err` carries
/// the message of an integer division by zero.
pub fn arith_raw(op: ArithOp, a: &LuaValue, b: &LuaValue) -> Result<Option<LuaValue>, &'static str> {
    use ArithOp::*;
    match op {
        BAnd | BOr | BXor | Shl | Shr | BNot => {
            let (Some(x), Some(y)) = (a.to_integer(), b.to_integer()) else {
                return Ok(None);
            };
            let r = match op {
                BAnd => x & y,
                BOr => x | y,
                BXor => x ^ y,
                Shl => lua_shiftl(x, y),
                Shr => lua_shiftr(x, y),
                _ => !x,
            };
            Ok(Some(LuaValue::Integer(r)))
        }
        Pow | Div => {
            let (Some(x), Some(y)) = (a.to_number(), b.to_number()) else {
                return Ok(None);
            };
            let r = if op == Pow { x.powf(y) } else { x / y };
            Ok(Some(LuaValue::Float(r)))
        }
        Add | Sub | Mul | Mod | IDiv | Unm => {
            let (Some(x), Some(y)) = (a.to_numeric(), b.to_numeric()) else {
                return Ok(None);
            };
            if let (LuaValue::Integer(x), LuaValue::Integer(y)) = (&x, &y) {
                let (x, y) = (*x, *y);
                let r = match op {
                    Add => x.wrapping_add(y),
                    Sub => x.wrapping_sub(y),
                    Mul => x.wrapping_mul(y),
                    Mod => {
                        if y == 0 {
                            return Err("attempt to perform 'n%0'");
                        }
                        lua_imod(x, y)
                    }
                    IDiv => {
                        if y == 0 {
                            return Err("attempt to perform 'n//0'");
                        }
                        lua_idiv(x, y)
                    }
                    _ => x.wrapping_neg(),
                };
                return Ok(Some(LuaValue::Integer(r)));
            }
            let (Some(x), Some(y)) = (x.to_number(), y.to_number()) else {
                return Ok(None);
            };
            let r = match op {
                Add => x + y,
                Sub => x - y,
                Mul => x * y,
                Mod => lua_fmod(x, y),
                IDiv => (x / y).floor(),
                _ => -x,
            };
            Ok(Some(LuaValue::Float(r)))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_floor_division_identity() {
        for a in [-7i64, -6, -1, 0, 1, 5, 7, i64::MAX, i64::MIN] {
            for b in [-3i64, -2, -1, 1, 2, 3, 7] {
                assert_eq!(
                    lua_idiv(a, b).wrapping_mul(b).wrapping_add(lua_imod(a, b)),
                    a,
                    "a={} b={}",
                    a,
                    b
                );
            }
        }
        assert_eq!(lua_idiv(7, -2), -4);
        assert_eq!(lua_imod(7, -2), -1);
        assert_eq!(lua_idiv(-7, 2), -4);
        assert_eq!(lua_imod(-7, 2), 1);
    }

    #[test]
    fn test_float_mod() {
        assert_eq!(lua_fmod(5.5, 2.0), 1.5);
        assert_eq!(lua_fmod(-5.5, 2.0), 0.5);
        assert_eq!(lua_fmod(5.0, f64::INFINITY), 5.0);
        assert_eq!(lua_fmod(-5.0, f64::INFINITY), f64::INFINITY);
    }

    #[test]
    fn test_shifts() {
        assert_eq!(lua_shiftl(1, 4), 16);
        assert_eq!(lua_shiftl(1, 64), 0);
        assert_eq!(lua_shiftr(-1, 63), 1);
        assert_eq!(lua_shiftl(16, -4), 1);
        assert_eq!(lua_shiftr(1, i64::MIN), 0);
    }

    #[test]
    fn test_fb2int() {
        assert_eq!(fb2int(0), 0);
        assert_eq!(fb2int(7), 7);
        assert_eq!(fb2int(8), 8);
        assert_eq!(fb2int(9), 9);
        assert_eq!(fb2int(0x10), 16);
        assert_eq!(fb2int(0x11), 18);
    }

    #[test]
    fn test_arith_raw_coercions() {
        let two = LuaValue::Integer(2);
        assert_eq!(
            arith_raw(ArithOp::Add, &LuaValue::from("10"), &two),
            Ok(Some(LuaValue::Integer(12)))
        );
        assert_eq!(
            arith_raw(ArithOp::Div, &LuaValue::Integer(1), &two),
            Ok(Some(LuaValue::Float(0.5)))
        );
        assert_eq!(
            arith_raw(ArithOp::Mul, &LuaValue::Float(1.5), &two),
            Ok(Some(LuaValue::Float(3.0)))
        );
        assert_eq!(
            arith_raw(ArithOp::BAnd, &LuaValue::Float(3.0), &two),
            Ok(Some(LuaValue::Integer(2)))
        );
        assert_eq!(arith_raw(ArithOp::BAnd, &LuaValue::Float(3.5), &two), Ok(None));
        assert_eq!(arith_raw(ArithOp::Add, &LuaValue::Nil, &two), Ok(None));
        assert!(arith_raw(ArithOp::IDiv, &two, &LuaValue::Integer(0)).is_err());
        assert_eq!(
            arith_raw(ArithOp::IDiv, &LuaValue::Float(7.0), &two),
            Ok(Some(LuaValue::Float(3.0)))
        );
    }
}
