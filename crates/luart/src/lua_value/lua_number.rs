//! Numeric conversions shared by the VM and the API: the string-to-number
//! grammar used for coercion, float/integer conversion and `%.14g` formatting.

use super::LuaValue;

/// Converts a float to an integer when the conversion is exact.
pub fn float_to_integer(f: f64) -> Option<i64> {
    // -2^63 is representable, 2^63 is not
    if f.fract() == 0.0 && f >= -9_223_372_036_854_775_808.0 && f < 9_223_372_036_854_775_808.0 {
        Some(f as i64)
    } else {
        None
    }
}

/// Parses a numeric literal the way the lexer would, with surrounding
/// whitespace allowed. Returns an integer value when the text denotes one
/// that fits, a float otherwise.
pub fn parse_number(bytes: &[u8]) -> Option<LuaValue> {
    let text = std::str::from_utf8(bytes).ok()?.trim();
    if text.is_empty() {
        return None;
    }

    let (negative, rest) = match text.as_bytes()[0] {
        b'-' => (true, &text[1..]),
        b'+' => (false, &text[1..]),
        _ => (false, text),
    };

    if rest.len() > 1 && (rest.starts_with("0x") || rest.starts_with("0X")) {
        return parse_hex(&rest[2..], negative);
    }

    if rest.is_empty()
        || !rest
            .bytes()
            .all(|c| c.is_ascii_digit() || matches!(c, b'.' | b'e' | b'E' | b'+' | b'-'))
    {
        return None;
    }

    if rest.bytes().all(|c| c.is_ascii_digit()) {
        // decimal integers that overflow fall through to float
        if let Ok(i) = text.parse::<i64>() {
            return Some(LuaValue::Integer(i));
        }
    }

    text.parse::<f64>().ok().map(LuaValue::Float)
}

/// Hex integers wrap around on overflow; anything with a dot or a binary
/// exponent is a hex float.
fn parse_hex(digits: &str, negative: bool) -> Option<LuaValue> {
    if digits.is_empty() {
        return None;
    }
    let lower = digits.to_ascii_lowercase();
    if !lower.contains('.') && !lower.contains('p') {
        let mut value: u64 = 0;
        for c in lower.chars() {
            let d = c.to_digit(16)?;
            value = value.wrapping_mul(16).wrapping_add(d as u64);
        }
        let value = value as i64;
        return Some(LuaValue::Integer(if negative { value.wrapping_neg() } else { value }));
    }
    parse_hex_float(&lower).map(|f| LuaValue::Float(if negative { -f } else { f }))
}

fn parse_hex_float(s: &str) -> Option<f64> {
    let (mantissa, exponent) = match s.find('p') {
        Some(pos) => (&s[..pos], Some(&s[pos + 1..])),
        None => (s, None),
    };

    let mut value = 0.0f64;
    let mut seen_dot = false;
    let mut seen_digit = false;
    let mut scale = 0i32;
    for c in mantissa.chars() {
        if c == '.' {
            if seen_dot {
                return None;
            }
            seen_dot = true;
        } else {
            let d = c.to_digit(16)?;
            value = value * 16.0 + d as f64;
            seen_digit = true;
            if seen_dot {
                scale -= 4;
            }
        }
    }
    if !seen_digit {
        return None;
    }

    let exp: i32 = match exponent {
        Some(e) if e.is_empty() => return None,
        Some(e) => e.parse().ok()?,
        None => 0,
    };
    Some(value * 2f64.powi(exp + scale))
}

/// Formats a float like C's `%.14g`, appending `.0` when the result would
/// otherwise read as an integer.
pub fn format_float(f: f64) -> String {
    if f.is_nan() {
        return if f.is_sign_negative() { "-nan" } else { "nan" }.to_string();
    }
    if f.is_infinite() {
        return if f < 0.0 { "-inf" } else { "inf" }.to_string();
    }

    let mut out = format_g14(f);
    if out.bytes().all(|c| c.is_ascii_digit() || c == b'-') {
        out.push_str(".0");
    }
    out
}

fn format_g14(f: f64) -> String {
    const PRECISION: i32 = 14;
    if f == 0.0 {
        return if f.is_sign_negative() { "-0" } else { "0" }.to_string();
    }

    // Round to the significant digits first so the exponent accounts for carries.
    let sci = format!("{:.*e}", (PRECISION - 1) as usize, f);
    let (mantissa, exp) = match sci.split_once('e') {
        Some((m, e)) => (m, e.parse::<i32>().unwrap_or(0)),
        None => (sci.as_str(), 0),
    };

    if exp < -4 || exp >= PRECISION {
        let mantissa = strip_zeros(mantissa);
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{}{:02}", mantissa, sign, exp.abs())
    } else {
        let decimals = (PRECISION - 1 - exp).max(0) as usize;
        strip_zeros(&format!("{:.*}", decimals, f)).to_string()
    }
}

fn strip_zeros(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}
