// Basic library (_G global functions)
// Implements: print, type, assert, error, tonumber, tostring, select,
// ipairs, pairs, next, pcall, xpcall, getmetatable, setmetatable, rawget,
// rawset, rawlen, rawequal
use std::io::Write;

use crate::lua_value::LuaType;
use crate::lua_value::lua_number::parse_number;
use crate::lua_vm::{CFunction, LuaResult, LuaState, TmKind};

const BASE_FUNCS: &[(&str, CFunction)] = &[
    ("assert", lua_assert),
    ("error", lua_error),
    ("getmetatable", lua_getmetatable),
    ("ipairs", lua_ipairs),
    ("next", lua_next),
    ("pairs", lua_pairs),
    ("pcall", lua_pcall),
    ("print", lua_print),
    ("rawequal", lua_rawequal),
    ("rawget", lua_rawget),
    ("rawlen", lua_rawlen),
    ("rawset", lua_rawset),
    ("select", lua_select),
    ("setmetatable", lua_setmetatable),
    ("tonumber", lua_tonumber),
    ("tostring", lua_tostring),
    ("type", lua_type),
    ("xpcall", lua_xpcall),
];

/// Opens the base library into the globals table and returns that table.
pub fn open_base(l: &mut LuaState) -> LuaResult<usize> {
    l.push_global_table();
    l.push_global_table();
    l.set_field(-2, "_G")?;
    l.set_funcs(BASE_FUNCS, 0)?;
    l.push_string("Lua 5.3");
    l.set_field(-2, "_VERSION")?;
    Ok(1)
}

/// print(...) - Print values to stdout, converted with tostring
fn lua_print(l: &mut LuaState) -> LuaResult<usize> {
    let n = l.get_top();
    let mut line = Vec::new();
    for i in 1..=n {
        let s = l.to_string_meta(i)?;
        if i > 1 {
            line.push(b'\t');
        }
        line.extend_from_slice(s.as_bytes());
        l.pop(1);
    }
    line.push(b'\n');
    let mut out = std::io::stdout().lock();
    // write errors are not reported to scripts
    let _ = out.write_all(&line);
    let _ = out.flush();
    Ok(0)
}

/// type(v) - Name of the type of v
fn lua_type(l: &mut LuaState) -> LuaResult<usize> {
    l.check_any(1)?;
    let name = l.type_name(l.type_of(1));
    l.push_string(name);
    Ok(1)
}

/// tostring(v)
fn lua_tostring(l: &mut LuaState) -> LuaResult<usize> {
    l.check_any(1)?;
    l.to_string_meta(1)?;
    Ok(1)
}

/// tonumber(e [, base])
fn lua_tonumber(l: &mut LuaState) -> LuaResult<usize> {
    if l.is_none_or_nil(2) {
        if l.type_of(1) == LuaType::Number {
            l.set_top(1);
            return Ok(1);
        }
        if let Some(s) = l.to_value(1).as_lua_string() {
            if let Some(n) = parse_number(s.as_bytes()) {
                l.push(n);
                return Ok(1);
            }
        }
        l.check_any(1)?;
    } else {
        let base = l.check_integer(2)?;
        l.check_type(1, LuaType::String)?;
        l.arg_check((2..=36).contains(&base), 2, "base out of range")?;
        if let Some(s) = l.to_value(1).as_lua_string() {
            if let Some(n) = str_to_int(s.as_bytes(), base) {
                l.push_integer(n);
                return Ok(1);
            }
        }
    }
    l.push_nil();
    Ok(1)
}

/// Integer numeral in `base`, surrounded by optional whitespace.
fn str_to_int(s: &[u8], base: i64) -> Option<i64> {
    let s = s.trim_ascii();
    let (neg, digits) = match s.first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    if digits.is_empty() {
        return None;
    }
    let mut n: i64 = 0;
    for &c in digits {
        let d = match c {
            b'0'..=b'9' => (c - b'0') as i64,
            b'a'..=b'z' => (c - b'a') as i64 + 10,
            b'A'..=b'Z' => (c - b'A') as i64 + 10,
            _ => return None,
        };
        if d >= base {
            return None;
        }
        n = n.wrapping_mul(base).wrapping_add(d);
    }
    Some(if neg { n.wrapping_neg() } else { n })
}

/// rawget(t, k)
fn lua_rawget(l: &mut LuaState) -> LuaResult<usize> {
    l.check_type(1, LuaType::Table)?;
    l.check_any(2)?;
    l.set_top(2);
    l.raw_get(1)?;
    Ok(1)
}

/// rawset(t, k, v) - returns t
fn lua_rawset(l: &mut LuaState) -> LuaResult<usize> {
    l.check_type(1, LuaType::Table)?;
    l.check_any(2)?;
    l.check_any(3)?;
    l.set_top(3);
    l.raw_set(1)?;
    Ok(1)
}

/// rawequal(a, b)
fn lua_rawequal(l: &mut LuaState) -> LuaResult<usize> {
    l.check_any(1)?;
    l.check_any(2)?;
    let eq = l.raw_equal(1, 2);
    l.push_boolean(eq);
    Ok(1)
}

/// rawlen(v) - length of a table or string without __len
fn lua_rawlen(l: &mut LuaState) -> LuaResult<usize> {
    let tp = l.type_of(1);
    l.arg_check(
        tp == LuaType::Table || tp == LuaType::String,
        1,
        "table or string expected",
    )?;
    let n = l.raw_len(1);
    l.push_integer(n as i64);
    Ok(1)
}

/// setmetatable(t, mt) - returns t
fn lua_setmetatable(l: &mut LuaState) -> LuaResult<usize> {
    l.check_type(1, LuaType::Table)?;
    let tp = l.type_of(2);
    l.arg_check(
        tp == LuaType::Nil || tp == LuaType::Table,
        2,
        "nil or table expected",
    )?;
    if l.get_metafield(1, TmKind::Metatable.name()) != LuaType::Nil {
        return Err(l.caller_error("cannot change a protected metatable"));
    }
    l.set_top(2);
    l.set_metatable(1)?;
    Ok(1)
}

/// getmetatable(v) - the `__metatable` field when present
fn lua_getmetatable(l: &mut LuaState) -> LuaResult<usize> {
    l.check_any(1)?;
    if !l.get_metatable(1) {
        l.push_nil();
        return Ok(1);
    }
    l.get_metafield(1, TmKind::Metatable.name());
    Ok(1)
}

/// next(t [, k])
fn lua_next(l: &mut LuaState) -> LuaResult<usize> {
    l.check_type(1, LuaType::Table)?;
    l.set_top(2);
    if l.next(1)? {
        Ok(2)
    } else {
        l.push_nil();
        Ok(1)
    }
}

/// pairs(t) - `__pairs(t)` when defined, else next, t, nil
fn lua_pairs(l: &mut LuaState) -> LuaResult<usize> {
    l.check_any(1)?;
    if l.get_metafield(1, TmKind::Pairs.name()) == LuaType::Nil {
        l.push_native_function(lua_next);
        l.push_value(1);
        l.push_nil();
    } else {
        l.push_value(1);
        l.call(1, 3)?;
    }
    Ok(3)
}

fn ipairs_aux(l: &mut LuaState) -> LuaResult<usize> {
    let i = l.check_integer(2)?.wrapping_add(1);
    l.push_integer(i);
    if l.get_i(1, i)? == LuaType::Nil {
        Ok(1)
    } else {
        Ok(2)
    }
}

/// ipairs(t) - iterates t[1], t[2], ... up to the first nil
fn lua_ipairs(l: &mut LuaState) -> LuaResult<usize> {
    l.check_any(1)?;
    l.push_native_function(ipairs_aux);
    l.push_value(1);
    l.push_integer(0);
    Ok(3)
}

/// select(n, ...) / select('#', ...)
fn lua_select(l: &mut LuaState) -> LuaResult<usize> {
    let n = l.get_top() as i64;
    if let Some(s) = l.to_value(1).as_lua_string() {
        if s.as_bytes().first() == Some(&b'#') {
            l.push_integer(n - 1);
            return Ok(1);
        }
    }
    let mut i = l.check_integer(1)?;
    if i < 0 {
        i += n;
    } else if i > n {
        i = n;
    }
    l.arg_check(1 <= i, 1, "index out of range")?;
    Ok((n - i) as usize)
}

/// error(message [, level])
fn lua_error(l: &mut LuaState) -> LuaResult<usize> {
    let level = l.opt_integer(2, 1)?;
    l.set_top(1);
    if l.type_of(1) == LuaType::String && level > 0 {
        let location = l.where_(level as usize);
        l.push_string(location);
        l.insert(1);
        l.concat(2)?;
    }
    Err(l.error())
}

/// assert(v [, message, ...]) - returns all its arguments when v is true
fn lua_assert(l: &mut LuaState) -> LuaResult<usize> {
    if l.to_boolean(1) {
        return Ok(l.get_top() as usize);
    }
    l.check_any(1)?;
    l.remove(1);
    l.push_string("assertion failed!");
    l.set_top(1);
    lua_error(l)
}

/// pcall(f, ...) - true plus results, or false plus the error object
fn lua_pcall(l: &mut LuaState) -> LuaResult<usize> {
    l.check_any(1)?;
    l.protected_call(None)
}

/// xpcall(f, msgh, ...) - like pcall, errors pass through msgh
fn lua_xpcall(l: &mut LuaState) -> LuaResult<usize> {
    l.check_type(2, LuaType::Function)?;
    let handler = l.to_value(2);
    l.remove(2);
    l.protected_call(Some(handler))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_str_to_int() {
        assert_eq!(str_to_int(b"ff", 16), Some(255));
        assert_eq!(str_to_int(b"  -101 ", 2), Some(-5));
        assert_eq!(str_to_int(b"z", 36), Some(35));
        assert_eq!(str_to_int(b"8", 8), None);
        assert_eq!(str_to_int(b"", 10), None);
        assert_eq!(str_to_int(b"1.5", 10), None);
    }
}
