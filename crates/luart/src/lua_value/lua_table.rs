// Hybrid array/hash table
use std::collections::HashMap;

use ahash::RandomState;

use super::lua_value::{LuaValue, TableRef};
use crate::lua_vm::{LuaError, LuaResult};

/// Lua table: a dense 1-based array part plus a hash part.
///
/// Integer keys in `1..=array.len()` always live in the array part. Storing
/// at `array.len() + 1` appends and then pulls any keys that now continue the
/// sequence out of the hash part; storing nil at the last array slot trims
/// trailing nils.
#[derive(Default)]
pub struct LuaTable {
    array: Vec<LuaValue>,
    hash: HashMap<LuaValue, LuaValue, RandomState>,
    metatable: Option<TableRef>,
    iteration: Option<IterationOrder>,
    // set whenever a key is added or removed
    changed: bool,
}

/// Snapshot of `key -> next key` links used by `next_key`; `Nil` maps to the
/// first key.
struct IterationOrder {
    links: HashMap<LuaValue, LuaValue, RandomState>,
    last_key: LuaValue,
}

impl LuaTable {
    pub fn new(narr: usize, nrec: usize) -> Self {
        LuaTable {
            array: Vec::with_capacity(narr),
            hash: HashMap::with_capacity_and_hasher(nrec, RandomState::new()),
            metatable: None,
            iteration: None,
            changed: false,
        }
    }

    pub fn metatable(&self) -> Option<TableRef> {
        self.metatable.clone()
    }

    pub fn set_metatable(&mut self, metatable: Option<TableRef>) {
        self.metatable = metatable;
    }

    /// Size of the array part, which is also the reported border.
    pub fn length(&self) -> i64 {
        self.array.len() as i64
    }

    pub fn hash_len(&self) -> usize {
        self.hash.len()
    }

    pub fn get(&self, key: &LuaValue) -> LuaValue {
        match key {
            LuaValue::Integer(i) => self.get_int(*i),
            LuaValue::Float(_) => match key.clone().normalize_key() {
                LuaValue::Integer(i) => self.get_int(i),
                other => self.hash.get(&other).cloned().unwrap_or_default(),
            },
            _ => self.hash.get(key).cloned().unwrap_or_default(),
        }
    }

    pub fn get_int(&self, key: i64) -> LuaValue {
        if key >= 1 && key as u64 <= self.array.len() as u64 {
            return self.array[(key - 1) as usize].clone();
        }
        self.hash
            .get(&LuaValue::Integer(key))
            .cloned()
            .unwrap_or_default()
    }

    pub fn get_str(&self, key: &str) -> LuaValue {
        self.hash.get(&LuaValue::from(key)).cloned().unwrap_or_default()
    }

    /// Stores `value` under `key`; a nil value removes the key.
    pub fn put(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        match key {
            LuaValue::Nil => return Err(LuaError::InvalidKey("table index is nil".to_string())),
            LuaValue::Float(f) if f.is_nan() => {
                return Err(LuaError::InvalidKey("table index is NaN".to_string()));
            }
            _ => {}
        }

        let key = key.normalize_key();
        if let LuaValue::Integer(idx) = key {
            if idx >= 1 {
                let len = self.array.len() as u64;
                let slot = idx as u64;
                if slot <= len {
                    let slot = (slot - 1) as usize;
                    if self.array[slot].is_nil() != value.is_nil() {
                        self.changed = true;
                    }
                    self.array[slot] = value;
                    if slot as u64 == len - 1 && self.array[slot].is_nil() {
                        self.shrink_array();
                    }
                    return Ok(());
                }
                if slot == len + 1 {
                    if self.hash.remove(&key).is_some() {
                        self.changed = true;
                    }
                    if !value.is_nil() {
                        self.changed = true;
                        self.array.push(value);
                        self.expand_array();
                    }
                    return Ok(());
                }
            }
        }

        if value.is_nil() {
            if self.hash.remove(&key).is_some() {
                self.changed = true;
            }
        } else if self.hash.insert(key, value).is_none() {
            self.changed = true;
        }
        Ok(())
    }

    /// Non-nil entries, array part first; hash order is unspecified.
    pub fn iter(&self) -> impl Iterator<Item = (LuaValue, LuaValue)> + '_ {
        self.array
            .iter()
            .enumerate()
            .filter(|(_, v)| !v.is_nil())
            .map(|(i, v)| (LuaValue::Integer(i as i64 + 1), v.clone()))
            .chain(self.hash.iter().map(|(k, v)| (k.clone(), v.clone())))
    }

    pub fn put_int(&mut self, key: i64, value: LuaValue) {
        // integer keys never fail validation
        let _ = self.put(LuaValue::Integer(key), value);
    }

    fn shrink_array(&mut self) {
        while matches!(self.array.last(), Some(LuaValue::Nil)) {
            self.array.pop();
        }
    }

    fn expand_array(&mut self) {
        loop {
            let next = LuaValue::Integer(self.array.len() as i64 + 1);
            match self.hash.remove(&next) {
                Some(v) => self.array.push(v),
                None => break,
            }
        }
    }

    /// Returns the key following `key` in traversal order (`Nil` starts the
    /// traversal, `Ok(None)` ends it).
    ///
    /// The order is a snapshot taken at the first call after a structural
    /// change; keys whose values were cleared since are skipped.
    pub fn next_key(&mut self, key: &LuaValue) -> LuaResult<Option<LuaValue>> {
        let key = key.clone().normalize_key();
        if self.iteration.is_none() || (key.is_nil() && self.changed) {
            self.iteration = Some(self.snapshot());
            self.changed = false;
        }
        let Some(order) = self.iteration.as_ref() else {
            return Ok(None);
        };

        let mut cursor = match order.links.get(&key) {
            Some(next) => next.clone(),
            None if key.is_nil() || key == order.last_key => return Ok(None),
            None => return Err(LuaError::InvalidIterationKey),
        };
        loop {
            if !self.get(&cursor).is_nil() {
                return Ok(Some(cursor));
            }
            match order.links.get(&cursor) {
                Some(next) => cursor = next.clone(),
                None => return Ok(None),
            }
        }
    }

    fn snapshot(&self) -> IterationOrder {
        let mut links = HashMap::with_capacity_and_hasher(
            self.array.len() + self.hash.len(),
            RandomState::new(),
        );
        let mut prev = LuaValue::Nil;
        for (i, v) in self.array.iter().enumerate() {
            if !v.is_nil() {
                let key = LuaValue::Integer(i as i64 + 1);
                links.insert(prev, key.clone());
                prev = key;
            }
        }
        for key in self.hash.keys() {
            links.insert(prev, key.clone());
            prev = key.clone();
        }
        IterationOrder {
            links,
            last_key: prev,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_get() {
        let mut t = LuaTable::new(0, 0);
        t.put(LuaValue::from("x"), LuaValue::Integer(1)).unwrap();
        t.put(LuaValue::Integer(10), LuaValue::from("ten")).unwrap();
        t.put(LuaValue::Float(2.5), LuaValue::Boolean(true)).unwrap();
        assert_eq!(t.get(&LuaValue::from("x")), LuaValue::Integer(1));
        assert_eq!(t.get(&LuaValue::Integer(10)), LuaValue::from("ten"));
        assert_eq!(t.get(&LuaValue::Float(10.0)), LuaValue::from("ten"));
        assert_eq!(t.get(&LuaValue::Float(2.5)), LuaValue::Boolean(true));
        assert!(t.get(&LuaValue::from("missing")).is_nil());
    }

    #[test]
    fn test_invalid_keys() {
        let mut t = LuaTable::new(0, 0);
        assert!(matches!(
            t.put(LuaValue::Nil, LuaValue::Integer(1)),
            Err(LuaError::InvalidKey(_))
        ));
        assert!(matches!(
            t.put(LuaValue::Float(f64::NAN), LuaValue::Integer(1)),
            Err(LuaError::InvalidKey(_))
        ));
    }

    #[test]
    fn test_array_migration_reverse_order() {
        let mut t = LuaTable::new(0, 0);
        for i in (1..=10).rev() {
            t.put_int(i, LuaValue::Integer(i * 100));
        }
        assert_eq!(t.length(), 10);
        assert_eq!(t.hash_len(), 0);
        assert_eq!(t.get_int(7), LuaValue::Integer(700));
    }

    #[test]
    fn test_array_migration_shuffled() {
        let mut t = LuaTable::new(0, 0);
        for i in [5, 3, 9, 1, 2, 8, 4, 7, 6] {
            t.put_int(i, LuaValue::Integer(i));
        }
        assert_eq!(t.length(), 9);
        assert_eq!(t.hash_len(), 0);
    }

    #[test]
    fn test_shrink_on_tail_nil() {
        let mut t = LuaTable::new(0, 0);
        for i in 1..=4 {
            t.put_int(i, LuaValue::Integer(i));
        }
        t.put_int(3, LuaValue::Nil);
        assert_eq!(t.length(), 4);
        t.put_int(4, LuaValue::Nil);
        assert_eq!(t.length(), 2);
    }

    #[test]
    fn test_next_key_visits_everything() {
        let mut t = LuaTable::new(0, 0);
        t.put_int(1, LuaValue::from("a"));
        t.put_int(2, LuaValue::from("b"));
        t.put(LuaValue::from("k"), LuaValue::from("v")).unwrap();

        let mut seen = Vec::new();
        let mut key = LuaValue::Nil;
        while let Some(next) = t.next_key(&key).unwrap() {
            seen.push(next.clone());
            key = next;
        }
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[0], LuaValue::Integer(1));
        assert_eq!(seen[1], LuaValue::Integer(2));
        assert!(seen.contains(&LuaValue::from("k")));
    }

    #[test]
    fn test_next_key_skips_cleared_entries() {
        let mut t = LuaTable::new(0, 0);
        for i in 1..=3 {
            t.put_int(i, LuaValue::Integer(i));
        }
        let first = t.next_key(&LuaValue::Nil).unwrap();
        assert_eq!(first, Some(LuaValue::Integer(1)));
        t.put_int(2, LuaValue::Nil);
        assert_eq!(
            t.next_key(&LuaValue::Integer(1)).unwrap(),
            Some(LuaValue::Integer(3))
        );
    }

    #[test]
    fn test_next_key_invalid() {
        let mut t = LuaTable::new(0, 0);
        t.put(LuaValue::from("a"), LuaValue::Integer(1)).unwrap();
        assert!(matches!(
            t.next_key(&LuaValue::from("zzz")),
            Err(LuaError::InvalidIterationKey)
        ));
    }
}
