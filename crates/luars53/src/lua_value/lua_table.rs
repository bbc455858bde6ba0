// Lua table: array part for keys [1..n] plus a hash part for everything else
use std::collections::HashMap;

use ahash::RandomState;

use super::LuaValue;
use crate::lua_vm::{LuaError, LuaResult};

#[derive(Default)]
pub struct LuaTable {
    /// Values for integer keys [1..array.len()], never ending in nil
    pub(crate) array: Vec<LuaValue>,
    pub(crate) hash: HashMap<LuaValue, LuaValue, RandomState>,
}

impl LuaTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-sized table, as requested by NEWTABLE's size hints
    pub fn with_capacity(narr: usize, nrec: usize) -> Self {
        LuaTable {
            array: Vec::with_capacity(narr),
            hash: HashMap::with_capacity_and_hasher(nrec, RandomState::new()),
        }
    }

    /// Integer key access
    #[inline]
    pub fn get_int(&self, key: i64) -> Option<LuaValue> {
        if key > 0 {
            if let Some(val) = self.array.get((key - 1) as usize) {
                return if val.is_nil() { None } else { Some(val.clone()) };
            }
        }
        self.hash.get(&LuaValue::integer(key)).cloned()
    }

    pub fn get_str(&self, key: &str) -> Option<LuaValue> {
        self.hash.get(&LuaValue::string(key)).cloned()
    }

    pub fn raw_get(&self, key: &LuaValue) -> Option<LuaValue> {
        match normalize_key(key) {
            LuaValue::Integer(i) => self.get_int(i),
            LuaValue::Nil => None,
            other => self.hash.get(&other).cloned(),
        }
    }

    /// Integer key write; keeps the array part dense
    pub fn set_int(&mut self, key: i64, value: LuaValue) {
        let len = self.array.len();
        if key >= 1 && (key as u64) <= len as u64 {
            let idx = (key - 1) as usize;
            self.array[idx] = value;
            if idx + 1 == len {
                while self.array.last().is_some_and(LuaValue::is_nil) {
                    self.array.pop();
                }
            }
            return;
        }

        if key >= 1 && (key as u64) == len as u64 + 1 && !value.is_nil() {
            self.hash.remove(&LuaValue::integer(key));
            self.array.push(value);
            // pull any following keys out of the hash part
            let mut next = key + 1;
            while let Some(v) = self.hash.remove(&LuaValue::integer(next)) {
                self.array.push(v);
                next += 1;
            }
            return;
        }

        self.set_in_hash(LuaValue::integer(key), value);
    }

    /// Generic key write; nil and NaN keys are errors
    pub fn raw_set(&mut self, key: LuaValue, value: LuaValue) -> LuaResult<()> {
        match normalize_key(&key) {
            LuaValue::Nil => Err(LuaError::runtime("table index is nil")),
            LuaValue::Float(f) if f.is_nan() => Err(LuaError::runtime("table index is NaN")),
            LuaValue::Integer(i) => {
                self.set_int(i, value);
                Ok(())
            }
            key => {
                self.set_in_hash(key, value);
                Ok(())
            }
        }
    }

    fn set_in_hash(&mut self, key: LuaValue, value: LuaValue) {
        if value.is_nil() {
            self.hash.remove(&key);
        } else {
            self.hash.insert(key, value);
        }
    }

    /// Border of the array part (the `#` operator)
    #[inline]
    pub fn len(&self) -> usize {
        self.array.len()
    }

    pub fn is_empty(&self) -> bool {
        self.array.is_empty() && self.hash.is_empty()
    }

    /// Traversal step: the entry after `key`, array part first.
    /// A nil key starts the traversal.
    pub fn next(&self, key: &LuaValue) -> Option<(LuaValue, LuaValue)> {
        let key = normalize_key(key);
        let array_start = match key {
            LuaValue::Nil => Some(0),
            LuaValue::Integer(i) if i >= 1 && (i as u64) <= self.array.len() as u64 => Some(i as usize),
            _ => None,
        };

        if let Some(start) = array_start {
            if let Some(i) = (start..self.array.len()).find(|&j| !self.array[j].is_nil()) {
                return Some((LuaValue::integer(i as i64 + 1), self.array[i].clone()));
            }
            return self.hash.iter().next().map(|(k, v)| (k.clone(), v.clone()));
        }

        self.hash
            .iter()
            .skip_while(|(k, _)| **k != key)
            .nth(1)
            .map(|(k, v)| (k.clone(), v.clone()))
    }
}

/// Floats with an integral value index the same slot as the integer.
fn normalize_key(key: &LuaValue) -> LuaValue {
    match key {
        LuaValue::Float(f) => match super::float_to_integer(*f) {
            Some(i) => LuaValue::Integer(i),
            None => key.clone(),
        },
        _ => key.clone(),
    }
}
