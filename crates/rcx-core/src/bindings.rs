//! Immutable binding environment.
//!
//! A persistent linked list of `(name, value)` cells. Binding returns a new
//! environment sharing the old one; lookups walk the cells newest first. The
//! environment can be rendered as a plain [`Value`] so it stays matchable data
//! rather than a host map.

use crate::errors::{RcxError, Result};
use crate::value::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

const NAME_KEY: &str = "name";
const VALUE_KEY: &str = "value";
const REST_KEY: &str = "rest";

#[derive(Debug)]
struct Cell<V> {
    name: String,
    value: V,
    rest: Bindings<V>,
}

#[derive(Debug)]
pub struct Bindings<V = Value> {
    head: Option<Arc<Cell<V>>>,
    len: usize,
}

impl<V> Clone for Bindings<V> {
    fn clone(&self) -> Self {
        Self {
            head: self.head.clone(),
            len: self.len,
        }
    }
}

impl<V> Default for Bindings<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Bindings<V> {
    pub fn new() -> Self {
        Self { head: None, len: 0 }
    }

    /// Extend the environment. `self` is unchanged.
    pub fn bind(&self, name: impl Into<String>, value: V) -> Self {
        Self {
            head: Some(Arc::new(Cell {
                name: name.into(),
                value,
                rest: self.clone(),
            })),
            len: self.len + 1,
        }
    }

    /// Most recent value bound to `name`.
    pub fn lookup(&self, name: &str) -> Option<&V> {
        self.iter().find(|(n, _)| *n == name).map(|(_, v)| v)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// Cells newest first.
    pub fn iter(&self) -> Iter<'_, V> {
        Iter {
            cursor: self.head.as_deref(),
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Convert every bound value, keeping binding order.
    ///
    /// # Errors
    ///
    /// Returns the first error produced by `f`.
    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(&V) -> std::result::Result<U, E>,
    ) -> std::result::Result<Bindings<U>, E> {
        let cells: Vec<(&str, &V)> = self.iter().collect();
        let mut out = Bindings::new();
        for (name, value) in cells.into_iter().rev() {
            out = out.bind(name, f(value)?);
        }
        Ok(out)
    }

    pub fn map<U>(&self, mut f: impl FnMut(&V) -> U) -> Bindings<U> {
        let converted: std::result::Result<Bindings<U>, std::convert::Infallible> =
            self.try_map(|v| Ok(f(v)));
        match converted {
            Ok(bindings) => bindings,
            Err(never) => match never {},
        }
    }

    /// Visible bindings keyed by name (shadowed cells dropped).
    pub fn to_map(&self) -> BTreeMap<&str, &V> {
        let mut map = BTreeMap::new();
        for (name, value) in self.iter() {
            map.entry(name).or_insert(value);
        }
        map
    }
}

impl Bindings<Value> {
    /// Render as nested `{"name", "value", "rest"}` mappings sorted by name
    /// and terminated by null.
    pub fn to_value(&self) -> Value {
        let mut out = Value::Null;
        for (name, value) in self.to_map().into_iter().rev() {
            out = Value::map([
                (NAME_KEY, Value::sym(name)),
                (VALUE_KEY, value.clone()),
                (REST_KEY, out),
            ]);
        }
        out
    }

    /// Parse the shape produced by [`Bindings::to_value`].
    ///
    /// # Errors
    ///
    /// Returns `MalformedValue` if a cell is not a `{name, value, rest}`
    /// mapping with a string name.
    pub fn from_value(value: &Value) -> Result<Self> {
        let mut cells = Vec::new();
        let mut cursor = value;
        loop {
            match cursor {
                Value::Null => break,
                Value::Map(map) if map.len() == 3 => {
                    let name = map
                        .get(NAME_KEY)
                        .and_then(Value::as_str)
                        .ok_or_else(|| RcxError::malformed("binding cell needs a string name"))?;
                    let bound = map
                        .get(VALUE_KEY)
                        .ok_or_else(|| RcxError::malformed("binding cell needs a value"))?;
                    cursor = map
                        .get(REST_KEY)
                        .ok_or_else(|| RcxError::malformed("binding cell needs a rest"))?;
                    cells.push((name, bound));
                }
                _ => return Err(RcxError::malformed("binding cell must be null or a 3-key map")),
            }
        }

        let mut out = Bindings::new();
        for (name, bound) in cells.into_iter().rev() {
            out = out.bind(name, bound.clone());
        }
        Ok(out)
    }
}

impl<V: PartialEq> PartialEq for Bindings<V> {
    fn eq(&self, other: &Self) -> bool {
        self.to_map() == other.to_map()
    }
}

pub struct Iter<'a, V> {
    cursor: Option<&'a Cell<V>>,
}

impl<'a, V> Iterator for Iter<'a, V> {
    type Item = (&'a str, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let cell = self.cursor?;
        self.cursor = cell.rest.head.as_deref();
        Some((cell.name.as_str(), &cell.value))
    }
}
