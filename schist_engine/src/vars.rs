//! Variable storage: global scalars plus named lists.
//!
//! Scripts write `{kills}` for a scalar and `{kills::*}` for a list; local
//! variables (`{_x}`) live in a second `VarStore` owned by the event
//! context, so delays carry them along while globals stay shared.

use std::collections::BTreeMap;

use schist_data::Value;

/// Equality used by list removal and variable comparison. `Value` is
/// `PartialEq`; NaN never equals anything, which is what scripts expect.
fn values_eq(a: &Value, b: &Value) -> bool {
    a == b
}

#[derive(Debug, Default, Clone)]
pub struct VarStore {
    scalars: BTreeMap<String, Value>,
    lists: BTreeMap<String, Vec<Value>>,
}

impl VarStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.scalars.get(name)
    }

    pub fn set(&mut self, name: &str, value: Value) {
        self.scalars.insert(name.to_string(), value);
    }

    pub fn delete(&mut self, name: &str) {
        self.scalars.remove(name);
    }

    pub fn list(&self, name: &str) -> &[Value] {
        self.lists.get(name).map_or(&[], Vec::as_slice)
    }

    pub fn set_list(&mut self, name: &str, values: Vec<Value>) {
        self.lists.insert(name.to_string(), values);
    }

    pub fn push(&mut self, name: &str, value: Value) {
        self.lists.entry(name.to_string()).or_default().push(value);
    }

    /// Remove the first element equal to `value`, if any.
    pub fn remove_value(&mut self, name: &str, value: &Value) {
        if let Some(list) = self.lists.get_mut(name) {
            if let Some(pos) = list.iter().position(|v| values_eq(v, value)) {
                list.remove(pos);
            }
        }
    }

    pub fn delete_list(&mut self, name: &str) {
        self.lists.remove(name);
    }

    pub fn is_empty(&self) -> bool {
        self.scalars.is_empty() && self.lists.is_empty()
    }

    /// Scalar entries in name order, for the console `vars` listing.
    pub fn scalars(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.scalars.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// List entries in name order.
    pub fn lists(&self) -> impl Iterator<Item = (&str, &[Value])> {
        self.lists.iter().map(|(k, v)| (k.as_str(), v.as_slice()))
    }
}
