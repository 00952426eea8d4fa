// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use seren_core::math::Vec3;
use std::collections::HashMap;

/// A value stored in an object's [`CustomData`].
#[derive(Debug, Clone, PartialEq)]
pub enum CustomValue {
    /// A flag.
    Bool(bool),
    /// A signed integer.
    Int(i64),
    /// A floating point number.
    Float(f64),
    /// A string.
    Text(String),
    /// A vector.
    Vec3(Vec3),
}

impl From<bool> for CustomValue {
    fn from(value: bool) -> Self {
        CustomValue::Bool(value)
    }
}

impl From<i64> for CustomValue {
    fn from(value: i64) -> Self {
        CustomValue::Int(value)
    }
}

impl From<f64> for CustomValue {
    fn from(value: f64) -> Self {
        CustomValue::Float(value)
    }
}

impl From<&str> for CustomValue {
    fn from(value: &str) -> Self {
        CustomValue::Text(value.to_owned())
    }
}

impl From<String> for CustomValue {
    fn from(value: String) -> Self {
        CustomValue::Text(value)
    }
}

impl From<Vec3> for CustomValue {
    fn from(value: Vec3) -> Self {
        CustomValue::Vec3(value)
    }
}

/// Free-form key/value data attached to a scene object.
///
/// Filters and behaviors use it to tag objects without a dedicated field.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CustomData {
    values: HashMap<String, CustomValue>,
}

impl CustomData {
    /// Creates an empty bag.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores `value` under `key`, returning the previous value.
    pub fn set(
        &mut self,
        key: impl Into<String>,
        value: impl Into<CustomValue>,
    ) -> Option<CustomValue> {
        self.values.insert(key.into(), value.into())
    }

    /// Returns the value stored under `key`.
    pub fn get(&self, key: &str) -> Option<&CustomValue> {
        self.values.get(key)
    }

    /// Removes and returns the value stored under `key`.
    pub fn remove(&mut self, key: &str) -> Option<CustomValue> {
        self.values.remove(key)
    }

    /// Returns true if a value is stored under `key`.
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Returns the flag stored under `key`, if it is one.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        match self.values.get(key)? {
            CustomValue::Bool(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the integer stored under `key`, if it is one.
    pub fn get_int(&self, key: &str) -> Option<i64> {
        match self.values.get(key)? {
            CustomValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// Returns the number stored under `key`. Integers are widened.
    pub fn get_float(&self, key: &str) -> Option<f64> {
        match self.values.get(key)? {
            CustomValue::Float(v) => Some(*v),
            CustomValue::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    /// Returns the string stored under `key`, if it is one.
    pub fn get_text(&self, key: &str) -> Option<&str> {
        match self.values.get(key)? {
            CustomValue::Text(v) => Some(v),
            _ => None,
        }
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if no entry is stored.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterates over every entry, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &CustomValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}
