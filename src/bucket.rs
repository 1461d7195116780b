//! Named value collections for store rows.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::value::{Asset, ScalarValue};

/// An ordered collection of named scalar values, one store row's worth.
///
/// Keys are kept sorted so the wire encoding of a bucket is deterministic
/// regardless of insertion order.
///
/// # Examples
///
/// ```
/// use syncbell::{ScalarValue, ValuesBucket};
///
/// let mut row = ValuesBucket::new();
/// row.put_int64("id", 7);
/// row.put_text("name", "alice");
/// assert_eq!(row.get("id"), Some(&ScalarValue::Int64(7)));
/// assert_eq!(row.len(), 2);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ValuesBucket {
    values: BTreeMap<String, ScalarValue>,
}

impl ValuesBucket {
    /// Creates an empty bucket.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of named values in the bucket.
    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if the bucket holds no values.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Inserts a value under the given name, replacing any previous value.
    pub fn put(&mut self, name: impl Into<String>, value: impl Into<ScalarValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Inserts an explicit null.
    pub fn put_null(&mut self, name: impl Into<String>) {
        self.put(name, ScalarValue::Null);
    }

    pub fn put_bool(&mut self, name: impl Into<String>, value: bool) {
        self.put(name, value);
    }

    pub fn put_int32(&mut self, name: impl Into<String>, value: i32) {
        self.put(name, value);
    }

    pub fn put_int64(&mut self, name: impl Into<String>, value: i64) {
        self.put(name, value);
    }

    pub fn put_double(&mut self, name: impl Into<String>, value: f64) {
        self.put(name, value);
    }

    pub fn put_text(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.put(name, value.into());
    }

    pub fn put_blob(&mut self, name: impl Into<String>, value: Vec<u8>) {
        self.put(name, value);
    }

    pub fn put_asset(&mut self, name: impl Into<String>, value: Asset) {
        self.put(name, value);
    }

    /// Looks up a value by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&ScalarValue> {
        self.values.get(name)
    }

    /// Returns true if the bucket holds a value under the given name.
    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Removes a value by name, returning it if present.
    pub fn remove(&mut self, name: &str) -> Option<ScalarValue> {
        self.values.remove(name)
    }

    /// Removes all values.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Iterates name/value pairs in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ScalarValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, ScalarValue)> for ValuesBucket {
    fn from_iter<T: IntoIterator<Item = (String, ScalarValue)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for ValuesBucket {
    type Item = (String, ScalarValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ScalarValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.values.into_iter()
    }
}
