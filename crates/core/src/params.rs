//! Raw request query parameters.
//!
//! HTTP query strings arrive as flat `key=value` pairs. Keys shaped like
//! `field[op]` (for example `price[gte]=500`) are folded into a nested mapping
//! `field -> {op: value}` so the feature builder can see comparison payloads.

use std::collections::BTreeMap;

/// A single parameter value: either a plain scalar or a nested mapping.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParamValue {
    Scalar(String),
    Map(BTreeMap<String, String>),
}

impl ParamValue {
    pub fn as_scalar(&self) -> Option<&str> {
        match self {
            ParamValue::Scalar(s) => Some(s),
            ParamValue::Map(_) => None,
        }
    }
}

/// Parsed request parameters, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryParams {
    entries: BTreeMap<String, ParamValue>,
}

impl QueryParams {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from raw `(key, value)` pairs as decoded from a query string.
    ///
    /// A later plain value for a key replaces an earlier one; nested entries for
    /// the same field are merged.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let mut params = Self::new();
        for (key, value) in pairs {
            params.insert_raw(key.as_ref(), value.into());
        }
        params
    }

    fn insert_raw(&mut self, key: &str, value: String) {
        match split_nested(key) {
            Some((field, op)) => {
                let entry = self
                    .entries
                    .entry(field.to_string())
                    .or_insert_with(|| ParamValue::Map(BTreeMap::new()));
                if let ParamValue::Scalar(_) = entry {
                    *entry = ParamValue::Map(BTreeMap::new());
                }
                if let ParamValue::Map(map) = entry {
                    map.insert(op.to_string(), value);
                }
            }
            None => {
                self.entries.insert(key.to_string(), ParamValue::Scalar(value));
            }
        }
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.entries.get(key)
    }

    /// Plain value of `key`, if present and not a nested mapping.
    pub fn scalar(&self, key: &str) -> Option<&str> {
        self.entries.get(key).and_then(ParamValue::as_scalar)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), ParamValue::Scalar(value.into()));
    }

    pub fn remove(&mut self, key: &str) -> Option<ParamValue> {
        self.entries.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.entries.iter()
    }
}

impl IntoIterator for QueryParams {
    type Item = (String, ParamValue);
    type IntoIter = std::collections::btree_map::IntoIter<String, ParamValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.into_iter()
    }
}

impl<K: AsRef<str>, V: Into<String>> FromIterator<(K, V)> for QueryParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self::from_pairs(iter)
    }
}

/// `price[gte]` -> `("price", "gte")`.
fn split_nested(key: &str) -> Option<(&str, &str)> {
    let open = key.find('[')?;
    let inner = key[open + 1..].strip_suffix(']')?;
    let field = &key[..open];
    if field.is_empty() || inner.is_empty() || inner.contains('[') {
        return None;
    }
    Some((field, inner))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bracketed_keys_become_nested_maps() {
        let params = QueryParams::from_pairs([
            ("price[gte]", "500"),
            ("price[lt]", "1500"),
            ("difficulty", "easy"),
        ]);

        assert_eq!(params.scalar("difficulty"), Some("easy"));
        match params.get("price") {
            Some(ParamValue::Map(map)) => {
                assert_eq!(map.get("gte").map(String::as_str), Some("500"));
                assert_eq!(map.get("lt").map(String::as_str), Some("1500"));
            }
            other => panic!("expected nested map, got {other:?}"),
        }
    }

    #[test]
    fn malformed_brackets_stay_scalar() {
        let params = QueryParams::from_pairs([("price[", "1"), ("[gte]", "2"), ("a[]", "3")]);
        assert_eq!(params.scalar("price["), Some("1"));
        assert_eq!(params.scalar("[gte]"), Some("2"));
        assert_eq!(params.scalar("a[]"), Some("3"));
    }

    #[test]
    fn later_scalar_wins() {
        let params = QueryParams::from_pairs([("limit", "5"), ("limit", "10")]);
        assert_eq!(params.scalar("limit"), Some("10"));
    }
}
