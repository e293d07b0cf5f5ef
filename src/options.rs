//! Caller-supplied recipe options.
//!
//! A string key/value map with case-insensitive lookup. Keys are normalized
//! to lowercase on insert so `Width`, `WIDTH` and `width` all address the
//! same entry. Immutable per run except for the injected `input_file`.

use std::collections::HashMap;

/// Case-insensitive option map for one recipe run.
#[derive(Debug, Clone, Default)]
pub struct Options {
    map: HashMap<String, String>,
}

impl Options {
    /// Create an empty option map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a value, normalizing the key to lowercase.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        self.map.insert(key.to_lowercase(), value.into());
    }

    /// Builder-style [`set`](Options::set).
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Look up a value case-insensitively.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(&key.to_lowercase()).map(|s| s.as_str())
    }

    /// Whether a key is present.
    pub fn contains(&self, key: &str) -> bool {
        self.map.contains_key(&key.to_lowercase())
    }

    /// `true` when the value is present and not the empty string.
    pub fn get_non_empty(&self, key: &str) -> Option<&str> {
        self.get(key).filter(|v| !v.is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Options {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        let mut opts = Options::new();
        for (k, v) in iter {
            let key: String = k.into();
            opts.set(&key, v);
        }
        opts
    }
}
