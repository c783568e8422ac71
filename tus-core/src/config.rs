//! # tusrs Configuration
//!
//! A minimal configuration system based on a simple string key/value
//! store. The server and its embedders layer values however they like:
//! code defaults first, then environment overrides.
//!
//! ## Setting and reading values
//! ```rust
//! use tus_core::TusConfig;
//! let mut config = TusConfig::new();
//!
//! config.set("upload.max_size", "1024");
//! config.set("http.port", "8000");
//!
//! assert_eq!(config.get("http.port"), Some("8000"));
//! assert_eq!(config.snapshot().get_u64("upload.max_size"), Some(1024));
//! ```
//!
//! ## Environment overrides
//! `load_env` copies every variable starting with a prefix into the store,
//! lower-casing it and turning `__` into `.`:
//!
//! ```bash
//! export TUSRS__UPLOAD__MAX_SIZE=1073741824   # -> upload.max_size
//! ```

use std::collections::HashMap;

#[derive(Debug, Default)]
pub struct TusConfig {
    values: HashMap<String, String>,
}

impl TusConfig {
    /// Create an empty config store.
    pub fn new() -> Self {
        Self {
            values: HashMap::new(),
        }
    }

    /// Set a configuration key to a string value.
    ///
    /// Example: config.set("upload.dir", "/tmp/files")
    pub fn set<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.insert(key.into(), value.into());
    }

    /// Set a key only when nothing has set it yet.
    pub fn set_default<K, V>(&mut self, key: K, value: V)
    where
        K: Into<String>,
        V: Into<String>,
    {
        self.values.entry(key.into()).or_insert_with(|| value.into());
    }

    /// Get a configuration value by key.
    ///
    /// Returns None if the key is not present.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(|s| s.as_str())
    }

    /// Check whether a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Copy environment variables carrying `prefix` into the store.
    ///
    /// `TUSRS__HTTP__PORT=9000` with prefix `TUSRS__` becomes `http.port = 9000`.
    /// Returns how many keys were loaded.
    pub fn load_env(&mut self, prefix: &str) -> usize {
        self.load_vars(prefix, std::env::vars())
    }

    fn load_vars<I>(&mut self, prefix: &str, vars: I) -> usize
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut loaded = 0;
        for (key, value) in vars {
            if let Some(stripped) = key.strip_prefix(prefix) {
                let normalized = stripped.to_lowercase().replace("__", ".");
                if normalized.is_empty() {
                    continue;
                }
                self.set(normalized, value);
                loaded += 1;
            }
        }
        loaded
    }

    pub fn snapshot(&self) -> TusConfigSnapshot {
        TusConfigSnapshot::new(self.values.clone())
    }
}

#[derive(Debug, Clone, Default)]
pub struct TusConfigSnapshot {
    map: HashMap<String, String>,
}

impl TusConfigSnapshot {
    pub(crate) fn new(map: HashMap<String, String>) -> Self {
        Self { map }
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.map.get(key).map(|s| s.as_str())
    }

    pub fn get_string(&self, key: &str) -> Option<String> {
        self.map.get(key).cloned()
    }

}
