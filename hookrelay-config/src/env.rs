// Environment variable loading

use serde_json::{Map, Value};
use std::env;

/// Separator between nesting levels in variable names
/// (`HOOKRELAY_EMITTER__API_KEY` -> `emitter.api_key`).
pub const NESTING_SEPARATOR: &str = "__";

/// Environment variable loader
#[derive(Debug, Clone, Default)]
pub struct EnvLoader {
    prefix: Option<String>,
}

impl EnvLoader {
    /// Create a new environment loader
    pub fn new(prefix: Option<String>) -> Self {
        Self { prefix }
    }

    /// Create a loader that only reads `PREFIX_*` variables
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self::new(Some(prefix.into()))
    }

    /// Load the process environment into a nested map
    pub fn load(&self) -> Map<String, Value> {
        self.load_from(env::vars())
    }

    /// Load from an explicit set of variables
    pub fn load_from<I>(&self, vars: I) -> Map<String, Value>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut config = Map::new();

        for (key, value) in vars {
            let Some(key) = self.strip_prefix(&key) else {
                continue;
            };
            if key.is_empty() {
                continue;
            }
            crate::insert_path(&mut config, &key_path(key), Value::String(value));
        }

        config
    }

    fn strip_prefix<'a>(&self, key: &'a str) -> Option<&'a str> {
        match self.prefix {
            Some(ref prefix) => key
                .strip_prefix(prefix.as_str())
                .and_then(|rest| rest.strip_prefix('_')),
            None => Some(key),
        }
    }
}

/// Split a variable name into a lowercase key path
pub(crate) fn key_path(key: &str) -> Vec<String> {
    key.split(NESTING_SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    // std::env::set_var is unsafe since edition 2024, so these tests feed
    // variables through `load_from` instead of mutating the process.

    fn vars(pairs: &[(&str, &str)]) -> Vec<(String, String)> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_prefix_filtering() {
        let loader = EnvLoader::with_prefix("HOOKRELAY");
        let map = loader.load_from(vars(&[
            ("HOOKRELAY_EMITTER__API_KEY", "key-1"),
            ("HOOKRELAYX_OTHER", "ignored"),
            ("PATH", "/usr/bin"),
        ]));

        assert_eq!(map.len(), 1);
        assert_eq!(map["emitter"]["api_key"], "key-1");
    }

    #[test]
    fn test_values_stay_text() {
        let loader = EnvLoader::with_prefix("HOOKRELAY");
        let map = loader.load_from(vars(&[
            ("HOOKRELAY_RECEIVER__MAX_PAYLOAD_SIZE", "2048"),
            ("HOOKRELAY_DEBUG", "false"),
            ("HOOKRELAY_EMITTER__API_KEY", "1234567890"),
            ("HOOKRELAY_EMITTER__SECRET", "007"),
        ]));

        assert_eq!(map["receiver"]["max_payload_size"], "2048");
        assert_eq!(map["debug"], "false");
        assert_eq!(map["emitter"]["api_key"], "1234567890");
        assert_eq!(map["emitter"]["secret"], "007");
    }
}
