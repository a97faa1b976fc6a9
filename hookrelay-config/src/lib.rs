// Layered configuration for hookrelay
//
// Settings are assembled from an optional config file, an optional `.env`
// file and the process environment, later layers overriding earlier ones,
// then deserialized and validated once at startup.

pub mod de;
pub mod env;
pub mod error;
pub mod loader;
pub mod validation;

pub use env::EnvLoader;
pub use error::{ConfigError, Result};
pub use loader::{ConfigLoader, FileFormat};
pub use validation::{ConfigValidator, Validate};

use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::path::Path;

/// Default environment prefix (`HOOKRELAY_EMITTER__BASE_URL`, ...)
pub const DEFAULT_ENV_PREFIX: &str = "HOOKRELAY";

/// Merges configuration layers into a single JSON document
#[derive(Debug, Clone, Default)]
pub struct ConfigManager {
    config: Map<String, Value>,
    env_prefix: Option<String>,
}

impl ConfigManager {
    /// Create an empty manager that reads unprefixed variables
    pub fn new() -> Self {
        Self::default()
    }

    /// Create with environment variable prefix
    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            config: Map::new(),
            env_prefix: Some(prefix.into()),
        }
    }

    /// Merge a config file, detecting its format from the file name
    pub fn load_file(&mut self, path: impl AsRef<Path>) -> Result<&mut Self> {
        let path = path.as_ref();
        let data = ConfigLoader::auto(path)?.load_file(path)?;
        tracing::debug!(path = %path.display(), "loaded configuration file");
        self.merge_value(data)
    }

    /// Merge a `.env` file into the process environment, then load the environment
    pub fn load_dotenv(&mut self, path: Option<&Path>) -> Result<&mut Self> {
        match path {
            Some(path) => {
                dotenvy::from_path(path).map_err(|e| ConfigError::LoadError(e.to_string()))?;
            }
            None => {
                // a missing .env is not an error
                dotenvy::dotenv().ok();
            }
        }
        self.load_env()
    }

    /// Merge prefixed process environment variables
    pub fn load_env(&mut self) -> Result<&mut Self> {
        let vars = EnvLoader::new(self.env_prefix.clone()).load();
        self.merge_value(Value::Object(vars))
    }

    /// Merge an arbitrary JSON object layer
    pub fn merge_value(&mut self, value: Value) -> Result<&mut Self> {
        match value {
            Value::Object(map) => {
                deep_merge(&mut self.config, map);
                Ok(self)
            }
            other => Err(ConfigError::ParseError(format!(
                "configuration root must be a table, got {}",
                other
            ))),
        }
    }

    /// Set a value at a dotted path (`emitter.retry.max_attempts`)
    pub fn set(&mut self, key: &str, value: impl Into<Value>) -> &mut Self {
        let path: Vec<String> = key.split('.').map(str::to_string).collect();
        insert_path(&mut self.config, &path, value.into());
        self
    }

    /// Look up a value at a dotted path
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Result<T> {
        let mut segments = key.split('.');
        let first = segments.next().unwrap_or_default();
        let mut current = self
            .config
            .get(first)
            .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        for segment in segments {
            current = current
                .get(segment)
                .ok_or_else(|| ConfigError::KeyNotFound(key.to_string()))?;
        }

        // env layers hold text; `"5"` still reads as a number
        serde_json::from_value(current.clone())
            .or_else(|e| match current {
                Value::String(text) => serde_json::from_str(text.trim()).map_err(|_| e),
                _ => Err(e),
            })
            .map_err(|e| ConfigError::DeserializationError(format!("{}: {}", key, e)))
    }

    /// Check if a dotted path exists
    pub fn has(&self, key: &str) -> bool {
        self.get::<Value>(key).is_ok()
    }

    /// Deserialize the merged document without validation
    pub fn extract<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_value(Value::Object(self.config.clone()))
            .map_err(|e| ConfigError::DeserializationError(e.to_string()))
    }

    /// Deserialize the merged document and run its validation rules
    pub fn load_validated<T: DeserializeOwned + Validate>(&self) -> Result<T> {
        let settings: T = self.extract()?;
        settings.validate()?;
        Ok(settings)
    }
}

/// Insert `value` at `path`, creating intermediate tables as needed
pub(crate) fn insert_path(root: &mut Map<String, Value>, path: &[String], value: Value) {
    let Some((last, parents)) = path.split_last() else {
        return;
    };

    let mut current = root;
    for segment in parents {
        let entry = current
            .entry(segment.clone())
            .or_insert_with(|| Value::Object(Map::new()));
        if !entry.is_object() {
            *entry = Value::Object(Map::new());
        }
        let Value::Object(map) = entry else {
            return;
        };
        current = map;
    }
    current.insert(last.clone(), value);
}

fn deep_merge(target: &mut Map<String, Value>, source: Map<String, Value>) {
    for (key, value) in source {
        match (target.get_mut(&key), value) {
            (Some(Value::Object(existing)), Value::Object(incoming)) => {
                deep_merge(existing, incoming);
            }
            (_, value) => {
                target.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Settings {
        name: String,
        #[serde(default)]
        retries: u32,
    }

    impl Validate for Settings {
        fn validate(&self) -> Result<()> {
            ConfigValidator::not_empty(&self.name, "name")?;
            ConfigValidator::in_range(self.retries, 1, 10, "retries")
        }
    }

    #[test]
    fn test_set_and_get() {
        let mut manager = ConfigManager::new();
        manager.set("emitter.retry.max_attempts", 4);

        let value: u32 = manager.get("emitter.retry.max_attempts").unwrap();
        assert_eq!(value, 4);
        assert!(manager.has("emitter.retry"));
        assert!(!manager.has("emitter.secret"));
    }

    #[test]
    fn test_get_parses_text_values() {
        let mut manager = ConfigManager::new();
        manager.set("retry.max_attempts", "4").set("api_key", "0042");

        assert_eq!(manager.get::<u32>("retry.max_attempts").unwrap(), 4);
        assert_eq!(manager.get::<String>("api_key").unwrap(), "0042");
        assert!(manager.get::<bool>("api_key").is_err());
    }

    #[test]
    fn test_layers_deep_merge() {
        let mut manager = ConfigManager::new();
        manager
            .merge_value(json!({"emitter": {"base_url": "http://a", "api_key": "k1"}}))
            .unwrap()
            .merge_value(json!({"emitter": {"api_key": "k2"}}))
            .unwrap();

        assert_eq!(manager.get::<String>("emitter.base_url").unwrap(), "http://a");
        assert_eq!(manager.get::<String>("emitter.api_key").unwrap(), "k2");
    }

    #[test]
    fn test_non_table_root_rejected() {
        let mut manager = ConfigManager::new();
        assert!(manager.merge_value(json!([1, 2, 3])).is_err());
    }

    #[test]
    fn test_load_validated() {
        let mut manager = ConfigManager::new();
        manager.set("name", "relay").set("retries", 3);
        let settings: Settings = manager.load_validated().unwrap();
        assert_eq!(settings.name, "relay");

        manager.set("retries", 0);
        assert!(matches!(
            manager.load_validated::<Settings>(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_load_toml_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "name = \"from-file\"\nretries = 2").unwrap();

        let mut manager = ConfigManager::new();
        manager.load_file(file.path()).unwrap();

        let settings: Settings = manager.load_validated().unwrap();
        assert_eq!(settings.name, "from-file");
        assert_eq!(settings.retries, 2);
    }
}
