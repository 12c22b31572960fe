use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// Environment variable overriding [`StoreConfig::uri`].
pub const ENV_URI: &str = "ORIGINS_STORE_URI";
/// Environment variable overriding [`StoreConfig::max_batch_size`].
pub const ENV_BATCH_SIZE: &str = "ORIGINS_STORE_BATCH_SIZE";

/// Connection settings for the graph store.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Base URI of the store's transactional endpoint.
    pub uri: String,
    /// Maximum number of statements posted in one request.
    pub max_batch_size: usize,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            uri: "http://localhost:7474/db/data/".into(),
            max_batch_size: 100,
            timeout_secs: 30,
        }
    }
}

impl StoreConfig {
    /// Parse from TOML. Missing keys fall back to the defaults.
    pub fn from_toml_str(s: &str) -> StoreResult<Self> {
        let config: Self = toml::from_str(s).map_err(|e| StoreError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| StoreError::Config(format!("{}: {e}", path.display())))?;
        Self::from_toml_str(&text)
    }

    /// Apply `ORIGINS_STORE_*` environment overrides.
    pub fn with_env_overrides(self) -> StoreResult<Self> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> StoreResult<Self> {
        if let Some(uri) = lookup(ENV_URI) {
            self.uri = uri;
        }
        if let Some(size) = lookup(ENV_BATCH_SIZE) {
            self.max_batch_size = size
                .parse()
                .map_err(|_| StoreError::Config(format!("{ENV_BATCH_SIZE}={size:?} is not a number")))?;
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> StoreResult<()> {
        if self.max_batch_size == 0 {
            return Err(StoreError::Config("max_batch_size must be at least 1".into()));
        }
        if self.uri.is_empty() {
            return Err(StoreError::Config("uri must not be empty".into()));
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Endpoint that opens a new transaction.
    pub fn begin_url(&self) -> String {
        format!("{}/transaction", self.uri.trim_end_matches('/'))
    }

    /// Endpoint that runs a batch in a single, immediately committed
    /// transaction.
    pub fn autocommit_url(&self) -> String {
        format!("{}/commit", self.begin_url())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::io::Write;

    #[test]
    fn default_config() {
        let c = StoreConfig::default();
        assert_eq!(c.uri, "http://localhost:7474/db/data/");
        assert_eq!(c.max_batch_size, 100);
        assert_eq!(c.timeout(), Duration::from_secs(30));
    }

    #[test]
    fn endpoints_ignore_trailing_slash() {
        let mut c = StoreConfig::default();
        assert_eq!(c.begin_url(), "http://localhost:7474/db/data/transaction");
        c.uri = "http://db:7474/db/data".into();
        assert_eq!(c.autocommit_url(), "http://db:7474/db/data/transaction/commit");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let c = StoreConfig::from_toml_str("max_batch_size = 10").unwrap();
        assert_eq!(c.max_batch_size, 10);
        assert_eq!(c.uri, StoreConfig::default().uri);
    }

    #[test]
    fn zero_batch_size_rejected() {
        let err = StoreConfig::from_toml_str("max_batch_size = 0").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "uri = \"http://graph:7474/db/data/\"\ntimeout_secs = 5").unwrap();
        let c = StoreConfig::load(file.path()).unwrap();
        assert_eq!(c.uri, "http://graph:7474/db/data/");
        assert_eq!(c.timeout_secs, 5);
    }

    #[test]
    fn missing_file_is_config_error() {
        let err = StoreConfig::load("/nonexistent/origins.toml").unwrap_err();
        assert!(matches!(err, StoreError::Config(_)));
    }

    #[test]
    fn overrides_apply() {
        let env: HashMap<&str, &str> =
            [(ENV_URI, "memory://test/"), (ENV_BATCH_SIZE, "3")].into_iter().collect();
        let c = StoreConfig::default()
            .with_overrides(|k| env.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(c.uri, "memory://test/");
        assert_eq!(c.max_batch_size, 3);
    }

    #[test]
    fn bad_override_rejected() {
        let result = StoreConfig::default()
            .with_overrides(|k| (k == ENV_BATCH_SIZE).then(|| "many".to_string()));
        assert!(result.is_err());
    }
}
