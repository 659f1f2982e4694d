use serde::{Deserialize, Serialize};

/// Top-level configuration, loaded from TOML with environment overrides.
///
/// One sub-struct per concern, each `#[serde(default)]` so a partial TOML
/// file is enough to get a runnable configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,
    #[serde(default)]
    pub context: ContextConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
}

impl Config {
    /// Load configuration from a TOML file, then apply `TURNLOOM_*`
    /// environment overrides for the handful of settings operators tend to
    /// need to flip without editing the file (db path, bind address).
    pub fn load(path: &std::path::Path) -> crate::Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let mut cfg: Config = toml::from_str(&text)
            .map_err(|e| crate::Error::Config(format!("parsing {}: {e}", path.display())))?;
        cfg.apply_env_overrides();
        Ok(cfg)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(path) = std::env::var("TURNLOOM_DB_PATH") {
            self.store.db_path = path;
        }
        if let Ok(addr) = std::env::var("TURNLOOM_BIND_ADDR") {
            self.server.bind_addr = addr;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub db_path: String,
    /// SQLite `busy_timeout` in milliseconds, applied per-connection.
    pub busy_timeout_ms: u64,
    pub busy_max_retries: u32,
    pub busy_base_delay_ms: u64,
    pub reader_pool_size: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "turnloom.db".to_string(),
            busy_timeout_ms: 5_000,
            busy_max_retries: 6,
            busy_base_delay_ms: 20,
            reader_pool_size: 8,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OrchestratorConfig {
    pub max_tool_rounds: usize,
    pub tool_timeout_secs: u64,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_tool_rounds: 25,
            tool_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextConfig {
    /// Whether `thinking` entries are stripped from context once their
    /// tool round resolves (the stricter reading of the persistence rule).
    pub strip_reasoning_after_round: bool,
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            strip_reasoning_after_round: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8080".to_string(),
        }
    }
}

/// One entry in `config.providers`: a configured model adapter instance.
/// `id` is the key other configuration (and `ModelPlugin` lookups) refer
/// to it by; `default_model` is used when a request doesn't name one.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProviderConfig {
    pub id: String,
    pub base_url: String,
    #[serde(default)]
    pub default_model: Option<String>,
    #[serde(default)]
    pub auth: AuthConfig,
}

/// How to resolve an API key for a provider. Exactly one of `key` or
/// `env` is expected to be set; `key` is a plaintext escape hatch for
/// local development and logs a warning when used.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AuthConfig {
    #[serde(default)]
    pub key: Option<String>,
    #[serde(default)]
    pub env: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_spec_constants() {
        let cfg = Config::default();
        assert_eq!(cfg.orchestrator.max_tool_rounds, 25);
        assert!(cfg.context.strip_reasoning_after_round);
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let cfg: Config = toml::from_str("[store]\ndb_path = \"/tmp/x.db\"\n").unwrap();
        assert_eq!(cfg.store.db_path, "/tmp/x.db");
        assert_eq!(cfg.store.busy_max_retries, 6);
        assert_eq!(cfg.server.bind_addr, "127.0.0.1:8080");
    }
}
