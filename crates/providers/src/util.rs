//! Shared utility functions for provider adapters.

use turnloom_domain::{AuthConfig, Error, Result};

/// Convert a [`reqwest::Error`] into the domain [`Error`] type.
pub(crate) fn from_reqwest(e: reqwest::Error) -> Error {
    Error::Upstream(e.to_string())
}

/// Resolve the API key for a provider from its [`AuthConfig`].
///
/// Precedence: an inline `key` (logged as a warning, since it means the
/// secret lives in the config file) beats an `env` var name.
pub fn resolve_api_key(auth: &AuthConfig) -> Result<String> {
    if let Some(ref key) = auth.key {
        tracing::warn!(
            "API key loaded from plaintext config field 'key' — prefer 'env' instead"
        );
        return Ok(key.clone());
    }

    if let Some(ref env_var) = auth.env {
        return std::env::var(env_var).map_err(|_| {
            Error::Config(format!(
                "environment variable '{env_var}' not set or not valid UTF-8"
            ))
        });
    }

    Err(Error::Config(
        "no API key configured: set 'key' or 'env' in the provider's auth config".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolve_api_key_plaintext() {
        let auth = AuthConfig {
            key: Some("sk-test-123".into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "sk-test-123");
    }

    #[test]
    fn resolve_api_key_env_var() {
        let var_name = "TURNLOOM_TEST_RESOLVE_ENV_KEY";
        std::env::set_var(var_name, "env-secret-value");
        let auth = AuthConfig {
            env: Some(var_name.into()),
            ..Default::default()
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "env-secret-value");
        std::env::remove_var(var_name);
    }

    #[test]
    fn resolve_api_key_missing_env_var() {
        let auth = AuthConfig {
            env: Some("TURNLOOM_TEST_NONEXISTENT_VAR".into()),
            ..Default::default()
        };
        let err = resolve_api_key(&auth).unwrap_err();
        assert_eq!(err.kind(), "Config");
    }

    #[test]
    fn resolve_api_key_no_config() {
        let err = resolve_api_key(&AuthConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "Config");
    }

    #[test]
    fn plaintext_takes_precedence_over_env() {
        let auth = AuthConfig {
            key: Some("plaintext-wins".into()),
            env: Some("TURNLOOM_TEST_SHOULD_NOT_BE_READ".into()),
        };
        assert_eq!(resolve_api_key(&auth).unwrap(), "plaintext-wins");
    }
}
