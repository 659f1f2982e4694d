//! Provider registry.
//!
//! Constructs and holds all configured model adapter instances. At
//! startup the registry resolves authentication and instantiates an
//! adapter for each configured provider, registering each into a
//! [`PluginRegistry`] under the `model` role.

use std::collections::HashMap;
use std::sync::Arc;

use turnloom_domain::ProviderConfig;
use turnloom_plugins::{ModelPlugin, PluginRegistry};

use crate::openai_compat::OpenAiCompatModelPlugin;

/// Records a provider that failed to initialize, so failures can be
/// surfaced to operators rather than silently dropped.
#[derive(Debug, Clone)]
pub struct ProviderInitError {
    pub provider_id: String,
    pub error: String,
}

/// Mask substrings that look like API keys or bearer tokens in an error
/// message before it reaches logs or a readiness endpoint.
fn mask_secrets(msg: &str) -> String {
    let mut result = msg.to_string();
    for word in msg.split(|c: char| c.is_whitespace() || c == '\'' || c == '"' || c == ',') {
        let trimmed = word.trim();
        if trimmed.len() >= 20
            && trimmed
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        {
            let masked = if trimmed.len() > 8 {
                format!("{}...{}", &trimmed[..4], &trimmed[trimmed.len() - 4..])
            } else {
                "***masked***".to_string()
            };
            result = result.replace(trimmed, &masked);
        }
    }
    result
}

/// Build each configured provider's adapter and register it under the
/// `model` role, keyed by provider id. A provider that fails to
/// initialize (e.g. missing API key) is logged and skipped rather than
/// aborting startup; failures are returned so the caller can surface
/// them.
pub fn register_providers(
    registry: &mut PluginRegistry,
    providers: &[ProviderConfig],
) -> Vec<ProviderInitError> {
    let mut init_errors = Vec::new();

    for cfg in providers {
        match OpenAiCompatModelPlugin::from_config(cfg) {
            Ok(plugin) => {
                tracing::info!(provider_id = %cfg.id, "registered model plugin");
                registry.register_model(cfg.id.clone(), Arc::new(plugin) as Arc<dyn ModelPlugin>);
            }
            Err(e) => {
                let safe_error = mask_secrets(&e.to_string());
                tracing::warn!(
                    provider_id = %cfg.id,
                    error = %safe_error,
                    "failed to initialize model plugin, skipping"
                );
                init_errors.push(ProviderInitError {
                    provider_id: cfg.id.clone(),
                    error: safe_error,
                });
            }
        }
    }

    init_errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use turnloom_domain::AuthConfig;

    #[test]
    fn mask_secrets_redacts_long_token_like_substrings() {
        let msg = "request failed with key sk-THISISALONGSECRETVALUE1234567890";
        let masked = mask_secrets(msg);
        assert!(!masked.contains("THISISALONGSECRETVALUE1234567890"));
    }

    #[test]
    fn missing_key_becomes_init_error_not_panic() {
        let mut registry = {
            let store = Arc::new(turnloom_store::Store::open_in_memory("providers_test").unwrap());
            let history = Arc::new(turnloom_history::HistoryLog::open(store.clone()).unwrap());
            let context = Arc::new(turnloom_context::ContextCache::new(history.clone()));
            PluginRegistry::new(store, history, context)
        };
        let providers = vec![ProviderConfig {
            id: "broken".to_string(),
            base_url: "http://localhost".to_string(),
            default_model: None,
            auth: AuthConfig::default(),
        }];
        let errors = register_providers(&mut registry, &providers);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].provider_id, "broken");
    }
}
