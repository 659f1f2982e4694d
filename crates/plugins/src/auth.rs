use async_trait::async_trait;
use std::collections::HashMap;
use turnloom_domain::{Error, Result};

/// Caller-presented credentials. Opaque to the core; an `auth` plugin
/// decides what it means.
#[derive(Debug, Clone)]
pub struct Credentials(pub String);

/// A resolved caller identity.
#[derive(Debug, Clone)]
pub struct Identity {
    pub user_id: String,
    pub scopes: Vec<String>,
}

/// Exactly one plugin fills this role. The actual wire-level transport
/// (HTTP headers, JWT parsing) lives outside the core; this contract only
/// covers what the core needs to ask of it.
#[async_trait]
pub trait AuthPlugin: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity>;
    fn issue_token(&self, identity: &Identity) -> Result<String>;
    async fn verify_token(&self, token: &str) -> Result<Identity>;
    fn authorize_model_access(&self, identity: &Identity, model: &str) -> Result<()>;
}

/// A minimal in-memory auth plugin for tests and local development: tokens
/// are looked up in a fixed map rather than verified cryptographically.
pub struct StaticTokenAuth {
    tokens: HashMap<String, Identity>,
}

impl StaticTokenAuth {
    pub fn new() -> Self {
        Self {
            tokens: HashMap::new(),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: impl Into<String>) -> Self {
        self.tokens.insert(
            token.into(),
            Identity {
                user_id: user_id.into(),
                scopes: vec!["default".to_string()],
            },
        );
        self
    }
}

impl Default for StaticTokenAuth {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthPlugin for StaticTokenAuth {
    async fn authenticate(&self, credentials: &Credentials) -> Result<Identity> {
        self.verify_token(&credentials.0).await
    }

    fn issue_token(&self, identity: &Identity) -> Result<String> {
        Ok(format!("static:{}", identity.user_id))
    }

    async fn verify_token(&self, token: &str) -> Result<Identity> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| Error::PermissionDenied("unknown token".to_string()))
    }

    fn authorize_model_access(&self, _identity: &Identity, _model: &str) -> Result<()> {
        Ok(())
    }
}
