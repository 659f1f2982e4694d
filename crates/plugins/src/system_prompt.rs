use std::collections::HashMap;
use turnloom_domain::{Error, Result};

/// Exactly one plugin fills this role: resolve a prompt key to its text.
pub trait SystemPromptPlugin: Send + Sync {
    fn get(&self, key: &str) -> Result<String>;
}

/// Resolves prompt keys from a fixed in-process map. Sufficient for the
/// core's own needs; loading prompts from disk or a remote store is a
/// transport concern outside this crate.
pub struct StaticSystemPrompts {
    prompts: HashMap<String, String>,
}

impl StaticSystemPrompts {
    pub fn new() -> Self {
        Self {
            prompts: HashMap::new(),
        }
    }

    pub fn with_prompt(mut self, key: impl Into<String>, text: impl Into<String>) -> Self {
        self.prompts.insert(key.into(), text.into());
        self
    }
}

impl Default for StaticSystemPrompts {
    fn default() -> Self {
        Self::new()
    }
}

impl SystemPromptPlugin for StaticSystemPrompts {
    fn get(&self, key: &str) -> Result<String> {
        self.prompts
            .get(key)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("system prompt key: {key}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_key_is_not_found() {
        let prompts = StaticSystemPrompts::new();
        assert_eq!(prompts.get("nope").unwrap_err().kind(), "NotFound");
    }

    #[test]
    fn known_key_resolves() {
        let prompts = StaticSystemPrompts::new().with_prompt("default", "be helpful");
        assert_eq!(prompts.get("default").unwrap(), "be helpful");
    }
}
