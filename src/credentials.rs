//! Collaborator credentials.
//!
//! Both secrets are required before any indexing starts. Values are read
//! from the process environment, after loading a `.env` file if one exists.

use thiserror::Error;

/// API key for the embedding collaborator.
pub const EMBEDDING_KEY_VAR: &str = "OPENAI_API_KEY";
/// API key for the reasoning collaborator.
pub const REASONING_KEY_VAR: &str = "ANTHROPIC_API_KEY";

#[derive(Debug, Error, PartialEq, Eq)]
#[error("missing required credentials: {}. Set them in the environment or a .env file", .missing.join(", "))]
pub struct MissingCredentials {
    pub missing: Vec<&'static str>,
}

#[derive(Clone)]
pub struct Credentials {
    pub embedding_api_key: String,
    pub reasoning_api_key: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("embedding_api_key", &"<redacted>")
            .field("reasoning_api_key", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    /// Read both keys from the environment (and `.env`).
    pub fn from_env() -> Result<Self, MissingCredentials> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve both keys through `lookup`, reporting every missing one.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, MissingCredentials>
    where
        F: Fn(&str) -> Option<String>,
    {
        let read = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        let embedding = read(EMBEDDING_KEY_VAR);
        let reasoning = read(REASONING_KEY_VAR);

        match (embedding, reasoning) {
            (Some(embedding_api_key), Some(reasoning_api_key)) => Ok(Self {
                embedding_api_key,
                reasoning_api_key,
            }),
            (embedding, reasoning) => {
                let mut missing = Vec::new();
                if embedding.is_none() {
                    missing.push(EMBEDDING_KEY_VAR);
                }
                if reasoning.is_none() {
                    missing.push(REASONING_KEY_VAR);
                }
                Err(MissingCredentials { missing })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_both_present() {
        let creds = Credentials::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("ANTHROPIC_API_KEY", "sk-ant-1"),
        ]))
        .unwrap();
        assert_eq!(creds.embedding_api_key, "sk-1");
        assert_eq!(creds.reasoning_api_key, "sk-ant-1");
        assert!(!format!("{:?}", creds).contains("sk-1"));
    }

    #[test]
    fn test_both_missing_lists_both() {
        let err = Credentials::from_lookup(lookup(&[])).unwrap_err();
        assert_eq!(err.missing, vec!["OPENAI_API_KEY", "ANTHROPIC_API_KEY"]);
        let msg = err.to_string();
        assert!(msg.contains("OPENAI_API_KEY"));
        assert!(msg.contains("ANTHROPIC_API_KEY"));
    }

    #[test]
    fn test_blank_value_counts_as_missing() {
        let err = Credentials::from_lookup(lookup(&[
            ("OPENAI_API_KEY", "sk-1"),
            ("ANTHROPIC_API_KEY", "  "),
        ]))
        .unwrap_err();
        assert_eq!(err.missing, vec!["ANTHROPIC_API_KEY"]);
    }
}
