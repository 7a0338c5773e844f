//! API key availability and selection.

use crate::error::{Result, StudioError};
use async_trait::async_trait;
use std::io::{BufRead, Write};
use std::sync::RwLock;

/// Environment variables consulted for a Gemini API key, in order.
pub const API_KEY_ENV_VARS: [&str; 2] = ["GOOGLE_API_KEY", "GEMINI_API_KEY"];

/// Host-provided credential mechanism.
#[async_trait]
pub trait CredentialSource: Send + Sync {
    /// Returns true if a usable credential is configured.
    async fn has_credential(&self) -> bool;

    /// Runs the credential selection flow.
    async fn open_selector(&self) -> Result<()>;

    /// Returns the current API key, if any.
    async fn api_key(&self) -> Option<String>;
}

/// API keys from an explicit value, the environment, or a terminal prompt.
#[derive(Debug, Default)]
pub struct ApiKeyStore {
    selected: RwLock<Option<String>>,
    env_vars: Vec<&'static str>,
}

impl ApiKeyStore {
    /// Looks keys up in [`API_KEY_ENV_VARS`].
    pub fn from_env() -> Self {
        Self {
            selected: RwLock::new(None),
            env_vars: API_KEY_ENV_VARS.to_vec(),
        }
    }

    /// Uses a fixed key, ignoring the environment.
    pub fn with_key(key: impl Into<String>) -> Self {
        let key = key.into();
        Self {
            selected: RwLock::new(Some(key).filter(|k| !k.trim().is_empty())),
            env_vars: Vec::new(),
        }
    }

    /// A store with no key and no environment lookup.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Stores a key chosen by the user.
    pub fn select(&self, key: impl Into<String>) -> Result<()> {
        let key = key.into().trim().to_string();
        if key.is_empty() {
            return Err(StudioError::Auth("no API key entered".into()));
        }
        if let Ok(mut selected) = self.selected.write() {
            *selected = Some(key);
        }
        Ok(())
    }

    fn current(&self) -> Option<String> {
        let selected = self.selected.read().ok().and_then(|s| s.clone());
        selected.or_else(|| {
            self.env_vars
                .iter()
                .filter_map(|var| std::env::var(var).ok())
                .find(|v| !v.trim().is_empty())
        })
    }
}

#[async_trait]
impl CredentialSource for ApiKeyStore {
    async fn has_credential(&self) -> bool {
        self.current().is_some()
    }

    async fn open_selector(&self) -> Result<()> {
        let line = tokio::task::spawn_blocking(|| -> std::io::Result<String> {
            let mut stderr = std::io::stderr();
            write!(stderr, "Enter a Gemini API key: ")?;
            stderr.flush()?;
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            Ok(line)
        })
        .await
        .map_err(|e| StudioError::Decode(e.to_string()))??;

        self.select(line)?;
        tracing::info!("API key selected");
        Ok(())
    }

    async fn api_key(&self) -> Option<String> {
        self.current()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_with_key() {
        let store = ApiKeyStore::with_key("abc");
        assert!(store.has_credential().await);
        assert_eq!(store.api_key().await.as_deref(), Some("abc"));
    }

    #[tokio::test]
    async fn test_blank_key_is_no_credential() {
        let store = ApiKeyStore::with_key("   ");
        assert!(!store.has_credential().await);
        assert!(!ApiKeyStore::empty().has_credential().await);
    }

    #[tokio::test]
    async fn test_select_replaces_key() {
        let store = ApiKeyStore::empty();
        assert!(store.select("  ").is_err());
        store.select(" new-key\n").unwrap();
        assert_eq!(store.api_key().await.as_deref(), Some("new-key"));
    }
}
