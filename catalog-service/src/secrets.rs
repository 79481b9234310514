//! Credential secret storage.
//!
//! Passwords pass through a [`SecretStore`] on their way into and out of the
//! `credentials` table. The stored form is whatever `seal` returns.

use common::errors::AppResult;

/// Converts secrets between their plaintext and stored forms.
pub trait SecretStore: Send + Sync {
    fn seal(&self, plaintext: &str) -> AppResult<String>;

    fn open(&self, stored: &str) -> AppResult<String>;
}

/// Stores secrets verbatim.
#[derive(Debug, Default, Clone, Copy)]
pub struct PlaintextSecretStore;

impl SecretStore for PlaintextSecretStore {
    fn seal(&self, plaintext: &str) -> AppResult<String> {
        Ok(plaintext.to_string())
    }

    fn open(&self, stored: &str) -> AppResult<String> {
        Ok(stored.to_string())
    }
}
