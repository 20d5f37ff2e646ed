use crate::core::{Credential, CredentialStore};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// In-memory credential store, used for tests and one-off validation.
#[derive(Clone, Default)]
pub struct MemoryCredentialStore {
    inner: Arc<Mutex<HashMap<String, Credential>>>,
}

impl MemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CredentialStore for MemoryCredentialStore {
    async fn load(&self, connection_id: &str) -> anyhow::Result<Option<Credential>> {
        let entries = self.inner.lock().await;
        let credential = entries.get(connection_id).cloned();
        debug!(connection_id, found = credential.is_some(), "Credential LOAD");
        Ok(credential)
    }

    async fn save(&self, connection_id: &str, credential: &Credential) -> anyhow::Result<()> {
        let mut entries = self.inner.lock().await;
        debug!(connection_id, "Credential SAVE");
        entries.insert(connection_id.to_string(), credential.clone());
        Ok(())
    }

    async fn remove(&self, connection_id: &str) -> anyhow::Result<bool> {
        let mut entries = self.inner.lock().await;
        debug!(connection_id, "Credential REMOVE");
        Ok(entries.remove(connection_id).is_some())
    }
}
