use super::StoredCredential;
use crate::core::{Credential, CredentialStore};
use anyhow::{Context, Result};
use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::path::Path;
use tracing::{debug, warn};

const PARTITION: &str = "entries";

/// Credential entries kept in a fjall keyspace, one key per connection.
pub struct FjallCredentialStore {
    keyspace: Keyspace,
    entries: PartitionHandle,
}

impl FjallCredentialStore {
    pub fn open(data_path: &Path) -> Result<Self> {
        let path = data_path.join("credentials");
        std::fs::create_dir_all(&path)
            .with_context(|| format!("Failed to create directory: {}", path.display()))?;

        let keyspace = Config::new(&path)
            .open()
            .with_context(|| format!("Failed to open credential store: {}", path.display()))?;
        let entries = keyspace.open_partition(PARTITION, PartitionCreateOptions::default())?;
        Ok(Self { keyspace, entries })
    }
}

#[async_trait]
impl CredentialStore for FjallCredentialStore {
    async fn load(&self, connection_id: &str) -> Result<Option<Credential>> {
        let Some(raw) = self.entries.get(connection_id)? else {
            debug!(connection_id, "No stored credential");
            return Ok(None);
        };

        match serde_json::from_slice::<StoredCredential>(&raw) {
            Ok(stored) => Ok(stored.into_credential()),
            Err(e) => {
                warn!(connection_id, error = %e, "Ignoring unreadable credential entry");
                Ok(None)
            }
        }
    }

    async fn save(&self, connection_id: &str, credential: &Credential) -> Result<()> {
        let value = serde_json::to_vec(&StoredCredential::from(credential))?;
        self.entries.insert(connection_id, value)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(connection_id, expires_at = %credential.expires_at, "Stored credential");
        Ok(())
    }

    async fn remove(&self, connection_id: &str) -> Result<bool> {
        if !self.entries.contains_key(connection_id)? {
            return Ok(false);
        }
        self.entries.remove(connection_id)?;
        self.keyspace.persist(PersistMode::SyncAll)?;
        debug!(connection_id, "Removed credential");
        Ok(true)
    }
}
