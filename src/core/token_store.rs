//! Holds the current credential of a connection and forwards every replacement
//! to an external persistence sink.

use super::credential::Credential;
use super::error::ApiError;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, warn};

/// Receives every credential the token store installs.
#[async_trait]
pub trait CredentialSink: Send + Sync {
    async fn persist(&self, credential: &Credential) -> anyhow::Result<()>;
}

/// Durable credential storage keyed by connection id.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self, connection_id: &str) -> anyhow::Result<Option<Credential>>;
    async fn save(&self, connection_id: &str, credential: &Credential) -> anyhow::Result<()>;
    async fn remove(&self, connection_id: &str) -> anyhow::Result<bool>;
}

/// A [`CredentialStore`] pinned to one connection, usable as a sink.
pub struct BoundSink {
    store: Arc<dyn CredentialStore>,
    connection_id: String,
}

impl BoundSink {
    pub fn new(store: Arc<dyn CredentialStore>, connection_id: impl Into<String>) -> Self {
        Self {
            store,
            connection_id: connection_id.into(),
        }
    }
}

#[async_trait]
impl CredentialSink for BoundSink {
    async fn persist(&self, credential: &Credential) -> anyhow::Result<()> {
        self.store.save(&self.connection_id, credential).await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenState {
    Unauthenticated,
    Valid,
    Refreshing,
    Expired,
}

/// The installed credential together with whether the server rejected its
/// refresh token. Both change under the same write guard.
#[derive(Default)]
struct Slot {
    credential: Option<Arc<Credential>>,
    rejected: bool,
}

pub struct TokenStore {
    slot: RwLock<Slot>,
    sink: Option<Arc<dyn CredentialSink>>,
}

impl TokenStore {
    pub fn new(initial: Option<Credential>, sink: Option<Arc<dyn CredentialSink>>) -> Self {
        Self {
            slot: RwLock::new(Slot {
                credential: initial.map(Arc::new),
                rejected: false,
            }),
            sink,
        }
    }

    pub fn empty() -> Self {
        Self::new(None, None)
    }

    pub async fn current(&self) -> Option<Arc<Credential>> {
        self.slot.read().await.credential.clone()
    }

    /// The installed credential, unless there is none or its refresh token
    /// was rejected.
    pub async fn usable(&self) -> Result<Arc<Credential>, ApiError> {
        let slot = self.slot.read().await;
        match (&slot.credential, slot.rejected) {
            (None, _) => Err(ApiError::auth("Not authenticated")),
            (Some(_), true) => Err(ApiError::auth("Refresh token was rejected, login required")),
            (Some(credential), false) => Ok(Arc::clone(credential)),
        }
    }

    /// Installs `credential` without handing it to the sink. Used to start a
    /// session from a bare refresh token that still has to be exchanged.
    pub async fn seed(&self, credential: Credential) {
        *self.slot.write().await = Slot {
            credential: Some(Arc::new(credential)),
            rejected: false,
        };
    }

    /// Installs `credential` and hands it to the sink.
    ///
    /// Readers see either the old or the new credential, never a mix. A sink
    /// failure is logged; the new credential stays installed.
    pub async fn replace(&self, credential: Credential) -> Arc<Credential> {
        let credential = Arc::new(credential);
        *self.slot.write().await = Slot {
            credential: Some(Arc::clone(&credential)),
            rejected: false,
        };
        debug!(expires_at = %credential.expires_at, "Installed new credential");

        if let Some(sink) = &self.sink
            && let Err(e) = sink.persist(&credential).await
        {
            warn!(error = %e, "Failed to persist credential");
        }
        credential
    }

    /// Marks the stored refresh token as rejected by the server.
    pub async fn mark_rejected(&self) {
        self.slot.write().await.rejected = true;
    }

    pub async fn is_rejected(&self) -> bool {
        self.slot.read().await.rejected
    }

    /// Lifecycle state; `refreshing` is supplied by whoever owns the refresh gate.
    pub async fn state(&self, refreshing: bool) -> TokenState {
        let slot = self.slot.read().await;
        if slot.credential.is_none() {
            TokenState::Unauthenticated
        } else if slot.rejected {
            TokenState::Expired
        } else if refreshing {
            TokenState::Refreshing
        } else {
            TokenState::Valid
        }
    }
}
