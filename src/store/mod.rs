pub mod disk;
pub mod memory;

use crate::core::Credential;
use chrono::DateTime;
use serde::{Deserialize, Serialize};

/// On-disk layout of a credential, matching the connection entry format:
/// the expiry is kept as fractional UNIX seconds.
#[derive(Debug, Serialize, Deserialize)]
pub(crate) struct StoredCredential {
    pub access_token: String,
    pub refresh_token: String,
    pub token_expires_at: f64,
}

impl From<&Credential> for StoredCredential {
    fn from(credential: &Credential) -> Self {
        Self {
            access_token: credential.access_token.clone(),
            refresh_token: credential.refresh_token.clone(),
            token_expires_at: credential.expires_at.timestamp_millis() as f64 / 1000.0,
        }
    }
}

impl StoredCredential {
    pub fn into_credential(self) -> Option<Credential> {
        let expires_at = DateTime::from_timestamp_millis((self.token_expires_at * 1000.0).round() as i64)?;
        Some(Credential::new(self.access_token, self.refresh_token, expires_at))
    }
}
