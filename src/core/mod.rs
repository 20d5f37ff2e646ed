//! Credentials, token lifecycle and snapshot extraction

pub mod config;
pub mod credential;
pub mod error;
pub mod log;
pub mod sensor;
pub mod snapshot;
pub mod token_store;

// Re-export main types for cleaner imports
pub use credential::Credential;
pub use error::ApiError;
pub use sensor::{Metric, ObservableValue, SnapshotSensor};
pub use snapshot::{Overview, Payload, Snapshot};
pub use token_store::{BoundSink, CredentialSink, CredentialStore, TokenState, TokenStore};
