//! Fixed-interval polling of the overview endpoints.

use crate::core::{ApiError, Snapshot, SnapshotSensor};
use crate::providers::finanzguru::FinanzguruClient;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, warn};

const MIN_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Pending,
    Ok,
    UpdateFailed(String),
    ReauthRequired(String),
}

#[derive(Debug, Clone)]
pub struct CoordinatorState {
    pub snapshot: Option<Arc<Snapshot>>,
    pub status: UpdateStatus,
}

impl CoordinatorState {
    /// Observers only show values after a successful cycle.
    pub fn available(&self) -> bool {
        self.status == UpdateStatus::Ok && self.snapshot.is_some()
    }
}

pub struct Coordinator {
    client: Arc<FinanzguruClient>,
    interval: Duration,
    currency: String,
    state: watch::Sender<CoordinatorState>,
}

impl Coordinator {
    pub fn new(client: Arc<FinanzguruClient>, interval: Duration, currency: &str) -> Self {
        let (state, _) = watch::channel(CoordinatorState {
            snapshot: None,
            status: UpdateStatus::Pending,
        });
        Self {
            client,
            interval,
            currency: currency.to_string(),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<CoordinatorState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> CoordinatorState {
        self.state.borrow().clone()
    }

    /// Sensors over the latest snapshot, empty while unavailable.
    pub fn sensors(&self) -> Vec<SnapshotSensor> {
        let state = self.state();
        match (&state.snapshot, state.available()) {
            (Some(snapshot), true) => SnapshotSensor::all(snapshot, &self.currency),
            _ => Vec::new(),
        }
    }

    /// Initial cycle; setup should not continue when it fails.
    pub async fn first_refresh(&self) -> Result<Arc<Snapshot>, ApiError> {
        self.refresh().await
    }

    /// Runs one poll cycle and publishes the outcome.
    pub async fn refresh(&self) -> Result<Arc<Snapshot>, ApiError> {
        match self.client.fetch_snapshot().await {
            Ok(snapshot) => {
                let snapshot = Arc::new(snapshot);
                debug!(fetched_at = %snapshot.fetched_at, "Snapshot updated");
                self.state.send_replace(CoordinatorState {
                    snapshot: Some(Arc::clone(&snapshot)),
                    status: UpdateStatus::Ok,
                });
                Ok(snapshot)
            }
            Err(e) => {
                let status = if e.is_auth() {
                    error!(error = %e, "Re-authentication required");
                    UpdateStatus::ReauthRequired(e.to_string())
                } else {
                    warn!(error = %e, "Update failed, retrying next cycle");
                    UpdateStatus::UpdateFailed(e.to_string())
                };
                self.state.send_modify(|state| state.status = status);
                Err(e)
            }
        }
    }

    /// Polls every interval until re-authentication is required or `shutdown` resolves.
    pub async fn run_until<F>(&self, shutdown: F) -> UpdateStatus
    where
        F: Future<Output = ()>,
    {
        // tokio::time::interval panics on a zero period.
        let mut ticker = tokio::time::interval(self.interval.max(MIN_INTERVAL));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    debug!("Polling stopped");
                    break;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.refresh().await
                        && e.is_auth()
                    {
                        break;
                    }
                }
            }
        }
        self.state().status
    }
}
