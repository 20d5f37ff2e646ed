//! Access/refresh token pair and the validation of token endpoint responses.

use super::error::ApiError;
use chrono::{DateTime, Duration, Utc};
use serde_json::{Map, Value};

/// Remaining lifetime below which a token is refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

/// One authenticated session. Never mutated; a refresh produces a new value.
#[derive(Debug, Clone, PartialEq)]
pub struct Credential {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Credential {
    pub fn new(
        access_token: impl Into<String>,
        refresh_token: impl Into<String>,
        expires_at: DateTime<Utc>,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            refresh_token: refresh_token.into(),
            expires_at,
        }
    }

    /// Builds a credential from a token endpoint response received at `issued_at`.
    ///
    /// A missing or empty `access_token` or a non-numeric `expires_in` is an
    /// authentication failure. A missing `refresh_token` yields an empty one;
    /// callers refreshing an existing session keep their previous token, see
    /// [`Credential::or_refresh_token`].
    pub fn from_token_response(
        data: &Map<String, Value>,
        issued_at: DateTime<Utc>,
    ) -> Result<Self, ApiError> {
        let access_token = data
            .get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty());
        let expires_in = data.get("expires_in").and_then(Value::as_f64);

        let (Some(access_token), Some(expires_in)) = (access_token, expires_in) else {
            return Err(ApiError::auth("Token response incomplete"));
        };

        let refresh_token = data
            .get("refresh_token")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let expires_at = Duration::try_milliseconds((expires_in * 1000.0) as i64)
            .and_then(|lifetime| issued_at.checked_add_signed(lifetime))
            .ok_or_else(|| ApiError::auth("Token lifetime out of range"))?;

        Ok(Self::new(access_token, refresh_token, expires_at))
    }

    /// Fills in `previous` when the server did not hand out a new refresh token.
    pub fn or_refresh_token(self, previous: &str) -> Self {
        if self.refresh_token.is_empty() {
            Self {
                refresh_token: previous.to_string(),
                ..self
            }
        } else {
            self
        }
    }

    /// True while the token outlives `now` by more than the refresh margin.
    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now + Duration::seconds(REFRESH_MARGIN_SECS) < self.expires_at
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }
}
