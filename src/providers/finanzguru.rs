use crate::core::snapshot::{Overview, Payload, Snapshot};
use crate::core::{ApiError, Credential, TokenState, TokenStore};
use chrono::{DateTime, Utc};
use reqwest::{Method, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

const TOKEN_PATH: &str = "/oauth/token";
const ACCOUNTS_PATH: &str = "/bank/accounts";
const BUDGETS_PATH: &str = "/analysis/budgets";
const CONTRACTS_PATH: &str = "/contracts";

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Authenticated access to the Finanzguru API for one connection.
///
/// Every data request first makes sure the cached access token is still
/// valid. Concurrent callers that find it stale queue on a single gate, so at
/// most one refresh is on the wire at any time.
pub struct FinanzguruClient {
    base_url: String,
    client: reqwest::Client,
    tokens: TokenStore,
    refresh_gate: Mutex<()>,
}

impl FinanzguruClient {
    pub fn new(base_url: &str, tokens: TokenStore) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, tokens, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(
        base_url: &str,
        tokens: TokenStore,
        timeout: Duration,
    ) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("finanzguru/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
            tokens,
            refresh_gate: Mutex::new(()),
        })
    }

    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    pub async fn token_state(&self) -> TokenState {
        let refreshing = self.refresh_gate.try_lock().is_err();
        self.tokens.state(refreshing).await
    }

    pub async fn login_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Arc<Credential>, ApiError> {
        let _gate = self.refresh_gate.lock().await;
        let body = json!({
            "grant_type": "password",
            "username": email,
            "password": password,
        });
        let credential = self.exchange(&body).await?;
        info!("Logged in with password");
        Ok(self.tokens.replace(credential).await)
    }

    /// Starts a session from a refresh token obtained elsewhere.
    ///
    /// The token is installed as an already expired credential and then
    /// refreshed, so the session ends up with a server-declared expiry. When
    /// the exchange fails the provisional credential stays installed.
    pub async fn login_with_refresh_token(
        &self,
        refresh_token: &str,
    ) -> Result<Arc<Credential>, ApiError> {
        if refresh_token.is_empty() {
            return Err(ApiError::auth("Refresh token is empty"));
        }
        self.tokens
            .seed(Credential::new("", refresh_token, DateTime::<Utc>::UNIX_EPOCH))
            .await;
        let credential = self.refresh_access_token().await?;
        info!("Logged in with refresh token");
        Ok(credential)
    }

    /// Refreshes the access token regardless of its remaining lifetime.
    pub async fn refresh_access_token(&self) -> Result<Arc<Credential>, ApiError> {
        let _gate = self.refresh_gate.lock().await;
        self.refresh_locked().await
    }

    /// Returns a credential that stays valid for at least the refresh margin.
    pub async fn ensure_valid_token(&self) -> Result<Arc<Credential>, ApiError> {
        let current = self.tokens.usable().await?;
        if current.is_fresh() {
            return Ok(current);
        }

        let _gate = self.refresh_gate.lock().await;
        // Whoever held the gate before us may already have refreshed.
        let current = self.tokens.usable().await?;
        if current.is_fresh() {
            return Ok(current);
        }
        debug!(expires_at = %current.expires_at, "Access token about to expire");
        self.refresh_locked().await
    }

    pub async fn get_bank_accounts(&self) -> Result<Payload, ApiError> {
        self.authed_get(ACCOUNTS_PATH).await
    }

    pub async fn get_budgets(&self) -> Result<Payload, ApiError> {
        self.authed_get(BUDGETS_PATH).await
    }

    pub async fn get_contracts(&self) -> Result<Payload, ApiError> {
        self.authed_get(CONTRACTS_PATH).await
    }

    /// Fetches accounts, budgets and contracts concurrently. Any failure fails the whole fetch.
    pub async fn get_overview(&self) -> Result<Overview, ApiError> {
        let (accounts, budgets, contracts) = futures::try_join!(
            self.get_bank_accounts(),
            self.get_budgets(),
            self.get_contracts()
        )?;
        Ok(Overview {
            accounts,
            budgets,
            contracts,
        })
    }

    pub async fn fetch_snapshot(&self) -> Result<Snapshot, ApiError> {
        let overview = self.get_overview().await?;
        Ok(Snapshot::from_overview(&overview))
    }

    /// Caller must hold the refresh gate.
    async fn refresh_locked(&self) -> Result<Arc<Credential>, ApiError> {
        let current = self
            .tokens
            .current()
            .await
            .ok_or_else(|| ApiError::auth("Not authenticated"))?;
        if current.refresh_token.is_empty() {
            self.tokens.mark_rejected().await;
            return Err(ApiError::auth("Missing refresh token"));
        }

        let body = json!({
            "grant_type": "refresh_token",
            "refresh_token": current.refresh_token,
        });
        let credential = match self.exchange(&body).await {
            Ok(credential) => credential.or_refresh_token(&current.refresh_token),
            Err(e) => {
                if e.is_auth() {
                    warn!(error = %e, "Token refresh rejected");
                    self.tokens.mark_rejected().await;
                }
                return Err(e);
            }
        };

        let credential = self.tokens.replace(credential).await;
        info!(expires_at = %credential.expires_at, "Refreshed access token");
        Ok(credential)
    }

    async fn exchange(&self, body: &Value) -> Result<Credential, ApiError> {
        let data = self
            .request(Method::POST, TOKEN_PATH, Some(body), None)
            .await?;
        Credential::from_token_response(&data, Utc::now())
    }

    async fn authed_get(&self, path: &str) -> Result<Payload, ApiError> {
        let credential = self.ensure_valid_token().await?;
        self.request(Method::GET, path, None, Some(&credential.access_token))
            .await
    }

    async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
        bearer: Option<&str>,
    ) -> Result<Payload, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Requesting {} {}", method, url);

        let mut request = self.client.request(method, &url);
        if let Some(token) = bearer {
            request = request.bearer_auth(token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(ApiError::auth(format!("Auth failed ({})", status.as_u16())));
        }
        if !status.is_success() {
            return Err(ApiError::transient(format!(
                "{path} returned status {status}"
            )));
        }

        let bytes = response.bytes().await?;
        let data: Value = if bytes.iter().all(u8::is_ascii_whitespace) {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).map_err(|e| {
                ApiError::transient(format!("Failed to parse response from {path}: {e}"))
            })?
        };

        Ok(match data {
            Value::Object(map) => map,
            other => Payload::from_iter([("data".to_string(), other)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{BoundSink, CredentialSink, CredentialStore};
    use crate::store::memory::MemoryCredentialStore;
    use chrono::Duration as ChronoDuration;
    use futures::future::join_all;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fresh() -> Credential {
        Credential::new("access-1", "refresh-1", Utc::now() + ChronoDuration::hours(1))
    }

    fn stale() -> Credential {
        Credential::new("access-1", "refresh-1", Utc::now() - ChronoDuration::seconds(5))
    }

    fn client(server: &MockServer, credential: Option<Credential>) -> FinanzguruClient {
        FinanzguruClient::new(&server.uri(), TokenStore::new(credential, None)).unwrap()
    }

    async fn mount_token(server: &MockServer, response: ResponseTemplate, times: u64) {
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .respond_with(response)
            .expect(times)
            .mount(server)
            .await;
    }

    async fn mount_get(server: &MockServer, url_path: &str, response: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(url_path))
            .respond_with(response)
            .mount(server)
            .await;
    }

    fn token_body(access: &str, refresh: Option<&str>) -> Value {
        match refresh {
            Some(refresh) => json!({"access_token": access, "refresh_token": refresh, "expires_in": 3600}),
            None => json!({"access_token": access, "expires_in": 3600}),
        }
    }

    #[tokio::test]
    async fn test_fresh_token_skips_refresh() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200), 0).await;
        let client = client(&server, Some(fresh()));

        let credential = client.ensure_valid_token().await.unwrap();
        assert_eq!(credential.access_token, "access-1");
        assert_eq!(client.token_state().await, TokenState::Valid);
    }

    #[tokio::test]
    async fn test_unauthenticated_fails_without_network() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200), 0).await;
        let client = client(&server, None);

        let err = client.ensure_valid_token().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(client.token_state().await, TokenState::Unauthenticated);
    }

    #[tokio::test]
    async fn test_stale_token_is_refreshed_and_persisted() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(
                json!({"grant_type": "refresh_token", "refresh_token": "refresh-1"}),
            ))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_body("access-2", Some("refresh-2"))),
            )
            .expect(1)
            .mount(&server)
            .await;

        let store = Arc::new(MemoryCredentialStore::new());
        let sink: Arc<dyn CredentialSink> =
            Arc::new(BoundSink::new(store.clone(), "jane@example.org"));
        let client = FinanzguruClient::new(&server.uri(), TokenStore::new(Some(stale()), Some(sink)))
            .unwrap();

        let credential = client.ensure_valid_token().await.unwrap();
        assert_eq!(credential.access_token, "access-2");
        assert_eq!(credential.refresh_token, "refresh-2");
        assert!(credential.is_fresh());

        let persisted = store.load("jane@example.org").await.unwrap().unwrap();
        assert_eq!(persisted, *credential);
    }

    #[tokio::test]
    async fn test_concurrent_callers_share_one_refresh() {
        let server = MockServer::start().await;
        mount_token(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(token_body("access-2", Some("refresh-2")))
                .set_delay(std::time::Duration::from_millis(100)),
            1,
        )
        .await;
        let client = client(&server, Some(stale()));

        let results = join_all((0..8).map(|_| client.ensure_valid_token())).await;

        for result in results {
            assert_eq!(result.unwrap().access_token, "access-2");
        }
        assert_eq!(client.tokens().current().await.unwrap().access_token, "access-2");
    }

    #[tokio::test]
    async fn test_refresh_keeps_refresh_token_when_omitted() {
        let server = MockServer::start().await;
        mount_token(
            &server,
            ResponseTemplate::new(200).set_body_json(token_body("access-2", None)),
            1,
        )
        .await;
        let client = client(&server, Some(stale()));

        let credential = client.ensure_valid_token().await.unwrap();
        assert_eq!(credential.access_token, "access-2");
        assert_eq!(credential.refresh_token, "refresh-1");
    }

    #[tokio::test]
    async fn test_malformed_refresh_response_leaves_credential() {
        let server = MockServer::start().await;
        mount_token(
            &server,
            ResponseTemplate::new(200)
                .set_body_json(json!({"access_token": "access-2", "expires_in": "soon"})),
            1,
        )
        .await;
        let original = stale();
        let client = client(&server, Some(original.clone()));

        let err = client.ensure_valid_token().await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(*client.tokens().current().await.unwrap(), original);
        assert_eq!(client.token_state().await, TokenState::Expired);

        // Rejected sessions fail fast without another refresh attempt.
        assert!(client.ensure_valid_token().await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_rejected_refresh_token_is_auth_error() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(401), 1).await;
        let client = client(&server, Some(stale()));

        let err = client.get_bank_accounts().await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_refresh_server_error_is_transient() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(503), 2).await;
        let client = client(&server, Some(stale()));

        let err = client.ensure_valid_token().await.unwrap_err();
        assert!(!err.is_auth());
        // Transient failures do not poison the session.
        assert!(!client.ensure_valid_token().await.unwrap_err().is_auth());
        assert_eq!(client.token_state().await, TokenState::Valid);
    }

    #[tokio::test]
    async fn test_missing_refresh_token_is_auth_error() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200), 0).await;
        let credential = Credential::new("access-1", "", Utc::now() - ChronoDuration::seconds(1));
        let client = client(&server, Some(credential));

        assert!(client.ensure_valid_token().await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_password_login() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(json!({
                "grant_type": "password",
                "username": "jane@example.org",
                "password": "hunter2"
            })))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(token_body("access-9", Some("refresh-9"))),
            )
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server, None);

        let credential = client
            .login_with_password("jane@example.org", "hunter2")
            .await
            .unwrap();
        assert_eq!(credential.refresh_token, "refresh-9");
        assert_eq!(client.token_state().await, TokenState::Valid);
    }

    #[tokio::test]
    async fn test_refresh_token_login_bad_request_is_transient() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(400), 1).await;
        let client = client(&server, None);

        let err = client.login_with_refresh_token("bogus").await.unwrap_err();
        assert!(!err.is_auth());
        let provisional = client.tokens().current().await.unwrap();
        assert_eq!(provisional.refresh_token, "bogus");
        assert!(!provisional.is_fresh());
    }

    #[tokio::test]
    async fn test_refresh_token_login_exchanges_provisional_credential() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(TOKEN_PATH))
            .and(body_partial_json(
                json!({"grant_type": "refresh_token", "refresh_token": "from-app"}),
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_body("access-7", None)))
            .expect(1)
            .mount(&server)
            .await;
        let store = Arc::new(MemoryCredentialStore::new());
        let sink: Arc<dyn CredentialSink> =
            Arc::new(BoundSink::new(store.clone(), "jane@example.org"));
        let client =
            FinanzguruClient::new(&server.uri(), TokenStore::new(None, Some(sink))).unwrap();

        let credential = client.login_with_refresh_token("from-app").await.unwrap();

        assert_eq!(credential.access_token, "access-7");
        assert_eq!(credential.refresh_token, "from-app");
        assert!(credential.is_fresh());
        // Only the exchanged credential reaches the sink, never the provisional one.
        let stored = store.load("jane@example.org").await.unwrap().unwrap();
        assert_eq!(stored.access_token, "access-7");
    }

    #[tokio::test]
    async fn test_refresh_token_login_rejected_marks_expired() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(401), 1).await;
        let client = client(&server, None);

        let err = client.login_with_refresh_token("revoked").await.unwrap_err();
        assert!(err.is_auth());
        assert_eq!(client.token_state().await, TokenState::Expired);
    }

    #[tokio::test]
    async fn test_refresh_access_token_ignores_remaining_lifetime() {
        let server = MockServer::start().await;
        mount_token(
            &server,
            ResponseTemplate::new(200).set_body_json(token_body("access-2", Some("refresh-2"))),
            1,
        )
        .await;
        let client = client(&server, Some(fresh()));

        let credential = client.refresh_access_token().await.unwrap();

        assert_eq!(credential.access_token, "access-2");
        assert_eq!(credential.refresh_token, "refresh-2");
        assert_eq!(
            client.tokens().current().await.unwrap().access_token,
            "access-2"
        );
    }

    #[tokio::test]
    async fn test_empty_refresh_token_login_skips_network() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200), 0).await;
        let client = client(&server, None);

        let err = client.login_with_refresh_token("").await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_requests_carry_bearer_token() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ACCOUNTS_PATH))
            .and(header("Authorization", "Bearer access-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"monthly": {}})))
            .expect(1)
            .mount(&server)
            .await;
        let client = client(&server, Some(fresh()));

        let accounts = client.get_bank_accounts().await.unwrap();
        assert!(accounts.contains_key("monthly"));
    }

    #[tokio::test]
    async fn test_non_object_body_is_wrapped() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            CONTRACTS_PATH,
            ResponseTemplate::new(200).set_body_json(json!([{"name": "Gym"}])),
        )
        .await;
        mount_get(&server, BUDGETS_PATH, ResponseTemplate::new(200)).await;
        let client = client(&server, Some(fresh()));

        let contracts = client.get_contracts().await.unwrap();
        assert_eq!(contracts["data"], json!([{"name": "Gym"}]));

        let budgets = client.get_budgets().await.unwrap();
        assert_eq!(budgets["data"], Value::Null);
    }

    #[tokio::test]
    async fn test_invalid_json_is_transient() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            ACCOUNTS_PATH,
            ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"),
        )
        .await;
        let client = client(&server, Some(fresh()));

        assert!(!client.get_bank_accounts().await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_overview_forbidden_is_auth_error() {
        let server = MockServer::start().await;
        mount_token(&server, ResponseTemplate::new(200), 0).await;
        mount_get(&server, ACCOUNTS_PATH, ResponseTemplate::new(200).set_body_json(json!({}))).await;
        mount_get(&server, BUDGETS_PATH, ResponseTemplate::new(200).set_body_json(json!({}))).await;
        mount_get(&server, CONTRACTS_PATH, ResponseTemplate::new(403)).await;
        let client = client(&server, Some(fresh()));

        let err = client.get_overview().await.unwrap_err();
        assert!(err.is_auth());
    }

    #[tokio::test]
    async fn test_overview_server_error_is_transient() {
        let server = MockServer::start().await;
        mount_get(&server, ACCOUNTS_PATH, ResponseTemplate::new(200).set_body_json(json!({}))).await;
        mount_get(&server, BUDGETS_PATH, ResponseTemplate::new(500)).await;
        mount_get(&server, CONTRACTS_PATH, ResponseTemplate::new(200).set_body_json(json!({}))).await;
        let client = client(&server, Some(fresh()));

        assert!(!client.get_overview().await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_timeout_is_transient() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            ACCOUNTS_PATH,
            ResponseTemplate::new(200)
                .set_body_json(json!({}))
                .set_delay(std::time::Duration::from_millis(500)),
        )
        .await;
        let client = FinanzguruClient::with_timeout(
            &server.uri(),
            TokenStore::new(Some(fresh()), None),
            std::time::Duration::from_millis(50),
        )
        .unwrap();

        assert!(!client.get_bank_accounts().await.unwrap_err().is_auth());
    }

    #[tokio::test]
    async fn test_fetch_snapshot() {
        let server = MockServer::start().await;
        mount_get(
            &server,
            ACCOUNTS_PATH,
            ResponseTemplate::new(200).set_body_json(json!({
                "analysis": {"monthly": {"expenses": 10, "income": 2500}},
                "today": {"spending": 4.2}
            })),
        )
        .await;
        mount_get(
            &server,
            BUDGETS_PATH,
            ResponseTemplate::new(200).set_body_json(json!({"current": {"spent": 50, "limit": 200}})),
        )
        .await;
        mount_get(
            &server,
            CONTRACTS_PATH,
            ResponseTemplate::new(200).set_body_json(json!({"items": [{"name": "Gym"}]})),
        )
        .await;
        let client = client(&server, Some(fresh()));

        let snapshot = client.fetch_snapshot().await.unwrap();
        assert_eq!(snapshot.monthly.expenses, Some(10.0));
        assert_eq!(snapshot.monthly.income, Some(2500.0));
        assert_eq!(snapshot.today_spending, Some(4.2));
        assert_eq!(snapshot.contracts.len(), 1);
        assert_eq!(snapshot.budget["limit"], json!(200));
    }
}
