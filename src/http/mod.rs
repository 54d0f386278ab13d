//! HTTP client with the credential interceptor chain.
//!
//! Every API call goes through [`ApiClient`], which:
//! - **Request phase**: attaches the store's current token as a bearer
//!   header, unless the caller picked an explicit [`Auth`] variant.
//! - **Response phase**: on `401`, performs one silent refresh against
//!   `POST /api/auth/refresh` (authenticated by the HttpOnly session
//!   cookie riding the client's cookie jar) and replays the original
//!   request exactly once with the fresh token.
//!
//! ## Design
//! - One refresh in flight per client: a `tokio::sync::Mutex` gates the
//!   refresh call, and queued waiters re-check the store after acquiring
//!   it so only the first 401 hits the network.
//! - The replay loop is an explicit two-state machine
//!   ([`RetryState::Initial`] → [`RetryState::RetriedOnce`]); a second
//!   401 surfaces [`SessionError::Unauthorized`] with no further refresh.
//! - Refresh failure (any class) clears the token store, letting the auth
//!   resolver observe the logout.
//! - Every other error class passes through to the caller untouched.

use crate::auth::User;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::token::TokenStore;
use reqwest::{header, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tokio::sync::Mutex;

/// Identity fetch.
pub const ME_PATH: &str = "/api/user/me";
/// Silent refresh; consumes the HttpOnly session cookie.
pub const REFRESH_PATH: &str = "/api/auth/refresh";
/// Remote session invalidation.
pub const LOGOUT_PATH: &str = "/api/auth/logout";
/// Credential login; mints the access token and the session cookie.
pub const LOGIN_PATH: &str = "/api/auth/login";

/// How a request should be authenticated. Exhaustive on purpose: callers
/// state what they want instead of relying on header-presence guesswork.
#[derive(Debug, Clone)]
pub enum Auth {
    /// Attach the store's current token when one is present, and recover
    /// from a 401 via silent refresh.
    Auto,
    /// Send without credentials (login, public boards).
    NoAuth,
    /// Caller-supplied bearer token. Never overridden: no refresh, no
    /// replay.
    Bearer(String),
}

/// Per-request replay machine. One refresh-and-replay, never more, so a
/// backend that keeps answering 401 cannot trap us in a loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RetryState {
    Initial,
    RetriedOnce,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    access_token: String,
}

/// HTTP client for the Pongdang backend.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    tokens: TokenStore,
    /// Gate ensuring a single refresh call per client; concurrent 401s
    /// queue here instead of issuing duplicate refreshes.
    refresh_gate: Mutex<()>,
}

impl ApiClient {
    /// Build a client over the given token store. The cookie jar is
    /// enabled so the backend's refresh cookie persists across calls.
    pub fn new(config: &SessionConfig, tokens: TokenStore) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .cookie_store(true)
            .timeout(config.timeout)
            .build()?;

        tracing::debug!(
            base_url = %config.base_url,
            cookie = %config.cookie_name,
            "api client ready; refresh cookie rides the shared jar"
        );

        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            tokens,
            refresh_gate: Mutex::new(()),
        })
    }

    /// The token store this client reads from and refreshes into.
    pub fn tokens(&self) -> &TokenStore {
        &self.tokens
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    // ── Interceptor chain ────────────────────────────────────────────

    /// Issue a request through the interceptor chain.
    ///
    /// Returns the response for every status except 401. A 401 under
    /// [`Auth::Auto`] triggers the one-shot refresh-and-replay; if that
    /// cannot produce an authorized response the call ends in
    /// [`SessionError::Unauthorized`].
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&serde_json::Value>,
        auth: &Auth,
    ) -> Result<reqwest::Response, SessionError> {
        let mut state = RetryState::Initial;

        loop {
            let attached = match auth {
                Auth::Auto => self.tokens.get(),
                Auth::NoAuth => None,
                Auth::Bearer(token) => Some(token.clone()),
            };

            let mut req = self.http.request(method.clone(), self.url(path));
            if let Some(token) = &attached {
                req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
            }
            if let Some(json) = body {
                req = req.json(json);
            }

            let resp = req.send().await?;
            if resp.status() != StatusCode::UNAUTHORIZED {
                return Ok(resp);
            }

            match (state, auth) {
                // Replay already spent, or nothing to refresh on behalf of.
                (RetryState::RetriedOnce, _) | (_, Auth::NoAuth | Auth::Bearer(_)) => {
                    return Err(SessionError::Unauthorized);
                }
                (RetryState::Initial, Auth::Auto) => {
                    self.refresh_after_unauthorized(attached.as_deref())
                        .await?;
                    state = RetryState::RetriedOnce;
                }
            }
        }
    }

    /// Recover from a 401: refresh once, or adopt a refresh that another
    /// caller finished while we queued on the gate.
    async fn refresh_after_unauthorized(
        &self,
        failed_token: Option<&str>,
    ) -> Result<(), SessionError> {
        let _gate = self.refresh_gate.lock().await;

        // A queued waiter whose token already changed rides the fresh one.
        if let Some(current) = self.tokens.get() {
            if Some(current.as_str()) != failed_token {
                tracing::debug!("another caller refreshed while we waited; reusing its token");
                return Ok(());
            }
        }

        match self.refresh().await {
            Ok(token) => {
                tracing::debug!("silent refresh succeeded");
                self.tokens.set(Some(token));
                Ok(())
            }
            Err(err) => {
                tracing::warn!(error = %err, "silent refresh failed; clearing local credential");
                self.tokens.clear();
                Err(SessionError::Unauthorized)
            }
        }
    }

    /// Call the refresh endpoint. Relies on the persisted session cookie;
    /// no client-held refresh token exists.
    async fn refresh(&self) -> Result<String, SessionError> {
        let resp = self.http.post(self.url(REFRESH_PATH)).send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::Http {
                status: status.as_u16(),
                body,
            });
        }

        let body: RefreshResponse = resp.json().await?;
        if body.access_token.trim().is_empty() {
            return Err(SessionError::Unauthorized);
        }
        Ok(body.access_token)
    }

    // ── JSON helpers ─────────────────────────────────────────────────

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        auth: &Auth,
    ) -> Result<T, SessionError> {
        let resp = self.request(Method::GET, path, None, auth).await?;
        Self::decode(resp).await
    }

    pub async fn post_json<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &serde_json::Value,
        auth: &Auth,
    ) -> Result<T, SessionError> {
        let resp = self.request(Method::POST, path, Some(body), auth).await?;
        Self::decode(resp).await
    }

    async fn decode<T: DeserializeOwned>(resp: reqwest::Response) -> Result<T, SessionError> {
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(resp.json::<T>().await?)
    }

    // ── Session endpoints ────────────────────────────────────────────

    /// Fetch the current identity. 401 recovery happens transparently.
    pub async fn fetch_me(&self) -> Result<User, SessionError> {
        self.get_json(ME_PATH, &Auth::Auto).await
    }

    /// Credential login. On success the minted access token lands in the
    /// store, whose notification drives the resolver to refetch identity.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), SessionError> {
        let body = serde_json::json!({ "email": email, "password": password });
        let minted: RefreshResponse = self.post_json(LOGIN_PATH, &body, &Auth::NoAuth).await?;
        self.tokens.set(Some(minted.access_token));
        Ok(())
    }

    /// Remote session invalidation. Deliberately bypasses the interceptor:
    /// a logout must never trigger a refresh.
    pub async fn logout(&self) -> Result<(), SessionError> {
        let mut req = self.http.delete(self.url(LOGOUT_PATH));
        if let Some(token) = self.tokens.get() {
            req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SessionError::Http {
                status: status.as_u16(),
                body,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Role;
    use std::sync::Arc;
    use std::time::Duration;
    use wiremock::matchers::{header, header_exists, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer, token: Option<&str>) -> ApiClient {
        let tokens = TokenStore::in_memory();
        if let Some(token) = token {
            tokens.set(Some(token.to_string()));
        }
        let config = SessionConfig::new(server.uri(), "/tmp/unused");
        ApiClient::new(&config, tokens).unwrap()
    }

    fn me_body(nickname: &str) -> serde_json::Value {
        serde_json::json!({
            "id": "u_1",
            "nickname": nickname,
            "role": "user",
            "point": 100,
            "profileComplete": true
        })
    }

    #[tokio::test]
    async fn test_bearer_header_attached_from_store() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("Authorization", "Bearer tok_live"))
            .respond_with(ResponseTemplate::new(200).set_body_json(me_body("pong")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_live"));
        let user = client.fetch_me().await.unwrap();
        assert_eq!(user.nickname, "pong");
        assert_eq!(user.role, Role::User);
    }

    #[tokio::test]
    async fn test_no_auth_sends_no_authorization_header() {
        let server = MockServer::start().await;
        // A request carrying any Authorization header hits this mock and
        // fails the assertion below.
        Mock::given(method("GET"))
            .and(path("/api/board"))
            .and(header_exists("Authorization"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/board"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([])))
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_live"));
        let resp = client
            .request(Method::GET, "/api/board", None, &Auth::NoAuth)
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_401_refreshes_and_replays_once() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("Authorization", "Bearer tok_stale"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "accessToken": "tok_fresh" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("Authorization", "Bearer tok_fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(me_body("pong")))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_stale"));
        let user = client.fetch_me().await.unwrap();
        assert_eq!(user.nickname, "pong");
        assert_eq!(client.tokens().get().as_deref(), Some("tok_fresh"));
    }

    #[tokio::test]
    async fn test_replay_that_still_401s_surfaces_without_second_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .respond_with(ResponseTemplate::new(401))
            .expect(2)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "accessToken": "tok_fresh" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_stale"));
        let err = client.fetch_me().await.unwrap_err();
        assert!(err.is_unauthorized());
    }

    #[tokio::test]
    async fn test_refresh_failure_clears_token_and_surfaces_auth_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_stale"));
        let err = client.fetch_me().await.unwrap_err();
        assert!(err.is_unauthorized());
        assert_eq!(client.tokens().get(), None);
    }

    #[tokio::test]
    async fn test_concurrent_401s_share_a_single_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("Authorization", "Bearer tok_stale"))
            .respond_with(ResponseTemplate::new(401).set_delay(Duration::from_millis(50)))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_delay(Duration::from_millis(50))
                    .set_body_json(serde_json::json!({ "accessToken": "tok_fresh" })),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("Authorization", "Bearer tok_fresh"))
            .respond_with(ResponseTemplate::new(200).set_body_json(me_body("pong")))
            .expect(2)
            .mount(&server)
            .await;

        let client = Arc::new(client_for(&server, Some("tok_stale")));
        let (a, b) = tokio::join!(client.fetch_me(), client.fetch_me());
        assert_eq!(a.unwrap().nickname, "pong");
        assert_eq!(b.unwrap().nickname, "pong");
    }

    #[tokio::test]
    async fn test_non_auth_errors_pass_through_without_refresh() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_live"));
        match client.fetch_me().await.unwrap_err() {
            SessionError::Http { status, body } => {
                assert_eq!(status, 500);
                assert_eq!(body, "boom");
            }
            other => panic!("expected Http error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_caller_bearer_is_never_refreshed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(ME_PATH))
            .and(header("Authorization", "Bearer tok_custom"))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_live"));
        let err = client
            .get_json::<User>(ME_PATH, &Auth::Bearer("tok_custom".into()))
            .await
            .unwrap_err();
        assert!(err.is_unauthorized());
        // The store token survived untouched.
        assert_eq!(client.tokens().get().as_deref(), Some("tok_live"));
    }

    #[tokio::test]
    async fn test_login_stores_minted_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(LOGIN_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "accessToken": "tok_minted" })),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server, None);
        client.login("frog@pongdang.app", "ribbit").await.unwrap();
        assert_eq!(client.tokens().get().as_deref(), Some("tok_minted"));
    }

    #[tokio::test]
    async fn test_logout_does_not_touch_interceptor() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path(LOGOUT_PATH))
            .respond_with(ResponseTemplate::new(401))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path(REFRESH_PATH))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let client = client_for(&server, Some("tok_live"));
        assert!(client.logout().await.is_err());
    }
}
