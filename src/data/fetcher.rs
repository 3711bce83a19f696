//! Menu service API client
//!
//! This module fetches menu trees, permission checks and usage statistics from
//! the menu service and decodes them into our data structures. It performs no
//! caching and no fallback; those policies live in [`crate::service`].

use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response, Url};
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use super::{ApiErrorBody, MenuNode, MenuPermissionCheck, MenuStatsResponse, UserMenuResponse};
use crate::transform::normalize;

/// Default base URL of the menu service API
pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api/v1";

/// Menus visible to the caller
pub const USER_MENUS_PATH: &str = "/auth/user-menus";
/// Single menu permission check
pub const CHECK_MENU_PERMISSION_PATH: &str = "/auth/check-menu-permission";
/// Menu usage statistics
pub const MENU_STATS_PATH: &str = "/auth/menu-stats";
/// Full administrative menu tree
pub const MENU_TREE_PATH: &str = "/menus/tree";
/// Parent of the per-user menu endpoints, `/users/{user_id}/menus`
pub const USERS_PATH: &str = "/users";

/// Default timeout for a single request
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Coarse classification of a [`FetchError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchErrorKind {
    Network,
    Http,
    Decode,
    Request,
}

/// Errors that can occur when talking to the menu service
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connecting, sending or reading failed, including timeouts
    #[error("Network request failed: {0}")]
    Network(#[from] reqwest::Error),

    /// The server answered with a non-success status
    #[error("HTTP {status}: {detail}")]
    Http {
        /// Status code of the response
        status: u16,
        /// Message taken from the error body, or the status reason
        detail: String,
    },

    /// The response body does not have the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The request URL could not be built; nothing was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl FetchError {
    pub fn kind(&self) -> FetchErrorKind {
        match self {
            FetchError::Network(_) => FetchErrorKind::Network,
            FetchError::Http { .. } => FetchErrorKind::Http,
            FetchError::Decode(_) => FetchErrorKind::Decode,
            FetchError::InvalidRequest(_) => FetchErrorKind::Request,
        }
    }

    /// Whether repeating the same request could succeed
    ///
    /// Transport failures and server-side (5xx) errors are retryable; client
    /// errors, undecodable bodies and unbuildable requests are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchError::Network(_) => true,
            FetchError::Http { status, .. } => *status >= 500,
            FetchError::Decode(_) | FetchError::InvalidRequest(_) => false,
        }
    }
}

/// Client for the menu service HTTP API
#[derive(Debug, Clone)]
pub struct MenuFetcher {
    /// HTTP client for making requests
    http_client: Client,
    /// Base URL every endpoint path is appended to
    base_url: String,
}

impl Default for MenuFetcher {
    fn default() -> Self {
        Self::with_client(Client::new(), DEFAULT_BASE_URL)
    }
}

impl MenuFetcher {
    /// Creates a new MenuFetcher for the given base URL
    ///
    /// # Arguments
    /// * `base_url` - API root, e.g. `http://localhost:8080/api/v1`
    /// * `timeout` - Upper bound for each request, connect to last byte
    ///
    /// # Returns
    /// * `Err(FetchError::Network)` if the HTTP client cannot be built
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FetchError> {
        let http_client = Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http_client, base_url))
    }

    /// Creates a new MenuFetcher with a custom HTTP client
    pub fn with_client(http_client: Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http_client,
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// Builds `{base}/users/{user_id}/menus` with `user_id` as one encoded path segment
    ///
    /// Ids that are empty or a dot segment are rejected, since they would not
    /// survive as a segment of their own.
    fn user_menus_url(&self, user_id: &str) -> Result<Url, FetchError> {
        if matches!(user_id, "" | "." | "..") {
            return Err(FetchError::InvalidRequest(format!(
                "user id '{}' is not a valid path segment",
                user_id
            )));
        }

        let mut url = Url::parse(&self.url(USERS_PATH))
            .map_err(|err| FetchError::InvalidRequest(format!("{}: {}", self.base_url, err)))?;
        url.path_segments_mut()
            .map_err(|()| {
                FetchError::InvalidRequest(format!("{} cannot be a base", self.base_url))
            })?
            .push(user_id)
            .push("menus");
        Ok(url)
    }

    /// Adds the bearer credential when a token is given
    fn authorize(request: RequestBuilder, token: Option<&str>) -> RequestBuilder {
        match token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    /// Sends a request and decodes a 2xx JSON body
    ///
    /// Non-2xx responses become [`FetchError::Http`] with the server's
    /// `detail` message when the body carries one.
    async fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, FetchError> {
        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            return Err(Self::http_error(response).await);
        }

        let text = response.text().await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn http_error(response: Response) -> FetchError {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let detail = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|error_body| error_body.message())
            .unwrap_or_else(|_| status.canonical_reason().unwrap_or("Unknown status").to_string());

        debug!(status = status.as_u16(), %detail, "menu service returned an error");

        FetchError::Http {
            status: status.as_u16(),
            detail,
        }
    }

    /// Fetches the caller's menu tree
    ///
    /// # Arguments
    /// * `token` - Bearer token; no Authorization header is sent when `None`
    ///
    /// # Returns
    /// * `Ok(Vec<MenuNode>)` - Normalized menu forest
    /// * `Err(FetchError)` - If the request, the status or the body is bad
    pub async fn fetch_user_menus(&self, token: Option<&str>) -> Result<Vec<MenuNode>, FetchError> {
        Ok(self.fetch_user_menu_response(token).await?.menus)
    }

    /// Fetches the caller's full menu response, including granted permissions
    pub async fn fetch_user_menu_response(
        &self,
        token: Option<&str>,
    ) -> Result<UserMenuResponse, FetchError> {
        let request = Self::authorize(self.http_client.get(self.url(USER_MENUS_PATH)), token);
        let mut response: UserMenuResponse = Self::send_json(request).await?;
        response.menus = normalize(response.menus);

        debug!(
            user_id = %response.user_id,
            roots = response.menus.len(),
            "fetched user menus"
        );

        Ok(response)
    }

    /// Asks the server whether the caller may open a menu
    ///
    /// Errors are returned as-is; callers are expected to treat any failure as
    /// "no permission".
    pub async fn check_permission(
        &self,
        token: Option<&str>,
        menu_id: &str,
    ) -> Result<bool, FetchError> {
        let request = self
            .http_client
            .post(self.url(CHECK_MENU_PERMISSION_PATH))
            .query(&[("menu_id", menu_id)]);
        let check: MenuPermissionCheck = Self::send_json(Self::authorize(request, token)).await?;
        Ok(check.has_permission)
    }

    /// Fetches menu usage statistics for the caller
    pub async fn fetch_menu_stats(
        &self,
        token: Option<&str>,
    ) -> Result<MenuStatsResponse, FetchError> {
        let request = Self::authorize(self.http_client.get(self.url(MENU_STATS_PATH)), token);
        Self::send_json(request).await
    }

    /// Fetches the complete menu tree, regardless of the caller's permissions
    pub async fn fetch_menu_tree(&self, token: Option<&str>) -> Result<Vec<MenuNode>, FetchError> {
        let request = Self::authorize(self.http_client.get(self.url(MENU_TREE_PATH)), token);
        let menus: Vec<MenuNode> = Self::send_json(request).await?;
        Ok(normalize(menus))
    }

    /// Fetches the menu response computed for another user
    ///
    /// `user_id` is percent-encoded, so `/`, `?` or `#` inside it cannot reach
    /// another endpoint.
    pub async fn fetch_user_menus_by_id(
        &self,
        token: Option<&str>,
        user_id: &str,
    ) -> Result<UserMenuResponse, FetchError> {
        let url = self.user_menus_url(user_id)?;
        let request = Self::authorize(self.http_client.get(url), token);
        let mut response: UserMenuResponse = Self::send_json(request).await?;
        response.menus = normalize(response.menus);
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn user_menus_body() -> serde_json::Value {
        json!({
            "user_id": "u-1",
            "user_type": "TENANT",
            "permissions": ["menu:dashboard", "menu:logs"],
            "menus": [
                {"id": "logs", "name": "logs", "title": "日志", "sort_order": 9, "icon": "file", "emoji": "📜"},
                {
                    "id": "dashboard", "name": "dashboard", "title": "总览", "sort_order": 1,
                    "permission": "menu:dashboard", "icon": "dashboard",
                    "children": [
                        {"id": "d2", "name": "d2", "title": "D2", "sort_order": 2},
                        {"id": "d1", "name": "d1", "title": "D1", "sort_order": 1, "emoji": "1️⃣"}
                    ]
                }
            ],
            "updated_at": "2025-01-01T00:00:00Z"
        })
    }

    fn fetcher_for(server: &MockServer) -> MenuFetcher {
        MenuFetcher::new(server.uri(), Duration::from_secs(5)).expect("client should build")
    }

    #[tokio::test]
    async fn test_fetch_user_menus_sends_bearer_and_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user-menus"))
            .and(header("authorization", "Bearer secret-token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_menus_body()))
            .expect(1)
            .mount(&server)
            .await;

        let menus = fetcher_for(&server)
            .fetch_user_menus(Some("secret-token"))
            .await
            .expect("fetch should succeed");

        let root_ids: Vec<&str> = menus.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(root_ids, vec!["dashboard", "logs"]);
        assert_eq!(menus[0].children[0].id, "d1");
        assert_eq!(menus[0].children[0].icon.as_deref(), Some("1️⃣"));
        assert_eq!(menus[0].icon.as_deref(), Some("dashboard"));
        assert_eq!(menus[1].icon.as_deref(), Some("📜"));
    }

    #[tokio::test]
    async fn test_fetch_user_menu_response_keeps_permissions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user-menus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_menus_body()))
            .mount(&server)
            .await;

        let response = fetcher_for(&server)
            .fetch_user_menu_response(Some("t"))
            .await
            .expect("fetch should succeed");

        assert_eq!(response.user_id, "u-1");
        assert_eq!(response.permissions, vec!["menu:dashboard", "menu:logs"]);
        assert_eq!(response.menus[0].id, "dashboard");
    }

    #[tokio::test]
    async fn test_http_error_carries_detail_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user-menus"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"detail": "Token expired"})),
            )
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch_user_menus(Some("old"))
            .await
            .expect_err("401 should fail");

        assert_eq!(err.kind(), FetchErrorKind::Http);
        assert!(!err.is_retryable());
        match err {
            FetchError::Http { status, detail } => {
                assert_eq!(status, 401);
                assert_eq!(detail, "Token expired");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_http_error_with_validation_detail() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/check-menu-permission"))
            .respond_with(ResponseTemplate::new(422).set_body_json(json!({
                "detail": [{"type": "missing", "loc": ["query", "menu_id"], "msg": "Field required"}]
            })))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .check_permission(Some("t"), "")
            .await
            .expect_err("422 should fail");

        assert_eq!(err.to_string(), "HTTP 422: query.menu_id: Field required");
    }

    #[tokio::test]
    async fn test_http_error_without_body_uses_reason() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch_menu_stats(Some("t"))
            .await
            .expect_err("503 should fail");

        assert!(err.is_retryable());
        assert_eq!(err.to_string(), "HTTP 503: Service Unavailable");
    }

    #[tokio::test]
    async fn test_malformed_body_is_decode_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user-menus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"menus": "nope"})))
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch_user_menus(Some("t"))
            .await
            .expect_err("bad body should fail");

        assert_eq!(err.kind(), FetchErrorKind::Decode);
        assert!(!err.is_retryable());
    }

    #[tokio::test]
    async fn test_unreachable_server_is_network_error() {
        let fetcher = MenuFetcher::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();

        let err = fetcher
            .fetch_user_menus(Some("t"))
            .await
            .expect_err("connection should fail");

        assert_eq!(err.kind(), FetchErrorKind::Network);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_timeout_is_network_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(user_menus_body())
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let fetcher = MenuFetcher::new(server.uri(), Duration::from_millis(100)).unwrap();
        let err = fetcher
            .fetch_user_menus(Some("t"))
            .await
            .expect_err("slow response should time out");

        assert_eq!(err.kind(), FetchErrorKind::Network);
    }

    #[tokio::test]
    async fn test_check_permission_posts_menu_id() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/auth/check-menu-permission"))
            .and(query_param("menu_id", "trading_calendar"))
            .and(header("authorization", "Bearer t"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "menu_id": "trading_calendar",
                "permission": "menu:trading_calendar",
                "has_permission": true
            })))
            .expect(1)
            .mount(&server)
            .await;

        let allowed = fetcher_for(&server)
            .check_permission(Some("t"), "trading_calendar")
            .await
            .expect("check should succeed");

        assert!(allowed);
    }

    #[tokio::test]
    async fn test_fetch_menu_stats() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/menu-stats"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "total_menus": 20,
                "accessible_menus": 4,
                "permission_coverage": 20.0,
                "menu_usage": {"dashboard": 12}
            })))
            .mount(&server)
            .await;

        let stats = fetcher_for(&server).fetch_menu_stats(Some("t")).await.unwrap();

        assert_eq!(stats.accessible_menus, 4);
        assert_eq!(stats.menu_usage.get("dashboard"), Some(&12));
    }

    #[tokio::test]
    async fn test_fetch_menu_tree_normalizes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/menus/tree"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "b", "name": "b", "title": "B", "sort_order": 2},
                {"id": "a", "name": "a", "title": "A", "sort_order": 1}
            ])))
            .mount(&server)
            .await;

        let tree = fetcher_for(&server).fetch_menu_tree(Some("t")).await.unwrap();

        assert_eq!(tree[0].id, "a");
        assert_eq!(tree[1].id, "b");
    }

    #[tokio::test]
    async fn test_fetch_user_menus_by_id_substitutes_path() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/u-42/menus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_menus_body()))
            .expect(1)
            .mount(&server)
            .await;

        let response = fetcher_for(&server)
            .fetch_user_menus_by_id(Some("t"), "u-42")
            .await
            .unwrap();

        assert_eq!(response.menus.len(), 2);
    }

    #[tokio::test]
    async fn test_fetch_user_menus_by_id_encodes_user_id() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/users/admin/menus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_menus_body()))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/users/..%2Fusers%2Fadmin%2Fmenus%3F/menus"))
            .respond_with(
                ResponseTemplate::new(404).set_body_json(json!({"detail": "User not found"})),
            )
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher_for(&server)
            .fetch_user_menus_by_id(Some("t"), "../users/admin/menus?")
            .await
            .unwrap_err();

        assert_eq!(err.to_string(), "HTTP 404: User not found");
    }

    #[tokio::test]
    async fn test_fetch_user_menus_by_id_rejects_dot_segments() {
        let server = MockServer::start().await;

        for user_id in ["", ".", ".."] {
            let err = fetcher_for(&server)
                .fetch_user_menus_by_id(Some("t"), user_id)
                .await
                .unwrap_err();

            assert_eq!(err.kind(), FetchErrorKind::Request);
            assert!(!err.is_retryable());
        }
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_fetch_without_token_sends_no_authorization() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/auth/user-menus"))
            .respond_with(ResponseTemplate::new(200).set_body_json(user_menus_body()))
            .expect(1)
            .mount(&server)
            .await;

        fetcher_for(&server).fetch_user_menus(None).await.unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].headers.get("authorization").is_none());
    }

    #[test]
    fn test_user_menus_url_keeps_base_path() {
        let fetcher = MenuFetcher::with_client(Client::new(), "http://example.com/api/v1/");
        let url = fetcher.user_menus_url("a b/c").unwrap();

        assert_eq!(url.as_str(), "http://example.com/api/v1/users/a%20b%2Fc/menus");
    }

    #[test]
    fn test_base_url_trailing_slash_is_trimmed() {
        let fetcher = MenuFetcher::with_client(Client::new(), "http://example.com/api/v1/");
        assert_eq!(fetcher.base_url(), "http://example.com/api/v1");
        assert_eq!(fetcher.url(USER_MENUS_PATH), "http://example.com/api/v1/auth/user-menus");
    }
}
