//! Menu service orchestration
//!
//! `MenuService` combines the fetcher, two caches and the tree transformations
//! to answer the two questions the UI asks: which menu should this user see,
//! and may this user open a given entry.
//!
//! Policies:
//! - Menu trees are cached per token after a successful fetch. When the fetch
//!   fails and fallback is enabled, the static local tree is returned without
//!   being cached, so the next call tries the network again.
//! - Permission checks fail closed: any error answers `false`.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use tracing::{debug, info, warn};

use crate::cache::Cache;
use crate::data::fetcher::{DEFAULT_BASE_URL, DEFAULT_REQUEST_TIMEOUT};
use crate::data::{default_fallback_menus, FetchError, MenuFetcher, MenuNode};
use crate::transform::{filter_by_permission, filter_visible};

/// Cache key used when no token is supplied; token keys live under `menus:token:`
const ANONYMOUS_CACHE_KEY: &str = "menus:anonymous";

/// Wait before the n-th retry, saturating instead of overflowing
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.saturating_mul(attempt)
}

/// Configuration for a [`MenuService`]
#[derive(Debug, Clone)]
pub struct MenuServiceConfig {
    /// Base URL of the menu service API
    pub api_base_url: String,
    /// Serve the local fallback tree when fetching fails
    pub fallback_to_local: bool,
    /// Freshness window for cached menus and permission answers
    pub cache_ttl: Duration,
    /// When false every permission check answers `true` without a request
    pub enable_permission_check: bool,
    /// Extra attempts after a retryable menu fetch failure
    pub retry_attempts: u32,
    /// Delay before the first retry; later retries wait proportionally longer
    pub retry_base_delay: Duration,
    /// Timeout for each HTTP request
    pub request_timeout: Duration,
}

impl Default for MenuServiceConfig {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_BASE_URL.to_string(),
            fallback_to_local: true,
            cache_ttl: Duration::from_secs(300), // 5 minutes
            enable_permission_check: true,
            retry_attempts: 2,
            retry_base_delay: Duration::from_millis(500),
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }
}

impl MenuServiceConfig {
    /// Creates a configuration for the given API base URL with default values
    #[must_use]
    pub fn new(api_base_url: impl Into<String>) -> Self {
        Self {
            api_base_url: api_base_url.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_fallback_to_local(mut self, enabled: bool) -> Self {
        self.fallback_to_local = enabled;
        self
    }

    #[must_use]
    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    #[must_use]
    pub fn with_permission_check(mut self, enabled: bool) -> Self {
        self.enable_permission_check = enabled;
        self
    }

    /// Sets how many times a failed menu fetch is repeated and the base delay
    #[must_use]
    pub fn with_retries(mut self, attempts: u32, base_delay: Duration) -> Self {
        self.retry_attempts = attempts;
        self.retry_base_delay = base_delay;
        self
    }

    #[must_use]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }
}

/// Snapshot of the service's cache occupancy
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub menu_entries: usize,
    pub permission_entries: usize,
    /// Menu entries that have not expired yet
    pub fresh_menu_entries: usize,
    /// Permission entries that have not expired yet
    pub fresh_permission_entries: usize,
}

/// Answers menu and permission queries for the UI
#[derive(Debug)]
pub struct MenuService {
    config: MenuServiceConfig,
    fetcher: MenuFetcher,
    menu_cache: Cache<Vec<MenuNode>>,
    permission_cache: Cache<bool>,
    fallback: Vec<MenuNode>,
}

impl MenuService {
    /// Creates a new MenuService with the built-in fallback tree
    ///
    /// # Returns
    /// * `Err(FetchError::Network)` if the HTTP client cannot be built
    pub fn new(config: MenuServiceConfig) -> Result<Self, FetchError> {
        let fetcher = MenuFetcher::new(config.api_base_url.clone(), config.request_timeout)?;
        Ok(Self::with_fetcher(config, fetcher))
    }

    /// Creates a new MenuService around an existing fetcher
    pub fn with_fetcher(config: MenuServiceConfig, fetcher: MenuFetcher) -> Self {
        Self {
            config,
            fetcher,
            menu_cache: Cache::new(),
            permission_cache: Cache::new(),
            fallback: default_fallback_menus(),
        }
    }

    /// Replaces the tree served when the menu service is unreachable
    pub fn with_fallback_menus(mut self, menus: Vec<MenuNode>) -> Self {
        self.fallback = menus;
        self
    }

    pub fn config(&self) -> &MenuServiceConfig {
        &self.config
    }

    /// The underlying fetcher, for the endpoints the service does not cache
    pub fn fetcher(&self) -> &MenuFetcher {
        &self.fetcher
    }

    pub fn fallback_menus(&self) -> &[MenuNode] {
        &self.fallback
    }

    fn menu_cache_key(token: Option<&str>) -> String {
        match token {
            Some(token) => format!("menus:token:{}", token),
            None => ANONYMOUS_CACHE_KEY.to_string(),
        }
    }

    /// The menu id is length-prefixed so no (menu id, token) pair shares a key
    /// with another
    fn permission_cache_key(token: &str, menu_id: &str) -> String {
        format!("permission:{}:{}:{}", menu_id.len(), menu_id, token)
    }

    /// Returns the menu tree the caller should see
    ///
    /// # Arguments
    /// * `token` - Bearer token of the caller, if any
    ///
    /// # Returns
    /// * `Ok(Vec<MenuNode>)` - Cached tree, freshly fetched tree, or the local
    ///   fallback when fetching failed and fallback is enabled
    /// * `Err(FetchError)` - If fetching failed and fallback is disabled
    ///
    /// # Behavior
    /// - A fresh cache entry is returned as-is
    /// - Otherwise the tree is fetched, retrying retryable failures
    /// - A fetched tree is cached for `cache_ttl`
    /// - The fallback tree is never cached
    pub async fn get_user_menus(&self, token: Option<&str>) -> Result<Vec<MenuNode>, FetchError> {
        let cache_key = Self::menu_cache_key(token);

        if let Some(menus) = self.menu_cache.get(&cache_key) {
            debug!(roots = menus.len(), "using cached menus");
            return Ok(menus);
        }

        match self.fetch_with_retry(token).await {
            Ok(menus) => {
                info!(roots = menus.len(), "loaded menus from server");
                self.menu_cache.put(cache_key, menus.clone(), self.config.cache_ttl);
                Ok(menus)
            }
            Err(err) if self.config.fallback_to_local => {
                warn!(
                    error = %err,
                    roots = self.fallback.len(),
                    "menu fetch failed, using local fallback menus"
                );
                Ok(self.fallback.clone())
            }
            Err(err) => {
                warn!(error = %err, "menu fetch failed");
                Err(err)
            }
        }
    }

    /// Fetches the caller's menus, repeating retryable failures
    ///
    /// Waits `retry_base_delay * n` before the n-th retry.
    async fn fetch_with_retry(&self, token: Option<&str>) -> Result<Vec<MenuNode>, FetchError> {
        let mut attempt = 0;
        loop {
            match self.fetcher.fetch_user_menus(token).await {
                Ok(menus) => return Ok(menus),
                Err(err) if err.is_retryable() && attempt < self.config.retry_attempts => {
                    attempt += 1;
                    let delay = retry_delay(self.config.retry_base_delay, attempt);
                    debug!(attempt, ?delay, error = %err, "retrying menu fetch");
                    tokio::time::sleep(delay).await;
                }
                Err(err) => return Err(err),
            }
        }
    }

    /// Returns the caller's menus without hidden entries
    pub async fn get_visible_menus(
        &self,
        token: Option<&str>,
    ) -> Result<Vec<MenuNode>, FetchError> {
        Ok(filter_visible(&self.get_user_menus(token).await?))
    }

    /// Returns the caller's menus restricted to the given permission grants
    pub async fn get_permitted_menus(
        &self,
        token: Option<&str>,
        granted: &HashSet<String>,
    ) -> Result<Vec<MenuNode>, FetchError> {
        Ok(filter_by_permission(&self.get_user_menus(token).await?, granted))
    }

    /// Whether the caller may open the menu with the given id
    ///
    /// # Behavior
    /// - Always `true` when permission checks are disabled
    /// - `false` without a token: anonymous callers are denied, not allowed
    /// - A fresh cached answer is returned as-is
    /// - A successful answer is cached for `cache_ttl`
    /// - Any failure answers `false` and is not cached
    pub async fn check_permission(&self, token: Option<&str>, menu_id: &str) -> bool {
        if !self.config.enable_permission_check {
            return true;
        }
        let Some(token) = token else {
            debug!(menu_id, "no token, denying menu permission");
            return false;
        };

        let cache_key = Self::permission_cache_key(token, menu_id);
        if let Some(allowed) = self.permission_cache.get(&cache_key) {
            return allowed;
        }

        match self.fetcher.check_permission(Some(token), menu_id).await {
            Ok(allowed) => {
                self.permission_cache
                    .put(cache_key, allowed, self.config.cache_ttl);
                allowed
            }
            Err(err) => {
                warn!(menu_id, error = %err, "permission check failed, denying");
                false
            }
        }
    }

    /// Checks several menus concurrently
    pub async fn check_permissions(
        &self,
        token: Option<&str>,
        menu_ids: &[&str],
    ) -> HashMap<String, bool> {
        let checks = menu_ids
            .iter()
            .map(|menu_id| self.check_permission(token, menu_id));
        let answers = futures::future::join_all(checks).await;

        menu_ids
            .iter()
            .map(|menu_id| menu_id.to_string())
            .zip(answers)
            .collect()
    }

    /// Drops every cached menu tree and permission answer
    pub fn clear_cache(&self) {
        self.menu_cache.clear();
        self.permission_cache.clear();
        debug!("menu caches cleared");
    }

    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            menu_entries: self.menu_cache.len(),
            permission_entries: self.permission_cache.len(),
            fresh_menu_entries: self.menu_cache.fresh_len(),
            fresh_permission_entries: self.permission_cache.fresh_len(),
        }
    }
}
