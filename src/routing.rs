//! Per-provider network routing.
//!
//! A [`RoutingPolicy`] decides whether a provider's traffic goes through the
//! configured proxy or straight out. [`HttpPool`] owns one client per route and
//! hands out [`RoutedClient`]s bound to a provider. A proxied request that
//! fails at the transport level (connect, timeout, TLS) is retried once on the
//! direct client before the failure is reported.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::header::{ACCEPT, HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, Proxy, Response};
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::RoutingConfig;
use crate::provider::ProviderError;
use crate::user_agent::{self, BROWSER_USER_AGENT};

/// Local proxy used when proxying is enabled but nothing else is configured.
pub const DEFAULT_LOCAL_PROXY: &str = "http://127.0.0.1:7897";

/// Providers that bypass the proxy unless configured otherwise.
pub const DEFAULT_DIRECT_PROVIDERS: [&str; 3] = ["scihub", "google-scholar", "researchgate"];

/// Environment variables consulted for a proxy URL, in order.
const PROXY_ENV_VARS: [&str; 6] = [
    "ALL_PROXY",
    "all_proxy",
    "HTTPS_PROXY",
    "https_proxy",
    "HTTP_PROXY",
    "http_proxy",
];

const CONNECT_TIMEOUT_SECS: u64 = 10;

/// Error text fragments that mark a transport failure as proxy-related.
const PROXY_FAILURE_HINTS: [&str; 5] = ["proxy", "connect", "tls", "ssl", "certificate"];

/// Errors raised while building the HTTP pool.
#[derive(Debug, Error)]
pub enum RoutingError {
    /// Proxy URL was rejected by the HTTP client.
    #[error("invalid proxy URL '{url}': {source}")]
    InvalidProxy {
        /// Offending URL
        url: String,
        /// Client error
        #[source]
        source: reqwest::Error,
    },

    /// HTTP client could not be constructed.
    #[error("failed to build {route} HTTP client: {source}")]
    ClientBuild {
        /// "direct" or "proxied"
        route: &'static str,
        /// Client error
        #[source]
        source: reqwest::Error,
    },
}

/// Network path for a provider's requests.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    /// No proxy.
    Direct,
    /// Through the given proxy.
    Proxied(String),
}

impl std::fmt::Display for Route {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Direct => f.write_str("direct"),
            Self::Proxied(url) => write!(f, "proxy {url}"),
        }
    }
}

/// Maps provider names onto routes.
#[derive(Debug, Clone, Default)]
pub struct RoutingPolicy {
    proxy_url: Option<String>,
    direct_providers: BTreeSet<String>,
}

impl RoutingPolicy {
    /// Policy that sends every provider direct.
    #[must_use]
    pub fn direct_only() -> Self {
        Self::default()
    }

    /// Policy proxying every provider except those in `direct_providers`.
    #[must_use]
    pub fn new<I, S>(proxy_url: Option<String>, direct_providers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            proxy_url: proxy_url.filter(|url| !url.trim().is_empty()),
            direct_providers: direct_providers.into_iter().map(Into::into).collect(),
        }
    }

    /// Builds a policy from configuration plus proxy environment variables.
    #[must_use]
    pub fn from_config(config: &RoutingConfig) -> Self {
        Self::from_config_with_env(config, |name| std::env::var(name).ok())
    }

    fn from_config_with_env(config: &RoutingConfig, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let proxy_url = if config.proxy_enabled {
            Some(resolve_proxy_url(config.proxy_url.as_deref(), lookup))
        } else {
            None
        };
        Self::new(proxy_url, config.direct_providers.iter().cloned())
    }

    /// Route for `provider`.
    #[must_use]
    pub fn route_for(&self, provider: &str) -> Route {
        match &self.proxy_url {
            Some(url) if !self.direct_providers.contains(provider) => Route::Proxied(url.clone()),
            _ => Route::Direct,
        }
    }

    /// Configured proxy URL, if proxying is enabled.
    #[must_use]
    pub fn proxy_url(&self) -> Option<&str> {
        self.proxy_url.as_deref()
    }
}

/// Explicit value, then environment, then [`DEFAULT_LOCAL_PROXY`].
fn resolve_proxy_url(explicit: Option<&str>, lookup: impl Fn(&str) -> Option<String>) -> String {
    explicit
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
        .or_else(|| {
            PROXY_ENV_VARS.iter().find_map(|name| {
                lookup(name)
                    .map(|value| value.trim().to_string())
                    .filter(|value| !value.is_empty())
            })
        })
        .unwrap_or_else(|| DEFAULT_LOCAL_PROXY.to_string())
}

/// Which User-Agent a request presents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    /// Identifying tool UA for query APIs.
    Api,
    /// Browser UA for scrape targets, mirrors, and artifact hosts.
    Browser,
}

/// Per-request options.
#[derive(Debug, Clone)]
pub struct RequestSpec {
    timeout: Duration,
    identity: Identity,
    headers: HeaderMap,
}

impl RequestSpec {
    /// JSON/API request with the tool UA.
    #[must_use]
    pub fn api(timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        Self {
            timeout,
            identity: Identity::Api,
            headers,
        }
    }

    /// Page or artifact request with a browser UA.
    #[must_use]
    pub fn browser(timeout: Duration) -> Self {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml,application/pdf;q=0.9,*/*;q=0.8"),
        );
        Self {
            timeout,
            identity: Identity::Browser,
            headers,
        }
    }

    /// Adds or replaces a header.
    #[must_use]
    pub fn header(mut self, name: HeaderName, value: HeaderValue) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Request timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    fn user_agent(&self) -> HeaderValue {
        match self.identity {
            Identity::Browser => HeaderValue::from_static(BROWSER_USER_AGENT),
            Identity::Api => HeaderValue::from_str(&user_agent::default_api_user_agent())
                .unwrap_or_else(|_| HeaderValue::from_static("paperfetch")),
        }
    }
}

/// Shared HTTP clients: one direct, optionally one proxied.
pub struct HttpPool {
    policy: RoutingPolicy,
    direct: Client,
    proxied: Option<Client>,
    direct_fallbacks: AtomicUsize,
}

impl std::fmt::Debug for HttpPool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpPool")
            .field("policy", &self.policy)
            .field("proxied", &self.proxied.is_some())
            .finish_non_exhaustive()
    }
}

impl HttpPool {
    /// Builds the clients the policy needs.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the proxy URL is invalid or a client fails to build.
    pub fn new(policy: RoutingPolicy) -> Result<Self, RoutingError> {
        let direct = base_builder()
            .no_proxy()
            .build()
            .map_err(|source| RoutingError::ClientBuild {
                route: "direct",
                source,
            })?;

        let proxied = match policy.proxy_url() {
            Some(url) => {
                let proxy = Proxy::all(url).map_err(|source| RoutingError::InvalidProxy {
                    url: url.to_string(),
                    source,
                })?;
                let client = base_builder()
                    .proxy(proxy)
                    .build()
                    .map_err(|source| RoutingError::ClientBuild {
                        route: "proxied",
                        source,
                    })?;
                Some(client)
            }
            None => None,
        };

        Ok(Self {
            policy,
            direct,
            proxied,
            direct_fallbacks: AtomicUsize::new(0),
        })
    }

    /// Pool with direct routing only.
    ///
    /// # Errors
    ///
    /// Returns [`RoutingError`] if the client fails to build.
    pub fn direct_only() -> Result<Self, RoutingError> {
        Self::new(RoutingPolicy::direct_only())
    }

    /// Client bound to `provider` and its route.
    #[must_use]
    pub fn client_for(self: &Arc<Self>, provider: &str) -> RoutedClient {
        RoutedClient {
            pool: Arc::clone(self),
            provider: provider.to_string(),
            route: self.policy.route_for(provider),
        }
    }

    /// Routing policy in force.
    #[must_use]
    pub fn policy(&self) -> &RoutingPolicy {
        &self.policy
    }

    /// Number of proxied requests that were retried direct.
    #[must_use]
    pub fn direct_fallback_count(&self) -> usize {
        self.direct_fallbacks.load(Ordering::Relaxed)
    }
}

fn base_builder() -> ClientBuilder {
    Client::builder()
        .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
        .cookie_store(true)
        .gzip(true)
}

/// HTTP client bound to one provider's route.
#[derive(Debug, Clone)]
pub struct RoutedClient {
    pool: Arc<HttpPool>,
    provider: String,
    route: Route,
}

impl RoutedClient {
    /// Provider this client issues requests for.
    #[must_use]
    pub fn provider(&self) -> &str {
        &self.provider
    }

    /// Route this client uses.
    #[must_use]
    pub fn route(&self) -> &Route {
        &self.route
    }

    /// Sends a GET and returns the response whatever its status.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::Network`] when the request fails on every
    /// available route.
    pub async fn get(&self, url: &str, spec: &RequestSpec) -> Result<Response, ProviderError> {
        let proxied = match (&self.route, &self.pool.proxied) {
            (Route::Proxied(_), Some(client)) => client,
            _ => return self.send(&self.pool.direct, url, spec).await,
        };

        match self.send_raw(proxied, url, spec).await {
            Ok(response) => Ok(response),
            Err(error) if is_proxy_failure(&error) => {
                warn!(
                    provider = %self.provider,
                    url,
                    error = %error,
                    "proxied request failed; retrying direct"
                );
                self.pool.direct_fallbacks.fetch_add(1, Ordering::Relaxed);
                self.send(&self.pool.direct, url, spec).await
            }
            Err(error) => Err(ProviderError::network(&self.provider, url, &error)),
        }
    }

    /// Sends a GET and fails on non-success status.
    ///
    /// # Errors
    ///
    /// Returns [`ProviderError::HttpStatus`] for non-2xx responses, otherwise
    /// as [`Self::get`].
    pub async fn get_success(
        &self,
        url: &str,
        spec: &RequestSpec,
    ) -> Result<Response, ProviderError> {
        let response = self.get(url, spec).await?;
        let status = response.status();
        if status.is_success() {
            Ok(response)
        } else {
            Err(ProviderError::http_status(&self.provider, url, status.as_u16()))
        }
    }

    /// Fetches `url` and returns the body as text.
    ///
    /// # Errors
    ///
    /// As [`Self::get_success`], plus [`ProviderError::Network`] when the body
    /// cannot be read.
    pub async fn get_text(&self, url: &str, spec: &RequestSpec) -> Result<String, ProviderError> {
        let response = self.get_success(url, spec).await?;
        response
            .text()
            .await
            .map_err(|error| ProviderError::network(&self.provider, url, &error))
    }

    async fn send(
        &self,
        client: &Client,
        url: &str,
        spec: &RequestSpec,
    ) -> Result<Response, ProviderError> {
        self.send_raw(client, url, spec)
            .await
            .map_err(|error| ProviderError::network(&self.provider, url, &error))
    }

    async fn send_raw(
        &self,
        client: &Client,
        url: &str,
        spec: &RequestSpec,
    ) -> Result<Response, reqwest::Error> {
        debug!(provider = %self.provider, route = %self.route, url, "GET");
        client
            .get(url)
            .timeout(spec.timeout)
            .header(USER_AGENT, spec.user_agent())
            .headers(spec.headers.clone())
            .send()
            .await
    }
}

/// Connect failures, timeouts, and TLS or proxy errors anywhere in the chain.
fn is_proxy_failure(error: &reqwest::Error) -> bool {
    if error.is_connect() || error.is_timeout() {
        return true;
    }
    let mut source: Option<&(dyn std::error::Error + 'static)> = Some(error);
    while let Some(current) = source {
        let text = current.to_string().to_ascii_lowercase();
        if PROXY_FAILURE_HINTS.iter().any(|hint| text.contains(hint)) {
            return true;
        }
        source = current.source();
    }
    false
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::test_support::socket_guard::start_mock_server_or_skip;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, ResponseTemplate};

    fn no_env(_: &str) -> Option<String> {
        None
    }

    #[test]
    fn test_route_for_direct_list_bypasses_proxy() {
        let policy = RoutingPolicy::new(Some("http://proxy:8080".to_string()), ["scihub"]);
        assert_eq!(policy.route_for("scihub"), Route::Direct);
        assert_eq!(
            policy.route_for("unpaywall"),
            Route::Proxied("http://proxy:8080".to_string())
        );
    }

    #[test]
    fn test_direct_only_policy_never_proxies() {
        let policy = RoutingPolicy::direct_only();
        assert_eq!(policy.route_for("unpaywall"), Route::Direct);
        assert_eq!(policy.proxy_url(), None);
    }

    #[test]
    fn test_from_config_disabled_proxy_is_direct() {
        let config = RoutingConfig {
            proxy_enabled: false,
            proxy_url: Some("http://proxy:1".to_string()),
            direct_providers: Vec::new(),
        };
        let policy = RoutingPolicy::from_config_with_env(&config, no_env);
        assert_eq!(policy.route_for("arxiv"), Route::Direct);
    }

    #[test]
    fn test_proxy_resolution_order() {
        let env = |name: &str| match name {
            "HTTPS_PROXY" => Some("http://https-proxy:3128".to_string()),
            "ALL_PROXY" => Some("  ".to_string()),
            _ => None,
        };
        assert_eq!(
            resolve_proxy_url(Some("http://explicit:1"), env),
            "http://explicit:1"
        );
        assert_eq!(resolve_proxy_url(None, env), "http://https-proxy:3128");
        assert_eq!(resolve_proxy_url(None, no_env), DEFAULT_LOCAL_PROXY);
    }

    #[test]
    fn test_default_routing_config_sends_scrapers_direct() {
        let policy = RoutingPolicy::from_config_with_env(&RoutingConfig::default(), no_env);
        for name in DEFAULT_DIRECT_PROVIDERS {
            assert_eq!(policy.route_for(name), Route::Direct, "{name}");
        }
        assert_eq!(
            policy.route_for("unpaywall"),
            Route::Proxied(DEFAULT_LOCAL_PROXY.to_string())
        );
    }

    #[test]
    fn test_invalid_proxy_url_rejected() {
        let policy = RoutingPolicy::new(Some("::not a proxy::".to_string()), Vec::<String>::new());
        let err = HttpPool::new(policy).unwrap_err();
        assert!(matches!(err, RoutingError::InvalidProxy { .. }), "{err}");
    }

    #[tokio::test]
    async fn test_proxied_request_falls_back_to_direct_on_dead_proxy() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/ping"))
            .respond_with(ResponseTemplate::new(200).set_body_string("pong"))
            .mount(&server)
            .await;

        // Port 1 is never listening, so the proxy connect fails immediately.
        let policy = RoutingPolicy::new(Some("http://127.0.0.1:1".to_string()), Vec::<String>::new());
        let pool = Arc::new(HttpPool::new(policy).unwrap());
        let client = pool.client_for("unpaywall");
        assert!(matches!(client.route(), Route::Proxied(_)));

        let body = client
            .get_text(
                &format!("{}/ping", server.uri()),
                &RequestSpec::api(Duration::from_secs(5)),
            )
            .await
            .unwrap();
        assert_eq!(body, "pong");
        assert_eq!(pool.direct_fallback_count(), 1);
    }

    #[tokio::test]
    async fn test_get_success_maps_status_to_http_error() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/missing"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let pool = Arc::new(HttpPool::direct_only().unwrap());
        let client = pool.client_for("arxiv");
        let err = client
            .get_success(
                &format!("{}/missing", server.uri()),
                &RequestSpec::browser(Duration::from_secs(5)),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::HttpStatus { status: 404, .. }), "{err}");
    }

    #[tokio::test]
    async fn test_browser_identity_sends_browser_user_agent() {
        let Some(server) = start_mock_server_or_skip().await else {
            return;
        };
        Mock::given(method("GET"))
            .and(path("/ua"))
            .and(wiremock::matchers::header("user-agent", BROWSER_USER_AGENT))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let pool = Arc::new(HttpPool::direct_only().unwrap());
        pool.client_for("scihub")
            .get_success(
                &format!("{}/ua", server.uri()),
                &RequestSpec::browser(Duration::from_secs(5)),
            )
            .await
            .unwrap();
    }
}
