//! HTTP transport, authentication and delete convergence policy.
//!
//! [`ApiClient`] performs exactly one logical request per call (plus a single
//! resend after a bearer-token refresh on 401). It never interprets status
//! codes; every HTTP response comes back as a [`RawResponse`] so that outcome
//! classification happens in one place.

use crate::config::ProviderConfig;
use crate::query::QueryParams;
use crate::{Error, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Client, ClientBuilder, Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;
use validator::Validate;

const USER_AGENT: &str = concat!("vra-core/", env!("CARGO_PKG_VERSION"));

/// Header carrying the optimistic-concurrency token on reads and updates.
pub const CHANGESET_HEADER: &str = "x-vro-changeset-sha";

/// Query parameter carrying the configured API version.
pub const API_VERSION_PARAM: &str = "apiVersion";

/// Default per-request timeout in seconds
pub const DEFAULT_REQUEST_TIMEOUT: u64 = 30;

/// Default connect timeout in seconds
pub const DEFAULT_CONNECT_TIMEOUT: u64 = 10;

// Connection pool settings

/// Default idle timeout for connection pools
pub const DEFAULT_POOL_IDLE_TIMEOUT: u64 = 90;

/// Default maximum idle connections per host
pub const DEFAULT_POOL_MAX_IDLE_PER_HOST: usize = 10;

// Delete convergence settings

/// Default upper bound on delete retries in seconds (15 minutes)
pub const DEFAULT_DELETE_MAX_WAIT: u64 = 15 * 60;

/// Default pause between delete attempts in milliseconds
pub const DEFAULT_DELETE_INTERVAL_MS: u64 = 5_000;

/// Default cap on the pause between delete attempts in milliseconds
pub const DEFAULT_DELETE_MAX_INTERVAL_MS: u64 = 60_000;

/// Bounds for retrying a delete until the remote side converges.
///
/// Fixed interval by default; set `backoff_multiplier` above 1 for
/// exponential growth capped at `max_interval`. Whatever the schedule, no
/// attempt starts after `max_wait` has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConvergencePolicy {
    /// Total time allowed for the delete, measured from the first attempt
    pub max_wait: Duration,

    /// Pause before the second attempt
    pub interval: Duration,

    /// Cap on the pause between attempts
    pub max_interval: Duration,

    /// Growth factor applied to the pause after each attempt
    pub backoff_multiplier: u32,
}

impl ConvergencePolicy {
    /// Create a policy with the default bounds.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_wait: Duration::from_secs(DEFAULT_DELETE_MAX_WAIT),
            interval: Duration::from_millis(DEFAULT_DELETE_INTERVAL_MS),
            max_interval: Duration::from_millis(DEFAULT_DELETE_MAX_INTERVAL_MS),
            backoff_multiplier: 1,
        }
    }

    /// Set the total time allowed.
    #[must_use]
    pub const fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set the pause between attempts.
    #[must_use]
    pub const fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Set the cap on the pause between attempts.
    #[must_use]
    pub const fn with_max_interval(mut self, max_interval: Duration) -> Self {
        self.max_interval = max_interval;
        self
    }

    /// Set the backoff multiplier.
    #[must_use]
    pub const fn with_backoff_multiplier(mut self, multiplier: u32) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Pause to take after `attempt` requests have been dispatched.
    ///
    /// `interval * multiplier^(attempt - 1)`, capped at `max_interval` (or at
    /// `interval` when the cap is configured below it).
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }

        let factor = self.backoff_multiplier.max(1).saturating_pow(attempt - 1);
        let delay = self.interval.saturating_mul(factor);
        delay.min(self.max_interval.max(self.interval))
    }
}

impl Default for ConvergencePolicy {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&ProviderConfig> for ConvergencePolicy {
    fn from(config: &ProviderConfig) -> Self {
        Self::new()
            .with_max_wait(config.delete_timeout())
            .with_interval(Duration::from_secs(config.delete_poll_interval_secs))
            .with_max_interval(Duration::from_secs(config.delete_max_interval_secs))
            .with_backoff_multiplier(config.delete_backoff_multiplier)
    }
}

/// HTTP client configuration.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,

    /// Connect timeout
    pub connect_timeout: Duration,

    /// Connection pool idle timeout
    pub pool_idle_timeout: Duration,

    /// Maximum idle connections per host
    pub pool_max_idle_per_host: usize,

    /// Enable request logging
    pub enable_logging: bool,

    /// Enable response compression
    pub enable_compression: bool,
}

impl ClientConfig {
    /// Create a new client configuration with default values.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT),
            pool_idle_timeout: Duration::from_secs(DEFAULT_POOL_IDLE_TIMEOUT),
            pool_max_idle_per_host: DEFAULT_POOL_MAX_IDLE_PER_HOST,
            enable_logging: true,
            enable_compression: true,
        }
    }

    /// Set request timeout.
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Set connect timeout.
    #[must_use]
    pub const fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Set connection pool idle timeout.
    #[must_use]
    pub const fn with_pool_idle_timeout(mut self, timeout: Duration) -> Self {
        self.pool_idle_timeout = timeout;
        self
    }

    /// Set maximum idle connections per host.
    #[must_use]
    pub const fn with_pool_max_idle(mut self, max: usize) -> Self {
        self.pool_max_idle_per_host = max;
        self
    }

    /// Enable or disable logging.
    #[must_use]
    pub const fn with_logging(mut self, enabled: bool) -> Self {
        self.enable_logging = enabled;
        self
    }

    /// Enable or disable compression.
    #[must_use]
    pub const fn with_compression(mut self, enabled: bool) -> Self {
        self.enable_compression = enabled;
        self
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Source of bearer tokens.
///
/// The login/refresh exchange lives behind this trait; the transport only asks
/// for the current token and, after a 401, for a fresh one.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenSource: Send + Sync {
    /// Return the token to send with the next request.
    async fn token(&self) -> Result<SecretString>;

    /// Obtain a new token after the server rejected the current one.
    async fn refresh(&self) -> Result<SecretString>;
}

/// Token source that always returns the same bearer token.
#[derive(Clone)]
pub struct StaticToken {
    token: SecretString,
}

impl StaticToken {
    /// Wrap a fixed bearer token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: SecretString::from(token.into()),
        }
    }
}

impl fmt::Debug for StaticToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticToken").finish_non_exhaustive()
    }
}

#[async_trait]
impl TokenSource for StaticToken {
    async fn token(&self) -> Result<SecretString> {
        Ok(self.token.clone())
    }

    async fn refresh(&self) -> Result<SecretString> {
        Err(Error::Unauthorized(
            "static bearer token cannot be refreshed".to_string(),
        ))
    }
}

/// Opaque changeset token returned by reads and echoed on the next update.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    /// Wrap a raw token value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Borrow the raw value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One HTTP response, whatever its status.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status
    pub status: StatusCode,
    /// Changeset token from [`CHANGESET_HEADER`], if the server sent one
    pub version_token: Option<VersionToken>,
    /// Raw body bytes
    pub body: Vec<u8>,
}

impl RawResponse {
    /// Decode the body as JSON. An empty body decodes as `null`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Decode`] if the body does not match `T`.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        let body: &[u8] = if self.body.is_empty() {
            b"null"
        } else {
            &self.body
        };
        serde_json::from_slice(body).map_err(|err| {
            Error::Decode(format!("response with status {}: {err}", self.status))
        })
    }

    /// Body as text, with invalid UTF-8 replaced.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// A single request against the API.
#[derive(Debug, Clone)]
pub struct ApiRequest<'a> {
    method: Method,
    path: &'a str,
    query: QueryParams,
    body: Option<&'a serde_json::Value>,
    version_token: Option<&'a VersionToken>,
}

impl<'a> ApiRequest<'a> {
    /// Start a request for `path`, relative to the client's base URL. The path
    /// may carry its own query string.
    #[must_use]
    pub fn new(method: Method, path: &'a str) -> Self {
        Self {
            method,
            path,
            query: QueryParams::new(),
            body: None,
            version_token: None,
        }
    }

    /// Append query pairs.
    #[must_use]
    pub fn with_query(mut self, query: QueryParams) -> Self {
        self.query = query;
        self
    }

    /// Attach a JSON body.
    #[must_use]
    pub const fn with_body(mut self, body: &'a serde_json::Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Send the changeset header.
    #[must_use]
    pub const fn with_version_token(mut self, token: Option<&'a VersionToken>) -> Self {
        self.version_token = token;
        self
    }

    /// HTTP method of the request.
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path of the request.
    #[must_use]
    pub const fn path(&self) -> &'a str {
        self.path
    }
}

/// Builder for [`ApiClient`].
#[derive(Clone)]
pub struct ApiClientBuilder {
    base_url: Url,
    http_config: ClientConfig,
    insecure: bool,
    ca_file: Option<PathBuf>,
    api_version: Option<String>,
    tokens: Option<Arc<dyn TokenSource>>,
}

impl fmt::Debug for ApiClientBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClientBuilder")
            .field("base_url", &self.base_url.as_str())
            .field("http_config", &self.http_config)
            .field("insecure", &self.insecure)
            .field("ca_file", &self.ca_file)
            .field("api_version", &self.api_version)
            .field("has_tokens", &self.tokens.is_some())
            .finish()
    }
}

impl ApiClientBuilder {
    /// Create a builder for the specified base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the URL cannot be parsed.
    pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
        let mut base_url = Url::parse(base_url.as_ref())?;
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }

        Ok(Self {
            base_url,
            http_config: ClientConfig::new(),
            insecure: false,
            ca_file: None,
            api_version: None,
            tokens: None,
        })
    }

    /// Create a builder pre-populated from provider configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] if the configuration fails validation,
    /// for example when the host is not a valid URL or a timeout is out of
    /// range.
    pub fn from_config(config: &ProviderConfig) -> Result<Self> {
        config.validate()?;
        let url = config.parse_host_url()?;
        let mut builder = Self::new(url.as_str())?
            .with_http_config(ClientConfig::new().with_timeout(config.request_timeout()))
            .with_insecure(config.insecure);
        builder.ca_file.clone_from(&config.ca_file);
        builder.api_version.clone_from(&config.api_version);
        Ok(builder)
    }

    /// Override the HTTP client configuration.
    #[must_use]
    pub fn with_http_config(mut self, config: ClientConfig) -> Self {
        self.http_config = config;
        self
    }

    /// Skip TLS certificate verification.
    #[must_use]
    pub const fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }

    /// Trust an additional PEM bundle.
    #[must_use]
    pub fn with_ca_file(mut self, path: PathBuf) -> Self {
        self.ca_file = Some(path);
        self
    }

    /// Send `apiVersion=<version>` with every request.
    #[must_use]
    pub fn with_api_version(mut self, version: impl Into<String>) -> Self {
        self.api_version = Some(version.into());
        self
    }

    /// Use a fixed bearer token.
    #[must_use]
    pub fn with_token(self, token: impl Into<String>) -> Self {
        self.with_token_source(Arc::new(StaticToken::new(token)))
    }

    /// Use a custom token source.
    #[must_use]
    pub fn with_token_source(mut self, tokens: Arc<dyn TokenSource>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Build the client.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigError`] when no token source was configured, the
    /// CA bundle cannot be loaded, or the HTTP client cannot be constructed.
    pub fn build(self) -> Result<ApiClient> {
        let tokens = self
            .tokens
            .ok_or_else(|| Error::ConfigError("no bearer token source configured".to_string()))?;

        let mut builder = ClientBuilder::new()
            .user_agent(USER_AGENT)
            .timeout(self.http_config.timeout)
            .connect_timeout(self.http_config.connect_timeout)
            .pool_idle_timeout(self.http_config.pool_idle_timeout)
            .pool_max_idle_per_host(self.http_config.pool_max_idle_per_host)
            .gzip(self.http_config.enable_compression);

        if self.insecure {
            warn!(host = %self.base_url, "TLS verification disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }

        if let Some(ca_file) = &self.ca_file {
            debug!("loading CA bundle from {}", ca_file.display());
            let bytes = std::fs::read(ca_file).map_err(|err| {
                Error::ConfigError(format!(
                    "Failed to read CA bundle {}: {err}",
                    ca_file.display()
                ))
            })?;
            let cert = reqwest::Certificate::from_pem(&bytes)
                .map_err(|err| Error::ConfigError(format!("Invalid CA bundle: {err}")))?;
            builder = builder.add_root_certificate(cert);
        }

        let http = builder
            .build()
            .map_err(|err| Error::ConfigError(format!("Failed to build HTTP client: {err}")))?;

        Ok(ApiClient {
            http,
            base_url: self.base_url,
            api_version: self.api_version,
            enable_logging: self.http_config.enable_logging,
            tokens,
        })
    }
}

/// Asynchronous client for the automation REST API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base_url: Url,
    api_version: Option<String>,
    enable_logging: bool,
    tokens: Arc<dyn TokenSource>,
}

impl ApiClient {
    /// Start a builder for `base_url`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the URL cannot be parsed.
    pub fn builder(base_url: impl AsRef<str>) -> Result<ApiClientBuilder> {
        ApiClientBuilder::new(base_url)
    }

    /// Return the base URL.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path and extra query pairs against the base URL.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidEndpoint`] if the path cannot be joined.
    pub fn build_url(&self, path: &str, extra: QueryParams) -> Result<Url> {
        let relative = path.trim_start_matches('/');
        let mut url = self
            .base_url
            .join(relative)
            .map_err(|err| Error::InvalidEndpoint(format!("Invalid path `{path}`: {err}")))?;

        let mut query = extra;
        let has_version = url.query_pairs().any(|(key, _)| key == API_VERSION_PARAM);
        if !has_version && !query.contains(API_VERSION_PARAM) {
            query.push_opt(API_VERSION_PARAM, self.api_version.as_deref());
        }

        if !query.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in query.into_pairs() {
                pairs.append_pair(key, &value);
            }
        }

        Ok(url)
    }

    /// Send `request`, refreshing the bearer token and resending once on 401.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Transport`] or [`Error::Timeout`] when no response was
    /// received, and whatever the token source fails with. HTTP error statuses
    /// are not errors at this level.
    pub async fn execute(&self, request: ApiRequest<'_>) -> Result<RawResponse> {
        let url = self.build_url(request.path, request.query.clone())?;
        let token = self.tokens.token().await?;
        let response = self.send_once(&request, url.clone(), &token).await?;

        if response.status != StatusCode::UNAUTHORIZED {
            return Ok(response);
        }

        warn!(path = %request.path, "request rejected with 401, refreshing bearer token");
        match self.tokens.refresh().await {
            Ok(token) => self.send_once(&request, url, &token).await,
            Err(err) => {
                warn!(error = %err, "bearer token refresh failed");
                Ok(response)
            }
        }
    }

    async fn send_once(
        &self,
        request: &ApiRequest<'_>,
        url: Url,
        token: &SecretString,
    ) -> Result<RawResponse> {
        let mut builder = self
            .http
            .request(request.method.clone(), url)
            .bearer_auth(token.expose_secret())
            .header(ACCEPT, "application/json");

        if let Some(body) = request.body {
            builder = builder.json(body);
        }

        if let Some(version) = request.version_token {
            builder = builder.header(CHANGESET_HEADER, version.as_str());
        }

        if self.enable_logging {
            info!(method = %request.method, path = %request.path, "Sending request");
        }

        let response = builder.send().await?;
        let status = response.status();
        let version_token = response
            .headers()
            .get(CHANGESET_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(VersionToken::new);
        let body = response.bytes().await?.to_vec();

        debug!(method = %request.method, path = %request.path, %status, "Received response");

        Ok(RawResponse {
            status,
            version_token,
            body,
        })
    }
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.base_url.as_str())
            .field("api_version", &self.api_version)
            .finish_non_exhaustive()
    }
}
