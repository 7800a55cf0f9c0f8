//! Authenticated HTTP client
//!
//! [`ApiClient`] sends JSON requests to the configured base URL, attaching
//! the stored access token as a bearer credential. When the server answers
//! 401 the client refreshes the token once and replays the request; any
//! other failure is returned as an [`ApiError`] without retrying.
//!
//! # Example
//!
//! ```no_run
//! use clinic_api_client::{ApiClient, ClientConfig, RequestOptions};
//! use serde_json::Value;
//!
//! # async fn example() -> clinic_api_client::Result<()> {
//! let config = ClientConfig::builder()
//!     .base_url("https://clinic.example.com/api".parse().unwrap())
//!     .build();
//! let client = ApiClient::new(config)?;
//!
//! let options = RequestOptions::new().query("specialtyId", "3");
//! let doctors: Value = client.get("doctors", Some(options)).await?;
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::sync::Arc;

use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use url::Url;

use crate::auth::{CredentialsProvider, TokenRefresher};
use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorKind, Result};
use crate::utils::truncate_for_display;

/// Refresh-and-retry cycles allowed per originating request
const MAX_REFRESH_ATTEMPTS: u32 = 1;

/// Longest server body echoed into the logs
const MAX_LOGGED_BODY: usize = 200;

const JSON_CONTENT_TYPE: &str = "application/json";

/// Per-call request overrides
#[derive(Debug, Clone)]
pub struct RequestOptions {
    headers: Vec<(String, String)>,
    query: Vec<(String, String)>,
    authenticated: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            headers: Vec::new(),
            query: Vec::new(),
            authenticated: true,
        }
    }
}

impl RequestOptions {
    /// Options with no overrides
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a header, overriding a client default of the same name
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((name.into(), value.into()));
        self
    }

    /// Send without a bearer token and without refresh-on-401 (default: true)
    #[must_use]
    pub fn authenticated(mut self, authenticated: bool) -> Self {
        self.authenticated = authenticated;
        self
    }

    /// Whether the request carries credentials
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }
}

/// Description of a request that can be replayed after a token refresh.
///
/// The value is never mutated; [`PendingRequest::retried`] returns a copy
/// with the attempt count incremented.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    method: Method,
    path: String,
    body: Option<Value>,
    options: RequestOptions,
    attempt: u32,
}

impl PendingRequest {
    /// Create a request for `path`, relative to the base URL
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            body: None,
            options: RequestOptions::default(),
            attempt: 0,
        }
    }

    /// Attach a JSON body
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// Attach per-call options
    #[must_use]
    pub fn with_options(mut self, options: RequestOptions) -> Self {
        self.options = options;
        self
    }

    /// HTTP method
    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Path relative to the base URL
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// JSON body, if any
    #[must_use]
    pub fn body(&self) -> Option<&Value> {
        self.body.as_ref()
    }

    /// Number of refresh-and-retry cycles already spent on this request
    #[must_use]
    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    /// The same request, marked as retried once more
    #[must_use]
    pub fn retried(&self) -> Self {
        Self {
            attempt: self.attempt + 1,
            ..self.clone()
        }
    }
}

struct ClientInner {
    http: reqwest::Client,
    base: Url,
    config: ClientConfig,
    provider: CredentialsProvider,
    refresher: TokenRefresher,
}

/// Authenticated API client.
///
/// Cloning is cheap; clones share the HTTP connection pool, the credentials
/// provider and the in-flight refresh.
#[derive(Clone)]
pub struct ApiClient {
    inner: Arc<ClientInner>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("base_url", &self.inner.base.as_str())
            .field("timeout", &self.inner.config.timeout)
            .finish_non_exhaustive()
    }
}

impl ApiClient {
    /// Create a client with an in-memory credential store
    ///
    /// # Errors
    /// Returns a config error if a default header is invalid or the HTTP
    /// client cannot be constructed
    pub fn new(config: ClientConfig) -> Result<Self> {
        Self::with_provider(config, CredentialsProvider::default())
    }

    /// Create a client reading and writing credentials through `provider`
    ///
    /// # Errors
    /// Returns a config error if a default header is invalid or the HTTP
    /// client cannot be constructed
    pub fn with_provider(config: ClientConfig, provider: CredentialsProvider) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(default_headers(&config)?)
            .build()
            .map_err(|e| ApiError::config(format!("Cannot build HTTP client: {e}")))?;

        let base = config.normalized_base();
        let refresh_endpoint = join(&base, &config.refresh_path)?;
        // Plain reqwest client: refresh calls skip bearer injection and 401 handling
        let refresher = TokenRefresher::new(http.clone(), refresh_endpoint, provider.clone());

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base,
                config,
                provider,
                refresher,
            }),
        })
    }

    /// Get the client configuration
    #[must_use]
    pub fn config(&self) -> &ClientConfig {
        &self.inner.config
    }

    /// Get the credentials provider shared with the UI layer
    #[must_use]
    pub fn provider(&self) -> &CredentialsProvider {
        &self.inner.provider
    }

    /// Send a GET request
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for any failure
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        options: Option<RequestOptions>,
    ) -> Result<T> {
        self.send(PendingRequest::new(Method::GET, path).with_options(options.unwrap_or_default()))
            .await
    }

    /// Send a POST request with a JSON body
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for any failure
    pub async fn post<B, T>(
        &self,
        path: &str,
        body: &B,
        options: Option<RequestOptions>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(with_body(Method::POST, path, body, options)?).await
    }

    /// Send a PUT request with a JSON body
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for any failure
    pub async fn put<B, T>(
        &self,
        path: &str,
        body: &B,
        options: Option<RequestOptions>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(with_body(Method::PUT, path, body, options)?).await
    }

    /// Send a PATCH request with a JSON body
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for any failure
    pub async fn patch<B, T>(
        &self,
        path: &str,
        body: &B,
        options: Option<RequestOptions>,
    ) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        self.send(with_body(Method::PATCH, path, body, options)?).await
    }

    /// Send a DELETE request
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for any failure
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        options: Option<RequestOptions>,
    ) -> Result<T> {
        self.send(
            PendingRequest::new(Method::DELETE, path).with_options(options.unwrap_or_default()),
        )
        .await
    }

    /// Send a request, refreshing the access token once on 401.
    ///
    /// A successful response yields only its decoded body. A 401 on a
    /// request that has not been retried triggers the refresh sub-flow; the
    /// request is replayed only if a new token was obtained, otherwise the
    /// original 401 is returned.
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for any failure
    pub async fn send<T: DeserializeOwned>(&self, request: PendingRequest) -> Result<T> {
        let mut token = if request.options.authenticated {
            self.stored_token().await
        } else {
            None
        };
        let mut request = request;

        loop {
            match self.dispatch(&request, token.as_deref()).await {
                Err(err) if should_refresh(&request, &err) => {
                    let Some(fresh) = self.inner.refresher.refresh(token.as_deref()).await else {
                        return Err(err);
                    };
                    tracing::debug!(path = %request.path, "Retrying request with refreshed token");
                    token = Some(fresh);
                    request = request.retried();
                }
                outcome => return outcome,
            }
        }
    }

    async fn stored_token(&self) -> Option<String> {
        match self.inner.provider.access_token().await {
            Ok(token) => token,
            Err(e) => {
                tracing::warn!("Cannot read stored access token, sending without it: {e}");
                None
            }
        }
    }

    async fn dispatch<T: DeserializeOwned>(
        &self,
        request: &PendingRequest,
        token: Option<&str>,
    ) -> Result<T> {
        let url = self.resolve(&request.path)?;

        tracing::debug!(
            method = %request.method,
            path = %request.path,
            attempt = request.attempt,
            "Sending request"
        );

        let mut builder = self.inner.http.request(request.method.clone(), url);
        if !request.options.query.is_empty() {
            builder = builder.query(&request.options.query);
        }
        for (name, value) in &request.options.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(token) = token {
            builder = builder.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            let body = String::from_utf8_lossy(&bytes);
            tracing::debug!(
                status = status.as_u16(),
                body = %truncate_for_display(&body, MAX_LOGGED_BODY),
                "Request failed"
            );
            let mut err = ApiError::from_response(status, &body);
            // Without credentials a 401 is a plain rejection, e.g. a wrong password
            if !request.options.authenticated && err.kind == ErrorKind::AuthExpired {
                err.kind = ErrorKind::Http;
            }
            return Err(err);
        }

        decode(status, &bytes)
    }

    fn resolve(&self, path: &str) -> Result<Url> {
        join(&self.inner.base, path)
    }
}

fn should_refresh(request: &PendingRequest, err: &ApiError) -> bool {
    request.options.authenticated
        && err.status == StatusCode::UNAUTHORIZED.as_u16()
        && request.attempt < MAX_REFRESH_ATTEMPTS
}

fn with_body<B: Serialize + ?Sized>(
    method: Method,
    path: &str,
    body: &B,
    options: Option<RequestOptions>,
) -> Result<PendingRequest> {
    let body = serde_json::to_value(body)
        .map_err(|e| ApiError::config(format!("Cannot serialize request body: {e}")))?;
    Ok(PendingRequest::new(method, path)
        .with_body(body)
        .with_options(options.unwrap_or_default()))
}

fn join(base: &Url, path: &str) -> Result<Url> {
    let url = base.join(path.trim_start_matches('/'))?;
    if url.origin() != base.origin() {
        return Err(ApiError::config(format!(
            "Path '{path}' resolves outside the configured base URL"
        )));
    }
    Ok(url)
}

fn decode<T: DeserializeOwned>(status: StatusCode, bytes: &[u8]) -> Result<T> {
    // Empty bodies (204, bare 200) decode as JSON null
    let body: &[u8] = if bytes.iter().all(u8::is_ascii_whitespace) {
        b"null"
    } else {
        bytes
    };
    serde_json::from_slice(body).map_err(|e| {
        ApiError::decode(status.as_u16(), format!("Unexpected response body: {e}"))
    })
}

fn default_headers(config: &ClientConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static(JSON_CONTENT_TYPE));
    headers.insert(ACCEPT, HeaderValue::from_static(JSON_CONTENT_TYPE));

    for (name, value) in &config.default_headers {
        let name = HeaderName::try_from(name.as_str())
            .map_err(|e| ApiError::config(format!("Invalid header name '{name}': {e}")))?;
        let value = HeaderValue::try_from(value.as_str())
            .map_err(|e| ApiError::config(format!("Invalid value for header '{name}': {e}")))?;
        headers.insert(name, value);
    }
    Ok(headers)
}
