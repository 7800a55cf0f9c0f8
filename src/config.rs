//! Client configuration

use std::time::Duration;

use typed_builder::TypedBuilder;
use url::Url;

use crate::error::{ApiError, Result};

/// Environment variable holding the API base URL
pub const BASE_URL_ENV: &str = "CLINIC_API_BASE_URL";

/// Environment variable holding the request timeout in milliseconds
pub const TIMEOUT_ENV: &str = "CLINIC_API_TIMEOUT_MS";

/// Default per-request timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Configuration shared by every request a client sends.
///
/// ```
/// use clinic_api_client::ClientConfig;
/// use std::time::Duration;
///
/// let config = ClientConfig::builder()
///     .base_url("https://clinic.example.com/api".parse().unwrap())
///     .timeout(Duration::from_secs(5))
///     .build();
///
/// assert_eq!(config.refresh_path, "auth/refresh");
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct ClientConfig {
    /// Origin every request path is resolved against
    pub base_url: Url,

    /// Timeout applied to each request, including refresh calls
    #[builder(default = DEFAULT_TIMEOUT)]
    pub timeout: Duration,

    /// Login endpoint, relative to the base URL
    #[builder(default = "auth/login".to_string(), setter(into))]
    pub login_path: String,

    /// Registration endpoint, relative to the base URL
    #[builder(default = "auth/register".to_string(), setter(into))]
    pub register_path: String,

    /// Token refresh endpoint, relative to the base URL
    #[builder(default = "auth/refresh".to_string(), setter(into))]
    pub refresh_path: String,

    /// Extra headers sent with every request
    #[builder(default)]
    pub default_headers: Vec<(String, String)>,
}

impl ClientConfig {
    /// Build a configuration from `CLINIC_API_BASE_URL` and the optional
    /// `CLINIC_API_TIMEOUT_MS`
    ///
    /// # Errors
    /// Returns a config error if the base URL is missing or either value is invalid
    pub fn from_env() -> Result<Self> {
        let base_url = std::env::var(BASE_URL_ENV)
            .map_err(|_| ApiError::config(format!("{BASE_URL_ENV} is not set")))?;
        let timeout = std::env::var(TIMEOUT_ENV).ok();

        Self::from_values(&base_url, timeout.as_deref())
    }

    fn from_values(base_url: &str, timeout_ms: Option<&str>) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        let timeout = match timeout_ms {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map(Duration::from_millis)
                .map_err(|e| ApiError::config(format!("Invalid {TIMEOUT_ENV} '{raw}': {e}")))?,
            None => DEFAULT_TIMEOUT,
        };

        Ok(Self::builder().base_url(base_url).timeout(timeout).build())
    }

    /// Base URL with a trailing slash, so relative paths join beneath it
    /// instead of replacing its last segment
    pub(crate) fn normalized_base(&self) -> Url {
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.set_query(None);
        base.set_fragment(None);
        base
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let config = ClientConfig::builder()
            .base_url(Url::parse("https://clinic.example.com").unwrap())
            .build();

        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(config.login_path, "auth/login");
        assert_eq!(config.register_path, "auth/register");
        assert_eq!(config.refresh_path, "auth/refresh");
        assert!(config.default_headers.is_empty());
    }

    #[test]
    fn test_from_values() {
        let config = ClientConfig::from_values("http://10.0.2.2:3000/api", Some("2500")).unwrap();
        assert_eq!(config.timeout, Duration::from_millis(2500));
        assert_eq!(config.base_url.as_str(), "http://10.0.2.2:3000/api");
    }

    #[test]
    fn test_from_values_rejects_bad_input() {
        assert!(ClientConfig::from_values("not a url", None).is_err());
        let err = ClientConfig::from_values("http://localhost", Some("soon")).unwrap_err();
        assert_eq!(err.status, 0);
        assert!(err.message.contains(TIMEOUT_ENV));
    }

    #[test]
    fn test_normalized_base_adds_trailing_slash() {
        let config = ClientConfig::builder()
            .base_url(Url::parse("https://clinic.example.com/api?x=1").unwrap())
            .build();
        assert_eq!(
            config.normalized_base().as_str(),
            "https://clinic.example.com/api/"
        );
    }
}
