//! Token refresh sub-flow
//!
//! Exchanges the stored refresh token for a new access token. The refresh
//! request goes through a plain HTTP client, never through
//! [`ApiClient`](crate::ApiClient), so a failing refresh cannot trigger
//! another refresh.
//!
//! Concurrent callers share one in-flight refresh: the first caller starts
//! it, everyone arriving before it completes awaits the same future.

use std::sync::{Arc, Mutex, PoisonError};

use futures::FutureExt;
use futures::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use url::Url;

use super::credentials::{Credentials, CredentialsProvider};
use crate::error::{ApiError, Result};
use crate::utils::{redact, truncate_for_display};

/// Longest server body echoed into the logs
const MAX_LOGGED_BODY: usize = 200;

type InFlight = Shared<BoxFuture<'static, Option<String>>>;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RefreshRequest<'a> {
    refresh_token: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RefreshResponse {
    #[serde(default)]
    token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
}

struct RefreshTask {
    http: reqwest::Client,
    endpoint: Url,
    provider: CredentialsProvider,
}

#[derive(Default)]
struct Slot {
    generation: u64,
    refresh: Option<InFlight>,
}

/// Coalescing token refresher shared by all requests of one client
pub(crate) struct TokenRefresher {
    task: Arc<RefreshTask>,
    slot: Mutex<Slot>,
}

impl TokenRefresher {
    pub(crate) fn new(http: reqwest::Client, endpoint: Url, provider: CredentialsProvider) -> Self {
        Self {
            task: Arc::new(RefreshTask {
                http,
                endpoint,
                provider,
            }),
            slot: Mutex::new(Slot::default()),
        }
    }

    /// Obtain an access token to replace `rejected`.
    ///
    /// Returns `None` when no new token could be obtained; stored
    /// credentials have been cleared in that case. If the store already
    /// holds a different access token (another request refreshed first),
    /// that token is returned without contacting the server.
    pub(crate) async fn refresh(&self, rejected: Option<&str>) -> Option<String> {
        if let Ok(Some(current)) = self.task.provider.access_token().await {
            if rejected != Some(current.as_str()) {
                tracing::debug!("Access token already rotated, reusing stored token");
                return Some(current);
            }
        }

        let (generation, refresh) = self.join_or_start();
        let token = refresh.await;
        self.finish(generation);
        token
    }

    fn join_or_start(&self) -> (u64, InFlight) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(refresh) = &slot.refresh {
            tracing::debug!("Joining in-flight token refresh");
            return (slot.generation, refresh.clone());
        }

        let task = Arc::clone(&self.task);
        let refresh = async move { task.run().await }.boxed().shared();
        slot.generation += 1;
        slot.refresh = Some(refresh.clone());
        (slot.generation, refresh)
    }

    fn finish(&self, generation: u64) {
        let mut slot = self.slot.lock().unwrap_or_else(PoisonError::into_inner);
        if slot.generation == generation {
            slot.refresh = None;
        }
    }
}

impl RefreshTask {
    async fn run(&self) -> Option<String> {
        let refresh_token = match self.provider.refresh_token().await {
            Ok(Some(token)) => token,
            Ok(None) => {
                tracing::debug!("No refresh token stored, skipping refresh");
                self.discard().await;
                return None;
            }
            Err(e) => {
                tracing::warn!("Cannot read refresh token: {e}");
                self.discard().await;
                return None;
            }
        };

        tracing::debug!(refresh_token = %redact(&refresh_token), "Refreshing access token");
        let response = match self.request(&refresh_token).await {
            Ok(response) => response,
            Err(e) => {
                tracing::warn!(status = e.status, "Token refresh failed: {}", e.message);
                self.discard().await;
                return None;
            }
        };

        // Without a rotated refresh token the old one stays valid
        let credentials = Credentials::new(
            response.auth_token,
            Some(response.refresh_token.unwrap_or(refresh_token)),
        );
        if let Err(e) = self.provider.save(&credentials).await {
            tracing::warn!("Cannot persist refreshed credentials: {e}");
            self.discard().await;
            return None;
        }

        tracing::debug!("Access token refreshed");
        Some(credentials.auth_token)
    }

    async fn request(&self, refresh_token: &str) -> Result<Credentials> {
        let response = self
            .http
            .post(self.endpoint.clone())
            .json(&RefreshRequest { refresh_token })
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            tracing::debug!(
                status = status.as_u16(),
                body = %truncate_for_display(&body, MAX_LOGGED_BODY),
                "Refresh endpoint rejected the request"
            );
            return Err(ApiError::from_response(status, &body));
        }

        let parsed: RefreshResponse = serde_json::from_str(&body).map_err(|e| {
            ApiError::decode(status.as_u16(), format!("Invalid refresh response: {e}"))
        })?;

        match parsed.token.filter(|token| !token.is_empty()) {
            Some(token) => Ok(Credentials::new(token, parsed.refresh_token)),
            None => Err(ApiError::decode(
                status.as_u16(),
                "Refresh response carried no token",
            )),
        }
    }

    async fn discard(&self) {
        tracing::warn!("Clearing stored credentials after failed refresh");
        if let Err(e) = self.provider.clear().await {
            tracing::warn!("Cannot clear stored credentials: {e}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_refresh_request_wire_format() {
        let body = serde_json::to_value(RefreshRequest {
            refresh_token: "r1",
        })
        .unwrap();
        assert_eq!(body, json!({"refreshToken": "r1"}));
    }

    #[test]
    fn test_refresh_response_optional_rotation() {
        let parsed: RefreshResponse = serde_json::from_value(json!({"token": "a2"})).unwrap();
        assert_eq!(parsed.token.as_deref(), Some("a2"));
        assert!(parsed.refresh_token.is_none());

        let empty: RefreshResponse = serde_json::from_value(json!({})).unwrap();
        assert!(empty.token.is_none());
    }

    #[tokio::test]
    async fn test_missing_refresh_token_fails_without_network() {
        let provider = CredentialsProvider::default();
        provider.save(&Credentials::new("a1", None)).await.unwrap();

        // Port 9 (discard) is never contacted: the flow stops before sending.
        let refresher = TokenRefresher::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/auth/refresh").unwrap(),
            provider.clone(),
        );

        assert_eq!(refresher.refresh(Some("a1")).await, None);
        assert_eq!(provider.credentials().await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_rotated_token_reused() {
        let provider = CredentialsProvider::default();
        provider
            .save(&Credentials::new("a2", Some("r1".to_string())))
            .await
            .unwrap();

        let refresher = TokenRefresher::new(
            reqwest::Client::new(),
            Url::parse("http://127.0.0.1:9/auth/refresh").unwrap(),
            provider,
        );

        assert_eq!(refresher.refresh(Some("a1")).await.as_deref(), Some("a2"));
    }
}
