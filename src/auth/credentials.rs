//! Credentials and the provider that owns their persistence

use std::fmt;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::store::{KeyValueStore, MemoryStore, StoreError};
use crate::error::{ApiError, Result};
use crate::utils::redact;

/// Store key holding the serialized [`Credentials`] record
pub const CREDENTIALS_KEY: &str = "clinic.credentials";

/// Store key holding the serialized user profile
pub const USER_KEY: &str = "clinic.user";

/// Access and refresh tokens, always persisted together
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credentials {
    /// Short-lived bearer token
    pub auth_token: String,

    /// Longer-lived token exchanged for a new access token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
}

impl Credentials {
    /// Create credentials from a token pair
    pub fn new(auth_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self {
            auth_token: auth_token.into(),
            refresh_token,
        }
    }

    /// Get the Authorization header value
    #[must_use]
    pub fn authorization_header(&self) -> String {
        format!("Bearer {}", self.auth_token)
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("auth_token", &redact(&self.auth_token))
            .field("refresh_token", &self.refresh_token.as_deref().map(redact))
            .finish()
    }
}

/// Single authoritative read/write path for stored credentials.
///
/// The client and the UI layer share one provider instead of reading the
/// store directly. Both tokens live in one serialized record, so a write can
/// never leave a mismatched pair behind.
#[derive(Clone)]
pub struct CredentialsProvider {
    store: Arc<dyn KeyValueStore>,
}

impl fmt::Debug for CredentialsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialsProvider").finish_non_exhaustive()
    }
}

impl Default for CredentialsProvider {
    fn default() -> Self {
        Self::new(Arc::new(MemoryStore::new()))
    }
}

impl CredentialsProvider {
    /// Create a provider over a store
    #[must_use]
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Load the stored credentials, if any
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be read or the record is corrupt
    pub async fn credentials(&self) -> Result<Option<Credentials>> {
        let Some(raw) = self.store.get(CREDENTIALS_KEY).await.map_err(storage)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ApiError::storage(format!("Corrupt credentials record: {e}")))
    }

    /// Current access token, if any
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be read
    pub async fn access_token(&self) -> Result<Option<String>> {
        Ok(self.credentials().await?.map(|c| c.auth_token))
    }

    /// Current refresh token, if any
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be read
    pub async fn refresh_token(&self) -> Result<Option<String>> {
        Ok(self.credentials().await?.and_then(|c| c.refresh_token))
    }

    /// Persist a credential pair
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be written
    pub async fn save(&self, credentials: &Credentials) -> Result<()> {
        let raw = serde_json::to_string(credentials)
            .map_err(|e| ApiError::storage(format!("Cannot serialize credentials: {e}")))?;
        self.store
            .set(CREDENTIALS_KEY, &raw)
            .await
            .map_err(storage)
    }

    /// Replace the access token, keeping the stored refresh token unless a
    /// new one is supplied
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be read or written
    pub async fn update_access_token(
        &self,
        auth_token: impl Into<String>,
        refresh_token: Option<String>,
    ) -> Result<Credentials> {
        let refresh_token = match refresh_token {
            Some(token) => Some(token),
            None => self.refresh_token().await?,
        };
        let credentials = Credentials::new(auth_token, refresh_token);
        self.save(&credentials).await?;
        Ok(credentials)
    }

    /// Remove the stored tokens
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be written
    pub async fn clear(&self) -> Result<()> {
        self.store.remove(CREDENTIALS_KEY).await.map_err(storage)
    }

    /// Persist the signed-in user's profile
    ///
    /// # Errors
    /// Returns a storage error if the profile cannot be serialized or written
    pub async fn save_user<T: Serialize + ?Sized>(&self, user: &T) -> Result<()> {
        let raw = serde_json::to_string(user)
            .map_err(|e| ApiError::storage(format!("Cannot serialize user: {e}")))?;
        self.store.set(USER_KEY, &raw).await.map_err(storage)
    }

    /// Load the signed-in user's profile
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be read or the profile has
    /// a different shape than `T`
    pub async fn user<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        let Some(raw) = self.store.get(USER_KEY).await.map_err(storage)? else {
            return Ok(None);
        };
        serde_json::from_str(&raw)
            .map(Some)
            .map_err(|e| ApiError::storage(format!("Corrupt user record: {e}")))
    }

    /// Remove the cached user profile
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be written
    pub async fn clear_user(&self) -> Result<()> {
        self.store.remove(USER_KEY).await.map_err(storage)
    }

    /// Remove tokens and the cached user profile
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be written
    pub async fn clear_all(&self) -> Result<()> {
        self.store
            .remove_many(&[CREDENTIALS_KEY, USER_KEY])
            .await
            .map_err(storage)
    }
}

fn storage(error: StoreError) -> ApiError {
    ApiError::storage(error.to_string())
}
