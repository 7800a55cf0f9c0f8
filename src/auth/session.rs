//! Login, registration and logout

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::credentials::Credentials;
use crate::client::{ApiClient, RequestOptions};
use crate::error::{ApiError, Result};

/// Login credentials accepted by the login endpoint
#[derive(Clone, Serialize)]
#[serde(untagged)]
pub enum LoginRequest {
    /// Identity document plus password
    Document {
        /// Document type code (e.g. "CC", "TI", "CE")
        #[serde(rename = "documentType")]
        document_type: String,
        /// Document number
        #[serde(rename = "documentNumber")]
        document_number: String,
        /// Account password
        password: String,
    },
    /// Email plus password
    Email {
        /// Account email
        email: String,
        /// Account password
        password: String,
    },
}

impl LoginRequest {
    /// Log in with an identity document
    pub fn document(
        document_type: impl Into<String>,
        document_number: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self::Document {
            document_type: document_type.into(),
            document_number: document_number.into(),
            password: password.into(),
        }
    }

    /// Log in with an email address
    pub fn email(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Email {
            email: email.into(),
            password: password.into(),
        }
    }
}

impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Document {
                document_type,
                document_number,
                ..
            } => f
                .debug_struct("Document")
                .field("document_type", document_type)
                .field("document_number", document_number)
                .finish_non_exhaustive(),
            Self::Email { email, .. } => f
                .debug_struct("Email")
                .field("email", email)
                .finish_non_exhaustive(),
        }
    }
}

/// Body returned by the login endpoint
#[derive(Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    /// Access token
    #[serde(default)]
    pub token: String,
    /// Refresh token, when the backend issues one
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Signed-in user's profile
    #[serde(default)]
    pub user: Option<Value>,
}

impl fmt::Debug for LoginResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginResponse")
            .field("user", &self.user)
            .finish_non_exhaustive()
    }
}

/// Authentication operations on top of an [`ApiClient`].
///
/// Login persists the token pair and the user profile through the client's
/// [`CredentialsProvider`](super::CredentialsProvider); every later request
/// of the same client carries the bearer token.
#[derive(Debug, Clone)]
pub struct Session {
    client: ApiClient,
}

impl Session {
    /// Create a session bound to a client
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Get the underlying client
    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Log in and persist the returned credentials.
    ///
    /// # Errors
    /// Returns the server's rejection as an `Http` error, a `Decode` error if
    /// the response carries no token, or a `Storage` error if persisting fails
    pub async fn login(&self, request: &LoginRequest) -> Result<LoginResponse> {
        let path = &self.client.config().login_path;
        let response: LoginResponse = self
            .client
            .post(path, request, Some(anonymous()))
            .await?;

        if response.token.is_empty() {
            return Err(ApiError::decode(200, "Login response carried no token"));
        }

        let provider = self.client.provider();
        provider
            .save(&Credentials::new(
                response.token.clone(),
                response.refresh_token.clone(),
            ))
            .await?;
        match &response.user {
            Some(user) => provider.save_user(user).await?,
            None => provider.clear_user().await?,
        }

        tracing::info!(
            has_refresh_token = response.refresh_token.is_some(),
            "Signed in"
        );
        Ok(response)
    }

    /// Register a new patient account; no credentials are stored
    ///
    /// # Errors
    /// Returns the normalized [`ApiError`] for any failure
    pub async fn register<B, T>(&self, payload: &B) -> Result<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let path = &self.client.config().register_path;
        self.client.post(path, payload, Some(anonymous())).await
    }

    /// Forget the stored tokens and the cached user profile
    ///
    /// # Errors
    /// Returns a storage error if the store cannot be written
    pub async fn logout(&self) -> Result<()> {
        self.client.provider().clear_all().await?;
        tracing::info!("Signed out");
        Ok(())
    }

    /// Whether an access token is stored
    pub async fn is_authenticated(&self) -> bool {
        matches!(self.client.provider().access_token().await, Ok(Some(_)))
    }

    /// The cached profile of the signed-in user
    ///
    /// # Errors
    /// Returns a storage error if the profile cannot be read as `T`
    pub async fn current_user<T: DeserializeOwned>(&self) -> Result<Option<T>> {
        self.client.provider().user().await
    }
}

fn anonymous() -> RequestOptions {
    RequestOptions::new().authenticated(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_document_login_wire_format() {
        let request = LoginRequest::document("CC", "1020304050", "secret");
        let body = serde_json::to_value(request).unwrap();
        assert_eq!(
            body,
            json!({"documentType": "CC", "documentNumber": "1020304050", "password": "secret"})
        );
    }

    #[test]
    fn test_email_login_wire_format() {
        let body = serde_json::to_value(LoginRequest::email("ana@example.com", "secret")).unwrap();
        assert_eq!(body, json!({"email": "ana@example.com", "password": "secret"}));
    }

    #[test]
    fn test_debug_hides_password_and_token() {
        let request = LoginRequest::email("ana@example.com", "hunter2");
        assert!(!format!("{request:?}").contains("hunter2"));

        let response: LoginResponse =
            serde_json::from_value(json!({"token": "tok-abcdef", "refreshToken": "ref-abcdef"}))
                .unwrap();
        let debug = format!("{response:?}");
        assert!(!debug.contains("tok-abcdef"));
        assert!(!debug.contains("ref-abcdef"));
    }
}
