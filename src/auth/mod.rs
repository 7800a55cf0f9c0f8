//! Authentication for the clinic API
//!
//! Provides credential persistence, the token refresh sub-flow and the
//! login/logout session operations.
//!
//! # Overview
//!
//! - [`KeyValueStore`] is the opaque asynchronous store tokens live in
//!   ([`MemoryStore`] and [`FileStore`] are provided).
//! - [`CredentialsProvider`] is the only path through which the client and
//!   the UI read or write tokens. The access and refresh tokens are stored
//!   as one record, so they are always written together.
//! - The refresh sub-flow exchanges the refresh token for a new access
//!   token when a request is rejected with 401. Concurrent rejections share
//!   one refresh. A failed refresh clears the stored credentials.
//! - [`Session`] logs in, registers and logs out.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use clinic_api_client::auth::{CredentialsProvider, FileStore, LoginRequest, Session};
//! use clinic_api_client::{ApiClient, ClientConfig};
//!
//! # async fn example() -> clinic_api_client::Result<()> {
//! let provider = CredentialsProvider::new(Arc::new(FileStore::new()));
//! let client = ApiClient::with_provider(ClientConfig::from_env()?, provider)?;
//! let session = Session::new(client.clone());
//!
//! session
//!     .login(&LoginRequest::document("CC", "1020304050", "secret"))
//!     .await?;
//! let appointments: serde_json::Value = client.get("appointments", None).await?;
//! # Ok(())
//! # }
//! ```

mod credentials;
mod refresh;
mod session;
mod store;

pub use credentials::{CREDENTIALS_KEY, Credentials, CredentialsProvider, USER_KEY};
pub(crate) use refresh::TokenRefresher;
pub use session::{LoginRequest, LoginResponse, Session};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};
