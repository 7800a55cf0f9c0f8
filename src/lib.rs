//! # Clinic API Client
//!
//! Authenticated REST client for the clinic booking service.
//! Async/await, strong typing, tokio-based.
//!
//! ## Quick Start
//!
//! ```no_run
//! use clinic_api_client::auth::{LoginRequest, Session};
//! use clinic_api_client::{ApiClient, ClientConfig};
//! use serde::Deserialize;
//!
//! #[derive(Debug, Deserialize)]
//! struct Specialty {
//!     id: u32,
//!     name: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .base_url("https://clinic.example.com/api".parse()?)
//!         .build();
//!     let client = ApiClient::new(config)?;
//!
//!     Session::new(client.clone())
//!         .login(&LoginRequest::email("ana@example.com", "secret"))
//!         .await?;
//!
//!     let specialties: Vec<Specialty> = client.get("specialties", None).await?;
//!     println!("{specialties:?}");
//!     Ok(())
//! }
//! ```
//!
//! ## Token refresh
//!
//! Every request carries the stored access token as
//! `Authorization: Bearer <token>`. When the server answers 401 the client
//! exchanges the stored refresh token for a new access token and replays the
//! request exactly once. If no new token can be obtained, the stored
//! credentials are cleared and the original 401 is returned with
//! [`ErrorKind::AuthExpired`]; the UI should send the user back to login.
//!
//! Requests rejected concurrently share a single refresh call.
//!
//! ## Error Handling
//!
//! All fallible operations return [`Result<T>`](Result) with one error
//! shape, [`ApiError`] (`status`, `message`, `data`):
//!
//! ```no_run
//! # use clinic_api_client::{ApiClient, ErrorKind};
//! # async fn example(client: ApiClient) {
//! match client.get::<serde_json::Value>("appointments", None).await {
//!     Ok(appointments) => println!("{appointments}"),
//!     Err(e) if e.is_auth_expired() => eprintln!("Session expired, please log in again"),
//!     Err(e) if e.kind == ErrorKind::Connectivity => eprintln!("Offline: {}", e.message),
//!     Err(e) => eprintln!("Error {}: {}", e.status, e.message),
//! }
//! # }
//! ```
//!
//! ## Logging
//!
//! This crate uses [`tracing`](https://crates.io/crates/tracing) for structured logging.
//! Tracing events are always emitted but are zero-cost when no subscriber is attached.
//! Tokens are redacted before they reach a log line.
//!
//! ```rust,ignore
//! tracing_subscriber::fmt::init();
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod utils;

// Re-export commonly used types
pub use auth::{Credentials, CredentialsProvider, KeyValueStore, LoginRequest, Session};
pub use client::{ApiClient, PendingRequest, RequestOptions};
pub use config::ClientConfig;
pub use error::{ApiError, ErrorKind, Result};

/// Version of the crate
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
