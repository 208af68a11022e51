//! # booking-client
//!
//! Authenticated client for the lesson booking service.
//!
//! Every backend call carries the stored access token. When the backend
//! rejects it, the client renews it with the refresh token and replays the
//! request. Concurrent failures share a single refresh, and a failed
//! refresh ends the session.
//!
//! ## Features
//!
//! - **Token-bearing client**: bearer attachment and 401 recovery in one place
//! - **Single-flight refresh**: N concurrent 401s cause exactly one refresh call
//! - **Session state machine**: loading, authenticated, anonymous; observable
//!   through a `watch` channel
//! - **Typed resources**: teachers, availability and bookings
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use booking_client::{ApiClient, BookingApi, ClientConfig, MemoryTokenStore, SessionMachine};
//!
//! #[tokio::main]
//! async fn main() -> booking_client::Result<()> {
//!     // Initialize logging
//!     booking_client::logging::try_init().ok();
//!
//!     let store = Arc::new(MemoryTokenStore::new());
//!     let client = Arc::new(ApiClient::new(ClientConfig::default(), store)?);
//!
//!     // Sign in
//!     let session = SessionMachine::new(Arc::clone(&client))?;
//!     let user = session.login("ann@example.com", "secret1").await?;
//!     println!("Signed in as {}", user.full_name);
//!
//!     // Call resource endpoints; expired tokens are refreshed transparently
//!     let api = BookingApi::new(client);
//!     for booking in api.my_bookings().await? {
//!         println!("#{} {}", booking.id, booking.status);
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod http;
pub mod logging;
pub mod session;
pub mod storage;

// Re-export commonly used types
pub use api::BookingApi;
pub use error::{BookingClientError, Result};
pub use http::{ApiClient, ApiRequest, ApiResponse, AuthEvent, ClientConfig, RefreshFailure};
pub use session::{Session, SessionMachine, SessionStatus};
pub use storage::{CredentialPair, FileTokenStore, MemoryTokenStore, TokenStore};
