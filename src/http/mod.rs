//! Authenticated request pipeline.
//!
//! Every backend call goes through [`ApiClient`], which attaches the stored
//! access token as a bearer credential. When the backend answers 401 the
//! client renews the token through a [`RefreshCoordinator`], so that any
//! number of concurrently failing requests share a single refresh call,
//! and then replays the request once.
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use booking_client::http::{ApiClient, ApiRequest, ClientConfig};
//! use booking_client::storage::MemoryTokenStore;
//!
//! #[tokio::main]
//! async fn main() -> booking_client::Result<()> {
//!     let store = Arc::new(MemoryTokenStore::new());
//!     let client = ApiClient::new(ClientConfig::new("http://127.0.0.1:8004"), store)?;
//!
//!     let response = client.execute(&ApiRequest::get("/api/teachers")).await?;
//!     println!("status: {}", response.status());
//!     Ok(())
//! }
//! ```

mod client;
mod refresh;
mod request;

pub use client::{ApiClient, AuthEvent, AuthListener, ClientConfig};
pub use refresh::{RefreshCoordinator, RefreshFailure, RefreshOutcome};
pub use request::{ApiRequest, ApiResponse};
