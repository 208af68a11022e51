//! Typed access to the booking backend.
//!
//! Every call goes through the authenticated pipeline in [`crate::http`],
//! so an expired access token is renewed transparently.
//!
//! ## Endpoints
//!
//! ### Identity
//! - `GET /api/auth/users/me` - Current user
//! - `PUT /api/auth/users/me` - Update profile
//!
//! ### Teachers
//! - `GET /api/teachers` - List teachers
//! - `GET /api/teachers/{id}/availability` - List availability windows
//! - `POST /api/teachers/{id}/availability` - Publish a window
//! - `PUT /api/teachers/availability/{id}` - Update a window
//! - `DELETE /api/teachers/availability/{id}` - Remove a window
//!
//! ### Bookings
//! - `GET /api/bookings` - Bookings of the current user
//! - `POST /api/bookings` - Book a window
//! - `PUT /api/bookings/{id}/confirm` - Confirm a booking
//! - `DELETE /api/bookings/{id}` - Cancel a booking
//! - `GET /api/students/my-bookings` - Student bookings with slot details
//!
//! Login, register and refresh live in [`crate::session`] and
//! [`crate::http`].
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use booking_client::api::BookingApi;
//! use booking_client::http::{ApiClient, ClientConfig};
//! use booking_client::storage::MemoryTokenStore;
//!
//! #[tokio::main]
//! async fn main() -> booking_client::Result<()> {
//!     let store = Arc::new(MemoryTokenStore::new());
//!     let client = Arc::new(ApiClient::new(ClientConfig::default(), store)?);
//!     let api = BookingApi::new(client);
//!
//!     for teacher in api.list_teachers().await? {
//!         println!("{} <{}>", teacher.user.full_name, teacher.user.email);
//!     }
//!     Ok(())
//! }
//! ```

mod bookings;
pub mod paths;
mod teachers;
pub mod types;

use std::sync::Arc;

use crate::http::{ApiClient, ApiRequest};
use crate::Result;

// Re-export commonly used types
pub use types::{
    AvailabilitySlot, AvailabilityUpdate, Booking, BookingStatus, NewAvailability, NewBooking,
    RegistrationRole, Teacher, User, UserRole, UserUpdate,
};

/// Resource endpoints of the booking backend.
#[derive(Debug, Clone)]
pub struct BookingApi {
    client: Arc<ApiClient>,
}

impl BookingApi {
    pub fn new(client: Arc<ApiClient>) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Arc<ApiClient> {
        &self.client
    }

    /// The account the stored access token belongs to.
    pub async fn current_user(&self) -> Result<User> {
        self.client
            .fetch(&ApiRequest::get(paths::CURRENT_USER))
            .await
    }

    /// Update the current account without touching the session.
    ///
    /// Use [`crate::session::SessionMachine::update_profile`] to keep the
    /// session user in sync.
    pub async fn update_current_user(&self, update: &UserUpdate) -> Result<User> {
        let request = ApiRequest::put(paths::CURRENT_USER).json(update)?;
        self.client.fetch(&request).await
    }
}
