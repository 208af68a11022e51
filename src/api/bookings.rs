//! Booking endpoints.

use tracing::{debug, info};

use super::paths;
use super::types::{Booking, NewBooking};
use super::BookingApi;
use crate::http::ApiRequest;
use crate::Result;

impl BookingApi {
    /// Book an availability window as the current student.
    pub async fn create_booking(&self, booking: &NewBooking) -> Result<Booking> {
        let request = ApiRequest::post(paths::BOOKINGS).json(booking)?;
        let created: Booking = self.client.fetch(&request).await?;
        info!(
            booking_id = created.id,
            availability_id = booking.availability_id,
            "Booking created"
        );
        Ok(created)
    }

    /// Bookings visible to the current user: their own for students, the
    /// ones on their slots for teachers.
    pub async fn my_bookings(&self) -> Result<Vec<Booking>> {
        self.client.fetch(&ApiRequest::get(paths::BOOKINGS)).await
    }

    /// Bookings of the current student, with slot times and teacher names.
    pub async fn student_bookings(&self) -> Result<Vec<Booking>> {
        self.client
            .fetch(&ApiRequest::get(paths::STUDENT_BOOKINGS))
            .await
    }

    /// Confirm a pending booking on one of the teacher's slots.
    pub async fn confirm_booking(&self, booking_id: i64) -> Result<Booking> {
        let booking: Booking = self
            .client
            .fetch(&ApiRequest::put(paths::confirm_booking(booking_id)))
            .await?;
        debug!(booking_id, status = %booking.status, "Booking confirmed");
        Ok(booking)
    }

    /// Cancel a booking. The backend answers with an empty body.
    pub async fn cancel_booking(&self, booking_id: i64) -> Result<()> {
        self.client
            .fetch_empty(&ApiRequest::delete(paths::booking(booking_id)))
            .await?;
        info!(booking_id, "Booking cancelled");
        Ok(())
    }
}
