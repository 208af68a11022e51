//! Teacher directory and availability endpoints.

use tracing::debug;

use super::paths;
use super::types::{AvailabilitySlot, AvailabilityUpdate, NewAvailability, Teacher};
use super::BookingApi;
use crate::http::ApiRequest;
use crate::Result;

impl BookingApi {
    /// List all teachers.
    pub async fn list_teachers(&self) -> Result<Vec<Teacher>> {
        self.client.fetch(&ApiRequest::get(paths::TEACHERS)).await
    }

    /// List the availability windows of a teacher.
    pub async fn teacher_availability(&self, teacher_id: i64) -> Result<Vec<AvailabilitySlot>> {
        self.client
            .fetch(&ApiRequest::get(paths::teacher_availability(teacher_id)))
            .await
    }

    /// Publish a new availability window. Teacher accounts only.
    pub async fn create_availability(
        &self,
        teacher_id: i64,
        slot: &NewAvailability,
    ) -> Result<AvailabilitySlot> {
        let request = ApiRequest::post(paths::teacher_availability(teacher_id)).json(slot)?;
        let created: AvailabilitySlot = self.client.fetch(&request).await?;
        debug!(slot_id = created.id, teacher_id, "Availability created");
        Ok(created)
    }

    pub async fn update_availability(
        &self,
        availability_id: i64,
        update: &AvailabilityUpdate,
    ) -> Result<AvailabilitySlot> {
        let request = ApiRequest::put(paths::availability(availability_id)).json(update)?;
        self.client.fetch(&request).await
    }

    pub async fn delete_availability(&self, availability_id: i64) -> Result<()> {
        self.client
            .fetch_empty(&ApiRequest::delete(paths::availability(availability_id)))
            .await?;
        debug!(availability_id, "Availability deleted");
        Ok(())
    }
}
