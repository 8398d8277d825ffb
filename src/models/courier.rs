use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::geocode::GeoPoint;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CourierStatus {
    Offline,
    Online,
    Onboarding,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Courier {
    pub id: Uuid,
    pub user_id: Uuid,
    pub location: Option<GeoPoint>,
    pub status: CourierStatus,
    pub product_id: Uuid,
    pub trip_id: Option<Uuid>,
    pub updated_at: DateTime<Utc>,
}

impl Courier {
    /// Online, located and not already carrying a trip.
    pub fn is_available(&self) -> bool {
        self.status == CourierStatus::Online && self.location.is_some() && self.trip_id.is_none()
    }
}
