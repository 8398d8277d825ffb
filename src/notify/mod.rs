pub mod broadcast;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::geocode::GeoPoint;
use crate::models::trip::TripStatus;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Channel {
    TripUpdates,
    Assignment,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Channel::TripUpdates => "trip-updates",
            Channel::Assignment => "assignment",
        }
    }
}

/// Payload published for a status change.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TripUpdate {
    pub trip_id: Uuid,
    pub status: TripStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_id: Option<Uuid>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub courier_location: Option<GeoPoint>,
}

/// Channels a status fans out to. `cancelled` only reaches this function
/// when no courier was bound yet.
pub fn channels_for(status: TripStatus) -> &'static [Channel] {
    match status {
        TripStatus::CourierArriving
        | TripStatus::CourierEnRoute
        | TripStatus::Complete
        | TripStatus::CourierNotFound => &[Channel::TripUpdates],
        TripStatus::CourierAssigned => &[Channel::TripUpdates, Channel::Assignment],
        TripStatus::Cancelled => &[Channel::Assignment],
        TripStatus::Created | TripStatus::CourierSearching | TripStatus::CourierFound => &[],
    }
}

#[async_trait]
pub trait Publisher: Send + Sync {
    async fn publish(&self, channel: Channel, payload: serde_json::Value)
    -> Result<(), DispatchError>;
}
