use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::geocode::GeoPoint;
use crate::models::route::RouteRef;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum TripStatus {
    Created,
    CourierSearching,
    CourierFound,
    CourierNotFound,
    CourierAssigned,
    CourierArriving,
    CourierEnRoute,
    Complete,
    Cancelled,
}

impl TripStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            TripStatus::Complete | TripStatus::Cancelled | TripStatus::CourierNotFound
        )
    }

    /// `complete` and `cancelled` are final; rewriting the same status is a no-op.
    pub fn allows_transition_to(&self, next: TripStatus) -> bool {
        match self {
            TripStatus::Complete | TripStatus::Cancelled => *self == next,
            _ => true,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TripStatus::Created => "created",
            TripStatus::CourierSearching => "courier_searching",
            TripStatus::CourierFound => "courier_found",
            TripStatus::CourierNotFound => "courier_not_found",
            TripStatus::CourierAssigned => "courier_assigned",
            TripStatus::CourierArriving => "courier_arriving",
            TripStatus::CourierEnRoute => "courier_en_route",
            TripStatus::Complete => "complete",
            TripStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Trip {
    pub id: Uuid,
    pub requester_id: Uuid,
    pub courier_id: Option<Uuid>,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub confirmed_pickup: Option<GeoPoint>,
    pub status: TripStatus,
    pub cost: Option<u64>,
    pub route: Option<RouteRef>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Trip {
    /// Where the courier actually collects: the confirmed pickup if the courier
    /// re-routed, otherwise the requested start.
    pub fn pickup(&self) -> GeoPoint {
        self.confirmed_pickup.unwrap_or(self.start)
    }
}

#[derive(Debug, Clone)]
pub struct NewTrip {
    pub requester_id: Uuid,
    pub start: GeoPoint,
    pub end: GeoPoint,
    pub route: Option<RouteRef>,
}
