use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Place autocomplete selections arrive without coordinates and are
    /// deserialized as `(0, 0)`.
    pub fn is_zero(&self) -> bool {
        self.lat == 0.0 && self.lng == 0.0
    }
}

/// A resolved place. Consumed while building routes, never stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Geocode {
    pub place_id: String,
    pub formatted_address: String,
    pub point: GeoPoint,
}

/// Pickup or dropoff as supplied by a caller: either a place selection or
/// raw coordinates.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PlaceInput {
    #[serde(default)]
    pub place_id: String,
    #[serde(default)]
    pub formatted_address: String,
    #[serde(default)]
    pub location: GeoPoint,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlaceSuggestion {
    pub place_id: String,
    pub description: String,
}
