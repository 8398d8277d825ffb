use serde::{Deserialize, Serialize};

use crate::models::product::PricedProduct;

/// What the directions provider returns for one origin/destination pair.
/// This is the value held in the route cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DirectionsRoute {
    pub polyline: String,
    pub distance_meters: u64,
    pub duration_secs: u64,
    pub static_duration_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Route {
    pub polyline: String,
    pub distance_meters: u64,
    pub products: Vec<PricedProduct>,
}

/// Link from a trip to the route it was quoted against.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RouteRef {
    pub cache_key: String,
    pub distance_meters: u64,
    pub polyline: String,
}
