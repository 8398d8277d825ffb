//! Key-value cache for directions results.
//!
//! Writes are last-writer-wins and not coupled to the upstream call they
//! memoize; two concurrent misses for the same key may both go upstream.

pub mod memory;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::geo::to_ewkt;
use crate::models::geocode::GeoPoint;
use crate::models::route::DirectionsRoute;

/// Default lifetime of a cached route.
pub const ROUTE_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[async_trait]
pub trait RouteCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<DirectionsRoute>, DispatchError>;
    async fn set(
        &self,
        key: &str,
        route: &DirectionsRoute,
        ttl: Duration,
    ) -> Result<(), DispatchError>;
}

/// Deterministic key for an ordered pickup/dropoff pair. Points compare at
/// eight-decimal precision.
pub fn route_key(pickup: &GeoPoint, dropoff: &GeoPoint) -> String {
    let pair = [to_ewkt(pickup), to_ewkt(dropoff)];
    let serialized = serde_json::to_string(&pair).unwrap_or_else(|_| pair.join("|"));
    format!("route:{serialized}")
}
