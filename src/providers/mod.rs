pub mod google;

use async_trait::async_trait;

use crate::error::DispatchError;
use crate::models::geocode::{GeoPoint, Geocode, PlaceSuggestion};
use crate::models::route::DirectionsRoute;

#[async_trait]
pub trait DirectionsApi: Send + Sync {
    /// Driving route between two points. Provider-reported errors are returned
    /// as [`DispatchError::Upstream`] even when the transport succeeded.
    async fn compute_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<DirectionsRoute, DispatchError>;
}

#[async_trait]
pub trait PlaceResolver: Send + Sync {
    async fn place_details(&self, place_id: &str) -> Result<Geocode, DispatchError>;
    async fn autocomplete(&self, input: &str) -> Result<Vec<PlaceSuggestion>, DispatchError>;
}
