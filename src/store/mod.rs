//! Query interface to the geospatial record store.
//!
//! The dispatch core never touches storage directly; everything goes through
//! [`GeoStore`]. Lookups that find nothing return `Ok(None)` so callers can
//! decide whether absence is fatal.

pub mod memory;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::courier::{Courier, CourierStatus};
use crate::models::geocode::GeoPoint;
use crate::models::product::Product;
use crate::models::trip::{NewTrip, Trip, TripStatus};

#[async_trait]
pub trait GeoStore: Send + Sync {
    async fn create_trip(&self, new_trip: NewTrip) -> Result<Trip, DispatchError>;
    async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, DispatchError>;
    /// Fails with [`DispatchError::TripClosed`] when the trip is already
    /// `complete` or `cancelled` and `status` differs.
    async fn set_trip_status(&self, trip_id: Uuid, status: TripStatus)
    -> Result<Trip, DispatchError>;
    async fn set_trip_cost(&self, trip_id: Uuid, cost: u64) -> Result<(), DispatchError>;
    async fn set_confirmed_pickup(
        &self,
        trip_id: Uuid,
        point: GeoPoint,
    ) -> Result<Trip, DispatchError>;

    /// Links courier and trip in both directions. Fails with
    /// [`DispatchError::TripNotAssignable`] if the trip already has a courier
    /// or has ended, and with [`DispatchError::CourierAlreadyAssigned`] if the
    /// courier already holds a trip. Both records are untouched on failure.
    async fn assign_courier(&self, trip_id: Uuid, courier_id: Uuid) -> Result<(), DispatchError>;

    /// Clears the trip link on the courier bound to `trip_id`. Trip status is
    /// not touched.
    async fn unassign_trip(&self, trip_id: Uuid) -> Result<(), DispatchError>;

    async fn upsert_courier(&self, courier: Courier) -> Result<Courier, DispatchError>;
    async fn get_courier(&self, courier_id: Uuid) -> Result<Option<Courier>, DispatchError>;
    async fn update_courier_location(
        &self,
        courier_id: Uuid,
        location: GeoPoint,
    ) -> Result<Courier, DispatchError>;
    async fn update_courier_status(
        &self,
        courier_id: Uuid,
        status: CourierStatus,
    ) -> Result<Courier, DispatchError>;

    /// At most one available courier within `radius_meters`, nearest first.
    async fn nearest_available_courier(
        &self,
        point: GeoPoint,
        radius_meters: f64,
    ) -> Result<Option<Courier>, DispatchError>;

    /// Every located courier within `radius_meters`, nearest first.
    async fn nearby_couriers(
        &self,
        point: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Courier>, DispatchError>;

    async fn upsert_product(&self, product: Product) -> Result<Product, DispatchError>;
    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, DispatchError>;
    async fn list_products(&self) -> Result<Vec<Product>, DispatchError>;

    /// Products offered by available couriers within `radius_meters`.
    async fn nearby_products(
        &self,
        point: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Product>, DispatchError>;
}
