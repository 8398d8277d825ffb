use std::collections::HashSet;

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use tokio::sync::Mutex;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::geo::haversine_meters;
use crate::models::courier::{Courier, CourierStatus};
use crate::models::geocode::GeoPoint;
use crate::models::product::Product;
use crate::models::trip::{NewTrip, Trip, TripStatus};
use crate::store::GeoStore;

/// DashMap-backed store with haversine radius filtering.
///
/// Mutations of trips and courier links go through `write_lock`, so a
/// status write and an assignment for the same trip never interleave.
#[derive(Default)]
pub struct InMemoryStore {
    trips: DashMap<Uuid, Trip>,
    couriers: DashMap<Uuid, Courier>,
    products: DashMap<Uuid, Product>,
    write_lock: Mutex<()>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn trip_count(&self) -> usize {
        self.trips.len()
    }

    pub fn courier_count(&self) -> usize {
        self.couriers.len()
    }

    fn located_within(&self, point: &GeoPoint, radius_meters: f64) -> Vec<(f64, Courier)> {
        let mut hits: Vec<(f64, Courier)> = self
            .couriers
            .iter()
            .filter_map(|entry| {
                let courier = entry.value();
                let location = courier.location.as_ref()?;
                let distance = haversine_meters(point, location);
                (distance <= radius_meters).then(|| (distance, courier.clone()))
            })
            .collect();

        hits.sort_by(|a, b| a.0.total_cmp(&b.0));
        hits
    }
}

#[async_trait]
impl GeoStore for InMemoryStore {
    async fn create_trip(&self, new_trip: NewTrip) -> Result<Trip, DispatchError> {
        let _guard = self.write_lock.lock().await;

        let now = Utc::now();
        let trip = Trip {
            id: Uuid::new_v4(),
            requester_id: new_trip.requester_id,
            courier_id: None,
            start: new_trip.start,
            end: new_trip.end,
            confirmed_pickup: None,
            status: TripStatus::Created,
            cost: None,
            route: new_trip.route,
            created_at: now,
            updated_at: now,
        };

        self.trips.insert(trip.id, trip.clone());
        Ok(trip)
    }

    async fn get_trip(&self, trip_id: Uuid) -> Result<Option<Trip>, DispatchError> {
        Ok(self.trips.get(&trip_id).map(|entry| entry.value().clone()))
    }

    async fn set_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
    ) -> Result<Trip, DispatchError> {
        let _guard = self.write_lock.lock().await;

        let mut trip = self
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| DispatchError::trip_not_found(trip_id))?;

        if !trip.status.allows_transition_to(status) {
            return Err(DispatchError::TripClosed {
                trip_id,
                status: trip.status.as_str(),
            });
        }

        trip.status = status;
        trip.updated_at = Utc::now();
        Ok(trip.clone())
    }

    async fn set_trip_cost(&self, trip_id: Uuid, cost: u64) -> Result<(), DispatchError> {
        let _guard = self.write_lock.lock().await;

        let mut trip = self
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| DispatchError::trip_not_found(trip_id))?;

        trip.cost = Some(cost);
        trip.updated_at = Utc::now();
        Ok(())
    }

    async fn set_confirmed_pickup(
        &self,
        trip_id: Uuid,
        point: GeoPoint,
    ) -> Result<Trip, DispatchError> {
        let _guard = self.write_lock.lock().await;

        let mut trip = self
            .trips
            .get_mut(&trip_id)
            .ok_or_else(|| DispatchError::trip_not_found(trip_id))?;

        trip.confirmed_pickup = Some(point);
        trip.updated_at = Utc::now();
        Ok(trip.clone())
    }

    async fn assign_courier(&self, trip_id: Uuid, courier_id: Uuid) -> Result<(), DispatchError> {
        let _guard = self.write_lock.lock().await;

        {
            let trip = self
                .trips
                .get(&trip_id)
                .ok_or_else(|| DispatchError::trip_not_found(trip_id))?;

            if trip.courier_id.is_some() || trip.status.is_terminal() {
                return Err(DispatchError::TripNotAssignable(trip_id));
            }
        }

        {
            let mut courier = self
                .couriers
                .get_mut(&courier_id)
                .ok_or_else(|| DispatchError::courier_not_found(courier_id))?;

            if courier.trip_id.is_some() {
                return Err(DispatchError::CourierAlreadyAssigned(courier_id));
            }

            courier.trip_id = Some(trip_id);
            courier.updated_at = Utc::now();
        }

        if let Some(mut trip) = self.trips.get_mut(&trip_id) {
            trip.courier_id = Some(courier_id);
            trip.updated_at = Utc::now();
        }

        Ok(())
    }

    async fn unassign_trip(&self, trip_id: Uuid) -> Result<(), DispatchError> {
        let _guard = self.write_lock.lock().await;

        let courier_id = self
            .trips
            .get(&trip_id)
            .ok_or_else(|| DispatchError::trip_not_found(trip_id))?
            .courier_id;

        let Some(courier_id) = courier_id else {
            return Ok(());
        };

        if let Some(mut courier) = self.couriers.get_mut(&courier_id) {
            if courier.trip_id == Some(trip_id) {
                courier.trip_id = None;
                courier.updated_at = Utc::now();
            }
        }

        Ok(())
    }

    async fn upsert_courier(&self, courier: Courier) -> Result<Courier, DispatchError> {
        self.couriers.insert(courier.id, courier.clone());
        Ok(courier)
    }

    async fn get_courier(&self, courier_id: Uuid) -> Result<Option<Courier>, DispatchError> {
        Ok(self.couriers.get(&courier_id).map(|entry| entry.value().clone()))
    }

    async fn update_courier_location(
        &self,
        courier_id: Uuid,
        location: GeoPoint,
    ) -> Result<Courier, DispatchError> {
        let mut courier = self
            .couriers
            .get_mut(&courier_id)
            .ok_or_else(|| DispatchError::courier_not_found(courier_id))?;

        courier.location = Some(location);
        courier.updated_at = Utc::now();
        Ok(courier.clone())
    }

    async fn update_courier_status(
        &self,
        courier_id: Uuid,
        status: CourierStatus,
    ) -> Result<Courier, DispatchError> {
        let mut courier = self
            .couriers
            .get_mut(&courier_id)
            .ok_or_else(|| DispatchError::courier_not_found(courier_id))?;

        courier.status = status;
        courier.updated_at = Utc::now();
        Ok(courier.clone())
    }

    async fn nearest_available_courier(
        &self,
        point: GeoPoint,
        radius_meters: f64,
    ) -> Result<Option<Courier>, DispatchError> {
        Ok(self
            .located_within(&point, radius_meters)
            .into_iter()
            .map(|(_, courier)| courier)
            .find(Courier::is_available))
    }

    async fn nearby_couriers(
        &self,
        point: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Courier>, DispatchError> {
        Ok(self
            .located_within(&point, radius_meters)
            .into_iter()
            .map(|(_, courier)| courier)
            .collect())
    }

    async fn upsert_product(&self, product: Product) -> Result<Product, DispatchError> {
        self.products.insert(product.id, product.clone());
        Ok(product)
    }

    async fn get_product(&self, product_id: Uuid) -> Result<Option<Product>, DispatchError> {
        Ok(self.products.get(&product_id).map(|entry| entry.value().clone()))
    }

    async fn list_products(&self) -> Result<Vec<Product>, DispatchError> {
        let mut products: Vec<Product> = self
            .products
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        products.sort_by_key(|product| product.weight_class);
        Ok(products)
    }

    async fn nearby_products(
        &self,
        point: GeoPoint,
        radius_meters: f64,
    ) -> Result<Vec<Product>, DispatchError> {
        let product_ids: HashSet<Uuid> = self
            .located_within(&point, radius_meters)
            .into_iter()
            .filter(|(_, courier)| courier.is_available())
            .map(|(_, courier)| courier.product_id)
            .collect();

        let mut products: Vec<Product> = product_ids
            .iter()
            .filter_map(|id| self.products.get(id).map(|entry| entry.value().clone()))
            .collect();
        products.sort_by_key(|product| product.weight_class);
        Ok(products)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use uuid::Uuid;

    use super::InMemoryStore;
    use crate::error::DispatchError;
    use crate::models::courier::{Courier, CourierStatus};
    use crate::models::geocode::GeoPoint;
    use crate::models::product::Product;
    use crate::models::trip::{NewTrip, TripStatus};
    use crate::store::GeoStore;

    const PICKUP: GeoPoint = GeoPoint {
        lat: 1.2345678,
        lng: 36.1234567,
    };

    fn courier(id_seed: u128, location: Option<GeoPoint>, product_id: Uuid) -> Courier {
        Courier {
            id: Uuid::from_u128(id_seed),
            user_id: Uuid::new_v4(),
            location,
            status: CourierStatus::Online,
            product_id,
            trip_id: None,
            updated_at: Utc::now(),
        }
    }

    fn new_trip() -> NewTrip {
        NewTrip {
            requester_id: Uuid::new_v4(),
            start: PICKUP,
            end: GeoPoint::new(1.3, 36.2),
            route: None,
        }
    }

    #[tokio::test]
    async fn courier_without_location_is_never_nearby() {
        let store = InMemoryStore::new();
        store
            .upsert_courier(courier(1, None, Uuid::new_v4()))
            .await
            .unwrap();

        let nearest = store
            .nearest_available_courier(PICKUP, f64::MAX)
            .await
            .unwrap();
        let nearby = store.nearby_couriers(PICKUP, f64::MAX).await.unwrap();

        assert!(nearest.is_none());
        assert!(nearby.is_empty());
    }

    #[tokio::test]
    async fn nearest_available_prefers_closer_online_courier() {
        let store = InMemoryStore::new();
        let product = Uuid::new_v4();
        let near = GeoPoint::new(1.2350000, 36.1234567);
        let nearer_but_offline = GeoPoint::new(1.2346000, 36.1234567);
        let far = GeoPoint::new(1.2450000, 36.1234567);

        store.upsert_courier(courier(1, Some(far), product)).await.unwrap();
        store.upsert_courier(courier(2, Some(near), product)).await.unwrap();
        let mut offline = courier(3, Some(nearer_but_offline), product);
        offline.status = CourierStatus::Offline;
        store.upsert_courier(offline).await.unwrap();

        let found = store
            .nearest_available_courier(PICKUP, 2000.0)
            .await
            .unwrap()
            .unwrap();

        assert_eq!(found.id, Uuid::from_u128(2));
    }

    #[tokio::test]
    async fn assigning_busy_courier_conflicts_and_leaves_first_trip_alone() {
        let store = InMemoryStore::new();
        let c = courier(1, Some(PICKUP), Uuid::new_v4());
        store.upsert_courier(c.clone()).await.unwrap();

        let first = store.create_trip(new_trip()).await.unwrap();
        let second = store.create_trip(new_trip()).await.unwrap();
        store.assign_courier(first.id, c.id).await.unwrap();

        let err = store.assign_courier(second.id, c.id).await.unwrap_err();
        assert!(matches!(err, DispatchError::CourierAlreadyAssigned(id) if id == c.id));

        let first_after = store.get_trip(first.id).await.unwrap().unwrap();
        let second_after = store.get_trip(second.id).await.unwrap().unwrap();
        let courier_after = store.get_courier(c.id).await.unwrap().unwrap();

        assert_eq!(first_after.courier_id, Some(c.id));
        assert_eq!(first_after.status, TripStatus::Created);
        assert_eq!(second_after.courier_id, None);
        assert_eq!(courier_after.trip_id, Some(first.id));
    }

    #[tokio::test]
    async fn second_courier_cannot_replace_the_first() {
        let store = InMemoryStore::new();
        let product = Uuid::new_v4();
        let a = courier(1, Some(PICKUP), product);
        let b = courier(2, Some(PICKUP), product);
        store.upsert_courier(a.clone()).await.unwrap();
        store.upsert_courier(b.clone()).await.unwrap();
        let trip = store.create_trip(new_trip()).await.unwrap();

        store.assign_courier(trip.id, a.id).await.unwrap();
        let err = store.assign_courier(trip.id, b.id).await.unwrap_err();
        assert!(matches!(err, DispatchError::TripNotAssignable(id) if id == trip.id));

        let trip_after = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(trip_after.courier_id, Some(a.id));
        let b_after = store.get_courier(b.id).await.unwrap().unwrap();
        assert_eq!(b_after.trip_id, None);

        store.unassign_trip(trip.id).await.unwrap();
        let a_after = store.get_courier(a.id).await.unwrap().unwrap();
        assert_eq!(a_after.trip_id, None);
        assert!(a_after.is_available());
    }

    #[tokio::test]
    async fn ended_trips_take_no_courier() {
        let store = InMemoryStore::new();
        let c = courier(1, Some(PICKUP), Uuid::new_v4());
        store.upsert_courier(c.clone()).await.unwrap();

        for status in [
            TripStatus::Cancelled,
            TripStatus::Complete,
            TripStatus::CourierNotFound,
        ] {
            let trip = store.create_trip(new_trip()).await.unwrap();
            store.set_trip_status(trip.id, status).await.unwrap();

            let err = store.assign_courier(trip.id, c.id).await.unwrap_err();
            assert!(matches!(err, DispatchError::TripNotAssignable(_)));

            let trip_after = store.get_trip(trip.id).await.unwrap().unwrap();
            assert_eq!(trip_after.status, status);
            assert_eq!(trip_after.courier_id, None);
        }

        let courier_after = store.get_courier(c.id).await.unwrap().unwrap();
        assert_eq!(courier_after.trip_id, None);
    }

    #[tokio::test]
    async fn cancelled_trip_keeps_its_status() {
        let store = InMemoryStore::new();
        let trip = store.create_trip(new_trip()).await.unwrap();
        store
            .set_trip_status(trip.id, TripStatus::Cancelled)
            .await
            .unwrap();

        let err = store
            .set_trip_status(trip.id, TripStatus::CourierAssigned)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::TripClosed { status: "cancelled", .. }));

        // repeating the final status is accepted
        store
            .set_trip_status(trip.id, TripStatus::Cancelled)
            .await
            .unwrap();
        let after = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(after.status, TripStatus::Cancelled);
    }

    #[tokio::test]
    async fn courier_not_found_trip_can_still_be_cancelled() {
        let store = InMemoryStore::new();
        let trip = store.create_trip(new_trip()).await.unwrap();
        store
            .set_trip_status(trip.id, TripStatus::CourierNotFound)
            .await
            .unwrap();

        let after = store
            .set_trip_status(trip.id, TripStatus::Cancelled)
            .await
            .unwrap();
        assert_eq!(after.status, TripStatus::Cancelled);
    }

    #[tokio::test]
    async fn unassign_frees_courier_without_touching_status() {
        let store = InMemoryStore::new();
        let c = courier(1, Some(PICKUP), Uuid::new_v4());
        store.upsert_courier(c.clone()).await.unwrap();
        let trip = store.create_trip(new_trip()).await.unwrap();

        store.assign_courier(trip.id, c.id).await.unwrap();
        store
            .set_trip_status(trip.id, TripStatus::CourierAssigned)
            .await
            .unwrap();
        store.unassign_trip(trip.id).await.unwrap();

        let courier_after = store.get_courier(c.id).await.unwrap().unwrap();
        let trip_after = store.get_trip(trip.id).await.unwrap().unwrap();
        assert_eq!(courier_after.trip_id, None);
        assert_eq!(trip_after.status, TripStatus::CourierAssigned);
    }

    #[tokio::test]
    async fn nearby_products_only_counts_available_couriers() {
        let store = InMemoryStore::new();
        let bike = Product {
            id: Uuid::new_v4(),
            name: "economy".to_string(),
            weight_class: 100,
            description: "bike".to_string(),
            icon_url: None,
        };
        let van = Product {
            id: Uuid::new_v4(),
            name: "van".to_string(),
            weight_class: 500_000,
            description: "van".to_string(),
            icon_url: None,
        };
        store.upsert_product(bike.clone()).await.unwrap();
        store.upsert_product(van.clone()).await.unwrap();

        store.upsert_courier(courier(1, Some(PICKUP), bike.id)).await.unwrap();
        store.upsert_courier(courier(2, Some(PICKUP), bike.id)).await.unwrap();
        let mut offline_van = courier(3, Some(PICKUP), van.id);
        offline_van.status = CourierStatus::Offline;
        store.upsert_courier(offline_van).await.unwrap();

        let products = store.nearby_products(PICKUP, 2000.0).await.unwrap();
        assert_eq!(products, vec![bike]);
    }

    #[tokio::test]
    async fn status_write_on_missing_trip_is_not_found() {
        let store = InMemoryStore::new();
        let err = store
            .set_trip_status(Uuid::new_v4(), TripStatus::Complete)
            .await
            .unwrap_err();
        assert!(matches!(err, DispatchError::NotFound(_)));
    }
}
