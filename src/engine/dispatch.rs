use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use crate::cache::RouteCache;
use crate::config::Config;
use crate::engine::lifecycle::TripStateMachine;
use crate::engine::matching::CourierMatcher;
use crate::engine::routing::RouteProvider;
use crate::error::DispatchError;
use crate::models::courier::Courier;
use crate::models::geocode::{GeoPoint, PlaceInput, PlaceSuggestion};
use crate::models::route::Route;
use crate::models::trip::{NewTrip, Trip, TripStatus};
use crate::notify::Publisher;
use crate::observability::metrics::Metrics;
use crate::providers::{DirectionsApi, PlaceResolver};
use crate::store::GeoStore;

/// External collaborators the dispatch core is built on.
pub struct Collaborators {
    pub store: Arc<dyn GeoStore>,
    pub directions: Arc<dyn DirectionsApi>,
    pub places: Arc<dyn PlaceResolver>,
    pub cache: Arc<dyn RouteCache>,
    pub publisher: Arc<dyn Publisher>,
}

/// Entry point for the transport layer. Built once at startup.
pub struct Dispatcher {
    store: Arc<dyn GeoStore>,
    routes: Arc<RouteProvider>,
    trips: Arc<TripStateMachine>,
    matcher: Arc<CourierMatcher>,
    search_radius_meters: f64,
}

impl Dispatcher {
    pub fn new(config: &Config, parts: Collaborators, metrics: Metrics) -> Self {
        let routes = Arc::new(RouteProvider::new(
            parts.directions,
            parts.places,
            parts.cache,
            parts.store.clone(),
            config.pricer(),
            config.routing(),
            metrics.clone(),
        ));
        let trips = Arc::new(TripStateMachine::new(
            parts.store.clone(),
            parts.publisher,
            config.settle_delay,
            metrics.clone(),
        ));
        let matcher = Arc::new(CourierMatcher::new(
            parts.store.clone(),
            trips.clone(),
            routes.clone(),
            config.matching(),
            metrics,
        ));

        Self {
            store: parts.store,
            routes,
            trips,
            matcher,
            search_radius_meters: config.search_radius_meters,
        }
    }

    pub fn store(&self) -> &Arc<dyn GeoStore> {
        &self.store
    }

    pub fn matcher(&self) -> &Arc<CourierMatcher> {
        &self.matcher
    }

    /// Quotes the route, records the trip and starts the courier search.
    /// Returns as soon as the trip exists; matching continues in the
    /// background.
    pub async fn create_trip(
        &self,
        requester_id: Uuid,
        pickup: &PlaceInput,
        dropoff: &PlaceInput,
    ) -> Result<Trip, DispatchError> {
        let quote = self.routes.quote(pickup, dropoff).await?;

        let trip = self
            .store
            .create_trip(NewTrip {
                requester_id,
                start: quote.pickup.point,
                end: quote.dropoff.point,
                route: Some(quote.route_ref()),
            })
            .await?;

        info!(
            trip_id = %trip.id,
            requester_id = %requester_id,
            distance_meters = quote.route.distance_meters,
            "trip created"
        );

        self.matcher.spawn_match(trip.id, trip.start);
        Ok(trip)
    }

    pub async fn compute_route(
        &self,
        pickup: &PlaceInput,
        dropoff: &PlaceInput,
    ) -> Result<Route, DispatchError> {
        self.routes.compute_trip_route(pickup, dropoff).await
    }

    /// Reports a status change. A finished or cancelled trip releases its
    /// courier for new matches.
    pub async fn report_trip_status(
        &self,
        trip_id: Uuid,
        status: TripStatus,
    ) -> Result<Trip, DispatchError> {
        let trip = self.trips.report_status(trip_id, status).await?;

        if matches!(status, TripStatus::Complete | TripStatus::Cancelled) && trip.courier_id.is_some()
        {
            self.matcher.unassign_trip(trip_id).await?;
        }

        Ok(trip)
    }

    /// Binds a specific courier to a trip outside the automatic search.
    pub async fn assign_courier(
        &self,
        trip_id: Uuid,
        courier_id: Uuid,
    ) -> Result<Trip, DispatchError> {
        self.matcher.assign_courier_to_trip(trip_id, courier_id).await?;
        self.trips
            .report_status(trip_id, TripStatus::CourierAssigned)
            .await
    }

    pub async fn confirm_pickup(&self, trip_id: Uuid, point: GeoPoint) -> Result<Trip, DispatchError> {
        self.store.set_confirmed_pickup(trip_id, point).await
    }

    pub async fn get_nearby_couriers(
        &self,
        point: GeoPoint,
        radius_meters: Option<f64>,
    ) -> Result<Vec<Courier>, DispatchError> {
        let radius = radius_meters.unwrap_or(self.search_radius_meters);
        if !radius.is_finite() || radius < 0.0 {
            return Err(DispatchError::BadRequest(format!("invalid radius {radius}")));
        }
        self.store.nearby_couriers(point, radius).await
    }

    pub async fn get_trip_details(&self, trip_id: Uuid) -> Result<Trip, DispatchError> {
        self.store
            .get_trip(trip_id)
            .await?
            .ok_or_else(|| DispatchError::trip_not_found(trip_id))
    }

    pub async fn autocomplete(&self, input: &str) -> Result<Vec<PlaceSuggestion>, DispatchError> {
        if input.trim().is_empty() {
            return Ok(Vec::new());
        }
        self.routes.autocomplete(input).await
    }
}
