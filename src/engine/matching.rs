use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tokio::task::JoinHandle;
use tokio::time::{interval, sleep, MissedTickBehavior};
use tracing::{info, warn};
use uuid::Uuid;

use crate::engine::lifecycle::TripStateMachine;
use crate::engine::routing::RouteProvider;
use crate::error::DispatchError;
use crate::models::geocode::GeoPoint;
use crate::models::trip::TripStatus;
use crate::observability::metrics::Metrics;
use crate::store::GeoStore;

pub const MATCH_TICK: Duration = Duration::from_millis(500);
pub const MATCH_DEADLINE: Duration = Duration::from_secs(60);
pub const COURIER_SEARCH_RADIUS_METERS: f64 = 2_000.0;

#[derive(Debug, Clone)]
pub struct MatchingConfig {
    pub tick: Duration,
    pub deadline: Duration,
    pub search_radius_meters: f64,
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            tick: MATCH_TICK,
            deadline: MATCH_DEADLINE,
            search_radius_meters: COURIER_SEARCH_RADIUS_METERS,
        }
    }
}

/// How a matching run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchOutcome {
    Assigned(Uuid),
    NotFound,
    Cancelled,
    TripMissing,
    /// A courier was found but binding it failed, usually a lost race.
    AssignmentFailed,
    /// A status write failed mid-run.
    Aborted,
}

impl MatchOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            MatchOutcome::Assigned(_) => "assigned",
            MatchOutcome::NotFound => "not_found",
            MatchOutcome::Cancelled => "cancelled",
            MatchOutcome::TripMissing => "trip_missing",
            MatchOutcome::AssignmentFailed => "assignment_failed",
            MatchOutcome::Aborted => "aborted",
        }
    }
}

enum Tick {
    Continue,
    Done(MatchOutcome),
}

/// Releases a run's slot in `active` and the gauge, even if the run panics.
struct ActiveRun<'a> {
    matcher: &'a CourierMatcher,
    trip_id: Uuid,
}

impl Drop for ActiveRun<'_> {
    fn drop(&mut self) {
        self.matcher.active.remove(&self.trip_id);
        self.matcher.metrics.active_matches.dec();
    }
}

pub struct CourierMatcher {
    store: Arc<dyn GeoStore>,
    trips: Arc<TripStateMachine>,
    routes: Arc<RouteProvider>,
    config: MatchingConfig,
    metrics: Metrics,
    active: DashMap<Uuid, Instant>,
}

impl CourierMatcher {
    pub fn new(
        store: Arc<dyn GeoStore>,
        trips: Arc<TripStateMachine>,
        routes: Arc<RouteProvider>,
        config: MatchingConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            store,
            trips,
            routes,
            config,
            metrics,
            active: DashMap::new(),
        }
    }

    pub fn active_runs(&self) -> usize {
        self.active.len()
    }

    /// Starts a supervised matching run for `trip_id` in the background.
    /// Returns `None` if a run for that trip is already in flight.
    pub fn spawn_match(
        self: &Arc<Self>,
        trip_id: Uuid,
        pickup: GeoPoint,
    ) -> Option<JoinHandle<MatchOutcome>> {
        match self.active.entry(trip_id) {
            Entry::Occupied(_) => {
                warn!(trip_id = %trip_id, "matching already in flight; ignoring duplicate");
                return None;
            }
            Entry::Vacant(slot) => {
                slot.insert(Instant::now());
            }
        }
        self.metrics.active_matches.inc();

        let matcher = Arc::clone(self);
        Some(tokio::spawn(async move {
            let started = Instant::now();
            let run = ActiveRun {
                matcher: &matcher,
                trip_id,
            };
            let outcome = matcher.match_courier(trip_id, pickup).await;
            drop(run);

            matcher
                .metrics
                .matches_total
                .with_label_values(&[outcome.label()])
                .inc();
            matcher
                .metrics
                .match_latency_seconds
                .with_label_values(&[outcome.label()])
                .observe(started.elapsed().as_secs_f64());

            info!(trip_id = %trip_id, outcome = outcome.label(), "matching finished");
            outcome
        }))
    }

    /// Polls for a courier near `pickup` every tick until one is bound, the
    /// trip disappears or is cancelled, or the deadline passes.
    pub async fn match_courier(&self, trip_id: Uuid, pickup: GeoPoint) -> MatchOutcome {
        let deadline = sleep(self.config.deadline);
        tokio::pin!(deadline);

        let mut ticker = interval(self.config.tick);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(trip_id = %trip_id, "courier search started");

        loop {
            tokio::select! {
                _ = &mut deadline => return self.give_up(trip_id).await,
                _ = ticker.tick() => {
                    if let Tick::Done(outcome) = self.search_once(trip_id, pickup).await {
                        return outcome;
                    }
                }
            }
        }
    }

    async fn search_once(&self, trip_id: Uuid, pickup: GeoPoint) -> Tick {
        if let Some(outcome) = self.trip_gone(trip_id).await {
            return Tick::Done(outcome);
        }

        let courier = match self
            .store
            .nearest_available_courier(pickup, self.config.search_radius_meters)
            .await
        {
            Ok(Some(courier)) => courier,
            Ok(None) => return Tick::Continue,
            Err(err) => {
                warn!(trip_id = %trip_id, error = %err, "nearby courier query failed");
                return Tick::Continue;
            }
        };

        info!(trip_id = %trip_id, courier_id = %courier.id, "courier found");
        if let Err(err) = self
            .trips
            .report_status(trip_id, TripStatus::CourierFound)
            .await
        {
            if let Some(outcome) = self.trip_gone(trip_id).await {
                return Tick::Done(outcome);
            }
            warn!(trip_id = %trip_id, error = %err, "failed to record courier_found");
            return Tick::Done(MatchOutcome::Aborted);
        }

        // The settle delay above leaves room for a cancellation.
        if let Some(outcome) = self.trip_gone(trip_id).await {
            return Tick::Done(outcome);
        }

        // The store refuses to bind an ended trip, so a cancel that lands
        // after the check above surfaces here.
        if let Err(err) = self.assign_courier_to_trip(trip_id, courier.id).await {
            if let Some(outcome) = self.trip_gone(trip_id).await {
                return Tick::Done(outcome);
            }
            warn!(
                trip_id = %trip_id,
                courier_id = %courier.id,
                error = %err,
                "courier assignment failed"
            );
            return Tick::Done(MatchOutcome::AssignmentFailed);
        }

        match self
            .trips
            .report_status(trip_id, TripStatus::CourierAssigned)
            .await
        {
            Ok(_) => Tick::Done(MatchOutcome::Assigned(courier.id)),
            Err(DispatchError::TripClosed { .. }) => {
                if let Err(err) = self.unassign_trip(trip_id).await {
                    warn!(trip_id = %trip_id, error = %err, "failed to release courier");
                }
                Tick::Done(MatchOutcome::Cancelled)
            }
            Err(err) => {
                warn!(trip_id = %trip_id, error = %err, "failed to record courier_assigned");
                Tick::Done(MatchOutcome::Aborted)
            }
        }
    }

    async fn give_up(&self, trip_id: Uuid) -> MatchOutcome {
        if let Some(outcome) = self.trip_gone(trip_id).await {
            return outcome;
        }

        match self
            .trips
            .report_status(trip_id, TripStatus::CourierNotFound)
            .await
        {
            Ok(_) => MatchOutcome::NotFound,
            Err(DispatchError::TripClosed { .. }) => MatchOutcome::Cancelled,
            Err(err) => {
                warn!(trip_id = %trip_id, error = %err, "failed to record courier_not_found");
                MatchOutcome::Aborted
            }
        }
    }

    /// `Some` when the run should end quietly: the trip is missing, cancelled,
    /// or cannot be read.
    async fn trip_gone(&self, trip_id: Uuid) -> Option<MatchOutcome> {
        match self.store.get_trip(trip_id).await {
            Ok(Some(trip)) if trip.status == TripStatus::Cancelled => Some(MatchOutcome::Cancelled),
            Ok(Some(_)) => None,
            Ok(None) => Some(MatchOutcome::TripMissing),
            Err(err) => {
                warn!(trip_id = %trip_id, error = %err, "trip lookup failed during matching");
                Some(MatchOutcome::Aborted)
            }
        }
    }

    /// Binds courier and trip, then prices the trip in the background.
    pub async fn assign_courier_to_trip(
        &self,
        trip_id: Uuid,
        courier_id: Uuid,
    ) -> Result<(), DispatchError> {
        self.store.assign_courier(trip_id, courier_id).await?;
        info!(trip_id = %trip_id, courier_id = %courier_id, "courier assigned");

        let store = Arc::clone(&self.store);
        let routes = Arc::clone(&self.routes);
        tokio::spawn(async move {
            if let Err(err) = record_fare(store, routes, trip_id, courier_id).await {
                warn!(trip_id = %trip_id, error = %err, "fare computation failed");
            }
        });

        Ok(())
    }

    pub async fn unassign_trip(&self, trip_id: Uuid) -> Result<(), DispatchError> {
        self.store.unassign_trip(trip_id).await?;
        info!(trip_id = %trip_id, "courier released from trip");
        Ok(())
    }
}

async fn record_fare(
    store: Arc<dyn GeoStore>,
    routes: Arc<RouteProvider>,
    trip_id: Uuid,
    courier_id: Uuid,
) -> Result<u64, DispatchError> {
    let trip = store
        .get_trip(trip_id)
        .await?
        .ok_or_else(|| DispatchError::trip_not_found(trip_id))?;
    let courier = store
        .get_courier(courier_id)
        .await?
        .ok_or_else(|| DispatchError::courier_not_found(courier_id))?;
    let product = store
        .get_product(courier.product_id)
        .await?
        .ok_or_else(|| DispatchError::NotFound(format!("product {} not found", courier.product_id)))?;

    let cost = routes.price_trip(&trip, &product).await?;
    store.set_trip_cost(trip_id, cost).await?;

    info!(
        trip_id = %trip_id,
        cost,
        revenue = routes.pricer().calculate_trip_revenue(cost),
        "trip fare recorded"
    );
    Ok(cost)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use async_trait::async_trait;
    use chrono::Utc;
    use tokio::sync::Mutex;
    use uuid::Uuid;

    use super::{CourierMatcher, MatchOutcome, MatchingConfig};
    use crate::cache::memory::InMemoryRouteCache;
    use crate::engine::lifecycle::TripStateMachine;
    use crate::engine::pricing::Pricer;
    use crate::engine::routing::{RouteConfig, RouteProvider};
    use crate::error::DispatchError;
    use crate::models::courier::{Courier, CourierStatus};
    use crate::models::geocode::{GeoPoint, Geocode, PlaceSuggestion};
    use crate::models::product::Product;
    use crate::models::route::{DirectionsRoute, RouteRef};
    use crate::models::trip::{NewTrip, TripStatus};
    use crate::notify::{Channel, Publisher};
    use crate::observability::metrics::Metrics;
    use crate::providers::{DirectionsApi, PlaceResolver};
    use crate::store::memory::InMemoryStore;
    use crate::store::GeoStore;

    const PICKUP: GeoPoint = GeoPoint {
        lat: 1.2345678,
        lng: 36.1234567,
    };

    struct StaticDirections;

    #[async_trait]
    impl DirectionsApi for StaticDirections {
        async fn compute_route(
            &self,
            _origin: GeoPoint,
            _destination: GeoPoint,
        ) -> Result<DirectionsRoute, DispatchError> {
            Ok(DirectionsRoute {
                polyline: "poly".to_string(),
                distance_meters: 5000,
                duration_secs: 600,
                static_duration_secs: 600,
            })
        }
    }

    struct NoPlaces;

    #[async_trait]
    impl PlaceResolver for NoPlaces {
        async fn place_details(&self, place_id: &str) -> Result<Geocode, DispatchError> {
            Err(DispatchError::Upstream(format!("unknown place {place_id}")))
        }

        async fn autocomplete(&self, _input: &str) -> Result<Vec<PlaceSuggestion>, DispatchError> {
            Ok(Vec::new())
        }
    }

    #[derive(Default)]
    struct CountingPublisher {
        by_status: Mutex<Vec<(Channel, String)>>,
        total: AtomicUsize,
    }

    #[async_trait]
    impl Publisher for CountingPublisher {
        async fn publish(
            &self,
            channel: Channel,
            payload: serde_json::Value,
        ) -> Result<(), DispatchError> {
            self.total.fetch_add(1, Ordering::SeqCst);
            let status = payload["status"].as_str().unwrap_or_default().to_string();
            self.by_status.lock().await.push((channel, status));
            Ok(())
        }
    }

    struct Harness {
        store: Arc<InMemoryStore>,
        publisher: Arc<CountingPublisher>,
        matcher: Arc<CourierMatcher>,
    }

    fn harness(config: MatchingConfig) -> Harness {
        harness_with_settle(config, Duration::ZERO)
    }

    fn harness_with_settle(config: MatchingConfig, settle_delay: Duration) -> Harness {
        let store = Arc::new(InMemoryStore::new());
        let publisher = Arc::new(CountingPublisher::default());
        let metrics = Metrics::new();
        let trips = Arc::new(TripStateMachine::new(
            store.clone(),
            publisher.clone(),
            settle_delay,
            metrics.clone(),
        ));
        let routes = Arc::new(RouteProvider::new(
            Arc::new(StaticDirections),
            Arc::new(NoPlaces),
            Arc::new(InMemoryRouteCache::new()),
            store.clone(),
            Pricer::new(100, "economy"),
            RouteConfig::default(),
            metrics.clone(),
        ));
        let matcher = Arc::new(CourierMatcher::new(
            store.clone(),
            trips,
            routes,
            config,
            metrics,
        ));
        Harness {
            store,
            publisher,
            matcher,
        }
    }

    fn fast() -> MatchingConfig {
        MatchingConfig {
            tick: Duration::from_millis(20),
            deadline: Duration::from_millis(200),
            search_radius_meters: 2000.0,
        }
    }

    async fn trip(store: &InMemoryStore) -> Uuid {
        store
            .create_trip(NewTrip {
                requester_id: Uuid::new_v4(),
                start: PICKUP,
                end: GeoPoint::new(1.3, 36.2),
                route: Some(RouteRef {
                    cache_key: "route:test".to_string(),
                    distance_meters: 5000,
                    polyline: "poly".to_string(),
                }),
            })
            .await
            .unwrap()
            .id
    }

    async fn courier(store: &InMemoryStore, product: &Product, location: GeoPoint) -> Uuid {
        store.upsert_product(product.clone()).await.unwrap();
        let courier = Courier {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            location: Some(location),
            status: CourierStatus::Online,
            product_id: product.id,
            trip_id: None,
            updated_at: Utc::now(),
        };
        store.upsert_courier(courier.clone()).await.unwrap();
        courier.id
    }

    fn economy_van() -> Product {
        Product {
            id: Uuid::new_v4(),
            name: "economy".to_string(),
            weight_class: 500_000,
            description: "cargo van".to_string(),
            icon_url: None,
        }
    }

    #[tokio::test]
    async fn no_courier_ends_in_not_found_exactly_once() {
        let h = harness(fast());
        let trip_id = trip(&h.store).await;

        let outcome = h.matcher.spawn_match(trip_id, PICKUP).unwrap().await.unwrap();

        assert_eq!(outcome, MatchOutcome::NotFound);
        let trip = h.store.get_trip(trip_id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::CourierNotFound);

        let sent = h.publisher.by_status.lock().await;
        let not_found: Vec<_> = sent
            .iter()
            .filter(|(_, status)| status == "courier_not_found")
            .collect();
        assert_eq!(not_found.len(), 1);
        assert_eq!(not_found[0].0, Channel::TripUpdates);
        assert!(!h.matcher.active.contains_key(&trip_id));
    }

    #[tokio::test]
    async fn nearby_courier_is_assigned_and_priced() {
        let h = harness(fast());
        let trip_id = trip(&h.store).await;
        let courier_id = courier(&h.store, &economy_van(), GeoPoint::new(1.236, 36.124)).await;

        let outcome = h.matcher.spawn_match(trip_id, PICKUP).unwrap().await.unwrap();
        assert_eq!(outcome, MatchOutcome::Assigned(courier_id));

        let trip = h.store.get_trip(trip_id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::CourierAssigned);
        assert_eq!(trip.courier_id, Some(courier_id));

        let courier = h.store.get_courier(courier_id).await.unwrap().unwrap();
        assert_eq!(courier.trip_id, Some(trip_id));

        // fare is written off the critical path
        let mut cost = None;
        for _ in 0..50 {
            cost = h.store.get_trip(trip_id).await.unwrap().unwrap().cost;
            if cost.is_some() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(cost, Some(2 * 2500 * 100));
    }

    #[tokio::test]
    async fn courier_outside_radius_is_ignored() {
        let h = harness(fast());
        let trip_id = trip(&h.store).await;
        courier(&h.store, &economy_van(), GeoPoint::new(1.5, 36.5)).await;

        let outcome = h.matcher.spawn_match(trip_id, PICKUP).unwrap().await.unwrap();

        assert_eq!(outcome, MatchOutcome::NotFound);
    }

    #[tokio::test]
    async fn cancelled_trip_stops_search_silently() {
        let h = harness(MatchingConfig {
            deadline: Duration::from_secs(5),
            ..fast()
        });
        let trip_id = trip(&h.store).await;
        let run = h.matcher.spawn_match(trip_id, PICKUP).unwrap();

        tokio::time::sleep(Duration::from_millis(50)).await;
        h.store
            .set_trip_status(trip_id, TripStatus::Cancelled)
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(1), run)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, MatchOutcome::Cancelled);
        assert_eq!(h.publisher.total.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn cancel_while_courier_found_settles_binds_nobody() {
        let h = harness_with_settle(
            MatchingConfig {
                deadline: Duration::from_secs(5),
                ..fast()
            },
            Duration::from_millis(300),
        );
        let trip_id = trip(&h.store).await;
        let courier_id = courier(&h.store, &economy_van(), PICKUP).await;
        let run = h.matcher.spawn_match(trip_id, PICKUP).unwrap();

        // first tick fires at once; courier_found is then settling
        tokio::time::sleep(Duration::from_millis(100)).await;
        let found = h.store.get_trip(trip_id).await.unwrap().unwrap();
        assert_eq!(found.status, TripStatus::CourierFound);
        h.store
            .set_trip_status(trip_id, TripStatus::Cancelled)
            .await
            .unwrap();

        let outcome = tokio::time::timeout(Duration::from_secs(2), run)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(outcome, MatchOutcome::Cancelled);

        let trip = h.store.get_trip(trip_id).await.unwrap().unwrap();
        assert_eq!(trip.status, TripStatus::Cancelled);
        assert_eq!(trip.courier_id, None);
        let courier = h.store.get_courier(courier_id).await.unwrap().unwrap();
        assert_eq!(courier.trip_id, None);

        let sent = h.publisher.by_status.lock().await;
        assert!(sent.iter().all(|(_, status)| status != "courier_assigned"));
    }

    #[tokio::test]
    async fn cancelled_trip_rejects_late_binding() {
        let h = harness(fast());
        let trip_id = trip(&h.store).await;
        let courier_id = courier(&h.store, &economy_van(), PICKUP).await;
        h.store
            .set_trip_status(trip_id, TripStatus::Cancelled)
            .await
            .unwrap();

        let err = h
            .matcher
            .assign_courier_to_trip(trip_id, courier_id)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::TripNotAssignable(_)));
        let courier = h.store.get_courier(courier_id).await.unwrap().unwrap();
        assert!(courier.is_available());
    }

    #[tokio::test]
    async fn panicked_run_frees_its_slot() {
        // tokio refuses a zero-length interval
        let h = harness(MatchingConfig {
            tick: Duration::ZERO,
            ..fast()
        });
        let trip_id = trip(&h.store).await;

        let result = h.matcher.spawn_match(trip_id, PICKUP).unwrap().await;

        assert!(result.unwrap_err().is_panic());
        assert!(!h.matcher.active.contains_key(&trip_id));
        assert_eq!(h.matcher.active_runs(), 0);
    }

    #[tokio::test]
    async fn missing_trip_ends_run() {
        let h = harness(fast());

        let outcome = h
            .matcher
            .spawn_match(Uuid::new_v4(), PICKUP)
            .unwrap()
            .await
            .unwrap();

        assert_eq!(outcome, MatchOutcome::TripMissing);
        assert_eq!(h.publisher.total.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn duplicate_run_for_same_trip_is_refused() {
        let h = harness(fast());
        let trip_id = trip(&h.store).await;

        let first = h.matcher.spawn_match(trip_id, PICKUP);
        let second = h.matcher.spawn_match(trip_id, PICKUP);

        assert!(first.is_some());
        assert!(second.is_none());
        assert_eq!(first.unwrap().await.unwrap(), MatchOutcome::NotFound);
    }

    #[tokio::test]
    async fn busy_courier_cannot_be_assigned_twice() {
        let h = harness(fast());
        let first = trip(&h.store).await;
        let second = trip(&h.store).await;
        let courier_id = courier(&h.store, &economy_van(), PICKUP).await;

        h.matcher
            .assign_courier_to_trip(first, courier_id)
            .await
            .unwrap();
        let err = h
            .matcher
            .assign_courier_to_trip(second, courier_id)
            .await
            .unwrap_err();

        assert!(matches!(err, DispatchError::CourierAlreadyAssigned(_)));
        let first_trip = h.store.get_trip(first).await.unwrap().unwrap();
        assert_eq!(first_trip.courier_id, Some(courier_id));
        assert_eq!(first_trip.status, TripStatus::Created);
    }
}
