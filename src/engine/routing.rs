use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, warn};

use crate::cache::{route_key, RouteCache, ROUTE_CACHE_TTL};
use crate::engine::pricing::Pricer;
use crate::error::DispatchError;
use crate::models::geocode::{GeoPoint, Geocode, PlaceInput, PlaceSuggestion};
use crate::models::product::{PricedProduct, Product};
use crate::models::route::{DirectionsRoute, Route, RouteRef};
use crate::models::trip::Trip;
use crate::observability::metrics::Metrics;
use crate::providers::{DirectionsApi, PlaceResolver};
use crate::store::GeoStore;

/// Radius around the pickup in which product availability is checked.
pub const PRODUCT_SEARCH_RADIUS_METERS: f64 = 2_000.0;

#[derive(Debug, Clone)]
pub struct RouteConfig {
    /// Off outside development so provider failures are never masked by stale
    /// cache entries in production monitoring.
    pub cache_enabled: bool,
    pub cache_ttl: Duration,
    pub product_radius_meters: f64,
}

impl Default for RouteConfig {
    fn default() -> Self {
        Self {
            cache_enabled: true,
            cache_ttl: ROUTE_CACHE_TTL,
            product_radius_meters: PRODUCT_SEARCH_RADIUS_METERS,
        }
    }
}

/// A priced route together with the resolved endpoints it was built from.
#[derive(Debug, Clone)]
pub struct QuotedRoute {
    pub pickup: Geocode,
    pub dropoff: Geocode,
    pub cache_key: String,
    pub route: Route,
}

impl QuotedRoute {
    pub fn route_ref(&self) -> RouteRef {
        RouteRef {
            cache_key: self.cache_key.clone(),
            distance_meters: self.route.distance_meters,
            polyline: self.route.polyline.clone(),
        }
    }
}

pub struct RouteProvider {
    directions: Arc<dyn DirectionsApi>,
    places: Arc<dyn PlaceResolver>,
    cache: Arc<dyn RouteCache>,
    store: Arc<dyn GeoStore>,
    pricer: Pricer,
    config: RouteConfig,
    metrics: Metrics,
}

impl RouteProvider {
    pub fn new(
        directions: Arc<dyn DirectionsApi>,
        places: Arc<dyn PlaceResolver>,
        cache: Arc<dyn RouteCache>,
        store: Arc<dyn GeoStore>,
        pricer: Pricer,
        config: RouteConfig,
        metrics: Metrics,
    ) -> Self {
        Self {
            directions,
            places,
            cache,
            store,
            pricer,
            config,
            metrics,
        }
    }

    pub fn pricer(&self) -> &Pricer {
        &self.pricer
    }

    pub async fn compute_trip_route(
        &self,
        pickup: &PlaceInput,
        dropoff: &PlaceInput,
    ) -> Result<Route, DispatchError> {
        Ok(self.quote(pickup, dropoff).await?.route)
    }

    pub async fn quote(
        &self,
        pickup: &PlaceInput,
        dropoff: &PlaceInput,
    ) -> Result<QuotedRoute, DispatchError> {
        let pickup = self.resolve(pickup).await?;
        let dropoff = self.resolve(dropoff).await?;

        let (cache_key, directions) = self.directions_between(pickup.point, dropoff.point).await?;
        let products = self
            .priced_products(pickup.point, directions.distance_meters)
            .await?;

        Ok(QuotedRoute {
            pickup,
            dropoff,
            cache_key,
            route: Route {
                polyline: directions.polyline,
                distance_meters: directions.distance_meters,
                products,
            },
        })
    }

    /// Coordinates win when present; autocomplete selections carry only a
    /// place id and go through place details.
    pub async fn resolve(&self, input: &PlaceInput) -> Result<Geocode, DispatchError> {
        if !input.location.is_zero() {
            return Ok(Geocode {
                place_id: input.place_id.clone(),
                formatted_address: input.formatted_address.clone(),
                point: input.location,
            });
        }

        self.places.place_details(&input.place_id).await
    }

    pub async fn autocomplete(&self, input: &str) -> Result<Vec<PlaceSuggestion>, DispatchError> {
        self.places.autocomplete(input).await
    }

    /// Directions for the ordered pair, served from the cache when allowed.
    /// Cache faults degrade to a miss; directions faults are returned as-is.
    pub async fn directions_between(
        &self,
        pickup: GeoPoint,
        dropoff: GeoPoint,
    ) -> Result<(String, DirectionsRoute), DispatchError> {
        let key = route_key(&pickup, &dropoff);

        if !self.config.cache_enabled {
            self.record_lookup("bypass");
            let route = self.directions.compute_route(pickup, dropoff).await?;
            return Ok((key, route));
        }

        match self.cache.get(&key).await {
            Ok(Some(route)) => {
                self.record_lookup("hit");
                debug!(key = %key, "route cache hit");
                return Ok((key, route));
            }
            Ok(None) => self.record_lookup("miss"),
            Err(err) => {
                self.record_lookup("error");
                warn!(key = %key, error = %err, "route cache read failed");
            }
        }

        let route = self.directions.compute_route(pickup, dropoff).await?;

        if let Err(err) = self.cache.set(&key, &route, self.config.cache_ttl).await {
            warn!(key = %key, error = %err, "route cache write failed");
        }

        Ok((key, route))
    }

    pub async fn priced_products(
        &self,
        pickup: GeoPoint,
        distance_meters: u64,
    ) -> Result<Vec<PricedProduct>, DispatchError> {
        let products = self
            .store
            .nearby_products(pickup, self.config.product_radius_meters)
            .await?;

        Ok(products
            .into_iter()
            .map(|product| PricedProduct {
                price: self.pricer.price_for(&product, distance_meters),
                product,
            })
            .collect())
    }

    /// Fare for a trip once its courier's product is known. A confirmed pickup
    /// means the courier re-routed, so the quoted distance no longer applies.
    pub async fn price_trip(&self, trip: &Trip, product: &Product) -> Result<u64, DispatchError> {
        let distance_meters = match (&trip.route, trip.confirmed_pickup) {
            (Some(route), None) => route.distance_meters,
            _ => {
                self.directions_between(trip.pickup(), trip.end)
                    .await?
                    .1
                    .distance_meters
            }
        };

        Ok(self.pricer.price_for(product, distance_meters))
    }

    fn record_lookup(&self, result: &str) {
        self.metrics
            .route_cache_lookups_total
            .with_label_values(&[result])
            .inc();
    }
}
