#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::Request;
use serde_json::Value;

use trip_dispatch::api::rest::router;
use trip_dispatch::config::Config;
use trip_dispatch::error::DispatchError;
use trip_dispatch::models::geocode::{GeoPoint, Geocode, PlaceSuggestion};
use trip_dispatch::models::route::DirectionsRoute;
use trip_dispatch::providers::{DirectionsApi, PlaceResolver};
use trip_dispatch::state::AppState;

pub const ROUTE_DISTANCE_METERS: u64 = 5000;

#[derive(Default)]
pub struct FakeDirections {
    pub calls: AtomicUsize,
    pub failing: AtomicBool,
}

impl FakeDirections {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DirectionsApi for FakeDirections {
    async fn compute_route(
        &self,
        _origin: GeoPoint,
        _destination: GeoPoint,
    ) -> Result<DirectionsRoute, DispatchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(DispatchError::Upstream(
                "google api error 13 INTERNAL: backend error".to_string(),
            ));
        }
        Ok(DirectionsRoute {
            polyline: "_p~iF~ps|U_ulLnnqC_mqNvxq`@".to_string(),
            distance_meters: ROUTE_DISTANCE_METERS,
            duration_secs: 900,
            static_duration_secs: 840,
        })
    }
}

pub struct FakePlaces;

#[async_trait]
impl PlaceResolver for FakePlaces {
    async fn place_details(&self, place_id: &str) -> Result<Geocode, DispatchError> {
        Ok(Geocode {
            place_id: place_id.to_string(),
            formatted_address: "Moi Avenue, Nairobi".to_string(),
            point: GeoPoint::new(1.3, 36.2),
        })
    }

    async fn autocomplete(&self, input: &str) -> Result<Vec<PlaceSuggestion>, DispatchError> {
        Ok(vec![PlaceSuggestion {
            place_id: "place-moi".to_string(),
            description: format!("{input} - Moi Avenue"),
        }])
    }
}

pub fn test_config() -> Config {
    Config {
        match_tick: Duration::from_millis(20),
        match_deadline: Duration::from_millis(400),
        settle_delay: Duration::from_millis(5),
        route_cache_enabled: true,
        ..Config::default()
    }
}

pub struct TestApp {
    pub app: axum::Router,
    pub state: Arc<AppState>,
    pub directions: Arc<FakeDirections>,
}

pub fn setup() -> TestApp {
    setup_with(test_config())
}

pub fn setup_with(config: Config) -> TestApp {
    let directions = Arc::new(FakeDirections::default());
    let state = Arc::new(AppState::with_providers(
        &config,
        directions.clone(),
        Arc::new(FakePlaces),
    ));

    TestApp {
        app: router(state.clone()),
        state,
        directions,
    }
}

pub fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(serde_json::to_string(&body).unwrap()))
        .unwrap()
}

pub fn get_request(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn body_json(response: axum::response::Response) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub async fn body_string(response: axum::response::Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}
