//! Google Maps Platform client: Routes API for directions, Places API (v1)
//! for place details and autocomplete.

use async_trait::async_trait;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::warn;

use crate::error::DispatchError;
use crate::models::geocode::{GeoPoint, Geocode, PlaceSuggestion};
use crate::models::route::DirectionsRoute;
use crate::providers::{DirectionsApi, PlaceResolver};

pub const DEFAULT_ROUTES_URL: &str = "https://routes.googleapis.com";
pub const DEFAULT_PLACES_URL: &str = "https://places.googleapis.com";

const ROUTES_FIELD_MASK: &str =
    "routes.duration,routes.distanceMeters,routes.polyline.encodedPolyline,routes.staticDuration";
const PLACE_FIELD_MASK: &str = "id,formattedAddress,location";
const TRAVEL_MODE: &str = "DRIVE";
const ROUTING_PREFERENCE: &str = "TRAFFIC_AWARE";

#[derive(Clone)]
pub struct GoogleMapsClient {
    client: Client,
    api_key: String,
    routes_url: String,
    places_url: String,
}

impl GoogleMapsClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_urls(api_key, DEFAULT_ROUTES_URL, DEFAULT_PLACES_URL)
    }

    pub fn with_base_urls(
        api_key: impl Into<String>,
        routes_url: impl Into<String>,
        places_url: impl Into<String>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            routes_url: routes_url.into().trim_end_matches('/').to_string(),
            places_url: places_url.into().trim_end_matches('/').to_string(),
        }
    }

    /// `{places_url}/v1/places/{place_id}` with the id percent-encoded as a
    /// single path segment.
    fn place_url(&self, place_id: &str) -> Result<Url, DispatchError> {
        if matches!(place_id, "." | "..") {
            return Err(DispatchError::BadRequest(format!("invalid place id {place_id}")));
        }

        let mut url = Url::parse(&self.places_url).map_err(|err| {
            DispatchError::Internal(format!("invalid places url {}: {err}", self.places_url))
        })?;
        url.path_segments_mut()
            .map_err(|_| DispatchError::Internal(format!("invalid places url {}", self.places_url)))?
            .pop_if_empty()
            .extend(["v1", "places", place_id]);
        Ok(url)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LatLng {
    latitude: f64,
    longitude: f64,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct Waypoint {
    location: WaypointLocation,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WaypointLocation {
    lat_lng: LatLng,
}

impl From<GeoPoint> for Waypoint {
    fn from(point: GeoPoint) -> Self {
        Self {
            location: WaypointLocation {
                lat_lng: LatLng {
                    latitude: point.lat,
                    longitude: point.lng,
                },
            },
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ComputeRoutesRequest {
    origin: Waypoint,
    destination: Waypoint,
    travel_mode: &'static str,
    routing_preference: &'static str,
    compute_alternative_routes: bool,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    code: i64,
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ComputeRoutesResponse {
    #[serde(default)]
    routes: Vec<RouteBody>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RouteBody {
    #[serde(default)]
    distance_meters: u64,
    duration: Option<String>,
    static_duration: Option<String>,
    polyline: Option<PolylineBody>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PolylineBody {
    #[serde(default)]
    encoded_polyline: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlaceBody {
    #[serde(default)]
    id: String,
    #[serde(default)]
    formatted_address: String,
    location: Option<PlaceLocation>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct PlaceLocation {
    latitude: f64,
    longitude: f64,
}

#[derive(Debug, Deserialize)]
struct AutocompleteBody {
    #[serde(default)]
    suggestions: Vec<Suggestion>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Suggestion {
    place_prediction: Option<PlacePrediction>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PlacePrediction {
    place_id: String,
    text: Option<PredictionText>,
}

#[derive(Debug, Deserialize)]
struct PredictionText {
    text: String,
}

/// Google reports durations as `"123s"`.
fn parse_duration_secs(raw: Option<&str>) -> u64 {
    raw.and_then(|value| value.trim_end_matches('s').parse::<f64>().ok())
        .map(|secs| secs.max(0.0) as u64)
        .unwrap_or(0)
}

fn check_error(error: Option<ApiError>) -> Result<(), DispatchError> {
    match error {
        Some(err) if err.code != 0 => Err(DispatchError::Upstream(format!(
            "google api error {} {}: {}",
            err.code, err.status, err.message
        ))),
        _ => Ok(()),
    }
}

async fn decode<T>(response: reqwest::Response, what: &str) -> Result<T, DispatchError>
where
    T: for<'de> Deserialize<'de>,
{
    let status = response.status();
    let body = response.text().await?;

    serde_json::from_str::<T>(&body).map_err(|err| {
        warn!(%status, error = %err, "undecodable {what} response");
        DispatchError::Upstream(format!("{what} returned {status}: {body}"))
    })
}

#[async_trait]
impl DirectionsApi for GoogleMapsClient {
    async fn compute_route(
        &self,
        origin: GeoPoint,
        destination: GeoPoint,
    ) -> Result<DirectionsRoute, DispatchError> {
        let request = ComputeRoutesRequest {
            origin: origin.into(),
            destination: destination.into(),
            travel_mode: TRAVEL_MODE,
            routing_preference: ROUTING_PREFERENCE,
            compute_alternative_routes: false,
        };

        let response = self
            .client
            .post(format!("{}/directions/v2:computeRoutes", self.routes_url))
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", ROUTES_FIELD_MASK)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body: ComputeRoutesResponse = decode(response, "directions").await?;
        check_error(body.error)?;

        if !status.is_success() {
            return Err(DispatchError::Upstream(format!("directions returned {status}")));
        }

        let route = body
            .routes
            .into_iter()
            .next()
            .ok_or_else(|| DispatchError::Upstream("directions returned no routes".to_string()))?;

        Ok(DirectionsRoute {
            polyline: route
                .polyline
                .map(|polyline| polyline.encoded_polyline)
                .unwrap_or_default(),
            distance_meters: route.distance_meters,
            duration_secs: parse_duration_secs(route.duration.as_deref()),
            static_duration_secs: parse_duration_secs(route.static_duration.as_deref()),
        })
    }
}

#[async_trait]
impl PlaceResolver for GoogleMapsClient {
    async fn place_details(&self, place_id: &str) -> Result<Geocode, DispatchError> {
        if place_id.trim().is_empty() {
            return Err(DispatchError::BadRequest(
                "place id is required when coordinates are missing".to_string(),
            ));
        }

        let response = self
            .client
            .get(self.place_url(place_id)?)
            .header("X-Goog-Api-Key", &self.api_key)
            .header("X-Goog-FieldMask", PLACE_FIELD_MASK)
            .send()
            .await?;

        let status = response.status();
        let body: PlaceBody = decode(response, "place details").await?;
        check_error(body.error)?;

        if !status.is_success() {
            return Err(DispatchError::Upstream(format!("place details returned {status}")));
        }

        let location = body.location.ok_or_else(|| {
            DispatchError::Upstream(format!("place {place_id} has no location"))
        })?;

        Ok(Geocode {
            place_id: if body.id.is_empty() {
                place_id.to_string()
            } else {
                body.id
            },
            formatted_address: body.formatted_address,
            point: GeoPoint::new(location.latitude, location.longitude),
        })
    }

    async fn autocomplete(&self, input: &str) -> Result<Vec<PlaceSuggestion>, DispatchError> {
        let response = self
            .client
            .post(format!("{}/v1/places:autocomplete", self.places_url))
            .header("X-Goog-Api-Key", &self.api_key)
            .json(&json!({ "input": input }))
            .send()
            .await?;

        let status = response.status();
        let body: AutocompleteBody = decode(response, "autocomplete").await?;
        check_error(body.error)?;

        if !status.is_success() {
            return Err(DispatchError::Upstream(format!("autocomplete returned {status}")));
        }

        Ok(body
            .suggestions
            .into_iter()
            .filter_map(|suggestion| suggestion.place_prediction)
            .map(|prediction| PlaceSuggestion {
                place_id: prediction.place_id,
                description: prediction.text.map(|text| text.text).unwrap_or_default(),
            })
            .collect())
    }
}
