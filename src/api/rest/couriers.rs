use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::courier::{Courier, CourierStatus};
use crate::models::geocode::GeoPoint;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/couriers", post(create_courier))
        .route("/couriers/nearby", get(nearby_couriers))
        .route("/couriers/:id", get(get_courier))
        .route("/couriers/:id/status", patch(update_courier_status))
        .route("/couriers/:id/location", patch(update_courier_location))
}

#[derive(Deserialize)]
pub struct CreateCourierRequest {
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub location: Option<GeoPoint>,
    pub status: Option<CourierStatus>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: CourierStatus,
}

#[derive(Deserialize)]
pub struct UpdateLocationRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct NearbyQuery {
    pub lat: f64,
    pub lng: f64,
    pub radius: Option<f64>,
}

async fn create_courier(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateCourierRequest>,
) -> Result<Json<Courier>, DispatchError> {
    let store = state.dispatcher.store();

    if store.get_product(payload.product_id).await?.is_none() {
        return Err(DispatchError::BadRequest(format!(
            "product {} does not exist",
            payload.product_id
        )));
    }

    let courier = Courier {
        id: Uuid::new_v4(),
        user_id: payload.user_id,
        location: payload.location,
        status: payload.status.unwrap_or(CourierStatus::Onboarding),
        product_id: payload.product_id,
        trip_id: None,
        updated_at: Utc::now(),
    };

    Ok(Json(store.upsert_courier(courier).await?))
}

async fn get_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Courier>, DispatchError> {
    let courier = state
        .dispatcher
        .store()
        .get_courier(id)
        .await?
        .ok_or_else(|| DispatchError::courier_not_found(id))?;

    Ok(Json(courier))
}

async fn nearby_couriers(
    State(state): State<Arc<AppState>>,
    Query(query): Query<NearbyQuery>,
) -> Result<Json<Vec<Courier>>, DispatchError> {
    let couriers = state
        .dispatcher
        .get_nearby_couriers(GeoPoint::new(query.lat, query.lng), query.radius)
        .await?;
    Ok(Json(couriers))
}

async fn update_courier_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Courier>, DispatchError> {
    let courier = state
        .dispatcher
        .store()
        .update_courier_status(id, payload.status)
        .await?;
    Ok(Json(courier))
}

async fn update_courier_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLocationRequest>,
) -> Result<Json<Courier>, DispatchError> {
    let courier = state
        .dispatcher
        .store()
        .update_courier_location(id, payload.location)
        .await?;
    Ok(Json(courier))
}
