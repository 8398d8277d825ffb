use std::sync::Arc;

use axum::extract::{Path, State};
use axum::routing::{get, patch, post};
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::geocode::{GeoPoint, PlaceInput};
use crate::models::route::Route;
use crate::models::trip::{Trip, TripStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/trips", post(create_trip))
        .route("/trips/:id", get(get_trip))
        .route("/trips/:id/status", patch(report_status))
        .route("/trips/:id/pickup", patch(confirm_pickup))
        .route("/trips/:id/courier", patch(assign_courier))
        .route("/routes", post(compute_route))
}

#[derive(Deserialize)]
pub struct CreateTripRequest {
    pub requester_id: Uuid,
    pub pickup: PlaceInput,
    pub dropoff: PlaceInput,
}

#[derive(Deserialize)]
pub struct RouteRequest {
    pub pickup: PlaceInput,
    pub dropoff: PlaceInput,
}

#[derive(Deserialize)]
pub struct ReportStatusRequest {
    pub status: TripStatus,
}

#[derive(Deserialize)]
pub struct ConfirmPickupRequest {
    pub location: GeoPoint,
}

#[derive(Deserialize)]
pub struct AssignCourierRequest {
    pub courier_id: Uuid,
}

async fn create_trip(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateTripRequest>,
) -> Result<Json<Trip>, DispatchError> {
    let trip = state
        .dispatcher
        .create_trip(payload.requester_id, &payload.pickup, &payload.dropoff)
        .await?;
    Ok(Json(trip))
}

async fn get_trip(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Trip>, DispatchError> {
    Ok(Json(state.dispatcher.get_trip_details(id).await?))
}

async fn report_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReportStatusRequest>,
) -> Result<Json<Trip>, DispatchError> {
    if payload.status == TripStatus::CourierSearching {
        return Err(DispatchError::BadRequest(
            "courier_searching cannot be reported".to_string(),
        ));
    }

    let trip = state
        .dispatcher
        .report_trip_status(id, payload.status)
        .await?;
    Ok(Json(trip))
}

async fn confirm_pickup(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ConfirmPickupRequest>,
) -> Result<Json<Trip>, DispatchError> {
    Ok(Json(
        state
            .dispatcher
            .confirm_pickup(id, payload.location)
            .await?,
    ))
}

async fn assign_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignCourierRequest>,
) -> Result<Json<Trip>, DispatchError> {
    Ok(Json(
        state
            .dispatcher
            .assign_courier(id, payload.courier_id)
            .await?,
    ))
}

async fn compute_route(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<RouteRequest>,
) -> Result<Json<Route>, DispatchError> {
    let route = state
        .dispatcher
        .compute_route(&payload.pickup, &payload.dropoff)
        .await?;
    Ok(Json(route))
}
