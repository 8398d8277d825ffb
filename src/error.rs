use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("courier {0} already has an active trip")]
    CourierAlreadyAssigned(Uuid),

    #[error("trip {0} already has a courier or has ended")]
    TripNotAssignable(Uuid),

    #[error("trip {trip_id} is already {status}")]
    TripClosed { trip_id: Uuid, status: &'static str },

    #[error("upstream failure: {0}")]
    Upstream(String),

    #[error("persistence failure: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl DispatchError {
    pub fn trip_not_found(id: Uuid) -> Self {
        DispatchError::NotFound(format!("trip {id} not found"))
    }

    pub fn courier_not_found(id: Uuid) -> Self {
        DispatchError::NotFound(format!("courier {id} not found"))
    }
}

impl From<reqwest::Error> for DispatchError {
    fn from(err: reqwest::Error) -> Self {
        DispatchError::Upstream(err.to_string())
    }
}

impl IntoResponse for DispatchError {
    fn into_response(self) -> Response {
        let status = match &self {
            DispatchError::NotFound(_) => StatusCode::NOT_FOUND,
            DispatchError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DispatchError::CourierAlreadyAssigned(_)
            | DispatchError::TripNotAssignable(_)
            | DispatchError::TripClosed { .. } => StatusCode::CONFLICT,
            DispatchError::Upstream(_) => StatusCode::BAD_GATEWAY,
            DispatchError::Persistence(_) | DispatchError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}
