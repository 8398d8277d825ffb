use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::Deserialize;

use crate::error::DispatchError;
use crate::models::geocode::PlaceSuggestion;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/places/autocomplete", get(autocomplete))
}

#[derive(Deserialize)]
pub struct AutocompleteQuery {
    pub input: String,
}

async fn autocomplete(
    State(state): State<Arc<AppState>>,
    Query(query): Query<AutocompleteQuery>,
) -> Result<Json<Vec<PlaceSuggestion>>, DispatchError> {
    Ok(Json(state.dispatcher.autocomplete(&query.input).await?))
}
