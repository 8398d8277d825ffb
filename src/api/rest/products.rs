use std::sync::Arc;

use axum::extract::State;
use axum::routing::post;
use axum::Json;
use axum::Router;
use serde::Deserialize;
use uuid::Uuid;

use crate::error::DispatchError;
use crate::models::product::Product;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/products", post(create_product).get(list_products))
}

#[derive(Deserialize)]
pub struct CreateProductRequest {
    pub name: String,
    pub weight_class: u64,
    #[serde(default)]
    pub description: String,
    pub icon_url: Option<String>,
}

async fn create_product(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<Json<Product>, DispatchError> {
    if payload.name.trim().is_empty() {
        return Err(DispatchError::BadRequest("name cannot be empty".to_string()));
    }

    let product = Product {
        id: Uuid::new_v4(),
        name: payload.name,
        weight_class: payload.weight_class,
        description: payload.description,
        icon_url: payload.icon_url,
    };

    Ok(Json(state.dispatcher.store().upsert_product(product).await?))
}

async fn list_products(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Product>>, DispatchError> {
    Ok(Json(state.dispatcher.store().list_products().await?))
}
