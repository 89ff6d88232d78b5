use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::shops::{CreateShopRequest, UpdateShopRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

pub async fn list_shops(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let shops = state.services.shops.list(&page).await?;
    Ok(success_response(shops))
}

pub async fn get_shop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let shop = state.services.shops.get(id).await?;
    Ok(success_response(shop))
}

pub async fn create_shop(
    State(state): State<AppState>,
    Json(payload): Json<CreateShopRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let shop = state.services.shops.create(payload).await?;
    info!("Shop created: {} ({})", shop.code, shop.id);
    Ok(created_response(shop))
}

pub async fn update_shop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShopRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let shop = state.services.shops.update(id, payload).await?;
    Ok(success_response(shop))
}

pub async fn delete_shop(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.shops.delete(id).await?;
    Ok(no_content_response())
}
