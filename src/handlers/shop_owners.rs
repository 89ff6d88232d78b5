use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::shop_owners::{CreateShopOwnerRequest, UpdateShopOwnerRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

pub async fn list_shop_owners(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let owners = state.services.shop_owners.list(&page).await?;
    Ok(success_response(owners))
}

pub async fn get_shop_owner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let owner = state.services.shop_owners.get(id).await?;
    Ok(success_response(owner))
}

pub async fn create_shop_owner(
    State(state): State<AppState>,
    Json(payload): Json<CreateShopOwnerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let owner = state.services.shop_owners.create(payload).await?;
    info!("Shop owner created: {}", owner.id);
    Ok(created_response(owner))
}

pub async fn update_shop_owner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateShopOwnerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let owner = state.services.shop_owners.update(id, payload).await?;
    Ok(success_response(owner))
}

pub async fn delete_shop_owner(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.shop_owners.delete(id).await?;
    Ok(no_content_response())
}
