use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    entities::promotion,
    errors::ApiError,
    handlers::AppState,
    services::promotions::{CreatePromotionRequest, UpdatePromotionRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

/// List promotions, newest first
#[utoipa::path(
    get,
    path = "/api/Promotion",
    params(ListQuery),
    responses((status = 200, description = "One page of promotions")),
    security(("bearer_auth" = [])),
    tag = "promotions"
)]
pub async fn list_promotions(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let promotions = state.services.promotions.list(&page).await?;
    Ok(success_response(promotions))
}

#[utoipa::path(
    get,
    path = "/api/Promotion/{id}",
    params(("id" = Uuid, Path, description = "Promotion id")),
    responses(
        (status = 200, description = "Promotion", body = promotion::Model),
        (status = 404, description = "Promotion not found")
    ),
    security(("bearer_auth" = [])),
    tag = "promotions"
)]
pub async fn get_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let promotion = state.services.promotions.get(id).await?;
    Ok(success_response(promotion))
}

/// Look a promotion up by its code, as typed at the till
#[utoipa::path(
    get,
    path = "/api/Promotion/code/{code}",
    params(("code" = String, Path, description = "Promotion code, case-insensitive")),
    responses(
        (status = 200, description = "Promotion", body = promotion::Model),
        (status = 404, description = "Unknown code")
    ),
    security(("bearer_auth" = [])),
    tag = "promotions"
)]
pub async fn get_promotion_by_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let promotion = state.services.promotions.get_by_code(&code).await?;
    Ok(success_response(promotion))
}

#[utoipa::path(
    post,
    path = "/api/Promotion",
    request_body = CreatePromotionRequest,
    responses(
        (status = 201, description = "Promotion created", body = promotion::Model),
        (status = 400, description = "Invalid dates or discount value"),
        (status = 409, description = "Promotion code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "promotions"
)]
pub async fn create_promotion(
    State(state): State<AppState>,
    Json(payload): Json<CreatePromotionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let promotion = state.services.promotions.create(payload).await?;
    info!("Promotion created: {} ({})", promotion.code, promotion.id);
    Ok(created_response(promotion))
}

#[utoipa::path(
    put,
    path = "/api/Promotion/{id}",
    params(("id" = Uuid, Path, description = "Promotion id")),
    request_body = UpdatePromotionRequest,
    responses(
        (status = 200, description = "Promotion updated", body = promotion::Model),
        (status = 400, description = "Invalid dates or discount value"),
        (status = 404, description = "Promotion not found")
    ),
    security(("bearer_auth" = [])),
    tag = "promotions"
)]
pub async fn update_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePromotionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let promotion = state.services.promotions.update(id, payload).await?;
    Ok(success_response(promotion))
}

#[utoipa::path(
    delete,
    path = "/api/Promotion/{id}",
    params(("id" = Uuid, Path, description = "Promotion id")),
    responses(
        (status = 204, description = "Promotion deleted"),
        (status = 409, description = "Promotion used by an invoice")
    ),
    security(("bearer_auth" = [])),
    tag = "promotions"
)]
pub async fn delete_promotion(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.promotions.delete(id).await?;
    Ok(no_content_response())
}
