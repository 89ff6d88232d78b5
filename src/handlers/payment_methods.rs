use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::payment_methods::{CreatePaymentMethodRequest, UpdatePaymentMethodRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use uuid::Uuid;

pub async fn list_payment_methods(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let methods = state.services.payment_methods.list(&page).await?;
    Ok(success_response(methods))
}

pub async fn get_payment_method(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let method = state.services.payment_methods.get(id).await?;
    Ok(success_response(method))
}

pub async fn create_payment_method(
    State(state): State<AppState>,
    Json(payload): Json<CreatePaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let method = state.services.payment_methods.create(payload).await?;
    Ok(created_response(method))
}

pub async fn update_payment_method(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdatePaymentMethodRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let method = state.services.payment_methods.update(id, payload).await?;
    Ok(success_response(method))
}

pub async fn delete_payment_method(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.payment_methods.delete(id).await?;
    Ok(no_content_response())
}
