use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::customers::{CreateCustomerRequest, UpdateCustomerRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

pub async fn list_customers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let customers = state.services.customers.list(&page).await?;
    Ok(success_response(customers))
}

pub async fn get_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let customer = state.services.customers.get(id).await?;
    Ok(success_response(customer))
}

pub async fn create_customer(
    State(state): State<AppState>,
    Json(payload): Json<CreateCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let customer = state.services.customers.create(payload).await?;
    info!("Customer created: {}", customer.id);
    Ok(created_response(customer))
}

pub async fn update_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateCustomerRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let customer = state.services.customers.update(id, payload).await?;
    Ok(success_response(customer))
}

pub async fn delete_customer(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.customers.delete(id).await?;
    Ok(no_content_response())
}
