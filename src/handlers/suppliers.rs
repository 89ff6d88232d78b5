use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::suppliers::{CreateSupplierRequest, UpdateSupplierRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

/// List suppliers
#[utoipa::path(
    get,
    path = "/api/Supplier",
    params(ListQuery),
    responses((status = 200, description = "One page of suppliers")),
    security(("bearer_auth" = [])),
    tag = "suppliers"
)]
pub async fn list_suppliers(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let suppliers = state.services.suppliers.list(&page).await?;
    Ok(success_response(suppliers))
}

/// Get a supplier by ID
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let supplier = state.services.suppliers.get(supplier_id).await?;
    Ok(success_response(supplier))
}

/// Create a new supplier
#[utoipa::path(
    post,
    path = "/api/Supplier",
    request_body = CreateSupplierRequest,
    responses(
        (status = 201, description = "Supplier created", body = crate::entities::supplier::Model),
        (status = 400, description = "Invalid request"),
        (status = 409, description = "Supplier code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "suppliers"
)]
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(payload): Json<CreateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.create(payload).await?;
    info!("Supplier created: {}", supplier.id);
    Ok(created_response(supplier))
}

/// Update a supplier
pub async fn update_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
    Json(payload): Json<UpdateSupplierRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let supplier = state.services.suppliers.update(supplier_id, payload).await?;
    Ok(success_response(supplier))
}

/// Delete a supplier
pub async fn delete_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.suppliers.delete(supplier_id).await?;
    info!("Supplier deleted: {}", supplier_id);
    Ok(no_content_response())
}
