use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    errors::ApiError,
    handlers::AppState,
    services::products::{CreateProductRequest, ProductFilter, UpdateProductRequest},
};
use axum::{
    extract::{Json, Path, Query, State},
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use utoipa::IntoParams;
use uuid::Uuid;

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ProductListParams {
    pub supplier_id: Option<Uuid>,
    /// Include deactivated products
    #[serde(default)]
    pub include_inactive: bool,
}

/// List products
#[utoipa::path(
    get,
    path = "/api/Product",
    params(ListQuery, ProductListParams),
    responses((status = 200, description = "One page of products")),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn list_products(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(params): Query<ProductListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let filter = ProductFilter {
        supplier_id: params.supplier_id,
        include_inactive: params.include_inactive,
    };
    let products = state.services.products.list(&page, &filter).await?;
    Ok(success_response(products))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let product = state.services.products.get(id).await?;
    Ok(success_response(product))
}

#[utoipa::path(
    post,
    path = "/api/Product",
    request_body = CreateProductRequest,
    responses(
        (status = 201, description = "Product created", body = crate::entities::product::Model),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Supplier not found"),
        (status = 409, description = "Product code already in use")
    ),
    security(("bearer_auth" = [])),
    tag = "products"
)]
pub async fn create_product(
    State(state): State<AppState>,
    Json(payload): Json<CreateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state.services.products.create(payload).await?;
    info!("Product created: {} ({})", product.code, product.id);
    Ok(created_response(product))
}

pub async fn update_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProductRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let product = state.services.products.update(id, payload).await?;
    Ok(success_response(product))
}

/// Deactivates the product
pub async fn delete_product(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.products.delete(id).await?;
    Ok(no_content_response())
}
