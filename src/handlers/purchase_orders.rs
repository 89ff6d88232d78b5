use super::common::{
    created_response, no_content_response, success_response, validate_input, ListQuery,
};
use crate::{
    entities::purchase_order::PurchaseOrderStatus,
    errors::ApiError,
    handlers::AppState,
    services::purchase_orders::{
        CreatePurchaseOrderRequest, PurchaseOrderFilter, PurchaseOrderResponse,
    },
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
pub struct PurchaseOrderListParams {
    pub shop_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub status: Option<PurchaseOrderStatus>,
}

/// Create a new purchase order
#[utoipa::path(
    post,
    path = "/api/PurchaseOrder",
    request_body = CreatePurchaseOrderRequest,
    responses(
        (status = 201, description = "Purchase order created", body = crate::ApiResponse<PurchaseOrderResponse>),
        (status = 400, description = "Invalid request"),
        (status = 404, description = "Referenced record not found")
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn create_purchase_order(
    State(state): State<AppState>,
    Json(payload): Json<CreatePurchaseOrderRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    let order = state.services.purchase_orders.create(payload).await?;
    info!(
        "Purchase order created: {} ({})",
        order.purchase_order.po_number, order.purchase_order.id
    );
    Ok(created_response(order))
}

#[utoipa::path(
    get,
    path = "/api/PurchaseOrder",
    params(ListQuery, PurchaseOrderListParams),
    responses((status = 200, description = "One page of purchase orders")),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn list_purchase_orders(
    State(state): State<AppState>,
    Query(query): Query<ListQuery>,
    Query(params): Query<PurchaseOrderListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let filter = PurchaseOrderFilter {
        shop_id: params.shop_id,
        supplier_id: params.supplier_id,
        status: params.status,
    };
    let orders = state.services.purchase_orders.list(&page, &filter).await?;
    Ok(success_response(orders))
}

#[utoipa::path(
    get,
    path = "/api/PurchaseOrder/{id}",
    params(("id" = Uuid, Path, description = "Purchase order id")),
    responses(
        (status = 200, description = "Purchase order with its lines", body = crate::ApiResponse<PurchaseOrderResponse>),
        (status = 404, description = "Purchase order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.purchase_orders.get(id).await?;
    Ok(success_response(order))
}

/// Mark goods as received and put them into stock
#[utoipa::path(
    post,
    path = "/api/PurchaseOrder/{id}/receive",
    params(("id" = Uuid, Path, description = "Purchase order id")),
    responses(
        (status = 200, description = "Purchase order received", body = crate::ApiResponse<PurchaseOrderResponse>),
        (status = 400, description = "Purchase order is not pending"),
        (status = 404, description = "Purchase order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn receive_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.purchase_orders.receive(id).await?;
    info!("Purchase order received: {}", order.purchase_order.po_number);
    Ok(success_response(order))
}

#[utoipa::path(
    post,
    path = "/api/PurchaseOrder/{id}/cancel",
    params(("id" = Uuid, Path, description = "Purchase order id")),
    responses(
        (status = 200, description = "Purchase order cancelled", body = crate::ApiResponse<PurchaseOrderResponse>),
        (status = 400, description = "Purchase order is not pending"),
        (status = 404, description = "Purchase order not found")
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn cancel_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let order = state.services.purchase_orders.cancel(id).await?;
    info!("Purchase order cancelled: {}", order.purchase_order.po_number);
    Ok(success_response(order))
}

#[utoipa::path(
    delete,
    path = "/api/PurchaseOrder/{id}",
    params(("id" = Uuid, Path, description = "Purchase order id")),
    responses(
        (status = 204, description = "Purchase order deleted"),
        (status = 404, description = "Purchase order not found"),
        (status = 409, description = "Only pending purchase orders can be deleted")
    ),
    security(("bearer_auth" = [])),
    tag = "purchase-orders"
)]
pub async fn delete_purchase_order(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.purchase_orders.delete(id).await?;
    Ok(no_content_response())
}
