use super::common::{
    created_response, ensure_shop_access, no_content_response, success_response, validate_input,
    ListQuery,
};
use crate::{
    auth::{AuthUser, Role},
    entities::invoice::InvoiceStatus,
    errors::ApiError,
    handlers::AppState,
    services::invoices::{CreateInvoiceRequest, InvoiceFilter, InvoiceResponse},
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
pub struct InvoiceListParams {
    pub shop_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
}

/// Create an invoice
///
/// Prices every line (defaulting to the product's sale price), applies an
/// optional promotion code and takes the quantities out of stock.
#[utoipa::path(
    post,
    path = "/api/Invoice",
    request_body = CreateInvoiceRequest,
    responses(
        (status = 201, description = "Invoice created", body = crate::ApiResponse<InvoiceResponse>),
        (status = 400, description = "Invalid request or promotion not applicable"),
        (status = 403, description = "Employee acting outside their own shop"),
        (status = 404, description = "Referenced record not found"),
        (status = 422, description = "Insufficient stock")
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn create_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Json(mut payload): Json<CreateInvoiceRequest>,
) -> Result<impl IntoResponse, ApiError> {
    validate_input(&payload)?;
    ensure_shop_access(&user, payload.shop_id)?;

    if user.role == Role::Employee && payload.employee_id.is_none() {
        payload.employee_id = Some(user.user_id);
    }

    let invoice = state.services.invoices.create(payload).await?;
    info!(
        "Invoice created: {} ({})",
        invoice.invoice.invoice_number, invoice.invoice.id
    );
    Ok(created_response(invoice))
}

/// List invoice headers, newest first
#[utoipa::path(
    get,
    path = "/api/Invoice",
    params(ListQuery, InvoiceListParams),
    responses((status = 200, description = "One page of invoices")),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn list_invoices(
    State(state): State<AppState>,
    user: AuthUser,
    Query(query): Query<ListQuery>,
    Query(params): Query<InvoiceListParams>,
) -> Result<impl IntoResponse, ApiError> {
    let page = query.page_request(&state.config);
    let filter = InvoiceFilter {
        shop_id: user.shop_id.or(params.shop_id),
        customer_id: params.customer_id,
        status: params.status,
    };
    let invoices = state.services.invoices.list(&page, &filter).await?;
    Ok(success_response(invoices))
}

#[utoipa::path(
    get,
    path = "/api/Invoice/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice with its lines", body = crate::ApiResponse<InvoiceResponse>),
        (status = 404, description = "Invoice not found")
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn get_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let invoice = state.services.invoices.get(id).await?;
    ensure_shop_access(&user, invoice.invoice.shop_id)?;
    Ok(success_response(invoice))
}

/// Cancel a paid invoice, returning its stock
#[utoipa::path(
    post,
    path = "/api/Invoice/{id}/cancel",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 200, description = "Invoice cancelled", body = crate::ApiResponse<InvoiceResponse>),
        (status = 400, description = "Invoice already cancelled"),
        (status = 404, description = "Invoice not found")
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn cancel_invoice(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let existing = state.services.invoices.get(id).await?;
    ensure_shop_access(&user, existing.invoice.shop_id)?;

    let invoice = state.services.invoices.cancel(id).await?;
    info!("Invoice cancelled: {}", invoice.invoice.invoice_number);
    Ok(success_response(invoice))
}

#[utoipa::path(
    delete,
    path = "/api/Invoice/{id}",
    params(("id" = Uuid, Path, description = "Invoice id")),
    responses(
        (status = 204, description = "Invoice and its lines deleted"),
        (status = 404, description = "Invoice not found")
    ),
    security(("bearer_auth" = [])),
    tag = "invoices"
)]
pub async fn delete_invoice(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    state.services.invoices.delete(id).await?;
    Ok(no_content_response())
}
