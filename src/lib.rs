//! Shop API Library
//!
//! Backend for running a small chain of shops: owners, shops, employees,
//! suppliers, the product catalog, customers, promotions, sales invoices and
//! purchase orders, served as a JSON REST API.
#![forbid(unsafe_code)]
#![deny(rust_2018_idioms)]
#![allow(elided_lifetimes_in_paths)]
#![warn(clippy::all, clippy::perf, clippy::dbg_macro)]

// Core modules
pub mod auth;
pub mod config;
pub mod db;
pub mod entities;
pub mod errors;
pub mod events;
pub mod handlers;
pub mod middleware_helpers;
pub mod migrator;
pub mod openapi;
pub mod services;
pub mod tracing;

use axum::{
    extract::{DefaultBodyLimit, State},
    http::{HeaderValue, Method, StatusCode},
    response::{IntoResponse, Json},
    routing::{get, post, put},
    Extension, Router,
};
use chrono::Utc;
use sea_orm::DatabaseConnection;
use serde::Serialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tower_http::{
    catch_panic::CatchPanicLayer,
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
};
use utoipa::ToSchema;

use crate::auth::consts as perm;
use crate::auth::{AuthConfig, AuthRouterExt, AuthService};

// App state definition
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub config: config::AppConfig,
    pub auth: Arc<AuthService>,
    pub event_sender: events::EventSender,
    pub services: handlers::AppServices,
}

impl AppState {
    /// Wires every service onto one shared connection pool.
    pub fn new(
        db: Arc<DatabaseConnection>,
        config: config::AppConfig,
        event_sender: events::EventSender,
    ) -> Self {
        let auth = Arc::new(AuthService::new(AuthConfig::from(&config), db.clone()));
        let services =
            handlers::AppServices::new(db.clone(), Arc::new(event_sender.clone()), &config);
        Self {
            db,
            config,
            auth,
            event_sender,
            services,
        }
    }
}

// Common response wrappers
#[derive(Serialize, ToSchema)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<ResponseMeta>,
}

#[derive(Serialize, ToSchema)]
pub struct ResponseMeta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    pub timestamp: String,
}

impl ResponseMeta {
    fn capture() -> Self {
        Self {
            request_id: crate::tracing::current_request_id().map(|rid| rid.as_str().to_string()),
            timestamp: Utc::now().to_rfc3339(),
        }
    }
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            message: None,
            errors: None,
            meta: Some(ResponseMeta::capture()),
        }
    }

    pub fn failure(message: impl Into<String>, errors: Option<Vec<String>>) -> Self {
        Self {
            success: false,
            data: None,
            message: Some(message.into()),
            errors,
            meta: Some(ResponseMeta::capture()),
        }
    }
}

/// One page of a list endpoint.
#[derive(Debug, Serialize, ToSchema)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u64,
    pub per_page: u64,
    pub total_pages: u64,
}

impl<T> PaginatedResponse<T> {
    pub fn new(items: Vec<T>, total: u64, page: u64, per_page: u64) -> Self {
        let total_pages = if per_page == 0 {
            0
        } else {
            total.div_ceil(per_page)
        };
        Self {
            items,
            total,
            page,
            per_page,
            total_pages,
        }
    }
}

#[cfg(test)]
mod response_tests {
    use super::*;
    use chrono::DateTime;

    #[tokio::test]
    async fn success_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-123"), async {
                ApiResponse::success("ok")
            })
            .await;

        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-123"));
        DateTime::parse_from_rfc3339(&meta.timestamp).expect("timestamp should parse");
    }

    #[tokio::test]
    async fn failure_response_includes_request_metadata() {
        let response =
            crate::tracing::scope_request_id(crate::tracing::RequestId::new("meta-err"), async {
                ApiResponse::<()>::failure("oops", Some(vec!["name: required".into()]))
            })
            .await;

        assert!(!response.success);
        assert_eq!(response.message.as_deref(), Some("oops"));
        assert_eq!(response.errors.as_ref().map(Vec::len), Some(1));
        let meta = response.meta.expect("metadata expected");
        assert_eq!(meta.request_id.as_deref(), Some("meta-err"));
        assert!(!meta.timestamp.is_empty());
    }

    #[test]
    fn pagination_counts_partial_pages() {
        let page = PaginatedResponse::new(vec![1, 2, 3], 41, 1, 20);
        assert_eq!(page.total_pages, 3);
        let empty = PaginatedResponse::<u8>::new(vec![], 0, 1, 20);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn envelope_serializes_without_empty_errors() {
        let body = serde_json::to_value(ApiResponse::success(json!({"id": 1}))).unwrap();
        assert_eq!(body["success"], true);
        assert_eq!(body["data"]["id"], 1);
        assert!(body.get("errors").is_none());
    }
}

/// Every `/api` route. Reads need `catalog:read`; writes need the permission
/// of the resource they touch.
pub fn api_routes(max_avatar_bytes: usize) -> Router<AppState> {
    use handlers::{
        auth as auth_h, customers, employees, invoices, payment_methods, products, promotions,
        purchase_orders, shop_owners, shops, suppliers,
    };

    // Auth
    let auth_public = Router::new().route("/Auth/login", post(auth_h::login));
    let auth_private = Router::new()
        .route("/Auth/me", get(auth_h::me))
        .route("/Auth/change-password", post(auth_h::change_password))
        .with_auth();

    // Shop owners, shops, employees and payment methods
    let admin_read = Router::new()
        .route("/ShopOwner", get(shop_owners::list_shop_owners))
        .route("/ShopOwner/:id", get(shop_owners::get_shop_owner))
        .route("/Shop", get(shops::list_shops))
        .route("/Shop/:id", get(shops::get_shop))
        .route("/Employee", get(employees::list_employees))
        .route("/Employee/:id", get(employees::get_employee))
        .route("/PaymentMethod", get(payment_methods::list_payment_methods))
        .route("/PaymentMethod/:id", get(payment_methods::get_payment_method))
        .with_permission(perm::CATALOG_READ);

    let admin_write = Router::new()
        .route("/ShopOwner", post(shop_owners::create_shop_owner))
        .route(
            "/ShopOwner/:id",
            put(shop_owners::update_shop_owner).delete(shop_owners::delete_shop_owner),
        )
        .route("/Shop", post(shops::create_shop))
        .route("/Shop/:id", put(shops::update_shop).delete(shops::delete_shop))
        .route("/Employee", post(employees::create_employee))
        .route(
            "/Employee/:id",
            put(employees::update_employee).delete(employees::delete_employee),
        )
        .route(
            "/Employee/:id/avatar",
            post(employees::upload_avatar).layer(DefaultBodyLimit::max(
                max_avatar_bytes.saturating_add(64 * 1024),
            )),
        )
        .route("/PaymentMethod", post(payment_methods::create_payment_method))
        .route(
            "/PaymentMethod/:id",
            put(payment_methods::update_payment_method)
                .delete(payment_methods::delete_payment_method),
        )
        .with_permission(perm::ADMIN_MANAGE);

    // Catalog
    let catalog_read = Router::new()
        .route("/Supplier", get(suppliers::list_suppliers))
        .route("/Supplier/:id", get(suppliers::get_supplier))
        .route("/Product", get(products::list_products))
        .route("/Product/:id", get(products::get_product))
        .route("/Promotion", get(promotions::list_promotions))
        .route("/Promotion/:id", get(promotions::get_promotion))
        .route("/Promotion/code/:code", get(promotions::get_promotion_by_code))
        .with_permission(perm::CATALOG_READ);

    let catalog_write = Router::new()
        .route("/Supplier", post(suppliers::create_supplier))
        .route(
            "/Supplier/:id",
            put(suppliers::update_supplier).delete(suppliers::delete_supplier),
        )
        .route("/Product", post(products::create_product))
        .route(
            "/Product/:id",
            put(products::update_product).delete(products::delete_product),
        )
        .route("/Promotion", post(promotions::create_promotion))
        .route(
            "/Promotion/:id",
            put(promotions::update_promotion).delete(promotions::delete_promotion),
        )
        .with_permission(perm::CATALOG_WRITE);

    // Customers
    let customers_read = Router::new()
        .route("/Customer", get(customers::list_customers))
        .route("/Customer/:id", get(customers::get_customer))
        .with_permission(perm::CATALOG_READ);

    let customers_write = Router::new()
        .route("/Customer", post(customers::create_customer))
        .route(
            "/Customer/:id",
            put(customers::update_customer).delete(customers::delete_customer),
        )
        .with_permission(perm::CUSTOMERS_WRITE);

    // Sales
    let invoices_read = Router::new()
        .route("/Invoice", get(invoices::list_invoices))
        .route("/Invoice/:id", get(invoices::get_invoice))
        .with_permission(perm::CATALOG_READ);

    let invoices_write = Router::new()
        .route("/Invoice", post(invoices::create_invoice))
        .route("/Invoice/:id/cancel", post(invoices::cancel_invoice))
        .with_permission(perm::SALES_WRITE);

    let invoices_delete = Router::new()
        .route("/Invoice/:id", axum::routing::delete(invoices::delete_invoice))
        .with_permission(perm::ADMIN_MANAGE);

    // Procurement
    let purchase_orders_read = Router::new()
        .route("/PurchaseOrder", get(purchase_orders::list_purchase_orders))
        .route("/PurchaseOrder/:id", get(purchase_orders::get_purchase_order))
        .with_permission(perm::CATALOG_READ);

    let purchase_orders_write = Router::new()
        .route("/PurchaseOrder", post(purchase_orders::create_purchase_order))
        .route(
            "/PurchaseOrder/:id",
            axum::routing::delete(purchase_orders::delete_purchase_order),
        )
        .route(
            "/PurchaseOrder/:id/receive",
            post(purchase_orders::receive_purchase_order),
        )
        .route(
            "/PurchaseOrder/:id/cancel",
            post(purchase_orders::cancel_purchase_order),
        )
        .with_permission(perm::PROCUREMENT_WRITE);

    Router::new()
        .merge(auth_public)
        .merge(auth_private)
        .merge(admin_read)
        .merge(admin_write)
        .merge(catalog_read)
        .merge(catalog_write)
        .merge(customers_read)
        .merge(customers_write)
        .merge(invoices_read)
        .merge(invoices_write)
        .merge(invoices_delete)
        .merge(purchase_orders_read)
        .merge(purchase_orders_write)
}

fn cors_layer(config: &config::AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect();

    if !origins.is_empty() {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers(Any)
    } else if config.should_allow_permissive_cors() {
        CorsLayer::permissive()
    } else {
        // Same-origin only; config validation rejects this outside tests.
        CorsLayer::new()
    }
}

/// The complete application: API routes, ops endpoints, docs and the
/// middleware stack.
pub fn build_router(state: AppState) -> Router {
    let cors = cors_layer(&state.config);
    let auth_service = state.auth.clone();

    Router::new()
        .nest("/api", api_routes(state.config.max_avatar_bytes))
        .route("/health", get(health_check))
        .route("/status", get(api_status))
        .merge(openapi::swagger_ui())
        .layer(Extension(auth_service))
        .layer(CompressionLayer::new())
        .layer(cors)
        .layer(crate::tracing::configure_http_tracing())
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(axum::middleware::from_fn(
            middleware_helpers::request_id_middleware,
        ))
        .with_state(state)
}

/// A panicking handler still answers with the JSON envelope.
fn panic_response(_panic: Box<dyn std::any::Any + Send + 'static>) -> axum::response::Response {
    ::tracing::error!("Request handler panicked");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(ApiResponse::<()>::failure("Internal server error", None)),
    )
        .into_response()
}

async fn api_status(State(state): State<AppState>) -> Json<ApiResponse<Value>> {
    let status_data = json!({
        "status": "ok",
        "service": "shop-api",
        "version": env!("CARGO_PKG_VERSION"),
        "environment": state.config.environment,
        "timestamp": Utc::now().to_rfc3339(),
    });

    Json(ApiResponse::success(status_data))
}

async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match db::check_connection(&state.db).await {
        Ok(latency) => (
            StatusCode::OK,
            Json(ApiResponse::success(json!({
                "status": "healthy",
                "checks": { "database": "healthy" },
                "database_latency_ms": latency.as_millis() as u64,
            }))),
        ),
        Err(e) => {
            ::tracing::error!(error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiResponse::failure(
                    "Database unavailable",
                    Some(vec!["database: unhealthy".to_string()]),
                )),
            )
        }
    }
}

pub mod prelude {
    pub use crate::db::*;
    pub use crate::errors::*;
    pub use crate::events::*;
    pub use crate::{build_router, ApiResponse, AppState, PaginatedResponse};
}
