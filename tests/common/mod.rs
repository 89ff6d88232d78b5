#![allow(dead_code)]

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
    response::Response,
    Router,
};
use http_body_util::BodyExt;
use rust_decimal::Decimal;
use serde_json::{json, Value};
use shop_api::{
    auth::UserProfile,
    build_router,
    config::AppConfig,
    db,
    entities::{employee, shop_owner},
    events::{self, EventSender},
    services::{employees::CreateEmployeeRequest, shop_owners::CreateShopOwnerRequest},
    AppState,
};
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt;
use uuid::Uuid;

pub const OWNER_EMAIL: &str = "owner@example.com";
pub const OWNER_PASSWORD: &str = "owner-password-1";
pub const EMPLOYEE_PASSWORD: &str = "employee-password-1";

/// Helper harness for spinning up the application backed by an in-memory SQLite database.
pub struct TestApp {
    router: Router,
    pub state: AppState,
    pub owner: shop_owner::Model,
    token: String,
    _uploads: TempDir,
    _event_task: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Construct a new test application with fresh database state.
    pub async fn new() -> Self {
        let uploads = tempfile::tempdir().expect("create upload dir");

        let mut cfg = AppConfig::new(
            "sqlite::memory:".to_string(),
            "test_secret_key_for_testing_purposes_only_32chars".to_string(),
            "test".to_string(),
        );
        cfg.upload_dir = uploads.path().to_string_lossy().into_owned();
        cfg.max_avatar_bytes = 64 * 1024;

        let pool = db::establish_connection_from_app_config(&cfg)
            .await
            .expect("failed to create test database");
        db::run_migrations(&pool)
            .await
            .expect("failed to run migrations in tests");

        let (event_tx, event_rx) = mpsc::channel(256);
        let event_task = tokio::spawn(events::process_events(event_rx));
        let state = AppState::new(Arc::new(pool), cfg, EventSender::new(event_tx));

        let owner = state
            .services
            .shop_owners
            .create(CreateShopOwnerRequest {
                full_name: "Test Owner".to_string(),
                email: OWNER_EMAIL.to_string(),
                phone: None,
                password: OWNER_PASSWORD.to_string(),
            })
            .await
            .expect("seed owner");

        let token = state
            .auth
            .issue_token(&UserProfile::from(&owner))
            .expect("issue owner token")
            .access_token;

        Self {
            router: build_router(state.clone()),
            state,
            owner,
            token,
            _uploads: uploads,
            _event_task: event_task,
        }
    }

    /// Bearer token for the seeded owner.
    pub fn token(&self) -> &str {
        &self.token
    }

    /// Creates an employee in `shop_id` and returns it with a bearer token.
    pub async fn employee_token(&self, shop_id: Uuid, email: &str) -> (employee::Model, String) {
        let employee = self
            .state
            .services
            .employees
            .create(CreateEmployeeRequest {
                shop_id,
                full_name: "Test Employee".to_string(),
                email: email.to_string(),
                phone: None,
                position: "Cashier".to_string(),
                password: Some(EMPLOYEE_PASSWORD.to_string()),
                hired_at: None,
            })
            .await
            .expect("seed employee");
        let token = self
            .state
            .auth
            .issue_token(&UserProfile::from(&employee))
            .expect("issue employee token")
            .access_token;
        (employee, token)
    }

    /// Send a request against the router with an optional bearer token.
    pub async fn request(
        &self,
        method: Method,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(tok) = token {
            builder = builder.header("authorization", format!("Bearer {}", tok));
        }

        let body = if let Some(json) = body {
            builder = builder.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&json).expect("failed to serialize json request body"))
        } else {
            Body::empty()
        };

        let request = builder.body(body).expect("failed to build request");
        self.send(request).await
    }

    pub async fn send(&self, request: Request<Body>) -> Response {
        self.router
            .clone()
            .oneshot(request)
            .await
            .expect("router error during test request")
    }

    /// Request as the seeded owner, returning the status and parsed envelope.
    pub async fn owner_json(&self, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let response = self.request(method, uri, body, Some(self.token())).await;
        into_json(response).await
    }

    pub async fn create_shop(&self, code: &str) -> Value {
        let (status, body) = self
            .owner_json(
                Method::POST,
                "/api/Shop",
                Some(json!({
                    "code": code,
                    "name": format!("Shop {}", code),
                    "owner_id": self.owner.id,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create shop: {body}");
        body["data"].clone()
    }

    pub async fn create_supplier(&self, code: &str) -> Value {
        let (status, body) = self
            .owner_json(
                Method::POST,
                "/api/Supplier",
                Some(json!({ "code": code, "name": format!("Supplier {}", code) })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create supplier: {body}");
        body["data"].clone()
    }

    pub async fn create_product(&self, code: &str, sale_price: &str, stock: i32) -> Value {
        let (status, body) = self
            .owner_json(
                Method::POST,
                "/api/Product",
                Some(json!({
                    "code": code,
                    "name": format!("Product {}", code),
                    "unit": "piece",
                    "import_price": "1.00",
                    "sale_price": sale_price,
                    "quantity_in_stock": stock,
                })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create product: {body}");
        body["data"].clone()
    }

    pub async fn create_customer(&self, phone: &str) -> Value {
        let (status, body) = self
            .owner_json(
                Method::POST,
                "/api/Customer",
                Some(json!({ "full_name": "Walk In", "phone": phone })),
            )
            .await;
        assert_eq!(status, StatusCode::CREATED, "create customer: {body}");
        body["data"].clone()
    }

    pub async fn product_stock(&self, id: &Value) -> i64 {
        let uri = format!("/api/Product/{}", id.as_str().expect("product id"));
        let (status, body) = self.owner_json(Method::GET, &uri, None).await;
        assert_eq!(status, StatusCode::OK);
        body["data"]["quantity_in_stock"].as_i64().expect("stock")
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self._event_task.abort();
    }
}

pub async fn into_json(response: Response) -> (StatusCode, Value) {
    let status = response.status();
    let bytes = response
        .into_body()
        .collect()
        .await
        .expect("read response body")
        .to_bytes();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).expect("response body is json")
    };
    (status, value)
}

/// Money comes back as a JSON string; compare by value, not formatting.
pub fn decimal(value: &Value) -> Decimal {
    match value {
        Value::String(s) => Decimal::from_str(s).expect("decimal string"),
        Value::Number(n) => Decimal::from_str(&n.to_string()).expect("decimal number"),
        other => panic!("expected a decimal, got {other}"),
    }
}

pub fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).expect("decimal literal")
}
