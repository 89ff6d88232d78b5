mod common;

use axum::http::{Method, StatusCode};
use common::{into_json, TestApp, EMPLOYEE_PASSWORD, OWNER_EMAIL, OWNER_PASSWORD};
use serde_json::json;

#[tokio::test]
async fn owner_can_log_in_and_use_the_token() {
    let app = TestApp::new().await;

    let response = app
        .request(
            Method::POST,
            "/api/Auth/login",
            Some(json!({ "email": "Owner@Example.com", "password": OWNER_PASSWORD })),
            None,
        )
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["token_type"], "Bearer");
    assert_eq!(body["data"]["user"]["role"], "owner");
    let token = body["data"]["access_token"].as_str().unwrap().to_string();

    let response = app
        .request(Method::GET, "/api/Auth/me", None, Some(&token))
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["email"], OWNER_EMAIL);
}

#[tokio::test]
async fn wrong_password_is_unauthorized() {
    let app = TestApp::new().await;
    let response = app
        .request(
            Method::POST,
            "/api/Auth/login",
            Some(json!({ "email": OWNER_EMAIL, "password": "not-the-password" })),
            None,
        )
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn requests_without_a_token_are_rejected() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/api/Product", None, None).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .request(Method::GET, "/api/Product", None, Some("not-a-jwt"))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn employee_permissions_are_limited() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let shop_id = shop["id"].as_str().unwrap().parse().unwrap();
    let (_, token) = app.employee_token(shop_id, "staff@example.com").await;

    let response = app
        .request(Method::GET, "/api/Product", None, Some(&token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .request(
            Method::POST,
            "/api/Customer",
            Some(json!({ "full_name": "Regular", "phone": "555-2000" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let response = app
        .request(
            Method::POST,
            "/api/Product",
            Some(json!({
                "code": "NOPE",
                "name": "Not allowed",
                "unit": "piece",
                "import_price": "1",
                "sale_price": "2",
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            "/api/Shop",
            Some(json!({ "code": "S2", "name": "Mine now", "owner_id": app.owner.id })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn employee_can_log_in_and_change_password() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let shop_id = shop["id"].as_str().unwrap().parse().unwrap();
    let (employee, token) = app.employee_token(shop_id, "till@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/Auth/login",
            Some(json!({ "email": "till@example.com", "password": EMPLOYEE_PASSWORD })),
            None,
        )
        .await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["user"]["role"], "employee");
    assert_eq!(body["data"]["user"]["shop_id"], shop["id"]);
    assert_eq!(body["data"]["user"]["id"], employee.id.to_string());

    let response = app
        .request(
            Method::POST,
            "/api/Auth/change-password",
            Some(json!({ "current_password": "wrong-one", "new_password": "brand-new-pass" })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app
        .request(
            Method::POST,
            "/api/Auth/change-password",
            Some(json!({ "current_password": EMPLOYEE_PASSWORD, "new_password": "brand-new-pass" })),
            Some(&token),
        )
        .await;
    assert!(response.status().is_success());

    let response = app
        .request(
            Method::POST,
            "/api/Auth/login",
            Some(json!({ "email": "till@example.com", "password": "brand-new-pass" })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn deactivated_employee_cannot_log_in() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let shop_id = shop["id"].as_str().unwrap().parse().unwrap();
    let (employee, _) = app.employee_token(shop_id, "gone@example.com").await;

    let (status, _) = app
        .owner_json(Method::DELETE, &format!("/api/Employee/{}", employee.id), None)
        .await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let response = app
        .request(
            Method::POST,
            "/api/Auth/login",
            Some(json!({ "email": "gone@example.com", "password": EMPLOYEE_PASSWORD })),
            None,
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn health_and_status_are_public() {
    let app = TestApp::new().await;
    let response = app.request(Method::GET, "/health", None, None).await;
    let (status, body) = into_json(response).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "healthy");

    let response = app.request(Method::GET, "/status", None, None).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
}
