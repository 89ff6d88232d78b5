mod common;

use axum::http::{Method, StatusCode};
use common::TestApp;
use serde_json::json;

#[tokio::test]
async fn duplicate_codes_conflict() {
    let app = TestApp::new().await;
    app.create_shop("DUP").await;
    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Shop",
            Some(json!({ "code": "DUP", "name": "Again", "owner_id": app.owner.id })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
    assert!(body["data"].is_null());

    app.create_supplier("SUP").await;
    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Supplier",
            Some(json!({ "code": "SUP", "name": "Another" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    app.create_customer("555-1000").await;
    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Customer",
            Some(json!({ "full_name": "Twin", "phone": "555-1000" })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn login_email_is_unique_across_owners_and_employees() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;

    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Employee",
            Some(json!({
                "shop_id": shop["id"],
                "full_name": "Copy Cat",
                "email": "OWNER@example.com",
                "position": "Cashier",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn owner_with_shops_cannot_be_deleted() {
    let app = TestApp::new().await;
    app.create_shop("S1").await;

    let uri = format!("/api/ShopOwner/{}", app.owner.id);
    let (status, _) = app.owner_json(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deleting_a_shop_removes_its_employees() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let (_, body) = app
        .owner_json(
            Method::POST,
            "/api/Employee",
            Some(json!({
                "shop_id": shop["id"],
                "full_name": "Short Stay",
                "email": "short@example.com",
                "position": "Stocker",
            })),
        )
        .await;
    let employee_uri = format!("/api/Employee/{}", body["data"]["id"].as_str().unwrap());

    let shop_uri = format!("/api/Shop/{}", shop["id"].as_str().unwrap());
    let (status, _) = app.owner_json(Method::DELETE, &shop_uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = app.owner_json(Method::GET, &shop_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = app.owner_json(Method::GET, &employee_uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn shop_with_sales_cannot_be_deleted() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("P1", "1.00", 5).await;
    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "details": [{ "product_id": product["id"], "quantity": 1 }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let uri = format!("/api/Shop/{}", shop["id"].as_str().unwrap());
    let (status, _) = app.owner_json(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn deleted_products_are_hidden_but_kept() {
    let app = TestApp::new().await;
    let product = app.create_product("OLD", "1.00", 0).await;
    app.create_product("NEW", "1.00", 0).await;

    let uri = format!("/api/Product/{}", product["id"].as_str().unwrap());
    let (status, _) = app.owner_json(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (_, list) = app.owner_json(Method::GET, "/api/Product", None).await;
    assert_eq!(list["data"]["total"], 1);
    assert_eq!(list["data"]["items"][0]["code"], "NEW");

    let (_, list) = app
        .owner_json(Method::GET, "/api/Product?include_inactive=true", None)
        .await;
    assert_eq!(list["data"]["total"], 2);

    let (status, body) = app.owner_json(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);
}

#[tokio::test]
async fn lists_paginate_and_search() {
    let app = TestApp::new().await;
    for i in 0..5 {
        app.create_supplier(&format!("SUP{i}")).await;
    }
    app.owner_json(
        Method::POST,
        "/api/Supplier",
        Some(json!({ "code": "ACME", "name": "Acme Wholesale" })),
    )
    .await;

    let (status, body) = app
        .owner_json(Method::GET, "/api/Supplier?page=2&per_page=4", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    let page = &body["data"];
    assert_eq!(page["total"], 6);
    assert_eq!(page["page"], 2);
    assert_eq!(page["per_page"], 4);
    assert_eq!(page["total_pages"], 2);
    assert_eq!(page["items"].as_array().unwrap().len(), 2);

    let (_, body) = app
        .owner_json(Method::GET, "/api/Supplier?search=Acme", None)
        .await;
    assert_eq!(body["data"]["total"], 1);
    assert_eq!(body["data"]["items"][0]["code"], "ACME");
}

#[tokio::test]
async fn promotion_terms_are_validated() {
    let app = TestApp::new().await;
    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Promotion",
            Some(json!({
                "code": "BAD",
                "name": "Broken",
                "discount_type": "percentage",
                "discount_value": "150",
                "start_date": "2024-03-10T00:00:00Z",
                "end_date": "2024-03-01T00:00:00Z",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    let errors = body["errors"].as_array().unwrap();
    assert!(errors.iter().any(|e| e.as_str().unwrap().starts_with("end_date")));
    assert!(errors
        .iter()
        .any(|e| e.as_str().unwrap().starts_with("discount_value")));
}

#[tokio::test]
async fn promotion_lookup_by_code_ignores_case() {
    let app = TestApp::new().await;
    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Promotion",
            Some(json!({
                "code": " summer5 ",
                "name": "Summer",
                "discount_type": "fixed_amount",
                "discount_value": "5",
                "start_date": "2024-06-01T00:00:00Z",
                "end_date": "2024-09-01T00:00:00Z",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .owner_json(Method::GET, "/api/Promotion/code/Summer5", None)
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["code"], "SUMMER5");
}

#[tokio::test]
async fn missing_records_are_not_found() {
    let app = TestApp::new().await;
    let id = uuid::Uuid::new_v4();
    for resource in ["Shop", "Supplier", "Product", "Customer", "Employee", "Invoice"] {
        let (status, body) = app
            .owner_json(Method::GET, &format!("/api/{resource}/{id}"), None)
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND, "{resource}");
        assert_eq!(body["success"], false);
    }
}

#[tokio::test]
async fn inactive_payment_method_cannot_take_payments() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("P1", "1.00", 5).await;

    let (status, body) = app
        .owner_json(Method::POST, "/api/PaymentMethod", Some(json!({ "name": "Cash" })))
        .await;
    assert_eq!(status, StatusCode::CREATED);
    let method_id = body["data"]["id"].as_str().unwrap().to_string();

    let (status, _) = app
        .owner_json(Method::POST, "/api/PaymentMethod", Some(json!({ "name": "Cash" })))
        .await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, body) = app
        .owner_json(
            Method::PUT,
            &format!("/api/PaymentMethod/{method_id}"),
            Some(json!({ "is_active": false })),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["is_active"], false);

    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "payment_method_id": method_id,
                "details": [{ "product_id": product["id"], "quantity": 1 }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.product_stock(&product["id"]).await, 5);
}

#[tokio::test]
async fn blank_required_text_is_rejected_after_trimming() {
    let app = TestApp::new().await;
    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Supplier",
            Some(json!({ "code": "   ", "name": "   " })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
    assert!(body["errors"][0].as_str().unwrap().ends_with("must not be blank"));

    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Shop",
            Some(json!({ "code": "  ", "name": "Corner", "owner_id": app.owner.id })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let product = app.create_product("P1", "1.00", 0).await;
    let uri = format!("/api/Product/{}", product["id"].as_str().unwrap());
    let (status, _) = app
        .owner_json(Method::PUT, &uri, Some(json!({ "name": " \t " })))
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (_, list) = app.owner_json(Method::GET, "/api/Supplier", None).await;
    assert_eq!(list["data"]["total"], 0);
}

#[tokio::test]
async fn out_of_range_page_numbers_return_an_empty_page() {
    let app = TestApp::new().await;
    app.create_supplier("SUP1").await;

    let (status, body) = app
        .owner_json(
            Method::GET,
            "/api/Supplier?page=18446744073709551615&per_page=100",
            None,
        )
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["total"], 1);
    assert!(body["data"]["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn shop_promotion_can_be_made_global_again() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Promotion",
            Some(json!({
                "code": "LOCAL10",
                "name": "Local",
                "shop_id": shop["id"],
                "discount_type": "percentage",
                "discount_value": "10",
                "start_date": "2024-06-01T00:00:00Z",
                "end_date": "2024-09-01T00:00:00Z",
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["shop_id"], shop["id"]);
    let uri = format!("/api/Promotion/{}", body["data"]["id"].as_str().unwrap());

    let (status, _) = app
        .owner_json(
            Method::PUT,
            &uri,
            Some(json!({ "global": true, "shop_id": shop["id"] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .owner_json(Method::PUT, &uri, Some(json!({ "global": true })))
        .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert!(body["data"]["shop_id"].is_null());
}
