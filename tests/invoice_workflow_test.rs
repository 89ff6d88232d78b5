mod common;

use axum::http::{Method, StatusCode};
use chrono::{Duration, Utc};
use common::{dec, decimal, TestApp};
use serde_json::json;

#[tokio::test]
async fn create_invoice_prices_lines_and_takes_stock() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let coffee = app.create_product("COF", "5.50", 10).await;
    let tea = app.create_product("TEA", "2.25", 4).await;
    let customer = app.create_customer("555-0001").await;

    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "customer_id": customer["id"],
                "details": [
                    { "product_id": coffee["id"], "quantity": 3 },
                    { "product_id": tea["id"], "quantity": 2, "unit_price": "2.00" },
                ],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let invoice = &body["data"];
    assert_eq!(invoice["status"], "paid");
    assert!(invoice["invoice_number"]
        .as_str()
        .unwrap()
        .starts_with("INV-"));
    assert_eq!(invoice["details"].as_array().unwrap().len(), 2);
    assert_eq!(decimal(&invoice["subtotal"]), dec("20.50"));
    assert_eq!(decimal(&invoice["discount_amount"]), dec("0"));
    assert_eq!(decimal(&invoice["total_amount"]), dec("20.50"));

    assert_eq!(app.product_stock(&coffee["id"]).await, 7);
    assert_eq!(app.product_stock(&tea["id"]).await, 2);

    let uri = format!("/api/Customer/{}", customer["id"].as_str().unwrap());
    let (_, customer) = app.owner_json(Method::GET, &uri, None).await;
    assert_eq!(customer["data"]["loyalty_points"], 2);
}

#[tokio::test]
async fn insufficient_stock_rolls_back_the_whole_invoice() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let plenty = app.create_product("PLN", "1.00", 50).await;
    let scarce = app.create_product("SCR", "1.00", 1).await;

    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "details": [
                    { "product_id": plenty["id"], "quantity": 5 },
                    { "product_id": scarce["id"], "quantity": 2 },
                ],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{body}");
    assert_eq!(body["success"], false);
    assert!(body["message"].as_str().unwrap().contains("SCR"));

    assert_eq!(app.product_stock(&plenty["id"]).await, 50);
    assert_eq!(app.product_stock(&scarce["id"]).await, 1);

    let (_, list) = app.owner_json(Method::GET, "/api/Invoice", None).await;
    assert_eq!(list["data"]["total"], 0);
}

#[tokio::test]
async fn unknown_product_is_not_found_and_nothing_is_written() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let known = app.create_product("KNW", "3.00", 5).await;

    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "details": [
                    { "product_id": known["id"], "quantity": 1 },
                    { "product_id": uuid::Uuid::new_v4(), "quantity": 1 },
                ],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(app.product_stock(&known["id"]).await, 5);
    let (_, list) = app.owner_json(Method::GET, "/api/Invoice", None).await;
    assert_eq!(list["data"]["total"], 0);
}

#[tokio::test]
async fn empty_or_invalid_lines_are_rejected() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("P1", "3.00", 5).await;

    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({ "shop_id": shop["id"], "details": [] })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "details": [{ "product_id": product["id"], "quantity": 0 }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["errors"]
        .as_array()
        .unwrap()
        .iter()
        .any(|e| e.as_str().unwrap().starts_with("details[0].quantity")));
}

#[tokio::test]
async fn promotion_code_discounts_the_invoice() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("P1", "40.00", 10).await;

    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Promotion",
            Some(json!({
                "code": "spring10",
                "name": "Spring sale",
                "discount_type": "percentage",
                "discount_value": "10",
                "start_date": Utc::now() - Duration::days(1),
                "end_date": Utc::now() + Duration::days(1),
            })),
        )
        .await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, body) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "promotion_code": "Spring10",
                "details": [{ "product_id": product["id"], "quantity": 2 }],
            })),
        )
        .await;

    assert_eq!(status, StatusCode::CREATED, "{body}");
    let invoice = &body["data"];
    assert_eq!(decimal(&invoice["subtotal"]), dec("80.00"));
    assert_eq!(decimal(&invoice["discount_amount"]), dec("8.00"));
    assert_eq!(decimal(&invoice["total_amount"]), dec("72.00"));
    assert!(invoice["promotion_id"].is_string());
}

#[tokio::test]
async fn expired_promotion_is_rejected() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("P1", "10.00", 10).await;

    app.owner_json(
        Method::POST,
        "/api/Promotion",
        Some(json!({
            "code": "OLD",
            "name": "Last year",
            "discount_type": "fixed_amount",
            "discount_value": "5",
            "start_date": Utc::now() - Duration::days(30),
            "end_date": Utc::now() - Duration::days(1),
        })),
    )
    .await;

    let (status, _) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "promotion_code": "OLD",
                "details": [{ "product_id": product["id"], "quantity": 1 }],
            })),
        )
        .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.product_stock(&product["id"]).await, 10);
}

#[tokio::test]
async fn cancel_returns_stock_and_points_once() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("P1", "25.00", 8).await;
    let customer = app.create_customer("555-0002").await;

    let (_, body) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "customer_id": customer["id"],
                "details": [{ "product_id": product["id"], "quantity": 2 }],
            })),
        )
        .await;
    let invoice_id = body["data"]["id"].as_str().unwrap().to_string();
    assert_eq!(app.product_stock(&product["id"]).await, 6);

    let uri = format!("/api/Invoice/{invoice_id}/cancel");
    let (status, body) = app.owner_json(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["status"], "cancelled");
    assert_eq!(app.product_stock(&product["id"]).await, 8);

    let customer_uri = format!("/api/Customer/{}", customer["id"].as_str().unwrap());
    let (_, customer) = app.owner_json(Method::GET, &customer_uri, None).await;
    assert_eq!(customer["data"]["loyalty_points"], 0);

    let (status, _) = app.owner_json(Method::POST, &uri, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(app.product_stock(&product["id"]).await, 8);
}

#[tokio::test]
async fn deleting_a_paid_invoice_restores_stock() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("P1", "1.00", 3).await;

    let (_, body) = app
        .owner_json(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": shop["id"],
                "details": [{ "product_id": product["id"], "quantity": 3 }],
            })),
        )
        .await;
    let uri = format!("/api/Invoice/{}", body["data"]["id"].as_str().unwrap());
    assert_eq!(app.product_stock(&product["id"]).await, 0);

    let (status, _) = app.owner_json(Method::DELETE, &uri, None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);
    assert_eq!(app.product_stock(&product["id"]).await, 3);

    let (status, _) = app.owner_json(Method::GET, &uri, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn employees_sell_only_for_their_own_shop() {
    let app = TestApp::new().await;
    let home = app.create_shop("HOME").await;
    let other = app.create_shop("OTHER").await;
    let product = app.create_product("P1", "2.00", 10).await;
    let home_id = home["id"].as_str().unwrap().parse().unwrap();
    let (employee, token) = app.employee_token(home_id, "cashier@example.com").await;

    let response = app
        .request(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": other["id"],
                "details": [{ "product_id": product["id"], "quantity": 1 }],
            })),
            Some(&token),
        )
        .await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app
        .request(
            Method::POST,
            "/api/Invoice",
            Some(json!({
                "shop_id": home["id"],
                "details": [{ "product_id": product["id"], "quantity": 1 }],
            })),
            Some(&token),
        )
        .await;
    let (status, body) = common::into_json(response).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["employee_id"], employee.id.to_string());
}

#[tokio::test]
async fn extreme_line_values_are_rejected_without_side_effects() {
    let app = TestApp::new().await;
    let shop = app.create_shop("S1").await;
    let product = app.create_product("BIG", "1.00", 10).await;

    let cases = [
        json!([{ "product_id": product["id"], "quantity": 10, "unit_price": "79228162514264337593543950335" }]),
        json!([
            { "product_id": product["id"], "quantity": 2147483647 },
            { "product_id": product["id"], "quantity": 2147483647 },
        ]),
        json!([{ "product_id": product["id"], "quantity": 2, "unit_price": "999999999999.99" }]),
        json!([
            { "product_id": product["id"], "quantity": 1, "unit_price": "999999999999.99" },
            { "product_id": product["id"], "quantity": 1, "unit_price": "999999999999.99" },
        ]),
    ];
    for details in cases {
        let (status, body) = app
            .owner_json(
                Method::POST,
                "/api/Invoice",
                Some(json!({ "shop_id": shop["id"], "details": details })),
            )
            .await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "{body}");
        assert_eq!(body["success"], false);
        assert!(body["errors"].as_array().is_some_and(|e| !e.is_empty()));
    }

    assert_eq!(app.product_stock(&product["id"]).await, 10);
    let (_, list) = app.owner_json(Method::GET, "/api/Invoice", None).await;
    assert_eq!(list["data"]["total"], 0);
}
