use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Shop API",
        version = "0.1.0",
        description = r#"
# Shop management API

Shops, their owners and employees, suppliers, the product catalog,
customers, promotions, sales invoices and purchase orders.

## Authentication

`POST /api/Auth/login` returns a JWT. Every other `/api` endpoint expects it:

```
Authorization: Bearer <token>
```

Owners may do everything. Employees read the catalog, manage customers and
issue invoices for their own shop.

## Responses

Every JSON response uses the same envelope:

```json
{
  "success": false,
  "data": null,
  "message": "Validation failed",
  "errors": ["discount_value: percentage must be greater than 0 and at most 100"],
  "meta": { "request_id": "…", "timestamp": "2024-03-01T10:00:00Z" }
}
```

## Pagination

List endpoints accept `page` (from 1), `per_page` (default 20, max 100) and
`search`, and return `{items, total, page, per_page, total_pages}`.
        "#,
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers((url = "http://localhost:8080", description = "Local development")),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Login and the current user"),
        (name = "suppliers", description = "Supplier directory"),
        (name = "products", description = "Product catalog"),
        (name = "promotions", description = "Discount codes"),
        (name = "invoices", description = "Sales invoices"),
        (name = "purchase-orders", description = "Purchase orders to suppliers")
    ),
    paths(
        // Auth
        crate::handlers::auth::login,
        crate::handlers::auth::me,
        crate::handlers::auth::change_password,
        // Catalog
        crate::handlers::suppliers::list_suppliers,
        crate::handlers::suppliers::create_supplier,
        crate::handlers::products::list_products,
        crate::handlers::products::create_product,
        crate::handlers::promotions::list_promotions,
        crate::handlers::promotions::get_promotion,
        crate::handlers::promotions::get_promotion_by_code,
        crate::handlers::promotions::create_promotion,
        crate::handlers::promotions::update_promotion,
        crate::handlers::promotions::delete_promotion,
        // Sales
        crate::handlers::invoices::create_invoice,
        crate::handlers::invoices::list_invoices,
        crate::handlers::invoices::get_invoice,
        crate::handlers::invoices::cancel_invoice,
        crate::handlers::invoices::delete_invoice,
        // Procurement
        crate::handlers::purchase_orders::create_purchase_order,
        crate::handlers::purchase_orders::list_purchase_orders,
        crate::handlers::purchase_orders::get_purchase_order,
        crate::handlers::purchase_orders::receive_purchase_order,
        crate::handlers::purchase_orders::cancel_purchase_order,
        crate::handlers::purchase_orders::delete_purchase_order,
    ),
    components(
        schemas(
            crate::auth::Role,
            crate::auth::UserProfile,
            crate::auth::TokenResponse,
            crate::auth::LoginCredentials,
            crate::auth::ChangePasswordRequest,
            crate::entities::shop_owner::Model,
            crate::entities::shop::Model,
            crate::entities::supplier::Model,
            crate::entities::product::Model,
            crate::entities::customer::Model,
            crate::entities::employee::Model,
            crate::entities::payment_method::Model,
            crate::entities::promotion::Model,
            crate::entities::promotion::DiscountType,
            crate::entities::invoice::Model,
            crate::entities::invoice::InvoiceStatus,
            crate::entities::invoice_detail::Model,
            crate::entities::purchase_order::Model,
            crate::entities::purchase_order::PurchaseOrderStatus,
            crate::entities::purchase_order_detail::Model,
            crate::services::shop_owners::CreateShopOwnerRequest,
            crate::services::shops::CreateShopRequest,
            crate::services::suppliers::CreateSupplierRequest,
            crate::services::products::CreateProductRequest,
            crate::services::customers::CreateCustomerRequest,
            crate::services::employees::CreateEmployeeRequest,
            crate::services::payment_methods::CreatePaymentMethodRequest,
            crate::services::promotions::CreatePromotionRequest,
            crate::services::promotions::UpdatePromotionRequest,
            crate::services::invoices::CreateInvoiceRequest,
            crate::services::invoices::InvoiceLineRequest,
            crate::services::invoices::InvoiceResponse,
            crate::services::purchase_orders::CreatePurchaseOrderRequest,
            crate::services::purchase_orders::PurchaseOrderLineRequest,
            crate::services::purchase_orders::PurchaseOrderResponse,
        )
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn openapi_document_lists_core_paths() {
        let openapi = ApiDoc::openapi();
        let json = serde_json::to_string_pretty(&openapi).unwrap();
        assert!(json.contains("Shop API"));
        assert!(json.contains("/api/Invoice"));
        assert!(json.contains("/api/PurchaseOrder/{id}/receive"));
        assert!(json.contains("/api/Promotion/code/{code}"));
        assert!(json.contains("bearer_auth"));
    }
}
