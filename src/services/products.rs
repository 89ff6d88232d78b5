use crate::{
    entities::{product, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        clean_optional, ensure_money, fetch_page, not_found, required_text, PageRequest,
    },
    PaginatedResponse,
};
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateProductRequest {
    #[validate(length(min = 1, max = 30, message = "Product code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 200, message = "Product name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 20, message = "Unit is required"))]
    pub unit: String,
    pub supplier_id: Option<Uuid>,
    pub import_price: Decimal,
    pub sale_price: Decimal,
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    #[serde(default)]
    pub quantity_in_stock: i32,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateProductRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 200))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    #[validate(length(min = 1, max = 20))]
    pub unit: Option<String>,
    pub supplier_id: Option<Uuid>,
    pub import_price: Option<Decimal>,
    pub sale_price: Option<Decimal>,
    /// Manual stock correction; purchase orders and invoices adjust it otherwise.
    #[validate(range(min = 0, message = "Stock cannot be negative"))]
    pub quantity_in_stock: Option<i32>,
    pub is_active: Option<bool>,
}

/// Product list filters on top of paging.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    pub supplier_id: Option<Uuid>,
    pub include_inactive: bool,
}

#[derive(Clone)]
pub struct ProductService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ProductService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = product::Entity::find().filter(product::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(product::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Product with code '{}' already exists",
                code
            )));
        }
        Ok(())
    }

    async fn ensure_supplier_exists(&self, supplier_id: Uuid) -> Result<(), ServiceError> {
        supplier::Entity::find_by_id(supplier_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found("Supplier", supplier_id))
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(
        &self,
        input: CreateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        ensure_money("import_price", input.import_price)?;
        ensure_money("sale_price", input.sale_price)?;

        let code = required_text("code", &input.code)?;
        self.ensure_code_free(&code, None).await?;
        if let Some(supplier_id) = input.supplier_id {
            self.ensure_supplier_exists(supplier_id).await?;
        }

        let product = product::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(required_text("name", &input.name)?),
            description: Set(clean_optional(input.description)),
            unit: Set(required_text("unit", &input.unit)?),
            supplier_id: Set(input.supplier_id),
            import_price: Set(input.import_price),
            sale_price: Set(input.sale_price),
            quantity_in_stock: Set(input.quantity_in_stock),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.event_sender.publish(Event::ProductCreated(product.id));
        info!(product_id = %product.id, "Product created");
        Ok(product)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<product::Model, ServiceError> {
        product::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Product", id))
    }

    /// Deactivated products are hidden unless asked for.
    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
        filter: &ProductFilter,
    ) -> Result<PaginatedResponse<product::Model>, ServiceError> {
        let mut query = product::Entity::find().order_by_asc(product::Column::Code);
        if !filter.include_inactive {
            query = query.filter(product::Column::IsActive.eq(true));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(product::Column::SupplierId.eq(supplier_id));
        }
        if let Some(term) = page.search_term() {
            query = query.filter(
                Condition::any()
                    .add(product::Column::Code.contains(term))
                    .add(product::Column::Name.contains(term)),
            );
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateProductRequest,
    ) -> Result<product::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut product: product::ActiveModel = existing.clone().into();

        if let Some(code) = input.code {
            let code = required_text("code", &code)?;
            if code != existing.code {
                self.ensure_code_free(&code, Some(id)).await?;
                product.code = Set(code);
            }
        }
        if let Some(name) = input.name {
            product.name = Set(required_text("name", &name)?);
        }
        if input.description.is_some() {
            product.description = Set(clean_optional(input.description));
        }
        if let Some(unit) = input.unit {
            product.unit = Set(required_text("unit", &unit)?);
        }
        if let Some(supplier_id) = input.supplier_id {
            self.ensure_supplier_exists(supplier_id).await?;
            product.supplier_id = Set(Some(supplier_id));
        }
        if let Some(price) = input.import_price {
            ensure_money("import_price", price)?;
            product.import_price = Set(price);
        }
        if let Some(price) = input.sale_price {
            ensure_money("sale_price", price)?;
            product.sale_price = Set(price);
        }
        if let Some(quantity) = input.quantity_in_stock {
            product.quantity_in_stock = Set(quantity);
        }
        if let Some(is_active) = input.is_active {
            product.is_active = Set(is_active);
        }

        let product = product.update(&*self.db).await?;

        let delta = product.quantity_in_stock - existing.quantity_in_stock;
        if delta != 0 {
            self.event_sender.publish(Event::StockAdjusted {
                product_id: id,
                delta,
                quantity_in_stock: product.quantity_in_stock,
            });
        }
        info!(product_id = %id, "Product updated");
        Ok(product)
    }

    /// Soft delete: detail lines of past invoices and purchase orders keep
    /// pointing at the row.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if !existing.is_active {
            return Ok(());
        }

        let mut product: product::ActiveModel = existing.into();
        product.is_active = Set(false);
        product.update(&*self.db).await?;

        self.event_sender.publish(Event::ProductDeactivated(id));
        info!(product_id = %id, "Product deactivated");
        Ok(())
    }
}
