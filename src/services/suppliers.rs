use crate::{
    entities::{product, purchase_order, supplier},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        clean_optional, fetch_page, normalize_email, not_found, required_text, PageRequest,
    },
    PaginatedResponse,
};
use chrono::Utc;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateSupplierRequest {
    #[validate(length(min = 1, max = 30, message = "Supplier code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 120, message = "Supplier name is required"))]
    pub name: String,
    #[validate(length(max = 120))]
    pub contact_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateSupplierRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 120))]
    pub contact_name: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct SupplierService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl SupplierService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = supplier::Entity::find().filter(supplier::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(supplier::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Supplier with code '{}' already exists",
                code
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(
        &self,
        input: CreateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        let code = required_text("code", &input.code)?;
        self.ensure_code_free(&code, None).await?;

        let supplier = supplier::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(required_text("name", &input.name)?),
            contact_name: Set(clean_optional(input.contact_name)),
            phone: Set(clean_optional(input.phone)),
            email: Set(input.email.as_deref().map(normalize_email)),
            address: Set(clean_optional(input.address)),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.event_sender.publish(Event::SupplierCreated(supplier.id));
        info!(supplier_id = %supplier.id, "Supplier created");
        Ok(supplier)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<supplier::Model, ServiceError> {
        supplier::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Supplier", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<supplier::Model>, ServiceError> {
        let mut query = supplier::Entity::find().order_by_asc(supplier::Column::Code);
        if let Some(term) = page.search_term() {
            query = query.filter(
                Condition::any()
                    .add(supplier::Column::Code.contains(term))
                    .add(supplier::Column::Name.contains(term)),
            );
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateSupplierRequest,
    ) -> Result<supplier::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut supplier: supplier::ActiveModel = existing.clone().into();

        if let Some(code) = input.code {
            let code = required_text("code", &code)?;
            if code != existing.code {
                self.ensure_code_free(&code, Some(id)).await?;
                supplier.code = Set(code);
            }
        }
        if let Some(name) = input.name {
            supplier.name = Set(required_text("name", &name)?);
        }
        if input.contact_name.is_some() {
            supplier.contact_name = Set(clean_optional(input.contact_name));
        }
        if input.phone.is_some() {
            supplier.phone = Set(clean_optional(input.phone));
        }
        if let Some(email) = input.email {
            supplier.email = Set(Some(normalize_email(&email)));
        }
        if input.address.is_some() {
            supplier.address = Set(clean_optional(input.address));
        }
        if let Some(is_active) = input.is_active {
            supplier.is_active = Set(is_active);
        }

        let supplier = supplier.update(&*self.db).await?;
        info!(supplier_id = %id, "Supplier updated");
        Ok(supplier)
    }

    /// Refused while purchase orders reference the supplier; products it
    /// supplied are kept and simply lose the link.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;

        let orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::SupplierId.eq(id))
            .count(&*self.db)
            .await?;
        if orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "Supplier {} is referenced by {} purchase order(s)",
                id, orders
            )));
        }

        let txn = self.db.begin().await?;
        let unlinked = product::Entity::update_many()
            .col_expr(product::Column::SupplierId, Expr::value(Option::<Uuid>::None))
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::SupplierId.eq(id))
            .exec(&txn)
            .await?;
        supplier::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(supplier_id = %id, products = unlinked.rows_affected, "Supplier deleted");
        Ok(())
    }
}
