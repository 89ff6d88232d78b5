use crate::{
    entities::{employee, invoice, promotion, purchase_order, shop, shop_owner},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{clean_optional, fetch_page, not_found, required_text, PageRequest},
    PaginatedResponse,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, PaginatorTrait,
    QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateShopRequest {
    #[validate(length(min = 1, max = 30, message = "Shop code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 120, message = "Shop name is required"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub owner_id: Uuid,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateShopRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    pub owner_id: Option<Uuid>,
}

#[derive(Clone)]
pub struct ShopService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl ShopService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = shop::Entity::find().filter(shop::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(shop::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Shop with code '{}' already exists",
                code
            )));
        }
        Ok(())
    }

    async fn ensure_owner_exists(&self, owner_id: Uuid) -> Result<(), ServiceError> {
        shop_owner::Entity::find_by_id(owner_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found("Shop owner", owner_id))
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(&self, input: CreateShopRequest) -> Result<shop::Model, ServiceError> {
        let code = required_text("code", &input.code)?;
        self.ensure_code_free(&code, None).await?;
        self.ensure_owner_exists(input.owner_id).await?;

        let shop = shop::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(required_text("name", &input.name)?),
            address: Set(clean_optional(input.address)),
            phone: Set(clean_optional(input.phone)),
            owner_id: Set(input.owner_id),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.event_sender.publish(Event::ShopCreated(shop.id));
        info!(shop_id = %shop.id, "Shop created");
        Ok(shop)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<shop::Model, ServiceError> {
        shop::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Shop", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<shop::Model>, ServiceError> {
        let mut query = shop::Entity::find().order_by_asc(shop::Column::Code);
        if let Some(term) = page.search_term() {
            query = query.filter(
                Condition::any()
                    .add(shop::Column::Code.contains(term))
                    .add(shop::Column::Name.contains(term)),
            );
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateShopRequest,
    ) -> Result<shop::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut shop: shop::ActiveModel = existing.clone().into();

        if let Some(code) = input.code {
            let code = required_text("code", &code)?;
            if code != existing.code {
                self.ensure_code_free(&code, Some(id)).await?;
                shop.code = Set(code);
            }
        }
        if let Some(name) = input.name {
            shop.name = Set(required_text("name", &name)?);
        }
        if input.address.is_some() {
            shop.address = Set(clean_optional(input.address));
        }
        if input.phone.is_some() {
            shop.phone = Set(clean_optional(input.phone));
        }
        if let Some(owner_id) = input.owner_id {
            self.ensure_owner_exists(owner_id).await?;
            shop.owner_id = Set(owner_id);
        }

        let shop = shop.update(&*self.db).await?;
        info!(shop_id = %id, "Shop updated");
        Ok(shop)
    }

    /// Refused while sales or purchasing history points at the shop. Otherwise
    /// its employees and shop-scoped promotions go with it.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;

        let invoices = invoice::Entity::find()
            .filter(invoice::Column::ShopId.eq(id))
            .count(&*self.db)
            .await?;
        let purchase_orders = purchase_order::Entity::find()
            .filter(purchase_order::Column::ShopId.eq(id))
            .count(&*self.db)
            .await?;
        if invoices > 0 || purchase_orders > 0 {
            return Err(ServiceError::Conflict(format!(
                "Shop {} has {} invoice(s) and {} purchase order(s)",
                id, invoices, purchase_orders
            )));
        }

        let txn = self.db.begin().await?;
        let employees = employee::Entity::delete_many()
            .filter(employee::Column::ShopId.eq(id))
            .exec(&txn)
            .await?;
        let promotions = promotion::Entity::delete_many()
            .filter(promotion::Column::ShopId.eq(id))
            .exec(&txn)
            .await?;
        shop::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        self.event_sender.publish(Event::ShopDeleted(id));
        info!(
            shop_id = %id,
            employees = employees.rows_affected,
            promotions = promotions.rows_affected,
            "Shop deleted"
        );
        Ok(())
    }
}
