use crate::{
    entities::{invoice, payment_method},
    errors::ServiceError,
    services::{clean_optional, fetch_page, not_found, required_text, PageRequest},
    PaginatedResponse,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePaymentMethodRequest {
    #[validate(length(min = 1, max = 60, message = "Payment method name is required"))]
    pub name: String,
    #[validate(length(max = 255))]
    pub description: Option<String>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePaymentMethodRequest {
    #[validate(length(min = 1, max = 60))]
    pub name: Option<String>,
    #[validate(length(max = 255))]
    pub description: Option<String>,
    pub is_active: Option<bool>,
}

#[derive(Clone)]
pub struct PaymentMethodService {
    db: Arc<DatabaseConnection>,
}

impl PaymentMethodService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    async fn ensure_name_free(&self, name: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query =
            payment_method::Entity::find().filter(payment_method::Column::Name.eq(name));
        if let Some(id) = except {
            query = query.filter(payment_method::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Payment method '{}' already exists",
                name
            )));
        }
        Ok(())
    }

    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn create(
        &self,
        input: CreatePaymentMethodRequest,
    ) -> Result<payment_method::Model, ServiceError> {
        let name = required_text("name", &input.name)?;
        self.ensure_name_free(&name, None).await?;

        let method = payment_method::ActiveModel {
            id: Set(Uuid::new_v4()),
            name: Set(name),
            description: Set(clean_optional(input.description)),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(payment_method_id = %method.id, "Payment method created");
        Ok(method)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<payment_method::Model, ServiceError> {
        payment_method::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Payment method", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<payment_method::Model>, ServiceError> {
        let mut query = payment_method::Entity::find().order_by_asc(payment_method::Column::Name);
        if let Some(term) = page.search_term() {
            query = query.filter(payment_method::Column::Name.contains(term));
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdatePaymentMethodRequest,
    ) -> Result<payment_method::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut method: payment_method::ActiveModel = existing.clone().into();

        if let Some(name) = input.name {
            let name = required_text("name", &name)?;
            if name != existing.name {
                self.ensure_name_free(&name, Some(id)).await?;
                method.name = Set(name);
            }
        }
        if input.description.is_some() {
            method.description = Set(clean_optional(input.description));
        }
        if let Some(is_active) = input.is_active {
            method.is_active = Set(is_active);
        }

        Ok(method.update(&*self.db).await?)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;

        let invoices = invoice::Entity::find()
            .filter(invoice::Column::PaymentMethodId.eq(id))
            .count(&*self.db)
            .await?;
        if invoices > 0 {
            return Err(ServiceError::Conflict(format!(
                "Payment method {} is referenced by {} invoice(s)",
                id, invoices
            )));
        }

        payment_method::Entity::delete_by_id(id)
            .exec(&*self.db)
            .await?;
        info!(payment_method_id = %id, "Payment method deleted");
        Ok(())
    }
}
