use crate::{
    entities::{customer, invoice},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        clean_optional, fetch_page, normalize_email, not_found, required_text, PageRequest,
        PHONE_NUMBER,
    },
    PaginatedResponse,
};
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
pub struct CreateCustomerRequest {
    #[validate(length(min = 1, max = 120, message = "Full name is required"))]
    pub full_name: String,
    #[validate(regex(path = "PHONE_NUMBER", message = "Invalid phone number"))]
    pub phone: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

/// Loyalty points are only ever changed by invoices.
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateCustomerRequest {
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[validate(regex(path = "PHONE_NUMBER", message = "Invalid phone number"))]
    pub phone: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 255))]
    pub address: Option<String>,
}

/// Customer service for the shop's client directory
#[derive(Clone)]
pub struct CustomerService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl CustomerService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn ensure_phone_free(&self, phone: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = customer::Entity::find().filter(customer::Column::Phone.eq(phone));
        if let Some(id) = except {
            query = query.filter(customer::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Customer with phone '{}' already exists",
                phone
            )));
        }
        Ok(())
    }

    /// Register a new customer
    #[instrument(skip(self, input))]
    pub async fn create(
        &self,
        input: CreateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        let phone = required_text("phone", &input.phone)?;
        self.ensure_phone_free(&phone, None).await?;

        let customer = customer::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(required_text("full_name", &input.full_name)?),
            phone: Set(phone),
            email: Set(input.email.as_deref().map(normalize_email)),
            address: Set(clean_optional(input.address)),
            loyalty_points: Set(0),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.event_sender.publish(Event::CustomerCreated(customer.id));
        info!("Customer registered: {}", customer.id);
        Ok(customer)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<customer::Model, ServiceError> {
        customer::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Customer", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<customer::Model>, ServiceError> {
        let mut query = customer::Entity::find().order_by_asc(customer::Column::FullName);
        if let Some(term) = page.search_term() {
            query = query.filter(
                Condition::any()
                    .add(customer::Column::FullName.contains(term))
                    .add(customer::Column::Phone.contains(term))
                    .add(customer::Column::Email.contains(term)),
            );
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateCustomerRequest,
    ) -> Result<customer::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut customer: customer::ActiveModel = existing.clone().into();

        if let Some(full_name) = input.full_name {
            customer.full_name = Set(required_text("full_name", &full_name)?);
        }
        if let Some(phone) = input.phone {
            let phone = required_text("phone", &phone)?;
            if phone != existing.phone {
                self.ensure_phone_free(&phone, Some(id)).await?;
                customer.phone = Set(phone);
            }
        }
        if let Some(email) = input.email {
            customer.email = Set(Some(normalize_email(&email)));
        }
        if input.address.is_some() {
            customer.address = Set(clean_optional(input.address));
        }

        let customer = customer.update(&*self.db).await?;
        info!("Customer updated: {}", id);
        Ok(customer)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;

        let invoices = invoice::Entity::find()
            .filter(invoice::Column::CustomerId.eq(id))
            .count(&*self.db)
            .await?;
        if invoices > 0 {
            return Err(ServiceError::Conflict(format!(
                "Customer {} is referenced by {} invoice(s)",
                id, invoices
            )));
        }

        customer::Entity::delete_by_id(id).exec(&*self.db).await?;
        info!("Customer deleted: {}", id);
        Ok(())
    }
}
