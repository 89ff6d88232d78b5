use crate::{
    auth::hash_password,
    entities::{employee, shop},
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        avatars::AvatarStorage, clean_optional, fetch_page, normalize_email, not_found,
        required_text, shop_owners::ensure_login_email_free, PageRequest,
    },
    PaginatedResponse,
};
use chrono::{NaiveDate, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateEmployeeRequest {
    pub shop_id: Uuid,
    #[validate(length(min = 1, max = 120, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 60, message = "Position is required"))]
    pub position: String,
    /// Without a password the employee cannot log in.
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: Option<String>,
    /// Defaults to today.
    pub hired_at: Option<NaiveDate>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateEmployeeRequest {
    pub shop_id: Option<Uuid>,
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(min = 1, max = 60))]
    pub position: Option<String>,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: Option<String>,
    pub hired_at: Option<NaiveDate>,
    pub is_active: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct EmployeeFilter {
    pub shop_id: Option<Uuid>,
    pub include_inactive: bool,
}

#[derive(Clone)]
pub struct EmployeeService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
    avatars: AvatarStorage,
}

impl EmployeeService {
    pub fn new(
        db: Arc<DatabaseConnection>,
        event_sender: Arc<EventSender>,
        avatars: AvatarStorage,
    ) -> Self {
        Self {
            db,
            event_sender,
            avatars,
        }
    }

    pub fn avatar_storage(&self) -> &AvatarStorage {
        &self.avatars
    }

    async fn ensure_shop_exists(&self, shop_id: Uuid) -> Result<(), ServiceError> {
        shop::Entity::find_by_id(shop_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found("Shop", shop_id))
    }

    #[instrument(skip(self, input), fields(shop_id = %input.shop_id))]
    pub async fn create(
        &self,
        input: CreateEmployeeRequest,
    ) -> Result<employee::Model, ServiceError> {
        self.ensure_shop_exists(input.shop_id).await?;
        let email = normalize_email(&input.email);
        ensure_login_email_free(&*self.db, &email, None).await?;

        let password_hash = input.password.as_deref().map(hash_password).transpose()?;
        let employee = employee::ActiveModel {
            id: Set(Uuid::new_v4()),
            shop_id: Set(input.shop_id),
            full_name: Set(required_text("full_name", &input.full_name)?),
            email: Set(email),
            phone: Set(clean_optional(input.phone)),
            position: Set(required_text("position", &input.position)?),
            password_hash: Set(password_hash),
            avatar_path: Set(None),
            is_active: Set(true),
            hired_at: Set(input.hired_at.unwrap_or_else(|| Utc::now().date_naive())),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.event_sender.publish(Event::EmployeeCreated(employee.id));
        info!(employee_id = %employee.id, "Employee created");
        Ok(employee)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<employee::Model, ServiceError> {
        employee::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Employee", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
        filter: &EmployeeFilter,
    ) -> Result<PaginatedResponse<employee::Model>, ServiceError> {
        let mut query = employee::Entity::find().order_by_asc(employee::Column::FullName);
        if !filter.include_inactive {
            query = query.filter(employee::Column::IsActive.eq(true));
        }
        if let Some(shop_id) = filter.shop_id {
            query = query.filter(employee::Column::ShopId.eq(shop_id));
        }
        if let Some(term) = page.search_term() {
            query = query.filter(
                Condition::any()
                    .add(employee::Column::FullName.contains(term))
                    .add(employee::Column::Email.contains(term)),
            );
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateEmployeeRequest,
    ) -> Result<employee::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut employee: employee::ActiveModel = existing.clone().into();

        if let Some(shop_id) = input.shop_id {
            self.ensure_shop_exists(shop_id).await?;
            employee.shop_id = Set(shop_id);
        }
        if let Some(full_name) = input.full_name {
            employee.full_name = Set(required_text("full_name", &full_name)?);
        }
        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if email != existing.email {
                ensure_login_email_free(&*self.db, &email, Some(id)).await?;
                employee.email = Set(email);
            }
        }
        if input.phone.is_some() {
            employee.phone = Set(clean_optional(input.phone));
        }
        if let Some(position) = input.position {
            employee.position = Set(required_text("position", &position)?);
        }
        if let Some(password) = input.password {
            employee.password_hash = Set(Some(hash_password(&password)?));
        }
        if let Some(hired_at) = input.hired_at {
            employee.hired_at = Set(hired_at);
        }
        if let Some(is_active) = input.is_active {
            employee.is_active = Set(is_active);
        }

        let employee = employee.update(&*self.db).await?;
        info!(employee_id = %id, "Employee updated");
        Ok(employee)
    }

    /// Soft delete; the employee can no longer log in.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let existing = self.get(id).await?;
        if !existing.is_active {
            return Ok(());
        }

        let mut employee: employee::ActiveModel = existing.into();
        employee.is_active = Set(false);
        employee.update(&*self.db).await?;

        self.event_sender.publish(Event::EmployeeDeactivated(id));
        info!(employee_id = %id, "Employee deactivated");
        Ok(())
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    pub async fn upload_avatar(
        &self,
        id: Uuid,
        filename: &str,
        data: &[u8],
    ) -> Result<employee::Model, ServiceError> {
        let existing = self.get(id).await?;
        let path = self.avatars.store(id, filename, data).await?;

        let mut employee: employee::ActiveModel = existing.into();
        employee.avatar_path = Set(Some(path));
        Ok(employee.update(&*self.db).await?)
    }
}
