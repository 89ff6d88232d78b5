use crate::{
    auth::hash_password,
    entities::{employee, shop, shop_owner},
    errors::ServiceError,
    services::{
        clean_optional, fetch_page, normalize_email, not_found, required_text, PageRequest,
    },
    PaginatedResponse,
};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateShopOwnerRequest {
    #[validate(length(min = 1, max = 120, message = "Full name is required"))]
    pub full_name: String,
    #[validate(email(message = "Invalid email address"))]
    pub email: String,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
    #[validate(length(min = 8, max = 128, message = "Password must be 8 to 128 characters"))]
    pub password: String,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateShopOwnerRequest {
    #[validate(length(min = 1, max = 120))]
    pub full_name: Option<String>,
    #[validate(email(message = "Invalid email address"))]
    pub email: Option<String>,
    #[validate(length(max = 30))]
    pub phone: Option<String>,
}

/// Rejects an email already used by an owner or an employee other than `except`.
///
/// Login resolves owners first and employees second, so one address may only
/// belong to a single account across both tables.
pub(crate) async fn ensure_login_email_free<C: ConnectionTrait>(
    db: &C,
    email: &str,
    except: Option<Uuid>,
) -> Result<(), ServiceError> {
    let mut owners = shop_owner::Entity::find().filter(shop_owner::Column::Email.eq(email));
    let mut employees = employee::Entity::find().filter(employee::Column::Email.eq(email));
    if let Some(id) = except {
        owners = owners.filter(shop_owner::Column::Id.ne(id));
        employees = employees.filter(employee::Column::Id.ne(id));
    }

    if owners.count(db).await? > 0 || employees.count(db).await? > 0 {
        return Err(ServiceError::Conflict(format!(
            "An account with email '{}' already exists",
            email
        )));
    }
    Ok(())
}

#[derive(Clone)]
pub struct ShopOwnerService {
    db: Arc<DatabaseConnection>,
}

impl ShopOwnerService {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    #[instrument(skip(self, input), fields(email = %input.email))]
    pub async fn create(
        &self,
        input: CreateShopOwnerRequest,
    ) -> Result<shop_owner::Model, ServiceError> {
        let email = normalize_email(&input.email);
        ensure_login_email_free(&*self.db, &email, None).await?;

        let password_hash = hash_password(&input.password)?;
        let owner = shop_owner::ActiveModel {
            id: Set(Uuid::new_v4()),
            full_name: Set(required_text("full_name", &input.full_name)?),
            email: Set(email),
            phone: Set(clean_optional(input.phone)),
            password_hash: Set(password_hash),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        info!(owner_id = %owner.id, "Shop owner created");
        Ok(owner)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<shop_owner::Model, ServiceError> {
        shop_owner::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Shop owner", id))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<shop_owner::Model>, ServiceError> {
        let mut query = shop_owner::Entity::find().order_by_asc(shop_owner::Column::FullName);
        if let Some(term) = page.search_term() {
            query = query.filter(
                Condition::any()
                    .add(shop_owner::Column::FullName.contains(term))
                    .add(shop_owner::Column::Email.contains(term)),
            );
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdateShopOwnerRequest,
    ) -> Result<shop_owner::Model, ServiceError> {
        let existing = self.get(id).await?;
        let mut owner: shop_owner::ActiveModel = existing.clone().into();

        if let Some(full_name) = input.full_name {
            owner.full_name = Set(required_text("full_name", &full_name)?);
        }
        if let Some(email) = input.email {
            let email = normalize_email(&email);
            if email != existing.email {
                ensure_login_email_free(&*self.db, &email, Some(id)).await?;
                owner.email = Set(email);
            }
        }
        if input.phone.is_some() {
            owner.phone = Set(clean_optional(input.phone));
        }

        let owner = owner.update(&*self.db).await?;
        info!(owner_id = %id, "Shop owner updated");
        Ok(owner)
    }

    /// Owners of at least one shop cannot be removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let owner = self.get(id).await?;

        let shops = shop::Entity::find()
            .filter(shop::Column::OwnerId.eq(id))
            .count(&*self.db)
            .await?;
        if shops > 0 {
            return Err(ServiceError::Conflict(format!(
                "Shop owner {} still owns {} shop(s)",
                id, shops
            )));
        }

        shop_owner::Entity::delete_by_id(owner.id)
            .exec(&*self.db)
            .await?;
        info!(owner_id = %id, "Shop owner deleted");
        Ok(())
    }
}
