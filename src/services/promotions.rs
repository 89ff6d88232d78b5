use crate::{
    entities::{
        invoice,
        promotion::{self, DiscountType},
        shop,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{clean_optional, fetch_page, not_found, required_text, PageRequest, MAX_MONEY},
    PaginatedResponse,
};
use chrono::{DateTime, Utc};
use rust_decimal::{Decimal, RoundingStrategy};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, ConnectionTrait, DatabaseConnection, EntityTrait,
    PaginatorTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePromotionRequest {
    #[validate(length(min = 1, max = 30, message = "Promotion code is required"))]
    pub code: String,
    #[validate(length(min = 1, max = 120, message = "Promotion name is required"))]
    pub name: String,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    /// Leave empty for a promotion valid in every shop.
    pub shop_id: Option<Uuid>,
    pub discount_type: DiscountType,
    pub discount_value: Decimal,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
}

#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdatePromotionRequest {
    #[validate(length(min = 1, max = 30))]
    pub code: Option<String>,
    #[validate(length(min = 1, max = 120))]
    pub name: Option<String>,
    #[validate(length(max = 2000))]
    pub description: Option<String>,
    pub shop_id: Option<Uuid>,
    /// `true` removes the shop restriction so the promotion applies everywhere.
    pub global: Option<bool>,
    pub discount_type: Option<DiscountType>,
    pub discount_value: Option<Decimal>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub is_active: Option<bool>,
}

/// Promotion codes are matched case-insensitively and stored uppercase.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_uppercase()
}

/// Checks the discount terms of a promotion, collecting every broken rule.
pub fn validate_terms(
    discount_type: DiscountType,
    discount_value: Decimal,
    start_date: DateTime<Utc>,
    end_date: DateTime<Utc>,
) -> Result<(), ServiceError> {
    let mut errors = Vec::new();

    if end_date <= start_date {
        errors.push("end_date: must be after start_date".to_string());
    }
    match discount_type {
        DiscountType::Percentage => {
            if discount_value <= Decimal::ZERO || discount_value > Decimal::ONE_HUNDRED {
                errors.push(
                    "discount_value: percentage must be greater than 0 and at most 100"
                        .to_string(),
                );
            }
        }
        DiscountType::FixedAmount => {
            if discount_value <= Decimal::ZERO {
                errors.push("discount_value: fixed amount must be greater than 0".to_string());
            } else if discount_value > MAX_MONEY {
                errors.push("discount_value: too large".to_string());
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(errors))
    }
}

/// Discount a promotion grants on `subtotal`, rounded to cents and never
/// more than the subtotal itself.
pub fn calculate_discount(
    discount_type: DiscountType,
    discount_value: Decimal,
    subtotal: Decimal,
) -> Decimal {
    if subtotal <= Decimal::ZERO {
        return Decimal::ZERO;
    }

    let discount = match discount_type {
        DiscountType::Percentage => subtotal * discount_value / Decimal::ONE_HUNDRED,
        DiscountType::FixedAmount => discount_value,
    };

    discount
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .max(Decimal::ZERO)
        .min(subtotal)
}

/// Looks up `code` and checks it can be used by `shop_id` at `at`.
pub(crate) async fn resolve_applicable<C: ConnectionTrait>(
    db: &C,
    code: &str,
    shop_id: Uuid,
    at: DateTime<Utc>,
) -> Result<promotion::Model, ServiceError> {
    let code = normalize_code(code);
    let promotion = promotion::Entity::find()
        .filter(promotion::Column::Code.eq(code.as_str()))
        .one(db)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("Promotion '{}' not found", code)))?;

    if !promotion.is_applicable(at, shop_id) {
        debug!(%code, %shop_id, "Promotion not applicable");
        return Err(ServiceError::ValidationError(format!(
            "Promotion '{}' is not applicable to this invoice",
            code
        )));
    }
    Ok(promotion)
}

#[derive(Clone)]
pub struct PromotionService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl PromotionService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    async fn ensure_code_free(&self, code: &str, except: Option<Uuid>) -> Result<(), ServiceError> {
        let mut query = promotion::Entity::find().filter(promotion::Column::Code.eq(code));
        if let Some(id) = except {
            query = query.filter(promotion::Column::Id.ne(id));
        }
        if query.count(&*self.db).await? > 0 {
            return Err(ServiceError::Conflict(format!(
                "Promotion with code '{}' already exists",
                code
            )));
        }
        Ok(())
    }

    async fn ensure_shop_exists(&self, shop_id: Uuid) -> Result<(), ServiceError> {
        shop::Entity::find_by_id(shop_id)
            .one(&*self.db)
            .await?
            .map(|_| ())
            .ok_or_else(|| not_found("Shop", shop_id))
    }

    #[instrument(skip(self, input), fields(code = %input.code))]
    pub async fn create(
        &self,
        input: CreatePromotionRequest,
    ) -> Result<promotion::Model, ServiceError> {
        validate_terms(
            input.discount_type,
            input.discount_value,
            input.start_date,
            input.end_date,
        )?;

        let code = normalize_code(&required_text("code", &input.code)?);
        self.ensure_code_free(&code, None).await?;
        if let Some(shop_id) = input.shop_id {
            self.ensure_shop_exists(shop_id).await?;
        }

        let promotion = promotion::ActiveModel {
            id: Set(Uuid::new_v4()),
            code: Set(code),
            name: Set(required_text("name", &input.name)?),
            description: Set(clean_optional(input.description)),
            shop_id: Set(input.shop_id),
            discount_type: Set(input.discount_type),
            discount_value: Set(input.discount_value),
            start_date: Set(input.start_date),
            end_date: Set(input.end_date),
            is_active: Set(true),
            ..Default::default()
        }
        .insert(&*self.db)
        .await?;

        self.event_sender.publish(Event::PromotionCreated(promotion.id));
        info!(promotion_id = %promotion.id, "Promotion created");
        Ok(promotion)
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<promotion::Model, ServiceError> {
        promotion::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Promotion", id))
    }

    #[instrument(skip(self))]
    pub async fn get_by_code(&self, code: &str) -> Result<promotion::Model, ServiceError> {
        let code = normalize_code(code);
        promotion::Entity::find()
            .filter(promotion::Column::Code.eq(code.as_str()))
            .one(&*self.db)
            .await?
            .ok_or_else(|| ServiceError::NotFound(format!("Promotion '{}' not found", code)))
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
    ) -> Result<PaginatedResponse<promotion::Model>, ServiceError> {
        let mut query = promotion::Entity::find().order_by_desc(promotion::Column::StartDate);
        if let Some(term) = page.search_term() {
            query = query.filter(
                Condition::any()
                    .add(promotion::Column::Code.contains(term))
                    .add(promotion::Column::Name.contains(term)),
            );
        }
        fetch_page(&*self.db, query, page).await
    }

    #[instrument(skip(self, input))]
    pub async fn update(
        &self,
        id: Uuid,
        input: UpdatePromotionRequest,
    ) -> Result<promotion::Model, ServiceError> {
        let existing = self.get(id).await?;

        validate_terms(
            input.discount_type.unwrap_or(existing.discount_type),
            input.discount_value.unwrap_or(existing.discount_value),
            input.start_date.unwrap_or(existing.start_date),
            input.end_date.unwrap_or(existing.end_date),
        )?;

        let mut promotion: promotion::ActiveModel = existing.clone().into();
        if let Some(code) = input.code {
            let code = normalize_code(&required_text("code", &code)?);
            if code != existing.code {
                self.ensure_code_free(&code, Some(id)).await?;
                promotion.code = Set(code);
            }
        }
        if let Some(name) = input.name {
            promotion.name = Set(required_text("name", &name)?);
        }
        if input.description.is_some() {
            promotion.description = Set(clean_optional(input.description));
        }
        if input.global == Some(true) {
            if input.shop_id.is_some() {
                return Err(ServiceError::InvalidFields(vec![
                    "shop_id: cannot be combined with global".to_string(),
                ]));
            }
            promotion.shop_id = Set(None);
        } else if let Some(shop_id) = input.shop_id {
            self.ensure_shop_exists(shop_id).await?;
            promotion.shop_id = Set(Some(shop_id));
        }
        if let Some(discount_type) = input.discount_type {
            promotion.discount_type = Set(discount_type);
        }
        if let Some(discount_value) = input.discount_value {
            promotion.discount_value = Set(discount_value);
        }
        if let Some(start_date) = input.start_date {
            promotion.start_date = Set(start_date);
        }
        if let Some(end_date) = input.end_date {
            promotion.end_date = Set(end_date);
        }
        if let Some(is_active) = input.is_active {
            promotion.is_active = Set(is_active);
        }

        let promotion = promotion.update(&*self.db).await?;
        info!(promotion_id = %id, "Promotion updated");
        Ok(promotion)
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        self.get(id).await?;

        let invoices = invoice::Entity::find()
            .filter(invoice::Column::PromotionId.eq(id))
            .count(&*self.db)
            .await?;
        if invoices > 0 {
            return Err(ServiceError::Conflict(format!(
                "Promotion {} is referenced by {} invoice(s)",
                id, invoices
            )));
        }

        promotion::Entity::delete_by_id(id).exec(&*self.db).await?;
        info!(promotion_id = %id, "Promotion deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use chrono::Duration;
    use proptest::prelude::*;
    use rstest::rstest;
    use rust_decimal_macros::dec;

    #[rstest]
    #[case(DiscountType::Percentage, dec!(10), dec!(200.00), dec!(20.00))]
    #[case(DiscountType::Percentage, dec!(12.5), dec!(19.99), dec!(2.50))]
    #[case(DiscountType::Percentage, dec!(100), dec!(45.10), dec!(45.10))]
    #[case(DiscountType::FixedAmount, dec!(15), dec!(100.00), dec!(15))]
    #[case(DiscountType::FixedAmount, dec!(50), dec!(30.00), dec!(30.00))]
    #[case(DiscountType::FixedAmount, dec!(5), dec!(0), dec!(0))]
    fn discount_cases(
        #[case] discount_type: DiscountType,
        #[case] value: Decimal,
        #[case] subtotal: Decimal,
        #[case] expected: Decimal,
    ) {
        assert_eq!(calculate_discount(discount_type, value, subtotal), expected);
    }

    #[test]
    fn end_before_start_is_rejected() {
        let start = Utc::now();
        assert_matches!(
            validate_terms(DiscountType::FixedAmount, dec!(5), start, start),
            Err(ServiceError::InvalidFields(fields)) if fields[0].starts_with("end_date")
        );
        assert!(validate_terms(
            DiscountType::FixedAmount,
            dec!(5),
            start,
            start + Duration::days(1)
        )
        .is_ok());
    }

    #[rstest]
    #[case(DiscountType::Percentage, dec!(0), false)]
    #[case(DiscountType::Percentage, dec!(100), true)]
    #[case(DiscountType::Percentage, dec!(100.01), false)]
    #[case(DiscountType::FixedAmount, dec!(0), false)]
    #[case(DiscountType::FixedAmount, dec!(0.01), true)]
    fn discount_value_bounds(
        #[case] discount_type: DiscountType,
        #[case] value: Decimal,
        #[case] valid: bool,
    ) {
        let start = Utc::now();
        let result = validate_terms(discount_type, value, start, start + Duration::days(7));
        assert_eq!(result.is_ok(), valid);
    }

    #[test]
    fn every_broken_rule_is_reported() {
        let start = Utc::now();
        match validate_terms(DiscountType::Percentage, dec!(150), start, start) {
            Err(ServiceError::InvalidFields(fields)) => assert_eq!(fields.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn codes_are_case_insensitive() {
        assert_eq!(normalize_code("  spring10 "), "SPRING10");
    }

    proptest! {
        #[test]
        fn discount_never_exceeds_subtotal(
            cents in 0i64..10_000_000,
            percent in 1u32..=100,
            fixed_cents in 1i64..10_000_000,
        ) {
            let subtotal = Decimal::new(cents, 2);
            let pct = calculate_discount(DiscountType::Percentage, Decimal::from(percent), subtotal);
            let fixed = calculate_discount(DiscountType::FixedAmount, Decimal::new(fixed_cents, 2), subtotal);
            prop_assert!(pct >= Decimal::ZERO && pct <= subtotal);
            prop_assert!(fixed >= Decimal::ZERO && fixed <= subtotal);
            prop_assert!(pct.scale() <= 2);
        }
    }
}
