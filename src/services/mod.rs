// Directory data
pub mod customers;
pub mod employees;
pub mod payment_methods;
pub mod shop_owners;
pub mod shops;
pub mod suppliers;

// Catalog
pub mod products;
pub mod promotions;

// Transactional workflows
pub mod invoices;
pub mod purchase_orders;

// File storage
pub mod avatars;

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use sea_orm::{ConnectionTrait, EntityTrait, PaginatorTrait, Select};
use uuid::Uuid;

use crate::errors::ServiceError;
use crate::PaginatedResponse;

/// Digits with optional leading `+` and the usual separators.
pub static PHONE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+?[0-9][0-9 ().\-]{5,24}$").expect("phone number pattern is valid")
});

/// Emails are compared and stored trimmed and lowercased.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Turns blank optional text into `None` and trims the rest.
pub(crate) fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Business document numbers look like `INV-20240301-1A2B3C4D`.
pub(crate) fn document_number(prefix: &str, at: DateTime<Utc>) -> String {
    let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
    format!("{}-{}-{}", prefix, at.format("%Y%m%d"), suffix)
}

/// Largest amount a `DECIMAL(14, 2)` money column holds.
pub const MAX_MONEY: Decimal = dec!(999999999999.99);

/// Largest quantity a single detail line may carry.
pub const MAX_LINE_QUANTITY: i32 = 1_000_000;

/// `quantity × price` for one detail line, `None` when it would not fit a
/// money column.
pub fn line_amount(quantity: i32, price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity)
        .checked_mul(price)
        .filter(|amount| *amount <= MAX_MONEY)
}

/// Sums line amounts, `None` when the total would not fit a money column.
pub fn sum_amounts<I>(amounts: I) -> Option<Decimal>
where
    I: IntoIterator<Item = Decimal>,
{
    amounts
        .into_iter()
        .try_fold(Decimal::ZERO, |total, amount| total.checked_add(amount))
        .filter(|total| *total <= MAX_MONEY)
}

pub(crate) fn too_large(field: &str) -> ServiceError {
    ServiceError::InvalidFields(vec![format!("{}: too large", field)])
}

/// Field-level error for money amounts, which `validator` cannot range-check.
pub(crate) fn ensure_money(field: &str, value: Decimal) -> Result<(), ServiceError> {
    if value.is_sign_negative() && !value.is_zero() {
        return Err(ServiceError::InvalidFields(vec![format!(
            "{}: must not be negative",
            field
        )]));
    }
    if value > MAX_MONEY {
        return Err(too_large(field));
    }
    Ok(())
}

/// Trims a required text field, rejecting one left blank.
pub(crate) fn required_text(field: &str, value: &str) -> Result<String, ServiceError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ServiceError::InvalidFields(vec![format!(
            "{}: must not be blank",
            field
        )]));
    }
    Ok(trimmed.to_string())
}

pub(crate) fn not_found(kind: &str, id: Uuid) -> ServiceError {
    ServiceError::NotFound(format!("{} {} not found", kind, id))
}

/// A resolved list request. Handlers clamp `per_page` to the configured
/// maximum before building one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u64,
    pub per_page: u64,
    pub search: Option<String>,
}

impl PageRequest {
    /// `page` is capped so the row offset stays within what the database
    /// accepts; pages past the end come back empty.
    pub fn new(page: u64, per_page: u64) -> Self {
        let per_page = per_page.max(1);
        let last_page = (i64::MAX as u64 / per_page).max(1);
        Self {
            page: page.clamp(1, last_page),
            per_page,
            search: None,
        }
    }

    pub fn with_search(mut self, search: Option<String>) -> Self {
        self.search = clean_optional(search);
        self
    }

    /// Substring to match, already trimmed.
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref()
    }
}

impl Default for PageRequest {
    fn default() -> Self {
        Self::new(1, 20)
    }
}

/// Runs a paginated query and packages the page with its totals.
pub(crate) async fn fetch_page<E, C>(
    db: &C,
    select: Select<E>,
    page: &PageRequest,
) -> Result<PaginatedResponse<E::Model>, ServiceError>
where
    E: EntityTrait,
    E::Model: Send + Sync,
    C: ConnectionTrait,
{
    let paginator = select.paginate(db, page.per_page);
    let total = paginator.num_items().await?;
    let items = paginator.fetch_page(page.page - 1).await?;
    Ok(PaginatedResponse::new(items, total, page.page, page.per_page))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[rstest::rstest]
    #[case("555-0100", true)]
    #[case("+44 20 7946 0958", true)]
    #[case("02 (9876) 5432", true)]
    #[case("12", false)]
    #[case("call me", false)]
    #[case("555-0100 ext", false)]
    fn phone_numbers(#[case] input: &str, #[case] valid: bool) {
        assert_eq!(PHONE_NUMBER.is_match(input), valid);
    }

    #[test]
    fn emails_are_trimmed_and_lowercased() {
        assert_eq!(normalize_email("  Ann@Shop.Example "), "ann@shop.example");
    }

    #[test]
    fn blank_optionals_become_none() {
        assert_eq!(clean_optional(Some("   ".into())), None);
        assert_eq!(clean_optional(Some(" 12 Main St ".into())), Some("12 Main St".into()));
        assert_eq!(clean_optional(None), None);
    }

    #[test]
    fn document_numbers_carry_prefix_and_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap();
        let number = document_number("INV", at);
        assert!(number.starts_with("INV-20240301-"));
        assert_eq!(number.len(), "INV-20240301-".len() + 8);
        assert_ne!(number, document_number("INV", at));
    }

    #[test]
    fn line_amount_multiplies_exactly() {
        assert_eq!(line_amount(3, Decimal::new(1999, 2)), Some(Decimal::new(5997, 2)));
        assert_eq!(line_amount(0, Decimal::new(1999, 2)), Some(Decimal::ZERO));
    }

    #[test]
    fn amounts_past_the_money_column_are_refused() {
        assert_eq!(line_amount(10, Decimal::MAX), None);
        assert_eq!(line_amount(2, MAX_MONEY), None);
        assert_eq!(line_amount(1, MAX_MONEY), Some(MAX_MONEY));

        assert_eq!(
            sum_amounts(vec![Decimal::new(150, 2), Decimal::new(250, 2)]),
            Some(Decimal::new(400, 2))
        );
        assert_eq!(sum_amounts(vec![MAX_MONEY, Decimal::ONE]), None);
        assert_eq!(sum_amounts(vec![Decimal::MAX, Decimal::MAX]), None);
    }

    #[test]
    fn money_fields_are_range_checked() {
        assert!(ensure_money("sale_price", Decimal::ZERO).is_ok());
        assert!(ensure_money("sale_price", Decimal::new(1999, 2)).is_ok());
        match ensure_money("sale_price", Decimal::new(-1, 2)) {
            Err(ServiceError::InvalidFields(fields)) => {
                assert_eq!(fields, vec!["sale_price: must not be negative".to_string()])
            }
            other => panic!("unexpected result: {:?}", other),
        }
        match ensure_money("sale_price", Decimal::MAX) {
            Err(ServiceError::InvalidFields(fields)) => {
                assert_eq!(fields, vec!["sale_price: too large".to_string()])
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn required_text_is_trimmed_and_never_blank() {
        assert_eq!(required_text("code", "  SUP-1 ").unwrap(), "SUP-1");
        match required_text("code", "   ") {
            Err(ServiceError::InvalidFields(fields)) => {
                assert_eq!(fields, vec!["code: must not be blank".to_string()])
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn page_request_never_goes_below_one() {
        let page = PageRequest::new(0, 0);
        assert_eq!(page.page, 1);
        assert_eq!(page.per_page, 1);
    }

    #[test]
    fn page_request_caps_the_row_offset() {
        let page = PageRequest::new(u64::MAX, 100);
        assert_eq!(page.page, i64::MAX as u64 / 100);
        assert!((page.page - 1).checked_mul(page.per_page).is_some());

        let page = PageRequest::new(u64::MAX, u64::MAX);
        assert_eq!(page.page, 1);
    }

    #[test]
    fn blank_search_is_ignored() {
        let page = PageRequest::default().with_search(Some("  ".into()));
        assert_eq!(page.search_term(), None);
    }
}
