//! Sales invoices.
//!
//! Creating an invoice prices every line, applies an optional promotion,
//! takes the sold quantities out of stock and credits the customer's loyalty
//! points, all in one database transaction. Cancelling or deleting a paid
//! invoice reverses those effects.

use std::collections::{BTreeMap, HashMap};

use crate::{
    entities::{
        customer, employee,
        invoice::{self, InvoiceStatus},
        invoice_detail, payment_method, product, promotion, shop,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        clean_optional, document_number, fetch_page, line_amount, not_found,
        promotions::{calculate_discount, resolve_applicable},
        sum_amounts, too_large, PageRequest, MAX_LINE_QUANTITY, MAX_MONEY,
    },
    tracing::with_metrics,
    PaginatedResponse,
};
use chrono::Utc;
use rust_decimal::{prelude::ToPrimitive, Decimal};
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    DatabaseTransaction, EntityTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument, warn};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

/// One point per whole 10 currency units spent.
const LOYALTY_POINT_UNIT: Decimal = Decimal::TEN;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct InvoiceLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    /// Defaults to the product's current sale price.
    pub unit_price: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateInvoiceRequest {
    pub shop_id: Uuid,
    pub customer_id: Option<Uuid>,
    /// Defaults to the employee issuing the request.
    pub employee_id: Option<Uuid>,
    pub payment_method_id: Option<Uuid>,
    #[validate(length(min = 1, max = 30))]
    pub promotion_code: Option<String>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "An invoice needs at least one detail line"))]
    pub details: Vec<InvoiceLineRequest>,
}

/// Invoice header with its detail lines.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct InvoiceResponse {
    #[serde(flatten)]
    pub invoice: invoice::Model,
    pub details: Vec<invoice_detail::Model>,
}

#[derive(Debug, Clone, Default)]
pub struct InvoiceFilter {
    pub shop_id: Option<Uuid>,
    pub customer_id: Option<Uuid>,
    pub status: Option<InvoiceStatus>,
}

/// A detail line with its price resolved.
#[derive(Debug, Clone, PartialEq)]
pub struct PricedLine {
    pub product_id: Uuid,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub final_amount: Decimal,
}

impl PricedLine {
    /// Prices line `index`, refusing amounts a money column cannot hold.
    pub fn new(
        index: usize,
        product_id: Uuid,
        quantity: i32,
        unit_price: Decimal,
    ) -> Result<Self, ServiceError> {
        let final_amount = line_amount(quantity, unit_price)
            .ok_or_else(|| too_large(&format!("details[{}].unit_price", index)))?;
        Ok(Self {
            product_id,
            quantity,
            unit_price,
            final_amount,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvoiceTotals {
    pub subtotal: Decimal,
    pub discount_amount: Decimal,
    pub total_amount: Decimal,
}

impl InvoiceTotals {
    pub fn compute(
        lines: &[PricedLine],
        promotion: Option<&promotion::Model>,
    ) -> Result<Self, ServiceError> {
        let subtotal = sum_amounts(lines.iter().map(|l| l.final_amount))
            .ok_or_else(|| too_large("details"))?;
        let discount_amount = promotion
            .map(|p| calculate_discount(p.discount_type, p.discount_value, subtotal))
            .unwrap_or(Decimal::ZERO);
        Ok(Self {
            subtotal,
            discount_amount,
            total_amount: subtotal - discount_amount,
        })
    }
}

/// Every broken line rule, reported per field.
pub fn validate_lines(lines: &[InvoiceLineRequest]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::InvalidFields(vec![
            "details: an invoice needs at least one detail line".to_string(),
        ]));
    }

    let mut errors = Vec::new();
    for (index, line) in lines.iter().enumerate() {
        if line.quantity < 1 {
            errors.push(format!("details[{}].quantity: must be at least 1", index));
        } else if line.quantity > MAX_LINE_QUANTITY {
            errors.push(format!(
                "details[{}].quantity: must be at most {}",
                index, MAX_LINE_QUANTITY
            ));
        }
        match line.unit_price {
            Some(price) if price < Decimal::ZERO => {
                errors.push(format!("details[{}].unit_price: must not be negative", index));
            }
            Some(price) if price > MAX_MONEY => {
                errors.push(format!("details[{}].unit_price: too large", index));
            }
            _ => {}
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(errors))
    }
}

/// Total quantity per product across lines; a product may appear on several.
pub fn requested_quantities<I>(lines: I) -> Result<BTreeMap<Uuid, i32>, ServiceError>
where
    I: IntoIterator<Item = (Uuid, i32)>,
{
    let mut totals: BTreeMap<Uuid, i32> = BTreeMap::new();
    for (product_id, quantity) in lines {
        let total = totals.entry(product_id).or_insert(0);
        *total = total.checked_add(quantity).ok_or_else(|| {
            ServiceError::InvalidFields(vec![format!(
                "details: total quantity for product {} is too large",
                product_id
            )])
        })?;
    }
    Ok(totals)
}

pub fn loyalty_points_for(total_amount: Decimal) -> i32 {
    if total_amount <= Decimal::ZERO {
        return 0;
    }
    (total_amount / LOYALTY_POINT_UNIT)
        .floor()
        .to_i32()
        .unwrap_or(i32::MAX)
}

#[derive(Clone)]
pub struct InvoiceService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl InvoiceService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(shop_id = %input.shop_id, lines = input.details.len()))]
    pub async fn create(&self, input: CreateInvoiceRequest) -> Result<InvoiceResponse, ServiceError> {
        validate_lines(&input.details)?;
        with_metrics("invoice.create", self.create_invoice(input)).await
    }

    async fn create_invoice(
        &self,
        input: CreateInvoiceRequest,
    ) -> Result<InvoiceResponse, ServiceError> {
        let shop_id = input.shop_id;
        self.resolve_references(&input).await?;

        let products: HashMap<Uuid, product::Model> = product::Entity::find()
            .filter(product::Column::Id.is_in(input.details.iter().map(|l| l.product_id)))
            .all(&*self.db)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        let mut lines = Vec::with_capacity(input.details.len());
        for (index, line) in input.details.iter().enumerate() {
            let product = products
                .get(&line.product_id)
                .ok_or_else(|| not_found("Product", line.product_id))?;
            if !product.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Product '{}' is no longer sold",
                    product.code
                )));
            }
            let unit_price = line.unit_price.unwrap_or(product.sale_price);
            lines.push(PricedLine::new(index, product.id, line.quantity, unit_price)?);
        }

        let issued_at = Utc::now();
        let promotion = match input
            .promotion_code
            .as_deref()
            .map(str::trim)
            .filter(|code| !code.is_empty())
        {
            Some(code) => Some(resolve_applicable(&*self.db, code, shop_id, issued_at).await?),
            None => None,
        };
        let totals = InvoiceTotals::compute(&lines, promotion.as_ref())?;
        let requested = requested_quantities(lines.iter().map(|l| (l.product_id, l.quantity)))?;

        let txn = self.db.begin().await?;

        let invoice = invoice::ActiveModel {
            id: Set(Uuid::new_v4()),
            invoice_number: Set(document_number("INV", issued_at)),
            shop_id: Set(shop_id),
            customer_id: Set(input.customer_id),
            employee_id: Set(input.employee_id),
            payment_method_id: Set(input.payment_method_id),
            promotion_id: Set(promotion.as_ref().map(|p| p.id)),
            subtotal: Set(totals.subtotal),
            discount_amount: Set(totals.discount_amount),
            total_amount: Set(totals.total_amount),
            status: Set(InvoiceStatus::Paid),
            note: Set(clean_optional(input.note)),
            issued_at: Set(issued_at),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut details = Vec::with_capacity(lines.len());
        for line in &lines {
            let detail = invoice_detail::ActiveModel {
                id: Set(Uuid::new_v4()),
                invoice_id: Set(invoice.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                unit_price: Set(line.unit_price),
                final_amount: Set(line.final_amount),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            details.push(detail);
        }

        let mut stock_events = Vec::with_capacity(requested.len());
        for (product_id, quantity) in requested {
            let remaining = take_stock(&txn, product_id, quantity).await?;
            stock_events.push(Event::StockAdjusted {
                product_id,
                delta: -quantity,
                quantity_in_stock: remaining,
            });
        }

        if let Some(customer_id) = input.customer_id {
            let points = loyalty_points_for(totals.total_amount);
            if points > 0 {
                customer::Entity::update_many()
                    .col_expr(
                        customer::Column::LoyaltyPoints,
                        Expr::col(customer::Column::LoyaltyPoints).add(points),
                    )
                    .col_expr(customer::Column::UpdatedAt, Expr::value(Utc::now()))
                    .filter(customer::Column::Id.eq(customer_id))
                    .exec(&txn)
                    .await?;
            }
        }

        txn.commit().await?;

        self.event_sender.publish(Event::InvoiceCreated {
            invoice_id: invoice.id,
            shop_id,
            total_amount: invoice.total_amount,
        });
        for event in stock_events {
            self.event_sender.publish(event);
        }

        info!(
            invoice_id = %invoice.id,
            invoice_number = %invoice.invoice_number,
            total_amount = %invoice.total_amount,
            "Invoice created"
        );
        Ok(InvoiceResponse { invoice, details })
    }

    async fn resolve_references(&self, input: &CreateInvoiceRequest) -> Result<(), ServiceError> {
        shop::Entity::find_by_id(input.shop_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Shop", input.shop_id))?;

        if let Some(customer_id) = input.customer_id {
            customer::Entity::find_by_id(customer_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| not_found("Customer", customer_id))?;
        }

        if let Some(employee_id) = input.employee_id {
            let employee = employee::Entity::find_by_id(employee_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| not_found("Employee", employee_id))?;
            if !employee.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Employee {} is not active",
                    employee_id
                )));
            }
            if employee.shop_id != input.shop_id {
                return Err(ServiceError::ValidationError(format!(
                    "Employee {} does not work at shop {}",
                    employee_id, input.shop_id
                )));
            }
        }

        if let Some(method_id) = input.payment_method_id {
            let method = payment_method::Entity::find_by_id(method_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| not_found("Payment method", method_id))?;
            if !method.is_active {
                return Err(ServiceError::ValidationError(format!(
                    "Payment method '{}' is not active",
                    method.name
                )));
            }
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<InvoiceResponse, ServiceError> {
        let invoice = invoice::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Invoice", id))?;
        let details = load_details(&*self.db, id).await?;
        Ok(InvoiceResponse { invoice, details })
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
        filter: &InvoiceFilter,
    ) -> Result<PaginatedResponse<invoice::Model>, ServiceError> {
        let mut query = invoice::Entity::find().order_by_desc(invoice::Column::IssuedAt);
        if let Some(shop_id) = filter.shop_id {
            query = query.filter(invoice::Column::ShopId.eq(shop_id));
        }
        if let Some(customer_id) = filter.customer_id {
            query = query.filter(invoice::Column::CustomerId.eq(customer_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(invoice::Column::Status.eq(status));
        }
        if let Some(term) = page.search_term() {
            query = query.filter(invoice::Column::InvoiceNumber.contains(term));
        }
        fetch_page(&*self.db, query, page).await
    }

    /// Paid → Cancelled, returning stock and taking back loyalty points.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<InvoiceResponse, ServiceError> {
        with_metrics("invoice.cancel", self.cancel_invoice(id)).await
    }

    async fn cancel_invoice(&self, id: Uuid) -> Result<InvoiceResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let invoice = invoice::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Invoice", id))?;
        if invoice.status == InvoiceStatus::Cancelled {
            return Err(ServiceError::InvalidOperation(format!(
                "Invoice {} is already cancelled",
                invoice.invoice_number
            )));
        }

        let details = load_details(&txn, id).await?;
        let stock_events = revert_sale(&txn, &invoice, &details).await?;

        let mut active: invoice::ActiveModel = invoice.into();
        active.status = Set(InvoiceStatus::Cancelled);
        let invoice = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender.publish(Event::InvoiceCancelled(id));
        for event in stock_events {
            self.event_sender.publish(event);
        }
        info!(invoice_id = %id, "Invoice cancelled");
        Ok(InvoiceResponse { invoice, details })
    }

    /// Removes the invoice and its lines. A paid invoice is reversed first.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let invoice = invoice::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Invoice", id))?;

        let mut stock_events = Vec::new();
        if invoice.status == InvoiceStatus::Paid {
            let details = load_details(&txn, id).await?;
            stock_events = revert_sale(&txn, &invoice, &details).await?;
        }

        invoice_detail::Entity::delete_many()
            .filter(invoice_detail::Column::InvoiceId.eq(id))
            .exec(&txn)
            .await?;
        invoice::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        for event in stock_events {
            self.event_sender.publish(event);
        }
        info!(invoice_id = %id, "Invoice deleted");
        Ok(())
    }
}

async fn load_details<C: ConnectionTrait>(
    db: &C,
    invoice_id: Uuid,
) -> Result<Vec<invoice_detail::Model>, ServiceError> {
    Ok(invoice_detail::Entity::find()
        .filter(invoice_detail::Column::InvoiceId.eq(invoice_id))
        .order_by_asc(invoice_detail::Column::CreatedAt)
        .all(db)
        .await?)
}

/// Decrements stock only when enough is on hand, returning what is left.
async fn take_stock(
    txn: &DatabaseTransaction,
    product_id: Uuid,
    quantity: i32,
) -> Result<i32, ServiceError> {
    let updated = product::Entity::update_many()
        .col_expr(
            product::Column::QuantityInStock,
            Expr::col(product::Column::QuantityInStock).sub(quantity),
        )
        .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
        .filter(product::Column::Id.eq(product_id))
        .filter(product::Column::QuantityInStock.gte(quantity))
        .exec(txn)
        .await?;

    let product = product::Entity::find_by_id(product_id)
        .one(txn)
        .await?
        .ok_or_else(|| not_found("Product", product_id))?;

    if updated.rows_affected == 0 {
        return Err(ServiceError::InsufficientStock(format!(
            "Product '{}': requested {}, available {}",
            product.code, quantity, product.quantity_in_stock
        )));
    }
    Ok(product.quantity_in_stock)
}

/// Puts sold quantities back on the shelf and removes the points the sale earned.
async fn revert_sale(
    txn: &DatabaseTransaction,
    invoice: &invoice::Model,
    details: &[invoice_detail::Model],
) -> Result<Vec<Event>, ServiceError> {
    let returned = requested_quantities(details.iter().map(|d| (d.product_id, d.quantity)))?;
    let mut events = Vec::with_capacity(returned.len());

    for (product_id, quantity) in returned {
        product::Entity::update_many()
            .col_expr(
                product::Column::QuantityInStock,
                Expr::col(product::Column::QuantityInStock).add(quantity),
            )
            .col_expr(product::Column::UpdatedAt, Expr::value(Utc::now()))
            .filter(product::Column::Id.eq(product_id))
            .exec(txn)
            .await?;
        let quantity_in_stock = product::Entity::find_by_id(product_id)
            .one(txn)
            .await?
            .map(|p| p.quantity_in_stock)
            .unwrap_or_default();
        events.push(Event::StockAdjusted {
            product_id,
            delta: quantity,
            quantity_in_stock,
        });
    }

    if let Some(customer_id) = invoice.customer_id {
        let earned = loyalty_points_for(invoice.total_amount);
        match customer::Entity::find_by_id(customer_id).one(txn).await? {
            Some(customer) if earned > 0 => {
                let remaining = (customer.loyalty_points - earned).max(0);
                let mut active: customer::ActiveModel = customer.into();
                active.loyalty_points = Set(remaining);
                active.update(txn).await?;
            }
            Some(_) => {}
            None => warn!(%customer_id, "Customer missing while reverting invoice"),
        }
    }

    Ok(events)
}
