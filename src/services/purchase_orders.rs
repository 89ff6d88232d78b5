use crate::{
    entities::{
        employee, product,
        purchase_order::{self, PurchaseOrderStatus},
        purchase_order_detail, shop, supplier,
    },
    errors::ServiceError,
    events::{Event, EventSender},
    services::{
        clean_optional, document_number, fetch_page, line_amount, not_found, sum_amounts,
        too_large, PageRequest, MAX_LINE_QUANTITY, MAX_MONEY,
    },
    tracing::with_metrics,
    PaginatedResponse,
};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    sea_query::Expr, ActiveModelTrait, ColumnTrait, ConnectionTrait, DatabaseConnection,
    EntityTrait, PaginatorTrait, QueryFilter, QueryOrder, Set, TransactionTrait,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, instrument};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PurchaseOrderLineRequest {
    pub product_id: Uuid,
    pub quantity: i32,
    pub import_price: Decimal,
}

#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreatePurchaseOrderRequest {
    pub shop_id: Uuid,
    pub supplier_id: Uuid,
    pub employee_id: Option<Uuid>,
    #[validate(length(max = 1000))]
    pub note: Option<String>,
    #[validate(length(min = 1, message = "A purchase order needs at least one detail line"))]
    pub details: Vec<PurchaseOrderLineRequest>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PurchaseOrderResponse {
    #[serde(flatten)]
    pub purchase_order: purchase_order::Model,
    pub details: Vec<purchase_order_detail::Model>,
}

#[derive(Debug, Clone, Default)]
pub struct PurchaseOrderFilter {
    pub shop_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub status: Option<PurchaseOrderStatus>,
}

pub fn validate_lines(lines: &[PurchaseOrderLineRequest]) -> Result<(), ServiceError> {
    if lines.is_empty() {
        return Err(ServiceError::InvalidFields(vec![
            "details: a purchase order needs at least one detail line".to_string(),
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
        if line.import_price < Decimal::ZERO {
            errors.push(format!("details[{}].import_price: must not be negative", index));
        } else if line.import_price > MAX_MONEY {
            errors.push(format!("details[{}].import_price: too large", index));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ServiceError::InvalidFields(errors))
    }
}

/// quantity × import_price for every line, in order.
pub fn line_totals(lines: &[PurchaseOrderLineRequest]) -> Result<Vec<Decimal>, ServiceError> {
    lines
        .iter()
        .enumerate()
        .map(|(index, l)| {
            line_amount(l.quantity, l.import_price)
                .ok_or_else(|| too_large(&format!("details[{}].import_price", index)))
        })
        .collect()
}

/// Σ line totals
pub fn order_total(line_totals: &[Decimal]) -> Result<Decimal, ServiceError> {
    sum_amounts(line_totals.iter().copied()).ok_or_else(|| too_large("details"))
}

#[derive(Clone)]
pub struct PurchaseOrderService {
    db: Arc<DatabaseConnection>,
    event_sender: Arc<EventSender>,
}

impl PurchaseOrderService {
    pub fn new(db: Arc<DatabaseConnection>, event_sender: Arc<EventSender>) -> Self {
        Self { db, event_sender }
    }

    #[instrument(skip(self, input), fields(supplier_id = %input.supplier_id, lines = input.details.len()))]
    pub async fn create(
        &self,
        input: CreatePurchaseOrderRequest,
    ) -> Result<PurchaseOrderResponse, ServiceError> {
        validate_lines(&input.details)?;
        with_metrics("purchase_order.create", self.create_order(input)).await
    }

    async fn create_order(
        &self,
        input: CreatePurchaseOrderRequest,
    ) -> Result<PurchaseOrderResponse, ServiceError> {
        self.resolve_references(&input).await?;

        let ordered_at = Utc::now();
        let amounts = line_totals(&input.details)?;
        let total_amount = order_total(&amounts)?;

        let txn = self.db.begin().await?;

        let order = purchase_order::ActiveModel {
            id: Set(Uuid::new_v4()),
            po_number: Set(document_number("PO", ordered_at)),
            shop_id: Set(input.shop_id),
            supplier_id: Set(input.supplier_id),
            employee_id: Set(input.employee_id),
            total_amount: Set(total_amount),
            status: Set(PurchaseOrderStatus::Pending),
            note: Set(clean_optional(input.note)),
            ordered_at: Set(ordered_at),
            received_at: Set(None),
            ..Default::default()
        }
        .insert(&txn)
        .await?;

        let mut details = Vec::with_capacity(input.details.len());
        for (line, line_total) in input.details.iter().zip(amounts) {
            let detail = purchase_order_detail::ActiveModel {
                id: Set(Uuid::new_v4()),
                purchase_order_id: Set(order.id),
                product_id: Set(line.product_id),
                quantity: Set(line.quantity),
                import_price: Set(line.import_price),
                line_total: Set(line_total),
                ..Default::default()
            }
            .insert(&txn)
            .await?;
            details.push(detail);
        }

        txn.commit().await?;

        self.event_sender.publish(Event::PurchaseOrderCreated {
            purchase_order_id: order.id,
            supplier_id: order.supplier_id,
            total_amount: order.total_amount,
        });
        info!(
            purchase_order_id = %order.id,
            po_number = %order.po_number,
            total_amount = %order.total_amount,
            "Purchase order created"
        );
        Ok(PurchaseOrderResponse {
            purchase_order: order,
            details,
        })
    }

    async fn resolve_references(
        &self,
        input: &CreatePurchaseOrderRequest,
    ) -> Result<(), ServiceError> {
        shop::Entity::find_by_id(input.shop_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Shop", input.shop_id))?;

        let supplier = supplier::Entity::find_by_id(input.supplier_id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Supplier", input.supplier_id))?;
        if !supplier.is_active {
            return Err(ServiceError::ValidationError(format!(
                "Supplier '{}' is not active",
                supplier.code
            )));
        }

        if let Some(employee_id) = input.employee_id {
            employee::Entity::find_by_id(employee_id)
                .one(&*self.db)
                .await?
                .ok_or_else(|| not_found("Employee", employee_id))?;
        }

        let mut product_ids: Vec<Uuid> = input.details.iter().map(|l| l.product_id).collect();
        product_ids.sort_unstable();
        product_ids.dedup();
        let found = product::Entity::find()
            .filter(product::Column::Id.is_in(product_ids.clone()))
            .count(&*self.db)
            .await?;
        if found != product_ids.len() as u64 {
            let existing: Vec<Uuid> = product::Entity::find()
                .filter(product::Column::Id.is_in(product_ids.clone()))
                .all(&*self.db)
                .await?
                .into_iter()
                .map(|p| p.id)
                .collect();
            if let Some(missing) = product_ids.into_iter().find(|id| !existing.contains(id)) {
                return Err(not_found("Product", missing));
            }
        }

        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn get(&self, id: Uuid) -> Result<PurchaseOrderResponse, ServiceError> {
        let purchase_order = purchase_order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Purchase order", id))?;
        let details = load_details(&*self.db, id).await?;
        Ok(PurchaseOrderResponse {
            purchase_order,
            details,
        })
    }

    #[instrument(skip(self))]
    pub async fn list(
        &self,
        page: &PageRequest,
        filter: &PurchaseOrderFilter,
    ) -> Result<PaginatedResponse<purchase_order::Model>, ServiceError> {
        let mut query =
            purchase_order::Entity::find().order_by_desc(purchase_order::Column::OrderedAt);
        if let Some(shop_id) = filter.shop_id {
            query = query.filter(purchase_order::Column::ShopId.eq(shop_id));
        }
        if let Some(supplier_id) = filter.supplier_id {
            query = query.filter(purchase_order::Column::SupplierId.eq(supplier_id));
        }
        if let Some(status) = filter.status {
            query = query.filter(purchase_order::Column::Status.eq(status));
        }
        if let Some(term) = page.search_term() {
            query = query.filter(purchase_order::Column::PoNumber.contains(term));
        }
        fetch_page(&*self.db, query, page).await
    }

    /// Pending → Received. Every ordered quantity lands in stock and the
    /// product's import price follows the price paid.
    #[instrument(skip(self))]
    pub async fn receive(&self, id: Uuid) -> Result<PurchaseOrderResponse, ServiceError> {
        with_metrics("purchase_order.receive", self.receive_order(id)).await
    }

    async fn receive_order(&self, id: Uuid) -> Result<PurchaseOrderResponse, ServiceError> {
        let txn = self.db.begin().await?;

        let order = purchase_order::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Purchase order", id))?;
        ensure_pending(&order, "received")?;

        let details = load_details(&txn, id).await?;
        let now = Utc::now();
        let mut stock_events = Vec::with_capacity(details.len());
        for detail in &details {
            product::Entity::update_many()
                .col_expr(
                    product::Column::QuantityInStock,
                    Expr::col(product::Column::QuantityInStock).add(detail.quantity),
                )
                .col_expr(product::Column::ImportPrice, Expr::value(detail.import_price))
                .col_expr(product::Column::UpdatedAt, Expr::value(now))
                .filter(product::Column::Id.eq(detail.product_id))
                .exec(&txn)
                .await?;
            let quantity_in_stock = product::Entity::find_by_id(detail.product_id)
                .one(&txn)
                .await?
                .ok_or_else(|| not_found("Product", detail.product_id))?
                .quantity_in_stock;
            stock_events.push(Event::StockAdjusted {
                product_id: detail.product_id,
                delta: detail.quantity,
                quantity_in_stock,
            });
        }

        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(PurchaseOrderStatus::Received);
        active.received_at = Set(Some(now));
        let order = active.update(&txn).await?;

        txn.commit().await?;

        self.event_sender.publish(Event::PurchaseOrderReceived(id));
        for event in stock_events {
            self.event_sender.publish(event);
        }
        info!(purchase_order_id = %id, "Purchase order received");
        Ok(PurchaseOrderResponse {
            purchase_order: order,
            details,
        })
    }

    #[instrument(skip(self))]
    pub async fn cancel(&self, id: Uuid) -> Result<PurchaseOrderResponse, ServiceError> {
        let order = purchase_order::Entity::find_by_id(id)
            .one(&*self.db)
            .await?
            .ok_or_else(|| not_found("Purchase order", id))?;
        ensure_pending(&order, "cancelled")?;

        let mut active: purchase_order::ActiveModel = order.into();
        active.status = Set(PurchaseOrderStatus::Cancelled);
        let order = active.update(&*self.db).await?;
        let details = load_details(&*self.db, id).await?;

        self.event_sender.publish(Event::PurchaseOrderCancelled(id));
        info!(purchase_order_id = %id, "Purchase order cancelled");
        Ok(PurchaseOrderResponse {
            purchase_order: order,
            details,
        })
    }

    /// Only orders that never touched stock may be removed.
    #[instrument(skip(self))]
    pub async fn delete(&self, id: Uuid) -> Result<(), ServiceError> {
        let txn = self.db.begin().await?;

        let order = purchase_order::Entity::find_by_id(id)
            .one(&txn)
            .await?
            .ok_or_else(|| not_found("Purchase order", id))?;
        if order.status != PurchaseOrderStatus::Pending {
            return Err(ServiceError::Conflict(format!(
                "Purchase order {} is {} and cannot be deleted",
                order.po_number,
                status_label(order.status)
            )));
        }

        purchase_order_detail::Entity::delete_many()
            .filter(purchase_order_detail::Column::PurchaseOrderId.eq(id))
            .exec(&txn)
            .await?;
        purchase_order::Entity::delete_by_id(id).exec(&txn).await?;
        txn.commit().await?;

        info!(purchase_order_id = %id, "Purchase order deleted");
        Ok(())
    }
}

fn status_label(status: PurchaseOrderStatus) -> &'static str {
    match status {
        PurchaseOrderStatus::Pending => "pending",
        PurchaseOrderStatus::Received => "received",
        PurchaseOrderStatus::Cancelled => "cancelled",
    }
}

fn ensure_pending(order: &purchase_order::Model, action: &str) -> Result<(), ServiceError> {
    if order.status != PurchaseOrderStatus::Pending {
        return Err(ServiceError::InvalidOperation(format!(
            "Purchase order {} is {} and cannot be {}",
            order.po_number,
            status_label(order.status),
            action
        )));
    }
    Ok(())
}

async fn load_details<C: ConnectionTrait>(
    db: &C,
    purchase_order_id: Uuid,
) -> Result<Vec<purchase_order_detail::Model>, ServiceError> {
    Ok(purchase_order_detail::Entity::find()
        .filter(purchase_order_detail::Column::PurchaseOrderId.eq(purchase_order_id))
        .order_by_asc(purchase_order_detail::Column::CreatedAt)
        .all(db)
        .await?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn line(quantity: i32, import_price: Decimal) -> PurchaseOrderLineRequest {
        PurchaseOrderLineRequest {
            product_id: Uuid::new_v4(),
            quantity,
            import_price,
        }
    }

    #[test]
    fn total_is_sum_of_quantity_times_price() {
        let lines = vec![line(10, dec!(2.35)), line(3, dec!(100))];
        let amounts = line_totals(&lines).unwrap();
        assert_eq!(amounts, vec![dec!(23.50), dec!(300)]);
        assert_eq!(order_total(&amounts).unwrap(), dec!(323.50));
    }

    #[test]
    fn oversized_import_prices_are_refused() {
        match line_totals(&[line(1, dec!(1)), line(10, Decimal::MAX)]) {
            Err(ServiceError::InvalidFields(fields)) => {
                assert_eq!(fields, vec!["details[1].import_price: too large".to_string()])
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_matches!(
            order_total(&[MAX_MONEY, MAX_MONEY]),
            Err(ServiceError::InvalidFields(_))
        );

        match validate_lines(&[line(MAX_LINE_QUANTITY + 1, Decimal::MAX)]) {
            Err(ServiceError::InvalidFields(fields)) => assert_eq!(
                fields,
                vec![
                    format!("details[0].quantity: must be at most {}", MAX_LINE_QUANTITY),
                    "details[0].import_price: too large".to_string(),
                ]
            ),
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[test]
    fn empty_and_invalid_lines_are_rejected() {
        assert_matches!(validate_lines(&[]), Err(ServiceError::InvalidFields(_)));
        match validate_lines(&[line(0, dec!(-2))]) {
            Err(ServiceError::InvalidFields(fields)) => assert_eq!(fields.len(), 2),
            other => panic!("unexpected result: {:?}", other),
        }
        assert!(validate_lines(&[line(1, Decimal::ZERO)]).is_ok());
    }

    #[test]
    fn only_pending_orders_transition() {
        let now = Utc::now();
        let mut order = purchase_order::Model {
            id: Uuid::new_v4(),
            po_number: "PO-20240301-ABCDEF12".into(),
            shop_id: Uuid::new_v4(),
            supplier_id: Uuid::new_v4(),
            employee_id: None,
            total_amount: dec!(10),
            status: PurchaseOrderStatus::Pending,
            note: None,
            ordered_at: now,
            received_at: None,
            created_at: now,
            updated_at: now,
        };
        assert!(ensure_pending(&order, "received").is_ok());

        order.status = PurchaseOrderStatus::Received;
        assert_matches!(
            ensure_pending(&order, "cancelled"),
            Err(ServiceError::InvalidOperation(msg)) if msg.contains("is received")
        );
    }

    proptest! {
        #[test]
        fn total_matches_integer_cents(
            raw in prop::collection::vec((1i32..1_000, 0i64..1_000_000), 1..10)
        ) {
            let lines: Vec<_> = raw.iter().map(|(q, c)| line(*q, Decimal::new(*c, 2))).collect();
            let cents: i64 = raw.iter().map(|(q, c)| i64::from(*q) * c).sum();
            let amounts = line_totals(&lines).unwrap();
            prop_assert_eq!(order_total(&amounts).unwrap(), Decimal::new(cents, 2));
        }
    }
}
