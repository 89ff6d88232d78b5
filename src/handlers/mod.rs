pub mod auth;
pub mod common;
pub mod customers;
pub mod employees;
pub mod invoices;
pub mod payment_methods;
pub mod products;
pub mod promotions;
pub mod purchase_orders;
pub mod shop_owners;
pub mod shops;
pub mod suppliers;

use crate::config::AppConfig;
use crate::db::DbPool;
use crate::events::EventSender;
use crate::services::{
    avatars::AvatarStorage, customers::CustomerService, employees::EmployeeService,
    invoices::InvoiceService, payment_methods::PaymentMethodService, products::ProductService,
    promotions::PromotionService, purchase_orders::PurchaseOrderService,
    shop_owners::ShopOwnerService, shops::ShopService, suppliers::SupplierService,
};
use std::sync::Arc;

// Re-export AppState so handler modules can import it as crate::handlers::AppState
pub use crate::AppState;

/// Services layer that encapsulates business logic used by HTTP handlers
#[derive(Clone)]
pub struct AppServices {
    pub shop_owners: Arc<ShopOwnerService>,
    pub shops: Arc<ShopService>,
    pub suppliers: Arc<SupplierService>,
    pub products: Arc<ProductService>,
    pub customers: Arc<CustomerService>,
    pub employees: Arc<EmployeeService>,
    pub payment_methods: Arc<PaymentMethodService>,
    pub promotions: Arc<PromotionService>,
    pub invoices: Arc<InvoiceService>,
    pub purchase_orders: Arc<PurchaseOrderService>,
}

impl AppServices {
    pub fn new(db_pool: Arc<DbPool>, event_sender: Arc<EventSender>, config: &AppConfig) -> Self {
        let avatars = AvatarStorage::new(config.upload_dir.clone(), config.max_avatar_bytes);

        Self {
            shop_owners: Arc::new(ShopOwnerService::new(db_pool.clone())),
            shops: Arc::new(ShopService::new(db_pool.clone(), event_sender.clone())),
            suppliers: Arc::new(SupplierService::new(db_pool.clone(), event_sender.clone())),
            products: Arc::new(ProductService::new(db_pool.clone(), event_sender.clone())),
            customers: Arc::new(CustomerService::new(db_pool.clone(), event_sender.clone())),
            employees: Arc::new(EmployeeService::new(
                db_pool.clone(),
                event_sender.clone(),
                avatars,
            )),
            payment_methods: Arc::new(PaymentMethodService::new(db_pool.clone())),
            promotions: Arc::new(PromotionService::new(db_pool.clone(), event_sender.clone())),
            invoices: Arc::new(InvoiceService::new(db_pool.clone(), event_sender.clone())),
            purchase_orders: Arc::new(PurchaseOrderService::new(db_pool, event_sender)),
        }
    }
}
