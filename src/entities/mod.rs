pub mod customer;
pub mod employee;
pub mod invoice;
pub mod invoice_detail;
pub mod payment_method;
pub mod product;
pub mod promotion;
pub mod purchase_order;
pub mod purchase_order_detail;
pub mod shop;
pub mod shop_owner;
pub mod supplier;
