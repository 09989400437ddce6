pub mod common;
pub mod deliveries;
pub mod products;
pub mod receipts;
pub mod reports;
pub mod suppliers;
pub mod transfers;
pub mod warehouses;
pub mod webhooks;
