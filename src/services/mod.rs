pub mod deliveries;
pub mod products;
pub mod receipts;
pub mod reports;
pub mod suppliers;
pub mod transfers;
pub mod users;
pub mod warehouses;

pub use deliveries::DeliveryService;
pub use products::ProductService;
pub use receipts::ReceiptService;
pub use reports::ReportService;
pub use suppliers::SupplierService;
pub use transfers::TransferService;
pub use users::UserService;
pub use warehouses::WarehouseService;
