pub mod delivery;
pub mod delivery_item;
pub mod inventory_level;
pub mod product;
pub mod receipt;
pub mod receipt_item;
pub mod stock_movement;
pub mod supplier;
pub mod transfer;
pub mod user;
pub mod warehouse;

pub use delivery::Entity as Delivery;
pub use delivery_item::Entity as DeliveryItem;
pub use inventory_level::Entity as InventoryLevel;
pub use product::Entity as Product;
pub use receipt::Entity as Receipt;
pub use receipt_item::Entity as ReceiptItem;
pub use stock_movement::Entity as StockMovement;
pub use supplier::Entity as Supplier;
pub use transfer::Entity as Transfer;
pub use user::Entity as User;
pub use warehouse::Entity as Warehouse;
