use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_catalog_tables::Migration),
            Box::new(m20240101_000002_create_receipts_tables::Migration),
            Box::new(m20240101_000003_create_deliveries_tables::Migration),
            Box::new(m20240101_000004_create_transfers_table::Migration),
            Box::new(m20240101_000005_create_inventory_tables::Migration),
            Box::new(m20240101_000006_create_users_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_catalog_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_catalog_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Products::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Products::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::Sku).string().not_null())
                        .col(ColumnDef::new(Products::Description).string().null())
                        .col(ColumnDef::new(Products::Category).string().null())
                        .col(
                            ColumnDef::new(Products::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::ReorderLevel)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Products::IsActive)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .col(
                            ColumnDef::new(Products::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Products::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_products_sku")
                        .table(Products::Table)
                        .col(Products::Sku)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Suppliers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Suppliers::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Suppliers::Name).string().not_null())
                        .col(ColumnDef::new(Suppliers::Email).string().null())
                        .col(ColumnDef::new(Suppliers::Phone).string().null())
                        .col(ColumnDef::new(Suppliers::Address).string().null())
                        .col(
                            ColumnDef::new(Suppliers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Warehouses::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Warehouses::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Warehouses::Name).string().not_null())
                        .col(ColumnDef::new(Warehouses::Location).string().null())
                        .col(
                            ColumnDef::new(Warehouses::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Warehouses::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Suppliers::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Products {
        Table,
        Id,
        Name,
        Sku,
        Description,
        Category,
        UnitPrice,
        ReorderLevel,
        IsActive,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum Suppliers {
        Table,
        Id,
        Name,
        Email,
        Phone,
        Address,
        CreatedAt,
    }

    #[derive(Iden)]
    pub enum Warehouses {
        Table,
        Id,
        Name,
        Location,
        CreatedAt,
    }
}

mod m20240101_000002_create_receipts_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_receipts_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Receipts::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Receipts::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::ReferenceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::SupplierId).big_integer().null())
                        .col(
                            ColumnDef::new(Receipts::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Receipts::ExpectedDate).date().null())
                        .col(
                            ColumnDef::new(Receipts::Status)
                                .string()
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(Receipts::Notes).string().null())
                        .col(ColumnDef::new(Receipts::CreatedBy).big_integer().null())
                        .col(
                            ColumnDef::new(Receipts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Receipts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_status")
                        .table(Receipts::Table)
                        .col(Receipts::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipts_warehouse_id")
                        .table(Receipts::Table)
                        .col(Receipts::WarehouseId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReceiptItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReceiptItems::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceiptItems::ReceiptId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReceiptItems::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReceiptItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(ReceiptItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ReceiptItems::TotalPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(ReceiptItems::ReceivedQuantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_receipt_items_receipt_id")
                        .table(ReceiptItems::Table)
                        .col(ReceiptItems::ReceiptId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReceiptItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Receipts::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Receipts {
        Table,
        Id,
        ReferenceNumber,
        SupplierId,
        WarehouseId,
        ExpectedDate,
        Status,
        Notes,
        CreatedBy,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum ReceiptItems {
        Table,
        Id,
        ReceiptId,
        ProductId,
        Quantity,
        UnitPrice,
        TotalPrice,
        ReceivedQuantity,
    }
}

mod m20240101_000003_create_deliveries_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_deliveries_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Deliveries::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Deliveries::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::ReferenceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Deliveries::Destination).string().not_null())
                        .col(ColumnDef::new(Deliveries::DeliveryDate).date().null())
                        .col(
                            ColumnDef::new(Deliveries::Status)
                                .string()
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(Deliveries::Notes).string().null())
                        .col(
                            ColumnDef::new(Deliveries::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Deliveries::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(DeliveryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(DeliveryItems::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryItems::DeliveryId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(DeliveryItems::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(DeliveryItems::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(DeliveryItems::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_delivery_items_delivery_id")
                        .table(DeliveryItems::Table)
                        .col(DeliveryItems::DeliveryId)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(DeliveryItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Deliveries::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Deliveries {
        Table,
        Id,
        ReferenceNumber,
        WarehouseId,
        Destination,
        DeliveryDate,
        Status,
        Notes,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    pub enum DeliveryItems {
        Table,
        Id,
        DeliveryId,
        ProductId,
        Quantity,
        UnitPrice,
    }
}

mod m20240101_000004_create_transfers_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_transfers_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Transfers::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transfers::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transfers::ReferenceNumber)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transfers::FromWarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transfers::ToWarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transfers::TransferDate).date().null())
                        .col(
                            ColumnDef::new(Transfers::Status)
                                .string()
                                .not_null()
                                .default("draft"),
                        )
                        .col(ColumnDef::new(Transfers::Notes).string().null())
                        .col(
                            ColumnDef::new(Transfers::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Transfers::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Transfers {
        Table,
        Id,
        ReferenceNumber,
        FromWarehouseId,
        ToWarehouseId,
        TransferDate,
        Status,
        Notes,
        CreatedAt,
    }
}

mod m20240101_000005_create_inventory_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryLevels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryLevels::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLevels::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLevels::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryLevels::Quantity)
                                .integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(InventoryLevels::LastUpdated)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            // The upsert in receipt posting conflicts on this pair; it must be unique.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_levels_product_warehouse")
                        .table(InventoryLevels::Table)
                        .col(InventoryLevels::ProductId)
                        .col(InventoryLevels::WarehouseId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockMovements::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockMovements::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ProductId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::WarehouseId)
                                .big_integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::MovementType)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::Quantity)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ReferenceType)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::ReferenceId)
                                .big_integer()
                                .null(),
                        )
                        .col(ColumnDef::new(StockMovements::Notes).string().null())
                        .col(
                            ColumnDef::new(StockMovements::CreatedBy)
                                .big_integer()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockMovements::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_product_id")
                        .table(StockMovements::Table)
                        .col(StockMovements::ProductId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_movements_created_at")
                        .table(StockMovements::Table)
                        .col(StockMovements::CreatedAt)
                        .to_owned(),
                )
                .await?;

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockMovements::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(InventoryLevels::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum InventoryLevels {
        Table,
        Id,
        ProductId,
        WarehouseId,
        Quantity,
        LastUpdated,
    }

    #[derive(Iden)]
    pub enum StockMovements {
        Table,
        Id,
        ProductId,
        WarehouseId,
        MovementType,
        Quantity,
        ReferenceType,
        ReferenceId,
        Notes,
        CreatedBy,
        CreatedAt,
    }
}

mod m20240101_000006_create_users_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_users_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Users::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Users::Id)
                                .big_integer()
                                .primary_key()
                                .auto_increment()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Users::ClerkUserId).string().not_null())
                        .col(ColumnDef::new(Users::Email).string().null())
                        .col(ColumnDef::new(Users::FirstName).string().null())
                        .col(ColumnDef::new(Users::LastName).string().null())
                        .col(ColumnDef::new(Users::Username).string().null())
                        .col(ColumnDef::new(Users::ProfileImageUrl).string().null())
                        .col(
                            ColumnDef::new(Users::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Users::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            // Webhook upserts conflict on the external id; it must be unique.
            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_users_clerk_user_id")
                        .table(Users::Table)
                        .col(Users::ClerkUserId)
                        .unique()
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Users::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    pub enum Users {
        Table,
        Id,
        ClerkUserId,
        Email,
        FirstName,
        LastName,
        Username,
        ProfileImageUrl,
        CreatedAt,
        UpdatedAt,
    }
}
