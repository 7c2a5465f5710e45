use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_products_table::Migration),
            Box::new(m20240101_000002_create_inventory_tables::Migration),
            Box::new(m20240101_000003_create_order_tables::Migration),
            Box::new(m20240101_000004_create_transport_tables::Migration),
            Box::new(m20240101_000005_create_return_tables::Migration),
            Box::new(m20240101_000006_create_sales_records_table::Migration),
        ]
    }
}

mod m20240101_000001_create_products_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_products_table"
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
                        .col(ColumnDef::new(Products::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Products::Sku)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Products::Name).string().not_null())
                        .col(ColumnDef::new(Products::UnitWeight).decimal().not_null())
                        .col(ColumnDef::new(Products::UnitVolume).decimal().not_null())
                        .col(ColumnDef::new(Products::UnitPrice).decimal().not_null())
                        .col(
                            ColumnDef::new(Products::ReorderThreshold)
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
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Products::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Products {
        Table,
        Id,
        Sku,
        Name,
        UnitWeight,
        UnitVolume,
        UnitPrice,
        ReorderThreshold,
        IsActive,
        CreatedAt,
    }
}

mod m20240101_000002_create_inventory_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_inventory_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Batches::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Batches::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Batches::ProductId).uuid().not_null())
                        .col(ColumnDef::new(Batches::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Batches::SupplierName).string().not_null())
                        .col(
                            ColumnDef::new(Batches::QuantityReceived)
                                .integer()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::ManufactureDate).date().not_null())
                        .col(ColumnDef::new(Batches::ExpiryDate).date().null())
                        .col(
                            ColumnDef::new(Batches::ReceivedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Batches::ReceivedBy).uuid().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_batches_product_mfg")
                        .table(Batches::Table)
                        .col(Batches::ProductId)
                        .col(Batches::ManufactureDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Items::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Items::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Items::BatchId).uuid().not_null())
                        .col(
                            ColumnDef::new(Items::Serial)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Items::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Items::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_items_batch_status")
                        .table(Items::Table)
                        .col(Items::BatchId)
                        .col(Items::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ItemEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ItemEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ItemEvents::ItemId).uuid().not_null())
                        .col(ColumnDef::new(ItemEvents::Action).string_len(32).not_null())
                        .col(
                            ColumnDef::new(ItemEvents::OccurredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ItemEvents::Location).string().null())
                        .col(ColumnDef::new(ItemEvents::Notes).string().null())
                        .col(ColumnDef::new(ItemEvents::RecordedBy).uuid().null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_item_events_item")
                        .table(ItemEvents::Table)
                        .col(ItemEvents::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(StockLevels::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockLevels::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockLevels::BatchId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(StockLevels::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(StockLevels::OnHand).integer().not_null())
                        .col(
                            ColumnDef::new(StockLevels::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(StockLevels::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockLevels::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(ItemEvents::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Items::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Batches::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Batches {
        Table,
        Id,
        ProductId,
        WarehouseId,
        SupplierName,
        QuantityReceived,
        ManufactureDate,
        ExpiryDate,
        ReceivedAt,
        ReceivedBy,
    }

    #[derive(Iden)]
    enum Items {
        Table,
        Id,
        BatchId,
        Serial,
        Status,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum ItemEvents {
        Table,
        Id,
        ItemId,
        Action,
        OccurredAt,
        Location,
        Notes,
        RecordedBy,
    }

    #[derive(Iden)]
    enum StockLevels {
        Table,
        Id,
        BatchId,
        WarehouseId,
        OnHand,
        Version,
        UpdatedAt,
    }
}

mod m20240101_000003_create_order_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_order_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Orders::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Orders::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Orders::ExternalOrderId)
                                .string()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Orders::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Orders::PlacedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Orders::CreatedBy).uuid().null())
                        .col(ColumnDef::new(Orders::Notes).string().null())
                        .col(
                            ColumnDef::new(Orders::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Orders::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Orders::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(OrderLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OrderLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(OrderLines::OrderId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::ProductId).uuid().not_null())
                        .col(ColumnDef::new(OrderLines::Quantity).integer().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_order_lines_order")
                        .table(OrderLines::Table)
                        .col(OrderLines::OrderId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(Packages::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Packages::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Packages::OrderId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Packages::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(Packages::Status).string_len(32).not_null())
                        .col(ColumnDef::new(Packages::ItemCount).integer().not_null())
                        .col(ColumnDef::new(Packages::TotalWeight).decimal().not_null())
                        .col(ColumnDef::new(Packages::TotalVolume).decimal().not_null())
                        .col(ColumnDef::new(Packages::TotalValue).decimal().not_null())
                        .col(
                            ColumnDef::new(Packages::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Packages::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(PackageItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PackageItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PackageItems::PackageId).uuid().not_null())
                        .col(ColumnDef::new(PackageItems::ProductId).uuid().not_null())
                        .col(ColumnDef::new(PackageItems::BatchId).uuid().not_null())
                        .col(
                            ColumnDef::new(PackageItems::ItemId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_package_items_package")
                        .table(PackageItems::Table)
                        .col(PackageItems::PackageId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PackageItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Packages::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(OrderLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Orders::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Orders {
        Table,
        Id,
        ExternalOrderId,
        Status,
        PlacedAt,
        CreatedBy,
        Notes,
        CreatedAt,
        UpdatedAt,
        Version,
    }

    #[derive(Iden)]
    enum OrderLines {
        Table,
        Id,
        OrderId,
        ProductId,
        Quantity,
    }

    #[derive(Iden)]
    enum Packages {
        Table,
        Id,
        OrderId,
        WarehouseId,
        Status,
        ItemCount,
        TotalWeight,
        TotalVolume,
        TotalValue,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum PackageItems {
        Table,
        Id,
        PackageId,
        ProductId,
        BatchId,
        ItemId,
    }
}

mod m20240101_000004_create_transport_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_transport_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Transports::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Transports::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transports::PackageId).uuid().not_null())
                        .col(ColumnDef::new(Transports::TransporterId).uuid().not_null())
                        .col(
                            ColumnDef::new(Transports::Direction)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Transports::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Transports::AssignedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Transports::DispatchedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(Transports::DeliveredAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .name("idx_transports_package")
                        .table(Transports::Table)
                        .col(Transports::PackageId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(TransportEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(TransportEvents::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransportEvents::TransportId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransportEvents::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(TransportEvents::OccurredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(TransportEvents::Notes).string().null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(TransportEvents::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Transports::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Transports {
        Table,
        Id,
        PackageId,
        TransporterId,
        Direction,
        Status,
        AssignedAt,
        DispatchedAt,
        DeliveredAt,
    }

    #[derive(Iden)]
    enum TransportEvents {
        Table,
        Id,
        TransportId,
        Status,
        OccurredAt,
        Notes,
    }
}

mod m20240101_000005_create_return_tables {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000005_create_return_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Returns::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Returns::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Returns::PackageId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Returns::Reason).string().not_null())
                        .col(ColumnDef::new(Returns::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Returns::RequestedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Returns::RequestedBy).uuid().null())
                        .col(
                            ColumnDef::new(Returns::ProcessedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Returns::ProcessedBy).uuid().null())
                        .col(
                            ColumnDef::new(Returns::UpdatedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_table(
                    Table::create()
                        .table(ReturnLines::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnLines::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(ReturnLines::ReturnId).uuid().not_null())
                        .col(ColumnDef::new(ReturnLines::ProductId).uuid().not_null())
                        .col(ColumnDef::new(ReturnLines::BatchId).uuid().not_null())
                        .col(ColumnDef::new(ReturnLines::Quantity).integer().not_null())
                        .col(
                            ColumnDef::new(ReturnLines::Restock)
                                .boolean()
                                .not_null()
                                .default(true),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnLines::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Returns::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum Returns {
        Table,
        Id,
        PackageId,
        Reason,
        Status,
        RequestedAt,
        RequestedBy,
        ProcessedAt,
        ProcessedBy,
        UpdatedAt,
    }

    #[derive(Iden)]
    enum ReturnLines {
        Table,
        Id,
        ReturnId,
        ProductId,
        BatchId,
        Quantity,
        Restock,
    }
}

mod m20240101_000006_create_sales_records_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000006_create_sales_records_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SalesRecords::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SalesRecords::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesRecords::PackageId)
                                .uuid()
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(SalesRecords::OrderId).uuid().not_null())
                        .col(ColumnDef::new(SalesRecords::WarehouseId).uuid().not_null())
                        .col(ColumnDef::new(SalesRecords::ItemCount).integer().not_null())
                        .col(ColumnDef::new(SalesRecords::TotalValue).decimal().not_null())
                        .col(
                            ColumnDef::new(SalesRecords::DeliveredAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SalesRecords::ConfirmedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(SalesRecords::ConfirmedBy).string().not_null())
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SalesRecords::Table).to_owned())
                .await
        }
    }

    #[derive(Iden)]
    enum SalesRecords {
        Table,
        Id,
        PackageId,
        OrderId,
        WarehouseId,
        ItemCount,
        TotalValue,
        DeliveredAt,
        ConfirmedAt,
        ConfirmedBy,
    }
}
