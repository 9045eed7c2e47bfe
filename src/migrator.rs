use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_parts_tables::Migration),
            Box::new(m20240101_000002_create_stock_transaction_tables::Migration),
            Box::new(m20240101_000003_create_sequence_counters_table::Migration),
            Box::new(m20240101_000004_create_assets_table::Migration),
        ]
    }
}

mod m20240101_000001_create_parts_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_parts_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Parts::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Parts::Id).uuid().primary_key().not_null())
                        .col(
                            ColumnDef::new(Parts::PartNumber)
                                .string_len(64)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(Parts::Sku)
                                .string_len(96)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Parts::Name).string().not_null())
                        .col(ColumnDef::new(Parts::Description).text().null())
                        .col(ColumnDef::new(Parts::Category).string_len(64).not_null())
                        .col(ColumnDef::new(Parts::MaterialCode).string_len(96).null())
                        .col(ColumnDef::new(Parts::Supplier).string().null())
                        .col(
                            ColumnDef::new(Parts::UnitOfMeasure)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Parts::Location).string().null())
                        .col(
                            ColumnDef::new(Parts::Quantity)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Parts::MinStockLevel)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Parts::MaxStockLevel).decimal_len(16, 4).null())
                        .col(
                            ColumnDef::new(Parts::UnitPrice)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(Parts::TotalValue)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Parts::Department).string_len(64).not_null())
                        .col(
                            ColumnDef::new(Parts::TotalConsumed)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(Parts::LastUsedDate).timestamp_with_time_zone().null())
                        .col(ColumnDef::new(Parts::Status).string_len(32).not_null())
                        .col(
                            ColumnDef::new(Parts::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(Parts::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Parts::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_parts_department", Parts::Department),
                ("idx_parts_category", Parts::Category),
                ("idx_parts_created_at", Parts::CreatedAt),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Parts::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(PartAssetLinks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(PartAssetLinks::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(ColumnDef::new(PartAssetLinks::PartId).uuid().not_null())
                        .col(ColumnDef::new(PartAssetLinks::AssetId).uuid().not_null())
                        .col(ColumnDef::new(PartAssetLinks::AssetName).string().not_null())
                        .col(
                            ColumnDef::new(PartAssetLinks::AssetDepartment)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PartAssetLinks::QuantityInAsset)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(PartAssetLinks::Criticality)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(PartAssetLinks::LastUsed)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(PartAssetLinks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_part_asset_links_part")
                                .from(PartAssetLinks::Table, PartAssetLinks::PartId)
                                .to(Parts::Table, Parts::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("uq_part_asset_links_part_asset")
                        .table(PartAssetLinks::Table)
                        .col(PartAssetLinks::PartId)
                        .col(PartAssetLinks::AssetId)
                        .unique()
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_part_asset_links_department")
                        .table(PartAssetLinks::Table)
                        .col(PartAssetLinks::AssetDepartment)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(PartAssetLinks::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(Parts::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum Parts {
        Table,
        Id,
        PartNumber,
        Sku,
        Name,
        Description,
        Category,
        MaterialCode,
        Supplier,
        UnitOfMeasure,
        Location,
        Quantity,
        MinStockLevel,
        MaxStockLevel,
        UnitPrice,
        TotalValue,
        Department,
        TotalConsumed,
        LastUsedDate,
        Status,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum PartAssetLinks {
        Table,
        Id,
        PartId,
        AssetId,
        AssetName,
        AssetDepartment,
        QuantityInAsset,
        Criticality,
        LastUsed,
        CreatedAt,
    }
}

mod m20240101_000002_create_stock_transaction_tables {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_stock_transaction_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(StockTransactions::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransactions::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::TransactionNumber)
                                .string_len(32)
                                .not_null()
                                .unique_key(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::TransactionType)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::TransactionDate)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Description)
                                .text()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::ReferenceNumber)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Priority)
                                .string_len(16)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Department)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Status)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::TotalAmount)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockTransactions::Notes).text().null())
                        .col(
                            ColumnDef::new(StockTransactions::CreatedBy)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CreatedByName)
                                .string()
                                .not_null(),
                        )
                        .col(ColumnDef::new(StockTransactions::ApprovedBy).string().null())
                        .col(
                            ColumnDef::new(StockTransactions::ApprovedByName)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(StockTransactions::CompletedBy).string().null())
                        .col(
                            ColumnDef::new(StockTransactions::CompletedByName)
                                .string()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CompletedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CancelledAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::Version)
                                .integer()
                                .not_null()
                                .default(1),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactions::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_stock_transactions_department", StockTransactions::Department),
                ("idx_stock_transactions_status", StockTransactions::Status),
                (
                    "idx_stock_transactions_date",
                    StockTransactions::TransactionDate,
                ),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(StockTransactions::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            manager
                .create_table(
                    Table::create()
                        .table(StockTransactionItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(StockTransactionItems::Id)
                                .uuid()
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::TransactionId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::LineNo)
                                .integer()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::PartId)
                                .uuid()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::PartNumber)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::PartName)
                                .string()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::Quantity)
                                .decimal_len(16, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::UnitCost)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(StockTransactionItems::TotalCost)
                                .decimal_len(16, 4)
                                .not_null()
                                .default(0),
                        )
                        .col(ColumnDef::new(StockTransactionItems::Notes).text().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_stock_transaction_items_transaction")
                                .from(
                                    StockTransactionItems::Table,
                                    StockTransactionItems::TransactionId,
                                )
                                .to(StockTransactions::Table, StockTransactions::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transaction_items_part")
                        .table(StockTransactionItems::Table)
                        .col(StockTransactionItems::PartId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_stock_transaction_items_transaction")
                        .table(StockTransactionItems::Table)
                        .col(StockTransactionItems::TransactionId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(StockTransactionItems::Table).to_owned())
                .await?;
            manager
                .drop_table(Table::drop().table(StockTransactions::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum StockTransactions {
        Table,
        Id,
        TransactionNumber,
        TransactionType,
        TransactionDate,
        Description,
        ReferenceNumber,
        Priority,
        Department,
        Status,
        TotalAmount,
        Notes,
        CreatedBy,
        CreatedByName,
        ApprovedBy,
        ApprovedByName,
        ApprovedAt,
        CompletedBy,
        CompletedByName,
        CompletedAt,
        CancelledAt,
        Version,
        CreatedAt,
        UpdatedAt,
    }

    #[derive(DeriveIden)]
    enum StockTransactionItems {
        Table,
        Id,
        TransactionId,
        LineNo,
        PartId,
        PartNumber,
        PartName,
        Quantity,
        UnitCost,
        TotalCost,
        Notes,
    }
}

mod m20240101_000003_create_sequence_counters_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_sequence_counters_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(SequenceCounters::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(SequenceCounters::Key)
                                .string_len(32)
                                .primary_key()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(SequenceCounters::Value)
                                .big_integer()
                                .not_null()
                                .default(0),
                        )
                        .col(
                            ColumnDef::new(SequenceCounters::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(SequenceCounters::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum SequenceCounters {
        Table,
        Key,
        Value,
        UpdatedAt,
    }
}

/// The asset register belongs to another subsystem; the table is created here
/// only when absent so standalone deployments and tests have something to read.
mod m20240101_000004_create_assets_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_assets_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Assets::Table)
                        .if_not_exists()
                        .col(ColumnDef::new(Assets::Id).uuid().primary_key().not_null())
                        .col(ColumnDef::new(Assets::Name).string().not_null())
                        .col(ColumnDef::new(Assets::Department).string_len(64).not_null())
                        .col(ColumnDef::new(Assets::PartsBom).json().null())
                        .col(
                            ColumnDef::new(Assets::IsDeleted)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Assets::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(Assets::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, _manager: &SchemaManager) -> Result<(), DbErr> {
            // Owned by the asset subsystem.
            Ok(())
        }
    }

    #[derive(DeriveIden)]
    enum Assets {
        Table,
        Id,
        Name,
        Department,
        PartsBom,
        IsDeleted,
        CreatedAt,
        UpdatedAt,
    }
}
