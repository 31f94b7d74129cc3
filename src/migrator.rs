use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_inventory_items_table::Migration),
            Box::new(m20240101_000002_create_consumption_events_table::Migration),
            Box::new(m20240101_000003_create_tasks_table::Migration),
            Box::new(m20240101_000004_create_operation_logs_table::Migration),
        ]
    }
}

// Migration implementations

mod m20240101_000001_create_inventory_items_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_inventory_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(InventoryItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(InventoryItems::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(InventoryItems::Name).string().not_null())
                        .col(
                            ColumnDef::new(InventoryItems::Quantity)
                                .decimal_len(12, 3)
                                .not_null()
                                .default(0)
                                .check(Expr::col(InventoryItems::Quantity).gte(0)),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::Unit)
                                .string()
                                .not_null()
                                .check(
                                    Expr::col(InventoryItems::Unit)
                                        .is_in(["PIECES", "KG", "LITERS", "GRAMS"]),
                                ),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::Category)
                                .string()
                                .not_null()
                                .check(Expr::col(InventoryItems::Category).is_in([
                                    "DAIRY",
                                    "VEGETABLES",
                                    "FRUIT",
                                    "MEAT",
                                    "FISH",
                                    "PRESERVES",
                                    "BEVERAGES",
                                    "OTHER",
                                ])),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::Location)
                                .string()
                                .not_null()
                                .check(
                                    Expr::col(InventoryItems::Location)
                                        .is_in(["FRIDGE", "FREEZER", "PANTRY", "CELLAR"]),
                                ),
                        )
                        .col(ColumnDef::new(InventoryItems::ExpirationDate).date().null())
                        .col(ColumnDef::new(InventoryItems::OpenedDate).date().null())
                        .col(
                            ColumnDef::new(InventoryItems::PurchasePrice)
                                .decimal_len(10, 2)
                                .null()
                                .check(
                                    Expr::col(InventoryItems::PurchasePrice)
                                        .is_null()
                                        .or(Expr::col(InventoryItems::PurchasePrice).gte(0)),
                                ),
                        )
                        .col(ColumnDef::new(InventoryItems::Supplier).string().null())
                        .col(ColumnDef::new(InventoryItems::LotCode).string().null())
                        .col(
                            ColumnDef::new(InventoryItems::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(InventoryItems::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(InventoryItems::UpdatedBy).string().not_null())
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_expiration_date")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::ExpirationDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_inventory_items_category")
                        .table(InventoryItems::Table)
                        .col(InventoryItems::Category)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(InventoryItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    pub(super) enum InventoryItems {
        Table,
        Id,
        Name,
        Quantity,
        Unit,
        Category,
        Location,
        ExpirationDate,
        OpenedDate,
        PurchasePrice,
        Supplier,
        LotCode,
        CreatedAt,
        UpdatedAt,
        UpdatedBy,
    }
}

mod m20240101_000002_create_consumption_events_table {

    use super::m20240101_000001_create_inventory_items_table::InventoryItems;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_consumption_events_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ConsumptionEvents::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ConsumptionEvents::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ConsumptionEvents::ItemId).integer().not_null())
                        .col(
                            ColumnDef::new(ConsumptionEvents::Quantity)
                                .decimal_len(12, 3)
                                .not_null()
                                .check(Expr::col(ConsumptionEvents::Quantity).gt(0)),
                        )
                        .col(
                            ColumnDef::new(ConsumptionEvents::ConsumedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ConsumptionEvents::Reason)
                                .string()
                                .not_null()
                                .check(
                                    Expr::col(ConsumptionEvents::Reason)
                                        .is_in(["CONSUMED", "EXPIRED", "DISCARDED"]),
                                ),
                        )
                        .col(ColumnDef::new(ConsumptionEvents::Note).string().null())
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_consumption_events_item_id")
                                .from(ConsumptionEvents::Table, ConsumptionEvents::ItemId)
                                .to(InventoryItems::Table, InventoryItems::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consumption_events_item_id")
                        .table(ConsumptionEvents::Table)
                        .col(ConsumptionEvents::ItemId)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_consumption_events_consumed_at")
                        .table(ConsumptionEvents::Table)
                        .col(ConsumptionEvents::ConsumedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ConsumptionEvents::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ConsumptionEvents {
        Table,
        Id,
        ItemId,
        Quantity,
        ConsumedAt,
        Reason,
        Note,
    }
}

mod m20240101_000003_create_tasks_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_tasks_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            // Recurrence flag and frequency are set together or not at all
            let recurrence_pairing = Expr::col(Tasks::IsRecurring)
                .eq(true)
                .and(Expr::col(Tasks::Recurrence).is_not_null())
                .or(Expr::col(Tasks::IsRecurring)
                    .eq(false)
                    .and(Expr::col(Tasks::Recurrence).is_null()));

            manager
                .create_table(
                    Table::create()
                        .table(Tasks::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Tasks::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Tasks::Title).string().not_null())
                        .col(ColumnDef::new(Tasks::Description).text().null())
                        .col(
                            ColumnDef::new(Tasks::Priority)
                                .string()
                                .not_null()
                                .default("MEDIUM")
                                .check(Expr::col(Tasks::Priority).is_in(["HIGH", "MEDIUM", "LOW"])),
                        )
                        .col(
                            ColumnDef::new(Tasks::Status)
                                .string()
                                .not_null()
                                .default("TODO")
                                .check(Expr::col(Tasks::Status).is_in([
                                    "TODO",
                                    "IN_PROGRESS",
                                    "DONE",
                                    "CANCELLED",
                                ])),
                        )
                        .col(ColumnDef::new(Tasks::DueDate).date().null())
                        .col(ColumnDef::new(Tasks::Assignee).string().null())
                        .col(
                            ColumnDef::new(Tasks::IsRecurring)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Tasks::Recurrence)
                                .string()
                                .null()
                                .check(
                                    Expr::col(Tasks::Recurrence)
                                        .is_in(["DAILY", "WEEKLY", "MONTHLY"]),
                                ),
                        )
                        .col(ColumnDef::new(Tasks::ParentTaskId).integer().null())
                        .col(ColumnDef::new(Tasks::CreatedBy).string().not_null())
                        .col(
                            ColumnDef::new(Tasks::CreatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Tasks::UpdatedBy).string().not_null())
                        .col(
                            ColumnDef::new(Tasks::UpdatedAt)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .check(recurrence_pairing)
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_tasks_parent_task_id")
                                .from(Tasks::Table, Tasks::ParentTaskId)
                                .to(Tasks::Table, Tasks::Id)
                                .on_delete(ForeignKeyAction::SetNull),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tasks_status")
                        .table(Tasks::Table)
                        .col(Tasks::Status)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tasks_due_date")
                        .table(Tasks::Table)
                        .col(Tasks::DueDate)
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_tasks_updated_at")
                        .table(Tasks::Table)
                        .col(Tasks::UpdatedAt)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Tasks::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum Tasks {
        Table,
        Id,
        Title,
        Description,
        Priority,
        Status,
        DueDate,
        Assignee,
        IsRecurring,
        Recurrence,
        ParentTaskId,
        CreatedBy,
        CreatedAt,
        UpdatedBy,
        UpdatedAt,
    }
}

mod m20240101_000004_create_operation_logs_table {

    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000004_create_operation_logs_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(OperationLogs::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(OperationLogs::Id)
                                .integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(OperationLogs::Operation).string().not_null())
                        .col(ColumnDef::new(OperationLogs::TargetTable).string().not_null())
                        .col(ColumnDef::new(OperationLogs::TargetId).integer().not_null())
                        .col(ColumnDef::new(OperationLogs::Details).json().not_null())
                        .col(ColumnDef::new(OperationLogs::Actor).string().not_null())
                        .col(
                            ColumnDef::new(OperationLogs::LoggedAt)
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
                        .name("idx_operation_logs_target")
                        .table(OperationLogs::Table)
                        .col(OperationLogs::TargetTable)
                        .col(OperationLogs::TargetId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(OperationLogs::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum OperationLogs {
        Table,
        Id,
        Operation,
        TargetTable,
        TargetId,
        Details,
        Actor,
        LoggedAt,
    }
}
