use anyhow::Result;
use sea_orm::{ConnectOptions, Database};
use sea_orm_migration::prelude::*;
use std::time::Duration;
use tracing::{error, info};

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![
            Box::new(m20240101_000001_create_users_table::Migration),
            Box::new(m20240101_000002_create_returns_table::Migration),
            Box::new(m20240101_000003_create_return_items_table::Migration),
        ]
    }
}

mod m20240101_000001_create_users_table {
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000001_create_users_table"
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
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(
                            ColumnDef::new(Users::Username)
                                .string_len(150)
                                .not_null()
                                .unique_key(),
                        )
                        .col(ColumnDef::new(Users::Name).string_len(120).not_null())
                        .col(ColumnDef::new(Users::PasswordHash).text().not_null())
                        .col(ColumnDef::new(Users::Role).string_len(16).not_null())
                        .col(
                            ColumnDef::new(Users::IsActive)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .col(
                            ColumnDef::new(Users::JoinedAt)
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
                        .name("idx_users_role")
                        .table(Users::Table)
                        .col(Users::Role)
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

    #[derive(DeriveIden)]
    pub enum Users {
        Table,
        Id,
        Username,
        Name,
        PasswordHash,
        Role,
        IsActive,
        JoinedAt,
    }
}

mod m20240101_000002_create_returns_table {
    use super::m20240101_000001_create_users_table::Users;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000002_create_returns_table"
        }
    }

    fn approver_fk(name: &str, column: Returns) -> ForeignKeyCreateStatement {
        ForeignKey::create()
            .name(name)
            .from(Returns::Table, column)
            .to(Users::Table, Users::Id)
            .on_delete(ForeignKeyAction::SetNull)
            .to_owned()
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(Returns::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(Returns::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(Returns::RepName).string_len(120).not_null())
                        .col(ColumnDef::new(Returns::DateSubmitted).date().not_null())
                        .col(ColumnDef::new(Returns::OrderNumber).string_len(64).not_null())
                        .col(
                            ColumnDef::new(Returns::CustomerName)
                                .string_len(200)
                                .not_null(),
                        )
                        .col(ColumnDef::new(Returns::DateShipped).date().null())
                        .col(ColumnDef::new(Returns::ReturnType).string_len(64).not_null())
                        .col(ColumnDef::new(Returns::AdvisedCustomer).string_len(32).null())
                        .col(ColumnDef::new(Returns::AdditionalNotes).text().null())
                        .col(
                            ColumnDef::new(Returns::Status)
                                .string_len(32)
                                .not_null()
                                .default("Pending"),
                        )
                        .col(ColumnDef::new(Returns::CreatedBy).big_integer().not_null())
                        .col(
                            ColumnDef::new(Returns::DateCreated)
                                .timestamp_with_time_zone()
                                .not_null(),
                        )
                        .col(ColumnDef::new(Returns::WhApprovedBy).big_integer().null())
                        .col(
                            ColumnDef::new(Returns::WhApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Returns::MgrApprovedBy).big_integer().null())
                        .col(
                            ColumnDef::new(Returns::MgrApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .col(ColumnDef::new(Returns::ApprovedBy).big_integer().null())
                        .col(
                            ColumnDef::new(Returns::ApprovedAt)
                                .timestamp_with_time_zone()
                                .null(),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_returns_created_by")
                                .from(Returns::Table, Returns::CreatedBy)
                                .to(Users::Table, Users::Id)
                                .on_delete(ForeignKeyAction::Restrict),
                        )
                        .foreign_key(&mut approver_fk(
                            "fk_returns_wh_approved_by",
                            Returns::WhApprovedBy,
                        ))
                        .foreign_key(&mut approver_fk(
                            "fk_returns_mgr_approved_by",
                            Returns::MgrApprovedBy,
                        ))
                        .foreign_key(&mut approver_fk(
                            "fk_returns_approved_by",
                            Returns::ApprovedBy,
                        ))
                        .to_owned(),
                )
                .await?;

            for (name, column) in [
                ("idx_returns_status", Returns::Status),
                ("idx_returns_created_by", Returns::CreatedBy),
                ("idx_returns_date_submitted", Returns::DateSubmitted),
            ] {
                manager
                    .create_index(
                        Index::create()
                            .if_not_exists()
                            .name(name)
                            .table(Returns::Table)
                            .col(column)
                            .to_owned(),
                    )
                    .await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(Returns::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden, Clone, Copy)]
    pub enum Returns {
        Table,
        Id,
        RepName,
        DateSubmitted,
        OrderNumber,
        CustomerName,
        DateShipped,
        ReturnType,
        AdvisedCustomer,
        AdditionalNotes,
        Status,
        CreatedBy,
        DateCreated,
        WhApprovedBy,
        WhApprovedAt,
        MgrApprovedBy,
        MgrApprovedAt,
        ApprovedBy,
        ApprovedAt,
    }
}

mod m20240101_000003_create_return_items_table {
    use super::m20240101_000002_create_returns_table::Returns;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240101_000003_create_return_items_table"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .create_table(
                    Table::create()
                        .table(ReturnItems::Table)
                        .if_not_exists()
                        .col(
                            ColumnDef::new(ReturnItems::Id)
                                .big_integer()
                                .not_null()
                                .auto_increment()
                                .primary_key(),
                        )
                        .col(ColumnDef::new(ReturnItems::ReturnId).big_integer().not_null())
                        .col(
                            ColumnDef::new(ReturnItems::ProductCode)
                                .string_len(64)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::ProductDesc)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::PricePerUnit)
                                .decimal_len(14, 4)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::Quantity)
                                .decimal_len(14, 3)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::CreditAmount)
                                .decimal_len(14, 2)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::ProductReturning)
                                .string_len(32)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::ReasonForReturn)
                                .string_len(255)
                                .not_null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::FollowUpAction)
                                .string_len(255)
                                .null(),
                        )
                        .col(
                            ColumnDef::new(ReturnItems::SupplierCredit)
                                .boolean()
                                .not_null()
                                .default(false),
                        )
                        .foreign_key(
                            ForeignKey::create()
                                .name("fk_return_items_return_id")
                                .from(ReturnItems::Table, ReturnItems::ReturnId)
                                .to(Returns::Table, Returns::Id)
                                .on_delete(ForeignKeyAction::Cascade),
                        )
                        .to_owned(),
                )
                .await?;

            manager
                .create_index(
                    Index::create()
                        .if_not_exists()
                        .name("idx_return_items_return_id")
                        .table(ReturnItems::Table)
                        .col(ReturnItems::ReturnId)
                        .to_owned(),
                )
                .await
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            manager
                .drop_table(Table::drop().table(ReturnItems::Table).to_owned())
                .await
        }
    }

    #[derive(DeriveIden)]
    enum ReturnItems {
        Table,
        Id,
        ReturnId,
        ProductCode,
        ProductDesc,
        PricePerUnit,
        Quantity,
        CreditAmount,
        ProductReturning,
        ReasonForReturn,
        FollowUpAction,
        SupplierCredit,
    }
}

/// Connects to `db_url` and applies every pending migration.
pub async fn run_migration(db_url: &str) -> Result<()> {
    info!("Setting up database connection for migrations");

    let mut opt = ConnectOptions::new(db_url);
    opt.max_connections(2)
        .min_connections(1)
        .connect_timeout(Duration::from_secs(30))
        .acquire_timeout(Duration::from_secs(30))
        .sqlx_logging(false);

    let db = Database::connect(opt).await?;

    match Migrator::up(&db, None).await {
        Ok(_) => {
            info!("Migrations applied");
            Ok(())
        }
        Err(e) => {
            error!("Migration failed: {}", e);
            Err(e.into())
        }
    }
}
