use sea_orm_migration::prelude::extension::postgres::Type;
use sea_orm_migration::prelude::*;

#[derive(DeriveIden)]
enum CashAdjustments {
    Table,
    Id,
    CashRegisterSessionId,
    Type,
    Amount,
    Reason,
    AdjustedAt,
    CreatedAt,
}

#[derive(DeriveIden)]
enum CashRegisterSessions {
    Table,
    Id,
}

/// Manual paid-in / paid-out movements of an open till.
/// Deployments may run without this table; the service probes for it at startup.
#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(
                Type::create()
                    .as_enum(Alias::new("cash_adjustment_type"))
                    .values(vec![Alias::new("add"), Alias::new("remove")])
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashAdjustments::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashAdjustments::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashAdjustments::CashRegisterSessionId)
                            .uuid()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashAdjustments::Type)
                            .custom(Alias::new("cash_adjustment_type"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashAdjustments::Amount).big_integer().not_null())
                    .col(ColumnDef::new(CashAdjustments::Reason).text().not_null())
                    .col(
                        ColumnDef::new(CashAdjustments::AdjustedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashAdjustments::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_cash_adjustments_session")
                            .from(CashAdjustments::Table, CashAdjustments::CashRegisterSessionId)
                            .to(CashRegisterSessions::Table, CashRegisterSessions::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_cash_adjustments_session_adjusted_at")
                    .table(CashAdjustments::Table)
                    .col(CashAdjustments::CashRegisterSessionId)
                    .col(CashAdjustments::AdjustedAt)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(CashAdjustments::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_type(
                Type::drop()
                    .if_exists()
                    .name(Alias::new("cash_adjustment_type"))
                    .to_owned(),
            )
            .await?;
        Ok(())
    }
}
