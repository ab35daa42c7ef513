use sea_orm_migration::prelude::extension::postgres::{Type, TypeCreateStatement};
use sea_orm_migration::prelude::*;
use sea_orm_migration::sea_orm::Statement;

#[derive(DeriveIden)]
enum CashRegisterSessions {
    Table,
    Id,
    OpenedAt,
    ClosedAt,
    OpeningBalance,
    CalculatedSales,
    ExpectedInCash,
    ClosingBalanceInformed,
    Difference,
    NotesOpening,
    NotesClosing,
    Status,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Tables {
    Table,
    Id,
    Name,
    Capacity,
    Status,
    CurrentOrderId,
    ReservationDetails,
    CreatedAt,
}

#[derive(DeriveIden)]
enum Orders {
    Table,
    Id,
    CustomerId,
    CustomerName,
    CustomerPhone,
    CustomerAddress,
    Notes,
    TotalAmount,
    Status,
    OrderType,
    TableId,
    PaymentMethod,
    AmountPaid,
    ChangeDue,
    CashRegisterSessionId,
    OrderTime,
    LastStatusChangeTime,
    NextAutoTransitionTime,
    AutoProgress,
    CurrentProgressPercent,
    CreatedAt,
}

#[derive(DeriveIden)]
enum OrderItems {
    Table,
    Id,
    OrderId,
    MenuItemId,
    Quantity,
    Name,
    Price,
    SelectedSizeId,
    SelectedCrustId,
    IsHalfAndHalf,
    FirstHalfFlavor,
    SecondHalfFlavor,
    CreatedAt,
}

fn create_enum(name: &str, values: &[&str]) -> TypeCreateStatement {
    Type::create()
        .as_enum(Alias::new(name))
        .values(values.iter().map(|v| Alias::new(*v)))
        .to_owned()
}

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .create_type(create_enum(
                "order_status",
                &[
                    "pending",
                    "preparing",
                    "ready_for_pickup",
                    "out_for_delivery",
                    "delivered",
                    "cancelled",
                ],
            ))
            .await?;
        manager
            .create_type(create_enum("order_type", &["table", "delivery", "counter"]))
            .await?;
        manager
            .create_type(create_enum(
                "payment_method",
                &["cash", "debit_card", "credit_card", "pix", "multiple"],
            ))
            .await?;
        manager
            .create_type(create_enum(
                "table_status",
                &["available", "occupied", "reserved", "needs_cleaning"],
            ))
            .await?;
        manager
            .create_type(create_enum("cash_session_status", &["open", "closed"]))
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(CashRegisterSessions::Table)
                    .if_not_exists()
                    .col(
                        ColumnDef::new(CashRegisterSessions::Id)
                            .uuid()
                            .not_null()
                            .primary_key(),
                    )
                    .col(
                        ColumnDef::new(CashRegisterSessions::OpenedAt)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashRegisterSessions::ClosedAt)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(CashRegisterSessions::OpeningBalance)
                            .big_integer()
                            .not_null(),
                    )
                    .col(ColumnDef::new(CashRegisterSessions::CalculatedSales).big_integer().null())
                    .col(ColumnDef::new(CashRegisterSessions::ExpectedInCash).big_integer().null())
                    .col(
                        ColumnDef::new(CashRegisterSessions::ClosingBalanceInformed)
                            .big_integer()
                            .null(),
                    )
                    .col(ColumnDef::new(CashRegisterSessions::Difference).big_integer().null())
                    .col(ColumnDef::new(CashRegisterSessions::NotesOpening).text().null())
                    .col(ColumnDef::new(CashRegisterSessions::NotesClosing).text().null())
                    .col(
                        ColumnDef::new(CashRegisterSessions::Status)
                            .custom(Alias::new("cash_session_status"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(CashRegisterSessions::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        // At most one open till. Services check first; this index settles races.
        let stmt = Statement::from_string(
            manager.get_database_backend(),
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_cash_register_sessions_single_open \
             ON cash_register_sessions (status) WHERE status = 'open'"
                .to_owned(),
        );
        manager.get_connection().execute(stmt).await?;

        manager
            .create_table(
                Table::create()
                    .table(Tables::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Tables::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Tables::Name).string_len(100).not_null())
                    .col(ColumnDef::new(Tables::Capacity).integer().not_null())
                    .col(
                        ColumnDef::new(Tables::Status)
                            .custom(Alias::new("table_status"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Tables::CurrentOrderId).uuid().null())
                    .col(ColumnDef::new(Tables::ReservationDetails).json_binary().null())
                    .col(
                        ColumnDef::new(Tables::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(Orders::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(Orders::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(Orders::CustomerId).uuid().null())
                    .col(ColumnDef::new(Orders::CustomerName).string_len(255).not_null())
                    .col(ColumnDef::new(Orders::CustomerPhone).string_len(50).null())
                    .col(ColumnDef::new(Orders::CustomerAddress).text().null())
                    .col(ColumnDef::new(Orders::Notes).text().null())
                    .col(ColumnDef::new(Orders::TotalAmount).big_integer().not_null())
                    .col(
                        ColumnDef::new(Orders::Status)
                            .custom(Alias::new("order_status"))
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::OrderType)
                            .custom(Alias::new("order_type"))
                            .not_null(),
                    )
                    .col(ColumnDef::new(Orders::TableId).uuid().null())
                    .col(
                        ColumnDef::new(Orders::PaymentMethod)
                            .custom(Alias::new("payment_method"))
                            .null(),
                    )
                    .col(ColumnDef::new(Orders::AmountPaid).big_integer().null())
                    .col(ColumnDef::new(Orders::ChangeDue).big_integer().null())
                    .col(ColumnDef::new(Orders::CashRegisterSessionId).uuid().null())
                    .col(
                        ColumnDef::new(Orders::OrderTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::LastStatusChangeTime)
                            .timestamp_with_time_zone()
                            .not_null(),
                    )
                    .col(
                        ColumnDef::new(Orders::NextAutoTransitionTime)
                            .timestamp_with_time_zone()
                            .null(),
                    )
                    .col(
                        ColumnDef::new(Orders::AutoProgress)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(
                        ColumnDef::new(Orders::CurrentProgressPercent)
                            .integer()
                            .not_null()
                            .default(0),
                    )
                    .col(
                        ColumnDef::new(Orders::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_table")
                            .from(Orders::Table, Orders::TableId)
                            .to(Tables::Table, Tables::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_orders_cash_register_session")
                            .from(Orders::Table, Orders::CashRegisterSessionId)
                            .to(CashRegisterSessions::Table, CashRegisterSessions::Id)
                            .on_delete(ForeignKeyAction::SetNull),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_order_time")
                    .table(Orders::Table)
                    .col(Orders::OrderTime)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_status")
                    .table(Orders::Table)
                    .col(Orders::Status)
                    .to_owned(),
            )
            .await?;
        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_orders_cash_register_session")
                    .table(Orders::Table)
                    .col(Orders::CashRegisterSessionId)
                    .to_owned(),
            )
            .await?;

        manager
            .create_table(
                Table::create()
                    .table(OrderItems::Table)
                    .if_not_exists()
                    .col(ColumnDef::new(OrderItems::Id).uuid().not_null().primary_key())
                    .col(ColumnDef::new(OrderItems::OrderId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::MenuItemId).uuid().not_null())
                    .col(ColumnDef::new(OrderItems::Quantity).integer().not_null())
                    .col(ColumnDef::new(OrderItems::Name).string_len(255).not_null())
                    .col(ColumnDef::new(OrderItems::Price).big_integer().not_null())
                    .col(ColumnDef::new(OrderItems::SelectedSizeId).string_len(100).null())
                    .col(ColumnDef::new(OrderItems::SelectedCrustId).string_len(100).null())
                    .col(
                        ColumnDef::new(OrderItems::IsHalfAndHalf)
                            .boolean()
                            .not_null()
                            .default(false),
                    )
                    .col(ColumnDef::new(OrderItems::FirstHalfFlavor).json_binary().null())
                    .col(ColumnDef::new(OrderItems::SecondHalfFlavor).json_binary().null())
                    .col(
                        ColumnDef::new(OrderItems::CreatedAt)
                            .timestamp_with_time_zone()
                            .not_null()
                            .default(Expr::cust("NOW()")),
                    )
                    .foreign_key(
                        ForeignKey::create()
                            .name("fk_order_items_order")
                            .from(OrderItems::Table, OrderItems::OrderId)
                            .to(Orders::Table, Orders::Id)
                            .on_delete(ForeignKeyAction::Cascade),
                    )
                    .to_owned(),
            )
            .await?;

        manager
            .create_index(
                Index::create()
                    .if_not_exists()
                    .name("idx_order_items_order_id")
                    .table(OrderItems::Table)
                    .col(OrderItems::OrderId)
                    .to_owned(),
            )
            .await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        manager
            .drop_table(Table::drop().table(OrderItems::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Orders::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(Table::drop().table(Tables::Table).if_exists().to_owned())
            .await?;
        manager
            .drop_table(
                Table::drop()
                    .table(CashRegisterSessions::Table)
                    .if_exists()
                    .to_owned(),
            )
            .await?;
        for name in [
            "cash_session_status",
            "table_status",
            "payment_method",
            "order_type",
            "order_status",
        ] {
            manager
                .drop_type(Type::drop().if_exists().name(Alias::new(name)).to_owned())
                .await?;
        }
        Ok(())
    }
}
