use actix_web::{HttpResponse, web};
use utoipa::OpenApi;

use crate::entities::{
    CashAdjustmentType, CashSessionStatus, OrderStatus, OrderType, PaymentMethod, TableStatus,
};
use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::order::list_orders,
        handlers::order::create_order,
        handlers::order::get_order,
        handlers::order::update_order_status,
        handlers::order::toggle_auto_progress,
        handlers::order::add_items,
        handlers::order::close_account,
        handlers::order::check_transitions,
        handlers::table::list_tables,
        handlers::table::add_table,
        handlers::table::update_table,
        handlers::table::delete_table,
        handlers::cash_register::list_sessions,
        handlers::cash_register::active_session,
        handlers::cash_register::open_session,
        handlers::cash_register::close_session,
        handlers::cash_register::session_summary,
        handlers::cash_register::list_adjustments,
        handlers::cash_register::add_adjustment,
        handlers::report::financial_overview,
        handlers::events::events,
    ),
    components(
        schemas(
            OrderStatus,
            OrderType,
            PaymentMethod,
            TableStatus,
            CashSessionStatus,
            CashAdjustmentType,
            FlavorDetails,
            NewOrderItem,
            CreateOrderRequest,
            UpdateOrderStatusRequest,
            AddItemsRequest,
            PaymentDetails,
            OrderItemResponse,
            OrderResponse,
            TransitionSweep,
            CreateTableRequest,
            UpdateTableRequest,
            TableResponse,
            OpenCashRegisterRequest,
            CloseCashRegisterRequest,
            CreateCashAdjustmentRequest,
            CashSessionResponse,
            CashAdjustmentResponse,
            SessionSummary,
            FinancialOverview,
            ApiError,
        )
    ),
    tags(
        (name = "order", description = "Order lifecycle API"),
        (name = "table", description = "Table management API"),
        (name = "cash_register", description = "Cash register sessions and adjustments API"),
        (name = "report", description = "Financial reporting API"),
        (name = "events", description = "Live application events"),
    ),
    info(
        title = "POS Backend API",
        version = "1.0.0",
        description = "Restaurant point of sale REST API documentation"
    ),
    servers(
        (url = "/api/v1", description = "Local server")
    )
)]
pub struct ApiDoc;

pub fn openapi_config(cfg: &mut web::ServiceConfig) {
    cfg.route(
        "/api-docs/openapi.json",
        web::get().to(|| async { HttpResponse::Ok().json(ApiDoc::openapi()) }),
    );
}
