use actix_web::{HttpResponse, ResponseError, Result, web};
use uuid::Uuid;

use crate::models::*;
use crate::services::OrderService;

#[utoipa::path(
    get,
    path = "/orders",
    tag = "order",
    responses(
        (status = 200, description = "Mirrored orders, newest first", body = [OrderResponse])
    )
)]
pub async fn list_orders(order_service: web::Data<OrderService>) -> Result<HttpResponse> {
    let orders: Vec<OrderResponse> = order_service
        .list_orders()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(orders)))
}

#[utoipa::path(
    post,
    path = "/orders",
    tag = "order",
    request_body = CreateOrderRequest,
    responses(
        (status = 201, description = "Order created", body = OrderResponse),
        (status = 400, description = "Invalid order", body = ApiError),
        (status = 404, description = "Table not found", body = ApiError)
    )
)]
pub async fn create_order(
    order_service: web::Data<OrderService>,
    body: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
    match order_service.create_order(body.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Created().json(ApiResponse::success(OrderResponse::from(detail)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/orders/{id}",
    tag = "order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Order with its items", body = OrderResponse),
        (status = 404, description = "Order not found", body = ApiError)
    )
)]
pub async fn get_order(
    order_service: web::Data<OrderService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match order_service.get_order(path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(detail)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/status",
    tag = "order",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = UpdateOrderStatusRequest,
    responses(
        (status = 200, description = "Order after the change", body = OrderResponse),
        (status = 404, description = "Order not found", body = ApiError)
    )
)]
pub async fn update_order_status(
    order_service: web::Data<OrderService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateOrderStatusRequest>,
) -> Result<HttpResponse> {
    match order_service
        .update_order_status(path.into_inner(), body.status, true)
        .await
    {
        Ok(detail) => Ok(HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(detail)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/auto-progress",
    tag = "order",
    params(("id" = Uuid, Path, description = "Order id")),
    responses(
        (status = 200, description = "Auto-progress toggled", body = OrderResponse),
        (status = 404, description = "Order not found", body = ApiError)
    )
)]
pub async fn toggle_auto_progress(
    order_service: web::Data<OrderService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match order_service.toggle_order_auto_progress(path.into_inner()).await {
        Ok(detail) => Ok(HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(detail)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/items",
    tag = "order",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = AddItemsRequest,
    responses(
        (status = 200, description = "Items appended", body = OrderResponse),
        (status = 400, description = "No items or invalid items", body = ApiError),
        (status = 409, description = "Order already finished", body = ApiError)
    )
)]
pub async fn add_items(
    order_service: web::Data<OrderService>,
    path: web::Path<Uuid>,
    body: web::Json<AddItemsRequest>,
) -> Result<HttpResponse> {
    match order_service
        .add_items_to_order(path.into_inner(), body.into_inner().items)
        .await
    {
        Ok(detail) => Ok(HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(detail)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/{id}/close-account",
    tag = "order",
    params(("id" = Uuid, Path, description = "Order id")),
    request_body = PaymentDetails,
    responses(
        (status = 200, description = "Account closed", body = OrderResponse),
        (status = 404, description = "Order not found", body = ApiError)
    )
)]
pub async fn close_account(
    order_service: web::Data<OrderService>,
    path: web::Path<Uuid>,
    body: web::Json<PaymentDetails>,
) -> Result<HttpResponse> {
    match order_service
        .close_table_account(path.into_inner(), body.into_inner())
        .await
    {
        Ok(detail) => Ok(HttpResponse::Ok().json(ApiResponse::success(OrderResponse::from(detail)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/orders/transitions/check",
    tag = "order",
    responses(
        (status = 200, description = "Result of one lifecycle sweep", body = TransitionSweep)
    )
)]
pub async fn check_transitions(order_service: web::Data<OrderService>) -> Result<HttpResponse> {
    let sweep = order_service.check_order_transitions().await;
    Ok(HttpResponse::Ok().json(ApiResponse::success(sweep)))
}

pub fn order_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/orders")
            .route("", web::get().to(list_orders))
            .route("", web::post().to(create_order))
            .route("/transitions/check", web::post().to(check_transitions))
            .route("/{id}", web::get().to(get_order))
            .route("/{id}/status", web::post().to(update_order_status))
            .route("/{id}/auto-progress", web::post().to(toggle_auto_progress))
            .route("/{id}/items", web::post().to(add_items))
            .route("/{id}/close-account", web::post().to(close_account)),
    );
}
