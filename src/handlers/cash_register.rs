use actix_web::{HttpResponse, ResponseError, Result, web};
use uuid::Uuid;

use crate::models::*;
use crate::services::CashRegisterService;

#[utoipa::path(
    get,
    path = "/cash-register/sessions",
    tag = "cash_register",
    responses((status = 200, description = "Sessions, newest first", body = [CashSessionResponse]))
)]
pub async fn list_sessions(service: web::Data<CashRegisterService>) -> Result<HttpResponse> {
    let sessions: Vec<CashSessionResponse> = service
        .list_sessions()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(sessions)))
}

#[utoipa::path(
    get,
    path = "/cash-register/sessions/active",
    tag = "cash_register",
    responses((status = 200, description = "The open session, or null when the till is closed", body = CashSessionResponse))
)]
pub async fn active_session(service: web::Data<CashRegisterService>) -> Result<HttpResponse> {
    let session = service.active_session().await.map(CashSessionResponse::from);
    Ok(HttpResponse::Ok().json(ApiResponse::success(session)))
}

#[utoipa::path(
    post,
    path = "/cash-register/sessions",
    tag = "cash_register",
    request_body = OpenCashRegisterRequest,
    responses(
        (status = 201, description = "Till opened", body = CashSessionResponse),
        (status = 409, description = "A session is already open", body = ApiError)
    )
)]
pub async fn open_session(
    service: web::Data<CashRegisterService>,
    body: web::Json<OpenCashRegisterRequest>,
) -> Result<HttpResponse> {
    match service.open_cash_register(body.into_inner()).await {
        Ok(session) => Ok(HttpResponse::Created()
            .json(ApiResponse::success(CashSessionResponse::from(session)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/cash-register/sessions/{id}/close",
    tag = "cash_register",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = CloseCashRegisterRequest,
    responses(
        (status = 200, description = "Till closed and reconciled", body = CashSessionResponse),
        (status = 404, description = "Session not found", body = ApiError),
        (status = 409, description = "Session already closed", body = ApiError)
    )
)]
pub async fn close_session(
    service: web::Data<CashRegisterService>,
    path: web::Path<Uuid>,
    body: web::Json<CloseCashRegisterRequest>,
) -> Result<HttpResponse> {
    match service
        .close_cash_register(path.into_inner(), body.into_inner())
        .await
    {
        Ok(session) => Ok(HttpResponse::Ok().json(ApiResponse::success(CashSessionResponse::from(session)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/cash-register/sessions/{id}/summary",
    tag = "cash_register",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Expected drawer contents", body = SessionSummary),
        (status = 404, description = "Session not found", body = ApiError)
    )
)]
pub async fn session_summary(
    service: web::Data<CashRegisterService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match service.session_summary(path.into_inner()).await {
        Ok(summary) => Ok(HttpResponse::Ok().json(ApiResponse::success(summary))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/cash-register/sessions/{id}/adjustments",
    tag = "cash_register",
    params(("id" = Uuid, Path, description = "Session id")),
    responses(
        (status = 200, description = "Adjustments, newest first", body = [CashAdjustmentResponse]),
        (status = 404, description = "Session not found", body = ApiError)
    )
)]
pub async fn list_adjustments(
    service: web::Data<CashRegisterService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    match service.list_adjustments(path.into_inner()).await {
        Ok(adjustments) => {
            let adjustments: Vec<CashAdjustmentResponse> =
                adjustments.into_iter().map(Into::into).collect();
            Ok(HttpResponse::Ok().json(ApiResponse::success(adjustments)))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/cash-register/sessions/{id}/adjustments",
    tag = "cash_register",
    params(("id" = Uuid, Path, description = "Session id")),
    request_body = CreateCashAdjustmentRequest,
    responses(
        (status = 201, description = "Adjustment recorded", body = CashAdjustmentResponse),
        (status = 400, description = "Invalid amount or reason", body = ApiError),
        (status = 409, description = "Session is closed", body = ApiError),
        (status = 503, description = "Adjustments are not available", body = ApiError)
    )
)]
pub async fn add_adjustment(
    service: web::Data<CashRegisterService>,
    path: web::Path<Uuid>,
    body: web::Json<CreateCashAdjustmentRequest>,
) -> Result<HttpResponse> {
    match service
        .add_cash_adjustment(path.into_inner(), body.into_inner())
        .await
    {
        Ok(adjustment) => Ok(HttpResponse::Created()
            .json(ApiResponse::success(CashAdjustmentResponse::from(adjustment)))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn cash_register_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/cash-register/sessions")
            .route("", web::get().to(list_sessions))
            .route("", web::post().to(open_session))
            .route("/active", web::get().to(active_session))
            .route("/{id}/close", web::post().to(close_session))
            .route("/{id}/summary", web::get().to(session_summary))
            .route("/{id}/adjustments", web::get().to(list_adjustments))
            .route("/{id}/adjustments", web::post().to(add_adjustment)),
    );
}
