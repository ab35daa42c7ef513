use actix_web::{HttpResponse, ResponseError, Result, web};

use crate::models::*;
use crate::services::ReportService;

#[utoipa::path(
    get,
    path = "/reports/overview",
    tag = "report",
    responses(
        (status = 200, description = "Sales figures over this year's orders", body = FinancialOverview),
        (status = 500, description = "Orders could not be read")
    )
)]
pub async fn financial_overview(report_service: web::Data<ReportService>) -> Result<HttpResponse> {
    match report_service.financial_overview().await {
        Ok(overview) => Ok(HttpResponse::Ok().json(ApiResponse::success(overview))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn report_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/reports/overview", web::get().to(financial_overview));
}
