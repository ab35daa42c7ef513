use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;
use uuid::Uuid;

use crate::models::*;
use crate::services::TableService;

#[utoipa::path(
    get,
    path = "/tables",
    tag = "table",
    responses((status = 200, description = "Tables sorted by name", body = [TableResponse]))
)]
pub async fn list_tables(table_service: web::Data<TableService>) -> Result<HttpResponse> {
    let tables: Vec<TableResponse> = table_service
        .list_tables()
        .await
        .into_iter()
        .map(Into::into)
        .collect();
    Ok(HttpResponse::Ok().json(ApiResponse::success(tables)))
}

#[utoipa::path(
    post,
    path = "/tables",
    tag = "table",
    request_body = CreateTableRequest,
    responses(
        (status = 201, description = "Table added", body = TableResponse),
        (status = 400, description = "Invalid name or capacity", body = ApiError)
    )
)]
pub async fn add_table(
    table_service: web::Data<TableService>,
    body: web::Json<CreateTableRequest>,
) -> Result<HttpResponse> {
    match table_service.add_table(body.into_inner()).await {
        Ok(table) => Ok(HttpResponse::Created().json(ApiResponse::success(TableResponse::from(table)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/tables/{id}",
    tag = "table",
    params(("id" = Uuid, Path, description = "Table id")),
    request_body = UpdateTableRequest,
    responses(
        (status = 200, description = "Table updated", body = TableResponse),
        (status = 404, description = "Table not found", body = ApiError),
        (status = 409, description = "Table still has an open order", body = ApiError)
    )
)]
pub async fn update_table(
    table_service: web::Data<TableService>,
    path: web::Path<Uuid>,
    body: web::Json<UpdateTableRequest>,
) -> Result<HttpResponse> {
    match table_service
        .update_table(path.into_inner(), body.into_inner())
        .await
    {
        Ok(table) => Ok(HttpResponse::Ok().json(ApiResponse::success(TableResponse::from(table)))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/tables/{id}",
    tag = "table",
    params(("id" = Uuid, Path, description = "Table id")),
    responses(
        (status = 200, description = "Table removed"),
        (status = 409, description = "Table is occupied", body = ApiError)
    )
)]
pub async fn delete_table(
    table_service: web::Data<TableService>,
    path: web::Path<Uuid>,
) -> Result<HttpResponse> {
    let id = path.into_inner();
    match table_service.delete_table(id).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": { "id": id }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn table_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tables")
            .route("", web::get().to(list_tables))
            .route("", web::post().to(add_table))
            .route("/{id}", web::put().to(update_table))
            .route("/{id}", web::delete().to(delete_table)),
    );
}
