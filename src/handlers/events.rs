use actix_web::http::header;
use actix_web::{HttpResponse, web};
use std::convert::Infallible;
use tokio::sync::broadcast::error::RecvError;

use crate::services::AppState;

/// Server-sent event frame carrying one JSON encoded event.
fn frame(json: &str) -> web::Bytes {
    web::Bytes::from(format!("data: {json}\n\n"))
}

#[utoipa::path(
    get,
    path = "/events",
    tag = "events",
    responses((status = 200, description = "Stream of application events (text/event-stream)"))
)]
pub async fn events(state: web::Data<AppState>) -> HttpResponse {
    let rx = state.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        loop {
            match rx.recv().await {
                Ok(event) => match serde_json::to_string(&event) {
                    Ok(json) => return Some((Ok::<_, Infallible>(frame(&json)), rx)),
                    Err(e) => log::error!("Failed to encode event: {e}"),
                },
                Err(RecvError::Lagged(skipped)) => {
                    log::warn!("Event stream client lagged, {skipped} events dropped");
                }
                Err(RecvError::Closed) => return None,
            }
        }
    });

    HttpResponse::Ok()
        .insert_header((header::CONTENT_TYPE, "text/event-stream"))
        .insert_header((header::CACHE_CONTROL, "no-cache"))
        .streaming(stream)
}

pub fn events_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/events", web::get().to(events));
}
