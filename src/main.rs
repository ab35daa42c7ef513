use actix_web::{App, HttpServer, middleware::Logger, web};
use chrono::Local; // timestamp in log lines
use env_logger::{Env, Target};
use std::io::Write; // for env_logger custom formatter
use std::sync::Arc;

use pos_backend::{
    config::Config,
    database::{create_pool, run_migrations},
    handlers,
    middlewares::create_cors,
    services::Services,
    store::{MemoryStore, SeaOrmStore, Store},
    swagger::openapi_config,
    tasks,
    utils::SystemClock,
};

fn startup_error(context: &str, e: impl std::fmt::Display) -> std::io::Error {
    log::error!("{context}: {e}");
    std::io::Error::other(format!("{context}: {e}"))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info"))
        .format(|buf, record| {
            let ts = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f%:z");
            let level = record.level().as_str().to_ascii_lowercase();
            let msg_json = serde_json::to_string(&format!("{}", record.args()))
                .unwrap_or_else(|_| "\"<invalid utf8>\"".to_string());
            writeln!(
                buf,
                "{{\"timestamp\":\"{}\",\"level\":\"{}\",\"message\":{},\"target\":\"{}\"}}",
                ts,
                level,
                msg_json,
                record.target(),
            )
        })
        .target(Target::Stdout)
        .init();

    let config = Config::from_toml().map_err(|e| startup_error("Failed to load configuration", e))?;

    let store: Arc<dyn Store> = if config.database.is_memory() {
        log::warn!("Using the in-memory store; data is lost on restart");
        Arc::new(MemoryStore::new())
    } else {
        let pool = create_pool(&config.database)
            .await
            .map_err(|e| startup_error("Failed to create database connection pool", e))?;
        run_migrations(&pool)
            .await
            .map_err(|e| startup_error("Failed to run database migrations", e))?;
        Arc::new(SeaOrmStore::new(pool))
    };

    let services = Services::new(store, &config, Arc::new(SystemClock));
    services
        .sync
        .bootstrap()
        .await
        .map_err(|e| startup_error("Failed to load initial state", e))?;

    tasks::spawn_all(services.orders.clone(), services.sync.clone());

    log::info!(
        "Starting HTTP server at {}:{}",
        config.server.host,
        config.server.port
    );

    let allowed_origins = config.server.allowed_origins.clone();
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .wrap(create_cors(&allowed_origins))
            .app_data(web::Data::new(services.state.clone()))
            .app_data(web::Data::new(services.orders.clone()))
            .app_data(web::Data::new(services.tables.clone()))
            .app_data(web::Data::new(services.cash_register.clone()))
            .app_data(web::Data::new(services.reports.clone()))
            .configure(openapi_config)
            .service(
                web::scope("/api/v1")
                    .configure(handlers::order_config)
                    .configure(handlers::table_config)
                    .configure(handlers::cash_register_config)
                    .configure(handlers::report_config)
                    .configure(handlers::events_config),
            )
    })
    .bind((config.server.host.as_str(), config.server.port))?
    .run()
    .await
}
