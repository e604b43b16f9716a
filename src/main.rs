use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpResponse, HttpServer, Responder, get};
use anyhow::Context;
use serde_json::json;
use std::sync::Arc;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod model;
mod models;
mod routes;
mod service;
mod store;

use config::Config;
use db::init_db;
use error::AppError;
use routes::Limiters;
use service::schedule::Calendar;
use store::{MySqlStore, Store};

use tracing::info;
use tracing_appender::rolling;
use utoipa_swagger_ui::SwaggerUi;

#[get("/")]
async fn index(config: Data<Config>) -> impl Responder {
    let prefix = config.api_prefix.trim_end_matches('/');
    HttpResponse::Ok().json(json!({
        "name": "Attendance Tracker API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "RFID and manual attendance for multi-office field agents",
        "endpoints": {
            "auth": "/auth",
            "rfid": "/api/rfid",
            "offices": format!("{prefix}/offices"),
            "agents": format!("{prefix}/agents"),
            "users": format!("{prefix}/users"),
            "attendance": format!("{prefix}/attendance"),
            "docs": "/swagger-ui/"
        }
    }))
}

async fn bootstrap_from_env(store: &dyn Store, config: &Config) -> anyhow::Result<()> {
    let Some(admin) = &config.bootstrap_admin else {
        return Ok(());
    };

    match service::user::bootstrap_admin(store, &admin.email, &admin.password, &admin.name).await {
        Ok(user) => info!(user_id = user.id, "Bootstrap admin ready"),
        Err(AppError::Conflict(_)) => info!("Users already exist, skipping bootstrap admin"),
        Err(e) => return Err(e).context("Failed to create bootstrap admin"),
    }
    Ok(())
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Rolling daily log
    let file_appender = rolling::daily(&config.log_dir, "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!(timezone = %config.timezone, "Server starting...");

    let pool = init_db(&config.database_url).await?;
    let store: Arc<dyn Store> = Arc::new(MySqlStore::new(pool));

    bootstrap_from_env(store.as_ref(), &config).await?;

    let calendar = Calendar::new(config.timezone);
    let limiters = Limiters::from_config(&config)?;

    // 👇 clone what you need BEFORE moving config
    let server_addr = config.server_addr.clone();
    let openapi = docs::openapi_for(&config.api_prefix);

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .service(
                // wildcard {_:.*} matches the JS/CSS assets
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-doc/openapi.json", openapi.clone()),
            )
            .app_data(Data::from(store.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(Data::new(calendar))
            .app_data(api::json_config())
            .app_data(api::query_config())
            .app_data(api::path_config())
            .service(index)
            // Configure auth, reader and protected routes with rate limiting
            .configure(|cfg| routes::configure(cfg, &config, &limiters))
    })
    .bind(&server_addr)
    .with_context(|| format!("Failed to bind {server_addr}"))?
    .run()
    .await?;

    Ok(())
}
