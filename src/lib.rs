pub mod application;
pub mod cache;
pub mod config;
pub mod db;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod infrastructure;
pub mod lifecycle;
pub mod schema;

#[cfg(test)]
pub(crate) mod test_support;

use std::sync::Arc;
use std::time::Duration;

use actix_web::{middleware::Logger, web, App, HttpServer};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use thiserror::Error;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub use cache::OrderCache;
pub use db::{create_pool, DbPool};

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::receiving::get_receiving,
        handlers::receiving::get_receiving_json,
        handlers::health::health_check,
    ),
    components(schemas(
        domain::order::Order,
        domain::order::Delivery,
        domain::order::Payment,
        domain::order::Item,
    ))
)]
pub struct ApiDoc;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("No connection to run migrations: {0}")]
    Connection(#[from] r2d2::Error),
    #[error("Migration failed: {0}")]
    Apply(Box<dyn std::error::Error + Send + Sync>),
}

/// Create the `orders` table if it does not exist yet.
pub fn run_migrations(pool: &DbPool) -> Result<(), MigrationError> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map(|_| ())
        .map_err(MigrationError::Apply)
}

/// Query service routes. Expects an `OrderCache` in app data.
pub fn routes(cfg: &mut web::ServiceConfig) {
    cfg.route("/receiving", web::get().to(handlers::receiving::get_receiving))
        .route(
            "/receiving/json",
            web::get().to(handlers::receiving::get_receiving_json),
        )
        .route("/health_check", web::get().to(handlers::health::health_check));
}

/// Build and return an actix-web `Server` bound to `addr`, serving lookups
/// from `cache`.
///
/// Signal handling is left to the caller, which stops the server through its
/// handle. The caller is responsible for `.await`-ing (or `tokio::spawn`-ing)
/// the returned server.
pub fn build_server(
    cache: Arc<OrderCache>,
    addr: &str,
    shutdown_grace: Duration,
) -> std::io::Result<actix_web::dev::Server> {
    let cache = web::Data::from(cache);
    Ok(HttpServer::new(move || {
        App::new()
            .app_data(cache.clone())
            .wrap(Logger::default())
            .configure(routes)
            .service(
                SwaggerUi::new("/swagger-ui/{_:.*}")
                    .url("/api-docs/openapi.json", ApiDoc::openapi()),
            )
    })
    .disable_signals()
    .shutdown_timeout(shutdown_grace.as_secs())
    .bind(addr)?
    .run())
}
