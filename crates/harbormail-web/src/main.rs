//! HarborMail - a web mail client for password-based IMAP providers
//!
//! Serves the login flow and the AJAX command endpoint; every request
//! talks to the provider over its own short-lived connection.

mod config;
mod forms;
mod handlers;
mod session;

use actix_web::{web, App, HttpServer};
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use harbormail_core::{Database, ProviderRegistry};

use crate::config::AppConfig;
use crate::handlers::AppState;
use crate::session::SessionStore;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    let config = AppConfig::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("harbormail=debug".parse().unwrap()))
        .init();

    tracing::info!("Starting HarborMail on {}:{}", config.host, config.port);

    let database = Database::open(&config.database)
        .await
        .expect("Failed to open the cache database");

    let state = web::Data::new(AppState {
        registry: ProviderRegistry::with_defaults(),
        database,
        sessions: SessionStore::new(config.session_timeout()),
        fetch_limit: config.fetch_limit,
    });

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await
}
