#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Actix-Web boundary for the SFD feed tools.
//!
//! Exposes each tool as `POST /tools/{name}` with a JSON body, the tool
//! catalog as `GET /tools`, and a health check at `GET /api/health`. Tool
//! errors carry stable machine-readable codes in the response body.

pub mod handlers;

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware, web};
use sfd_feed::Config;
use sfd_tools::SfdTools;

/// Shared application state.
pub struct AppState {
    /// The tool orchestrator (fetcher + cache).
    pub tools: Arc<SfdTools>,
}

/// Runs the HTTP server until shutdown.
///
/// Bind address and port come from `BIND_ADDR` and `PORT` (defaults
/// `127.0.0.1:8080`).
///
/// # Errors
///
/// Returns an error if the HTTP client fails to initialize or the listen
/// socket cannot be bound.
pub async fn run(config: Config) -> std::io::Result<()> {
    let tools = SfdTools::new(config).map_err(|e| std::io::Error::other(e.to_string()))?;
    let state = web::Data::new(AppState {
        tools: Arc::new(tools),
    });

    let bind_addr = std::env::var("BIND_ADDR").unwrap_or_else(|_| "127.0.0.1".to_string());
    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|p| p.parse().ok())
        .unwrap_or(8080);

    log::info!("Starting server on {bind_addr}:{port}");

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .app_data(state.clone())
            .service(web::scope("/api").route("/health", web::get().to(handlers::health)))
            .route("/tools", web::get().to(handlers::tool_catalog))
            .route("/tools/{name}", web::post().to(handlers::call_tool))
    })
    .bind((bind_addr, port))?
    .run()
    .await
}
