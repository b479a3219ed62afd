//! HTTP control surface
//!
//! JSON API over the shaping engine and the host introspection helpers.
//! Routing and CORS only; behavior lives in `shaper-core` and
//! `shaper-netinfo`.

pub mod error;
pub mod handlers;
pub mod models;

use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::CorsLayer;

use shaper_core::{CommandRunner, Shaper};
use shaper_netinfo::TrafficMonitor;

/// Shared application state handed to every request handler.
#[derive(Clone)]
pub struct AppState {
    pub shaper: Arc<Shaper>,
    pub runner: Arc<dyn CommandRunner>,
    pub traffic: Arc<TrafficMonitor>,
}

impl AppState {
    pub fn new(shaper: Arc<Shaper>, runner: Arc<dyn CommandRunner>) -> Self {
        Self {
            shaper,
            runner,
            traffic: Arc::new(TrafficMonitor::new()),
        }
    }
}

/// Build the application router. The frontend is served from another
/// origin, so CORS stays permissive.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::root))
        .route("/status", get(handlers::status))
        .route(
            "/config",
            get(handlers::get_config).post(handlers::update_config),
        )
        .route("/reset", post(handlers::reset))
        .route("/interfaces", get(handlers::list_interfaces))
        .route("/system-info", get(handlers::system_info))
        .route("/ping-test", post(handlers::ping_test))
        .route("/traffic", get(handlers::traffic))
        .route("/dhcp/clients", get(handlers::dhcp_clients))
        .route("/dhcp/status", get(handlers::dhcp_status))
        .route("/dhcp/restart", post(handlers::dhcp_restart))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
