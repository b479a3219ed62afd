//! Request handlers

use std::collections::HashMap;

use axum::extract::State;
use axum::Json;
use tracing::info;

use shaper_core::ShapingIntent;
use shaper_netinfo::{dhcp, interfaces, ping, resources, InterfaceInfo};

use crate::error::ApiError;
use crate::models::{Banner, ConfigUpdateResponse, PingRequest, StatusResponse};
use crate::AppState;

pub async fn root() -> Json<Banner> {
    Json(Banner {
        message: "Traffic Shaper Server is running",
    })
}

async fn interface_map(state: &AppState) -> HashMap<String, InterfaceInfo> {
    interfaces::list(state.runner.as_ref())
        .await
        .into_iter()
        .map(|info| (info.name.clone(), info))
        .collect()
}

pub async fn status(State(state): State<AppState>) -> Json<StatusResponse> {
    let interfaces = interface_map(&state).await;
    let system_resources = resources::sample_resources().await;
    Json(StatusResponse {
        interfaces,
        current_config: state.shaper.current().await,
        system_resources,
    })
}

pub async fn list_interfaces(
    State(state): State<AppState>,
) -> Json<HashMap<String, InterfaceInfo>> {
    Json(interface_map(&state).await)
}

pub async fn get_config(State(state): State<AppState>) -> Json<ShapingIntent> {
    Json(state.shaper.current().await)
}

pub async fn update_config(
    State(state): State<AppState>,
    Json(intent): Json<ShapingIntent>,
) -> Result<Json<ConfigUpdateResponse>, ApiError> {
    let message = state.shaper.update(intent).await?;
    let config = state.shaper.current().await;
    info!(?config, "configuration updated");
    Ok(Json(ConfigUpdateResponse {
        success: true,
        message,
        config,
    }))
}

pub async fn reset(State(state): State<AppState>) -> Result<Json<ConfigUpdateResponse>, ApiError> {
    let message = state.shaper.reset().await?;
    Ok(Json(ConfigUpdateResponse {
        success: true,
        message,
        config: state.shaper.current().await,
    }))
}

pub async fn system_info(State(state): State<AppState>) -> Json<shaper_netinfo::SystemReport> {
    Json(resources::system_report(state.runner.as_ref()).await)
}

pub async fn ping_test(
    State(state): State<AppState>,
    Json(request): Json<PingRequest>,
) -> Json<shaper_netinfo::PingReport> {
    Json(ping::ping_test(state.runner.as_ref(), &request.host, request.count).await)
}

pub async fn traffic(
    State(state): State<AppState>,
) -> Result<Json<shaper_netinfo::TrafficReport>, ApiError> {
    state
        .traffic
        .report(state.runner.as_ref())
        .await
        .map(Json)
        .map_err(|e| ApiError::Internal(format!("Failed to get traffic stats: {e}")))
}

pub async fn dhcp_clients(State(state): State<AppState>) -> Json<dhcp::DhcpClientsReport> {
    Json(dhcp::clients_report(state.runner.as_ref()).await)
}

pub async fn dhcp_status(State(state): State<AppState>) -> Json<dhcp::DhcpStatus> {
    Json(dhcp::status(state.runner.as_ref()).await)
}

pub async fn dhcp_restart(State(state): State<AppState>) -> Json<dhcp::RestartOutcome> {
    Json(dhcp::restart(state.runner.as_ref()).await)
}
