//! Request and response bodies for the HTTP surface

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use shaper_core::ShapingIntent;
use shaper_netinfo::{InterfaceInfo, ResourceSnapshot};

#[derive(Debug, Serialize)]
pub struct Banner {
    pub message: &'static str,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub interfaces: HashMap<String, InterfaceInfo>,
    pub current_config: ShapingIntent,
    pub system_resources: ResourceSnapshot,
}

#[derive(Debug, Serialize)]
pub struct ConfigUpdateResponse {
    pub success: bool,
    pub message: String,
    pub config: ShapingIntent,
}

fn default_ping_host() -> String {
    "8.8.8.8".to_string()
}

fn default_ping_count() -> u32 {
    4
}

#[derive(Debug, Deserialize)]
pub struct PingRequest {
    #[serde(default = "default_ping_host")]
    pub host: String,
    #[serde(default = "default_ping_count")]
    pub count: u32,
}
