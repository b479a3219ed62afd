//! DHCP server introspection
//!
//! The DHCP server is an external collaborator: we detect which daemon is
//! active via systemd, read its lease database read-only, and can ask
//! systemd to restart it. Both ISC dhcpd and dnsmasq lease formats are
//! understood.

use std::collections::HashMap;
use std::sync::LazyLock;

use chrono::{Local, NaiveDateTime, TimeZone};
use regex::Regex;
use serde::Serialize;
use shaper_core::CommandRunner;
use tracing::warn;

use crate::ping::is_reachable;

const ISC_LEASE_FILE: &str = "/var/lib/dhcp/dhcpd.leases";
const ISC_CONFIG_FILE: &str = "/etc/dhcp/dhcpd.conf";
const DNSMASQ_LEASE_FILE: &str = "/var/lib/misc/dnsmasq.leases";
const DNSMASQ_CONFIG_FILE: &str = "/etc/dnsmasq.conf";

/// dnsmasq does not record lease end times in its database; assume its
/// default 30-minute window.
const DNSMASQ_LEASE_SECS: i64 = 30 * 60;

static LEASE_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"lease\s+(\d+\.\d+\.\d+\.\d+)\s*\{([^}]+)\}").expect("lease block regex")
});
static HARDWARE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"hardware ethernet\s+([a-fA-F0-9:]+);").expect("mac regex"));
static HOSTNAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"client-hostname\s+"([^"]+)";"#).expect("hostname regex"));
static STARTS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"starts\s+\d+\s+([^;]+);").expect("starts regex"));
static ENDS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ends\s+\d+\s+([^;]+);").expect("ends regex"));
static BINDING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"binding state\s+(\w+);").expect("binding regex"));

const ISC_TIME_FORMAT: &str = "%Y/%m/%d %H:%M:%S";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LeaseStatus {
    Active,
    Expired,
    Unknown,
}

#[derive(Debug, Clone, Serialize)]
pub struct DhcpClient {
    pub ip: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mac: Option<String>,
    pub hostname: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_start: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_end: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_remaining: Option<i64>,
    pub lease_remaining_human: String,
    pub status: LeaseStatus,
    pub online: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DhcpServer {
    Isc,
    Dnsmasq,
}

impl DhcpServer {
    pub fn unit(self) -> &'static str {
        match self {
            Self::Isc => "isc-dhcp-server",
            Self::Dnsmasq => "dnsmasq",
        }
    }

    pub fn config_file(self) -> &'static str {
        match self {
            Self::Isc => ISC_CONFIG_FILE,
            Self::Dnsmasq => DNSMASQ_CONFIG_FILE,
        }
    }

    pub fn lease_file(self) -> &'static str {
        match self {
            Self::Isc => ISC_LEASE_FILE,
            Self::Dnsmasq => DNSMASQ_LEASE_FILE,
        }
    }
}

async fn unit_active(runner: &dyn CommandRunner, unit: &str) -> bool {
    let out = runner.run("systemctl", &["is-active", unit]).await;
    out.success && out.stdout.trim() == "active"
}

/// Which DHCP daemon systemd reports as active, ISC checked first.
pub async fn detect_server(runner: &dyn CommandRunner) -> Option<DhcpServer> {
    for server in [DhcpServer::Isc, DhcpServer::Dnsmasq] {
        if unit_active(runner, server.unit()).await {
            return Some(server);
        }
    }
    None
}

/// Parse ISC dhcpd lease records.
pub fn parse_isc_leases(content: &str, now: NaiveDateTime) -> HashMap<String, DhcpClient> {
    let mut clients = HashMap::new();

    for captures in LEASE_BLOCK.captures_iter(content) {
        let ip = captures[1].to_string();
        let body = &captures[2];

        let mac = HARDWARE
            .captures(body)
            .map(|c| c[1].to_ascii_uppercase());
        let hostname = HOSTNAME
            .captures(body)
            .map(|c| c[1].to_string())
            .unwrap_or_else(|| default_hostname(&ip));

        let starts = STARTS
            .captures(body)
            .and_then(|c| NaiveDateTime::parse_from_str(c[1].trim(), ISC_TIME_FORMAT).ok());
        let ends = ENDS
            .captures(body)
            .and_then(|c| NaiveDateTime::parse_from_str(c[1].trim(), ISC_TIME_FORMAT).ok());

        let mut status = LeaseStatus::Unknown;
        let (mut lease_start, mut lease_end, mut lease_remaining) = (None, None, None);
        if let (Some(start), Some(end)) = (starts, ends) {
            lease_start = Some(start.format("%Y-%m-%dT%H:%M:%S").to_string());
            lease_end = Some(end.format("%Y-%m-%dT%H:%M:%S").to_string());
            lease_remaining = Some((end - now).num_seconds().max(0));
            status = if now < end {
                LeaseStatus::Active
            } else {
                LeaseStatus::Expired
            };
        }

        // binding state is authoritative when present
        if let Some(binding) = BINDING.captures(body) {
            match &binding[1] {
                "active" => status = LeaseStatus::Active,
                "expired" => status = LeaseStatus::Expired,
                _ => {}
            }
        }

        clients.insert(
            ip.clone(),
            DhcpClient {
                ip,
                mac,
                hostname,
                lease_start,
                lease_end,
                lease_remaining,
                lease_remaining_human: String::new(),
                status,
                online: false,
            },
        );
    }

    clients
}

/// Parse dnsmasq's lease database: one
/// `timestamp mac ip hostname client-id` record per line.
pub fn parse_dnsmasq_leases(content: &str, now_ts: i64) -> HashMap<String, DhcpClient> {
    let mut clients = HashMap::new();

    for line in content.lines() {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 4 {
            continue;
        }
        let Ok(timestamp) = fields[0].parse::<i64>() else {
            continue;
        };
        let mac = fields[1].to_ascii_uppercase();
        let ip = fields[2].to_string();
        let hostname = fields[3].to_string();

        let lease_end_ts = timestamp + DNSMASQ_LEASE_SECS;
        let remaining = (lease_end_ts - now_ts).max(0);

        clients.insert(
            ip.clone(),
            DhcpClient {
                ip,
                mac: Some(mac),
                hostname,
                lease_start: local_iso(timestamp),
                lease_end: local_iso(lease_end_ts),
                lease_remaining: Some(remaining),
                lease_remaining_human: String::new(),
                status: if remaining > 0 {
                    LeaseStatus::Active
                } else {
                    LeaseStatus::Expired
                },
                online: false,
            },
        );
    }

    clients
}

fn local_iso(ts: i64) -> Option<String> {
    Local
        .timestamp_opt(ts, 0)
        .single()
        .map(|dt| dt.naive_local().format("%Y-%m-%dT%H:%M:%S").to_string())
}

fn default_hostname(ip: &str) -> String {
    let last_octet = ip.rsplit('.').next().unwrap_or(ip);
    format!("Client-{last_octet}")
}

fn human_remaining(secs: i64) -> String {
    if secs > 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs > 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{secs}s")
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DhcpClientsReport {
    pub clients: HashMap<String, DhcpClient>,
    pub total_clients: usize,
    pub active_clients: usize,
    pub online_clients: usize,
}

/// Read and parse an ISC lease database from disk.
pub async fn load_isc_clients(
    path: &std::path::Path,
    now: NaiveDateTime,
) -> std::io::Result<HashMap<String, DhcpClient>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_isc_leases(&content, now))
}

/// Read and parse a dnsmasq lease database from disk.
pub async fn load_dnsmasq_clients(
    path: &std::path::Path,
    now_ts: i64,
) -> std::io::Result<HashMap<String, DhcpClient>> {
    let content = tokio::fs::read_to_string(path).await?;
    Ok(parse_dnsmasq_leases(&content, now_ts))
}

/// Collect the current client list from whichever lease databases the
/// active DHCP daemons maintain, with a per-client liveness probe.
pub async fn clients_report(runner: &dyn CommandRunner) -> DhcpClientsReport {
    let mut clients = HashMap::new();

    if unit_active(runner, DhcpServer::Isc.unit()).await {
        match load_isc_clients(ISC_LEASE_FILE.as_ref(), Local::now().naive_local()).await {
            Ok(parsed) => clients.extend(parsed),
            Err(e) => warn!(error = %e, "ISC DHCP lease file not readable"),
        }
    }
    if unit_active(runner, DhcpServer::Dnsmasq.unit()).await {
        match load_dnsmasq_clients(DNSMASQ_LEASE_FILE.as_ref(), Local::now().timestamp()).await {
            Ok(parsed) => clients.extend(parsed),
            Err(e) => warn!(error = %e, "dnsmasq lease file not readable"),
        }
    }

    for client in clients.values_mut() {
        client.online = is_reachable(runner, &client.ip).await;
        client.lease_remaining_human = match client.lease_remaining {
            Some(secs) => human_remaining(secs),
            None => "Unknown".to_string(),
        };
    }

    let total_clients = clients.len();
    let active_clients = clients
        .values()
        .filter(|c| c.status == LeaseStatus::Active)
        .count();
    let online_clients = clients.values().filter(|c| c.online).count();

    DhcpClientsReport {
        clients,
        total_clients,
        active_clients,
        online_clients,
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DhcpStatus {
    pub running: bool,
    pub server_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lease_file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Status of the active DHCP daemon, if any.
pub async fn status(runner: &dyn CommandRunner) -> DhcpStatus {
    let Some(server) = detect_server(runner).await else {
        return DhcpStatus {
            running: false,
            server_type: "none".to_string(),
            config_file: None,
            lease_file: None,
            uptime: None,
            error: Some("No DHCP server detected".to_string()),
        };
    };

    let out = runner
        .run("systemctl", &["status", server.unit(), "--no-pager"])
        .await;
    let uptime = if out.success {
        parse_uptime(&out.stdout)
    } else {
        None
    };

    DhcpStatus {
        running: true,
        server_type: server.unit().to_string(),
        config_file: Some(server.config_file().to_string()),
        lease_file: Some(server.lease_file().to_string()),
        uptime,
        error: None,
    }
}

/// Pull the activation time out of `systemctl status` output.
fn parse_uptime(output: &str) -> Option<String> {
    output
        .lines()
        .find(|line| line.contains("Active:") && line.contains("since"))
        .and_then(|line| line.split("since").nth(1))
        .map(|s| s.trim().to_string())
}

#[derive(Debug, Clone, Serialize)]
pub struct RestartOutcome {
    pub success: bool,
    pub message: String,
}

/// Restart the active DHCP daemon through systemd.
pub async fn restart(runner: &dyn CommandRunner) -> RestartOutcome {
    let Some(server) = detect_server(runner).await else {
        return RestartOutcome {
            success: false,
            message: "No DHCP server detected".to_string(),
        };
    };

    let out = runner.run("systemctl", &["restart", server.unit()]).await;
    if out.success {
        RestartOutcome {
            success: true,
            message: format!("{} restarted successfully", server.unit()),
        }
    } else {
        RestartOutcome {
            success: false,
            message: format!("Failed to restart {}: {}", server.unit(), out.diagnostic()),
        }
    }
}
