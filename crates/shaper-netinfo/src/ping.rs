//! Ping connectivity diagnostics

use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;
use shaper_core::CommandRunner;

static PACKET_LOSS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d+)% packet loss").expect("packet loss regex"));
static RTT_AVG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"rtt min/avg/max/mdev = [^/]+/([^/]+)/").expect("rtt regex"));
static PROBE_TIME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"time=([0-9.]+) ms").expect("probe time regex"));

#[derive(Debug, Clone, Serialize)]
pub struct PingReport {
    pub success: bool,
    pub host: String,
    pub packet_loss_percent: u32,
    pub avg_time_ms: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Run a ping test against `host`. The command runner bounds execution
/// time, so an unreachable host degrades to a failed report rather than a
/// hung request.
pub async fn ping_test(runner: &dyn CommandRunner, host: &str, count: u32) -> PingReport {
    let count = count.clamp(1, 20).to_string();
    let out = runner.run("ping", &["-c", &count, host]).await;

    let (packet_loss_percent, avg_time_ms) = parse_ping_output(&out.stdout);

    if out.success {
        PingReport {
            success: true,
            host: host.to_string(),
            packet_loss_percent,
            avg_time_ms,
            output: Some(out.stdout),
            error: None,
        }
    } else {
        PingReport {
            success: false,
            host: host.to_string(),
            packet_loss_percent: if out.stdout.is_empty() {
                100
            } else {
                packet_loss_percent
            },
            avg_time_ms,
            output: Some(out.stdout),
            error: Some(if out.stderr.trim().is_empty() {
                "Ping failed".to_string()
            } else {
                out.stderr.trim().to_string()
            }),
        }
    }
}

/// Single-probe reachability check used for DHCP client liveness.
pub async fn is_reachable(runner: &dyn CommandRunner, ip: &str) -> bool {
    runner.run("ping", &["-c", "1", "-W", "1", ip]).await.success
}

/// Extract `(packet loss %, average rtt ms)` from ping output. The rtt
/// summary line is preferred; the first per-probe `time=` is the fallback.
fn parse_ping_output(output: &str) -> (u32, f64) {
    let loss = PACKET_LOSS
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse().ok())
        .unwrap_or(0);

    let avg = RTT_AVG
        .captures(output)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().trim().parse().ok())
        .or_else(|| {
            PROBE_TIME
                .captures(output)
                .and_then(|c| c.get(1))
                .and_then(|m| m.as_str().parse().ok())
        })
        .unwrap_or(0.0);

    (loss, avg)
}
