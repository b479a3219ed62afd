//! Plan execution
//!
//! Runs a compiled [`ShapingPlan`] against the command runner. Execution is
//! strictly in plan order and stops at the first failed create; clears are
//! best-effort. Partial application is accepted: already-applied operations
//! stay in effect and are not rolled back, the error names the failing step
//! so the operator can diagnose which kernel object did not come up.

use tracing::{debug, info, warn};

use crate::command::CommandRunner;
use crate::intent::{ShaperError, ShapingIntent, ShapingLimits};
use crate::plan::ShapingPlan;

const IP_FORWARD_PATH: &str = "/proc/sys/net/ipv4/ip_forward";

/// Execute every operation of `plan`, in order.
pub async fn execute_plan(
    runner: &dyn CommandRunner,
    plan: &ShapingPlan,
) -> Result<(), ShaperError> {
    for op in &plan.ops {
        for argv in op.commands() {
            let args: Vec<&str> = argv.iter().map(String::as_str).collect();
            let out = runner.run("tc", &args).await;
            if out.success {
                continue;
            }
            if op.is_best_effort() {
                debug!(step = %op.describe(), "best-effort step failed, continuing");
                continue;
            }
            return Err(ShaperError::Execution {
                step: op.describe(),
                detail: out.diagnostic().to_string(),
            });
        }
    }
    Ok(())
}

/// Human-readable summary of what a successfully applied intent did.
pub fn summarize(intent: &ShapingIntent, limits: &ShapingLimits) -> String {
    if !intent.enabled {
        return "Traffic shaping disabled".to_string();
    }
    let mut parts = Vec::new();
    if intent.restricts_bandwidth(limits) {
        parts.push(format!(
            "Bandwidth limited to {} Mbps (both directions)",
            intent.bandwidth_mbps
        ));
    }
    if intent.delay_ms > 0 {
        parts.push(format!(
            "Packet delay set to {}ms (both directions)",
            intent.delay_ms
        ));
    }
    if parts.is_empty() {
        "Traffic shaping applied".to_string()
    } else {
        parts.join("; ")
    }
}

/// Turn on IPv4 forwarding.
///
/// Forwarding is what makes the shaped appliance pass traffic at all, but
/// it is independent of qdisc correctness, so failure here is logged and
/// never fails the apply.
pub async fn enable_ip_forwarding() {
    match tokio::fs::write(IP_FORWARD_PATH, "1").await {
        Ok(()) => info!("IP forwarding enabled"),
        Err(e) => warn!(error = %e, "failed to enable IP forwarding"),
    }
}
