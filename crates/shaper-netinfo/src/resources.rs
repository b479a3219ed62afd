//! Host resource and system snapshots

use serde::Serialize;
use shaper_core::CommandRunner;
use sysinfo::System;

#[derive(Debug, Clone, Serialize)]
pub struct ResourceSnapshot {
    pub cpu_percent: f32,
    pub memory_percent: f32,
    pub memory_available_gb: f64,
}

/// Sample CPU and memory usage. CPU usage needs two refreshes a short
/// interval apart to produce a meaningful figure.
pub async fn sample_resources() -> ResourceSnapshot {
    let mut sys = System::new();
    sys.refresh_cpu_usage();
    sys.refresh_memory();
    tokio::time::sleep(sysinfo::MINIMUM_CPU_UPDATE_INTERVAL).await;
    sys.refresh_cpu_usage();

    let total = sys.total_memory() as f64;
    let available = sys.available_memory() as f64;
    let memory_percent = if total > 0.0 {
        (((total - available) / total) * 100.0) as f32
    } else {
        0.0
    };

    ResourceSnapshot {
        cpu_percent: sys.global_cpu_usage(),
        memory_percent,
        memory_available_gb: round2(available / f64::from(1 << 30)),
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SystemReport {
    pub kernel_version: String,
    pub has_root: bool,
    pub has_tc: bool,
    pub available_interfaces: Vec<String>,
    pub cpu_count: usize,
    pub memory_total_gb: f64,
}

/// Detailed system information for the diagnostics endpoint.
pub async fn system_report(runner: &dyn CommandRunner) -> SystemReport {
    let mut sys = System::new();
    sys.refresh_cpu_list(sysinfo::CpuRefreshKind::nothing());
    sys.refresh_memory();

    SystemReport {
        kernel_version: System::kernel_version().unwrap_or_else(|| "unknown".to_string()),
        has_root: has_root_privileges(),
        has_tc: tc_available(runner).await,
        available_interfaces: super::interfaces::names(),
        cpu_count: sys.cpus().len(),
        memory_total_gb: round2(sys.total_memory() as f64 / f64::from(1 << 30)),
    }
}

/// Whether the process runs with root privileges (required for `tc`).
pub fn has_root_privileges() -> bool {
    nix::unistd::geteuid().is_root()
}

/// Whether the `tc` binary is present and runnable.
pub async fn tc_available(runner: &dyn CommandRunner) -> bool {
    runner.run("tc", &["-V"]).await.success
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round2_keeps_two_decimals() {
        assert_eq!(round2(3.14159), 3.14);
        assert_eq!(round2(2.0), 2.0);
    }

    #[tokio::test]
    async fn resource_snapshot_is_in_range() {
        let snapshot = sample_resources().await;
        assert!(snapshot.memory_percent >= 0.0 && snapshot.memory_percent <= 100.0);
        assert!(snapshot.memory_available_gb >= 0.0);
    }
}
