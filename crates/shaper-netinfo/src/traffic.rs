//! Traffic-rate sampling from interface byte counters
//!
//! Keeps the previous `/proc/net/dev` sample and derives per-interface
//! throughput from the delta. This read path is independent of the shaping
//! apply path and holds only its own lock.

use std::collections::HashMap;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use serde::Serialize;
use shaper_core::CommandRunner;
use thiserror::Error;
use tokio::sync::RwLock;

const PROC_NET_DEV: &str = "/proc/net/dev";

#[derive(Error, Debug)]
pub enum TrafficError {
    #[error("failed to read {PROC_NET_DEV}: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CounterSample {
    pub rx_bytes: u64,
    pub tx_bytes: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceSpeed {
    pub rx_mbps: f64,
    pub tx_mbps: f64,
    pub rx_bytes_total: u64,
    pub tx_bytes_total: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceLinkState {
    pub is_up: bool,
    pub ip_address: Option<String>,
    pub has_traffic: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct TrafficReport {
    pub interfaces: HashMap<String, InterfaceSpeed>,
    pub total_download_speed: f64,
    pub total_upload_speed: f64,
    pub interface_info: HashMap<String, InterfaceLinkState>,
    pub timestamp: f64,
}

/// Stateful sampler: the first call primes the counters, later calls
/// report rates over the elapsed window.
pub struct TrafficMonitor {
    previous: RwLock<Option<(Instant, HashMap<String, CounterSample>)>>,
}

impl TrafficMonitor {
    pub fn new() -> Self {
        Self {
            previous: RwLock::new(None),
        }
    }

    pub async fn report(&self, runner: &dyn CommandRunner) -> Result<TrafficReport, TrafficError> {
        let content = tokio::fs::read_to_string(PROC_NET_DEV).await?;
        let current = parse_proc_net_dev(&content);
        let now = Instant::now();

        let mut speeds = HashMap::new();
        let mut total_rx = 0.0;
        let mut total_tx = 0.0;

        {
            let mut previous = self.previous.write().await;
            if let Some((sampled_at, samples)) = previous.as_ref() {
                let elapsed = now.duration_since(*sampled_at).as_secs_f64();
                if elapsed > 0.0 {
                    for (name, sample) in &current {
                        let Some(prev) = samples.get(name) else {
                            continue;
                        };
                        let rx_rate = sample.rx_bytes.saturating_sub(prev.rx_bytes) as f64 / elapsed;
                        let tx_rate = sample.tx_bytes.saturating_sub(prev.tx_bytes) as f64 / elapsed;
                        let speed = InterfaceSpeed {
                            rx_mbps: bytes_per_sec_to_mbps(rx_rate),
                            tx_mbps: bytes_per_sec_to_mbps(tx_rate),
                            rx_bytes_total: sample.rx_bytes,
                            tx_bytes_total: sample.tx_bytes,
                        };
                        if name != "lo" {
                            total_rx += speed.rx_mbps;
                            total_tx += speed.tx_mbps;
                        }
                        speeds.insert(name.clone(), speed);
                    }
                }
            }
            *previous = Some((now, current));
        }

        let addrs = super::interfaces::ipv4_addresses(runner).await;
        let mut interface_info = HashMap::new();
        for name in super::interfaces::names() {
            let ip_address = addrs.get(&name).cloned();
            interface_info.insert(
                name.clone(),
                InterfaceLinkState {
                    is_up: ip_address.is_some(),
                    ip_address,
                    has_traffic: speeds.contains_key(&name),
                },
            );
        }

        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);

        Ok(TrafficReport {
            interfaces: speeds,
            total_download_speed: total_rx,
            total_upload_speed: total_tx,
            interface_info,
            timestamp,
        })
    }
}

impl Default for TrafficMonitor {
    fn default() -> Self {
        Self::new()
    }
}

fn bytes_per_sec_to_mbps(rate: f64) -> f64 {
    ((rate * 8.0) / (1024.0 * 1024.0)).max(0.0)
}

/// Parse `/proc/net/dev`: two header lines, then
/// `iface: rx_bytes rx_packets ... (8 fields) tx_bytes ...`.
pub(crate) fn parse_proc_net_dev(content: &str) -> HashMap<String, CounterSample> {
    let mut map = HashMap::new();
    for line in content.lines().skip(2) {
        let mut parts = line.split_whitespace();
        let Some(name) = parts.next() else { continue };
        let name = name.trim_end_matches(':');
        let fields: Vec<&str> = parts.collect();
        if fields.len() < 16 {
            continue;
        }
        let (Ok(rx_bytes), Ok(tx_bytes)) = (fields[0].parse::<u64>(), fields[8].parse::<u64>())
        else {
            continue;
        };
        map.insert(name.to_string(), CounterSample { rx_bytes, tx_bytes });
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Inter-|   Receive                                                |  Transmit
 face |bytes    packets errs drop fifo frame compressed multicast|bytes    packets errs drop fifo colls carrier compressed
    lo:  104013    1042    0    0    0     0          0         0   104013    1042    0    0    0     0       0          0
enp1s0: 7743914   12345    0    0    0     0          0         0  2937177    9876    0    0    0     0       0          0
";

    #[test]
    fn parses_counters_per_interface() {
        let map = parse_proc_net_dev(SAMPLE);
        assert_eq!(
            map.get("enp1s0"),
            Some(&CounterSample {
                rx_bytes: 7_743_914,
                tx_bytes: 2_937_177,
            })
        );
        assert_eq!(
            map.get("lo"),
            Some(&CounterSample {
                rx_bytes: 104_013,
                tx_bytes: 104_013,
            })
        );
    }

    #[test]
    fn short_lines_are_skipped() {
        assert!(parse_proc_net_dev("h1\nh2\ngarbage line\n").is_empty());
    }

    #[test]
    fn rate_conversion_clamps_negative() {
        assert_eq!(bytes_per_sec_to_mbps(-5.0), 0.0);
        let mbps = bytes_per_sec_to_mbps(1024.0 * 1024.0 / 8.0);
        assert!((mbps - 1.0).abs() < f64::EPSILON);
    }
}
