//! Network interface enumeration
//!
//! Names come from `/sys/class/net` (loopback and docker bridges are
//! skipped), link attributes from the per-interface sysfs files, and IPv4
//! addresses from a single `ip -o -4 addr show` query.

use std::collections::HashMap;
use std::path::Path;

use serde::Serialize;
use shaper_core::CommandRunner;

const SYS_CLASS_NET: &str = "/sys/class/net";

#[derive(Debug, Clone, Serialize)]
pub struct InterfaceInfo {
    pub name: String,
    pub ip_address: Option<String>,
    pub mac_address: Option<String>,
    pub is_up: bool,
    /// Link speed in Mbps; 0 when the driver does not report one.
    pub speed: u64,
    pub mtu: u32,
}

/// Enumerate the host's shapeable interfaces with their link attributes.
pub async fn list(runner: &dyn CommandRunner) -> Vec<InterfaceInfo> {
    let addrs = ipv4_addresses(runner).await;
    names()
        .into_iter()
        .map(|name| {
            let ip_address = addrs.get(&name).cloned();
            read_link_info(&name, ip_address)
        })
        .collect()
}

/// Interface names under `/sys/class/net`, loopback and docker excluded.
pub fn names() -> Vec<String> {
    let mut names = Vec::new();
    let Ok(entries) = std::fs::read_dir(SYS_CLASS_NET) else {
        return names;
    };
    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name == "lo" || name.starts_with("docker") {
            continue;
        }
        names.push(name);
    }
    names.sort();
    names
}

/// IPv4 address per interface, from one `ip -o -4 addr show` invocation.
pub async fn ipv4_addresses(runner: &dyn CommandRunner) -> HashMap<String, String> {
    let out = runner.run("ip", &["-o", "-4", "addr", "show"]).await;
    if !out.success {
        return HashMap::new();
    }
    parse_addr_lines(&out.stdout)
}

/// Parse `ip -o -4 addr show` output: one line per address,
/// `<idx>: <iface>    inet <addr>/<len> ...`. First address per interface
/// wins.
pub(crate) fn parse_addr_lines(output: &str) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for line in output.lines() {
        let mut tokens = line.split_whitespace();
        let _index = tokens.next();
        let Some(name) = tokens.next() else { continue };
        let mut rest = tokens;
        while let Some(token) = rest.next() {
            if token != "inet" {
                continue;
            }
            if let Some(cidr) = rest.next() {
                let addr = cidr.split('/').next().unwrap_or(cidr);
                map.entry(name.to_string())
                    .or_insert_with(|| addr.to_string());
            }
            break;
        }
    }
    map
}

fn read_link_info(name: &str, ip_address: Option<String>) -> InterfaceInfo {
    let base = Path::new(SYS_CLASS_NET).join(name);
    let read = |file: &str| -> Option<String> {
        std::fs::read_to_string(base.join(file))
            .ok()
            .map(|s| s.trim().to_string())
    };

    let mac_address = read("address").filter(|s| !s.is_empty());
    let is_up = read("operstate").as_deref() == Some("up");
    // reads as -1 on links without a negotiated rate
    let speed = read("speed")
        .and_then(|s| s.parse::<i64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(0) as u64;
    let mtu = read("mtu").and_then(|s| s.parse().ok()).unwrap_or(0);

    InterfaceInfo {
        name: name.to_string(),
        ip_address,
        mac_address,
        is_up,
        speed,
        mtu,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_one_address_per_interface() {
        let out = "\
2: enp1s0    inet 192.168.100.1/24 brd 192.168.100.255 scope global enp1s0\\       valid_lft forever preferred_lft forever
3: enp2s0    inet 10.0.0.5/16 brd 10.0.255.255 scope global dynamic enp2s0\\       valid_lft 85545sec preferred_lft 85545sec
3: enp2s0    inet 10.0.0.6/16 scope global secondary enp2s0\\       valid_lft forever preferred_lft forever
";
        let map = parse_addr_lines(out);
        assert_eq!(map.get("enp1s0").map(String::as_str), Some("192.168.100.1"));
        // the first (primary) address wins
        assert_eq!(map.get("enp2s0").map(String::as_str), Some("10.0.0.5"));
    }

    #[test]
    fn empty_output_yields_no_addresses() {
        assert!(parse_addr_lines("").is_empty());
    }
}
