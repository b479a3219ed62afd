//! Live subnet detection for filter scoping
//!
//! The source filter on the input interface is scoped to the network the
//! shaped traffic actually lives in. Detection is best-effort: when the
//! interface has no address or the lookup fails we fall back to a fixed
//! network and keep shaping, recording the fallback on the result so
//! callers and tests can observe it.

use std::net::Ipv4Addr;

use ipnetwork::Ipv4Network;
use tracing::{debug, warn};

use crate::command::CommandRunner;

/// Network used when live detection fails.
pub const FALLBACK_NETWORK: Ipv4Addr = Ipv4Addr::new(172, 22, 22, 0);
pub const FALLBACK_PREFIX: u8 = 24;

/// CIDR network derived from an interface's current address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DetectedSubnet {
    pub network: Ipv4Network,
    /// True when detection failed and `network` is the fixed fallback.
    pub fallback: bool,
}

impl DetectedSubnet {
    pub fn detected(network: Ipv4Network) -> Self {
        Self {
            network,
            fallback: false,
        }
    }

    pub fn fallback() -> Self {
        // the fallback constants always form a valid network
        let network = Ipv4Network::new(FALLBACK_NETWORK, FALLBACK_PREFIX)
            .unwrap_or_else(|_| unreachable!("fallback network is valid"));
        Self {
            network,
            fallback: true,
        }
    }
}

/// Derive the CIDR network containing `interface`'s primary IPv4 address.
///
/// Never fails: a missing address, an unparseable reply, or a failed `ip`
/// invocation all degrade to the fallback network.
pub async fn detect(runner: &dyn CommandRunner, interface: &str) -> DetectedSubnet {
    let out = runner
        .run("ip", &["-o", "-4", "addr", "show", "dev", interface])
        .await;
    if !out.success {
        warn!(
            interface,
            detail = out.diagnostic(),
            "address lookup failed, using fallback subnet"
        );
        return DetectedSubnet::fallback();
    }

    match parse_first_inet(&out.stdout) {
        Some(network) => {
            debug!(interface, %network, "detected subnet");
            DetectedSubnet::detected(network)
        }
        None => {
            warn!(interface, "no IPv4 address found, using fallback subnet");
            DetectedSubnet::fallback()
        }
    }
}

/// Pull the first `inet a.b.c.d/len` out of `ip -o -4 addr show` output and
/// zero the host bits.
fn parse_first_inet(output: &str) -> Option<Ipv4Network> {
    let mut tokens = output.split_whitespace();
    while let Some(token) = tokens.next() {
        if token != "inet" {
            continue;
        }
        let addr = tokens.next()?;
        let parsed: Ipv4Network = addr.parse().ok()?;
        return Ipv4Network::new(parsed.network(), parsed.prefix()).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::command::CmdOutput;
    use async_trait::async_trait;

    struct Scripted(CmdOutput);

    #[async_trait]
    impl CommandRunner for Scripted {
        async fn run(&self, _program: &str, _args: &[&str]) -> CmdOutput {
            self.0.clone()
        }
    }

    #[tokio::test]
    async fn masks_host_bits_from_interface_address() {
        let runner = Scripted(CmdOutput::ok(
            "2: enp1s0    inet 192.168.100.17/24 brd 192.168.100.255 scope global enp1s0\\",
        ));
        let subnet = detect(&runner, "enp1s0").await;
        assert!(!subnet.fallback);
        assert_eq!(subnet.network.to_string(), "192.168.100.0/24");
    }

    #[tokio::test]
    async fn command_failure_falls_back() {
        let runner = Scripted(CmdOutput::failed("Device \"enp1s0\" does not exist."));
        let subnet = detect(&runner, "enp1s0").await;
        assert!(subnet.fallback);
        assert_eq!(subnet.network.to_string(), "172.22.22.0/24");
    }

    #[tokio::test]
    async fn addressless_interface_falls_back() {
        let runner = Scripted(CmdOutput::ok(""));
        let subnet = detect(&runner, "enp2s0").await;
        assert!(subnet.fallback);
    }

    #[test]
    fn parses_only_the_first_inet_entry() {
        let out = "2: eth0 inet 10.1.2.3/16 scope global\n2: eth0 inet 10.9.9.9/24 secondary\n";
        let network = parse_first_inet(out).unwrap();
        assert_eq!(network.to_string(), "10.1.0.0/16");
    }
}
