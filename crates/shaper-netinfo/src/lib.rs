//! Host network introspection
//!
//! Read-only lookups around the shaping engine: interface enumeration,
//! traffic-counter sampling, host resources, ping diagnostics, and DHCP
//! lease inspection. Everything here is straightforward data lookup; the
//! state-machine complexity lives in `shaper-core`.

pub mod dhcp;
pub mod interfaces;
pub mod ping;
pub mod resources;
pub mod traffic;

pub use interfaces::InterfaceInfo;
pub use ping::PingReport;
pub use resources::{ResourceSnapshot, SystemReport};
pub use traffic::{TrafficMonitor, TrafficReport};
