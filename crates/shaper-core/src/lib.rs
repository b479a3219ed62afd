//! Traffic-shaping configuration engine
//!
//! Translates a desired shaping intent (enabled/disabled, packet delay,
//! bandwidth limit, interface pair) into an ordered sequence of kernel
//! queuing-discipline operations, executes them through an injectable
//! command runner, and keeps the single desired-configuration record
//! consistent with what was actually applied.

pub mod apply;
pub mod command;
pub mod iface;
pub mod intent;
pub mod plan;
pub mod state;
pub mod subnet;
pub mod testkit;

pub use command::{CmdOutput, CommandRunner, ProcessRunner};
pub use iface::{FixedInterfaces, InterfaceLookup, SysClassNet};
pub use intent::{ShaperError, ShapingIntent, ShapingLimits};
pub use plan::{compile, ShapingOp, ShapingPlan};
pub use state::Shaper;
pub use subnet::{detect, DetectedSubnet};
