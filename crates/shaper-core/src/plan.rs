//! Shaping plan compilation
//!
//! Turns a validated [`ShapingIntent`] into the ordered qdisc operation
//! sequence that realizes it. The ordering is a topological sort of kernel
//! object dependencies: a root qdisc must exist before a class can attach
//! to it, and a class must exist before a filter can target it or a child
//! qdisc can nest under it.

use crate::intent::{ShaperError, ShapingIntent, ShapingLimits};
use crate::subnet::DetectedSubnet;

/// Root handle for the input-side interface. The output side uses
/// [`HANDLE_OUT`] so repeated applies are reproducible and the two
/// interfaces can never collide.
pub const HANDLE_IN: u32 = 1;
pub const HANDLE_OUT: u32 = 2;

/// One kernel queuing-discipline operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShapingOp {
    /// Drop root and ingress qdiscs. Clearing a qdisc that does not exist
    /// is not an error.
    Clear { iface: String },
    AddRootHtb { iface: String, handle: u32 },
    AddHtbClass { iface: String, handle: u32, rate_kbit: u64 },
    AddSrcFilter { iface: String, handle: u32, subnet: String },
    AddMatchAllFilter { iface: String, handle: u32 },
    AddNetemChild { iface: String, parent: u32, delay_ms: u32 },
    AddNetemRoot { iface: String, delay_ms: u32 },
}

impl ShapingOp {
    /// Operations whose failure never aborts the plan.
    pub fn is_best_effort(&self) -> bool {
        matches!(self, Self::Clear { .. })
    }

    /// Human description of the step, used in failure messages.
    pub fn describe(&self) -> String {
        match self {
            Self::Clear { iface } => format!("clear qdiscs on {iface}"),
            Self::AddRootHtb { iface, .. } => format!("create HTB qdisc on {iface}"),
            Self::AddHtbClass { iface, .. } => format!("create HTB class on {iface}"),
            Self::AddSrcFilter { iface, .. } => format!("create subnet filter on {iface}"),
            Self::AddMatchAllFilter { iface, .. } => {
                format!("create match-all filter on {iface}")
            }
            Self::AddNetemChild { iface, .. } | Self::AddNetemRoot { iface, .. } => {
                format!("apply delay on {iface}")
            }
        }
    }

    /// The `tc` invocations realizing this operation, in order.
    pub fn commands(&self) -> Vec<Vec<String>> {
        fn argv(parts: &[&str]) -> Vec<String> {
            parts.iter().map(|s| s.to_string()).collect()
        }

        match self {
            Self::Clear { iface } => vec![
                argv(&["qdisc", "del", "dev", iface, "root"]),
                argv(&["qdisc", "del", "dev", iface, "ingress"]),
            ],
            Self::AddRootHtb { iface, handle } => vec![argv(&[
                "qdisc",
                "add",
                "dev",
                iface,
                "root",
                "handle",
                &format!("{handle}:"),
                "htb",
                "default",
                "30",
            ])],
            Self::AddHtbClass {
                iface,
                handle,
                rate_kbit,
            } => vec![argv(&[
                "class",
                "add",
                "dev",
                iface,
                "parent",
                &format!("{handle}:"),
                "classid",
                &format!("{handle}:1"),
                "htb",
                "rate",
                &format!("{rate_kbit}kbit"),
            ])],
            Self::AddSrcFilter {
                iface,
                handle,
                subnet,
            } => vec![argv(&[
                "filter",
                "add",
                "dev",
                iface,
                "protocol",
                "ip",
                "parent",
                &format!("{handle}:"),
                "prio",
                "1",
                "u32",
                "match",
                "ip",
                "src",
                subnet,
                "flowid",
                &format!("{handle}:1"),
            ])],
            Self::AddMatchAllFilter { iface, handle } => vec![argv(&[
                "filter",
                "add",
                "dev",
                iface,
                "protocol",
                "ip",
                "parent",
                &format!("{handle}:"),
                "prio",
                "1",
                "u32",
                "match",
                "u32",
                "0",
                "0",
                "flowid",
                &format!("{handle}:1"),
            ])],
            Self::AddNetemChild {
                iface,
                parent,
                delay_ms,
            } => vec![argv(&[
                "qdisc",
                "add",
                "dev",
                iface,
                "parent",
                &format!("{parent}:1"),
                "handle",
                &format!("{}:", parent * 10),
                "netem",
                "delay",
                &format!("{delay_ms}ms"),
            ])],
            Self::AddNetemRoot { iface, delay_ms } => vec![argv(&[
                "qdisc",
                "add",
                "dev",
                iface,
                "root",
                "netem",
                "delay",
                &format!("{delay_ms}ms"),
            ])],
        }
    }
}

/// Ordered operation sequence for one apply attempt. Owned by the applier
/// for the duration of a single apply and discarded afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShapingPlan {
    pub ops: Vec<ShapingOp>,
}

impl ShapingPlan {
    /// A plan consisting only of clears leaves the kernel unshaped; the
    /// caller treats this as an informational no-op, not an error.
    pub fn is_noop(&self) -> bool {
        self.ops.iter().all(ShapingOp::is_best_effort)
    }
}

/// Compile an intent into its operation plan.
///
/// Pure: no commands run here. The subnet scopes the source filter on the
/// input interface and is not consulted for disable plans.
pub fn compile(
    intent: &ShapingIntent,
    subnet: &DetectedSubnet,
    limits: &ShapingLimits,
) -> Result<ShapingPlan, ShaperError> {
    if !intent.enabled {
        let ops = [&intent.interface_in, &intent.interface_out]
            .into_iter()
            .flatten()
            .map(|iface| ShapingOp::Clear {
                iface: iface.clone(),
            })
            .collect();
        return Ok(ShapingPlan { ops });
    }

    let (input, output) = match (
        intent.interface_in.as_deref(),
        intent.interface_out.as_deref(),
    ) {
        (Some(i), Some(o)) if !i.is_empty() && !o.is_empty() => (i, o),
        _ => {
            return Err(ShaperError::Validation(
                "Both input and output interfaces must be specified".to_string(),
            ))
        }
    };

    let mut ops = vec![
        ShapingOp::Clear {
            iface: input.to_string(),
        },
        ShapingOp::Clear {
            iface: output.to_string(),
        },
    ];

    let restrict = intent.restricts_bandwidth(limits);
    if restrict {
        let rate_kbit = (intent.bandwidth_mbps * 1000.0).floor() as u64;
        // inbound side: scope to traffic sourced from the shaped subnet
        ops.push(ShapingOp::AddRootHtb {
            iface: input.to_string(),
            handle: HANDLE_IN,
        });
        ops.push(ShapingOp::AddHtbClass {
            iface: input.to_string(),
            handle: HANDLE_IN,
            rate_kbit,
        });
        ops.push(ShapingOp::AddSrcFilter {
            iface: input.to_string(),
            handle: HANDLE_IN,
            subnet: subnet.network.to_string(),
        });
        // outbound side: egress from the shaped subnet cannot be cheaply
        // pre-filtered by source here, so route everything into the class
        ops.push(ShapingOp::AddRootHtb {
            iface: output.to_string(),
            handle: HANDLE_OUT,
        });
        ops.push(ShapingOp::AddHtbClass {
            iface: output.to_string(),
            handle: HANDLE_OUT,
            rate_kbit,
        });
        ops.push(ShapingOp::AddMatchAllFilter {
            iface: output.to_string(),
            handle: HANDLE_OUT,
        });
    }

    if intent.delay_ms > 0 {
        if restrict {
            ops.push(ShapingOp::AddNetemChild {
                iface: input.to_string(),
                parent: HANDLE_IN,
                delay_ms: intent.delay_ms,
            });
            ops.push(ShapingOp::AddNetemChild {
                iface: output.to_string(),
                parent: HANDLE_OUT,
                delay_ms: intent.delay_ms,
            });
        } else {
            ops.push(ShapingOp::AddNetemRoot {
                iface: input.to_string(),
                delay_ms: intent.delay_ms,
            });
            ops.push(ShapingOp::AddNetemRoot {
                iface: output.to_string(),
                delay_ms: intent.delay_ms,
            });
        }
    }

    Ok(ShapingPlan { ops })
}
