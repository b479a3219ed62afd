//! Shaping intent data model and validation

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::iface::InterfaceLookup;

/// Errors surfaced by the shaping engine.
///
/// `Validation` never reaches the kernel; `Execution` names the first
/// failing plan step together with the captured diagnostic so the operator
/// can see which kernel object failed to create.
#[derive(Error, Debug)]
pub enum ShaperError {
    #[error("{0}")]
    Validation(String),

    #[error("Failed to {step}: {detail}")]
    Execution { step: String, detail: String },
}

/// Bounds enforced on incoming shaping intents.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShapingLimits {
    pub max_delay_ms: u32,
    pub min_bandwidth_mbps: f64,
    /// Bandwidth at or above this value means "unlimited": no rate
    /// hierarchy is compiled.
    pub max_bandwidth_mbps: f64,
}

impl Default for ShapingLimits {
    fn default() -> Self {
        Self {
            max_delay_ms: 10_000,
            min_bandwidth_mbps: 0.1,
            max_bandwidth_mbps: 1000.0,
        }
    }
}

fn default_bandwidth() -> f64 {
    1000.0
}

/// Desired traffic-shaping configuration.
///
/// A single process-wide instance of this record is the source of truth;
/// it is replaced wholesale on each successful update, never partially
/// mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapingIntent {
    pub enabled: bool,
    #[serde(default)]
    pub delay_ms: u32,
    #[serde(default = "default_bandwidth")]
    pub bandwidth_mbps: f64,
    #[serde(default)]
    pub interface_in: Option<String>,
    #[serde(default)]
    pub interface_out: Option<String>,
}

impl Default for ShapingIntent {
    fn default() -> Self {
        Self {
            enabled: false,
            delay_ms: 0,
            bandwidth_mbps: default_bandwidth(),
            interface_in: None,
            interface_out: None,
        }
    }
}

impl ShapingIntent {
    /// Whether this intent asks for a bandwidth restriction (anything at or
    /// above the configured maximum is the "unlimited" sentinel).
    pub fn restricts_bandwidth(&self, limits: &ShapingLimits) -> bool {
        self.bandwidth_mbps < limits.max_bandwidth_mbps
    }

    /// Check the intent against the data-model invariants.
    ///
    /// Range checks apply to every intent; the interface pair is only
    /// required when enabling.
    pub fn validate(
        &self,
        limits: &ShapingLimits,
        interfaces: &dyn InterfaceLookup,
    ) -> Result<(), ShaperError> {
        if self.delay_ms > limits.max_delay_ms {
            return Err(ShaperError::Validation(format!(
                "Delay cannot exceed {}ms",
                limits.max_delay_ms
            )));
        }

        if self.bandwidth_mbps <= 0.0 {
            return Err(ShaperError::Validation(
                "Bandwidth must be positive".to_string(),
            ));
        }
        if self.bandwidth_mbps > limits.max_bandwidth_mbps {
            return Err(ShaperError::Validation(format!(
                "Bandwidth cannot exceed {} Mbps",
                limits.max_bandwidth_mbps
            )));
        }
        if self.bandwidth_mbps < limits.min_bandwidth_mbps {
            return Err(ShaperError::Validation(format!(
                "Bandwidth cannot be less than {} Mbps",
                limits.min_bandwidth_mbps
            )));
        }

        if self.enabled {
            let (input, output) = match (
                self.interface_in.as_deref(),
                self.interface_out.as_deref(),
            ) {
                (Some(i), Some(o)) if !i.is_empty() && !o.is_empty() => (i, o),
                _ => {
                    return Err(ShaperError::Validation(
                        "Both input and output interfaces must be specified".to_string(),
                    ))
                }
            };
            if input == output {
                return Err(ShaperError::Validation(
                    "Input and output interfaces must be distinct".to_string(),
                ));
            }
            for name in [input, output] {
                if !interfaces.exists(name) {
                    return Err(ShaperError::Validation(format!(
                        "Invalid interface: {name}"
                    )));
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iface::FixedInterfaces;

    fn two_nics() -> FixedInterfaces {
        FixedInterfaces::new(["eth0", "eth1"])
    }

    fn enabled_intent() -> ShapingIntent {
        ShapingIntent {
            enabled: true,
            delay_ms: 50,
            bandwidth_mbps: 10.0,
            interface_in: Some("eth0".to_string()),
            interface_out: Some("eth1".to_string()),
        }
    }

    #[test]
    fn default_intent_is_disabled_and_valid() {
        let intent = ShapingIntent::default();
        assert!(!intent.enabled);
        assert!(intent
            .validate(&ShapingLimits::default(), &two_nics())
            .is_ok());
    }

    #[test]
    fn rejects_excessive_delay() {
        let intent = ShapingIntent {
            delay_ms: 10_001,
            ..enabled_intent()
        };
        let err = intent
            .validate(&ShapingLimits::default(), &two_nics())
            .unwrap_err();
        assert!(matches!(err, ShaperError::Validation(_)));
    }

    #[test]
    fn rejects_bandwidth_outside_range() {
        for bw in [0.05, 1000.5] {
            let intent = ShapingIntent {
                bandwidth_mbps: bw,
                ..enabled_intent()
            };
            assert!(intent
                .validate(&ShapingLimits::default(), &two_nics())
                .is_err());
        }
        // the maximum itself is the "unlimited" sentinel and is accepted
        let intent = ShapingIntent {
            bandwidth_mbps: 1000.0,
            ..enabled_intent()
        };
        assert!(intent
            .validate(&ShapingLimits::default(), &two_nics())
            .is_ok());
    }

    #[test]
    fn enabling_requires_two_distinct_known_interfaces() {
        let missing = ShapingIntent {
            interface_out: None,
            ..enabled_intent()
        };
        assert!(missing
            .validate(&ShapingLimits::default(), &two_nics())
            .is_err());

        let same = ShapingIntent {
            interface_out: Some("eth0".to_string()),
            ..enabled_intent()
        };
        assert!(same
            .validate(&ShapingLimits::default(), &two_nics())
            .is_err());

        let unknown = ShapingIntent {
            interface_out: Some("wlan9".to_string()),
            ..enabled_intent()
        };
        assert!(unknown
            .validate(&ShapingLimits::default(), &two_nics())
            .is_err());
    }
}
