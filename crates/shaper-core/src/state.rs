//! Desired-configuration state
//!
//! Single owner of the process-wide [`ShapingIntent`]. An update runs the
//! whole validate → detect → compile → apply → commit sequence under one
//! lock, so two concurrent applies can never interleave clear/create
//! operations on the same interfaces. Reads take a snapshot and never
//! observe a half-updated record.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{info, warn};

use crate::apply::{enable_ip_forwarding, execute_plan, summarize};
use crate::command::CommandRunner;
use crate::iface::InterfaceLookup;
use crate::intent::{ShaperError, ShapingIntent, ShapingLimits};
use crate::plan::{compile, ShapingOp, ShapingPlan};
use crate::subnet;

pub struct Shaper {
    runner: Arc<dyn CommandRunner>,
    interfaces: Arc<dyn InterfaceLookup>,
    limits: ShapingLimits,
    intent: RwLock<ShapingIntent>,
    // The intent lock alone is not enough: kernel operations happen
    // between reading the old intent and committing the new one.
    apply_lock: Mutex<()>,
}

impl Shaper {
    pub fn new(
        runner: Arc<dyn CommandRunner>,
        interfaces: Arc<dyn InterfaceLookup>,
        limits: ShapingLimits,
    ) -> Self {
        Self {
            runner,
            interfaces,
            limits,
            intent: RwLock::new(ShapingIntent::default()),
            apply_lock: Mutex::new(()),
        }
    }

    /// Snapshot of the committed configuration.
    pub async fn current(&self) -> ShapingIntent {
        self.intent.read().await.clone()
    }

    /// Validate, apply, and commit a new shaping intent.
    ///
    /// The new intent replaces the committed one only after every kernel
    /// operation succeeded (or the intent disables shaping, which cannot
    /// fail: clears are idempotent). On error the previous intent stays
    /// committed, though operations applied before the failing step remain
    /// in effect in the kernel.
    pub async fn update(&self, new_intent: ShapingIntent) -> Result<String, ShaperError> {
        let _guard = self.apply_lock.lock().await;

        new_intent.validate(&self.limits, self.interfaces.as_ref())?;

        let message = if new_intent.enabled {
            let Some(output_iface) = new_intent.interface_out.as_deref() else {
                return Err(ShaperError::Validation(
                    "Both input and output interfaces must be specified".to_string(),
                ));
            };
            let detected = subnet::detect(self.runner.as_ref(), output_iface).await;
            if detected.fallback {
                warn!(network = %detected.network, "shaping with fallback subnet");
            }
            let plan = compile(&new_intent, &detected, &self.limits)?;
            execute_plan(self.runner.as_ref(), &plan).await?;
            enable_ip_forwarding().await;
            summarize(&new_intent, &self.limits)
        } else {
            let plan = self.disable_plan(&new_intent);
            execute_plan(self.runner.as_ref(), &plan).await?;
            "Traffic shaping disabled".to_string()
        };

        *self.intent.write().await = new_intent.clone();
        info!(?new_intent, "configuration updated");
        Ok(message)
    }

    /// Force the disabled state and clear every shapeable interface.
    pub async fn reset(&self) -> Result<String, ShaperError> {
        let _guard = self.apply_lock.lock().await;

        let plan = clear_all(self.interfaces.as_ref());
        execute_plan(self.runner.as_ref(), &plan).await?;

        *self.intent.write().await = ShapingIntent::default();
        info!("configuration reset to default");
        Ok("Traffic shaping reset to default state".to_string())
    }

    /// Clear plan for a disable intent: the named pair when present,
    /// otherwise every shapeable interface on the host.
    fn disable_plan(&self, intent: &ShapingIntent) -> ShapingPlan {
        if intent.interface_in.is_some() || intent.interface_out.is_some() {
            let ops = [&intent.interface_in, &intent.interface_out]
                .into_iter()
                .flatten()
                .map(|iface| ShapingOp::Clear {
                    iface: iface.clone(),
                })
                .collect();
            ShapingPlan { ops }
        } else {
            clear_all(self.interfaces.as_ref())
        }
    }
}

fn clear_all(interfaces: &dyn InterfaceLookup) -> ShapingPlan {
    let ops = interfaces
        .names()
        .into_iter()
        .map(|iface| ShapingOp::Clear { iface })
        .collect();
    ShapingPlan { ops }
}
