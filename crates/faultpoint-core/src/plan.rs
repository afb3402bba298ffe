//! Fault plans: a JSON description of groups to set up in one go.
//!
//! ```json
//! {
//!   "seed": 7,
//!   "groups": [
//!     {
//!       "id": 0,
//!       "points": ["0x9c0e2f3a1b4d5e6f"],
//!       "error": { "errors": "EIO,ENOSPC", "times": 3 },
//!       "delay": { "delay_us": 500, "probability": 25 }
//!     }
//!   ]
//! }
//! ```
//!
//! A kind mentioned in a group is enabled unless it says
//! `"enabled": false`.  Applying a plan is all or nothing: if any step
//! fails, the groups created so far are deleted again.

use crate::config::{FaultConfig, FaultKind};
use crate::error::Result;
use crate::group::GroupId;
use crate::injector::FaultInjector;
use crate::site::Address;
use log::{info, warn};
use serde::{Deserialize, Serialize};
use snafu::Snafu;
use std::fs;
use std::path::Path;

/// Errors from loading or saving plan files.
#[derive(Debug, Snafu)]
pub enum PlanError {
    #[snafu(display("I/O error"), context(false))]
    Io { source: std::io::Error },

    #[snafu(display("JSON error"), context(false))]
    Json { source: serde_json::Error },
}

/// Groups to create and configure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FaultPlan {
    /// Preferred injector seed.  Only consulted by whoever builds the
    /// injector; applying a plan never reseeds.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(default)]
    pub groups: Vec<GroupPlan>,
}

/// One group of a plan.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupPlan {
    /// Explicit id, or the lowest free one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    /// Member addresses, in hex.
    #[serde(default)]
    pub points: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay: Option<KindPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<KindPlan>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub panic: Option<KindPlan>,
}

impl GroupPlan {
    fn kind(&self, kind: FaultKind) -> Option<&KindPlan> {
        match kind {
            FaultKind::Delay => self.delay.as_ref(),
            FaultKind::Error => self.error.as_ref(),
            FaultKind::Panic => self.panic.as_ref(),
        }
    }
}

/// Settings for one kind.  Unset fields keep their defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KindPlan {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub times: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub probability: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub task_filter: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delay_us: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<String>,
}

fn enabled_by_default() -> bool {
    true
}

impl Default for KindPlan {
    fn default() -> Self {
        Self {
            enabled: true,
            times: None,
            probability: None,
            interval: None,
            task_filter: None,
            delay_us: None,
            errors: None,
        }
    }
}

impl KindPlan {
    fn apply(&self, config: &FaultConfig) -> Result<()> {
        if let Some(times) = self.times {
            config.set_times(times)?;
        }
        if let Some(probability) = self.probability {
            config.set_probability(probability)?;
        }
        if let Some(interval) = self.interval {
            config.set_interval(interval)?;
        }
        if let Some(task_filter) = self.task_filter {
            config.set_task_filter(task_filter);
        }
        if let Some(micros) = self.delay_us {
            config.set_delay_us(micros)?;
        }
        if let Some(errors) = &self.errors {
            config.set_errors(errors)?;
        }
        Ok(())
    }
}

impl FaultPlan {
    pub fn from_json(text: &str) -> Result<FaultPlan, PlanError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn to_json(&self) -> Result<String, PlanError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Read a plan from a JSON file.
pub fn load_plan(path: &Path) -> Result<FaultPlan, PlanError> {
    let json = fs::read_to_string(path)?;
    let plan = FaultPlan::from_json(&json)?;
    info!(
        "loaded fault plan from {} ({} groups)",
        path.display(),
        plan.groups.len()
    );
    Ok(plan)
}

/// Write a plan as pretty-printed JSON.
pub fn save_plan(plan: &FaultPlan, path: &Path) -> Result<(), PlanError> {
    fs::write(path, plan.to_json()?)?;
    info!("saved fault plan to {}", path.display());
    Ok(())
}

impl FaultInjector {
    /// Create and configure every group of `plan`.  Kinds are enabled only
    /// after all groups are fully configured.
    ///
    /// On failure every group created by this call is deleted and the
    /// error returned.  Other requests may interleave with a plan being
    /// applied.
    pub fn apply_plan(&self, plan: &FaultPlan) -> Result<Vec<GroupId>> {
        let mut created = Vec::with_capacity(plan.groups.len());
        match self.apply_groups(plan, &mut created) {
            Ok(()) => {
                info!("applied fault plan: {} groups", created.len());
                Ok(created)
            }
            Err(e) => {
                warn!("fault plan rejected ({e}), rolling back {} groups", created.len());
                for &id in created.iter().rev() {
                    // Already gone if someone else deleted it meanwhile.
                    let _ = self.delete_group(id);
                }
                Err(e)
            }
        }
    }

    fn apply_groups(&self, plan: &FaultPlan, created: &mut Vec<GroupId>) -> Result<()> {
        for group in &plan.groups {
            let id = match group.id {
                Some(raw) => self.create_group(raw)?,
                None => self.create_next_group()?,
            };
            created.push(id);

            for address in &group.points {
                self.add_fault_point(id, address.parse::<Address>()?)?;
            }
            for kind in FaultKind::ALL {
                if let Some(settings) = group.kind(kind) {
                    self.configure(id, kind, |config| settings.apply(config))?;
                }
            }
        }

        for (group, &id) in plan.groups.iter().zip(created.iter()) {
            for kind in FaultKind::ALL {
                if let Some(settings) = group.kind(kind) {
                    self.set_enabled(id, kind, settings.enabled)?;
                }
            }
        }
        Ok(())
    }
}
