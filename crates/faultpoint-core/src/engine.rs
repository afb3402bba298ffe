//! The decision engine: what an armed fault point does on one invocation.
//!
//! Every kind of the point's group is evaluated independently, in the
//! order delay, error, panic:
//!
//! 1. a disabled kind is skipped without touching its counters;
//! 2. `hits` is incremented;
//! 3. with `task_filter` set, unmarked tasks stop here;
//! 4. only hits where `hits % interval == 0` go on;
//! 5. a roll in `1..=100` must be `<= probability`;
//! 6. one unit of `times` is consumed (unless unlimited) and `injected`
//!    is incremented.  An exhausted budget (`times == 0`) never fires.
//!
//! The combined [`Decision`] is then executed at the call site: a fired
//! delay sleeps first, a fired panic aborts, otherwise a fired error is
//! returned.  An error kind with an empty list still counts as fired but
//! returns nothing.

use crate::config::FaultKind;
use crate::errno::Errno;
use crate::filter::TaskFilter;
use crate::group::FaultGroup;
use crate::hooks::FaultHooks;
use crate::point::FaultPoint;
use log::{debug, error};
use std::fmt;
use std::sync::Arc;

/// Outcome of evaluating one invocation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Decision {
    /// Microseconds to sleep, if the delay kind fired.
    pub delay_us: Option<u32>,
    /// Error to return, if the error kind fired with a non-empty list.
    pub error: Option<Errno>,
    /// Whether the panic kind fired.
    pub panic: bool,
}

impl Decision {
    pub const NONE: Decision = Decision {
        delay_us: None,
        error: None,
        panic: false,
    };

    pub fn is_none(&self) -> bool {
        *self == Decision::NONE
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_none() {
            return write!(f, "none");
        }
        let mut parts = Vec::new();
        if let Some(us) = self.delay_us {
            parts.push(format!("delay {us}us"));
        }
        if let Some(errno) = self.error {
            parts.push(format!("error {errno}"));
        }
        if self.panic {
            parts.push("panic".to_string());
        }
        write!(f, "{}", parts.join(" + "))
    }
}

/// The engine shared by all points of one injector.
pub struct DecisionEngine {
    hooks: Arc<dyn FaultHooks>,
    filter: Arc<dyn TaskFilter>,
}

impl DecisionEngine {
    pub fn new(hooks: Arc<dyn FaultHooks>, filter: Arc<dyn TaskFilter>) -> Self {
        Self { hooks, filter }
    }

    /// Evaluate one invocation against `group`, asking the task filter
    /// whether the caller is marked.
    pub fn decide(&self, group: &FaultGroup) -> Decision {
        self.decide_for(group, self.filter.is_marked())
    }

    /// Evaluate one invocation against `group` for a caller whose mark is
    /// already known.  Updates counters but has no other side effects.
    pub fn decide_for(&self, group: &FaultGroup, marked: bool) -> Decision {
        let mut decision = Decision::NONE;
        for kind in FaultKind::ALL {
            let config = group.config(kind);
            if !config.try_fire(marked, || group.roll_percent()) {
                continue;
            }
            match kind {
                FaultKind::Delay => decision.delay_us = config.delay_us(),
                FaultKind::Error => decision.error = config.select_error(),
                FaultKind::Panic => decision.panic = true,
            }
        }
        decision
    }

    /// Full evaluation for an armed point: decide, then carry out delay and
    /// panic.  Returns the error to inject.
    pub(crate) fn evaluate(&self, point: &FaultPoint) -> Option<Errno> {
        // Detached between the armed check and here.
        let group = point.group()?;
        let decision = self.decide(&group);
        if decision.is_none() {
            return None;
        }
        debug!(
            "fault fired at {} (group {}): {decision}",
            point.address(),
            group.id()
        );
        self.execute(point, decision)
    }

    fn execute(&self, point: &FaultPoint, decision: Decision) -> Option<Errno> {
        if let Some(micros) = decision.delay_us {
            self.hooks.delay(micros);
        }
        if decision.panic {
            error!("injected panic at {} {}", point.address(), point.site());
            self.hooks.abort(point.site());
        }
        decision.error
    }
}

impl fmt::Debug for DecisionEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionEngine").finish_non_exhaustive()
    }
}
