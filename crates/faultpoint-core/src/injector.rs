//! The injector context: registry, group table and engine in one place.
//!
//! There is no process-wide state.  A program builds one [`FaultInjector`],
//! shares it (usually behind an `Arc`), registers its fault points with it
//! and lets a controller reconfigure groups at runtime.
//!
//! ```
//! use faultpoint_core::{fault_site, Errno, FaultInjector, FaultKind};
//!
//! let injector = FaultInjector::new(Default::default());
//! let point = injector.register(fault_site!()).unwrap();
//!
//! let group = injector.create_group(0).unwrap();
//! injector.add_fault_point(group, point.address()).unwrap();
//! injector
//!     .configure(group, FaultKind::Error, |config| config.set_errors("EIO"))
//!     .unwrap();
//! injector.set_enabled(group, FaultKind::Error, true).unwrap();
//!
//! assert_eq!(point.check(), Some(Errno::EIO));
//! ```

use crate::config::{FaultConfig, FaultKind};
use crate::engine::DecisionEngine;
use crate::error::{FaultError, Result};
use crate::filter::{TaskFilter, ThreadMarks};
use crate::group::{FaultGroup, GroupId, GroupStats};
use crate::hooks::{FaultHooks, PanicMode, StdHooks};
use crate::point::{FaultPoint, FaultPointInfo};
use crate::registry::{FaultPointRegistry, Listing};
use crate::site::{Address, FaultSite};
use crate::sync::lock;
use crate::table::GroupTable;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex};

/// Injector-wide settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct InjectorConfig {
    /// Seed for the per-group probability RNGs.
    pub seed: u64,
    /// How the default hooks carry out a panic fault.
    pub panic_mode: PanicMode,
}

impl Default for InjectorConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            panic_mode: PanicMode::Unwind,
        }
    }
}

/// Builder for a [`FaultInjector`] with custom hooks or task filter.
#[derive(Default)]
pub struct FaultInjectorBuilder {
    config: InjectorConfig,
    hooks: Option<Arc<dyn FaultHooks>>,
    filter: Option<Arc<dyn TaskFilter>>,
}

impl FaultInjectorBuilder {
    pub fn config(mut self, config: InjectorConfig) -> Self {
        self.config = config;
        self
    }

    pub fn seed(mut self, seed: u64) -> Self {
        self.config.seed = seed;
        self
    }

    pub fn panic_mode(mut self, panic_mode: PanicMode) -> Self {
        self.config.panic_mode = panic_mode;
        self
    }

    /// Replace the default sleep/panic hooks.  `panic_mode` is then
    /// ignored.
    pub fn hooks(mut self, hooks: Arc<dyn FaultHooks>) -> Self {
        self.hooks = Some(hooks);
        self
    }

    pub fn task_filter(mut self, filter: Arc<dyn TaskFilter>) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn build(self) -> FaultInjector {
        let hooks = self
            .hooks
            .unwrap_or_else(|| Arc::new(StdHooks::new(self.config.panic_mode)));
        let filter = self.filter.unwrap_or_else(|| Arc::new(ThreadMarks));
        info!(
            "fault injector ready (seed {}, panic mode {:?})",
            self.config.seed, self.config.panic_mode
        );
        FaultInjector {
            config: self.config,
            registry: FaultPointRegistry::new(),
            groups: GroupTable::new(self.config.seed),
            engine: Arc::new(DecisionEngine::new(hooks, filter)),
            control: Mutex::new(()),
        }
    }
}

/// Statistics for the whole injector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InjectorReport {
    pub seed: u64,
    /// Number of registered fault points.
    pub points: usize,
    /// Live groups, in id order.
    pub groups: Vec<GroupStats>,
}

impl InjectorReport {
    pub fn group(&self, id: GroupId) -> Option<&GroupStats> {
        self.groups.iter().find(|g| g.id == id)
    }

    pub fn total_injected(&self) -> u64 {
        self.groups
            .iter()
            .flat_map(|g| &g.kinds)
            .map(|k| k.injected)
            .sum()
    }
}

/// Owns every fault point and group of one program.
#[derive(Debug)]
pub struct FaultInjector {
    config: InjectorConfig,
    registry: FaultPointRegistry,
    groups: GroupTable,
    engine: Arc<DecisionEngine>,
    /// Serializes configuration changes.  Call sites never take it.
    control: Mutex<()>,
}

impl Default for FaultInjector {
    fn default() -> Self {
        Self::new(InjectorConfig::default())
    }
}

impl FaultInjector {
    pub fn new(config: InjectorConfig) -> Self {
        Self::builder().config(config).build()
    }

    pub fn builder() -> FaultInjectorBuilder {
        FaultInjectorBuilder::default()
    }

    pub fn config(&self) -> &InjectorConfig {
        &self.config
    }

    pub fn engine(&self) -> &Arc<DecisionEngine> {
        &self.engine
    }

    // ── Fault points ────────────────────────────────────────────

    pub fn register(&self, site: FaultSite) -> Result<Arc<FaultPoint>> {
        self.registry.register(site, &self.engine)
    }

    /// Register a static table of sites.  All or nothing.
    pub fn register_table(&self, sites: &[FaultSite]) -> Result<Vec<Arc<FaultPoint>>> {
        self.registry.register_all(sites, &self.engine)
    }

    pub fn find(&self, address: Address) -> Result<Arc<FaultPoint>> {
        self.registry.find(address)
    }

    pub fn list_fault_points(&self) -> Listing<'_> {
        self.registry.list()
    }

    pub fn point_count(&self) -> usize {
        self.registry.len()
    }

    // ── Groups ──────────────────────────────────────────────────

    /// Create a group with an explicit id.
    pub fn create_group(&self, id: i64) -> Result<GroupId> {
        let id = GroupId::new(id)?;
        let _control = lock(&self.control);
        self.groups.create(id)?;
        Ok(id)
    }

    /// Create a group with the lowest unused id.
    pub fn create_next_group(&self) -> Result<GroupId> {
        let _control = lock(&self.control);
        let id = self.groups.next_free_id()?;
        self.groups.create(id)?;
        Ok(id)
    }

    pub fn next_free_id(&self) -> Result<GroupId> {
        self.groups.next_free_id()
    }

    /// Delete a group, detaching its members first.
    pub fn delete_group(&self, id: GroupId) -> Result<()> {
        let _control = lock(&self.control);
        self.groups.delete(id, &self.registry)
    }

    pub fn group(&self, id: GroupId) -> Result<Arc<FaultGroup>> {
        self.groups.get(id)
    }

    pub fn groups(&self) -> Vec<Arc<FaultGroup>> {
        self.groups.groups()
    }

    pub fn group_fault_points(&self, id: GroupId) -> Result<Vec<FaultPointInfo>> {
        let group = self.groups.get(id)?;
        Ok(group.members().iter().map(|p| p.info()).collect())
    }

    pub fn add_fault_point(&self, id: GroupId, address: Address) -> Result<()> {
        let _control = lock(&self.control);
        let group = self.groups.get(id)?;
        let point = self.registry.find(address)?;
        self.registry.assign(&point, &group)
    }

    pub fn del_fault_point(&self, id: GroupId, address: Address) -> Result<()> {
        let _control = lock(&self.control);
        let group = self.groups.get(id)?;
        if group.member_count() == 0 {
            return Err(FaultError::NoMembers(id.get()));
        }
        let point = self.registry.find(address)?;
        if !self.registry.unassign_from(&point, &group) {
            return Err(FaultError::NotInGroup {
                address,
                group: id.get(),
            });
        }
        debug!("fault point {address} left group {id}");
        Ok(())
    }

    // ── Configuration ───────────────────────────────────────────

    /// Turn one kind of a group on or off and re-arm its members.
    pub fn set_enabled(&self, id: GroupId, kind: FaultKind, enabled: bool) -> Result<()> {
        let _control = lock(&self.control);
        let group = self.groups.get(id)?;
        group.config(kind).set_enabled(enabled);
        for point in group.members() {
            point.rearm();
        }
        debug!("group {id} {kind} enabled={enabled}");
        Ok(())
    }

    /// Edit one kind's tunables under the control lock.
    pub fn configure<R>(
        &self,
        id: GroupId,
        kind: FaultKind,
        edit: impl FnOnce(&FaultConfig) -> Result<R>,
    ) -> Result<R> {
        let _control = lock(&self.control);
        let group = self.groups.get(id)?;
        let out = edit(group.config(kind))?;
        debug!("group {id} {kind} reconfigured");
        Ok(out)
    }

    pub fn report(&self) -> InjectorReport {
        InjectorReport {
            seed: self.config.seed,
            points: self.registry.len(),
            groups: self.groups.groups().iter().map(|g| g.stats()).collect(),
        }
    }

    /// Delete every group.  Registered points stay, detached and unarmed.
    pub fn reset(&self) {
        let _control = lock(&self.control);
        for group in self.groups.groups() {
            // Only fails if the slot emptied meanwhile, which the lock rules out.
            let _ = self.groups.delete(group.id(), &self.registry);
        }
        info!("fault injector reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errno::Errno;
    use crate::site::FaultClass;

    fn site(line: u32) -> FaultSite {
        FaultSite::new(FaultClass::Check, "fs::sync", "src/fs.rs", line, 1)
    }

    #[test]
    fn config_defaults() {
        let config = InjectorConfig::default();
        assert_eq!(config.seed, 42);
        assert_eq!(config.panic_mode, PanicMode::Unwind);
        let parsed: InjectorConfig = serde_json::from_str(r#"{"seed": 7}"#).unwrap();
        assert_eq!(parsed.seed, 7);
        assert_eq!(parsed.panic_mode, PanicMode::Unwind);
    }

    #[test]
    fn enabling_arms_members() {
        let injector = FaultInjector::default();
        let point = injector.register(site(1)).unwrap();
        let group = injector.create_group(5).unwrap();
        injector.add_fault_point(group, point.address()).unwrap();
        assert!(!point.is_armed());

        injector.set_enabled(group, FaultKind::Panic, true).unwrap();
        assert!(point.is_armed());
        injector.set_enabled(group, FaultKind::Panic, false).unwrap();
        assert!(!point.is_armed());
    }

    #[test]
    fn joining_an_enabled_group_arms() {
        let injector = FaultInjector::default();
        let point = injector.register(site(1)).unwrap();
        let group = injector.create_group(0).unwrap();
        injector.set_enabled(group, FaultKind::Delay, true).unwrap();
        injector.add_fault_point(group, point.address()).unwrap();
        assert!(point.is_armed());
    }

    #[test]
    fn del_fault_point_errors() {
        let injector = FaultInjector::default();
        let a = injector.register(site(1)).unwrap();
        let b = injector.register(site(2)).unwrap();
        let group = injector.create_group(1).unwrap();

        assert_eq!(
            injector.del_fault_point(group, a.address()),
            Err(FaultError::NoMembers(1))
        );
        injector.add_fault_point(group, a.address()).unwrap();
        assert_eq!(
            injector.del_fault_point(group, b.address()),
            Err(FaultError::NotInGroup {
                address: b.address(),
                group: 1
            })
        );
        assert_eq!(
            injector.del_fault_point(group, Address(3)),
            Err(FaultError::UnknownAddress(Address(3)))
        );
        injector.del_fault_point(group, a.address()).unwrap();
        assert_eq!(a.group_id(), None);
    }

    #[test]
    fn create_group_validates_id() {
        let injector = FaultInjector::default();
        assert_eq!(
            injector.create_group(256),
            Err(FaultError::GroupIdOutOfRange(256))
        );
        assert_eq!(injector.create_next_group().unwrap(), GroupId::from(0));
        assert_eq!(injector.create_next_group().unwrap(), GroupId::from(1));
        assert_eq!(injector.next_free_id().unwrap(), GroupId::from(2));
    }

    #[test]
    fn failed_configure_changes_nothing() {
        let injector = FaultInjector::default();
        let group = injector.create_group(0).unwrap();
        let err = injector
            .configure(group, FaultKind::Error, |c| c.set_probability(0))
            .unwrap_err();
        assert_eq!(err, FaultError::ProbabilityOutOfRange(0));
        assert_eq!(
            injector.group(group).unwrap().config(FaultKind::Error).probability(),
            100
        );
    }

    #[test]
    fn reset_detaches_everything() {
        let injector = FaultInjector::default();
        let point = injector.register(site(1)).unwrap();
        let group = injector.create_group(3).unwrap();
        injector.add_fault_point(group, point.address()).unwrap();
        injector
            .configure(group, FaultKind::Error, |c| c.set_errors("EIO"))
            .unwrap();
        injector.set_enabled(group, FaultKind::Error, true).unwrap();
        assert_eq!(point.check(), Some(Errno::EIO));

        injector.reset();
        assert!(injector.groups().is_empty());
        assert_eq!(point.check(), None);
        assert!(!point.is_armed());
        assert_eq!(injector.point_count(), 1);
    }

    #[test]
    fn report_counts() {
        let injector = FaultInjector::builder().seed(9).build();
        let point = injector.register(site(1)).unwrap();
        let group = injector.create_group(2).unwrap();
        injector.add_fault_point(group, point.address()).unwrap();
        injector
            .configure(group, FaultKind::Error, |c| c.set_errors("EAGAIN"))
            .unwrap();
        injector.set_enabled(group, FaultKind::Error, true).unwrap();
        for _ in 0..4 {
            point.check();
        }

        let report = injector.report();
        assert_eq!(report.seed, 9);
        assert_eq!(report.points, 1);
        let stats = report.group(group).unwrap();
        assert_eq!(stats.members, 1);
        assert_eq!(stats.kind(FaultKind::Error).unwrap().hits, 4);
        assert_eq!(report.total_injected(), 4);
    }
}
