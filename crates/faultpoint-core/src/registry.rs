//! Catalog of registered fault points and their group membership.

use crate::engine::DecisionEngine;
use crate::error::{FaultError, Result};
use crate::group::FaultGroup;
use crate::point::{FaultPoint, FaultPointInfo};
use crate::site::{Address, FaultSite};
use crate::sync::{read, write};
use log::debug;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
struct Inner {
    /// Registration order.
    points: Vec<Arc<FaultPoint>>,
    by_address: HashMap<Address, usize>,
}

/// All fault points known to one injector.
///
/// Points are only ever added; what changes afterwards is which group each
/// point belongs to (at most one).
#[derive(Debug, Default)]
pub struct FaultPointRegistry {
    inner: RwLock<Inner>,
}

impl FaultPointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register one site.  A second registration of the same address is
    /// rejected.
    pub(crate) fn register(
        &self,
        site: FaultSite,
        engine: &Arc<DecisionEngine>,
    ) -> Result<Arc<FaultPoint>> {
        let mut points = self.register_all(&[site], engine)?;
        Ok(points.remove(0))
    }

    /// Register a table of sites in order.  Nothing is registered if any
    /// address collides with an existing point or with another entry.
    pub(crate) fn register_all(
        &self,
        sites: &[FaultSite],
        engine: &Arc<DecisionEngine>,
    ) -> Result<Vec<Arc<FaultPoint>>> {
        let mut inner = write(&self.inner);

        let mut seen = std::collections::HashSet::new();
        for site in sites {
            let address = site.address();
            if inner.by_address.contains_key(&address) || !seen.insert(address) {
                return Err(FaultError::DuplicatePoint(address));
            }
        }

        let mut registered = Vec::with_capacity(sites.len());
        for site in sites {
            let point = Arc::new(FaultPoint::new(*site, Arc::clone(engine)));
            let index = inner.points.len();
            inner.by_address.insert(point.address(), index);
            inner.points.push(Arc::clone(&point));
            debug!("registered fault point {} at {}", point.address(), site);
            registered.push(point);
        }
        Ok(registered)
    }

    pub fn find(&self, address: Address) -> Result<Arc<FaultPoint>> {
        let inner = read(&self.inner);
        inner
            .by_address
            .get(&address)
            .map(|&index| Arc::clone(&inner.points[index]))
            .ok_or(FaultError::UnknownAddress(address))
    }

    pub fn len(&self) -> usize {
        read(&self.inner).points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Lazy listing in registration order.  Call again to restart.
    pub fn list(&self) -> Listing<'_> {
        Listing {
            registry: self,
            next: 0,
        }
    }

    fn get(&self, index: usize) -> Option<Arc<FaultPoint>> {
        read(&self.inner).points.get(index).cloned()
    }

    /// Whether `point` is this registry's point (not merely one with the
    /// same address from another injector).
    fn owns(&self, point: &FaultPoint) -> bool {
        let inner = read(&self.inner);
        inner
            .by_address
            .get(&point.address())
            .is_some_and(|&index| std::ptr::eq(Arc::as_ptr(&inner.points[index]), point))
    }

    // ── Membership ──────────────────────────────────────────────

    /// Put `point` into `group`.  Fails if the point already belongs to a
    /// group, including `group` itself.
    pub(crate) fn assign(&self, point: &Arc<FaultPoint>, group: &Arc<FaultGroup>) -> Result<()> {
        if !self.owns(point) {
            return Err(FaultError::UnknownAddress(point.address()));
        }
        {
            let mut slot = point.group_slot();
            if let Some(existing) = slot.as_ref() {
                return Err(FaultError::AlreadyInGroup {
                    address: point.address(),
                    group: existing.id().get(),
                });
            }
            *slot = Some(Arc::clone(group));
        }
        group.add_member(point);
        point.rearm();
        debug!("fault point {} joined group {}", point.address(), group.id());
        Ok(())
    }

    /// Detach `point` only if it still belongs to `group`.
    pub(crate) fn unassign_from(&self, point: &FaultPoint, group: &FaultGroup) -> bool {
        {
            let mut slot = point.group_slot();
            let attached = slot
                .as_ref()
                .is_some_and(|current| std::ptr::eq(Arc::as_ptr(current), group));
            if !attached {
                return false;
            }
            *slot = None;
        }
        point.rearm();
        group.remove_member(point);
        true
    }
}

/// Iterator over a registry's points, yielding listing rows.
///
/// Reads one entry per step, so points registered while iterating show up
/// at the end of the listing.
#[derive(Debug)]
pub struct Listing<'a> {
    registry: &'a FaultPointRegistry,
    next: usize,
}

impl Iterator for Listing<'_> {
    type Item = FaultPointInfo;

    fn next(&mut self) -> Option<FaultPointInfo> {
        let point = self.registry.get(self.next)?;
        self.next += 1;
        Some(point.info())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FaultKind;
    use crate::filter::ThreadMarks;
    use crate::group::GroupId;
    use crate::hooks::StdHooks;
    use crate::site::FaultClass;

    fn engine() -> Arc<DecisionEngine> {
        Arc::new(DecisionEngine::new(
            Arc::new(StdHooks::default()),
            Arc::new(ThreadMarks),
        ))
    }

    fn site(line: u32) -> FaultSite {
        FaultSite::new(FaultClass::Check, "net::send", "src/net.rs", line, 1)
    }

    #[test]
    fn register_and_find() {
        let registry = FaultPointRegistry::new();
        let engine = engine();
        let point = registry.register(site(1), &engine).unwrap();
        assert_eq!(registry.len(), 1);
        let found = registry.find(point.address()).unwrap();
        assert!(Arc::ptr_eq(&point, &found));
        assert_eq!(
            registry.find(Address(1)).unwrap_err(),
            FaultError::UnknownAddress(Address(1))
        );
    }

    #[test]
    fn duplicate_registration_rejected() {
        let registry = FaultPointRegistry::new();
        let engine = engine();
        registry.register(site(1), &engine).unwrap();
        let err = registry.register(site(1), &engine).unwrap_err();
        assert_eq!(err, FaultError::DuplicatePoint(site(1).address()));

        // A table with an internal duplicate registers nothing.
        let err = registry
            .register_all(&[site(2), site(3), site(2)], &engine)
            .unwrap_err();
        assert_eq!(err, FaultError::DuplicatePoint(site(2).address()));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn listing_is_ordered_and_restartable() {
        let registry = FaultPointRegistry::new();
        let engine = engine();
        registry
            .register_all(&[site(30), site(10), site(20)], &engine)
            .unwrap();
        let lines: Vec<u32> = registry.list().map(|info| info.site.line).collect();
        assert_eq!(lines, vec![30, 10, 20]);
        assert_eq!(registry.list().count(), 3);

        let mut listing = registry.list();
        assert!(listing.next().is_some());
        registry.register(site(40), &engine).unwrap();
        assert_eq!(listing.count(), 3);
    }

    #[test]
    fn assign_enforces_single_group() {
        let registry = FaultPointRegistry::new();
        let engine = engine();
        let point = registry.register(site(1), &engine).unwrap();
        let a = Arc::new(FaultGroup::new(GroupId::from(1), 42));
        let b = Arc::new(FaultGroup::new(GroupId::from(2), 42));

        registry.assign(&point, &a).unwrap();
        let err = registry.assign(&point, &b).unwrap_err();
        assert_eq!(
            err,
            FaultError::AlreadyInGroup {
                address: point.address(),
                group: 1
            }
        );
        assert_eq!(point.group_id(), Some(GroupId::from(1)));
        assert_eq!(a.member_count(), 1);
        assert_eq!(b.member_count(), 0);

        assert!(!registry.unassign_from(&point, &b));
        assert!(registry.unassign_from(&point, &a));
        assert_eq!(point.group_id(), None);
        assert_eq!(a.member_count(), 0);
    }

    #[test]
    fn foreign_points_are_not_found() {
        let ours = FaultPointRegistry::new();
        let theirs = FaultPointRegistry::new();
        let engine = engine();
        ours.register(site(1), &engine).unwrap();
        let foreign = theirs.register(site(1), &engine).unwrap();
        let group = Arc::new(FaultGroup::new(GroupId::from(0), 42));
        assert!(matches!(
            ours.assign(&foreign, &group),
            Err(FaultError::UnknownAddress(_))
        ));
    }

    #[test]
    fn arming_follows_group_state() {
        let registry = FaultPointRegistry::new();
        let engine = engine();
        let point = registry.register(site(1), &engine).unwrap();
        let group = Arc::new(FaultGroup::new(GroupId::from(0), 42));
        group.config(FaultKind::Delay).set_enabled(true);

        assert!(!point.is_armed());
        registry.assign(&point, &group).unwrap();
        assert!(point.is_armed());
        assert!(registry.unassign_from(&point, &group));
        assert!(!point.is_armed());
        assert!(!registry.unassign_from(&point, &group));
    }
}
