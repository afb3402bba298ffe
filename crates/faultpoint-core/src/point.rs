//! Registered fault points and the call-site API.
//!
//! Instrumented code holds an `Arc<FaultPoint>` and calls one of:
//!
//! | Method          | On no fault        | On injected error            |
//! |-----------------|--------------------|------------------------------|
//! | [`check`]       | `None`             | `Some(errno)`                |
//! | [`call_int`]    | runs `op`          | negative code, `op` skipped  |
//! | [`call_result`] | runs `op`          | `Err(errno.into())`, skipped |
//!
//! Injected delays happen before the call returns; an injected panic never
//! returns.
//!
//! [`check`]: FaultPoint::check
//! [`call_int`]: FaultPoint::call_int
//! [`call_result`]: FaultPoint::call_result

use crate::config::KindSet;
use crate::engine::DecisionEngine;
use crate::errno::Errno;
use crate::group::{FaultGroup, GroupId};
use crate::site::{Address, FaultClass, FaultSite};
use crate::sync::{read, write};
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock, RwLockWriteGuard};

/// A registered fault point.
pub struct FaultPoint {
    site: FaultSite,
    address: Address,
    /// Set while the point belongs to a group with at least one kind
    /// enabled.  Tested on every invocation before entering the engine.
    armed: AtomicBool,
    group: RwLock<Option<Arc<FaultGroup>>>,
    engine: Arc<DecisionEngine>,
}

impl FaultPoint {
    pub(crate) fn new(site: FaultSite, engine: Arc<DecisionEngine>) -> Self {
        Self {
            address: site.address(),
            site,
            armed: AtomicBool::new(false),
            group: RwLock::new(None),
            engine,
        }
    }

    pub fn site(&self) -> &FaultSite {
        &self.site
    }

    pub fn address(&self) -> Address {
        self.address
    }

    #[inline]
    pub fn is_armed(&self) -> bool {
        self.armed.load(Ordering::Acquire)
    }

    pub fn group_id(&self) -> Option<GroupId> {
        read(&self.group).as_ref().map(|g| g.id())
    }

    /// Snapshot of the current group.  The returned `Arc` stays valid even
    /// if the group is deleted meanwhile.
    pub(crate) fn group(&self) -> Option<Arc<FaultGroup>> {
        read(&self.group).clone()
    }

    pub(crate) fn group_slot(&self) -> RwLockWriteGuard<'_, Option<Arc<FaultGroup>>> {
        write(&self.group)
    }

    /// Recompute the armed flag from the current group.
    pub(crate) fn rearm(&self) {
        let armed = read(&self.group)
            .as_ref()
            .is_some_and(|g| g.any_enabled());
        self.armed.store(armed, Ordering::Release);
    }

    // ── Call shapes ─────────────────────────────────────────────

    /// Fire-and-check.  Returns the injected error, if any.
    #[inline]
    pub fn check(&self) -> Option<Errno> {
        if !self.is_armed() {
            return None;
        }
        self.engine.evaluate(self)
    }

    /// Run `op` unless an error is injected; then return its negative
    /// code without running `op`.
    #[inline]
    pub fn call_int(&self, op: impl FnOnce() -> i32) -> i32 {
        match self.check() {
            Some(errno) => errno.code(),
            None => op(),
        }
    }

    /// Run `op` unless an error is injected; then return it as `Err`
    /// without running `op`.
    #[inline]
    pub fn call_result<T, E>(&self, op: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<Errno>,
    {
        match self.check() {
            Some(errno) => Err(E::from(errno)),
            None => op(),
        }
    }

    /// Listing entry for this point.
    pub fn info(&self) -> FaultPointInfo {
        let group = self.group();
        FaultPointInfo {
            address: self.address,
            site: self.site,
            group: group.as_ref().map(|g| g.id()),
            kinds: group
                .as_ref()
                .map_or(KindSet::EMPTY, |g| g.enabled_kinds()),
        }
    }
}

impl fmt::Debug for FaultPoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultPoint")
            .field("address", &self.address)
            .field("site", &self.site)
            .field("armed", &self.is_armed())
            .field("group", &self.group_id())
            .finish()
    }
}

/// One row of a fault point listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FaultPointInfo {
    pub address: Address,
    pub site: FaultSite,
    pub group: Option<GroupId>,
    /// Kinds enabled in the point's group.
    pub kinds: KindSet,
}

impl FaultPointInfo {
    pub fn class(&self) -> FaultClass {
        self.site.class
    }
}

/// Columns: kinds, group, class, address, function+column, file:line.
impl fmt::Display for FaultPointInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let group = match self.group {
            Some(id) => format!("{:>5}", id.get()),
            None => "-----".to_string(),
        };
        write!(
            f,
            "{} {} {:<6} {} {}+{} {}:{}",
            self.kinds,
            group,
            self.site.class.name(),
            self.address,
            self.site.function,
            self.site.column,
            self.site.file,
            self.site.line
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::ThreadMarks;
    use crate::hooks::StdHooks;

    fn point(line: u32) -> FaultPoint {
        let engine = Arc::new(DecisionEngine::new(
            Arc::new(StdHooks::default()),
            Arc::new(ThreadMarks),
        ));
        FaultPoint::new(
            FaultSite::new(FaultClass::Int, "disk::read_block", "src/disk.rs", line, 9),
            engine,
        )
    }

    #[test]
    fn unarmed_point_runs_operation() {
        let p = point(1);
        assert!(!p.is_armed());
        assert_eq!(p.check(), None);
        assert_eq!(p.call_int(|| 17), 17);
        assert_eq!(p.call_result(|| Ok::<_, Errno>("done")), Ok("done"));
    }

    #[test]
    fn listing_row_without_group() {
        let p = point(12);
        let row = p.info().to_string();
        assert_eq!(
            row,
            format!(
                "--- ----- int    {} disk::read_block+9 src/disk.rs:12",
                p.address()
            )
        );
    }

    #[test]
    fn listing_row_with_group() {
        let p = point(3);
        let info = FaultPointInfo {
            group: Some(GroupId::from(7)),
            kinds: [crate::config::FaultKind::Error].into_iter().collect(),
            ..p.info()
        };
        assert!(info.to_string().starts_with("-E-     7 int    0x"));
    }
}
