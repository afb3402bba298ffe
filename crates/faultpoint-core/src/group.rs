//! Fault groups: a bucket of fault points sharing one delay, one error and
//! one panic configuration.

use crate::config::{FaultConfig, FaultKind, FaultStats, KindSet};
use crate::error::{FaultError, Result};
use crate::point::FaultPoint;
use crate::sync::lock;
use rand::RngCore;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::{Arc, Mutex, Weak};

/// Identifier of a fault group, `0..=255`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupId(u8);

impl GroupId {
    /// Validate a raw id from user input.
    pub fn new(raw: i64) -> Result<GroupId> {
        u8::try_from(raw)
            .map(GroupId)
            .map_err(|_| FaultError::GroupIdOutOfRange(raw))
    }

    pub fn get(self) -> u8 {
        self.0
    }

    pub fn index(self) -> usize {
        usize::from(self.0)
    }
}

impl From<u8> for GroupId {
    fn from(id: u8) -> Self {
        GroupId(id)
    }
}

impl fmt::Display for GroupId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// A fault group.
///
/// Members are held weakly: a point owns its (strong) reference to the
/// group, the group only remembers who joined so it can detach them.
pub struct FaultGroup {
    id: GroupId,
    delay: FaultConfig,
    error: FaultConfig,
    panic: FaultConfig,
    members: Mutex<Vec<Weak<FaultPoint>>>,
    rng: Mutex<ChaCha20Rng>,
}

impl FaultGroup {
    pub(crate) fn new(id: GroupId, seed: u64) -> Self {
        Self {
            id,
            delay: FaultConfig::new(FaultKind::Delay),
            error: FaultConfig::new(FaultKind::Error),
            panic: FaultConfig::new(FaultKind::Panic),
            members: Mutex::new(Vec::new()),
            rng: Mutex::new(Self::rng_from_seed(seed, id)),
        }
    }

    pub fn id(&self) -> GroupId {
        self.id
    }

    pub fn config(&self, kind: FaultKind) -> &FaultConfig {
        match kind {
            FaultKind::Delay => &self.delay,
            FaultKind::Error => &self.error,
            FaultKind::Panic => &self.panic,
        }
    }

    pub fn enabled_kinds(&self) -> KindSet {
        FaultKind::ALL
            .into_iter()
            .filter(|&kind| self.config(kind).is_enabled())
            .collect()
    }

    pub fn any_enabled(&self) -> bool {
        !self.enabled_kinds().is_empty()
    }

    /// Live members, in the order they joined.
    pub fn members(&self) -> Vec<Arc<FaultPoint>> {
        lock(&self.members)
            .iter()
            .filter_map(Weak::upgrade)
            .collect()
    }

    pub fn member_count(&self) -> usize {
        lock(&self.members)
            .iter()
            .filter(|m| m.strong_count() > 0)
            .count()
    }

    pub fn stats(&self) -> GroupStats {
        GroupStats {
            id: self.id,
            members: self.member_count(),
            kinds: FaultKind::ALL
                .into_iter()
                .map(|kind| self.config(kind).stats())
                .collect(),
        }
    }

    // ── Membership (driven by the registry) ─────────────────────

    pub(crate) fn add_member(&self, point: &Arc<FaultPoint>) {
        lock(&self.members).push(Arc::downgrade(point));
    }

    pub(crate) fn remove_member(&self, point: &FaultPoint) {
        lock(&self.members).retain(|m| {
            m.upgrade()
                .is_some_and(|live| !std::ptr::eq(Arc::as_ptr(&live), point))
        });
    }

    pub(crate) fn take_members(&self) -> Vec<Arc<FaultPoint>> {
        std::mem::take(&mut *lock(&self.members))
            .into_iter()
            .filter_map(|m| m.upgrade())
            .collect()
    }

    // ── Randomness ──────────────────────────────────────────────

    /// Uniform draw from `1..=100`.
    pub(crate) fn roll_percent(&self) -> u32 {
        let value = lock(&self.rng).next_u64();
        (value % 100) as u32 + 1
    }

    fn rng_from_seed(seed: u64, id: GroupId) -> ChaCha20Rng {
        let mut key = [0u8; 32];
        key[..8].copy_from_slice(&seed.to_le_bytes());
        key[8] = id.get();
        ChaCha20Rng::from_seed(key)
    }
}

impl fmt::Debug for FaultGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FaultGroup")
            .field("id", &self.id)
            .field("enabled", &self.enabled_kinds().to_string())
            .field("members", &self.member_count())
            .finish()
    }
}

/// Statistics for one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupStats {
    pub id: GroupId,
    pub members: usize,
    /// One entry per kind, in [`FaultKind::ALL`] order.
    pub kinds: Vec<FaultStats>,
}

impl GroupStats {
    pub fn kind(&self, kind: FaultKind) -> Option<&FaultStats> {
        self.kinds.iter().find(|s| s.kind == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn group_id_range() {
        assert_eq!(GroupId::new(0).unwrap().get(), 0);
        assert_eq!(GroupId::new(255).unwrap().get(), 255);
        assert_eq!(GroupId::new(256), Err(FaultError::GroupIdOutOfRange(256)));
        assert_eq!(GroupId::new(-1), Err(FaultError::GroupIdOutOfRange(-1)));
    }

    #[test]
    fn new_group_is_inert() {
        let group = FaultGroup::new(GroupId::from(4), 42);
        assert_eq!(group.id(), GroupId::from(4));
        assert!(!group.any_enabled());
        assert_eq!(group.member_count(), 0);
        assert_eq!(group.config(FaultKind::Error).kind(), FaultKind::Error);
    }

    #[test]
    fn enabled_kinds_follow_configs() {
        let group = FaultGroup::new(GroupId::from(0), 42);
        group.config(FaultKind::Error).set_enabled(true);
        group.config(FaultKind::Panic).set_enabled(true);
        assert_eq!(group.enabled_kinds().to_string(), "-EP");
        assert!(group.any_enabled());
    }

    #[test]
    fn rolls_are_in_range_and_seeded() {
        let a = FaultGroup::new(GroupId::from(1), 7);
        let b = FaultGroup::new(GroupId::from(1), 7);
        let c = FaultGroup::new(GroupId::from(2), 7);
        let rolls_a: Vec<u32> = (0..64).map(|_| a.roll_percent()).collect();
        let rolls_b: Vec<u32> = (0..64).map(|_| b.roll_percent()).collect();
        let rolls_c: Vec<u32> = (0..64).map(|_| c.roll_percent()).collect();
        assert!(rolls_a.iter().all(|r| (1..=100).contains(r)));
        assert_eq!(rolls_a, rolls_b);
        assert_ne!(rolls_a, rolls_c);
    }

    #[test]
    fn stats_cover_every_kind() {
        let group = FaultGroup::new(GroupId::from(9), 42);
        let stats = group.stats();
        assert_eq!(stats.kinds.len(), 3);
        assert_eq!(stats.kind(FaultKind::Delay).unwrap().delay_us, Some(0));
        assert_eq!(stats.kind(FaultKind::Error).unwrap().errors.as_deref(), Some(""));
        assert_eq!(stats.kind(FaultKind::Panic).unwrap().errors, None);
    }
}
