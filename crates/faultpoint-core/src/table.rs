//! The fixed-capacity table of fault groups.

use crate::error::{FaultError, Result};
use crate::group::{FaultGroup, GroupId};
use crate::registry::FaultPointRegistry;
use crate::sync::{read, write};
use log::info;
use std::sync::{Arc, RwLock};

/// Hard ceiling on live groups; ids are `0..MAX_GROUPS`.
pub const MAX_GROUPS: usize = 256;

/// Owns up to [`MAX_GROUPS`] groups, indexed by id.
#[derive(Debug)]
pub struct GroupTable {
    slots: RwLock<Vec<Option<Arc<FaultGroup>>>>,
    /// Mixed with the group id to seed each group's RNG.
    seed: u64,
}

impl GroupTable {
    pub fn new(seed: u64) -> Self {
        Self {
            slots: RwLock::new(vec![None; MAX_GROUPS]),
            seed,
        }
    }

    pub fn create(&self, id: GroupId) -> Result<Arc<FaultGroup>> {
        let mut slots = write(&self.slots);
        let slot = &mut slots[id.index()];
        if slot.is_some() {
            return Err(FaultError::GroupExists(id.get()));
        }
        let group = Arc::new(FaultGroup::new(id, self.seed));
        *slot = Some(Arc::clone(&group));
        info!("created fault group {id}");
        Ok(group)
    }

    /// Lowest unused id.
    pub fn next_free_id(&self) -> Result<GroupId> {
        read(&self.slots)
            .iter()
            .position(Option::is_none)
            .and_then(|index| u8::try_from(index).ok())
            .map(GroupId::from)
            .ok_or(FaultError::AllGroupsTaken)
    }

    /// Remove a group and detach all of its members.
    ///
    /// Decisions already running against the group hold their own `Arc`
    /// and finish against it; new invocations see the points detached.
    pub fn delete(&self, id: GroupId, registry: &FaultPointRegistry) -> Result<()> {
        let group = write(&self.slots)[id.index()]
            .take()
            .ok_or(FaultError::UnknownGroup(id.get()))?;

        let members = group.take_members();
        let detached = members
            .iter()
            .filter(|point| registry.unassign_from(point, &group))
            .count();
        info!("deleted fault group {id} ({detached} points detached)");
        Ok(())
    }

    pub fn get(&self, id: GroupId) -> Result<Arc<FaultGroup>> {
        read(&self.slots)[id.index()]
            .clone()
            .ok_or(FaultError::UnknownGroup(id.get()))
    }

    /// Live groups in id order.
    pub fn groups(&self) -> Vec<Arc<FaultGroup>> {
        read(&self.slots).iter().flatten().cloned().collect()
    }

    pub fn len(&self) -> usize {
        read(&self.slots).iter().flatten().count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_get_delete() {
        let table = GroupTable::new(42);
        let registry = FaultPointRegistry::new();
        let id = GroupId::from(3);

        table.create(id).unwrap();
        assert_eq!(table.get(id).unwrap().id(), id);
        assert_eq!(table.create(id).unwrap_err(), FaultError::GroupExists(3));

        table.delete(id, &registry).unwrap();
        assert_eq!(
            table.delete(id, &registry).unwrap_err(),
            FaultError::UnknownGroup(3)
        );
        assert_eq!(table.get(id).unwrap_err(), FaultError::UnknownGroup(3));
    }

    #[test]
    fn next_free_id_fills_gaps() {
        let table = GroupTable::new(42);
        let registry = FaultPointRegistry::new();
        assert_eq!(table.next_free_id().unwrap(), GroupId::from(0));
        table.create(GroupId::from(0)).unwrap();
        table.create(GroupId::from(1)).unwrap();
        assert_eq!(table.next_free_id().unwrap(), GroupId::from(2));
        table.delete(GroupId::from(0), &registry).unwrap();
        assert_eq!(table.next_free_id().unwrap(), GroupId::from(0));
    }

    #[test]
    fn capacity_is_bounded() {
        let table = GroupTable::new(42);
        for id in 0..=255u8 {
            table.create(GroupId::from(id)).unwrap();
        }
        assert_eq!(table.len(), MAX_GROUPS);
        assert_eq!(table.next_free_id().unwrap_err(), FaultError::AllGroupsTaken);
        assert_eq!(table.groups().len(), MAX_GROUPS);
    }

    #[test]
    fn groups_listed_in_id_order() {
        let table = GroupTable::new(42);
        for id in [9u8, 2, 200] {
            table.create(GroupId::from(id)).unwrap();
        }
        let ids: Vec<u8> = table.groups().iter().map(|g| g.id().get()).collect();
        assert_eq!(ids, vec![2, 9, 200]);
    }
}
