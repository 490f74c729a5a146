use std::collections::HashMap;
use std::fmt;

use nix::unistd::Pid;

use crate::error::{SetupError, SlotError};

/// Identity of one live worker process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(i32);

impl WorkerId {
    pub fn from_raw(pid: i32) -> Self {
        WorkerId(pid)
    }

    pub fn as_raw(self) -> i32 {
        self.0
    }

    pub fn pid(self) -> Pid {
        Pid::from_raw(self.0)
    }
}

impl From<Pid> for WorkerId {
    fn from(pid: Pid) -> Self {
        WorkerId(pid.as_raw())
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pid {}", self.0)
    }
}

/*
    @@@
    @SlotTable;
    . Fixed number of slots, each either empty or holding one live worker.
    . Keeps a reverse map worker -> slot so a reaped worker is found without scanning.
    . Never holds more than `size()` workers and never the same worker twice.
*/
#[derive(Debug)]
pub struct SlotTable {
    slots: Vec<Option<WorkerId>>,
    index: HashMap<WorkerId, usize>,
}

impl SlotTable {
    pub fn new(size: usize) -> Result<Self, SetupError> {
        let mut slots = Vec::new();
        slots
            .try_reserve_exact(size)
            .map_err(|source| SetupError::SlotTable { workers: size, source })?;
        slots.resize(size, None);

        let mut index = HashMap::new();
        index
            .try_reserve(size)
            .map_err(|source| SetupError::SlotTable { workers: size, source })?;

        Ok(SlotTable { slots, index })
    }

    pub fn size(&self) -> usize {
        self.slots.len()
    }

    pub fn occupied_count(&self) -> usize {
        self.index.len()
    }

    pub fn get(&self, index: usize) -> Option<WorkerId> {
        self.slots.get(index).copied().flatten()
    }

    pub fn slot_of(&self, id: WorkerId) -> Option<usize> {
        self.index.get(&id).copied()
    }

    pub fn first_empty(&self) -> Option<usize> {
        self.slots.iter().position(Option::is_none)
    }

    pub fn empty_slots(&self) -> Vec<usize> {
        self.slots
            .iter()
            .enumerate()
            .filter(|(_, s)| s.is_none())
            .map(|(i, _)| i)
            .collect()
    }

    /// Occupied slots in index order.
    pub fn occupied(&self) -> impl Iterator<Item = (usize, WorkerId)> + '_ {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.map(|id| (i, id)))
    }

    pub fn install(&mut self, index: usize, id: WorkerId) -> Result<(), SlotError> {
        let size = self.slots.len();
        let slot = self
            .slots
            .get_mut(index)
            .ok_or(SlotError::OutOfRange { index, size })?;

        if let Some(occupant) = *slot {
            return Err(SlotError::Occupied { index, occupant });
        }
        if let Some(&existing) = self.index.get(&id) {
            return Err(SlotError::Duplicate { id, index: existing });
        }

        *slot = Some(id);
        self.index.insert(id, index);
        Ok(())
    }

    /// Empties the slot holding `id`, returning its index if it was tracked.
    pub fn vacate(&mut self, id: WorkerId) -> Option<usize> {
        let index = self.index.remove(&id)?;
        self.slots[index] = None;
        Some(index)
    }

    /// Drops the table's storage at shutdown, returning how many slots it had.
    pub fn release(&mut self) -> usize {
        let size = self.slots.len();
        self.slots = Vec::new();
        self.index = HashMap::new();
        size
    }
}
