//! Manager slots.
//!
//! # Responsibilities
//! - Hold every pooled manager with its busy flag and usage counters
//! - Reuse vacated positions so indices stay small and stable

use std::sync::Arc;

use tokio::time::Instant;

use crate::transport::{HttpManager, ProxyDescriptor};

/// Position of a manager in the arena. Stable until the manager is removed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SlotIndex(usize);

impl SlotIndex {
    pub fn get(&self) -> usize {
        self.0
    }
}

/// One pooled manager.
#[derive(Debug)]
pub struct ManagerSlot {
    pub manager: Arc<dyn HttpManager>,
    /// Proxy the manager was built for; `None` for direct connections.
    pub proxy: Option<ProxyDescriptor>,
    pub busy: bool,
    pub last_used_at: Instant,
    pub requests_served: u64,
}

impl ManagerSlot {
    pub fn new(manager: Arc<dyn HttpManager>, proxy: Option<ProxyDescriptor>, now: Instant) -> Self {
        Self {
            manager,
            proxy,
            busy: false,
            last_used_at: now,
            requests_served: 0,
        }
    }

    /// Free and unused for longer than `idle_timeout` as of `now`.
    pub fn is_idle(&self, now: Instant, idle_timeout: std::time::Duration) -> bool {
        !self.busy && now.saturating_duration_since(self.last_used_at) > idle_timeout
    }
}

/// Slot array with a free list.
#[derive(Debug, Default)]
pub struct SlotArena {
    slots: Vec<Option<ManagerSlot>>,
    vacant: Vec<usize>,
}

impl SlotArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, slot: ManagerSlot) -> SlotIndex {
        match self.vacant.pop() {
            Some(i) => {
                self.slots[i] = Some(slot);
                SlotIndex(i)
            }
            None => {
                self.slots.push(Some(slot));
                SlotIndex(self.slots.len() - 1)
            }
        }
    }

    pub fn remove(&mut self, index: SlotIndex) -> Option<ManagerSlot> {
        let slot = self.slots.get_mut(index.0)?.take()?;
        self.vacant.push(index.0);
        Some(slot)
    }

    pub fn get(&self, index: SlotIndex) -> Option<&ManagerSlot> {
        self.slots.get(index.0)?.as_ref()
    }

    pub fn get_mut(&mut self, index: SlotIndex) -> Option<&mut ManagerSlot> {
        self.slots.get_mut(index.0)?.as_mut()
    }

    /// Occupied slots in index order.
    pub fn iter(&self) -> impl Iterator<Item = (SlotIndex, &ManagerSlot)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, s)| s.as_ref().map(|s| (SlotIndex(i), s)))
    }

    pub fn len(&self) -> usize {
        self.slots.len() - self.vacant.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn busy_count(&self) -> usize {
        self.iter().filter(|(_, s)| s.busy).count()
    }
}
