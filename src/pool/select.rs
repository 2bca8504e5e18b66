//! Free-manager selection.
//!
//! Both policies only look at free slots and break ties by the lowest slot index,
//! so the same pool state always yields the same choice.

use crate::config::SelectionPolicy;
use crate::pool::slot::{SlotArena, SlotIndex};

/// Pick a free manager, or `None` if every manager is busy.
pub fn select_free(arena: &SlotArena, policy: SelectionPolicy) -> Option<SlotIndex> {
    let free = arena.iter().filter(|(_, s)| !s.busy);
    match policy {
        // min_by_key keeps the first minimum, i.e. the lowest index
        SelectionPolicy::LeastServed => free.min_by_key(|(_, s)| s.requests_served),
        SelectionPolicy::LeastRecentlyUsed => free.min_by_key(|(_, s)| s.last_used_at),
    }
    .map(|(i, _)| i)
}
