//! Manager pool.
//!
//! # Responsibilities
//! - Lend one free manager per correlation id and take it back on checkin
//! - Enforce the concurrent checkout ceiling
//! - Create managers lazily, one per configured proxy (or one direct)
//! - Reclaim managers left idle, through a reaper that lives only while the pool is non-empty
//!
//! # Design Decisions
//! - All state sits behind one mutex; each operation holds it from start to finish, except
//!   checkin, which clears the manager's connection cache between two short critical sections
//! - A manager stays busy until its cache is cleared, so it is never lent out or evicted mid-reset
//! - Managers live in a slot arena, pending checkouts map id → slot index
//! - Saturation is a returned value, misuse (double checkout, unknown checkin) panics

use std::collections::HashMap;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::PoolConfig;
use crate::dispatch::CorrelationId;
use crate::observability::metrics;
use crate::pool::reaper;
use crate::pool::select::select_free;
use crate::pool::slot::{ManagerSlot, SlotArena, SlotIndex};
use crate::transport::{ErrorKind, HttpManager, ManagerFactory, ProxyDescriptor, TransportError};

/// Why a checkout did not produce a manager.
#[derive(Debug, Error)]
pub enum CheckoutError {
    /// The ceiling of concurrent checkouts is reached. Try again later.
    #[error("{busy} requests in flight, ceiling is {ceiling}")]
    Saturated { busy: usize, ceiling: usize },

    /// No free manager and none could be created.
    #[error("no manager available: {0}")]
    Unavailable(TransportError),
}

/// A manager lent to one request.
#[derive(Debug, Clone)]
pub struct Lease {
    pub id: CorrelationId,
    pub slot: SlotIndex,
    pub manager: Arc<dyn HttpManager>,
    pub proxy: Option<ProxyDescriptor>,
}

/// Point-in-time view of the pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolStats {
    pub managers: usize,
    pub busy: usize,
    pub idle: usize,
    pub reaper_active: bool,
}

struct PoolState {
    arena: SlotArena,
    pending: HashMap<CorrelationId, SlotIndex>,
    reaper: Option<JoinHandle<()>>,
}

impl PoolState {
    /// Mark the selected free manager busy for `id`.
    fn claim(&mut self, id: CorrelationId, config: &PoolConfig, now: Instant) -> Option<Lease> {
        let index = select_free(&self.arena, config.selection)?;
        let slot = self.arena.get_mut(index)?;
        slot.busy = true;
        slot.last_used_at = now;
        slot.requests_served += 1;

        let lease = Lease {
            id,
            slot: index,
            manager: slot.manager.clone(),
            proxy: slot.proxy.clone(),
        };
        self.pending.insert(id, index);
        Some(lease)
    }
}

pub(crate) struct PoolInner {
    config: PoolConfig,
    proxies: Vec<ProxyDescriptor>,
    factory: Arc<dyn ManagerFactory>,
    runtime: Handle,
    state: Mutex<PoolState>,
}

impl PoolInner {
    fn lock(&self) -> MutexGuard<'_, PoolState> {
        // Factory and selection panics fire before the arena is touched; recover the guard.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build one manager per proxy, or a single direct one. Returns how many were added.
    fn grow(&self, state: &mut PoolState, now: Instant) -> Result<usize, CheckoutError> {
        let targets: Vec<Option<&ProxyDescriptor>> = if self.proxies.is_empty() {
            vec![None]
        } else {
            self.proxies.iter().map(Some).collect()
        };

        let mut added = 0;
        let mut last_error = None;
        for proxy in targets {
            match self.factory.create(proxy) {
                Ok(manager) => {
                    state.arena.insert(ManagerSlot::new(manager, proxy.cloned(), now));
                    added += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        proxy = ?proxy.map(|p| p.endpoint()),
                        error = %e,
                        "Failed to create HTTP manager"
                    );
                    last_error = Some(e);
                }
            }
        }

        if added == 0 {
            let error = last_error
                .unwrap_or_else(|| TransportError::new(ErrorKind::Unavailable, "no manager could be created"));
            return Err(CheckoutError::Unavailable(error));
        }

        tracing::info!(added, total = state.arena.len(), "Added HTTP managers");
        Ok(added)
    }

    /// One reaper tick. Returns false when the reaper should stop.
    pub(crate) fn reap_tick(&self, now: Instant) -> bool {
        let mut state = self.lock();
        self.reclaim(&mut state, now);
        if state.arena.is_empty() {
            state.reaper = None;
            return false;
        }
        true
    }

    fn reclaim(&self, state: &mut PoolState, now: Instant) -> usize {
        let idle: Vec<SlotIndex> = state
            .arena
            .iter()
            .filter(|(_, slot)| slot.is_idle(now, self.config.idle_timeout()))
            .map(|(index, _)| index)
            .collect();

        for index in &idle {
            state.arena.remove(*index);
        }

        if !idle.is_empty() {
            tracing::info!(
                reclaimed = idle.len(),
                remaining = state.arena.len(),
                "Reclaimed idle HTTP managers"
            );
            metrics::record_evictions(idle.len());
            metrics::record_pool(state.arena.len(), state.pending.len());
        }
        idle.len()
    }
}

impl Drop for PoolInner {
    fn drop(&mut self) {
        let state = self.state.get_mut().unwrap_or_else(PoisonError::into_inner);
        if let Some(reaper) = state.reaper.take() {
            reaper.abort();
        }
    }
}

/// Pool of reusable HTTP managers. Cloning shares the same pool.
#[derive(Clone)]
pub struct ManagerPool {
    inner: Arc<PoolInner>,
}

impl ManagerPool {
    /// Create an empty pool. Managers are built on first demand; the reaper runs on `runtime`.
    pub fn new(
        config: PoolConfig,
        proxies: Vec<ProxyDescriptor>,
        factory: Arc<dyn ManagerFactory>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(PoolInner {
                config,
                proxies,
                factory,
                runtime,
                state: Mutex::new(PoolState {
                    arena: SlotArena::new(),
                    pending: HashMap::new(),
                    reaper: None,
                }),
            }),
        }
    }

    /// Lend a free manager to `id`.
    ///
    /// # Panics
    /// If `id` is already checked out.
    pub fn checkout(&self, id: CorrelationId) -> Result<Lease, CheckoutError> {
        let inner = &self.inner;
        let mut state = inner.lock();
        assert!(
            !state.pending.contains_key(&id),
            "correlation id {} is already checked out",
            id
        );

        let busy = state.pending.len();
        let ceiling = inner.config.max_concurrent;
        if busy >= ceiling {
            tracing::warn!(id = %id, busy, ceiling, "Pool saturated, rejecting request");
            return Err(CheckoutError::Saturated { busy, ceiling });
        }

        let now = Instant::now();
        let lease = match state.claim(id, &inner.config, now) {
            Some(lease) => lease,
            None => {
                inner.grow(&mut state, now)?;
                state.claim(id, &inner.config, now).ok_or_else(|| {
                    CheckoutError::Unavailable(TransportError::new(
                        ErrorKind::Unavailable,
                        "no free manager after growing the pool",
                    ))
                })?
            }
        };

        if state.reaper.is_none() {
            state.reaper = Some(reaper::spawn(
                Arc::downgrade(inner),
                &inner.runtime,
                inner.config.reap_interval(),
            ));
            tracing::debug!("Idle reaper started");
        }

        tracing::debug!(
            id = %id,
            slot = lease.slot.get(),
            proxy = ?lease.proxy.as_ref().map(|p| p.endpoint()),
            "Manager checked out"
        );
        metrics::record_pool(state.arena.len(), state.pending.len());
        Ok(lease)
    }

    /// Take back the manager lent to `id` and clear its connection state.
    ///
    /// A manager whose cache reset panics is dropped from the pool instead of being reused.
    ///
    /// # Panics
    /// If `id` is not checked out.
    pub fn checkin(&self, id: CorrelationId) {
        let inner = &self.inner;
        let (index, manager) = {
            let state = inner.lock();
            let Some(&index) = state.pending.get(&id) else {
                panic!("correlation id {} is not checked out", id);
            };
            (index, state.arena.get(index).map(|slot| slot.manager.clone()))
        };

        let reset = match manager {
            Some(manager) if inner.config.reset_connections_on_checkin => {
                panic::catch_unwind(AssertUnwindSafe(|| manager.clear_connection_cache())).is_ok()
            }
            _ => true,
        };

        let mut state = inner.lock();
        if state.pending.remove(&id).is_none() {
            panic!("correlation id {} is not checked out", id);
        }
        if reset {
            if let Some(slot) = state.arena.get_mut(index) {
                slot.busy = false;
                slot.last_used_at = Instant::now();
            }
            tracing::debug!(id = %id, slot = index.get(), "Manager checked in");
        } else {
            state.arena.remove(index);
            tracing::error!(id = %id, slot = index.get(), "Connection cache reset panicked, dropping manager");
        }
        metrics::record_pool(state.arena.len(), state.pending.len());
    }

    /// Reclaim every free manager idle as of `now`. Returns how many were removed.
    pub fn reclaim_idle_at(&self, now: Instant) -> usize {
        let mut state = self.inner.lock();
        self.inner.reclaim(&mut state, now)
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.inner.lock();
        let busy = state.arena.busy_count();
        PoolStats {
            managers: state.arena.len(),
            busy,
            idle: state.arena.len() - busy,
            reaper_active: state.reaper.is_some(),
        }
    }

    pub fn ceiling(&self) -> usize {
        self.inner.config.max_concurrent
    }
}

impl fmt::Debug for ManagerPool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ManagerPool")
            .field("ceiling", &self.ceiling())
            .field("proxies", &self.inner.proxies.len())
            .field("stats", &self.stats())
            .finish()
    }
}
