//! Idle reaper task.
//!
//! Runs only while the pool holds managers. Each tick reclaims idle managers; a tick
//! that leaves the pool empty ends the task, and the next checkout starts a new one.

use std::sync::Weak;
use std::time::Duration;

use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::{self, Instant, MissedTickBehavior};

use crate::pool::manager_pool::PoolInner;

pub(crate) fn spawn(pool: Weak<PoolInner>, runtime: &Handle, period: Duration) -> JoinHandle<()> {
    runtime.spawn(async move {
        let mut ticker = time::interval_at(Instant::now() + period, period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            ticker.tick().await;
            let Some(pool) = pool.upgrade() else {
                return;
            };
            if !pool.reap_tick(Instant::now()) {
                tracing::debug!("Pool empty, idle reaper stopped");
                return;
            }
        }
    })
}
