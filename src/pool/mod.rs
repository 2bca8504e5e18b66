//! Manager pool subsystem.
//!
//! # Data Flow
//! ```text
//! Dispatcher::send(id)
//!     → manager_pool.rs checkout(id)
//!         → ceiling reached? → CheckoutError::Saturated
//!         → select.rs (free manager by policy)
//!         → none free? → ManagerFactory::create per proxy → slot.rs arena
//!     → Lease (manager + proxy) used for one exchange
//! Completion
//!     → manager_pool.rs checkin(id) → clear connection cache, mark free
//! reaper.rs (every reap interval, only while the pool is non-empty)
//!     → drop free managers idle past the timeout
//! ```

pub mod manager_pool;
pub(crate) mod reaper;
pub mod select;
pub mod slot;

pub use manager_pool::{CheckoutError, Lease, ManagerPool, PoolStats};
pub use slot::SlotIndex;
