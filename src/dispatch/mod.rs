//! Request dispatch subsystem.
//!
//! # Data Flow
//! ```text
//! Caller → Dispatcher::send(url, method, headers, body)
//!     → correlation.rs (next id, returned at once)
//!     → headers.rs (defaults + call headers, User-Agent, Content-Length)
//!     → ManagerPool::checkout(id)
//!         → saturated → Failure { AdmissionRejected } scheduled on the runtime
//!         → admitted  → spawned exchange on the leased manager
//!     → completion.rs (checkin, then exactly one Success or Failure)
//!     → event.rs (EventStream held by the owner)
//! ```
//!
//! # Design Decisions
//! - Ids come from an atomic sequence that never touches pool state
//! - Pool mutation stays behind the pool's own lock; the dispatcher holds no lock of its own

pub mod completion;
pub mod correlation;
pub mod dispatcher;
pub mod error;
pub mod event;
pub mod headers;

pub use completion::{failure_message, InFlight, SATURATED_MESSAGE};
pub use correlation::{CorrelationId, IdSequence};
pub use dispatcher::{Dispatcher, DispatcherBuilder};
pub use error::DispatchError;
pub use event::{event_channel, DispatchEvent, EventSink, EventStream, Severity};
pub use headers::RequestHeaders;
