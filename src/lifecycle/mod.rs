//! Request lifecycle subsystem.
//!
//! # Data Flow
//! ```text
//! RequestConfig
//!     → Dispatched → pool.acquire()
//!         ├─ pool hit:  Connected, arm response timer
//!         └─ new conn:  Connecting, arm connect timer
//!                       → usable: disarm connect, arm response, Connected
//!     → AwaitingResponse: write request + payload
//!     → first of { response, timeout, transport error, payload error }
//!     → Settled
//! ```
//!
//! # Design Decisions
//! - At most one phase timer is live; the swap is a single synchronous step
//! - The first outcome wins; later events are dropped
//! - Every failure path aborts the connection so it is never reused

pub mod coordinator;
pub mod settlement;
pub mod state;
pub mod timers;

pub use coordinator::execute;
pub use settlement::Settlement;
pub use state::{LifecycleState, Outcome};
pub use timers::{PhaseTimer, Timers};
