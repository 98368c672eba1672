//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Lifecycle coordinator and pools produce:
//!     → tracing events (phase boundaries, failures)
//!     → metrics facade (settlements, checkouts, aborts)
//!
//! Consumers:
//!     → whatever subscriber / recorder the application installs
//!     → logging::init_logging() for a ready-made fmt subscriber
//! ```
//!
//! # Design Decisions
//! - The library never installs a metrics exporter
//! - Logging setup is opt-in and safe to call more than once

pub mod logging;
pub mod metrics;

pub use logging::{init_logging, LoggingError};
