//! Request descriptor subsystem.
//!
//! # Data Flow
//! ```text
//! Target (URL string / url::Url / TargetParts)
//!     → target.rs (resolve scheme, host, port, path)
//! RequestOptions (method, headers, timeouts, payload, pool, hook)
//!     → builder.rs (normalize, pick pool, inject Host / accept-encoding)
//!     → pre-dispatch hook (once, synchronous)
//!     → RequestConfig (immutable, owned by one call)
//! ```

pub mod builder;
pub mod options;
pub mod payload;
pub mod target;

pub use builder::{build, RequestConfig, ACCEPTED_ENCODINGS};
pub use options::{
    PreDispatchHook, RequestOptions, TimeoutDefaults, TimeoutSetting, TransportOverride,
    DEFAULT_TIMEOUT,
};
pub use payload::{Payload, PayloadStream};
pub use target::{ResolvedTarget, Scheme, Target, TargetParts};
