//! Lifecycle states of an in-flight request.

use std::fmt;

/// How an operation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Fulfilled,
    Rejected,
}

/// State of an in-flight request.
///
/// ```text
/// Created → Dispatched → Connecting → Connected → AwaitingResponse → Settled(Fulfilled)
///                     └────────────→ Connected (pool hit)
/// any non-terminal state → Settled(Rejected)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleState {
    Created,
    Dispatched,
    Connecting,
    Connected,
    AwaitingResponse,
    Settled(Outcome),
}

impl LifecycleState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, LifecycleState::Settled(_))
    }

    /// Whether `next` is a legal successor of `self`.
    pub fn can_transition_to(&self, next: LifecycleState) -> bool {
        use LifecycleState::*;
        match (self, next) {
            (Settled(_), _) => false,
            (_, Settled(Outcome::Rejected)) => true,
            (Created, Dispatched) => true,
            (Dispatched, Connecting) | (Dispatched, Connected) => true,
            (Connecting, Connected) => true,
            (Connected, AwaitingResponse) => true,
            (AwaitingResponse, Settled(Outcome::Fulfilled)) => true,
            _ => false,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LifecycleState::Created => "created",
            LifecycleState::Dispatched => "dispatched",
            LifecycleState::Connecting => "connecting",
            LifecycleState::Connected => "connected",
            LifecycleState::AwaitingResponse => "awaiting_response",
            LifecycleState::Settled(Outcome::Fulfilled) => "settled_ok",
            LifecycleState::Settled(Outcome::Rejected) => "settled_err",
        }
    }
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
