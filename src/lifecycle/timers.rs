//! Phase timers.
//!
//! Each operation owns one connect timer slot and one response timer slot.
//! At most one of them is live at any instant; switching from the connect
//! phase to the response phase happens in a single synchronous call.

use std::future::pending;
use std::pin::Pin;
use std::time::Duration;

use tokio::time::{sleep, Instant, Sleep};

use crate::error::{Phase, TimeoutError};

/// A single-shot countdown for one phase.
#[derive(Debug)]
pub struct PhaseTimer {
    phase: Phase,
    bound: Duration,
    started: Instant,
    sleep: Pin<Box<Sleep>>,
}

impl PhaseTimer {
    fn arm(phase: Phase, bound: Duration) -> Self {
        tracing::trace!(phase = %phase, bound_ms = bound.as_millis() as u64, "Timer armed");
        Self {
            phase,
            bound,
            started: Instant::now(),
            sleep: Box::pin(sleep(bound)),
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn bound(&self) -> Duration {
        self.bound
    }

    /// Time since the timer was armed.
    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

/// The connect and response timers of one operation.
#[derive(Debug)]
pub struct Timers {
    connect_bound: Duration,
    response_bound: Duration,
    connect: Option<PhaseTimer>,
    response: Option<PhaseTimer>,
}

impl Timers {
    pub fn new(connect_bound: Duration, response_bound: Duration) -> Self {
        Self {
            connect_bound,
            response_bound,
            connect: None,
            response: None,
        }
    }

    /// Start the connect phase countdown.
    pub fn arm_connect(&mut self) {
        debug_assert!(self.is_idle(), "connect timer armed while another timer is live");
        self.response = None;
        self.connect = Some(PhaseTimer::arm(Phase::Connect, self.connect_bound));
    }

    /// Disarm the connect timer (if any) and arm the response timer.
    pub fn enter_response_phase(&mut self) {
        if let Some(timer) = self.connect.take() {
            tracing::trace!(
                phase = %timer.phase,
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "Timer disarmed"
            );
        }
        self.response = Some(PhaseTimer::arm(Phase::Response, self.response_bound));
    }

    /// Disarm whatever is live. Safe to call any number of times.
    pub fn disarm_all(&mut self) {
        for timer in [self.connect.take(), self.response.take()].into_iter().flatten() {
            tracing::trace!(
                phase = %timer.phase,
                elapsed_ms = timer.elapsed().as_millis() as u64,
                "Timer disarmed"
            );
        }
    }

    /// The phase whose timer is live, if any.
    pub fn active(&self) -> Option<Phase> {
        self.live().map(|t| t.phase)
    }

    pub fn live(&self) -> Option<&PhaseTimer> {
        self.connect.as_ref().or(self.response.as_ref())
    }

    pub fn is_idle(&self) -> bool {
        self.connect.is_none() && self.response.is_none()
    }

    /// Resolves when the live timer fires; never resolves while idle.
    ///
    /// Cancel safe: dropping the future leaves the timer armed with its
    /// original deadline. A fired timer is disarmed and cannot fire again.
    pub async fn expired(&mut self) -> TimeoutError {
        let slot = if self.connect.is_some() {
            &mut self.connect
        } else if self.response.is_some() {
            &mut self.response
        } else {
            return pending().await;
        };

        if let Some(timer) = slot.as_mut() {
            timer.sleep.as_mut().await;
        }
        match slot.take() {
            Some(timer) => TimeoutError {
                phase: timer.phase,
                bound: timer.bound,
            },
            None => pending().await,
        }
    }
}
