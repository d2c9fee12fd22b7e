//! Executable strategies: the state machine bound to one action instance.
//!
//! Strategies are constructed through [`build_strategy`] keyed by a stable
//! [`StrategyKind`], never through reflection. Real effectors (movement,
//! crafting, harvesting) live outside this crate and are swapped onto a bound
//! action via [`crate::action::Action::with_strategy`].

use std::fmt;
use std::time::Duration;

use contracts::StrategyKind;

use crate::belief::EvalContext;

/// Explicit lifecycle of a strategy instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyState {
    Idle,
    Running,
    Complete,
}

/// The executable state machine bound to one action instance. One instance
/// per bound action; never shared across agents.
pub trait Strategy: fmt::Debug + Send {
    fn state(&self) -> StrategyState;

    /// Whether the strategy could start right now.
    fn can_perform(&self, _ctx: &EvalContext<'_>) -> bool {
        true
    }

    fn complete(&self) -> bool {
        self.state() == StrategyState::Complete
    }

    fn start(&mut self, ctx: &EvalContext<'_>);

    fn update(&mut self, dt: Duration, ctx: &EvalContext<'_>);

    /// Abort without completing. Idempotent.
    fn stop(&mut self);
}

/// Build the stock strategy for a kind. Factory seam for the
/// template-to-instance clone path.
pub fn build_strategy(kind: StrategyKind) -> Box<dyn Strategy> {
    match kind {
        StrategyKind::Instant => Box::new(InstantStrategy::new()),
        StrategyKind::Timed { seconds } => Box::new(TimedStrategy::new(seconds_to_duration(seconds))),
        StrategyKind::Idle { seconds } => Box::new(IdleStrategy::new(seconds_to_duration(seconds))),
    }
}

fn seconds_to_duration(seconds: f64) -> Duration {
    Duration::from_secs_f64(seconds.max(0.0))
}

// ---------------------------------------------------------------------------
// Stock strategies
// ---------------------------------------------------------------------------

/// Completes on the tick it starts.
#[derive(Debug, Default)]
pub struct InstantStrategy {
    state: StrategyState,
}

impl Default for StrategyState {
    fn default() -> Self {
        StrategyState::Idle
    }
}

impl InstantStrategy {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Strategy for InstantStrategy {
    fn state(&self) -> StrategyState {
        self.state
    }

    fn start(&mut self, _ctx: &EvalContext<'_>) {
        self.state = StrategyState::Complete;
    }

    fn update(&mut self, _dt: Duration, _ctx: &EvalContext<'_>) {}

    fn stop(&mut self) {
        if self.state == StrategyState::Running {
            self.state = StrategyState::Idle;
        }
    }
}

/// Runs for a fixed duration, then completes.
#[derive(Debug)]
pub struct TimedStrategy {
    duration: Duration,
    elapsed: Duration,
    state: StrategyState,
}

impl TimedStrategy {
    pub fn new(duration: Duration) -> Self {
        Self {
            duration,
            elapsed: Duration::ZERO,
            state: StrategyState::Idle,
        }
    }

    pub fn remaining(&self) -> Duration {
        self.duration.saturating_sub(self.elapsed)
    }
}

impl Strategy for TimedStrategy {
    fn state(&self) -> StrategyState {
        self.state
    }

    fn start(&mut self, _ctx: &EvalContext<'_>) {
        self.elapsed = Duration::ZERO;
        self.state = if self.duration.is_zero() {
            StrategyState::Complete
        } else {
            StrategyState::Running
        };
    }

    fn update(&mut self, dt: Duration, _ctx: &EvalContext<'_>) {
        if self.state != StrategyState::Running {
            return;
        }
        self.elapsed += dt;
        if self.elapsed >= self.duration {
            self.state = StrategyState::Complete;
        }
    }

    fn stop(&mut self) {
        if self.state == StrategyState::Running {
            self.state = StrategyState::Idle;
            self.elapsed = Duration::ZERO;
        }
    }
}

/// Waits out the clock while doing nothing. Always performable.
#[derive(Debug)]
pub struct IdleStrategy {
    inner: TimedStrategy,
}

impl IdleStrategy {
    pub fn new(duration: Duration) -> Self {
        Self {
            inner: TimedStrategy::new(duration),
        }
    }
}

impl Strategy for IdleStrategy {
    fn state(&self) -> StrategyState {
        self.inner.state()
    }

    fn start(&mut self, ctx: &EvalContext<'_>) {
        self.inner.start(ctx);
    }

    fn update(&mut self, dt: Duration, ctx: &EvalContext<'_>) {
        self.inner.update(dt, ctx);
    }

    fn stop(&mut self) {
        self.inner.stop();
    }
}
