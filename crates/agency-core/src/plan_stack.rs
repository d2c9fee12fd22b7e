//! Bounded LIFO of suspended plans awaiting resumption.
//!
//! A push beyond capacity is rejected, never silently overwritten, and
//! over/underflow is reported by the return value rather than a panic.

use contracts::{Location, StackConfig};
use tracing::trace;

use crate::goal::Goal;
use crate::plan::Plan;

/// A plan suspended mid-execution, with enough context to resume exactly
/// where it was interrupted.
#[derive(Debug)]
pub struct SuspendedPlan {
    pub goal: Goal,
    pub plan: Plan,
    /// Where the agent stood when the plan was suspended.
    pub location: Option<Location>,
}

#[derive(Debug)]
pub struct PlanStack {
    entries: Vec<SuspendedPlan>,
    max_depth: usize,
}

impl Default for PlanStack {
    fn default() -> Self {
        Self::new(StackConfig::default())
    }
}

impl PlanStack {
    pub fn new(config: StackConfig) -> Self {
        Self {
            entries: Vec::with_capacity(config.max_depth),
            max_depth: config.max_depth,
        }
    }

    pub fn can_push(&self) -> bool {
        self.entries.len() < self.max_depth
    }

    /// Push a suspended plan. Returns `false` — leaving the stack untouched —
    /// when the stack is full or the plan has nothing left to resume.
    pub fn try_push(&mut self, suspended: SuspendedPlan) -> bool {
        if !self.can_push() {
            trace!(
                goal = %suspended.goal.name,
                depth = self.entries.len(),
                "plan stack full; push rejected"
            );
            return false;
        }
        if suspended.plan.is_exhausted() {
            trace!(goal = %suspended.goal.name, "exhausted plan not worth suspending");
            return false;
        }
        self.entries.push(suspended);
        true
    }

    pub fn try_pop(&mut self) -> Option<SuspendedPlan> {
        self.entries.pop()
    }

    pub fn try_peek(&self) -> Option<&SuspendedPlan> {
        self.entries.last()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
