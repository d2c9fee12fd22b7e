//! Cross-boundary contracts for the agent decision core: action and goal
//! templates, strategy identifiers, planner/cache/interruption/stack
//! configuration, and planner statistics.
//!
//! Everything here is plain serializable data. Behavior (fact evaluation,
//! search, caching, preemption) lives in `agency-core`.

use std::time::Duration;

use serde::{Deserialize, Serialize};

pub mod planning;

/// Floor applied to plan and action costs when computing benefit/cost scores,
/// so zero-cost actions do not divide by zero.
pub const SCORE_COST_EPSILON: f64 = 1e-3;

// ---------------------------------------------------------------------------
// Spatial
// ---------------------------------------------------------------------------

/// A 2D world position. The planner never pathfinds; positions are only
/// carried as context (belief locations, suspended-plan resume points).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Default)]
pub struct Location {
    pub x: f64,
    pub y: f64,
}

impl Location {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Location) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

// ---------------------------------------------------------------------------
// Strategy identifiers
// ---------------------------------------------------------------------------

/// Stable identifier for the executable strategy bound to an action instance.
///
/// The strategy factory in `agency-core` is keyed by this enum; embedders with
/// real effectors (movement, crafting, harvesting) swap their own strategy in
/// on the bound instance instead of extending this set.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Completes on the tick it starts.
    Instant,
    /// Runs for a fixed duration, then completes.
    Timed { seconds: f64 },
    /// Waits out the clock while doing nothing; always performable.
    Idle { seconds: f64 },
}

// ---------------------------------------------------------------------------
// Action and goal templates
// ---------------------------------------------------------------------------

/// Immutable per-world action definition. Agents never share instances;
/// each agent binds its own copy with a fresh strategy via
/// `agency-core::action::Action::from_template`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionTemplate {
    pub name: String,
    /// Effort to perform the action.
    pub cost: f64,
    /// Value of achieving the action's effects.
    pub benefit: f64,
    /// Fact names that must hold before the action can run.
    #[serde(default)]
    pub preconditions: Vec<String>,
    /// Fact names asserted true when the action completes.
    #[serde(default)]
    pub effects: Vec<String>,
    pub strategy: StrategyKind,
}

impl ActionTemplate {
    /// Benefit per unit of effort.
    pub fn score(&self) -> f64 {
        self.benefit / self.cost.max(SCORE_COST_EPSILON)
    }
}

/// Immutable goal definition: a prioritized desire expressed as fact names
/// that must all become true.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoalTemplate {
    pub name: String,
    /// Higher is more urgent. Gates which goals are attempted first; the
    /// winning plan is still chosen by benefit/cost score.
    pub priority: f64,
    pub desired_facts: Vec<String>,
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Tuning for the backward-chaining planner.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlannerConfig {
    /// Weight on squared effect coverage when scoring candidate actions.
    pub coverage_weight: f64,
    /// Weight on the action's own benefit/cost score.
    pub score_weight: f64,
    /// Weight on preconditions already produced by previously chosen actions.
    pub chain_weight: f64,
    /// Priority penalty applied to the most-recently-completed goal so ties
    /// favor switching tasks.
    pub recent_goal_penalty: f64,
    /// Artificial minimum latency of the asynchronous planning variant.
    pub min_async_latency: Duration,
}

impl Default for PlannerConfig {
    fn default() -> Self {
        Self {
            coverage_weight: 10.0,
            score_weight: 1.0,
            chain_weight: 2.0,
            recent_goal_penalty: 0.5,
            min_async_latency: Duration::from_millis(100),
        }
    }
}

/// Tuning for the incremental planner's per-goal cache.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CacheConfig {
    /// Entries older than this are discarded regardless of fact drift.
    pub ttl: Duration,
    /// Oldest entries are evicted beyond this size.
    pub max_entries: usize,
    /// Repair is attempted only when fewer than this many tracked facts
    /// changed; otherwise the entry is discarded and fully replanned.
    pub max_changed_facts_for_repair: usize,
    /// Steeper than the base planner's penalty, so a freshly finished goal is
    /// even less likely to be re-picked off its own warm cache entry.
    pub recent_goal_penalty: f64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(10),
            max_entries: 5,
            max_changed_facts_for_repair: 3,
            recent_goal_penalty: 1.5,
        }
    }
}

/// Tuning for the interruption manager.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterruptionConfig {
    /// Minimum time between source evaluations. Zero means every call.
    pub check_interval: Duration,
}

impl Default for InterruptionConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_millis(500),
        }
    }
}

/// Tuning for the suspended-plan stack.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StackConfig {
    /// Pushes beyond this depth are rejected, not overwritten.
    pub max_depth: usize,
}

impl Default for StackConfig {
    fn default() -> Self {
        Self { max_depth: 3 }
    }
}

// ---------------------------------------------------------------------------
// Statistics and summaries
// ---------------------------------------------------------------------------

/// Hit/miss counters exposed by the incremental planner.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct PlannerStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl PlannerStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Loggable description of a produced plan, in execution order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PlanSummary {
    pub goal: String,
    pub actions: Vec<String>,
    pub cost: f64,
    pub benefit: f64,
    pub score: f64,
}
