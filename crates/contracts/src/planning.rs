//! Planning-focused contract re-exports.

pub use crate::{
    ActionTemplate, CacheConfig, GoalTemplate, InterruptionConfig, PlanSummary, PlannerConfig,
    PlannerStats, StackConfig, StrategyKind, SCORE_COST_EPSILON,
};
