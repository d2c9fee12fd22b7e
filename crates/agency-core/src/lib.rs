//! Decision-making core for autonomous agents: named boolean facts, actions
//! with cost/benefit and pre/post-conditions, prioritized goals, a
//! backward-chaining planner with an incremental cache, and a priority-ordered
//! interruption layer with resumable suspended plans.
//!
//! The per-tick control flow lives in [`agent::Agent::tick`]: interruptions
//! are polled first, then the in-flight action advances, then the incremental
//! planner is consulted when the agent has nothing to do.

pub mod action;
pub mod agent;
pub mod belief;
pub mod goal;
pub mod incremental;
pub mod interruption;
pub mod plan;
pub mod plan_stack;
pub mod planner;
pub mod strategy;
