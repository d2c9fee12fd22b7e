//! Priority-ordered preemption: interruption sources and the manager that
//! polls them.
//!
//! The manager is checked first in every agent tick, at most once per
//! configured interval. Sources are tried in descending priority; a source on
//! cooldown, or whose proposed goal the agent is already pursuing, is
//! skipped. The first source to fire wins and its cooldown resets.

use std::fmt;
use std::time::Duration;

use contracts::InterruptionConfig;
use tracing::debug;

use crate::belief::EvalContext;
use crate::goal::Goal;

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// A rule that can preempt the current plan in favor of a more urgent goal.
pub trait InterruptionSource: fmt::Debug + Send {
    fn name(&self) -> &str;

    /// Sources are evaluated in descending priority.
    fn priority(&self) -> f64;

    /// Minimum time between two firings of this source.
    fn cooldown(&self) -> Duration {
        Duration::from_secs(5)
    }

    /// The urgent condition, evaluated against explicit context.
    fn should_trigger(&self, ctx: &EvalContext<'_>) -> bool;

    /// The concrete goal to switch to when this source fires.
    fn proposed_goal(&self) -> Goal;

    /// Whether the interrupted plan should be suspended for later resumption
    /// rather than discarded.
    fn preserve_current_plan(&self) -> bool {
        true
    }

    /// Skip firing when the agent is already on this source's goal. Sources
    /// may override with a more specific check; the default compares goal
    /// names.
    fn already_pursuing(&self, current_goal: Option<&str>) -> bool {
        current_goal == Some(self.proposed_goal().name.as_str())
    }
}

/// Fires when a numeric agent vital drops below a critical threshold.
#[derive(Debug)]
pub struct VitalThresholdSource {
    name: String,
    stat: String,
    critical_below: f64,
    priority: f64,
    cooldown: Duration,
    goal: Goal,
    preserve_plan: bool,
}

impl VitalThresholdSource {
    pub fn new(
        name: impl Into<String>,
        stat: impl Into<String>,
        critical_below: f64,
        priority: f64,
        goal: Goal,
    ) -> Self {
        Self {
            name: name.into(),
            stat: stat.into(),
            critical_below,
            priority,
            cooldown: Duration::from_secs(5),
            goal,
            preserve_plan: true,
        }
    }

    pub fn with_cooldown(mut self, cooldown: Duration) -> Self {
        self.cooldown = cooldown;
        self
    }

    pub fn discarding_current_plan(mut self) -> Self {
        self.preserve_plan = false;
        self
    }
}

impl InterruptionSource for VitalThresholdSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> f64 {
        self.priority
    }

    fn cooldown(&self) -> Duration {
        self.cooldown
    }

    fn should_trigger(&self, ctx: &EvalContext<'_>) -> bool {
        ctx.agent
            .stat(&self.stat)
            .map_or(false, |value| value < self.critical_below)
    }

    fn proposed_goal(&self) -> Goal {
        self.goal.clone()
    }

    fn preserve_current_plan(&self) -> bool {
        self.preserve_plan
    }
}

// ---------------------------------------------------------------------------
// Manager
// ---------------------------------------------------------------------------

/// A fired interruption: the goal to switch to and whether the interrupted
/// plan is worth keeping.
#[derive(Debug, Clone, PartialEq)]
pub struct Interruption {
    pub source: String,
    pub goal: Goal,
    pub preserve_plan: bool,
}

#[derive(Debug)]
struct SourceSlot {
    source: Box<dyn InterruptionSource>,
    last_fired: Option<Duration>,
}

#[derive(Debug)]
pub struct InterruptionManager {
    config: InterruptionConfig,
    /// Kept sorted by descending source priority.
    slots: Vec<SourceSlot>,
    last_check: Option<Duration>,
}

impl Default for InterruptionManager {
    fn default() -> Self {
        Self::new(InterruptionConfig::default())
    }
}

impl InterruptionManager {
    pub fn new(config: InterruptionConfig) -> Self {
        Self {
            config,
            slots: Vec::new(),
            last_check: None,
        }
    }

    pub fn add_source(&mut self, source: Box<dyn InterruptionSource>) {
        let priority = source.priority();
        let at = self
            .slots
            .partition_point(|slot| slot.source.priority() >= priority);
        self.slots.insert(
            at,
            SourceSlot {
                source,
                last_fired: None,
            },
        );
    }

    pub fn remove_source(&mut self, name: &str) -> bool {
        let before = self.slots.len();
        self.slots.retain(|slot| slot.source.name() != name);
        self.slots.len() != before
    }

    pub fn source_count(&self) -> usize {
        self.slots.len()
    }

    /// Interval-gated check. Returns `None` without evaluating any source
    /// when called again before the configured interval has elapsed.
    pub fn check(
        &mut self,
        ctx: &EvalContext<'_>,
        current_goal: Option<&str>,
        now: Duration,
    ) -> Option<Interruption> {
        if !self.config.check_interval.is_zero() {
            if let Some(last) = self.last_check {
                if now.saturating_sub(last) < self.config.check_interval {
                    return None;
                }
            }
        }
        self.last_check = Some(now);
        self.evaluate(ctx, current_goal, now)
    }

    /// Evaluate sources immediately, bypassing the interval gate. Cooldowns
    /// still apply.
    pub fn force_check(
        &mut self,
        ctx: &EvalContext<'_>,
        current_goal: Option<&str>,
        now: Duration,
    ) -> Option<Interruption> {
        self.evaluate(ctx, current_goal, now)
    }

    fn evaluate(
        &mut self,
        ctx: &EvalContext<'_>,
        current_goal: Option<&str>,
        now: Duration,
    ) -> Option<Interruption> {
        for slot in &mut self.slots {
            if let Some(fired) = slot.last_fired {
                if now.saturating_sub(fired) < slot.source.cooldown() {
                    continue;
                }
            }
            if slot.source.already_pursuing(current_goal) {
                continue;
            }
            if !slot.source.should_trigger(ctx) {
                continue;
            }

            slot.last_fired = Some(now);
            let interruption = Interruption {
                source: slot.source.name().to_string(),
                goal: slot.source.proposed_goal(),
                preserve_plan: slot.source.preserve_current_plan(),
            };
            debug!(
                agent = %ctx.agent.id,
                source = %interruption.source,
                goal = %interruption.goal.name,
                "interruption fired"
            );
            return Some(interruption);
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::belief::{AgentState, WorldState};

    fn hungry_agent() -> AgentState {
        let mut agent = AgentState::new("npc_1");
        agent.set_stat("satiety", 5.0);
        agent
    }

    fn eat_source() -> VitalThresholdSource {
        VitalThresholdSource::new(
            "starvation",
            "satiety",
            10.0,
            9.0,
            Goal::new("eat", 9.0, ["fed".to_string()]),
        )
    }

    #[test]
    fn cooldown_blocks_refiring_while_condition_stays_true() {
        let agent = hungry_agent();
        let world = WorldState::new();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let mut manager = InterruptionManager::new(InterruptionConfig {
            check_interval: Duration::ZERO,
        });
        manager.add_source(Box::new(eat_source()));

        assert!(manager.check(&ctx, None, Duration::ZERO).is_some());
        // Condition still true at t=1s but the 5s cooldown has not elapsed.
        assert!(manager.check(&ctx, None, Duration::from_secs(1)).is_none());
        // t=6s: cooldown elapsed, fires again.
        assert!(manager.check(&ctx, None, Duration::from_secs(6)).is_some());
    }

    #[test]
    fn check_interval_gates_evaluation_but_force_check_does_not() {
        let agent = hungry_agent();
        let world = WorldState::new();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let mut manager = InterruptionManager::default();
        manager.add_source(Box::new(eat_source().with_cooldown(Duration::ZERO)));

        assert!(manager.check(&ctx, None, Duration::ZERO).is_some());
        // 100ms later: inside the 500ms interval, no source is evaluated.
        assert!(manager.check(&ctx, None, Duration::from_millis(100)).is_none());
        // force_check bypasses the interval.
        assert!(manager
            .force_check(&ctx, None, Duration::from_millis(100))
            .is_some());
        assert!(manager.check(&ctx, None, Duration::from_millis(600)).is_some());
    }

    #[test]
    fn sources_fire_in_priority_order() {
        let agent = hungry_agent();
        let world = WorldState::new();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let mut manager = InterruptionManager::new(InterruptionConfig {
            check_interval: Duration::ZERO,
        });
        manager.add_source(Box::new(VitalThresholdSource::new(
            "peckish",
            "satiety",
            50.0,
            1.0,
            Goal::new("snack", 1.0, ["fed".to_string()]),
        )));
        manager.add_source(Box::new(eat_source()));

        let fired = manager.check(&ctx, None, Duration::ZERO).expect("fires");
        assert_eq!(fired.source, "starvation");
    }

    #[test]
    fn already_pursuing_goal_suppresses_the_source() {
        let agent = hungry_agent();
        let world = WorldState::new();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let mut manager = InterruptionManager::new(InterruptionConfig {
            check_interval: Duration::ZERO,
        });
        manager.add_source(Box::new(eat_source()));

        assert!(manager.check(&ctx, Some("eat"), Duration::ZERO).is_none());
        assert!(manager.check(&ctx, Some("patrol"), Duration::ZERO).is_some());
    }

    #[test]
    fn condition_false_does_not_fire() {
        let mut agent = AgentState::new("npc_1");
        agent.set_stat("satiety", 80.0);
        let world = WorldState::new();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let mut manager = InterruptionManager::new(InterruptionConfig {
            check_interval: Duration::ZERO,
        });
        manager.add_source(Box::new(eat_source()));
        assert!(manager.check(&ctx, None, Duration::ZERO).is_none());
    }

    #[test]
    fn add_and_remove_sources() {
        let mut manager = InterruptionManager::default();
        manager.add_source(Box::new(eat_source()));
        assert_eq!(manager.source_count(), 1);
        assert!(manager.remove_source("starvation"));
        assert!(!manager.remove_source("starvation"));
        assert_eq!(manager.source_count(), 0);
    }
}
