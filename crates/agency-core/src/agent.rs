//! Agent control loop: compose beliefs, actions, goals, the incremental
//! planner, the interruption manager, and the plan stack into a single
//! per-tick decision step.
//!
//! The loop per tick: poll interruptions first → advance the in-flight
//! action (applying its effects to the fact model on completion) → start the
//! next planned action → otherwise ask the planner; when a plan finishes, a
//! stacked plan resumes before any new planning happens.

use std::time::Duration;

use tracing::{debug, trace, warn};

use crate::action::{Action, ActionCatalog};
use crate::belief::{AgentState, BeliefSet, EvalContext, WorldState};
use crate::goal::Goal;
use crate::incremental::IncrementalPlanner;
use crate::interruption::{Interruption, InterruptionManager};
use crate::plan::Plan;
use crate::plan_stack::{PlanStack, SuspendedPlan};

/// What a single tick decided.
#[derive(Debug, Clone, PartialEq)]
pub enum TickOutcome {
    /// A source preempted the current activity in favor of `goal`.
    Interrupted { source: String, goal: String },
    /// A new plan was adopted; its first action starts next tick.
    Planned { goal: String },
    /// The next planned action started executing.
    Started { goal: String, action: String },
    /// The in-flight action is still running.
    InProgress { action: String },
    /// The in-flight action finished; its effects were applied.
    Completed { action: String },
    /// The plan ran to exhaustion.
    GoalReached { goal: String },
    /// A suspended plan was popped off the stack to continue.
    Resumed { goal: String },
    /// The next action was not performable; the plan was discarded.
    Abandoned { goal: String, action: String },
    /// Nothing to do this tick.
    Idle,
}

#[derive(Debug)]
struct ActivePlan {
    goal: Goal,
    plan: Plan,
    in_flight: Option<Action>,
}

/// An autonomous agent. Each agent owns its own beliefs, action catalog,
/// planner cache, interruption sources, and plan stack; independent agents
/// may tick in parallel without synchronization.
#[derive(Debug)]
pub struct Agent {
    pub state: AgentState,
    pub beliefs: BeliefSet,
    pub catalog: ActionCatalog,
    pub goals: Vec<Goal>,
    pub planner: IncrementalPlanner,
    pub interruptions: InterruptionManager,
    pub stack: PlanStack,
    active: Option<ActivePlan>,
    recent_goal: Option<String>,
}

impl Agent {
    pub fn new(state: AgentState) -> Self {
        Self {
            state,
            beliefs: BeliefSet::new(),
            catalog: ActionCatalog::new(),
            goals: Vec::new(),
            planner: IncrementalPlanner::default(),
            interruptions: InterruptionManager::default(),
            stack: PlanStack::default(),
            active: None,
            recent_goal: None,
        }
    }

    pub fn current_goal(&self) -> Option<&str> {
        self.active.as_ref().map(|active| active.goal.name.as_str())
    }

    pub fn recent_goal(&self) -> Option<&str> {
        self.recent_goal.as_deref()
    }

    /// Adopt a plan directly, bypassing the planner. Used by embedders that
    /// script behavior or restore an agent into a known activity.
    pub fn set_active_plan(&mut self, goal: Goal, plan: Plan) {
        self.active = Some(ActivePlan {
            goal,
            plan,
            in_flight: None,
        });
    }

    /// One decision step. `now` is monotonic time since simulation start and
    /// `dt` the time elapsed since the previous tick. World mutation (effect
    /// application) happens strictly inside this call, never concurrently
    /// with a planning pass.
    pub fn tick(&mut self, world: &mut WorldState, now: Duration, dt: Duration) -> TickOutcome {
        // 1. Interruptions preempt everything else.
        let fired = {
            let ctx = EvalContext {
                agent: &self.state,
                world,
            };
            let current = self.active.as_ref().map(|a| a.goal.name.as_str());
            self.interruptions.check(&ctx, current, now)
        };
        if let Some(interruption) = fired {
            return self.adopt_interruption(interruption, world, now);
        }

        // 2. Advance the in-flight action.
        if let Some(active) = self.active.as_mut() {
            if let Some(mut action) = active.in_flight.take() {
                let ctx = EvalContext {
                    agent: &self.state,
                    world,
                };
                action.update(dt, &ctx);
                if !action.complete() {
                    let name = action.name().to_string();
                    active.in_flight = Some(action);
                    return TickOutcome::InProgress { action: name };
                }

                apply_effects(&self.beliefs, world, &action);
                let name = action.name().to_string();
                if !active.plan.is_exhausted() {
                    return TickOutcome::Completed { action: name };
                }

                let goal = active.goal.name.clone();
                self.active = None;
                self.recent_goal = Some(goal.clone());
                debug!(agent = %self.state.id, goal = %goal, "plan exhausted");

                if let Some(suspended) = self.stack.try_pop() {
                    let resumed = suspended.goal.name.clone();
                    debug!(agent = %self.state.id, goal = %resumed, "resuming suspended plan");
                    self.active = Some(ActivePlan {
                        goal: suspended.goal,
                        plan: suspended.plan,
                        in_flight: None,
                    });
                    return TickOutcome::Resumed { goal: resumed };
                }
                return TickOutcome::GoalReached { goal };
            }
        }

        // 3. Start the next planned action.
        let mut abandoned: Option<(String, String)> = None;
        if let Some(active) = self.active.as_mut() {
            match active.plan.pop_next() {
                Some(mut action) => {
                    let ctx = EvalContext {
                        agent: &self.state,
                        world,
                    };
                    if action.can_perform(&ctx) {
                        action.start(&ctx);
                        let name = action.name().to_string();
                        let goal = active.goal.name.clone();
                        trace!(agent = %self.state.id, action = %name, "action started");
                        active.in_flight = Some(action);
                        return TickOutcome::Started { goal, action: name };
                    }
                    abandoned = Some((active.goal.name.clone(), action.name().to_string()));
                }
                None => abandoned = Some((active.goal.name.clone(), String::new())),
            }
        }
        if let Some((goal, action)) = abandoned {
            warn!(
                agent = %self.state.id,
                goal = %goal,
                action = %action,
                "plan not executable; discarding"
            );
            self.active = None;
            return TickOutcome::Abandoned { goal, action };
        }

        // 4. No current activity: ask the planner.
        let plan = {
            let ctx = EvalContext {
                agent: &self.state,
                world,
            };
            self.planner.plan(
                &ctx,
                &self.beliefs,
                &self.catalog,
                &self.goals,
                self.recent_goal.as_deref(),
                now,
            )
        };
        match plan {
            Some(plan) => {
                let goal = self
                    .goals
                    .iter()
                    .find(|g| g.name == plan.goal())
                    .cloned()
                    .unwrap_or_else(|| Goal::new(plan.goal(), 0.0, []));
                let name = goal.name.clone();
                self.active = Some(ActivePlan {
                    goal,
                    plan,
                    in_flight: None,
                });
                TickOutcome::Planned { goal: name }
            }
            None => TickOutcome::Idle,
        }
    }

    /// Switch to an interrupt goal, optionally suspending the current plan so
    /// it resumes exactly where it was.
    fn adopt_interruption(
        &mut self,
        interruption: Interruption,
        world: &WorldState,
        now: Duration,
    ) -> TickOutcome {
        if let Some(mut active) = self.active.take() {
            if let Some(mut action) = active.in_flight.take() {
                action.stop();
                // Re-queue so a resumed plan re-runs the interrupted action.
                active.plan.push_next(action);
            }
            if interruption.preserve_plan {
                let suspended = SuspendedPlan {
                    goal: active.goal,
                    plan: active.plan,
                    location: Some(self.state.location),
                };
                if !self.stack.try_push(suspended) {
                    debug!(agent = %self.state.id, "plan stack rejected suspension");
                }
            }
        }

        let goal = interruption.goal.clone();
        let plan = {
            let ctx = EvalContext {
                agent: &self.state,
                world,
            };
            self.planner.plan(
                &ctx,
                &self.beliefs,
                &self.catalog,
                std::slice::from_ref(&goal),
                self.recent_goal.as_deref(),
                now,
            )
        };
        match plan {
            Some(plan) => {
                self.active = Some(ActivePlan {
                    goal: interruption.goal,
                    plan,
                    in_flight: None,
                });
            }
            None => {
                warn!(
                    agent = %self.state.id,
                    goal = %goal.name,
                    "no plan for interrupt goal; retrying next tick"
                );
            }
        }
        TickOutcome::Interrupted {
            source: interruption.source,
            goal: goal.name,
        }
    }
}

/// Apply a completed action's effects to the fact model: every effect belief
/// with a backing world flag is asserted true. Effects without a backing flag
/// belong to external effectors and are left alone.
fn apply_effects(beliefs: &BeliefSet, world: &mut WorldState, action: &Action) {
    for effect in action.effects() {
        match beliefs.get(effect).and_then(crate::belief::Belief::backing_flag) {
            Some(flag) => {
                let flag = flag.to_string();
                world.set_flag(flag, true);
            }
            None => {
                trace!(effect = %effect, "effect has no backing flag; left to effectors");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ActionTemplate, StrategyKind};

    use crate::belief::Belief;
    use crate::interruption::VitalThresholdSource;
    use crate::strategy::{Strategy, StrategyState};

    fn template(
        name: &str,
        strategy: StrategyKind,
        preconditions: &[&str],
        effects: &[&str],
    ) -> ActionTemplate {
        ActionTemplate {
            name: name.to_string(),
            cost: 1.0,
            benefit: 1.0,
            preconditions: preconditions.iter().map(|s| s.to_string()).collect(),
            effects: effects.iter().map(|s| s.to_string()).collect(),
            strategy,
        }
    }

    fn meal_agent() -> Agent {
        let mut agent = Agent::new(AgentState::new("npc_1"));
        agent.beliefs.register(Belief::for_flag("fed"));
        agent.beliefs.register(Belief::for_flag("has_food"));
        agent
            .catalog
            .register(template("gather", StrategyKind::Instant, &[], &["has_food"]));
        agent
            .catalog
            .register(template("eat", StrategyKind::Instant, &["has_food"], &["fed"]));
        agent
            .goals
            .push(Goal::new("eat_meal", 1.0, ["fed".to_string()]));
        agent
    }

    fn tick_at(agent: &mut Agent, world: &mut WorldState, second: u64) -> TickOutcome {
        agent.tick(world, Duration::from_secs(second), Duration::from_secs(1))
    }

    #[test]
    fn full_loop_reaches_the_goal_and_updates_the_fact_model() {
        let mut agent = meal_agent();
        let mut world = WorldState::new();

        assert_eq!(
            tick_at(&mut agent, &mut world, 0),
            TickOutcome::Planned {
                goal: "eat_meal".to_string()
            }
        );
        assert_eq!(agent.current_goal(), Some("eat_meal"));

        assert_eq!(
            tick_at(&mut agent, &mut world, 1),
            TickOutcome::Started {
                goal: "eat_meal".to_string(),
                action: "gather".to_string()
            }
        );
        assert_eq!(
            tick_at(&mut agent, &mut world, 2),
            TickOutcome::Completed {
                action: "gather".to_string()
            }
        );
        assert!(world.flag("has_food"));

        assert_eq!(
            tick_at(&mut agent, &mut world, 3),
            TickOutcome::Started {
                goal: "eat_meal".to_string(),
                action: "eat".to_string()
            }
        );
        assert_eq!(
            tick_at(&mut agent, &mut world, 4),
            TickOutcome::GoalReached {
                goal: "eat_meal".to_string()
            }
        );
        assert!(world.flag("fed"));
        assert_eq!(agent.recent_goal(), Some("eat_meal"));
        assert_eq!(agent.current_goal(), None);

        // Goal satisfied: nothing left to do.
        assert_eq!(tick_at(&mut agent, &mut world, 5), TickOutcome::Idle);
    }

    #[test]
    fn interruption_suspends_and_resumes_the_active_plan() {
        let mut agent = Agent::new(AgentState::new("npc_1"));
        agent.state.set_stat("satiety", 50.0);
        agent.beliefs.register(Belief::for_flag("fed"));
        agent.beliefs.register(Belief::for_flag("patrol_done"));
        agent.catalog.register(template(
            "patrol",
            StrategyKind::Timed { seconds: 10.0 },
            &[],
            &["patrol_done"],
        ));
        agent
            .catalog
            .register(template("eat", StrategyKind::Instant, &[], &["fed"]));
        agent
            .goals
            .push(Goal::new("patrol_goal", 1.0, ["patrol_done".to_string()]));
        agent.interruptions.add_source(Box::new(VitalThresholdSource::new(
            "starvation",
            "satiety",
            10.0,
            9.0,
            Goal::new("eat_now", 9.0, ["fed".to_string()]),
        )));

        let mut world = WorldState::new();
        assert_eq!(
            tick_at(&mut agent, &mut world, 0),
            TickOutcome::Planned {
                goal: "patrol_goal".to_string()
            }
        );
        assert_eq!(
            tick_at(&mut agent, &mut world, 1),
            TickOutcome::Started {
                goal: "patrol_goal".to_string(),
                action: "patrol".to_string()
            }
        );
        assert_eq!(
            tick_at(&mut agent, &mut world, 2),
            TickOutcome::InProgress {
                action: "patrol".to_string()
            }
        );

        // The vital collapses; the next tick preempts patrol.
        agent.state.set_stat("satiety", 5.0);
        assert_eq!(
            tick_at(&mut agent, &mut world, 3),
            TickOutcome::Interrupted {
                source: "starvation".to_string(),
                goal: "eat_now".to_string()
            }
        );
        assert_eq!(agent.stack.len(), 1);
        assert_eq!(agent.current_goal(), Some("eat_now"));

        assert_eq!(
            tick_at(&mut agent, &mut world, 4),
            TickOutcome::Started {
                goal: "eat_now".to_string(),
                action: "eat".to_string()
            }
        );
        agent.state.set_stat("satiety", 80.0);
        assert_eq!(
            tick_at(&mut agent, &mut world, 5),
            TickOutcome::Resumed {
                goal: "patrol_goal".to_string()
            }
        );
        assert!(world.flag("fed"));
        assert!(agent.stack.is_empty());

        // The interrupted patrol re-runs from the start of its action.
        assert_eq!(
            tick_at(&mut agent, &mut world, 6),
            TickOutcome::Started {
                goal: "patrol_goal".to_string(),
                action: "patrol".to_string()
            }
        );
    }

    #[derive(Debug)]
    struct NeverPerformable;

    impl Strategy for NeverPerformable {
        fn state(&self) -> StrategyState {
            StrategyState::Idle
        }

        fn can_perform(&self, _ctx: &EvalContext<'_>) -> bool {
            false
        }

        fn start(&mut self, _ctx: &EvalContext<'_>) {}

        fn update(&mut self, _dt: Duration, _ctx: &EvalContext<'_>) {}

        fn stop(&mut self) {}
    }

    #[test]
    fn unperformable_action_abandons_the_plan() {
        let mut agent = meal_agent();
        let mut world = WorldState::new();

        let blocked = Action::from_template(&template(
            "blocked",
            StrategyKind::Instant,
            &[],
            &["fed"],
        ))
        .with_strategy(Box::new(NeverPerformable));
        agent.set_active_plan(
            Goal::new("scripted", 1.0, ["fed".to_string()]),
            Plan::new("scripted", vec![blocked], 1.0, 1.0),
        );

        assert_eq!(
            tick_at(&mut agent, &mut world, 0),
            TickOutcome::Abandoned {
                goal: "scripted".to_string(),
                action: "blocked".to_string()
            }
        );
        assert_eq!(agent.current_goal(), None);
    }
}
