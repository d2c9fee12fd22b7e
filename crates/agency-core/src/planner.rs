//! Backward-chaining planner: from each candidate goal's unmet facts, expand
//! through action effects and preconditions to build one plan per goal, then
//! pick the globally best plan by benefit/cost score.
//!
//! Priority only gates which goals are attempted and in what order; the final
//! winner across goals is chosen economically. "No plan" is a normal outcome,
//! not an error — the caller retries on a later tick.

use std::cmp::Ordering;
use std::collections::BTreeSet;

use contracts::PlannerConfig;
use tracing::{debug, trace};

use crate::action::{Action, ActionCatalog};
use crate::belief::{BeliefSet, EvalContext};
use crate::goal::Goal;
use crate::plan::Plan;

#[derive(Debug, Clone, Default)]
pub struct Planner {
    config: PlannerConfig,
}

impl Planner {
    pub fn new(config: PlannerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PlannerConfig {
        &self.config
    }

    /// Produce the best plan over the given goals, or `None` when no
    /// candidate goal can be solved with the available actions.
    ///
    /// `recent_goal` names the most-recently-completed goal; it receives a
    /// small priority penalty so ties favor switching tasks.
    pub fn plan(
        &self,
        ctx: &EvalContext<'_>,
        beliefs: &BeliefSet,
        catalog: &ActionCatalog,
        goals: &[Goal],
        recent_goal: Option<&str>,
    ) -> Option<Plan> {
        let candidates = self.order_candidates(ctx, beliefs, goals, recent_goal);
        trace!(
            agent = %ctx.agent.id,
            candidates = candidates.len(),
            "planning pass"
        );

        let mut best: Option<Plan> = None;
        for goal in candidates {
            let Some(plan) = self.plan_for_goal(ctx, beliefs, catalog, goal) else {
                continue;
            };
            // Strictly-greater keeps the earlier (higher-priority) plan on a
            // score tie.
            if best.as_ref().map_or(true, |b| plan.score() > b.score()) {
                best = Some(plan);
            }
        }

        match &best {
            Some(plan) => debug!(agent = %ctx.agent.id, plan = ?plan.summary(), "plan selected"),
            None => debug!(agent = %ctx.agent.id, "no candidate goal could be solved"),
        }
        best
    }

    /// Same contract as [`Planner::plan`] behind a suspension point with an
    /// artificial minimum latency, so planning cadence can be decoupled from
    /// the caller's update loop. Cooperatively cancellable at the await with
    /// no observable partial effect.
    pub async fn plan_async(
        &self,
        ctx: &EvalContext<'_>,
        beliefs: &BeliefSet,
        catalog: &ActionCatalog,
        goals: &[Goal],
        recent_goal: Option<&str>,
    ) -> Option<Plan> {
        let started = tokio::time::Instant::now();
        let plan = self.plan(ctx, beliefs, catalog, goals, recent_goal);
        let elapsed = started.elapsed();
        if elapsed < self.config.min_async_latency {
            tokio::time::sleep(self.config.min_async_latency - elapsed).await;
        }
        plan
    }

    /// Backward-chain a plan for one goal. `None` when some required fact has
    /// no producing action left in the pool.
    pub fn plan_for_goal(
        &self,
        ctx: &EvalContext<'_>,
        beliefs: &BeliefSet,
        catalog: &ActionCatalog,
        goal: &Goal,
    ) -> Option<Plan> {
        let mut required = goal.unmet_facts(beliefs, ctx);
        if required.is_empty() {
            return None;
        }

        let mut pool: Vec<_> = catalog.templates().iter().collect();
        let mut visited_effects: BTreeSet<String> = BTreeSet::new();
        let mut chosen: Vec<Action> = Vec::new();
        let mut cost = 0.0;
        let mut benefit = 0.0;

        while !required.is_empty() {
            let mut best: Option<(usize, f64)> = None;
            for (idx, template) in pool.iter().enumerate() {
                let coverage = template
                    .effects
                    .iter()
                    .filter(|effect| required.contains(*effect))
                    .count();
                if coverage == 0 {
                    continue;
                }
                // An action whose every effect was already produced adds
                // nothing new to the chain.
                if template
                    .effects
                    .iter()
                    .all(|effect| visited_effects.contains(effect))
                {
                    continue;
                }

                let chained = template
                    .preconditions
                    .iter()
                    .filter(|pre| visited_effects.contains(*pre))
                    .count();
                let coverage = coverage as f64;
                let score = coverage * coverage * self.config.coverage_weight
                    + template.score() * self.config.score_weight
                    + chained as f64 * self.config.chain_weight;
                if best.map_or(true, |(_, best_score)| score > best_score) {
                    best = Some((idx, score));
                }
            }

            let Some((idx, _)) = best else {
                trace!(
                    agent = %ctx.agent.id,
                    goal = %goal.name,
                    unresolved = ?required,
                    "no action covers the remaining facts"
                );
                return None;
            };

            let template = pool.remove(idx);
            for effect in &template.effects {
                required.remove(effect);
                visited_effects.insert(effect.clone());
            }
            for pre in &template.preconditions {
                if beliefs.holds(pre, ctx) {
                    continue;
                }
                // Effects of earlier-chosen actions run LATER than this one,
                // so they cannot satisfy its preconditions. Reclaim the fact:
                // a producer chosen after this action executes before it.
                visited_effects.remove(pre);
                required.insert(pre.clone());
            }
            cost += template.cost;
            benefit += template.benefit;
            // Reverse-build order: the goal-achiever lands first, producers
            // after it, so popping from the end runs producers first.
            chosen.push(Action::from_template(template));
        }

        Some(Plan::new(goal.name.clone(), chosen, cost, benefit))
    }

    /// Unsatisfied goals sorted by effective priority, highest first. A
    /// predicate failure leaves its goal unsatisfied (and thus a candidate)
    /// rather than aborting the pass.
    fn order_candidates<'g>(
        &self,
        ctx: &EvalContext<'_>,
        beliefs: &BeliefSet,
        goals: &'g [Goal],
        recent_goal: Option<&str>,
    ) -> Vec<&'g Goal> {
        order_unsatisfied(
            ctx,
            beliefs,
            goals,
            recent_goal,
            self.config.recent_goal_penalty,
        )
    }
}

/// Shared candidacy ordering: unsatisfied goals by descending priority, with
/// the most-recently-completed goal penalized and names breaking exact ties
/// deterministically.
pub(crate) fn order_unsatisfied<'g>(
    ctx: &EvalContext<'_>,
    beliefs: &BeliefSet,
    goals: &'g [Goal],
    recent_goal: Option<&str>,
    recent_penalty: f64,
) -> Vec<&'g Goal> {
    let effective = |goal: &Goal| {
        if Some(goal.name.as_str()) == recent_goal {
            goal.priority - recent_penalty
        } else {
            goal.priority
        }
    };

    let mut candidates: Vec<&Goal> = goals
        .iter()
        .filter(|goal| !goal.is_satisfied(beliefs, ctx))
        .collect();
    candidates.sort_by(|a, b| {
        effective(b)
            .partial_cmp(&effective(a))
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.name.cmp(&b.name))
    });
    candidates
}
