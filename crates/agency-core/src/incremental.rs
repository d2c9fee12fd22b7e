//! Incremental planner: a memoizing decorator over [`Planner`] with
//! partial-repair semantics.
//!
//! One cache entry per goal, tracking the boolean snapshot of every fact the
//! cached plan depends on. A fresh entry with no drifted facts is a hit; small
//! drift is repaired action-by-action; anything else falls back to a full
//! replan for that goal. Repair is all-or-nothing — a partially repaired plan
//! could violate precondition consistency, so it is discarded instead.

use std::collections::{BTreeMap, BTreeSet};
use std::time::Duration;

use contracts::{ActionTemplate, CacheConfig, PlannerStats};
use tracing::{debug, trace, warn};

use crate::action::{Action, ActionCatalog};
use crate::belief::{BeliefSet, EvalContext};
use crate::goal::Goal;
use crate::plan::Plan;
use crate::planner::{order_unsatisfied, Planner};

// ---------------------------------------------------------------------------
// Cache entries
// ---------------------------------------------------------------------------

/// Strategy-free description of a cached plan. Materialized back into a
/// [`Plan`] (with fresh bound strategies) on every hit.
#[derive(Debug, Clone, PartialEq)]
struct CachedPlan {
    goal: String,
    /// Plan layout: next-to-run at the END.
    action_names: Vec<String>,
    cost: f64,
    benefit: f64,
}

impl CachedPlan {
    fn from_plan(plan: &Plan) -> Self {
        let mut action_names = plan.action_names();
        action_names.reverse();
        Self {
            goal: plan.goal().to_string(),
            action_names,
            cost: plan.cost(),
            benefit: plan.benefit(),
        }
    }

    fn materialize(&self, catalog: &ActionCatalog) -> Option<Plan> {
        let mut actions = Vec::with_capacity(self.action_names.len());
        for name in &self.action_names {
            match catalog.instantiate(name) {
                Some(action) => actions.push(action),
                None => {
                    warn!(action = %name, "cached plan references a missing template");
                    return None;
                }
            }
        }
        Some(Plan::new(self.goal.clone(), actions, self.cost, self.benefit))
    }
}

#[derive(Debug, Clone)]
struct CacheEntry {
    plan: CachedPlan,
    /// Boolean value of every fact the plan depends on, at cache time.
    snapshots: BTreeMap<String, bool>,
    created_at: Duration,
}

// ---------------------------------------------------------------------------
// IncrementalPlanner
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct IncrementalPlanner {
    planner: Planner,
    config: CacheConfig,
    cache: BTreeMap<String, CacheEntry>,
    hits: u64,
    misses: u64,
}

impl Default for IncrementalPlanner {
    fn default() -> Self {
        Self::new(Planner::default(), CacheConfig::default())
    }
}

impl IncrementalPlanner {
    pub fn new(planner: Planner, config: CacheConfig) -> Self {
        Self {
            planner,
            config,
            cache: BTreeMap::new(),
            hits: 0,
            misses: 0,
        }
    }

    pub fn stats(&self) -> PlannerStats {
        PlannerStats {
            hits: self.hits,
            misses: self.misses,
            size: self.cache.len(),
        }
    }

    /// Drop the cache entry for one goal.
    pub fn invalidate(&mut self, goal: &str) {
        self.cache.remove(goal);
    }

    pub fn clear(&mut self) {
        self.cache.clear();
    }

    /// Plan for the highest-effective-priority unsatisfied goal that the
    /// cache, repair, or the base planner can solve. `now` is monotonic time
    /// supplied by the caller's tick loop.
    pub fn plan(
        &mut self,
        ctx: &EvalContext<'_>,
        beliefs: &BeliefSet,
        catalog: &ActionCatalog,
        goals: &[Goal],
        recent_goal: Option<&str>,
        now: Duration,
    ) -> Option<Plan> {
        let candidates = order_unsatisfied(
            ctx,
            beliefs,
            goals,
            recent_goal,
            self.config.recent_goal_penalty,
        );
        for goal in candidates {
            if let Some(plan) = self.plan_goal(ctx, beliefs, catalog, goal, now) {
                return Some(plan);
            }
        }
        None
    }

    fn plan_goal(
        &mut self,
        ctx: &EvalContext<'_>,
        beliefs: &BeliefSet,
        catalog: &ActionCatalog,
        goal: &Goal,
        now: Duration,
    ) -> Option<Plan> {
        if let Some(entry) = self.cache.get(&goal.name) {
            let entry = entry.clone();
            let expired = now.saturating_sub(entry.created_at) > self.config.ttl;
            let changed = changed_facts(&entry.snapshots, beliefs, ctx);

            if !expired && changed.is_empty() {
                match entry.plan.materialize(catalog) {
                    Some(plan) => {
                        self.hits += 1;
                        debug!(goal = %goal.name, "cache hit");
                        return Some(plan);
                    }
                    None => {
                        self.cache.remove(&goal.name);
                    }
                }
            } else if !expired && changed.len() < self.config.max_changed_facts_for_repair {
                if let Some(repaired) = try_repair(ctx, catalog, &entry.plan, &changed) {
                    self.misses += 1;
                    debug!(
                        goal = %goal.name,
                        changed = ?changed,
                        "cached plan repaired"
                    );
                    self.store(goal.name.clone(), repaired.clone(), beliefs, ctx, catalog, now);
                    if let Some(plan) = repaired.materialize(catalog) {
                        return Some(plan);
                    }
                } else {
                    trace!(goal = %goal.name, "repair failed; discarding cached plan");
                    self.cache.remove(&goal.name);
                }
            } else {
                trace!(
                    goal = %goal.name,
                    expired,
                    changed = changed.len(),
                    "cached plan discarded"
                );
                self.cache.remove(&goal.name);
            }
        }

        // Fallback: full replan for this single goal.
        let plan = self.planner.plan_for_goal(ctx, beliefs, catalog, goal)?;
        self.misses += 1;
        self.store(
            goal.name.clone(),
            CachedPlan::from_plan(&plan),
            beliefs,
            ctx,
            catalog,
            now,
        );
        Some(plan)
    }

    /// Snapshot every fact referenced by the plan's actions (preconditions
    /// and effects), stamp the entry, and evict the oldest entries beyond the
    /// configured size.
    fn store(
        &mut self,
        goal: String,
        plan: CachedPlan,
        beliefs: &BeliefSet,
        ctx: &EvalContext<'_>,
        catalog: &ActionCatalog,
        now: Duration,
    ) {
        let mut snapshots = BTreeMap::new();
        for name in &plan.action_names {
            let Some(template) = catalog.get(name) else {
                continue;
            };
            for fact in template.preconditions.iter().chain(template.effects.iter()) {
                snapshots.insert(fact.clone(), beliefs.holds(fact, ctx));
            }
        }

        self.cache.insert(
            goal,
            CacheEntry {
                plan,
                snapshots,
                created_at: now,
            },
        );

        while self.cache.len() > self.config.max_entries {
            let oldest = self
                .cache
                .iter()
                .min_by_key(|(_, entry)| entry.created_at)
                .map(|(goal, _)| goal.clone());
            match oldest {
                Some(goal) => {
                    trace!(goal = %goal, "evicting oldest cache entry");
                    self.cache.remove(&goal);
                }
                None => break,
            }
        }
    }
}

/// Tracked facts whose live value no longer matches the snapshot. A failing
/// predicate reads as false, so it counts as changed when it was snapshot
/// true.
fn changed_facts(
    snapshots: &BTreeMap<String, bool>,
    beliefs: &BeliefSet,
    ctx: &EvalContext<'_>,
) -> BTreeSet<String> {
    snapshots
        .iter()
        .filter(|(fact, &snapshot)| beliefs.holds(fact, ctx) != snapshot)
        .map(|(fact, _)| fact.clone())
        .collect()
}

/// Walk the cached plan and replace every action touching an invalidated
/// fact. A replacement must share at least one effect with the failed action,
/// be currently performable, and not already appear in the plan; lowest cost
/// wins. All-or-nothing: any action without a safe replacement fails the
/// whole repair.
fn try_repair(
    ctx: &EvalContext<'_>,
    catalog: &ActionCatalog,
    cached: &CachedPlan,
    changed: &BTreeSet<String>,
) -> Option<CachedPlan> {
    let mut names: Vec<String> = Vec::with_capacity(cached.action_names.len());
    for name in &cached.action_names {
        let template = catalog.get(name)?;
        let touched = template
            .preconditions
            .iter()
            .chain(template.effects.iter())
            .any(|fact| changed.contains(fact));
        if !touched {
            names.push(name.clone());
            continue;
        }

        let replacement = find_replacement(ctx, catalog, template, cached, &names)?;
        trace!(
            failed = %template.name,
            replacement = %replacement.name,
            "repairing cached plan step"
        );
        names.push(replacement.name.clone());
    }

    let mut cost = 0.0;
    let mut benefit = 0.0;
    for name in &names {
        let template = catalog.get(name)?;
        cost += template.cost;
        benefit += template.benefit;
    }

    Some(CachedPlan {
        goal: cached.goal.clone(),
        action_names: names,
        cost,
        benefit,
    })
}

fn find_replacement<'c>(
    ctx: &EvalContext<'_>,
    catalog: &'c ActionCatalog,
    failed: &ActionTemplate,
    cached: &CachedPlan,
    already_chosen: &[String],
) -> Option<&'c ActionTemplate> {
    catalog
        .templates()
        .iter()
        .filter(|candidate| {
            candidate.name != failed.name
                && !cached.action_names.contains(&candidate.name)
                && !already_chosen.contains(&candidate.name)
                && candidate
                    .effects
                    .iter()
                    .any(|effect| failed.effects.contains(effect))
                && Action::from_template(candidate).can_perform(ctx)
        })
        .min_by(|a, b| {
            a.cost
                .partial_cmp(&b.cost)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.name.cmp(&b.name))
        })
}
