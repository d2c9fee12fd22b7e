//! Plans: an ordered action sequence expected to satisfy one goal.
//!
//! Actions are stored with the next-to-run at the END of the vector. Backward
//! chaining pushes the goal-achieving action first and its producers after,
//! so popping from the end yields the causally correct forward order.

use contracts::{PlanSummary, SCORE_COST_EPSILON};

use crate::action::Action;

#[derive(Debug)]
pub struct Plan {
    goal: String,
    /// LIFO: `pop_next` removes from the end.
    actions: Vec<Action>,
    cost: f64,
    benefit: f64,
}

impl Plan {
    pub fn new(goal: impl Into<String>, actions: Vec<Action>, cost: f64, benefit: f64) -> Self {
        Self {
            goal: goal.into(),
            actions,
            cost,
            benefit,
        }
    }

    pub fn goal(&self) -> &str {
        &self.goal
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn benefit(&self) -> f64 {
        self.benefit
    }

    /// Aggregate benefit per unit of aggregate effort. The cross-goal winner
    /// is chosen by this, not by goal priority.
    pub fn score(&self) -> f64 {
        self.benefit / self.cost.max(SCORE_COST_EPSILON)
    }

    pub fn peek_next(&self) -> Option<&Action> {
        self.actions.last()
    }

    pub fn pop_next(&mut self) -> Option<Action> {
        self.actions.pop()
    }

    /// Put an interrupted action back at the front of the queue so a resumed
    /// plan re-runs it.
    pub fn push_next(&mut self, action: Action) {
        self.actions.push(action);
    }

    pub fn remaining(&self) -> usize {
        self.actions.len()
    }

    pub fn is_exhausted(&self) -> bool {
        self.actions.is_empty()
    }

    /// Action names in execution order (first-to-run first).
    pub fn action_names(&self) -> Vec<String> {
        self.actions
            .iter()
            .rev()
            .map(|action| action.name().to_string())
            .collect()
    }

    pub fn summary(&self) -> PlanSummary {
        PlanSummary {
            goal: self.goal.clone(),
            actions: self.action_names(),
            cost: self.cost,
            benefit: self.benefit,
            score: self.score(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ActionTemplate, StrategyKind};

    fn action(name: &str) -> Action {
        Action::from_template(&ActionTemplate {
            name: name.to_string(),
            cost: 1.0,
            benefit: 1.0,
            preconditions: Vec::new(),
            effects: Vec::new(),
            strategy: StrategyKind::Instant,
        })
    }

    #[test]
    fn pop_order_is_reverse_of_storage_order() {
        // Stored as backward chaining produces them: the goal-achiever first.
        let mut plan = Plan::new(
            "eat",
            vec![action("cook"), action("harvest")],
            2.0,
            2.0,
        );

        assert_eq!(plan.action_names(), vec!["harvest", "cook"]);
        assert_eq!(plan.pop_next().unwrap().name(), "harvest");
        assert_eq!(plan.pop_next().unwrap().name(), "cook");
        assert!(plan.is_exhausted());
        assert!(plan.pop_next().is_none());
    }

    #[test]
    fn push_next_requeues_an_interrupted_action() {
        let mut plan = Plan::new("eat", vec![action("cook")], 1.0, 1.0);
        let popped = plan.pop_next().unwrap();
        assert!(plan.is_exhausted());

        plan.push_next(popped);
        assert_eq!(plan.remaining(), 1);
        assert_eq!(plan.peek_next().unwrap().name(), "cook");
    }

    #[test]
    fn summary_reports_execution_order_and_score() {
        let plan = Plan::new(
            "eat",
            vec![action("cook"), action("harvest")],
            4.0,
            6.0,
        );
        let summary = plan.summary();
        assert_eq!(summary.goal, "eat");
        assert_eq!(summary.actions, vec!["harvest", "cook"]);
        assert!((summary.score - 1.5).abs() < f64::EPSILON);
    }
}
