//! Goals: prioritized desires expressed as fact names that must all hold.

use std::collections::BTreeSet;

use contracts::GoalTemplate;

use crate::belief::{BeliefSet, EvalContext};

/// A named desire with a priority and the set of facts that must all
/// evaluate true for it to be satisfied.
#[derive(Debug, Clone, PartialEq)]
pub struct Goal {
    pub name: String,
    pub priority: f64,
    pub desired_facts: BTreeSet<String>,
}

impl Goal {
    pub fn new(
        name: impl Into<String>,
        priority: f64,
        desired_facts: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            name: name.into(),
            priority,
            desired_facts: desired_facts.into_iter().collect(),
        }
    }

    pub fn from_template(template: &GoalTemplate) -> Self {
        Self::new(
            template.name.clone(),
            template.priority,
            template.desired_facts.iter().cloned(),
        )
    }

    /// All desired facts currently hold. A failing predicate reads as false,
    /// so a malfunctioning belief leaves the goal unsatisfied instead of
    /// aborting the planning pass.
    pub fn is_satisfied(&self, beliefs: &BeliefSet, ctx: &EvalContext<'_>) -> bool {
        self.desired_facts
            .iter()
            .all(|fact| beliefs.holds(fact, ctx))
    }

    /// Desired facts that are currently false.
    pub fn unmet_facts(&self, beliefs: &BeliefSet, ctx: &EvalContext<'_>) -> BTreeSet<String> {
        self.desired_facts
            .iter()
            .filter(|fact| !beliefs.holds(fact, ctx))
            .cloned()
            .collect()
    }
}
