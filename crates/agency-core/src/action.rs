//! Bound actions and the per-world action catalog.
//!
//! An [`ActionTemplate`] is immutable shared data; [`Action::from_template`]
//! is the prototype step that produces one unshared, strategy-bound instance
//! per agent.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::time::Duration;

use contracts::{ActionTemplate, SCORE_COST_EPSILON};

use crate::belief::EvalContext;
use crate::strategy::{build_strategy, Strategy, StrategyState};

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// One agent's bound instance of an action template: the template's planning
/// data plus a fresh executable strategy.
pub struct Action {
    name: String,
    cost: f64,
    benefit: f64,
    preconditions: BTreeSet<String>,
    effects: BTreeSet<String>,
    strategy: Box<dyn Strategy>,
}

impl Action {
    /// Prototype step: clone the template's data and build a stock strategy
    /// for its kind.
    pub fn from_template(template: &ActionTemplate) -> Self {
        Self {
            name: template.name.clone(),
            cost: template.cost,
            benefit: template.benefit,
            preconditions: template.preconditions.iter().cloned().collect(),
            effects: template.effects.iter().cloned().collect(),
            strategy: build_strategy(template.strategy),
        }
    }

    /// Replace the stock strategy with an embedder-supplied effector.
    pub fn with_strategy(mut self, strategy: Box<dyn Strategy>) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cost(&self) -> f64 {
        self.cost
    }

    pub fn benefit(&self) -> f64 {
        self.benefit
    }

    pub fn score(&self) -> f64 {
        self.benefit / self.cost.max(SCORE_COST_EPSILON)
    }

    pub fn preconditions(&self) -> &BTreeSet<String> {
        &self.preconditions
    }

    pub fn effects(&self) -> &BTreeSet<String> {
        &self.effects
    }

    pub fn can_perform(&self, ctx: &EvalContext<'_>) -> bool {
        self.strategy.can_perform(ctx)
    }

    pub fn complete(&self) -> bool {
        self.strategy.complete()
    }

    pub fn strategy_state(&self) -> StrategyState {
        self.strategy.state()
    }

    pub fn start(&mut self, ctx: &EvalContext<'_>) {
        self.strategy.start(ctx);
    }

    pub fn update(&mut self, dt: Duration, ctx: &EvalContext<'_>) {
        self.strategy.update(dt, ctx);
    }

    pub fn stop(&mut self) {
        self.strategy.stop();
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("cost", &self.cost)
            .field("benefit", &self.benefit)
            .field("preconditions", &self.preconditions)
            .field("effects", &self.effects)
            .field("strategy", &self.strategy)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// ActionCatalog
// ---------------------------------------------------------------------------

/// Registry of action templates available to one agent.
#[derive(Debug, Clone, Default)]
pub struct ActionCatalog {
    templates: Vec<ActionTemplate>,
    by_name: BTreeMap<String, usize>,
}

impl ActionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template. Panics on a duplicate name.
    pub fn register(&mut self, template: ActionTemplate) {
        assert!(
            !self.by_name.contains_key(&template.name),
            "duplicate action name: {}",
            template.name
        );
        self.by_name.insert(template.name.clone(), self.templates.len());
        self.templates.push(template);
    }

    pub fn get(&self, name: &str) -> Option<&ActionTemplate> {
        self.by_name.get(name).map(|&i| &self.templates[i])
    }

    pub fn templates(&self) -> &[ActionTemplate] {
        &self.templates
    }

    /// Bind a fresh instance of the named template.
    pub fn instantiate(&self, name: &str) -> Option<Action> {
        self.get(name).map(Action::from_template)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::StrategyKind;

    use crate::belief::{AgentState, WorldState};

    fn eat_template() -> ActionTemplate {
        ActionTemplate {
            name: "eat".to_string(),
            cost: 1.0,
            benefit: 2.0,
            preconditions: vec!["has_food".to_string()],
            effects: vec!["fed".to_string()],
            strategy: StrategyKind::Instant,
        }
    }

    #[test]
    fn bound_instances_are_independent() {
        let template = eat_template();
        let mut first = Action::from_template(&template);
        let second = Action::from_template(&template);

        let agent = AgentState::new("npc_1");
        let world = WorldState::new();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        first.start(&ctx);
        assert!(first.complete());
        assert!(!second.complete());
    }

    #[test]
    fn catalog_lookup_and_instantiation() {
        let mut catalog = ActionCatalog::new();
        catalog.register(eat_template());

        assert!(catalog.get("eat").is_some());
        assert!(catalog.get("sleep").is_none());

        let action = catalog.instantiate("eat").expect("template registered");
        assert_eq!(action.name(), "eat");
        assert!((action.score() - 2.0).abs() < f64::EPSILON);
        assert!(catalog.instantiate("sleep").is_none());
    }

    #[test]
    #[should_panic(expected = "duplicate action name")]
    fn duplicate_registration_panics() {
        let mut catalog = ActionCatalog::new();
        catalog.register(eat_template());
        catalog.register(eat_template());
    }
}
