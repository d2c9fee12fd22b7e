//! Fact model: named boolean predicates ("beliefs") evaluated over explicit
//! agent and world state.
//!
//! Beliefs are created once during agent setup and never mutated in place —
//! they are only re-evaluated. Evaluation is fallible: a malfunctioning
//! predicate is reported as a [`BeliefError`] and isolated by the planner
//! instead of aborting the whole planning pass.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use contracts::Location;
use serde_json::Value;
use thiserror::Error;
use tracing::warn;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BeliefError {
    #[error("belief '{name}' is not registered")]
    Unknown { name: String },
    #[error("belief '{name}' evaluation failed: {reason}")]
    Evaluation { name: String, reason: String },
}

// ---------------------------------------------------------------------------
// Agent and world state
// ---------------------------------------------------------------------------

/// Per-agent mutable state visible to predicates and strategies.
#[derive(Debug, Clone)]
pub struct AgentState {
    pub id: String,
    pub location: Location,
    /// Numeric vitals and counters (hunger, stamina, coin, ...).
    pub stats: BTreeMap<String, f64>,
}

impl AgentState {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: Location::default(),
            stats: BTreeMap::new(),
        }
    }

    pub fn stat(&self, key: &str) -> Option<f64> {
        self.stats.get(key).copied()
    }

    pub fn set_stat(&mut self, key: impl Into<String>, value: f64) {
        self.stats.insert(key.into(), value);
    }
}

/// Shared world fact store, keyed by fact name.
///
/// Action effects are applied here by the control loop: completing an action
/// sets the backing flag of each effect belief to `true`.
#[derive(Debug, Clone, Default)]
pub struct WorldState {
    facts: BTreeMap<String, Value>,
}

impl WorldState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Boolean fact value; missing or non-boolean keys read as `false`.
    pub fn flag(&self, key: &str) -> bool {
        self.facts
            .get(key)
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }

    pub fn set_flag(&mut self, key: impl Into<String>, value: bool) {
        self.facts.insert(key.into(), Value::Bool(value));
    }

    pub fn number(&self, key: &str) -> Option<f64> {
        self.facts.get(key).and_then(Value::as_f64)
    }

    pub fn set_number(&mut self, key: impl Into<String>, value: f64) {
        self.facts.insert(
            key.into(),
            serde_json::Number::from_f64(value)
                .map(Value::Number)
                .unwrap_or(Value::Null),
        );
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.facts.get(key)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: Value) {
        self.facts.insert(key.into(), value);
    }
}

/// Explicit evaluation context handed to predicates, strategies, and
/// interruption sources at call time. No ambient globals.
#[derive(Debug, Clone, Copy)]
pub struct EvalContext<'a> {
    pub agent: &'a AgentState,
    pub world: &'a WorldState,
}

// ---------------------------------------------------------------------------
// Belief
// ---------------------------------------------------------------------------

type EvalFn = Arc<dyn Fn(&EvalContext<'_>) -> Result<bool, String> + Send + Sync>;
type LocationFn = Arc<dyn Fn(&EvalContext<'_>) -> Option<Location> + Send + Sync>;

/// A named boolean predicate over agent/world state, with an optional spatial
/// accessor for beliefs tied to a place.
#[derive(Clone)]
pub struct Belief {
    name: String,
    eval: EvalFn,
    location: Option<LocationFn>,
    /// World flag written when an action effect asserts this belief. Beliefs
    /// built from arbitrary predicates have no backing flag; making them true
    /// is the effector's business.
    backing_flag: Option<String>,
}

impl Belief {
    /// Belief from an infallible predicate.
    pub fn new(
        name: impl Into<String>,
        eval: impl Fn(&EvalContext<'_>) -> bool + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            eval: Arc::new(move |ctx| Ok(eval(ctx))),
            location: None,
            backing_flag: None,
        }
    }

    /// Belief from a fallible predicate. Failures are isolated per goal by
    /// the planner rather than propagated.
    pub fn try_new(
        name: impl Into<String>,
        eval: impl Fn(&EvalContext<'_>) -> Result<bool, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            eval: Arc::new(eval),
            location: None,
            backing_flag: None,
        }
    }

    /// Belief backed by a world flag of the same name. Effects on this belief
    /// can be applied to the fact model by the control loop.
    pub fn for_flag(name: impl Into<String>) -> Self {
        let name = name.into();
        let key = name.clone();
        Self {
            name,
            eval: Arc::new(move |ctx| Ok(ctx.world.flag(&key))),
            location: None,
            backing_flag: None,
        }
        .backed_by_own_name()
    }

    fn backed_by_own_name(mut self) -> Self {
        self.backing_flag = Some(self.name.clone());
        self
    }

    /// Attach a spatial accessor.
    pub fn with_location(
        mut self,
        location: impl Fn(&EvalContext<'_>) -> Option<Location> + Send + Sync + 'static,
    ) -> Self {
        self.location = Some(Arc::new(location));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn backing_flag(&self) -> Option<&str> {
        self.backing_flag.as_deref()
    }

    pub fn location(&self, ctx: &EvalContext<'_>) -> Option<Location> {
        self.location.as_ref().and_then(|f| f(ctx))
    }

    pub fn evaluate(&self, ctx: &EvalContext<'_>) -> Result<bool, BeliefError> {
        (self.eval)(ctx).map_err(|reason| BeliefError::Evaluation {
            name: self.name.clone(),
            reason,
        })
    }
}

impl fmt::Debug for Belief {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Belief")
            .field("name", &self.name)
            .field("backing_flag", &self.backing_flag)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// BeliefSet
// ---------------------------------------------------------------------------

/// Per-agent registry of beliefs. Fact names are unique within one agent.
#[derive(Debug, Clone, Default)]
pub struct BeliefSet {
    beliefs: BTreeMap<String, Belief>,
}

impl BeliefSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a belief. Panics on a duplicate name — uniqueness is a setup
    /// invariant, not a runtime condition.
    pub fn register(&mut self, belief: Belief) {
        assert!(
            !self.beliefs.contains_key(belief.name()),
            "duplicate belief name: {}",
            belief.name()
        );
        self.beliefs.insert(belief.name().to_string(), belief);
    }

    pub fn get(&self, name: &str) -> Option<&Belief> {
        self.beliefs.get(name)
    }

    pub fn evaluate(&self, name: &str, ctx: &EvalContext<'_>) -> Result<bool, BeliefError> {
        match self.beliefs.get(name) {
            Some(belief) => belief.evaluate(ctx),
            None => Err(BeliefError::Unknown {
                name: name.to_string(),
            }),
        }
    }

    /// Whether the named fact currently holds. Unknown names and evaluation
    /// failures read as `false` and are logged, per the error-isolation rule.
    pub fn holds(&self, name: &str, ctx: &EvalContext<'_>) -> bool {
        match self.evaluate(name, ctx) {
            Ok(value) => value,
            Err(err) => {
                warn!(agent = %ctx.agent.id, %err, "belief read as false");
                false
            }
        }
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.beliefs.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.beliefs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.beliefs.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx_fixture() -> (AgentState, WorldState) {
        let mut agent = AgentState::new("npc_1");
        agent.set_stat("hunger", 40.0);
        let mut world = WorldState::new();
        world.set_flag("fed", true);
        world.set_number("food_stock", 3.0);
        (agent, world)
    }

    #[test]
    fn flag_belief_reads_world_state() {
        let (agent, world) = ctx_fixture();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let fed = Belief::for_flag("fed");
        assert_eq!(fed.evaluate(&ctx), Ok(true));
        assert_eq!(fed.backing_flag(), Some("fed"));

        let rested = Belief::for_flag("rested");
        assert_eq!(rested.evaluate(&ctx), Ok(false));
    }

    #[test]
    fn predicate_belief_sees_agent_stats() {
        let (agent, world) = ctx_fixture();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let hungry = Belief::new("hungry", |ctx| {
            ctx.agent.stat("hunger").unwrap_or(0.0) > 60.0
        });
        assert_eq!(hungry.evaluate(&ctx), Ok(false));
        assert!(hungry.backing_flag().is_none());
    }

    #[test]
    fn failing_predicate_reads_false_and_surfaces_error() {
        let (agent, world) = ctx_fixture();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let mut beliefs = BeliefSet::new();
        beliefs.register(Belief::try_new("broken", |_| {
            Err("sensor offline".to_string())
        }));

        assert!(matches!(
            beliefs.evaluate("broken", &ctx),
            Err(BeliefError::Evaluation { .. })
        ));
        assert!(!beliefs.holds("broken", &ctx));
        assert!(!beliefs.holds("never_registered", &ctx));
    }

    #[test]
    #[should_panic(expected = "duplicate belief name")]
    fn duplicate_registration_panics() {
        let mut beliefs = BeliefSet::new();
        beliefs.register(Belief::for_flag("fed"));
        beliefs.register(Belief::for_flag("fed"));
    }

    #[test]
    fn location_accessor_is_optional() {
        let (agent, world) = ctx_fixture();
        let ctx = EvalContext {
            agent: &agent,
            world: &world,
        };

        let plain = Belief::for_flag("fed");
        assert!(plain.location(&ctx).is_none());

        let sited = Belief::for_flag("at_market")
            .with_location(|_| Some(Location::new(4.0, 2.0)));
        assert_eq!(sited.location(&ctx), Some(Location::new(4.0, 2.0)));
    }
}
