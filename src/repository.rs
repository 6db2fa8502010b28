// The repository contract (§4.G) plus an in-memory reference implementation
// usable for tests and as a worked example of the contract. Persistence,
// caching and transport are external collaborators out of scope for this
// crate; `InMemoryRepository` exists to validate the contract shape, not as
// a production store.

use crate::model::{GatewayConfig, Rule, RuleSet};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

/// The four reads the compiler needs. Implementations may be in-memory, DB-
/// backed, or cache-wrapped with per-call TTLs; the compiler makes no
/// transactional assumptions across the four calls (§4.G, §5).
#[async_trait]
pub trait Repository: Send + Sync {
    async fn get_active_ruleset(&self) -> Result<Option<RuleSet>, String>;
    async fn get_ruleset_by_id(&self, id: i64) -> Result<Option<RuleSet>, String>;
    /// Ordered by `priority` ascending.
    async fn get_rules_for_ruleset(&self, ruleset_id: i64) -> Result<Vec<Rule>, String>;
    async fn get_gateways_map(&self) -> Result<HashMap<String, GatewayConfig>, String>;
}

/// An in-memory `Repository` with the same sensible defaults as the
/// reference implementation it's grounded on: `in_maintenance=false`,
/// `sticky_salt="local-validation"`, `version=1`, rule `enabled=true`.
/// Useful for unit tests, local rule-set validation tooling, and the `gwsel`
/// CLI's `--inline` mode.
pub struct InMemoryRepository {
    inner: RwLock<InMemoryState>,
}

#[derive(Default)]
struct InMemoryState {
    rulesets: HashMap<i64, RuleSet>,
    active_ruleset_id: Option<i64>,
    rules: HashMap<i64, Vec<Rule>>,
    gateways: HashMap<String, GatewayConfig>,
}

impl InMemoryRepository {
    pub fn new() -> Self {
        Self { inner: RwLock::new(InMemoryState::default()) }
    }

    pub fn with_ruleset(self, rs: RuleSet) -> Self {
        {
            let mut state = self.inner.write().unwrap();
            if rs.is_active {
                state.active_ruleset_id = Some(rs.id);
            }
            state.rulesets.insert(rs.id, rs);
        }
        self
    }

    pub fn with_gateway(self, gw: GatewayConfig) -> Self {
        {
            let mut state = self.inner.write().unwrap();
            state.gateways.insert(gw.name.clone(), gw);
        }
        self
    }

    pub fn with_rule(self, rule: Rule) -> Self {
        {
            let mut state = self.inner.write().unwrap();
            state.rules.entry(rule.rule_set_id).or_default().push(rule);
        }
        self
    }

    /// Marks the rule set with the given id active, deactivating any other
    /// rule set (mirrors the "exactly-one-active" store invariant, which
    /// this crate treats as a store concern rather than enforcing itself).
    pub fn activate(&self, ruleset_id: i64) {
        let mut state = self.inner.write().unwrap();
        for rs in state.rulesets.values_mut() {
            rs.is_active = rs.id == ruleset_id;
        }
        state.active_ruleset_id = Some(ruleset_id);
    }
}

impl Default for InMemoryRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_active_ruleset(&self) -> Result<Option<RuleSet>, String> {
        let state = self.inner.read().unwrap();
        Ok(state
            .active_ruleset_id
            .and_then(|id| state.rulesets.get(&id))
            .cloned())
    }

    async fn get_ruleset_by_id(&self, id: i64) -> Result<Option<RuleSet>, String> {
        let state = self.inner.read().unwrap();
        Ok(state.rulesets.get(&id).cloned())
    }

    async fn get_rules_for_ruleset(&self, ruleset_id: i64) -> Result<Vec<Rule>, String> {
        let state = self.inner.read().unwrap();
        let mut rules = state.rules.get(&ruleset_id).cloned().unwrap_or_default();
        rules.sort_by_key(|r| r.priority);
        Ok(rules)
    }

    async fn get_gateways_map(&self) -> Result<HashMap<String, GatewayConfig>, String> {
        let state = self.inner.read().unwrap();
        Ok(state.gateways.clone())
    }
}
