// The rule-set compiler: fetches raw records from a repository, resolves
// condition shorthands, compiles predicates and actions, and produces an
// immutable snapshot. Grounded on
// gateway_selector_v2/compiler/ruleset_compiler.py's `compile_ruleset`.

use crate::action::{compile_action, CompiledAction};
use crate::error::CompileError;
use crate::matchers::{Matcher, MatcherRegistry};
use crate::model::{ConditionType, GatewayConfig, PixKeyType, Rule};
use crate::predicate::{compile_predicate, CompileOptions};
use crate::repository::Repository;
use std::collections::HashMap;
use std::time::Instant;
use tokio_util::sync::CancellationToken;

/// A fully compiled, immutable rule ready for the selector hot path.
#[derive(Debug, Clone)]
pub struct CompiledRule {
    pub id: i64,
    pub priority: u32,
    pub enabled: bool,
    pub name: Option<String>,
    pub predicate: Matcher,
    pub action: CompiledAction,
}

/// The immutable compiled form of a rule set (§3 "Snapshot"). Consumed by
/// the selector; swapped atomically by the caller via `SnapshotHandle`.
#[derive(Debug, Clone)]
pub struct CompiledRuleSet {
    pub ruleset_id: i64,
    pub version: i64,
    pub name: String,
    pub sticky_salt: Option<String>,
    pub rules: Vec<CompiledRule>,
    pub gateways: HashMap<String, GatewayConfig>,
    pub default_gateway: Option<String>,
    pub loaded_at_ms: u64,
    pub compile_duration_us: u64,
    pub total_rules: usize,
}

/// Options controlling a single compile pass.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompilerOptions {
    pub debug: bool,
    pub capture_ctx_keys: bool,
}

/// Orchestrates one compile pass against a `Repository`. Holds no state
/// across calls; every `compile` call is independent (§4.D, §5).
pub struct RuleSetCompiler<'a> {
    repo: &'a dyn Repository,
    registry: MatcherRegistry,
}

impl<'a> RuleSetCompiler<'a> {
    pub fn new(repo: &'a dyn Repository) -> Self {
        Self { repo, registry: MatcherRegistry::with_builtins() }
    }

    /// Compiles the active rule set (or a specific `ruleset_id`, if given)
    /// into an immutable snapshot. Aborts and returns the first error
    /// encountered; never returns a partial snapshot (§4.D, §7).
    pub async fn compile(
        &self,
        ruleset_id: Option<i64>,
        options: CompilerOptions,
        cancel: Option<&CancellationToken>,
    ) -> Result<CompiledRuleSet, CompileError> {
        let t0 = Instant::now();

        let rs = match ruleset_id {
            Some(id) => self
                .repo
                .get_ruleset_by_id(id)
                .await
                .map_err(CompileError::Repository)?
                .ok_or(CompileError::RuleSetNotFound(id))?,
            None => self
                .repo
                .get_active_ruleset()
                .await
                .map_err(CompileError::Repository)?
                .ok_or(CompileError::NoActiveRuleSet)?,
        };

        check_cancelled(cancel)?;

        let gateways = self.repo.get_gateways_map().await.map_err(CompileError::Repository)?;
        if gateways.is_empty() {
            return Err(CompileError::NoGateways);
        }

        check_cancelled(cancel)?;

        let rules_raw = self
            .repo
            .get_rules_for_ruleset(rs.id)
            .await
            .map_err(CompileError::Repository)?;

        let compile_opts = CompileOptions { debug: options.debug, capture_ctx_keys: options.capture_ctx_keys };

        let mut compiled_rules = Vec::with_capacity(rules_raw.len());
        for raw in &rules_raw {
            compiled_rules.push(compile_one_rule(&self.registry, raw, &gateways, compile_opts)?);
        }

        // Defensive re-sort by priority even though the repository is
        // expected to deliver rules already ordered (§4.D).
        compiled_rules.sort_by_key(|r: &CompiledRule| r.priority);

        if let Some(default_gw) = &rs.default_gateway {
            if !gateways.contains_key(default_gw) {
                return Err(CompileError::UnknownDefaultGateway(default_gw.clone()));
            }
        }

        let total_rules = compiled_rules.len();
        let elapsed = t0.elapsed();

        let snapshot = CompiledRuleSet {
            ruleset_id: rs.id,
            version: rs.version,
            name: rs.name,
            sticky_salt: rs.sticky_salt,
            rules: compiled_rules,
            gateways,
            default_gateway: rs.default_gateway,
            loaded_at_ms: elapsed.as_millis() as u64,
            compile_duration_us: elapsed.as_micros() as u64,
            total_rules,
        };

        tracing::info!(
            ruleset_id = snapshot.ruleset_id,
            version = snapshot.version,
            total_rules = snapshot.total_rules,
            loaded_at_ms = snapshot.loaded_at_ms,
            "ruleset compiled"
        );

        Ok(snapshot)
    }
}

fn check_cancelled(cancel: Option<&CancellationToken>) -> Result<(), CompileError> {
    if cancel.map(|c| c.is_cancelled()).unwrap_or(false) {
        return Err(CompileError::Cancelled);
    }
    Ok(())
}

fn compile_one_rule(
    registry: &MatcherRegistry,
    raw: &Rule,
    gateways: &HashMap<String, GatewayConfig>,
    compile_opts: CompileOptions,
) -> Result<CompiledRule, CompileError> {
    let rid = raw.id;

    let condition_json = shorthand_to_condition_json(raw)?;

    let predicate = compile_predicate(registry, &condition_json, compile_opts, &format!("RULE[{rid}]"))
        .map_err(|source| CompileError::Predicate { rule_id: rid, source })?;

    let action = compile_action(&raw.action, gateways)
        .map_err(|source| CompileError::Action { rule_id: rid, source })?;

    Ok(CompiledRule {
        id: rid,
        priority: raw.priority,
        enabled: raw.enabled,
        name: raw.name.clone(),
        predicate,
        action,
    })
}

/// Expands a raw rule's condition shorthand into predicate JSON (§4.D step 4).
fn shorthand_to_condition_json(raw: &Rule) -> Result<serde_json::Value, CompileError> {
    match raw.condition_type {
        ConditionType::Advanced => raw
            .condition_json
            .clone()
            .ok_or(CompileError::AdvancedMissingJson { rule_id: raw.id }),
        ConditionType::User => {
            let value = raw
                .condition_value
                .as_deref()
                .ok_or(CompileError::ShorthandMissingValue { rule_id: raw.id, ftype: "USER" })?;
            let uid: i64 = value.trim().parse().map_err(|_| CompileError::UserConditionNotInteger {
                rule_id: raw.id,
                value: value.to_string(),
            })?;
            Ok(serde_json::json!({
                "type": "VALUE_IN", "field": "api_user_id", "values": [uid], "coerce": "int"
            }))
        }
        ConditionType::PixKey => {
            let value = raw
                .condition_value
                .as_deref()
                .ok_or(CompileError::ShorthandMissingValue { rule_id: raw.id, ftype: "PIX_KEY" })?;
            Ok(serde_json::json!({
                "type": "VALUE_IN", "field": "pix_key", "values": [value], "coerce": "str"
            }))
        }
        ConditionType::PixKeyType => {
            let value = raw
                .condition_value
                .as_deref()
                .ok_or(CompileError::ShorthandMissingValue { rule_id: raw.id, ftype: "PIX_KEY_TYPE" })?;
            let canonical = PixKeyType::parse_uppercase(value).ok_or_else(|| CompileError::InvalidPixKeyType {
                rule_id: raw.id,
                value: value.to_string(),
            })?;
            Ok(serde_json::json!({
                "type": "VALUE_IN", "field": "pix_key_type", "values": [canonical]
            }))
        }
    }
}
