// The selector hot path (§4.F): purely CPU-bound, non-suspending, no I/O or
// locks beyond the caller-supplied observability hook. Grounded line-for-
// line on gateway_selector_v2/selector.py (`_gw_ok`, `_normalize_weights`,
// `_sticky_hash_bucket`, `_pick_weighted`, `resolve_action`,
// `select_gateway`).

use crate::action::CompiledAction;
use crate::compiler::{CompiledRule, CompiledRuleSet};
use crate::context::Context;
use crate::model::GatewayConfig;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use uuid::Uuid;

/// The closed set of decision reasons (§4.F, §6).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reason {
    Matched,
    Denied,
    NoRule,
    Fallback,
    NoAvailableGw,
    FixedUnavailable,
    WeightedUnavailable,
    UnknownRoute,
}

impl Reason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Reason::Matched => "matched",
            Reason::Denied => "denied",
            Reason::NoRule => "no_rule",
            Reason::Fallback => "fallback",
            Reason::NoAvailableGw => "no_available_gw",
            Reason::FixedUnavailable => "fixed_unavailable",
            Reason::WeightedUnavailable => "weighted_unavailable",
            Reason::UnknownRoute => "unknown_route",
        }
    }
}

impl std::fmt::Display for Reason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The structured outcome of a `select` call.
#[derive(Debug, Clone, PartialEq)]
pub struct Decision {
    pub matched_rule_id: Option<i64>,
    pub route: Option<&'static str>,
    pub gateway: Option<String>,
    pub reason: Reason,
}

/// Options for a single `select` call.
#[derive(Debug, Clone, Copy)]
pub struct SelectorOptions {
    pub allow_fallback: bool,
}

impl Default for SelectorOptions {
    fn default() -> Self {
        Self { allow_fallback: true }
    }
}

fn gateway_available(gw: &GatewayConfig) -> bool {
    gw.is_available()
}

/// Clamps negatives to 0 (weights are already `u32` so this is a no-op
/// carried for parity with the original's defensive clamp), drops zeros, and
/// rescales proportionally to a sum of exactly 100 when the raw sum isn't
/// already 100. Iterates in gateway-name order for determinism; the last
/// entry (by name) absorbs the rounding remainder so the total is always
/// exactly 100.
fn normalize_weights(weights: &BTreeMap<String, u32>) -> BTreeMap<String, u32> {
    let cleaned: BTreeMap<String, u32> = weights.iter().filter(|(_, &v)| v > 0).map(|(k, &v)| (k.clone(), v)).collect();
    let total: u64 = cleaned.values().map(|&v| v as u64).sum();
    if total == 0 {
        return BTreeMap::new();
    }
    if total == 100 {
        return cleaned;
    }
    let mut out = BTreeMap::new();
    let mut acc: i64 = 0;
    let n = cleaned.len();
    for (i, (k, v)) in cleaned.iter().enumerate() {
        if i == n - 1 {
            out.insert(k.clone(), (100 - acc).max(0) as u32);
        } else {
            let pct = ((*v as f64) * 100.0 / total as f64).round() as i64;
            out.insert(k.clone(), pct as u32);
            acc += pct;
        }
    }
    out
}

/// `SHA256(key + ":" + seed)` interpreted as a big-endian integer, mod 100.
/// Folding byte-by-byte over the digest is equivalent to Python's
/// `int(hexdigest, 16) % 100` without needing a bignum type.
fn sticky_hash_bucket(key: &str, seed: &str) -> u32 {
    let mut hasher = Sha256::new();
    hasher.update(key.as_bytes());
    hasher.update(b":");
    hasher.update(seed.as_bytes());
    let digest = hasher.finalize();
    let mut rem: u64 = 0;
    for byte in digest {
        rem = (rem * 256 + byte as u64) % 100;
    }
    rem as u32
}

/// Canonicalizes a context value for use as a sticky key (§6, open question
/// resolved in DESIGN.md): decimal integers in base-10 without leading
/// zeros, lowercase booleans, `Display` for other scalars. Composite values
/// (objects/arrays) are not valid sticky keys and are treated as a miss.
fn sticky_key_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::Bool(b) => Some(b.to_string()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Array(_) | serde_json::Value::Object(_) => None,
    }
}

fn pick_weighted<'a>(
    weights: &BTreeMap<String, u32>,
    gateways: &'a std::collections::HashMap<String, GatewayConfig>,
    sticky_by: Option<&str>,
    ctx: &Context,
    seed: &str,
) -> Option<&'a GatewayConfig> {
    let candidates: BTreeMap<String, u32> = weights
        .iter()
        .filter(|(name, _)| gateways.get(*name).map(gateway_available).unwrap_or(false))
        .map(|(k, &v)| (k.clone(), v))
        .collect();
    if candidates.is_empty() {
        return None;
    }
    let norm = normalize_weights(&candidates);
    if norm.is_empty() {
        return None;
    }

    let key = sticky_by
        .and_then(|field| ctx.get_path(field))
        .and_then(sticky_key_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    let bucket = sticky_hash_bucket(&key, seed);

    let mut cumulative: u32 = 0;
    for (name, pct) in &norm {
        cumulative += pct;
        if bucket < cumulative {
            return gateways.get(name);
        }
    }
    // Should not happen: normalized weights always sum to 100 and bucket is
    // in [0,99]. Fall back to the last entry defensively, mirroring the
    // original's equivalent safety net.
    norm.keys().last().and_then(|name| gateways.get(name))
}

/// Resolves a compiled rule's action into `(gateway, reason)` (§4.F.1).
fn resolve_action<'a>(
    rule: &CompiledRule,
    snapshot: &'a CompiledRuleSet,
    ctx: &Context,
) -> (Option<&'a GatewayConfig>, Reason) {
    let seed = format!(
        "{}:{}:{}:{}",
        snapshot.ruleset_id,
        snapshot.version,
        snapshot.sticky_salt.as_deref().unwrap_or(""),
        rule.id
    );

    match &rule.action {
        CompiledAction::Deny { .. } => (None, Reason::Denied),
        CompiledAction::Fixed { gateway } => match snapshot.gateways.get(gateway) {
            Some(gw) if gateway_available(gw) => (Some(gw), Reason::Matched),
            _ => (None, Reason::FixedUnavailable),
        },
        CompiledAction::Weighted { weights, sticky_by } => {
            match pick_weighted(weights, &snapshot.gateways, sticky_by.as_deref(), ctx, &seed) {
                Some(gw) => (Some(gw), Reason::Matched),
                None => (None, Reason::WeightedUnavailable),
            }
        }
    }
}

/// Evaluates `snapshot`'s rules against `ctx` and returns the selected
/// gateway (if any) plus a structured `Decision`. Purely CPU-bound: no I/O,
/// no locks, no suspension points (§5). `on_decision`, if given, is invoked
/// once with the final decision and must never alter the result; a panic or
/// failure inside it is the caller's concern, not propagated as a selection
/// failure.
pub fn select<'a>(
    ctx: &Context,
    snapshot: &'a CompiledRuleSet,
    options: SelectorOptions,
    on_decision: Option<&dyn Fn(&Decision, &Context)>,
) -> (Option<&'a GatewayConfig>, Decision) {
    let mut any_enabled = false;

    for rule in &snapshot.rules {
        if !rule.enabled {
            continue;
        }
        any_enabled = true;
        if !rule.predicate.evaluate(ctx) {
            continue;
        }

        let (gw, reason) = resolve_action(rule, snapshot, ctx);
        if reason == Reason::Denied {
            let decision = Decision {
                matched_rule_id: Some(rule.id),
                route: Some(rule.action.route()),
                gateway: None,
                reason,
            };
            notify(on_decision, &decision, ctx);
            return (None, decision);
        }
        if let Some(gw) = gw {
            let decision = Decision {
                matched_rule_id: Some(rule.id),
                route: Some(rule.action.route()),
                gateway: Some(gw.name.clone()),
                reason,
            };
            notify(on_decision, &decision, ctx);
            return (Some(gw), decision);
        }
        // Unresolvable action (FIXED unavailable / WEIGHTED exhausted):
        // fall through to the next matching rule (§4.F step 2).
    }

    if options.allow_fallback {
        if let Some(default_name) = &snapshot.default_gateway {
            if let Some(gw) = snapshot.gateways.get(default_name) {
                if gateway_available(gw) {
                    let decision = Decision {
                        matched_rule_id: None,
                        route: None,
                        gateway: Some(gw.name.clone()),
                        reason: Reason::Fallback,
                    };
                    notify(on_decision, &decision, ctx);
                    return (Some(gw), decision);
                }
            }
        }
    }

    let reason = if any_enabled { Reason::NoAvailableGw } else { Reason::NoRule };
    let decision = Decision { matched_rule_id: None, route: None, gateway: None, reason };
    notify(on_decision, &decision, ctx);
    (None, decision)
}

fn notify(on_decision: Option<&dyn Fn(&Decision, &Context)>, decision: &Decision, ctx: &Context) {
    if let Some(hook) = on_decision {
        hook(decision, ctx);
    }
    tracing::debug!(
        matched_rule_id = ?decision.matched_rule_id,
        route = ?decision.route,
        gateway = ?decision.gateway,
        reason = decision.reason.as_str(),
        "gateway decision"
    );
}
