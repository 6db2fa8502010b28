// The predicate-node value type and the (type, impl) leaf-matcher factory
// registry. The composite nodes (All/Any/Not) and the two constants live
// here too since they're structurally part of the same Matcher value; the
// flatten/fold algebra that builds them lives in `predicate.rs`.

pub mod amount_range;
pub mod regex_matcher;
pub mod time_window;
pub mod value_in;

use crate::context::Context;
use crate::error::MatcherBuildError;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

pub use amount_range::AmountRange;
pub use regex_matcher::RegexMatcher;
pub use time_window::TimeWindow;
pub use value_in::ValueIn;

/// A compiled predicate node. Deep-immutable, cheaply cloneable (composite
/// children are `Arc`-shared subtrees, never duplicated on clone).
#[derive(Debug, Clone)]
pub enum Matcher {
    ConstTrue,
    ConstFalse,
    All(Arc<[Matcher]>),
    Any(Arc<[Matcher]>),
    Not(Arc<Matcher>),
    ValueIn(ValueIn),
    Regex(RegexMatcher),
    AmountRange(AmountRange),
    TimeWindow(TimeWindow),
    /// Transparent wrapper: records path/kind/result/elapsed, never alters
    /// the wrapped matcher's outcome. Zero cost when not constructed.
    DebugTrace(Arc<DebugTrace>),
}

impl Matcher {
    /// Evaluates this node against `ctx`. Never panics: any unexpected shape
    /// or value at a leaf resolves to `false`, never an error (see §7 of the
    /// design: evaluation never raises).
    pub fn evaluate(&self, ctx: &Context) -> bool {
        match self {
            Matcher::ConstTrue => true,
            Matcher::ConstFalse => false,
            Matcher::All(children) => children.iter().all(|c| c.evaluate(ctx)),
            Matcher::Any(children) => children.iter().any(|c| c.evaluate(ctx)),
            Matcher::Not(child) => !child.evaluate(ctx),
            Matcher::ValueIn(m) => m.evaluate(ctx),
            Matcher::Regex(m) => m.evaluate(ctx),
            Matcher::AmountRange(m) => m.evaluate(ctx),
            Matcher::TimeWindow(m) => m.evaluate(ctx),
            Matcher::DebugTrace(trace) => trace.evaluate(ctx),
        }
    }

    /// Short descriptive name, used by `DebugTrace` and diagnostics. Mirrors
    /// the original implementation's `Matcher.name` property.
    pub fn kind(&self) -> &'static str {
        match self {
            Matcher::ConstTrue => "CONST_TRUE",
            Matcher::ConstFalse => "CONST_FALSE",
            Matcher::All(_) => "ALL",
            Matcher::Any(_) => "ANY",
            Matcher::Not(_) => "NONE",
            Matcher::ValueIn(_) => "VALUE_IN",
            Matcher::Regex(_) => "REGEX",
            Matcher::AmountRange(_) => "AMOUNT_RANGE",
            Matcher::TimeWindow(_) => "TIME_WINDOW",
            Matcher::DebugTrace(trace) => trace.inner.kind(),
        }
    }
}

/// A transparent decorator around a compiled matcher: records the
/// hierarchical path, the node kind, the boolean result and elapsed time.
/// Never mutates behavior or result. Context *keys* may be logged, never
/// values (PII).
#[derive(Debug)]
pub struct DebugTrace {
    pub inner: Matcher,
    pub path: String,
    pub capture_ctx_keys: bool,
}

impl DebugTrace {
    pub fn wrap(inner: Matcher, path: impl Into<String>, capture_ctx_keys: bool) -> Matcher {
        Matcher::DebugTrace(Arc::new(DebugTrace { inner, path: path.into(), capture_ctx_keys }))
    }

    fn evaluate(&self, ctx: &Context) -> bool {
        let t0 = Instant::now();
        let result = self.inner.evaluate(ctx);
        let elapsed = t0.elapsed();
        if self.capture_ctx_keys {
            let keys: Vec<&String> = ctx.raw().keys().collect();
            tracing::debug!(
                path = %self.path,
                matcher = self.inner.kind(),
                result,
                elapsed_us = elapsed.as_micros() as u64,
                ?keys,
                "rules-debug"
            );
        } else {
            tracing::debug!(
                path = %self.path,
                matcher = self.inner.kind(),
                result,
                elapsed_us = elapsed.as_micros() as u64,
                "rules-debug"
            );
        }
        result
    }
}

/// Factory for a leaf matcher type: validates its JSON config at build time
/// and produces an immutable `Matcher`. Never called on the hot path.
pub type MatcherFactory = fn(&serde_json::Value) -> Result<Matcher, MatcherBuildError>;

/// The process-wide `(type, impl) -> factory` table (§4.B, §4.H, §9). Built
/// once via `MatcherRegistry::with_builtins()`; duplicate registration is a
/// programmer error and panics at registration time rather than degrading
/// silently, mirroring the original's `register_matcher` raising on
/// collision.
pub struct MatcherRegistry {
    factories: HashMap<(String, String), MatcherFactory>,
}

impl MatcherRegistry {
    pub fn new() -> Self {
        Self { factories: HashMap::new() }
    }

    /// Registers a factory under `(matcher_type, impl_name)`. Panics if the
    /// key is already registered — this only happens at process init, never
    /// on the request path.
    pub fn register(&mut self, matcher_type: &str, impl_name: &str, factory: MatcherFactory) {
        let key = (matcher_type.to_string(), impl_name.to_string());
        if self.factories.contains_key(&key) {
            panic!("duplicate matcher registration: {}:{}", key.0, key.1);
        }
        self.factories.insert(key, factory);
    }

    /// The registry preloaded with the four built-in leaf matchers under
    /// their default `"v1"` impl.
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.register("VALUE_IN", "v1", value_in::build);
        reg.register("REGEX", "v1", regex_matcher::build);
        reg.register("AMOUNT_RANGE", "v1", amount_range::build);
        reg.register("TIME_WINDOW", "v1", time_window::build);
        reg
    }

    /// Builds a leaf matcher from `{"type": ..., "impl"?: ..., ...}`.
    pub fn build(&self, cond: &serde_json::Value) -> Result<Matcher, MatcherBuildError> {
        let matcher_type = cond
            .get("type")
            .and_then(|v| v.as_str())
            .ok_or_else(|| MatcherBuildError::InvalidField {
                matcher_type: "leaf".into(),
                field: "type".into(),
            })?;
        let impl_name = cond.get("impl").and_then(|v| v.as_str()).unwrap_or("v1");
        let key = (matcher_type.to_string(), impl_name.to_string());
        let factory = self.factories.get(&key).ok_or_else(|| MatcherBuildError::UnknownMatcher {
            matcher_type: matcher_type.to_string(),
            impl_name: impl_name.to_string(),
        })?;
        factory(cond)
    }
}

impl Default for MatcherRegistry {
    fn default() -> Self {
        Self::with_builtins()
    }
}

/// Reads a dotted path ("a.b.c") against the context. Thin re-export over
/// `Context::get_path` so matcher modules have a single import.
pub(crate) fn get_field<'a>(ctx: &'a Context, path: &str) -> Option<&'a serde_json::Value> {
    ctx.get_path(path)
}

/// Canonical stringification used by `coerce="str"`/`"lower-str"` across
/// matchers: strings pass through, booleans lowercase, numbers use their
/// canonical decimal form, everything else falls back to JSON's `Display`.
pub(crate) fn value_in_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_builds_value_in() {
        let reg = MatcherRegistry::with_builtins();
        let cond = serde_json::json!({"type": "VALUE_IN", "field": "api_user_id", "values": [1,2,3], "coerce": "int"});
        let m = reg.build(&cond).unwrap();
        assert_eq!(m.kind(), "VALUE_IN");
    }

    #[test]
    fn registry_rejects_unknown_type() {
        let reg = MatcherRegistry::with_builtins();
        let cond = serde_json::json!({"type": "NOPE"});
        assert!(reg.build(&cond).is_err());
    }

    #[test]
    #[should_panic(expected = "duplicate matcher registration")]
    fn duplicate_registration_panics() {
        let mut reg = MatcherRegistry::new();
        reg.register("VALUE_IN", "v1", value_in::build);
        reg.register("VALUE_IN", "v1", value_in::build);
    }

    #[test]
    fn const_true_and_false_evaluate() {
        let ctx = Context::new();
        assert!(Matcher::ConstTrue.evaluate(&ctx));
        assert!(!Matcher::ConstFalse.evaluate(&ctx));
    }

    #[test]
    fn all_short_circuits() {
        let ctx = Context::new();
        let all = Matcher::All(Arc::from(vec![Matcher::ConstFalse, Matcher::ConstTrue]));
        assert!(!all.evaluate(&ctx));
    }

    #[test]
    fn any_short_circuits() {
        let ctx = Context::new();
        let any = Matcher::Any(Arc::from(vec![Matcher::ConstTrue, Matcher::ConstFalse]));
        assert!(any.evaluate(&ctx));
    }

    #[test]
    fn debug_trace_never_changes_result() {
        let ctx = Context::new();
        let wrapped = DebugTrace::wrap(Matcher::ConstTrue, "ROOT", true);
        assert!(wrapped.evaluate(&ctx));
        let wrapped = DebugTrace::wrap(Matcher::ConstFalse, "ROOT", false);
        assert!(!wrapped.evaluate(&ctx));
    }
}
