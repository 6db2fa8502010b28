//! Selects a downstream PIX payment gateway for an incoming operation by
//! evaluating a prioritized, compiled rule set against a request context.
//!
//! The hard core is the predicate/rule-set compiler (`predicate`,
//! `compiler`, `matchers`) and the selector hot path (`selector`): rules are
//! compiled once into an immutable [`compiler::CompiledRuleSet`] snapshot,
//! then evaluated per-request with deterministic sticky weighted routing and
//! graceful fallback between rules and gateways. Persistence, caching,
//! transport, and calling the gateways themselves are out of scope — see
//! `repository::Repository` for the boundary this crate depends on.

pub mod action;
pub mod compiler;
pub mod context;
pub mod error;
pub mod matchers;
pub mod model;
pub mod predicate;
pub mod repository;
pub mod selector;
pub mod snapshot;

pub use action::CompiledAction;
pub use compiler::{CompiledRule, CompiledRuleSet, CompilerOptions, RuleSetCompiler};
pub use context::Context;
pub use error::{ActionError, CompileError, MatcherBuildError, PredicateError};
pub use matchers::{Matcher, MatcherRegistry};
pub use model::{ConditionType, GatewayConfig, PixKeyType, Rule, RuleSet};
pub use predicate::{compile_predicate, CompileOptions};
pub use repository::{InMemoryRepository, Repository};
pub use selector::{select, Decision, Reason, SelectorOptions};
pub use snapshot::SnapshotHandle;
