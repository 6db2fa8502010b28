// Error taxonomy. Compilation is fail-fast (abort the whole compile on the
// first bad rule); evaluation never raises (see selector.rs, which always
// resolves to a Decision).

use thiserror::Error;

/// Errors raised while building an individual leaf matcher from its JSON
/// configuration. Always a build-time (compile-time) failure.
#[derive(Debug, Error, PartialEq)]
pub enum MatcherBuildError {
    #[error("matcher not registered: {matcher_type}:{impl_name}")]
    UnknownMatcher { matcher_type: String, impl_name: String },

    #[error("{matcher_type}: missing or invalid field '{field}'")]
    InvalidField { matcher_type: String, field: String },

    #[error("{matcher_type}: invalid coerce mode '{coerce}'")]
    InvalidCoerce { matcher_type: String, coerce: String },

    #[error("REGEX: unknown flag '{0}'")]
    UnknownFlag(String),

    #[error("REGEX: invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    #[error("REGEX.max_len must be a positive integer")]
    InvalidMaxLen,

    #[error("REGEX.engine_timeout_ms must be a positive integer")]
    InvalidEngineTimeout,

    #[error("AMOUNT_RANGE.scale must be >= 0")]
    NegativeScale,

    #[error("AMOUNT_RANGE: malformed decimal bound '{0}'")]
    InvalidDecimalBound(String),

    #[error("AMOUNT_RANGE: max < min")]
    MaxLessThanMin,

    #[error("TIME_WINDOW: unknown IANA timezone '{0}'")]
    UnknownTimezone(String),

    #[error("TIME_WINDOW: invalid time literal '{0}', expected HH:MM or HH:MM:SS")]
    InvalidTimeLiteral(String),

    #[error("TIME_WINDOW: invalid weekday '{0}', expected mon..sun")]
    InvalidWeekday(String),
}

/// Errors raised while compiling a predicate tree (composite/leaf shape).
#[derive(Debug, Error, PartialEq)]
pub enum PredicateError {
    #[error("[{path}] invalid node: expected a non-empty object")]
    EmptyNode { path: String },

    #[error("[{path}] ambiguous composite node: found multiple keys among 'all'/'any'/'none'")]
    AmbiguousComposite { path: String },

    #[error("[{path}] composite '{key}' must be a list")]
    CompositeNotList { path: String, key: String },

    #[error("[{path}] leaf node missing 'type'")]
    LeafMissingType { path: String },

    #[error("[{path}] {source}")]
    MatcherBuild { path: String, #[source] source: MatcherBuildError },
}

/// Errors raised while validating a rule's action against known gateways.
#[derive(Debug, Error, PartialEq)]
pub enum ActionError {
    #[error("action.route invalid or missing: {0:?}")]
    InvalidRoute(Option<String>),

    #[error("FIXED requires a 'gateway' string")]
    FixedMissingGateway,

    #[error("FIXED gateway unknown: '{0}'")]
    FixedUnknownGateway(String),

    #[error("WEIGHTED requires a non-empty 'weights' map")]
    WeightedEmptyWeights,

    #[error("WEIGHTED gateway unknown: '{0}'")]
    WeightedUnknownGateway(String),

    #[error("WEIGHTED weight for '{gateway}' is not a non-negative integer: {value}")]
    WeightedInvalidWeight { gateway: String, value: String },

    #[error("WEIGHTED requires at least one weight > 0")]
    WeightedAllZero,

    #[error("DENY.reason_code must be a string if present")]
    DenyInvalidReasonCode,
}

/// Errors raised while compiling a whole rule set into a snapshot.
#[derive(Debug, Error)]
pub enum CompileError {
    #[error("no active rule set")]
    NoActiveRuleSet,

    #[error("rule set not found: {0}")]
    RuleSetNotFound(i64),

    #[error("no gateways configured")]
    NoGateways,

    #[error("[RULE[{rule_id}]] {ftype} requires condition_value")]
    ShorthandMissingValue { rule_id: i64, ftype: &'static str },

    #[error("[RULE[{rule_id}]] ADVANCED requires condition_json")]
    AdvancedMissingJson { rule_id: i64 },

    #[error("[RULE[{rule_id}]] USER requires an integer condition_value, got {value:?}")]
    UserConditionNotInteger { rule_id: i64, value: String },

    #[error("[RULE[{rule_id}]] invalid PIX_KEY_TYPE: {value:?}")]
    InvalidPixKeyType { rule_id: i64, value: String },

    #[error("[RULE[{rule_id}]] error compiling predicate: {source}")]
    Predicate { rule_id: i64, #[source] source: PredicateError },

    #[error("[RULE[{rule_id}]] error validating action: {source}")]
    Action { rule_id: i64, #[source] source: ActionError },

    #[error("default gateway unknown: '{0}'")]
    UnknownDefaultGateway(String),

    #[error("repository error: {0}")]
    Repository(String),

    #[error("compilation cancelled")]
    Cancelled,
}
