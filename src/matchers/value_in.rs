// VALUE_IN: membership test against a pre-coerced, build-time-computed set.
// Grounded on gateway_selector/matchers/value_in.py.

use super::{get_field, Matcher};
use crate::context::Context;
use crate::error::MatcherBuildError;
use std::collections::HashSet;

/// How the field's raw value is normalized before the set lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    None,
    Int,
    Str,
    LowerStr,
}

impl Coerce {
    fn parse(s: &str) -> Result<Self, ()> {
        match s {
            "int" => Ok(Coerce::Int),
            "str" => Ok(Coerce::Str),
            "lower-str" => Ok(Coerce::LowerStr),
            _ => Err(()),
        }
    }
}

/// A coerced, hashable scalar. `values` is pre-coerced once at build time so
/// the hot path only does a set lookup, no per-request conversion.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Coerced {
    Int(i64),
    Str(String),
}

/// `ValueIn(field, values, coerce)` — §4.B.
#[derive(Debug, Clone)]
pub struct ValueIn {
    pub field: String,
    pub values: std::sync::Arc<HashSet<Coerced>>,
    pub coerce: Coerce,
}

fn coerce_json(value: &serde_json::Value, coerce: Coerce) -> Option<Coerced> {
    match coerce {
        Coerce::Int => json_as_i64(value).map(Coerced::Int),
        Coerce::Str => Some(Coerced::Str(json_to_string(value))),
        Coerce::LowerStr => Some(Coerced::Str(json_to_string(value).to_lowercase())),
        // No coercion: compare as-is. A JSON number and a JSON string are
        // never equal (matches Python's `101 in {"101"}` -> False), so this
        // must not fall back to parsing strings as integers like `Coerce::Int`
        // does.
        Coerce::None => {
            if let Some(i) = value.as_i64() {
                Some(Coerced::Int(i))
            } else {
                value.as_str().map(|s| Coerced::Str(s.to_string()))
            }
        }
    }
}

fn json_as_i64(value: &serde_json::Value) -> Option<i64> {
    if let Some(i) = value.as_i64() {
        return Some(i);
    }
    if let Some(s) = value.as_str() {
        return s.trim().parse::<i64>().ok();
    }
    None
}

fn json_to_string(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Bool(b) => b.to_string(),
        serde_json::Value::Number(n) => n.to_string(),
        other => other.to_string(),
    }
}

impl ValueIn {
    pub fn evaluate(&self, ctx: &Context) -> bool {
        let Some(raw) = get_field(ctx, &self.field) else { return false };
        let Some(coerced) = coerce_json(raw, self.coerce) else { return false };
        self.values.contains(&coerced)
    }
}

/// `{"type": "VALUE_IN", "field": str, "values": [...], "coerce"?: str}`.
pub fn build(cond: &serde_json::Value) -> Result<Matcher, MatcherBuildError> {
    let field = cond.get("field").and_then(|v| v.as_str()).ok_or_else(|| {
        MatcherBuildError::InvalidField { matcher_type: "VALUE_IN".into(), field: "field".into() }
    })?;
    let values = cond.get("values").and_then(|v| v.as_array()).ok_or_else(|| {
        MatcherBuildError::InvalidField { matcher_type: "VALUE_IN".into(), field: "values".into() }
    })?;
    let coerce = match cond.get("coerce") {
        None | Some(serde_json::Value::Null) => Coerce::None,
        Some(serde_json::Value::String(s)) => Coerce::parse(s).map_err(|_| {
            MatcherBuildError::InvalidCoerce { matcher_type: "VALUE_IN".into(), coerce: s.clone() }
        })?,
        Some(other) => {
            return Err(MatcherBuildError::InvalidCoerce {
                matcher_type: "VALUE_IN".into(),
                coerce: other.to_string(),
            })
        }
    };

    let mut canon = HashSet::with_capacity(values.len());
    for v in values {
        let coerced = coerce_json(v, coerce).ok_or_else(|| MatcherBuildError::InvalidField {
            matcher_type: "VALUE_IN".into(),
            field: "values".into(),
        })?;
        canon.insert(coerced);
    }

    Ok(Matcher::ValueIn(ValueIn {
        field: field.to_string(),
        values: std::sync::Arc::new(canon),
        coerce,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn build_matcher(cond: serde_json::Value) -> Matcher {
        build(&cond).unwrap()
    }

    #[test]
    fn matches_int_coerced_membership() {
        let m = build_matcher(json!({"type": "VALUE_IN", "field": "api_user_id", "values": [101, 102], "coerce": "int"}));
        let mut ctx = Context::new();
        ctx.set_api_user_id(101);
        assert!(m.evaluate(&ctx));
        ctx.set_api_user_id(999);
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn missing_field_is_false() {
        let m = build_matcher(json!({"type": "VALUE_IN", "field": "api_user_id", "values": [101], "coerce": "int"}));
        let ctx = Context::new();
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn lower_str_coerce_is_case_insensitive() {
        let m = build_matcher(json!({"type": "VALUE_IN", "field": "pix_key_type", "values": ["EMAIL"], "coerce": "lower-str"}));
        let mut ctx = Context::new();
        ctx.set_pix_key_type("email");
        assert!(m.evaluate(&ctx));
    }

    #[test]
    fn int_coerce_failure_is_false() {
        let m = build_matcher(json!({"type": "VALUE_IN", "field": "pix_key", "values": [1], "coerce": "int"}));
        let mut ctx = Context::new();
        ctx.set_pix_key("not-a-number");
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn unknown_coerce_fails_build() {
        let cond = json!({"type": "VALUE_IN", "field": "x", "values": [1], "coerce": "bogus"});
        assert!(build(&cond).is_err());
    }

    #[test]
    fn no_coerce_does_not_mix_numbers_and_strings() {
        let m = build_matcher(json!({"type": "VALUE_IN", "field": "api_user_id", "values": ["101"]}));
        let mut ctx = Context::new();
        ctx.set_api_user_id(101);
        assert!(!m.evaluate(&ctx));

        let m = build_matcher(json!({"type": "VALUE_IN", "field": "api_user_id", "values": [101]}));
        let mut ctx = Context::new();
        ctx.set_api_user_id(101);
        assert!(m.evaluate(&ctx));
        ctx.set("api_user_id", "101");
        assert!(!m.evaluate(&ctx));
    }
}
