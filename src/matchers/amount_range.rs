// AMOUNT_RANGE: arbitrary-precision decimal bounds check. Grounded on
// gateway_selector_v2/matchers/amount_range.py. Never routes monetary values
// through binary floats; comparisons use `rust_decimal` (28 significant
// digits).

use super::{get_field, Matcher};
use crate::context::Context;
use crate::error::MatcherBuildError;
use rust_decimal::Decimal;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    Int,
    Decimal,
}

/// `AmountRange(field, coerce, scale, min?, max?, min_inclusive, max_inclusive)`.
#[derive(Debug, Clone)]
pub struct AmountRange {
    pub field: String,
    pub coerce: Coerce,
    pub scale: u32,
    pub min: Option<Decimal>,
    pub max: Option<Decimal>,
    pub min_inclusive: bool,
    pub max_inclusive: bool,
}

fn to_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::String(s) => Decimal::from_str(s.trim()).ok(),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Some(Decimal::from(i))
            } else {
                Decimal::from_str(&n.to_string()).ok()
            }
        }
        _ => None,
    }
}

impl AmountRange {
    pub fn evaluate(&self, ctx: &Context) -> bool {
        let Some(raw) = get_field(ctx, &self.field) else { return false };

        let amount = match self.coerce {
            Coerce::Int => {
                let iv = match raw {
                    serde_json::Value::Number(n) => n.as_i64(),
                    serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
                    _ => None,
                };
                let Some(iv) = iv else { return false };
                if self.scale > 0 {
                    Decimal::from(iv) / Decimal::from(10i64.pow(self.scale))
                } else {
                    Decimal::from(iv)
                }
            }
            Coerce::Decimal => match to_decimal(raw) {
                Some(d) => d,
                None => return false,
            },
        };

        if let Some(min) = self.min {
            if self.min_inclusive {
                if amount < min {
                    return false;
                }
            } else if amount <= min {
                return false;
            }
        }
        if let Some(max) = self.max {
            if self.max_inclusive {
                if amount > max {
                    return false;
                }
            } else if amount >= max {
                return false;
            }
        }
        true
    }
}

/// `{"type":"AMOUNT_RANGE","field"?:"amount","coerce"?:"int"|"decimal",
///   "scale"?:int,"min"?:str|num,"max"?:str|num,"min_inclusive"?:bool,
///   "max_inclusive"?:bool}`. Defaults: `field="amount"`, `coerce="decimal"`,
/// `scale=0`, both bounds inclusive.
pub fn build(cond: &serde_json::Value) -> Result<Matcher, MatcherBuildError> {
    let field = cond.get("field").and_then(|v| v.as_str()).unwrap_or("amount");

    let coerce = match cond.get("coerce").and_then(|v| v.as_str()).unwrap_or("decimal") {
        "int" => Coerce::Int,
        "decimal" => Coerce::Decimal,
        other => {
            return Err(MatcherBuildError::InvalidCoerce {
                matcher_type: "AMOUNT_RANGE".into(),
                coerce: other.to_string(),
            })
        }
    };

    let scale = cond.get("scale").and_then(|v| v.as_i64()).unwrap_or(0);
    if scale < 0 {
        return Err(MatcherBuildError::NegativeScale);
    }
    let scale = scale as u32;

    let min = match cond.get("min") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            to_decimal(v).ok_or_else(|| MatcherBuildError::InvalidDecimalBound(v.to_string()))?,
        ),
    };
    let max = match cond.get("max") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => Some(
            to_decimal(v).ok_or_else(|| MatcherBuildError::InvalidDecimalBound(v.to_string()))?,
        ),
    };
    if let (Some(min), Some(max)) = (min, max) {
        if max < min {
            return Err(MatcherBuildError::MaxLessThanMin);
        }
    }

    let min_inclusive = cond.get("min_inclusive").and_then(|v| v.as_bool()).unwrap_or(true);
    let max_inclusive = cond.get("max_inclusive").and_then(|v| v.as_bool()).unwrap_or(true);

    Ok(Matcher::AmountRange(AmountRange {
        field: field.to_string(),
        coerce,
        scale,
        min,
        max,
        min_inclusive,
        max_inclusive,
    }))
}
