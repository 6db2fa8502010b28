// CompiledAction + the action validator (§4.E). Grounded on
// gateway_selector_v2/compiler/ruleset_compiler.py's `_validate_action`.

use crate::error::ActionError;
use crate::model::GatewayConfig;
use std::collections::{BTreeMap, HashMap};

/// A validated, compile-time-checked action. Every gateway name it carries
/// is guaranteed to exist in the snapshot's gateway map.
#[derive(Debug, Clone, PartialEq)]
pub enum CompiledAction {
    Fixed { gateway: String },
    Weighted { weights: BTreeMap<String, u32>, sticky_by: Option<String> },
    Deny { reason_code: Option<String> },
}

impl CompiledAction {
    pub fn route(&self) -> &'static str {
        match self {
            CompiledAction::Fixed { .. } => "FIXED",
            CompiledAction::Weighted { .. } => "WEIGHTED",
            CompiledAction::Deny { .. } => "DENY",
        }
    }
}

/// Validates and compiles a raw action JSON object against the known
/// gateway map (§4.E). Weights are *not* normalized here — normalization
/// happens lazily at selection time (§4.F.2) since it depends on which
/// gateways are currently available.
pub fn compile_action(
    action: &serde_json::Value,
    gateways: &HashMap<String, GatewayConfig>,
) -> Result<CompiledAction, ActionError> {
    let route = action.get("route").and_then(|v| v.as_str());
    match route {
        Some("FIXED") => {
            let gw = action
                .get("gateway")
                .and_then(|v| v.as_str())
                .ok_or(ActionError::FixedMissingGateway)?;
            if !gateways.contains_key(gw) {
                return Err(ActionError::FixedUnknownGateway(gw.to_string()));
            }
            Ok(CompiledAction::Fixed { gateway: gw.to_string() })
        }
        Some("WEIGHTED") => {
            let weights_obj = action
                .get("weights")
                .and_then(|v| v.as_object())
                .filter(|m| !m.is_empty())
                .ok_or(ActionError::WeightedEmptyWeights)?;

            let mut weights = BTreeMap::new();
            let mut any_positive = false;
            for (name, pct) in weights_obj {
                if !gateways.contains_key(name) {
                    return Err(ActionError::WeightedUnknownGateway(name.clone()));
                }
                let value = pct.as_i64().ok_or_else(|| ActionError::WeightedInvalidWeight {
                    gateway: name.clone(),
                    value: pct.to_string(),
                })?;
                if value < 0 {
                    return Err(ActionError::WeightedInvalidWeight {
                        gateway: name.clone(),
                        value: value.to_string(),
                    });
                }
                any_positive = any_positive || value > 0;
                weights.insert(name.clone(), value as u32);
            }
            if !any_positive {
                return Err(ActionError::WeightedAllZero);
            }
            let sticky_by = action
                .get("sticky_by")
                .and_then(|v| v.as_str())
                .map(|s| s.to_string());
            Ok(CompiledAction::Weighted { weights, sticky_by })
        }
        Some("DENY") => {
            let reason_code = match action.get("reason_code") {
                None | Some(serde_json::Value::Null) => None,
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(_) => return Err(ActionError::DenyInvalidReasonCode),
            };
            Ok(CompiledAction::Deny { reason_code })
        }
        other => Err(ActionError::InvalidRoute(other.map(|s| s.to_string()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn gateways() -> HashMap<String, GatewayConfig> {
        let mut m = HashMap::new();
        m.insert("A".to_string(), GatewayConfig { id: 1, name: "A".into(), is_enabled: true, in_maintenance: false });
        m.insert("B".to_string(), GatewayConfig { id: 2, name: "B".into(), is_enabled: true, in_maintenance: false });
        m
    }

    #[test]
    fn fixed_requires_known_gateway() {
        let gws = gateways();
        let action = json!({"route": "FIXED", "gateway": "A"});
        assert_eq!(compile_action(&action, &gws).unwrap(), CompiledAction::Fixed { gateway: "A".into() });

        let bad = json!({"route": "FIXED", "gateway": "NOPE"});
        assert!(compile_action(&bad, &gws).is_err());
    }

    #[test]
    fn weighted_requires_at_least_one_positive_weight() {
        let gws = gateways();
        let action = json!({"route": "WEIGHTED", "weights": {"A": 0, "B": 0}});
        assert!(compile_action(&action, &gws).is_err());

        let ok = json!({"route": "WEIGHTED", "weights": {"A": 80, "B": 20}, "sticky_by": "api_user_id"});
        let compiled = compile_action(&ok, &gws).unwrap();
        match compiled {
            CompiledAction::Weighted { weights, sticky_by } => {
                assert_eq!(weights.get("A"), Some(&80));
                assert_eq!(sticky_by.as_deref(), Some("api_user_id"));
            }
            _ => panic!("expected weighted"),
        }
    }

    #[test]
    fn weighted_rejects_unknown_gateway() {
        let gws = gateways();
        let action = json!({"route": "WEIGHTED", "weights": {"C": 100}});
        assert!(compile_action(&action, &gws).is_err());
    }

    #[test]
    fn deny_reason_code_must_be_string_if_present() {
        let gws = gateways();
        let ok = json!({"route": "DENY", "reason_code": "blocked"});
        assert!(compile_action(&ok, &gws).is_ok());
        let bad = json!({"route": "DENY", "reason_code": 5});
        assert!(compile_action(&bad, &gws).is_err());
    }

    #[test]
    fn unknown_route_is_rejected() {
        let gws = gateways();
        let action = json!({"route": "BOGUS"});
        assert!(compile_action(&action, &gws).is_err());
    }
}
