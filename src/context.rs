// Context: the heterogeneous request mapping read by matchers and the selector.
// Dotted-path field access with "missing" semantics instead of errors.

use serde_json::Value;
use std::collections::HashMap;

/// Recognized top-level context field names. Free-form nested maps are still
/// readable by dotted path even if they are not named here.
pub mod fields {
    pub const API_USER_ID: &str = "api_user_id";
    pub const PIX_KEY: &str = "pix_key";
    pub const PIX_KEY_TYPE: &str = "pix_key_type";
    pub const AMOUNT: &str = "amount";
    pub const NOW: &str = "now";
    pub const ENV: &str = "env";
}

/// A heterogeneous string-to-value mapping. Backed by `serde_json::Value` so
/// it can hold integers, strings, decimals-as-strings, timestamps-as-strings,
/// and arbitrarily nested maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Context {
    fields: HashMap<String, Value>,
}

impl Context {
    pub fn new() -> Self {
        Self { fields: HashMap::new() }
    }

    pub fn from_map(fields: HashMap<String, Value>) -> Self {
        Self { fields }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.fields.insert(key.into(), value.into());
        self
    }

    pub fn set_api_user_id(&mut self, id: i64) -> &mut Self {
        self.set(fields::API_USER_ID, id)
    }

    pub fn set_pix_key(&mut self, key: impl Into<String>) -> &mut Self {
        self.set(fields::PIX_KEY, key.into())
    }

    pub fn set_pix_key_type(&mut self, key_type: impl Into<String>) -> &mut Self {
        self.set(fields::PIX_KEY_TYPE, key_type.into())
    }

    pub fn set_amount(&mut self, amount: impl Into<Value>) -> &mut Self {
        self.set(fields::AMOUNT, amount)
    }

    pub fn set_now(&mut self, now: chrono::DateTime<chrono::Utc>) -> &mut Self {
        self.set(fields::NOW, now.to_rfc3339())
    }

    /// Resolves a dotted path ("a.b.c") against the context. Any absent
    /// segment, or a non-object encountered mid-path, yields `None` rather
    /// than an error. Paths with empty segments (leading/trailing/double
    /// dots) are treated as missing.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        if path.is_empty() {
            return None;
        }
        let mut segments = path.split('.');
        let first = segments.next()?;
        if first.is_empty() {
            return None;
        }
        let mut cur = self.fields.get(first)?;
        for seg in segments {
            if seg.is_empty() {
                return None;
            }
            cur = cur.as_object()?.get(seg)?;
        }
        Some(cur)
    }

    pub fn raw(&self) -> &HashMap<String, Value> {
        &self.fields
    }
}

impl From<HashMap<String, Value>> for Context {
    fn from(fields: HashMap<String, Value>) -> Self {
        Self::from_map(fields)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ctx_with_nested() -> Context {
        let mut ctx = Context::new();
        ctx.set("a", json!({"b": {"c": 42}}));
        ctx
    }

    #[test]
    fn resolves_top_level_field() {
        let mut ctx = Context::new();
        ctx.set_api_user_id(101);
        assert_eq!(ctx.get_path("api_user_id"), Some(&json!(101)));
    }

    #[test]
    fn resolves_nested_path() {
        let ctx = ctx_with_nested();
        assert_eq!(ctx.get_path("a.b.c"), Some(&json!(42)));
    }

    #[test]
    fn missing_top_level_is_none() {
        let ctx = Context::new();
        assert_eq!(ctx.get_path("nope"), None);
    }

    #[test]
    fn missing_mid_path_is_none() {
        let ctx = ctx_with_nested();
        assert_eq!(ctx.get_path("a.x.c"), None);
    }

    #[test]
    fn non_map_mid_path_is_none() {
        let mut ctx = Context::new();
        ctx.set("a", json!(5));
        assert_eq!(ctx.get_path("a.b"), None);
    }

    #[test]
    fn empty_segments_are_missing() {
        let ctx = ctx_with_nested();
        assert_eq!(ctx.get_path(""), None);
        assert_eq!(ctx.get_path("a..c"), None);
        assert_eq!(ctx.get_path(".a"), None);
        assert_eq!(ctx.get_path("a."), None);
    }
}
