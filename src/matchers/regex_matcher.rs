// REGEX: field-level pattern matching with configurable mode, flags, and a
// length guard against pathological inputs. Grounded on
// gateway_selector_v2/matchers/regex.py.

use super::{get_field, Matcher};
use crate::context::Context;
use crate::error::MatcherBuildError;
use regex::{Regex, RegexBuilder};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Search,
    Match,
    Fullmatch,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Coerce {
    None,
    Str,
    LowerStr,
}

/// `Regex(field, pattern, mode, flags, coerce, max_len?, engine_timeout_ms?)`.
///
/// `engine_timeout_ms` is accepted and carried for round-tripping the rule's
/// configuration, but never enforced: the `regex` crate has no per-match
/// timeout. `max_len` is the real mitigation against catastrophic inputs; see
/// the crate's top-level docs for the rationale (open question in the design
/// spec around regex-engine timeouts).
#[derive(Debug, Clone)]
pub struct RegexMatcher {
    pub field: String,
    pub pattern: String,
    pub mode: Mode,
    pub coerce: Coerce,
    pub max_len: Option<usize>,
    pub engine_timeout_ms: Option<u64>,
    pub compiled: std::sync::Arc<Regex>,
}

impl RegexMatcher {
    pub fn evaluate(&self, ctx: &Context) -> bool {
        let Some(raw) = get_field(ctx, &self.field) else { return false };

        let value = match self.coerce {
            Coerce::Str => super::value_in_string(raw),
            Coerce::LowerStr => super::value_in_string(raw).to_lowercase(),
            Coerce::None => match raw.as_str() {
                Some(s) => s.to_string(),
                None => return false,
            },
        };

        if let Some(max_len) = self.max_len {
            if value.chars().count() > max_len {
                return false;
            }
        }

        // Anchoring for `match`/`fullmatch` is baked into `compiled` itself
        // (see `build`), so the automaton - not post-hoc offset arithmetic on
        // a leftmost-first `find` - decides alternation/anchoring.
        self.compiled.is_match(&value)
    }
}

fn compose_flags(flags: &[serde_json::Value]) -> Result<(bool, bool, bool, bool, bool), MatcherBuildError> {
    let (mut ci, mut ml, mut dotall, mut ascii, mut verbose) = (false, false, false, false, false);
    for f in flags {
        let name = f.as_str().ok_or_else(|| MatcherBuildError::UnknownFlag(f.to_string()))?;
        match name {
            "IGNORECASE" => ci = true,
            "MULTILINE" => ml = true,
            "DOTALL" => dotall = true,
            "ASCII" => ascii = true,
            "VERBOSE" => verbose = true,
            other => return Err(MatcherBuildError::UnknownFlag(other.to_string())),
        }
    }
    Ok((ci, ml, dotall, ascii, verbose))
}

/// `{"type":"REGEX","field":str,"pattern":str,"mode"?:"search"|"match"|"fullmatch",
///   "flags"?:[...],"coerce"?:str,"max_len"?:int,"engine_timeout_ms"?:int}`.
pub fn build(cond: &serde_json::Value) -> Result<Matcher, MatcherBuildError> {
    let field = cond.get("field").and_then(|v| v.as_str()).ok_or_else(|| {
        MatcherBuildError::InvalidField { matcher_type: "REGEX".into(), field: "field".into() }
    })?;
    let pattern = cond.get("pattern").and_then(|v| v.as_str()).ok_or_else(|| {
        MatcherBuildError::InvalidField { matcher_type: "REGEX".into(), field: "pattern".into() }
    })?;
    let mode = match cond.get("mode").and_then(|v| v.as_str()).unwrap_or("search") {
        "search" => Mode::Search,
        "match" => Mode::Match,
        "fullmatch" => Mode::Fullmatch,
        other => {
            return Err(MatcherBuildError::InvalidField {
                matcher_type: "REGEX".into(),
                field: format!("mode={other}"),
            })
        }
    };
    let coerce = match cond.get("coerce") {
        None | Some(serde_json::Value::Null) => Coerce::None,
        Some(serde_json::Value::String(s)) if s == "str" => Coerce::Str,
        Some(serde_json::Value::String(s)) if s == "lower-str" => Coerce::LowerStr,
        Some(other) => {
            return Err(MatcherBuildError::InvalidCoerce {
                matcher_type: "REGEX".into(),
                coerce: other.to_string(),
            })
        }
    };
    let max_len = match cond.get("max_len") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => {
            let n = v.as_u64().filter(|&n| n > 0).ok_or(MatcherBuildError::InvalidMaxLen)?;
            Some(n as usize)
        }
    };
    let engine_timeout_ms = match cond.get("engine_timeout_ms") {
        None | Some(serde_json::Value::Null) => None,
        Some(v) => {
            let n = v.as_u64().filter(|&n| n > 0).ok_or(MatcherBuildError::InvalidEngineTimeout)?;
            Some(n)
        }
    };

    let flags: Vec<serde_json::Value> = cond
        .get("flags")
        .and_then(|v| v.as_array())
        .cloned()
        .unwrap_or_default();
    let (case_insensitive, multi_line, dotall, ascii, verbose) = compose_flags(&flags)?;

    // `match`/`fullmatch` are anchored into the pattern itself with `\A`/`\z`
    // (absolute start/end of text, unaffected by the MULTILINE flag's effect
    // on `^`/`$`) so the automaton - not a leftmost-first `find`'s offsets -
    // decides anchoring, correctly handling alternations like `a|ab`.
    let effective_pattern = match mode {
        Mode::Search => pattern.to_string(),
        Mode::Match => format!("\\A(?:{pattern})"),
        Mode::Fullmatch => format!("\\A(?:{pattern})\\z"),
    };

    let mut builder = RegexBuilder::new(&effective_pattern);
    builder
        .case_insensitive(case_insensitive)
        .multi_line(multi_line)
        .dot_matches_new_line(dotall)
        .ignore_whitespace(verbose)
        .unicode(!ascii);
    let compiled = builder.build().map_err(|e| MatcherBuildError::InvalidPattern {
        pattern: pattern.to_string(),
        reason: e.to_string(),
    })?;

    Ok(Matcher::Regex(RegexMatcher {
        field: field.to_string(),
        pattern: pattern.to_string(),
        mode,
        coerce,
        max_len,
        engine_timeout_ms,
        compiled: std::sync::Arc::new(compiled),
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
    fn search_mode_unanchored() {
        let m = build_matcher(json!({"type":"REGEX","field":"pix_key","pattern":"@bank\\.io$","mode":"search"}));
        let mut ctx = Context::new();
        ctx.set_pix_key("alice@bank.io");
        assert!(m.evaluate(&ctx));
    }

    #[test]
    fn match_mode_anchors_at_start() {
        let m = build_matcher(json!({"type":"REGEX","field":"pix_key","pattern":"alice","mode":"match"}));
        let mut ctx = Context::new();
        ctx.set_pix_key("alice@bank.io");
        assert!(m.evaluate(&ctx));
        ctx.set_pix_key("xalice@bank.io");
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn fullmatch_requires_entire_span() {
        let m = build_matcher(json!({"type":"REGEX","field":"pix_key","pattern":"[a-z]+","mode":"fullmatch"}));
        let mut ctx = Context::new();
        ctx.set_pix_key("alice");
        assert!(m.evaluate(&ctx));
        ctx.set_pix_key("alice1");
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn fullmatch_backtracks_across_alternation() {
        // Leftmost-first `find` on "a|ab" against "ab" stops at "a" (end=1),
        // which a naive offset check against the alternative would reject.
        // The engine itself must decide the anchor.
        let m = build_matcher(json!({"type":"REGEX","field":"pix_key","pattern":"a|ab","mode":"fullmatch"}));
        let mut ctx = Context::new();
        ctx.set_pix_key("ab");
        assert!(m.evaluate(&ctx));
    }

    #[test]
    fn max_len_rejects_overlong_values() {
        let m = build_matcher(json!({"type":"REGEX","field":"pix_key","pattern":".*","mode":"search","max_len":3}));
        let mut ctx = Context::new();
        ctx.set_pix_key("abcd");
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn non_string_without_coerce_is_false() {
        let m = build_matcher(json!({"type":"REGEX","field":"amount","pattern":".*","mode":"search"}));
        let mut ctx = Context::new();
        ctx.set_amount(100);
        assert!(!m.evaluate(&ctx));
    }

    #[test]
    fn unknown_flag_fails_build() {
        let cond = json!({"type":"REGEX","field":"x","pattern":"a","flags":["BOGUS"]});
        assert!(build(&cond).is_err());
    }

    #[test]
    fn case_insensitive_flag() {
        let m = build_matcher(json!({"type":"REGEX","field":"pix_key","pattern":"ALICE","mode":"search","flags":["IGNORECASE"]}));
        let mut ctx = Context::new();
        ctx.set_pix_key("alice@bank.io");
        assert!(m.evaluate(&ctx));
    }
}
