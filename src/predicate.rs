// The predicate-tree compiler: composite node validation, recursive leaf
// building, flattening and constant folding. Grounded line-for-line on
// gateway_selector_v2/compiler/rule_compiler.py.

use crate::error::PredicateError;
use crate::matchers::{DebugTrace, Matcher, MatcherRegistry};
use std::sync::Arc;

/// Options threaded through predicate compilation. `debug` enables the
/// transparent trace wrapper (§4.C); disabled by default so production
/// compiles pay zero runtime cost for it.
#[derive(Debug, Clone, Copy, Default)]
pub struct CompileOptions {
    pub debug: bool,
    pub capture_ctx_keys: bool,
}

/// Recursively compiles a predicate JSON node into a `Matcher`.
///
/// A node is either composite (exactly one of `all`/`any`/`none`, each a
/// list) or a leaf (an object with `type`). `none` is defined as the fold of
/// `Not(Any(children))`. Flattening collapses nested same-kind combinators;
/// constant folding drops `ConstTrue`/`ConstFalse` per §4.C.
pub fn compile_predicate(
    registry: &MatcherRegistry,
    tree: &serde_json::Value,
    options: CompileOptions,
    path: &str,
) -> Result<Matcher, PredicateError> {
    let obj = tree.as_object().filter(|o| !o.is_empty()).ok_or_else(|| {
        PredicateError::EmptyNode { path: path.to_string() }
    })?;

    let present: Vec<&str> = ["all", "any", "none"].into_iter().filter(|k| obj.contains_key(*k)).collect();
    if present.len() > 1 {
        return Err(PredicateError::AmbiguousComposite { path: path.to_string() });
    }

    if let Some(&key) = present.first() {
        let raw_children = obj
            .get(key)
            .and_then(|v| v.as_array())
            .ok_or_else(|| PredicateError::CompositeNotList {
                path: path.to_string(),
                key: key.to_string(),
            })?;

        return match key {
            "all" => compile_all(registry, raw_children, options, path),
            "any" => compile_any(registry, raw_children, options, path),
            "none" => compile_none(registry, raw_children, options, path),
            _ => unreachable!(),
        };
    }

    if !obj.contains_key("type") {
        return Err(PredicateError::LeafMissingType { path: path.to_string() });
    }
    let leaf = registry
        .build(tree)
        .map_err(|source| PredicateError::MatcherBuild { path: path.to_string(), source })?;
    Ok(maybe_trace(leaf, options, path))
}

fn compile_children(
    registry: &MatcherRegistry,
    raw_children: &[serde_json::Value],
    options: CompileOptions,
    path: &str,
    label: &str,
) -> Result<Vec<Matcher>, PredicateError> {
    raw_children
        .iter()
        .enumerate()
        .map(|(i, c)| compile_predicate(registry, c, options, &format!("{path}.{label}[{i}]")))
        .collect()
}

fn compile_all(
    registry: &MatcherRegistry,
    raw_children: &[serde_json::Value],
    options: CompileOptions,
    path: &str,
) -> Result<Matcher, PredicateError> {
    let children = compile_children(registry, raw_children, options, path, "ALL")?;
    let flat = flatten(Kind::All, children);
    let node = fold_all(flat);
    Ok(maybe_trace(node, options, path))
}

fn compile_any(
    registry: &MatcherRegistry,
    raw_children: &[serde_json::Value],
    options: CompileOptions,
    path: &str,
) -> Result<Matcher, PredicateError> {
    let children = compile_children(registry, raw_children, options, path, "ANY")?;
    let flat = flatten(Kind::Any, children);
    let node = fold_any(flat);
    Ok(maybe_trace(node, options, path))
}

fn compile_none(
    registry: &MatcherRegistry,
    raw_children: &[serde_json::Value],
    options: CompileOptions,
    path: &str,
) -> Result<Matcher, PredicateError> {
    // none([]) = not any([]) = not false = true.
    let node = if raw_children.is_empty() {
        Matcher::ConstTrue
    } else {
        let any_node = compile_any(registry, raw_children, options, &format!("{path}.NONE"))?;
        match unwrap_trace(&any_node) {
            Matcher::ConstTrue => Matcher::ConstFalse,
            Matcher::ConstFalse => Matcher::ConstTrue,
            _ => Matcher::Not(Arc::new(any_node)),
        }
    };
    Ok(maybe_trace(node, options, path))
}

fn unwrap_trace(m: &Matcher) -> &Matcher {
    match m {
        Matcher::DebugTrace(t) => unwrap_trace(&t.inner),
        other => other,
    }
}

fn maybe_trace(node: Matcher, options: CompileOptions, path: &str) -> Matcher {
    if options.debug {
        DebugTrace::wrap(node, path, options.capture_ctx_keys)
    } else {
        node
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Kind {
    All,
    Any,
}

/// Collapses combinators of the same kind nested directly inside each other:
/// `All(All(x,y), z) -> All(x,y,z)`. Operates through any `DebugTrace`
/// wrapper transparently (debug mode must not change the flattened shape
/// that folding observes — only whether it observes a trace-wrapped node).
fn flatten(kind: Kind, children: Vec<Matcher>) -> Vec<Matcher> {
    let mut flat = Vec::with_capacity(children.len());
    for child in children {
        let peek = unwrap_trace(&child);
        let matches_kind = matches!(
            (kind, peek),
            (Kind::All, Matcher::All(_)) | (Kind::Any, Matcher::Any(_))
        );
        if matches_kind {
            if let Matcher::All(grandchildren) | Matcher::Any(grandchildren) = peek {
                flat.extend(grandchildren.iter().cloned());
                continue;
            }
        }
        flat.push(child);
    }
    flat
}

fn fold_all(children: Vec<Matcher>) -> Matcher {
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        match unwrap_trace(&child) {
            Matcher::ConstFalse => return Matcher::ConstFalse,
            Matcher::ConstTrue => continue,
            _ => kept.push(child),
        }
    }
    match kept.len() {
        0 => Matcher::ConstTrue,
        1 => kept.into_iter().next().unwrap(),
        _ => Matcher::All(Arc::from(kept)),
    }
}

fn fold_any(children: Vec<Matcher>) -> Matcher {
    let mut kept = Vec::with_capacity(children.len());
    for child in children {
        match unwrap_trace(&child) {
            Matcher::ConstTrue => return Matcher::ConstTrue,
            Matcher::ConstFalse => continue,
            _ => kept.push(child),
        }
    }
    match kept.len() {
        0 => Matcher::ConstFalse,
        1 => kept.into_iter().next().unwrap(),
        _ => Matcher::Any(Arc::from(kept)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use serde_json::json;

    fn registry() -> MatcherRegistry {
        MatcherRegistry::with_builtins()
    }

    fn compile(tree: serde_json::Value) -> Matcher {
        compile_predicate(&registry(), &tree, CompileOptions::default(), "ROOT").unwrap()
    }

    #[test]
    fn flattens_nested_all() {
        let tree = json!({"all": [
            {"all": [
                {"type": "VALUE_IN", "field": "a", "values": [1], "coerce": "int"},
                {"type": "VALUE_IN", "field": "b", "values": [2], "coerce": "int"}
            ]},
            {"type": "VALUE_IN", "field": "c", "values": [3], "coerce": "int"}
        ]});
        let m = compile(tree);
        match m {
            Matcher::All(children) => assert_eq!(children.len(), 3),
            other => panic!("expected flattened All, got {other:?}"),
        }
    }

    #[test]
    fn all_drops_const_true_and_collapses_to_single_child() {
        let tree = json!({"all": [
            {"none": []},
            {"type": "VALUE_IN", "field": "a", "values": [1], "coerce": "int"}
        ]});
        // none([]) -> ConstTrue, so this ALL reduces to just the VALUE_IN leaf.
        let m = compile(tree);
        assert!(matches!(m, Matcher::ValueIn(_)));
    }

    #[test]
    fn any_empty_is_const_false() {
        let m = compile(json!({"any": []}));
        assert!(matches!(m, Matcher::ConstFalse));
    }

    #[test]
    fn all_empty_is_const_true() {
        let m = compile(json!({"all": []}));
        assert!(matches!(m, Matcher::ConstTrue));
    }

    #[test]
    fn none_of_const_true_is_const_false() {
        let m = compile(json!({"none": [{"all": []}]}));
        assert!(matches!(m, Matcher::ConstFalse));
    }

    #[test]
    fn none_negates_any() {
        let tree = json!({"none": [
            {"type": "VALUE_IN", "field": "a", "values": [1], "coerce": "int"}
        ]});
        let m = compile(tree);
        let ctx_match = {
            let mut c = Context::new();
            c.set("a", 1);
            c
        };
        let ctx_miss = {
            let mut c = Context::new();
            c.set("a", 2);
            c
        };
        assert!(!m.evaluate(&ctx_match));
        assert!(m.evaluate(&ctx_miss));
    }

    #[test]
    fn ambiguous_composite_is_rejected() {
        let tree = json!({"all": [], "any": []});
        assert!(compile_predicate(&registry(), &tree, CompileOptions::default(), "ROOT").is_err());
    }

    #[test]
    fn leaf_without_type_is_rejected() {
        let tree = json!({"field": "a"});
        assert!(compile_predicate(&registry(), &tree, CompileOptions::default(), "ROOT").is_err());
    }

    #[test]
    fn naive_eval_matches_compiled_eval() {
        // Flattening/folding must not change observable semantics (§8.5).
        let tree = json!({"any": [
            {"all": [
                {"type": "VALUE_IN", "field": "a", "values": [1], "coerce": "int"},
                {"type": "VALUE_IN", "field": "b", "values": [2], "coerce": "int"}
            ]},
            {"type": "VALUE_IN", "field": "c", "values": [3], "coerce": "int"}
        ]});
        let compiled = compile(tree);

        let mut ctx = Context::new();
        ctx.set("a", 1);
        ctx.set("b", 2);
        assert!(compiled.evaluate(&ctx)); // (a&&b) || c -> true via a&&b

        let mut ctx2 = Context::new();
        ctx2.set("c", 3);
        assert!(compiled.evaluate(&ctx2)); // true via c

        let ctx3 = Context::new();
        assert!(!compiled.evaluate(&ctx3));
    }

    #[test]
    fn debug_trace_does_not_change_result() {
        let tree = json!({"all": [
            {"type": "VALUE_IN", "field": "a", "values": [1], "coerce": "int"}
        ]});
        let opts = CompileOptions { debug: true, capture_ctx_keys: true };
        let m = compile_predicate(&registry(), &tree, opts, "ROOT").unwrap();
        let mut ctx = Context::new();
        ctx.set("a", 1);
        assert!(m.evaluate(&ctx));
    }
}
