//! Pass-2 reference-assignment detector.
//!
//! Visits every assignment expression in a parsed file and warns when the
//! right-hand side is a call into a repository-known callee with reference
//! semantics (by-reference return or by-reference parameters) while the
//! assignment itself is a plain value copy. Reference assignments
//! (`$x = &f()`) are already correct and never warn.
//!
//! Callee resolution is purely syntactic. Dynamic call targets (`$fn(...)`,
//! `$obj->$m(...)`) and names absent from the repository are skipped
//! silently: insufficient information, not an error. The detector never
//! mutates the repository.
//!
//! # Scoring
//!
//! Static inspection cannot prove aliasing intent, so each warning carries
//! a probability in (0.0, [`MAX_CONFIDENCE`]] instead of a verdict:
//!
//! - start from [`BASE_CONFIDENCE`]
//! - callee does not return by reference (out-parameter pattern only):
//!   scale by its fraction of by-reference parameters
//! - callee body has more than one return path: × [`MULTI_RETURN_FACTOR`]
//! - target variable reassigned later in the same scope (the alias was
//!   likely not relied upon): × [`REASSIGNED_FACTOR`]
//! - ambiguous member-call resolution: × fraction of candidates that agree
//!   the call has reference semantics
//!
//! Every factor is in (0, 1], so the score is monotonic in each
//! uncertainty input and never exceeds the ceiling.

use std::path::Path;

use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::php;
use crate::repository::{CallableSignature, DeclarationRepository};
use crate::warning::Warning;

/// Hard ceiling below certainty: no warning ever reaches 1.0.
pub const MAX_CONFIDENCE: f64 = 0.9;
/// Starting confidence for a resolved reference-semantics callee.
pub const BASE_CONFIDENCE: f64 = 0.85;
/// Penalty when the callee body has more than one return path.
pub const MULTI_RETURN_FACTOR: f64 = 0.8;
/// Penalty when the assignment target is reassigned later in its scope.
pub const REASSIGNED_FACTOR: f64 = 0.6;

/// Call-expression node kinds eligible as assignment sources.
const CALL_KINDS: &[&str] = &[
    "function_call_expression",
    "member_call_expression",
    "nullsafe_member_call_expression",
    "scoped_call_expression",
];

/// Detect all non-reference assignments from reference-semantics calls in
/// one parsed file. Appends nothing but warnings; the repository is only
/// read.
#[must_use]
pub fn detect_file(
    tree: &Tree,
    source: &[u8],
    file: &Path,
    repository: &DeclarationRepository,
) -> Vec<Warning> {
    let mut warnings = Vec::new();
    let root = tree.root_node();
    visit(root, source, file, None, root, repository, &mut warnings);
    warnings
}

/// Outcome of syntactic callee resolution.
enum ResolvedCallee<'r> {
    /// Unique repository entry (free function or `Class::method`).
    Exact(&'r CallableSignature),
    /// Receiver-unknown member call: all candidate class methods.
    Candidates(Vec<&'r CallableSignature>),
}

fn visit<'t>(
    node: Node<'t>,
    source: &[u8],
    file: &Path,
    class: Option<&str>,
    scope: Node<'t>,
    repository: &DeclarationRepository,
    warnings: &mut Vec<Warning>,
) {
    let kind = node.kind();

    if kind == "assignment_expression" {
        check_assignment(node, source, file, class, scope, repository, warnings);
        // Fall through: the right-hand side may nest further assignments.
    }

    // Anonymous classes resolve `self::`/`static::` against their own
    // synthetic scope, matching how collection registers their methods.
    // Constructor arguments stay in the enclosing context.
    if kind == "anonymous_class" || kind == "object_creation_expression" {
        let anon_class = format!(
            "{{anonymous-class}}@{}:{}",
            file.display(),
            php::start_line(node)
        );
        for i in 0..node.named_child_count() {
            let Some(child) = node.named_child(i) else { continue };
            let context = if child.kind() == "declaration_list" {
                Some(anon_class.as_str())
            } else {
                class
            };
            visit(child, source, file, context, scope, repository, warnings);
        }
        return;
    }

    // Class-like bodies change the context `self::`/`static::` resolves to.
    let class_name;
    let class = if matches!(
        kind,
        "class_declaration" | "interface_declaration" | "trait_declaration" | "enum_declaration"
    ) {
        class_name = node
            .child_by_field_name("name")
            .map(|n| php::node_text(n, source).to_string());
        class_name.as_deref()
    } else {
        class
    };

    // Callable bodies open a new reassignment scope.
    let scope = if php::is_callable_kind(kind) {
        node.child_by_field_name("body").unwrap_or(scope)
    } else {
        scope
    };

    for i in 0..node.named_child_count() {
        if let Some(child) = node.named_child(i) {
            visit(child, source, file, class, scope, repository, warnings);
        }
    }
}

fn check_assignment<'t>(
    node: Node<'t>,
    source: &[u8],
    file: &Path,
    class: Option<&str>,
    scope: Node<'t>,
    repository: &DeclarationRepository,
    warnings: &mut Vec<Warning>,
) {
    let Some(right) = node.child_by_field_name("right") else {
        return;
    };
    let right = php::unwrap_parens(right);
    if !CALL_KINDS.contains(&right.kind()) {
        return;
    }

    let Some(resolved) = resolve_callee(right, source, class, repository) else {
        debug!(
            file = %file.display(),
            line = php::start_line(node),
            "callee not statically resolvable or not registered, skipping"
        );
        return;
    };

    let agreement;
    let call_score = match &resolved {
        ResolvedCallee::Exact(signature) => {
            if !signature.has_reference_semantics() {
                return;
            }
            agreement = 1.0;
            signature_score(signature)
        }
        ResolvedCallee::Candidates(candidates) => {
            let with_ref: Vec<_> = candidates
                .iter()
                .filter(|s| s.has_reference_semantics())
                .collect();
            if with_ref.is_empty() {
                return;
            }
            agreement = with_ref.len() as f64 / candidates.len() as f64;
            with_ref
                .iter()
                .map(|s| signature_score(s))
                .fold(0.0_f64, f64::max)
        }
    };

    let mut probability = call_score * agreement;
    if let Some(target) = assignment_target(node, source) {
        if reassigned_later(scope, source, target, node.end_byte()) {
            probability *= REASSIGNED_FACTOR;
        }
    }
    let probability = probability.min(MAX_CONFIDENCE);
    if probability <= 0.0 {
        return;
    }

    warnings.push(Warning::new(
        file.display().to_string(),
        php::start_line(node),
        probability,
    ));
}

/// Score one signature before agreement and reassignment adjustments.
fn signature_score(signature: &CallableSignature) -> f64 {
    let mut score = BASE_CONFIDENCE;
    if !signature.returns_by_ref {
        score *= signature.ref_param_fraction();
    }
    if signature.return_points > 1 {
        score *= MULTI_RETURN_FACTOR;
    }
    score
}

/// Resolve the callee of a call expression against the repository.
///
/// Returns `None` for dynamic targets, `parent::` calls, and names the
/// repository has never seen.
fn resolve_callee<'r>(
    call: Node,
    source: &[u8],
    class: Option<&str>,
    repository: &'r DeclarationRepository,
) -> Option<ResolvedCallee<'r>> {
    match call.kind() {
        "function_call_expression" => {
            let callee = php::unwrap_parens(call.child_by_field_name("function")?);
            let name = match callee.kind() {
                "name" => php::node_text(callee, source),
                // Name-based matching: `\Ns\f()` resolves by its final
                // path component.
                "qualified_name" => php::node_text(callee, source)
                    .rsplit('\\')
                    .next()
                    .unwrap_or_default(),
                _ => return None,
            };
            repository.lookup(name).map(ResolvedCallee::Exact)
        }
        "scoped_call_expression" => {
            let method = call.child_by_field_name("name")?;
            if method.kind() != "name" {
                return None;
            }
            let scope_node = call.child_by_field_name("scope")?;
            let class_name = match scope_node.kind() {
                "name" => php::node_text(scope_node, source),
                "qualified_name" => php::node_text(scope_node, source)
                    .rsplit('\\')
                    .next()
                    .unwrap_or_default(),
                "relative_scope" => match php::node_text(scope_node, source) {
                    "self" | "static" => class?,
                    // `parent::` needs inheritance resolution, which
                    // name-based lookup does not attempt.
                    _ => return None,
                },
                _ => return None,
            };
            let qualified = format!("{class_name}::{}", php::node_text(method, source));
            repository.lookup(&qualified).map(ResolvedCallee::Exact)
        }
        "member_call_expression" | "nullsafe_member_call_expression" => {
            let method = call.child_by_field_name("name")?;
            if method.kind() != "name" {
                return None;
            }
            let candidates = repository.method_candidates(php::node_text(method, source));
            if candidates.is_empty() {
                None
            } else {
                Some(ResolvedCallee::Candidates(candidates))
            }
        }
        _ => None,
    }
}

/// The assignment target variable text (`$y`), when the target is a plain
/// variable. Compound targets (array slots, properties) skip the
/// reassignment heuristic.
fn assignment_target<'s>(node: Node, source: &'s [u8]) -> Option<&'s str> {
    let left = node.child_by_field_name("left")?;
    (left.kind() == "variable_name").then(|| php::node_text(left, source))
}

/// Whether `target` is assigned again after byte offset `after` within
/// `scope`. Nested callables are separate scopes and are not searched.
fn reassigned_later(scope: Node, source: &[u8], target: &str, after: usize) -> bool {
    for i in 0..scope.named_child_count() {
        let Some(child) = scope.named_child(i) else {
            continue;
        };
        if php::is_callable_kind(child.kind()) {
            continue;
        }
        if matches!(
            child.kind(),
            "assignment_expression" | "reference_assignment_expression"
        ) && child.start_byte() > after
        {
            if let Some(left) = child.child_by_field_name("left") {
                if left.kind() == "variable_name" && php::node_text(left, source) == target {
                    return true;
                }
            }
        }
        if reassigned_later(child, source, target, after) {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector;
    use std::path::PathBuf;

    const EPSILON: f64 = 1e-9;

    /// Collect declarations and run detection over a single source text.
    fn run(src: &str) -> Vec<Warning> {
        let path = PathBuf::from("test.php");
        let tree = php::parse(src, &path).unwrap();
        let repository = collector::collect_file(&tree, src.as_bytes(), &path).seal();
        detect_file(&tree, src.as_bytes(), &path, &repository)
    }

    #[test]
    fn test_out_parameter_call_warns() {
        let src = r#"<?php
function fetchRef(&$x) { return $x; }
$y = fetchRef($input);
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 3);
        assert!(warnings[0].probability > 0.0);
        assert!((warnings[0].probability - BASE_CONFIDENCE).abs() < EPSILON);
    }

    #[test]
    fn test_reference_assignment_never_warns() {
        let src = r#"<?php
function fetchRef(&$x) { return $x; }
$y = &fetchRef($input);
"#;
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_dynamic_callee_skipped() {
        let src = r#"<?php
function fetchRef(&$x) { return $x; }
$fn = 'fetchRef';
$y = $fn($input);
"#;
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_unregistered_callee_skipped() {
        let src = "<?php $y = mysteryCall($input);";
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_non_call_rhs_skipped() {
        let src = r#"<?php
function fetchRef(&$x) { return $x; }
$y = $input;
$z = 42;
"#;
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_by_ref_return_full_base_confidence() {
        let src = r#"<?php
function &head($items) { return $items[0]; }
$first = head($list);
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        assert!((warnings[0].probability - BASE_CONFIDENCE).abs() < EPSILON);
    }

    #[test]
    fn test_multiple_return_paths_lower_confidence() {
        let src = r#"<?php
function &pick($a, $b) {
    if ($a) { return $a; }
    return $b;
}
$v = pick($x, $y);
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        let expected = BASE_CONFIDENCE * MULTI_RETURN_FACTOR;
        assert!((warnings[0].probability - expected).abs() < EPSILON);
        assert!(warnings[0].probability < 1.0);
    }

    #[test]
    fn test_partial_ref_params_scale_confidence() {
        let src = r#"<?php
function mixed($a, &$b) { return $a; }
$v = mixed($x, $y);
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        let expected = BASE_CONFIDENCE * 0.5;
        assert!((warnings[0].probability - expected).abs() < EPSILON);
    }

    #[test]
    fn test_reassignment_after_alias_lowers_confidence() {
        let src = r#"<?php
function fetchRef(&$x) { return $x; }
$y = fetchRef($input);
$y = 0;
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        let expected = BASE_CONFIDENCE * REASSIGNED_FACTOR;
        assert!((warnings[0].probability - expected).abs() < EPSILON);
    }

    #[test]
    fn test_reassignment_in_nested_closure_does_not_count() {
        let src = r#"<?php
function fetchRef(&$x) { return $x; }
$y = fetchRef($input);
$g = function () { $y = 0; };
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        assert!((warnings[0].probability - BASE_CONFIDENCE).abs() < EPSILON);
    }

    #[test]
    fn test_static_call_resolved_by_class() {
        let src = r#"<?php
class Registry {
    public static function &instance() { return self::$inst; }
}
$r = Registry::instance();
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 5);
    }

    #[test]
    fn test_self_call_uses_enclosing_class() {
        let src = r#"<?php
class Registry {
    public static function &instance() { return self::$inst; }
    public function grab() {
        $r = self::instance();
        return $r;
    }
}
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 5);
    }

    #[test]
    fn test_self_call_in_anonymous_class_uses_its_own_scope() {
        let src = r#"<?php
class Outer {
    public static function &grab() { return self::$inst; }
    public function run() {
        $h = new class {
            public static function &make() { return self::$m; }
            public function go() {
                $a = self::make();
                $b = self::grab();
            }
        };
    }
}
"#;
        let warnings = run(src);
        // `self::make()` resolves inside the anonymous class; `self::grab()`
        // must not reach the enclosing named class.
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].line, 8);
    }

    #[test]
    fn test_member_call_single_candidate() {
        let src = r#"<?php
class Cache {
    public function &entry($key) { return $this->data[$key]; }
}
$e = $cache->entry('a');
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        assert!((warnings[0].probability - BASE_CONFIDENCE).abs() < EPSILON);
    }

    #[test]
    fn test_member_call_disagreeing_candidates_scale_down() {
        let src = r#"<?php
class Cache {
    public function &entry($key) { return $this->data[$key]; }
}
class Copy {
    public function entry($key) { return $this->data[$key]; }
}
$e = $thing->entry('a');
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 1);
        let expected = BASE_CONFIDENCE * 0.5;
        assert!((warnings[0].probability - expected).abs() < EPSILON);
    }

    #[test]
    fn test_member_call_no_ref_candidates_skipped() {
        let src = r#"<?php
class Copy {
    public function entry($key) { return $this->data[$key]; }
}
$e = $thing->entry('a');
"#;
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_value_only_function_never_warns() {
        let src = r#"<?php
function plain($a) { return $a; }
$v = plain($x);
"#;
        assert!(run(src).is_empty());
    }

    #[test]
    fn test_probability_bounds() {
        let src = r#"<?php
function &alpha() { return $a; }
function beta(&$b) {}
function &gamma($c) { if ($c) { return $c; } return $d; }
$x = alpha();
$y = beta($v);
$z = gamma($w);
"#;
        let warnings = run(src);
        assert_eq!(warnings.len(), 3);
        for warning in &warnings {
            assert!(warning.probability > 0.0);
            assert!(warning.probability <= MAX_CONFIDENCE);
            assert!(warning.probability < 1.0);
        }
    }

    #[test]
    fn test_parenthesized_call_still_detected() {
        let src = r#"<?php
function &head($items) { return $items[0]; }
$first = (head($list));
"#;
        assert_eq!(run(src).len(), 1);
    }

    #[test]
    fn test_malformed_region_does_not_abort_file() {
        let src = r#"<?php
function fetchRef(&$x) { return $x; }
$broken = (((;
$y = fetchRef($input);
"#;
        let warnings = run(src);
        assert!(warnings.iter().any(|w| w.line == 4));
    }
}
