//! PHP parsing support built on tree-sitter.
//!
//! Wraps `tree-sitter-php` parser construction and provides the small set
//! of grammar helpers the collector and detector share: reading node text,
//! finding reference modifiers (`&`) on declarations and parameters, and
//! counting return paths inside a callable body.
//!
//! tree-sitter always produces a tree, inserting ERROR nodes for malformed
//! regions, so a partially-parseable file never aborts analysis: the
//! visitors simply skip sub-expressions that do not match the shapes they
//! look for.

use std::path::Path;

use tree_sitter::{Node, Parser, Tree};

use crate::error::{RefScanError, Result};

/// Node kinds that introduce a callable scope.
///
/// `anonymous_function_creation_expression` is the pre-0.23 grammar name
/// for `anonymous_function`; both are accepted so the analyzer works
/// against either grammar generation.
pub const CALLABLE_KINDS: &[&str] = &[
    "function_definition",
    "method_declaration",
    "anonymous_function",
    "anonymous_function_creation_expression",
    "arrow_function",
];

/// Node kinds for parameter declarations inside `formal_parameters`.
pub const PARAMETER_KINDS: &[&str] = &[
    "simple_parameter",
    "variadic_parameter",
    "property_promotion_parameter",
];

/// Create a parser configured for PHP source files.
pub fn parser() -> Result<Parser> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_php::LANGUAGE_PHP.into())
        .map_err(|e| RefScanError::TreeSitter(e.to_string()))?;
    Ok(parser)
}

/// Parse a PHP source file into a tree.
///
/// Returns a `Parse` error only when tree-sitter yields no tree at all
/// (cancellation or timeout); syntactically broken input still parses
/// into a tree with ERROR nodes.
pub fn parse(source: &str, path: &Path) -> Result<Tree> {
    let mut parser = parser()?;
    parser.parse(source, None).ok_or_else(|| RefScanError::Parse {
        file: path.display().to_string(),
        message: "tree-sitter returned no tree".to_string(),
    })
}

/// Get the UTF-8 text of a node. Falls back to the empty string for
/// byte ranges that are not valid UTF-8 (which parsed PHP never produces).
#[inline]
pub fn node_text<'s>(node: Node, source: &'s [u8]) -> &'s str {
    node.utf8_text(source).unwrap_or("")
}

/// 1-indexed source line of a node's start.
#[inline]
pub fn start_line(node: Node) -> usize {
    node.start_position().row + 1
}

/// Whether `kind` introduces a callable scope.
#[inline]
pub fn is_callable_kind(kind: &str) -> bool {
    CALLABLE_KINDS.contains(&kind)
}

/// Check for a `&` reference modifier among a node's children, looking only
/// at children that start before `limit` (byte offset).
///
/// The limit keeps the check anchored to the declaration header: default
/// values and bodies may legitimately contain `&` tokens of their own.
fn has_reference_modifier_before(node: Node, limit: usize) -> bool {
    for i in 0..node.child_count() {
        let Some(child) = node.child(i) else { continue };
        if child.start_byte() >= limit {
            break;
        }
        if child.kind() == "reference_modifier" || child.kind() == "&" {
            return true;
        }
    }
    false
}

/// Whether a callable declaration node declares a by-reference return
/// (`function &f()`), detected as a `&` between the `function` keyword and
/// the declared name (or the parameter list, for anonymous functions).
pub fn declares_by_ref_return(decl: Node) -> bool {
    let limit = decl
        .child_by_field_name("name")
        .or_else(|| decl.child_by_field_name("parameters"))
        .map_or(decl.end_byte(), |n| n.start_byte());
    has_reference_modifier_before(decl, limit)
}

/// Whether a single parameter node binds by reference (`&$x` or `&...$xs`).
pub fn parameter_is_by_ref(param: Node) -> bool {
    let limit = param
        .child_by_field_name("name")
        .map_or(param.end_byte(), |n| n.start_byte());
    has_reference_modifier_before(param, limit)
}

/// Extract the ordered by-reference flags from a `formal_parameters` node.
///
/// One flag per declared parameter; a variadic-by-reference parameter flags
/// its single trailing slot, so the sequence stays positionally meaningful
/// for the variadic boundary.
pub fn parameter_ref_flags(params: Node) -> Vec<bool> {
    let mut flags = Vec::new();
    for i in 0..params.named_child_count() {
        let Some(child) = params.named_child(i) else { continue };
        if PARAMETER_KINDS.contains(&child.kind()) {
            flags.push(parameter_is_by_ref(child));
        }
    }
    flags
}

/// Count `return_statement` nodes inside a callable body, without
/// descending into nested callables (their returns belong to them).
pub fn count_return_points(body: Node) -> usize {
    let mut count = 0;
    for i in 0..body.named_child_count() {
        let Some(child) = body.named_child(i) else { continue };
        if child.kind() == "return_statement" {
            count += 1;
        }
        if !is_callable_kind(child.kind()) {
            count += count_return_points(child);
        }
    }
    count
}

/// Strip parenthesized wrappers: `($x = (f()))` resolves the same callee
/// as the bare call.
pub fn unwrap_parens(mut node: Node) -> Node {
    while node.kind() == "parenthesized_expression" {
        match node.named_child(0) {
            Some(inner) => node = inner,
            None => break,
        }
    }
    node
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn parse_source(src: &str) -> Tree {
        parse(src, &PathBuf::from("test.php")).unwrap()
    }

    fn find_kind<'t>(node: Node<'t>, kinds: &[&str]) -> Option<Node<'t>> {
        if kinds.contains(&node.kind()) {
            return Some(node);
        }
        for i in 0..node.child_count() {
            if let Some(found) = node.child(i).and_then(|c| find_kind(c, kinds)) {
                return Some(found);
            }
        }
        None
    }

    #[test]
    fn test_parse_valid_php() {
        let tree = parse_source("<?php function foo() {}");
        assert_eq!(tree.root_node().kind(), "program");
    }

    #[test]
    fn test_by_ref_return_detected() {
        let tree = parse_source("<?php function &foo() { return $x; }");
        let decl = find_kind(tree.root_node(), &["function_definition"]).unwrap();
        assert!(declares_by_ref_return(decl));
    }

    #[test]
    fn test_value_return_not_flagged() {
        let tree = parse_source("<?php function foo() { return 1; }");
        let decl = find_kind(tree.root_node(), &["function_definition"]).unwrap();
        assert!(!declares_by_ref_return(decl));
    }

    #[test]
    fn test_parameter_ref_flags() {
        let tree = parse_source("<?php function f($a, &$b, int $c = 1, &...$rest) {}");
        let params = find_kind(tree.root_node(), &["formal_parameters"]).unwrap();
        assert_eq!(parameter_ref_flags(params), vec![false, true, false, true]);
    }

    #[test]
    fn test_return_points_skip_nested_callables() {
        let src = r#"<?php
function outer() {
    $f = function () { return 1; };
    if ($a) { return $f; }
    return null;
}
"#;
        let tree = parse_source(src);
        let decl = find_kind(tree.root_node(), &["function_definition"]).unwrap();
        let body = decl.child_by_field_name("body").unwrap();
        assert_eq!(count_return_points(body), 2);
    }

    #[test]
    fn test_malformed_source_still_parses() {
        let tree = parse_source("<?php function broken( {{{");
        assert!(tree.root_node().has_error());
    }
}
