//! Pass-1 declaration collector.
//!
//! Walks a parsed file once and registers a [`CallableSignature`] for every
//! declaration that introduces a callable: free functions, class methods,
//! closures and arrow functions. Class context for method qualification is
//! carried through the recursion arguments, so sibling closures and
//! anonymous classes can never observe each other's context.

use std::path::Path;

use tree_sitter::{Node, Tree};

use crate::php;
use crate::repository::{CallableSignature, RepositoryBuilder};

/// Node kinds whose bodies form a class-like declaration scope.
const CLASS_LIKE_KINDS: &[&str] = &[
    "class_declaration",
    "interface_declaration",
    "trait_declaration",
    "enum_declaration",
];

/// Collect every callable declaration in a parsed file into a fresh
/// builder. The caller merges per-file builders into the run-wide one.
#[must_use]
pub fn collect_file(tree: &Tree, source: &[u8], file: &Path) -> RepositoryBuilder {
    let mut builder = RepositoryBuilder::new();
    visit(tree.root_node(), source, file, None, &mut builder);
    builder
}

/// Build a signature from a declaration node given its qualified name.
fn signature_for(decl: Node, qualified_name: String) -> CallableSignature {
    let param_ref_flags = decl
        .child_by_field_name("parameters")
        .map(php::parameter_ref_flags)
        .unwrap_or_default();
    let return_points = if decl.kind() == "arrow_function" {
        // Arrow functions have exactly one implicit return path.
        1
    } else {
        match decl.child_by_field_name("body") {
            Some(body) => php::count_return_points(body),
            // Abstract and interface methods carry no body.
            None => 0,
        }
    };
    CallableSignature {
        qualified_name,
        param_ref_flags,
        returns_by_ref: php::declares_by_ref_return(decl),
        return_points,
    }
}

fn visit(node: Node, source: &[u8], file: &Path, class: Option<&str>, builder: &mut RepositoryBuilder) {
    let kind = node.kind();

    if CLASS_LIKE_KINDS.contains(&kind) {
        let class_name = node
            .child_by_field_name("name")
            .map(|n| php::node_text(n, source).to_string());
        if let Some(body) = node.child_by_field_name("body") {
            visit(body, source, file, class_name.as_deref(), builder);
        }
        return;
    }

    // Anonymous classes (`new class { ... }`) get a synthetic lexical scope
    // instead of inheriting the enclosing class context. The grammar wraps
    // the body in an `anonymous_class` node under the creation expression;
    // older generations hang the `declaration_list` off the creation
    // expression directly, so both shapes are handled.
    if kind == "anonymous_class" || kind == "object_creation_expression" {
        let anon_class = format!(
            "{{anonymous-class}}@{}:{}",
            file.display(),
            php::start_line(node)
        );
        for i in 0..node.named_child_count() {
            let Some(child) = node.named_child(i) else { continue };
            if child.kind() == "declaration_list" {
                visit(child, source, file, Some(&anon_class), builder);
            } else {
                visit(child, source, file, class, builder);
            }
        }
        return;
    }

    match kind {
        "function_definition" => {
            if let Some(name) = node.child_by_field_name("name") {
                let name = php::node_text(name, source).to_string();
                builder.register(signature_for(node, name));
            }
            if let Some(body) = node.child_by_field_name("body") {
                // Named functions open a non-class scope, even when
                // (conditionally) declared inside a method.
                visit(body, source, file, None, builder);
            }
        }
        "method_declaration" => {
            if let Some(name) = node.child_by_field_name("name") {
                let method = php::node_text(name, source);
                let qualified = match class {
                    Some(class_name) => format!("{class_name}::{method}"),
                    None => method.to_string(),
                };
                builder.register(signature_for(node, qualified));
            }
            if let Some(body) = node.child_by_field_name("body") {
                visit(body, source, file, class, builder);
            }
        }
        "anonymous_function" | "anonymous_function_creation_expression" | "arrow_function" => {
            let qualified = format!("{{closure}}@{}:{}", file.display(), php::start_line(node));
            builder.register(signature_for(node, qualified));
            if let Some(body) = node.child_by_field_name("body") {
                visit(body, source, file, class, builder);
            }
        }
        _ => {
            for i in 0..node.named_child_count() {
                if let Some(child) = node.named_child(i) {
                    visit(child, source, file, class, builder);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::DeclarationRepository;
    use std::path::PathBuf;

    fn collect(src: &str) -> DeclarationRepository {
        let path = PathBuf::from("test.php");
        let tree = php::parse(src, &path).unwrap();
        collect_file(&tree, src.as_bytes(), &path).seal()
    }

    #[test]
    fn test_free_function() {
        let repo = collect("<?php function fetchRef(&$x) { return $x; }");
        let sig = repo.lookup("fetchRef").unwrap();
        assert_eq!(sig.param_ref_flags, vec![true]);
        assert!(!sig.returns_by_ref);
        assert_eq!(sig.return_points, 1);
    }

    #[test]
    fn test_by_ref_return_function() {
        let repo = collect("<?php function &current($arr) { return $arr[0]; }");
        let sig = repo.lookup("current").unwrap();
        assert!(sig.returns_by_ref);
        assert_eq!(sig.param_ref_flags, vec![false]);
    }

    #[test]
    fn test_method_qualified_by_class() {
        let src = r#"<?php
class Registry {
    public function &instance() { return self::$instance; }
    private function helper($a, &$b) {}
}
"#;
        let repo = collect(src);
        assert!(repo.lookup("Registry::instance").unwrap().returns_by_ref);
        assert_eq!(
            repo.lookup("Registry::helper").unwrap().param_ref_flags,
            vec![false, true]
        );
        // Methods are not registered under their bare names.
        assert!(repo.lookup("instance").is_none());
    }

    #[test]
    fn test_defaults_and_variadics_keep_positions() {
        let repo = collect("<?php function f($a = 1, &$b, string $c = 'x', &...$rest) {}");
        let sig = repo.lookup("f").unwrap();
        assert_eq!(sig.param_ref_flags, vec![false, true, false, true]);
    }

    #[test]
    fn test_closures_registered_per_site() {
        let src = r#"<?php
$a = function (&$x) { return $x; };
$b = fn(&$y) => $y;
"#;
        let repo = collect(src);
        // Two closure declarations, a named lookup never resolves to them.
        assert_eq!(repo.len(), 2);
        assert!(repo.lookup("{closure}@test.php:2").is_some());
        assert!(repo.lookup("{closure}@test.php:3").is_some());
    }

    #[test]
    fn test_sibling_closures_no_class_leakage() {
        let src = r#"<?php
class Outer {
    public function run() {
        $make = function () {
            return new class {
                public function &inner() { return $this->v; }
            };
        };
    }
}
"#;
        let repo = collect(src);
        assert!(repo.lookup("Outer::run").is_some());
        // The anonymous class method is not attributed to Outer.
        assert!(repo.lookup("Outer::inner").is_none());
        assert!(repo
            .method_candidates("inner")
            .iter()
            .any(|s| s.returns_by_ref));
    }

    #[test]
    fn test_anonymous_class_methods_use_synthetic_scope() {
        let src = r#"<?php
$o = new class {
    public function &get() { return $this->v; }
};
"#;
        let repo = collect(src);
        let sig = repo
            .lookup("{anonymous-class}@test.php:2::get")
            .expect("method registered under the synthetic scope");
        assert!(sig.returns_by_ref);
    }

    #[test]
    fn test_duplicate_definitions_overwrite() {
        let src = r#"<?php
function f($a) {}
function f(&$a) {}
"#;
        let repo = collect(src);
        assert_eq!(repo.lookup("f").unwrap().param_ref_flags, vec![true]);
    }

    #[test]
    fn test_abstract_method_has_no_return_points() {
        let src = r#"<?php
interface Loader {
    public function &load($key);
}
"#;
        let repo = collect(src);
        let sig = repo.lookup("Loader::load").unwrap();
        assert!(sig.returns_by_ref);
        assert_eq!(sig.return_points, 0);
    }
}
