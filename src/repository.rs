//! Declaration repository: the per-run store of callable signatures.
//!
//! Two-phase by construction: a mutable [`RepositoryBuilder`] is populated
//! during pass 1 (collection), then sealed into a read-only
//! [`DeclarationRepository`] that pass 2 (detection) queries. Sealing builds
//! a secondary index from bare method names to their declaring classes,
//! which the detector uses for `$obj->m()` calls where the receiver type
//! is unknown statically.
//!
//! Lookup is name-based, not type-resolved, so inherited or dynamically
//! dispatched names can go unresolved.

use rustc_hash::FxHashMap;

/// The reference-binding shape of a declared function, method or closure.
///
/// Created once when the collector visits a declaration node; immutable
/// thereafter; owned exclusively by the repository. Re-declaration of the
/// same qualified name overwrites the earlier entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallableSignature {
    /// Unique key: function name, or `Class::method` for methods, or a
    /// synthetic `{closure}@file:line` for anonymous functions.
    pub qualified_name: String,
    /// Ordered by-reference flags, one per declared parameter. A variadic
    /// by-reference parameter contributes the single trailing slot.
    pub param_ref_flags: Vec<bool>,
    /// Whether the callable declares a by-reference return (`function &f()`).
    pub returns_by_ref: bool,
    /// Number of return statements in the callable body (nested callables
    /// excluded). Feeds the detector's uncertainty scoring.
    pub return_points: usize,
}

impl CallableSignature {
    /// Whether calling this signature can hand back or mutate data by
    /// reference: a by-reference return or at least one by-reference
    /// parameter.
    #[must_use]
    pub fn has_reference_semantics(&self) -> bool {
        self.returns_by_ref || self.param_ref_flags.iter().any(|&f| f)
    }

    /// Fraction of parameters bound by reference, in [0.0, 1.0].
    ///
    /// A parameterless signature counts as 0.0; by-reference returns are
    /// scored separately by the detector.
    #[must_use]
    pub fn ref_param_fraction(&self) -> f64 {
        if self.param_ref_flags.is_empty() {
            return 0.0;
        }
        let by_ref = self.param_ref_flags.iter().filter(|&&f| f).count();
        by_ref as f64 / self.param_ref_flags.len() as f64
    }
}

/// Mutable pass-1 repository. Write-only from the orchestrator's point of
/// view; [`seal`](RepositoryBuilder::seal) freezes it for pass 2.
#[derive(Debug, Default)]
pub struct RepositoryBuilder {
    signatures: FxHashMap<String, CallableSignature>,
}

impl RepositoryBuilder {
    /// Create an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or overwrite the signature for its qualified name.
    /// Always succeeds; duplicate definitions across files overwrite
    /// rather than duplicate.
    pub fn register(&mut self, signature: CallableSignature) {
        self.signatures
            .insert(signature.qualified_name.clone(), signature);
    }

    /// Merge another builder's signatures into this one (rayon reduce step
    /// for parallel pass 1). Later registrations win, matching `register`.
    #[must_use]
    pub fn merge(mut self, other: Self) -> Self {
        self.signatures.extend(other.signatures);
        self
    }

    /// Number of registered signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether no signatures have been registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }

    /// Freeze the builder into the read-only repository handed to pass 2,
    /// building the bare-method-name index as part of the transition.
    #[must_use]
    pub fn seal(self) -> DeclarationRepository {
        let mut methods_by_name: FxHashMap<String, Vec<String>> = FxHashMap::default();
        for qualified in self.signatures.keys() {
            if let Some((_, method)) = qualified.split_once("::") {
                methods_by_name
                    .entry(method.to_string())
                    .or_default()
                    .push(qualified.clone());
            }
        }
        // Deterministic candidate order regardless of hash-map iteration.
        for candidates in methods_by_name.values_mut() {
            candidates.sort_unstable();
        }
        DeclarationRepository {
            signatures: self.signatures,
            methods_by_name,
        }
    }
}

/// Read-only repository consulted during pass 2. Discarded at end of run.
#[derive(Debug)]
pub struct DeclarationRepository {
    signatures: FxHashMap<String, CallableSignature>,
    /// Bare method name -> qualified `Class::method` names declaring it.
    methods_by_name: FxHashMap<String, Vec<String>>,
}

impl DeclarationRepository {
    /// Pure query: the signature registered under `qualified_name`, if any.
    #[must_use]
    pub fn lookup(&self, qualified_name: &str) -> Option<&CallableSignature> {
        self.signatures.get(qualified_name)
    }

    /// All class methods declared under the bare name `method`, in
    /// deterministic (sorted) order. Used for receiver-unknown member
    /// calls (`$obj->m()`).
    #[must_use]
    pub fn method_candidates(&self, method: &str) -> Vec<&CallableSignature> {
        self.methods_by_name
            .get(method)
            .map(|names| {
                names
                    .iter()
                    .filter_map(|name| self.signatures.get(name))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Number of registered signatures.
    #[must_use]
    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    /// Whether the repository is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}
