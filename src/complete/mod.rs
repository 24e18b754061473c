//! complete
//!
//! Suggestion generation, reusing the resolution machinery without
//! committing to anything.
//!
//! # Design
//!
//! The trailing token is the word being completed; everything before it
//! walks the tree exactly as resolution would, with the same caller
//! gating. A walk that ends at a category suggests visible child names,
//! ranked by the matcher. A walk that reaches a leaf probes the typed
//! argument tokens to find parameters still open, then suggests
//! `name=value` pairs from live handler possibilities, falling back to
//! the parameter's cached example literals.
//!
//! # Invariants
//!
//! - Completion never parses for keeps: no prompts, no defaults, no
//!   context derivation, no report.
//! - A caller is never shown a name it could not resolve.
//! - Suggestions are deduplicated, first occurrence wins.

use std::collections::HashSet;
use std::sync::Arc;

use crate::bind::Binder;
use crate::caller::Caller;
use crate::matcher::{self, Descent, MatchTier};
use crate::tree::{Category, Leaf, Parameter};

/// Generates next-token suggestions.
pub struct Completer<'a> {
    binder: Binder<'a>,
}

impl<'a> Completer<'a> {
    pub fn new(binder: Binder<'a>) -> Self {
        Self { binder }
    }

    /// Suggestions for the trailing token, merged across one same-named
    /// root group in registration order.
    pub fn suggest(
        &self,
        roots: &[Arc<Category>],
        tokens: &[String],
        caller: &dyn Caller,
    ) -> Vec<String> {
        let (partial, nav) = match tokens.split_last() {
            Some((partial, nav)) => (partial.as_str(), nav),
            None => ("", &[][..]),
        };

        let mut seen = HashSet::new();
        let mut out = Vec::new();
        for root in roots {
            for suggestion in self.suggest_one(root, nav, partial, caller) {
                if seen.insert(suggestion.clone()) {
                    out.push(suggestion);
                }
            }
        }
        out
    }

    fn suggest_one(
        &self,
        root: &Arc<Category>,
        nav: &[String],
        partial: &str,
        caller: &dyn Caller,
    ) -> Vec<String> {
        match matcher::descend(root, nav, caller) {
            Descent::Category { category } => child_names(&category, partial, caller),
            Descent::Leaf { leaf, rest } => self.param_pairs(&leaf, &rest, partial),
            Descent::Dead { .. } => Vec::new(),
        }
    }

    /// `name=value` pairs for the parameters the typed tokens leave open.
    fn param_pairs(&self, leaf: &Arc<Leaf>, rest: &[String], partial: &str) -> Vec<String> {
        let taken = self.binder.probe(leaf, rest);
        let (key_part, value_prefix) = match partial.split_once('=') {
            Some((key, value)) => (key, value),
            None => (partial, ""),
        };

        let mut out = Vec::new();
        for &pi in leaf.sort_order() {
            if taken[pi] {
                continue;
            }
            let param = &leaf.params()[pi];
            if matcher::name_tier(param.all_names(), key_part) == MatchTier::Rejected {
                continue;
            }
            for value in matching_values(param, value_prefix) {
                out.push(format!("{}={}", param.name(), value));
            }
        }
        out
    }
}

/// Visible children ranked by tier, declaration order within a tier.
fn child_names(category: &Arc<Category>, partial: &str, caller: &dyn Caller) -> Vec<String> {
    let mut ranked: Vec<(MatchTier, &str)> = Vec::new();
    for child in category.children() {
        let tier = matcher::match_node(child.meta(), caller, partial);
        if tier > MatchTier::Rejected {
            ranked.push((tier, child.meta().name()));
        }
    }
    // Stable sort keeps declaration order inside a tier.
    ranked.sort_by(|a, b| b.0.cmp(&a.0));
    ranked.into_iter().map(|(_, name)| name.to_string()).collect()
}

/// Live possibilities first, cached examples as the fallback.
///
/// An enumerable type whose possibilities all miss the prefix suggests
/// nothing; examples would not parse back anyway.
fn matching_values(param: &Parameter, prefix: &str) -> Vec<String> {
    let matches = param.handler().possibilities_matching(prefix);
    if !matches.is_empty() {
        return matches;
    }
    if param.handler().possibilities().is_some() {
        return Vec::new();
    }

    let prefix = prefix.to_lowercase();
    param
        .examples()
        .iter()
        .filter(|example| example.to_lowercase().starts_with(&prefix))
        .cloned()
        .collect()
}
