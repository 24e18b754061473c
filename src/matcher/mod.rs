//! matcher
//!
//! Tiered fuzzy matching and tree descent.
//!
//! # Design
//!
//! One predicate, [`match_node`], serves both command resolution and
//! completion ranking. It answers with a [`MatchTier`]:
//!
//! - `Exact` for a case-insensitive name hit, or for an empty token at a
//!   node (empty means "stop here")
//! - `NameInToken` when some node name is a substring of the token
//! - `TokenInName` when the token is a substring of some node name
//! - `Rejected` when the names share nothing, or before any name is even
//!   looked at, when the node's origin restriction excludes the caller or
//!   the caller lacks the node's permission
//!
//! Descent consumes one token per category level, picking the first
//! declared child at the highest tier present. What the caller cannot see
//! never matches, so an unprivileged caller cannot probe hidden commands
//! on substring tiers.

use std::sync::Arc;

use crate::caller::Caller;
use crate::tree::{Category, Leaf, Node, NodeMeta};

/// Match quality, strongest last so `Ord` agrees with preference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum MatchTier {
    /// Gated out or no name relation.
    Rejected,
    /// Token is a substring of some name.
    TokenInName,
    /// Some name is a substring of the token.
    NameInToken,
    /// Case-insensitive equality, or an empty token.
    Exact,
}

/// Rank a token against one node for this caller.
pub fn match_node(meta: &NodeMeta, caller: &dyn Caller, token: &str) -> MatchTier {
    if !meta.origin().allows(caller.origin()) {
        return MatchTier::Rejected;
    }
    if let Some(permission) = meta.permission() {
        if !caller.has_permission(permission) {
            return MatchTier::Rejected;
        }
    }
    name_tier(meta.all_names(), token)
}

/// Rank a token against a bare name list, no gating.
///
/// Completion reuses this for parameter names, which carry no origin or
/// permission restrictions of their own.
pub fn name_tier(names: &[String], token: &str) -> MatchTier {
    if token.is_empty() {
        return MatchTier::Exact;
    }

    let token = token.to_lowercase();
    let mut best = MatchTier::Rejected;
    for name in names {
        let name = name.to_lowercase();
        let tier = if name == token {
            MatchTier::Exact
        } else if name.contains(&token) {
            MatchTier::TokenInName
        } else if token.contains(&name) {
            MatchTier::NameInToken
        } else {
            MatchTier::Rejected
        };
        if tier > best {
            best = tier;
            if best == MatchTier::Exact {
                break;
            }
        }
    }
    best
}

/// Where a walk down one root ended.
#[derive(Debug)]
pub enum Descent {
    /// Reached a leaf; the tokens after its name are the argument tokens.
    Leaf { leaf: Arc<Leaf>, rest: Vec<String> },
    /// Ran out of tokens at a category.
    Category { category: Arc<Category> },
    /// A token matched no admissible child of `category`.
    Dead {
        category: Arc<Category>,
        token: String,
    },
}

/// Walk a root with the given tokens on behalf of a caller.
pub fn descend(root: &Arc<Category>, tokens: &[String], caller: &dyn Caller) -> Descent {
    let mut current = Arc::clone(root);
    let mut index = 0;

    loop {
        let Some(token) = tokens.get(index) else {
            return Descent::Category { category: current };
        };

        let mut best: Option<(MatchTier, &Node)> = None;
        for child in current.children() {
            let tier = match_node(child.meta(), caller, token);
            if tier == MatchTier::Rejected {
                continue;
            }
            // Strict comparison keeps the first declared child on ties.
            if best.map_or(true, |(held, _)| tier > held) {
                best = Some((tier, child));
            }
        }

        match best {
            None => {
                return Descent::Dead {
                    category: current,
                    token: token.clone(),
                };
            }
            Some((_, Node::Leaf(leaf))) => {
                return Descent::Leaf {
                    leaf: Arc::clone(leaf),
                    rest: tokens[index + 1..].to_vec(),
                };
            }
            Some((_, Node::Category(category))) => {
                let next = Arc::clone(category);
                current = next;
                index += 1;
            }
        }
    }
}
