//! tree
//!
//! The command tree: declaration builders, built nodes, and the root table.
//!
//! # Architecture
//!
//! ```text
//! CategoryDecl/LeafDecl/ParamDecl --build--> Category/Leaf/Parameter
//!                                               |
//!                                  CommandTree (roots by name)
//! ```
//!
//! Several plugins may register roots under the same top-level name; the
//! tree keeps every registration and resolution decides between them per
//! invocation. A configurable cap bounds how many may share one name.
//!
//! # Invariants
//!
//! - Built nodes are immutable and shared by `Arc`; no locking during
//!   traversal.
//! - A rejected root never blocks its siblings.
//! - Registration order is preserved; it breaks resolution ties.

pub mod builder;
pub mod node;
pub mod param;

use std::collections::HashMap;

use std::sync::Arc;

pub use builder::{
    build_root, BuildError, BuildReport, CategoryDecl, FailedRoot, LeafDecl, NodeDecl, ParamDecl,
};
pub use node::{Category, Leaf, Node, NodeMeta};
pub use param::Parameter;

use crate::registry::HandlerRegistry;

/// All registered roots, grouped by lowercased primary name.
#[derive(Debug, Default)]
pub struct CommandTree {
    roots: Vec<Arc<Category>>,
    by_name: HashMap<String, Vec<usize>>,
}

impl CommandTree {
    /// Build every declared root, collecting failures per root.
    ///
    /// Roots are built in declaration order. A root whose subtree has any
    /// configuration error is rejected whole; one that would push a name
    /// group past `max_roots_per_name` is rejected with the cap error.
    pub fn build(
        decls: Vec<CategoryDecl>,
        registry: &HandlerRegistry,
        max_roots_per_name: usize,
    ) -> (Self, BuildReport) {
        let mut tree = Self::default();
        let mut report = BuildReport::default();

        for decl in decls {
            let declared = decl.declared_name().to_string();
            match build_root(decl, registry) {
                Ok(root) => {
                    let key = root.meta().name().to_lowercase();
                    let group = tree.by_name.entry(key).or_default();
                    if group.len() >= max_roots_per_name {
                        tracing::warn!(root = %declared, cap = max_roots_per_name,
                            "command root rejected, name group full");
                        report.failed.push(FailedRoot {
                            name: declared,
                            errors: vec![BuildError::RootCapExceeded {
                                name: root.meta().name().to_string(),
                                cap: max_roots_per_name,
                            }],
                        });
                        continue;
                    }
                    group.push(tree.roots.len());
                    tree.roots.push(root);
                    tracing::debug!(root = %declared, "command root built");
                    report.built.push(declared);
                }
                Err(errors) => {
                    tracing::warn!(root = %declared, errors = errors.len(),
                        "command root rejected");
                    report.failed.push(FailedRoot {
                        name: declared,
                        errors,
                    });
                }
            }
        }

        (tree, report)
    }

    /// Every usable root, in registration order.
    pub fn roots(&self) -> &[Arc<Category>] {
        &self.roots
    }

    /// Roots registered under one primary name, case-insensitive.
    pub fn roots_named<'a>(&'a self, name: &str) -> impl Iterator<Item = &'a Arc<Category>> {
        self.by_name
            .get(&name.to_lowercase())
            .into_iter()
            .flat_map(|indices| indices.iter().map(|&index| &self.roots[index]))
    }

    /// Number of usable roots.
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }
}
