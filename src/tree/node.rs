//! tree::node
//!
//! Built tree nodes.
//!
//! Nodes are constructed eagerly by the tree builder and never mutated
//! afterwards, so the whole tree is shared by `Arc` across invocation
//! workers without locks. Permission, origin, and synchrony are stored in
//! their effective form: permission and origin fall back to the nearest
//! ancestor's value when undeclared, and a node is synchronous when it or
//! any ancestor declared itself synchronous.

use std::fmt;
use std::sync::Arc;

use crate::caller::OriginFilter;
use crate::dispatch::HandlerFn;

use super::param::Parameter;

/// Metadata shared by categories and leaves.
#[derive(Debug, Clone)]
pub struct NodeMeta {
    names: Vec<String>,
    description: Option<String>,
    permission: Option<String>,
    origin: OriginFilter,
    sync: bool,
    path: String,
}

impl NodeMeta {
    pub(crate) fn new(
        names: Vec<String>,
        description: Option<String>,
        permission: Option<String>,
        origin: OriginFilter,
        sync: bool,
        path: String,
    ) -> Self {
        Self {
            names,
            description,
            permission,
            origin,
            sync,
            path,
        }
    }

    /// Primary name.
    pub fn name(&self) -> &str {
        &self.names[0]
    }

    /// Declared aliases, primary name excluded.
    pub fn aliases(&self) -> &[String] {
        &self.names[1..]
    }

    /// Every name the node answers to, primary first, case-preserving.
    pub fn all_names(&self) -> &[String] {
        &self.names
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Effective required permission, ancestors already applied.
    pub fn permission(&self) -> Option<&str> {
        self.permission.as_deref()
    }

    /// Effective origin restriction, ancestors already applied.
    pub fn origin(&self) -> OriginFilter {
        self.origin
    }

    /// Effective synchrony: declared here or by any ancestor.
    pub fn sync(&self) -> bool {
        self.sync
    }

    /// Full resolved path from the root, space-joined primary names.
    pub fn path(&self) -> &str {
        &self.path
    }
}

/// An internal node grouping child categories and leaves.
pub struct Category {
    meta: NodeMeta,
    children: Vec<Node>,
}

impl Category {
    pub(crate) fn new(meta: NodeMeta, children: Vec<Node>) -> Self {
        Self { meta, children }
    }

    pub fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    /// Children in declaration order. Declaration order breaks matching
    /// ties, so it is preserved exactly.
    pub fn children(&self) -> &[Node] {
        &self.children
    }
}

impl fmt::Debug for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Category")
            .field("path", &self.meta.path)
            .field("children", &self.children.len())
            .finish()
    }
}

/// An executable command at the edge of the tree.
pub struct Leaf {
    meta: NodeMeta,
    params: Vec<Arc<Parameter>>,
    sort_order: Vec<usize>,
    handler: HandlerFn,
}

impl Leaf {
    pub(crate) fn new(
        meta: NodeMeta,
        params: Vec<Arc<Parameter>>,
        sort_order: Vec<usize>,
        handler: HandlerFn,
    ) -> Self {
        Self {
            meta,
            params,
            sort_order,
            handler,
        }
    }

    pub fn meta(&self) -> &NodeMeta {
        &self.meta
    }

    /// Parameters in declaration order.
    pub fn params(&self) -> &[Arc<Parameter>] {
        &self.params
    }

    /// Declared indices in bind and help order: required non-contextual
    /// first, then contextual, then remaining optional, stable within
    /// each group.
    pub fn sort_order(&self) -> &[usize] {
        &self.sort_order
    }

    /// Parameters in bind and help order.
    pub fn sorted_params(&self) -> impl Iterator<Item = &Arc<Parameter>> {
        self.sort_order.iter().map(|&index| &self.params[index])
    }

    pub fn handler(&self) -> &HandlerFn {
        &self.handler
    }
}

impl fmt::Debug for Leaf {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Leaf")
            .field("path", &self.meta.path)
            .field("params", &self.params.len())
            .finish()
    }
}

/// A tree position: category or leaf.
#[derive(Debug, Clone)]
pub enum Node {
    Category(Arc<Category>),
    Leaf(Arc<Leaf>),
}

impl Node {
    pub fn meta(&self) -> &NodeMeta {
        match self {
            Node::Category(category) => category.meta(),
            Node::Leaf(leaf) => leaf.meta(),
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, Node::Leaf(_))
    }

    pub fn as_category(&self) -> Option<&Arc<Category>> {
        match self {
            Node::Category(category) => Some(category),
            Node::Leaf(_) => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&Arc<Leaf>> {
        match self {
            Node::Leaf(leaf) => Some(leaf),
            Node::Category(_) => None,
        }
    }
}
