//! tree::builder
//!
//! Declarative registration surface and eager tree construction.
//!
//! # Design
//!
//! Hosts describe commands with `CategoryDecl`, `LeafDecl`, and `ParamDecl`
//! builders; [`build_root`] walks a declaration once and produces the
//! immutable built form. Everything is materialized up front, so traversal
//! never takes a lock and never observes a half-initialized child.
//!
//! A configuration mistake anywhere in a root's subtree rejects that whole
//! root. Errors are collected rather than returned at the first one, and
//! sibling roots are unaffected.
//!
//! # Example
//!
//! ```
//! use behest::tree::{CategoryDecl, LeafDecl, ParamDecl};
//!
//! let home = CategoryDecl::new("home")
//!     .describe("manage saved homes")
//!     .leaf(
//!         LeafDecl::new("set", |invocation| {
//!             let name: &String = invocation.args.get("name").unwrap();
//!             invocation.caller.send(&format!("home {name} saved"));
//!             Ok(())
//!         })
//!         .param(ParamDecl::new::<String>("name").default_literal("base")),
//!     );
//! # let _ = home;
//! ```

use std::any::TypeId;
use std::sync::Arc;

use thiserror::Error;

use crate::caller::OriginFilter;
use crate::dispatch::{HandlerFn, Invocation};
use crate::registry::{HandlerRegistry, RegistryError};

use super::node::{Category, Leaf, Node, NodeMeta};
use super::param::Parameter;

/// Errors found while building a root.
#[derive(Debug, Clone, Error)]
pub enum BuildError {
    /// A node or parameter name is empty or contains whitespace or `=`.
    #[error("invalid name {name:?} under {path:?}")]
    InvalidName { path: String, name: String },

    /// Two names collide case-insensitively in one scope.
    #[error("duplicate name {name:?} under {path:?}")]
    DuplicateName { path: String, name: String },

    /// A declared parameter type has no registered handler.
    #[error("parameter {param:?} under {path:?} has no handler for {type_name}")]
    NoHandler {
        path: String,
        param: String,
        type_name: &'static str,
    },

    /// Registering this root would exceed the same-name cap.
    #[error("{cap} roots already registered under {name:?}")]
    RootCapExceeded { name: String, cap: usize },
}

/// A root that was rejected, with everything wrong with it.
#[derive(Debug, Clone)]
pub struct FailedRoot {
    /// Declared primary name of the root.
    pub name: String,
    /// All errors found in its subtree.
    pub errors: Vec<BuildError>,
}

/// Outcome of building a batch of roots. Partial success is normal.
#[derive(Debug, Clone, Default)]
pub struct BuildReport {
    /// Primary names of the roots now usable.
    pub built: Vec<String>,
    /// Rejected roots with their errors.
    pub failed: Vec<FailedRoot>,
}

impl BuildReport {
    /// Whether every declared root was built.
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }

    /// One human-readable line per rejected root.
    pub fn failure_lines(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|root| {
                let reasons: Vec<String> =
                    root.errors.iter().map(|error| error.to_string()).collect();
                format!("root {:?} rejected: {}", root.name, reasons.join("; "))
            })
            .collect()
    }
}

/// Declaration of a leaf parameter.
#[derive(Debug, Clone)]
pub struct ParamDecl {
    names: Vec<String>,
    description: Option<String>,
    type_id: TypeId,
    type_name: &'static str,
    default_literal: Option<String>,
    contextual: bool,
}

impl ParamDecl {
    /// Declare a parameter of value type `T`.
    pub fn new<T: Send + Sync + 'static>(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            description: None,
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
            default_literal: None,
            contextual: false,
        }
    }

    /// Add an alias.
    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    /// Set the description shown in help.
    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Set the default literal. A parameter with a default is optional.
    pub fn default_literal(mut self, literal: impl Into<String>) -> Self {
        self.default_literal = Some(literal.into());
        self
    }

    /// Allow the value to be derived from the caller when absent.
    pub fn contextual(mut self) -> Self {
        self.contextual = true;
        self
    }
}

/// Declaration of an executable leaf.
pub struct LeafDecl {
    names: Vec<String>,
    description: Option<String>,
    permission: Option<String>,
    origin: Option<OriginFilter>,
    sync: bool,
    params: Vec<ParamDecl>,
    handler: HandlerFn,
}

impl LeafDecl {
    /// Declare a leaf with its handler.
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&Invocation) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        Self {
            names: vec![name.into()],
            description: None,
            permission: None,
            origin: None,
            sync: false,
            params: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Require a permission node. Undeclared leaves inherit the nearest
    /// ancestor's permission.
    pub fn permission(mut self, node: impl Into<String>) -> Self {
        self.permission = Some(node.into());
        self
    }

    /// Restrict the accepted caller origins. Undeclared leaves inherit.
    pub fn origin(mut self, filter: OriginFilter) -> Self {
        self.origin = Some(filter);
        self
    }

    /// Run on the host's synchronous lane. Inherited by nothing below a
    /// leaf, but a synchronous ancestor forces this anyway.
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Append a parameter. Declaration order is the positional order.
    pub fn param(mut self, param: ParamDecl) -> Self {
        self.params.push(param);
        self
    }
}

impl std::fmt::Debug for LeafDecl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LeafDecl")
            .field("names", &self.names)
            .field("params", &self.params.len())
            .finish_non_exhaustive()
    }
}

/// Declaration of a category node.
#[derive(Debug)]
pub struct CategoryDecl {
    names: Vec<String>,
    description: Option<String>,
    permission: Option<String>,
    origin: Option<OriginFilter>,
    sync: bool,
    children: Vec<NodeDecl>,
}

/// A declared child slot.
#[derive(Debug)]
pub enum NodeDecl {
    Category(CategoryDecl),
    Leaf(LeafDecl),
}

impl CategoryDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            names: vec![name.into()],
            description: None,
            permission: None,
            origin: None,
            sync: false,
            children: Vec::new(),
        }
    }

    pub fn alias(mut self, name: impl Into<String>) -> Self {
        self.names.push(name.into());
        self
    }

    pub fn describe(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    /// Require a permission node here and, by inheritance, below.
    pub fn permission(mut self, node: impl Into<String>) -> Self {
        self.permission = Some(node.into());
        self
    }

    /// Restrict caller origins here and, by inheritance, below.
    pub fn origin(mut self, filter: OriginFilter) -> Self {
        self.origin = Some(filter);
        self
    }

    /// Force this subtree onto the synchronous lane. Descendants cannot
    /// opt back out.
    pub fn sync(mut self) -> Self {
        self.sync = true;
        self
    }

    /// Append a child category.
    pub fn child(mut self, category: CategoryDecl) -> Self {
        self.children.push(NodeDecl::Category(category));
        self
    }

    /// Append a child leaf.
    pub fn leaf(mut self, leaf: LeafDecl) -> Self {
        self.children.push(NodeDecl::Leaf(leaf));
        self
    }

    /// Declared primary name, for reporting before the build resolves it.
    pub fn declared_name(&self) -> &str {
        &self.names[0]
    }
}

/// Build one declared root into its immutable form.
///
/// # Errors
///
/// Returns every error found in the subtree; any error rejects the root.
pub fn build_root(
    decl: CategoryDecl,
    registry: &HandlerRegistry,
) -> Result<Arc<Category>, Vec<BuildError>> {
    let mut errors = Vec::new();
    let root = build_category(decl, registry, None, &mut errors);
    match root {
        Some(root) if errors.is_empty() => Ok(root),
        _ => Err(errors),
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty() && !name.contains(char::is_whitespace) && !name.contains('=')
}

fn check_names(names: &[String], path: &str, errors: &mut Vec<BuildError>) {
    let mut seen: Vec<String> = Vec::new();
    for name in names {
        if !valid_name(name) {
            errors.push(BuildError::InvalidName {
                path: path.to_string(),
                name: name.clone(),
            });
            continue;
        }
        let lower = name.to_lowercase();
        if seen.contains(&lower) {
            errors.push(BuildError::DuplicateName {
                path: path.to_string(),
                name: name.clone(),
            });
        } else {
            seen.push(lower);
        }
    }
}

fn effective_meta(
    names: Vec<String>,
    description: Option<String>,
    permission: Option<String>,
    origin: Option<OriginFilter>,
    sync: bool,
    parent: Option<&NodeMeta>,
) -> NodeMeta {
    let path = match parent {
        Some(parent) => format!("{} {}", parent.path(), &names[0]),
        None => names[0].clone(),
    };
    let permission = permission.or_else(|| parent.and_then(|p| p.permission().map(str::to_string)));
    let origin = origin.unwrap_or_else(|| parent.map_or(OriginFilter::Any, |p| p.origin()));
    let sync = sync || parent.is_some_and(|p| p.sync());
    NodeMeta::new(names, description, permission, origin, sync, path)
}

fn build_category(
    decl: CategoryDecl,
    registry: &HandlerRegistry,
    parent: Option<&NodeMeta>,
    errors: &mut Vec<BuildError>,
) -> Option<Arc<Category>> {
    let parent_path = parent.map_or("", |p| p.path());
    check_names(&decl.names, parent_path, errors);

    let meta = effective_meta(
        decl.names,
        decl.description,
        decl.permission,
        decl.origin,
        decl.sync,
        parent,
    );

    let mut children = Vec::new();
    for child in decl.children {
        match child {
            NodeDecl::Category(child) => {
                if let Some(built) = build_category(child, registry, Some(&meta), errors) {
                    children.push(Node::Category(built));
                }
            }
            NodeDecl::Leaf(child) => {
                if let Some(built) = build_leaf(child, registry, &meta, errors) {
                    children.push(Node::Leaf(built));
                }
            }
        }
    }

    Some(Arc::new(Category::new(meta, children)))
}

fn build_leaf(
    decl: LeafDecl,
    registry: &HandlerRegistry,
    parent: &NodeMeta,
    errors: &mut Vec<BuildError>,
) -> Option<Arc<Leaf>> {
    check_names(&decl.names, parent.path(), errors);

    let meta = effective_meta(
        decl.names,
        decl.description,
        decl.permission,
        decl.origin,
        decl.sync,
        Some(parent),
    );

    // Key matching needs every parameter name in the leaf to be distinct.
    let mut seen: Vec<String> = Vec::new();
    let mut params = Vec::new();
    let mut usable = true;
    for param in decl.params {
        for name in &param.names {
            if !valid_name(name) {
                errors.push(BuildError::InvalidName {
                    path: meta.path().to_string(),
                    name: name.clone(),
                });
                usable = false;
                continue;
            }
            let lower = name.to_lowercase();
            if seen.contains(&lower) {
                errors.push(BuildError::DuplicateName {
                    path: meta.path().to_string(),
                    name: name.clone(),
                });
                usable = false;
            } else {
                seen.push(lower);
            }
        }

        match registry.resolve(param.type_id, param.type_name) {
            Ok(handler) => params.push(Arc::new(Parameter::new(
                param.names,
                param.description,
                param.type_id,
                param.type_name,
                param.default_literal,
                param.contextual,
                handler,
            ))),
            Err(RegistryError::NoHandler { type_name }) => {
                errors.push(BuildError::NoHandler {
                    path: meta.path().to_string(),
                    param: param.names[0].clone(),
                    type_name,
                });
                usable = false;
            }
        }
    }

    if !usable {
        return None;
    }

    let mut sort_order: Vec<usize> = (0..params.len()).collect();
    sort_order.sort_by_key(|&index| params[index].sort_group());

    Some(Arc::new(Leaf::new(meta, params, sort_order, decl.handler)))
}
