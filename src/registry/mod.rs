//! registry
//!
//! Handler registries: one for parameter types, one for context derivation.
//!
//! # Architecture
//!
//! ```text
//! TypeHandler (typed)  --erase-->  ValueHandler (object)  --.
//!                                                           +-- HandlerRegistry
//! ContextHandler (typed) --erase--> context source ---------+-- ContextRegistry
//! ```
//!
//! Both registries key by the concrete value `TypeId`. Every parameter type
//! declared anywhere in a command tree must have a matching entry in the
//! handler registry; that is checked when the tree is built, so a missing
//! handler is a startup defect rather than an invocation-time surprise.
//!
//! The context registry is consulted late in binding, for parameters flagged
//! contextual that nothing in the token stream filled. A context source may
//! decline by returning `None` (a console has no position, say).

pub mod builtin;
pub mod handler;

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use crate::caller::Caller;

pub use handler::{BoundValue, Parsed, ParseFailure, TypeHandler, ValueHandler};

/// Errors from handler registry lookups.
#[derive(Debug, Clone, Error)]
pub enum RegistryError {
    /// A declared parameter type has no registered handler.
    #[error("no type handler registered for {type_name}")]
    NoHandler {
        /// Rust name of the uncovered type.
        type_name: &'static str,
    },
}

/// Registry of [`ValueHandler`]s keyed by value type.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<TypeId, Arc<dyn ValueHandler>>,
}

impl HandlerRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// A registry pre-loaded with the builtin handlers
    /// (`i64`, `f64`, `bool`, `String`).
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        registry.register(builtin::IntegerHandler);
        registry.register(builtin::DecimalHandler);
        registry.register(builtin::BoolHandler);
        registry.register(builtin::TextHandler);
        registry
    }

    /// Register a handler for its `Value` type.
    ///
    /// A later registration for the same type replaces the earlier one, so
    /// hosts can override a builtin.
    pub fn register<H: TypeHandler>(&mut self, handler: H) {
        self.handlers
            .insert(TypeId::of::<H::Value>(), handler::erase(handler));
    }

    /// Look up the handler for a value type.
    pub fn get(&self, type_id: TypeId) -> Option<Arc<dyn ValueHandler>> {
        self.handlers.get(&type_id).cloned()
    }

    /// Look up the handler for a declared parameter type.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::NoHandler`] naming `declared` when the type
    /// is uncovered.
    pub fn resolve(
        &self,
        type_id: TypeId,
        declared: &'static str,
    ) -> Result<Arc<dyn ValueHandler>, RegistryError> {
        self.get(type_id)
            .ok_or(RegistryError::NoHandler { type_name: declared })
    }

    /// Render a dynamic value through the handler for its type.
    ///
    /// `None` when no handler covers the value's type.
    pub fn render_value(&self, value: &BoundValue) -> Option<String> {
        self.handlers
            .get(&value.value_type())
            .and_then(|handler| handler.render(value))
    }

    /// Number of registered handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl std::fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut names: Vec<&str> = self.handlers.values().map(|h| h.type_name()).collect();
        names.sort_unstable();
        f.debug_struct("HandlerRegistry")
            .field("types", &names)
            .finish()
    }
}

/// Derives a value of one concrete type from the caller alone.
///
/// Return `None` when this caller carries no such value; the parameter then
/// stays unbound and falls through to required validation.
pub trait ContextHandler: Send + Sync + 'static {
    /// The concrete value type this source derives.
    type Value: Clone + Send + Sync + 'static;

    /// Derive a value from the caller, if one applies.
    fn derive(&self, caller: &dyn Caller) -> Option<Self::Value>;
}

trait ContextSource: Send + Sync {
    fn derive(&self, caller: &dyn Caller) -> Option<BoundValue>;
}

struct ErasedContext<H: ContextHandler>(H);

impl<H: ContextHandler> ContextSource for ErasedContext<H> {
    fn derive(&self, caller: &dyn Caller) -> Option<BoundValue> {
        self.0.derive(caller).map(BoundValue::new)
    }
}

/// Registry of [`ContextHandler`]s keyed by value type.
#[derive(Clone, Default)]
pub struct ContextRegistry {
    sources: HashMap<TypeId, Arc<dyn ContextSource>>,
}

impl ContextRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a context source for its `Value` type, replacing any
    /// earlier one.
    pub fn register<H: ContextHandler>(&mut self, handler: H) {
        self.sources
            .insert(TypeId::of::<H::Value>(), Arc::new(ErasedContext(handler)));
    }

    /// Whether a source is registered for the type.
    pub fn covers(&self, type_id: TypeId) -> bool {
        self.sources.contains_key(&type_id)
    }

    /// Derive a value of the given type from the caller.
    ///
    /// `None` when no source covers the type or the source declines.
    pub fn derive(&self, type_id: TypeId, caller: &dyn Caller) -> Option<BoundValue> {
        self.sources.get(&type_id)?.derive(caller)
    }
}

impl std::fmt::Debug for ContextRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContextRegistry")
            .field("sources", &self.sources.len())
            .finish()
    }
}
