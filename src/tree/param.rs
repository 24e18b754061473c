//! tree::param
//!
//! Built parameter metadata for leaf commands.
//!
//! # Design
//!
//! A `Parameter` is immutable after tree build. The handler for its value
//! type is resolved once during the build (a missing handler fails the root
//! then, not at invocation time) and the example literals shown in help and
//! completion are computed once per parameter on first use.
//!
//! Required is a derived property: a parameter with no default literal is
//! required.

use std::any::TypeId;
use std::fmt;
use std::sync::{Arc, OnceLock};

use crate::registry::ValueHandler;

/// How many example literals a parameter caches.
const EXAMPLE_COUNT: usize = 3;

/// Ordering bucket used at bind and help time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub(crate) enum SortGroup {
    RequiredDirect,
    Contextual,
    Optional,
}

/// A declared input of a leaf command.
#[derive(Clone)]
pub struct Parameter {
    names: Vec<String>,
    description: Option<String>,
    type_id: TypeId,
    type_name: &'static str,
    default_literal: Option<String>,
    contextual: bool,
    handler: Arc<dyn ValueHandler>,
    examples: OnceLock<Vec<String>>,
}

impl Parameter {
    pub(crate) fn new(
        names: Vec<String>,
        description: Option<String>,
        type_id: TypeId,
        type_name: &'static str,
        default_literal: Option<String>,
        contextual: bool,
        handler: Arc<dyn ValueHandler>,
    ) -> Self {
        Self {
            names,
            description,
            type_id,
            type_name,
            default_literal,
            contextual,
            handler,
            examples: OnceLock::new(),
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

    /// Every name the parameter answers to, primary first.
    pub fn all_names(&self) -> &[String] {
        &self.names
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// `TypeId` of the declared value type.
    pub fn value_type(&self) -> TypeId {
        self.type_id
    }

    /// Rust name of the declared value type, for diagnostics.
    pub fn declared_type_name(&self) -> &'static str {
        self.type_name
    }

    /// Raw default literal, parsed only when the default pass needs it.
    pub fn default_literal(&self) -> Option<&str> {
        self.default_literal.as_deref()
    }

    /// Whether the value may be derived from the caller.
    pub fn contextual(&self) -> bool {
        self.contextual
    }

    /// Required if and only if no default literal is declared.
    pub fn required(&self) -> bool {
        self.default_literal.is_none()
    }

    /// The handler for this parameter's value type.
    pub fn handler(&self) -> &Arc<dyn ValueHandler> {
        &self.handler
    }

    pub(crate) fn sort_group(&self) -> SortGroup {
        if self.contextual {
            SortGroup::Contextual
        } else if self.required() {
            SortGroup::RequiredDirect
        } else {
            SortGroup::Optional
        }
    }

    /// Example literals for help output.
    ///
    /// Prefers rendered live possibilities; falls back to handler-invented
    /// examples. Computed once and kept for the life of the parameter.
    pub fn examples(&self) -> &[String] {
        self.examples.get_or_init(|| {
            if let Some(values) = self.handler.possibilities() {
                let rendered: Vec<String> = values
                    .iter()
                    .take(EXAMPLE_COUNT)
                    .filter_map(|value| self.handler.render(value))
                    .collect();
                if !rendered.is_empty() {
                    return rendered;
                }
            }
            (0..EXAMPLE_COUNT).map(|_| self.handler.example()).collect()
        })
    }
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("name", &self.name())
            .field("aliases", &self.aliases())
            .field("type_name", &self.type_name)
            .field("required", &self.required())
            .field("contextual", &self.contextual)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::{HandlerRegistry, Parsed, TypeHandler};
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn integer_param(default: Option<&str>, contextual: bool) -> Parameter {
        let registry = HandlerRegistry::with_builtins();
        Parameter::new(
            vec!["amount".to_string(), "amt".to_string()],
            None,
            TypeId::of::<i64>(),
            std::any::type_name::<i64>(),
            default.map(str::to_string),
            contextual,
            registry.get(TypeId::of::<i64>()).unwrap(),
        )
    }

    #[test]
    fn required_derives_from_default() {
        assert!(integer_param(None, false).required());
        assert!(!integer_param(Some("10"), false).required());
    }

    #[test]
    fn names_split_primary_and_aliases() {
        let param = integer_param(None, false);
        assert_eq!(param.name(), "amount");
        assert_eq!(param.aliases(), ["amt"]);
        assert_eq!(param.all_names().len(), 2);
    }

    #[test]
    fn sort_groups() {
        assert_eq!(
            integer_param(None, false).sort_group(),
            SortGroup::RequiredDirect
        );
        assert_eq!(
            integer_param(None, true).sort_group(),
            SortGroup::Contextual
        );
        assert_eq!(
            integer_param(Some("1"), true).sort_group(),
            SortGroup::Contextual
        );
        assert_eq!(
            integer_param(Some("1"), false).sort_group(),
            SortGroup::Optional
        );
    }

    #[test]
    fn examples_prefer_possibilities() {
        let registry = HandlerRegistry::with_builtins();
        let param = Parameter::new(
            vec!["enabled".to_string()],
            None,
            TypeId::of::<bool>(),
            std::any::type_name::<bool>(),
            None,
            false,
            registry.get(TypeId::of::<bool>()).unwrap(),
        );
        assert_eq!(param.examples(), ["true", "false"]);
    }

    #[test]
    fn examples_computed_once() {
        static CALLS: AtomicUsize = AtomicUsize::new(0);

        struct Counting;

        impl TypeHandler for Counting {
            type Value = u16;

            fn type_name(&self) -> &'static str {
                "counting"
            }

            fn parse(&self, raw: &str) -> Result<Parsed<u16>, String> {
                raw.parse::<u16>().map(Parsed::One).map_err(|e| e.to_string())
            }

            fn render(&self, value: &u16) -> String {
                value.to_string()
            }

            fn example(&self) -> String {
                CALLS.fetch_add(1, Ordering::SeqCst);
                "7".to_string()
            }
        }

        let mut registry = HandlerRegistry::new();
        registry.register(Counting);
        let param = Parameter::new(
            vec!["count".to_string()],
            None,
            TypeId::of::<u16>(),
            std::any::type_name::<u16>(),
            None,
            false,
            registry.get(TypeId::of::<u16>()).unwrap(),
        );

        let first = param.examples().to_vec();
        let second = param.examples().to_vec();
        assert_eq!(first, second);
        assert_eq!(CALLS.load(Ordering::SeqCst), EXAMPLE_COUNT);
    }
}
