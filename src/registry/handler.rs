//! registry::handler
//!
//! The typed handler trait and its type-erased object layer.
//!
//! # Design
//!
//! Host code implements [`TypeHandler`] with a concrete `Value` type; the
//! registry stores handlers behind the object-safe [`ValueHandler`] trait so
//! that the binder can work over parameters of heterogeneous types. Parsed
//! values travel as [`BoundValue`]s, an `Arc<dyn Any>` with the concrete
//! `TypeId` captured at construction.
//!
//! A parse may legitimately produce several readings (a name prefix matching
//! several players, say). The typed layer reports that as [`Parsed::Many`];
//! the erased layer either collapses it to the first candidate (`force`) or
//! surfaces [`ParseFailure::Ambiguous`] with the candidates, which upper
//! layers settle by policy or by asking the caller.
//!
//! # Example
//!
//! ```
//! use behest::registry::{Parsed, TypeHandler};
//!
//! struct Percent;
//!
//! impl TypeHandler for Percent {
//!     type Value = u8;
//!
//!     fn type_name(&self) -> &'static str {
//!         "percent"
//!     }
//!
//!     fn parse(&self, raw: &str) -> Result<Parsed<u8>, String> {
//!         let n: u8 = raw
//!             .trim_end_matches('%')
//!             .parse()
//!             .map_err(|_| "expected 0-100".to_string())?;
//!         if n > 100 {
//!             return Err("expected 0-100".to_string());
//!         }
//!         Ok(Parsed::One(n))
//!     }
//!
//!     fn render(&self, value: &u8) -> String {
//!         format!("{value}%")
//!     }
//!
//!     fn example(&self) -> String {
//!         "50%".to_string()
//!     }
//! }
//! ```

use std::any::{Any, TypeId};
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

/// A parsed value with its concrete type erased.
///
/// The `TypeId` is captured when the value is constructed. Calling
/// `.type_id()` on the inner `Arc` later would identify the `Arc` itself
/// (smart pointers implement `Any` too), so it is never consulted.
#[derive(Clone)]
pub struct BoundValue {
    value: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
    type_name: &'static str,
}

impl BoundValue {
    /// Wrap a concrete value.
    pub fn new<T: Any + Send + Sync>(value: T) -> Self {
        Self {
            value: Arc::new(value),
            type_id: TypeId::of::<T>(),
            type_name: std::any::type_name::<T>(),
        }
    }

    /// `TypeId` of the wrapped value.
    pub fn value_type(&self) -> TypeId {
        self.type_id
    }

    /// Rust type name of the wrapped value, for diagnostics only.
    pub fn type_name(&self) -> &'static str {
        self.type_name
    }

    /// Whether the wrapped value is a `T`.
    pub fn is<T: Any>(&self) -> bool {
        self.type_id == TypeId::of::<T>()
    }

    /// Borrow the wrapped value as a `T`, if it is one.
    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.value.downcast_ref::<T>()
    }
}

impl fmt::Debug for BoundValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BoundValue")
            .field("type_name", &self.type_name)
            .finish_non_exhaustive()
    }
}

/// Outcome of a successful typed parse.
#[derive(Debug, Clone, PartialEq)]
pub enum Parsed<T> {
    /// Exactly one reading.
    One(T),
    /// Several equally valid readings, in preference order.
    Many(Vec<T>),
}

/// Why an erased parse produced no binding.
#[derive(Debug, Clone, Error)]
pub enum ParseFailure {
    /// The raw text has no reading as the target type.
    #[error("cannot read {raw:?} as {type_name}: {reason}")]
    Invalid {
        /// The raw token text.
        raw: String,
        /// Host-facing name of the target type.
        type_name: &'static str,
        /// Handler-supplied explanation.
        reason: String,
    },

    /// The raw text has several readings and the call site did not force
    /// a choice.
    #[error("{raw:?} is ambiguous as {type_name}")]
    Ambiguous {
        /// The raw token text.
        raw: String,
        /// Host-facing name of the target type.
        type_name: &'static str,
        /// The candidate values, in the handler's preference order.
        candidates: Vec<BoundValue>,
    },
}

impl ParseFailure {
    /// The raw token text the failure is about.
    pub fn raw(&self) -> &str {
        match self {
            Self::Invalid { raw, .. } | Self::Ambiguous { raw, .. } => raw,
        }
    }
}

/// Parses, renders, and enumerates values of one concrete type.
///
/// Handlers are side-effect-free apart from reading live host state in
/// [`possibilities`](Self::possibilities). That read is repeated on every
/// call because the candidate set is time-varying.
pub trait TypeHandler: Send + Sync + 'static {
    /// The concrete value type this handler produces.
    type Value: Clone + Send + Sync + 'static;

    /// Host-facing name of the type, used in prompts and errors.
    fn type_name(&self) -> &'static str;

    /// Parse raw token text.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the text has no reading as
    /// `Self::Value`.
    fn parse(&self, raw: &str) -> Result<Parsed<Self::Value>, String>;

    /// Render a value back to token text.
    ///
    /// For every value listed by [`possibilities`](Self::possibilities),
    /// parsing the rendered text must yield that value again.
    fn render(&self, value: &Self::Value) -> String;

    /// Currently valid values, if the type is enumerable.
    fn possibilities(&self) -> Option<Vec<Self::Value>> {
        None
    }

    /// A representative literal, shown when no live possibilities exist.
    fn example(&self) -> String;
}

/// Object-safe face of [`TypeHandler`], as stored by the registry.
pub trait ValueHandler: Send + Sync {
    /// `TypeId` of the concrete value type this handler produces.
    fn value_type(&self) -> TypeId;

    /// Host-facing name of the type.
    fn type_name(&self) -> &'static str;

    /// Parse raw token text into a dynamic value.
    ///
    /// With `force` set, a many-reading parse collapses to its first
    /// candidate instead of failing.
    ///
    /// # Errors
    ///
    /// Returns [`ParseFailure::Invalid`] when the text has no reading and
    /// [`ParseFailure::Ambiguous`] when it has several and `force` is off.
    fn parse(&self, raw: &str, force: bool) -> Result<BoundValue, ParseFailure>;

    /// Render a dynamic value, or `None` if it is not this handler's type.
    fn render(&self, value: &BoundValue) -> Option<String>;

    /// Currently valid values as dynamic values, if enumerable.
    fn possibilities(&self) -> Option<Vec<BoundValue>>;

    /// Rendered possibilities whose text starts with `prefix`,
    /// case-insensitive. Empty when the type is not enumerable.
    fn possibilities_matching(&self, prefix: &str) -> Vec<String> {
        let Some(values) = self.possibilities() else {
            return Vec::new();
        };
        let lower = prefix.to_lowercase();
        values
            .iter()
            .filter_map(|value| self.render(value))
            .filter(|text| text.to_lowercase().starts_with(&lower))
            .collect()
    }

    /// A representative literal.
    fn example(&self) -> String;
}

impl std::fmt::Debug for dyn ValueHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ValueHandler")
            .field("type_name", &self.type_name())
            .finish()
    }
}

struct Erased<H: TypeHandler>(H);

impl<H: TypeHandler> ValueHandler for Erased<H> {
    fn value_type(&self) -> TypeId {
        TypeId::of::<H::Value>()
    }

    fn type_name(&self) -> &'static str {
        self.0.type_name()
    }

    fn parse(&self, raw: &str, force: bool) -> Result<BoundValue, ParseFailure> {
        match self.0.parse(raw) {
            Ok(Parsed::One(value)) => Ok(BoundValue::new(value)),
            Ok(Parsed::Many(mut values)) => {
                if values.is_empty() {
                    return Err(ParseFailure::Invalid {
                        raw: raw.to_string(),
                        type_name: self.0.type_name(),
                        reason: "no matching values".to_string(),
                    });
                }
                if force || values.len() == 1 {
                    Ok(BoundValue::new(values.swap_remove(0)))
                } else {
                    Err(ParseFailure::Ambiguous {
                        raw: raw.to_string(),
                        type_name: self.0.type_name(),
                        candidates: values.into_iter().map(BoundValue::new).collect(),
                    })
                }
            }
            Err(reason) => Err(ParseFailure::Invalid {
                raw: raw.to_string(),
                type_name: self.0.type_name(),
                reason,
            }),
        }
    }

    fn render(&self, value: &BoundValue) -> Option<String> {
        value.downcast_ref::<H::Value>().map(|v| self.0.render(v))
    }

    fn possibilities(&self) -> Option<Vec<BoundValue>> {
        self.0
            .possibilities()
            .map(|values| values.into_iter().map(BoundValue::new).collect())
    }

    fn example(&self) -> String {
        self.0.example()
    }
}

/// Erase a typed handler for registry storage.
pub(crate) fn erase<H: TypeHandler>(handler: H) -> Arc<dyn ValueHandler> {
    Arc::new(Erased(handler))
}
