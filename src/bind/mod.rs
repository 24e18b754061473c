//! bind
//!
//! The argument binder: raw tokens in, typed arguments out.
//!
//! # Architecture
//!
//! ```text
//! tokens --partition--> buckets --ordered passes--> BoundArgs + BindReport
//!                                     |
//!                          ambiguity settlement
//!                   (policy, or ask the caller and wait)
//! ```
//!
//! Binding runs nine strictly ordered passes over a leaf's parameters:
//! four keyed passes from strict to loose key matching, the same four over
//! the null bucket, positional parsing of keyless tokens, default
//! literals, contextual derivation, and required validation. Each pass
//! touches only parameters still unbound and tokens still unconsumed.
//!
//! The only way a bind fails is a required parameter left unbound; all
//! other trouble is downgraded to [`BindReport`] entries.

pub mod binder;
pub mod report;

mod tokens;

use std::any::Any;

use thiserror::Error;

use crate::registry::BoundValue;

pub use binder::Binder;
pub use report::{BindNote, BindReport};

/// What a parameter ended up holding.
#[derive(Debug, Clone)]
pub enum BoundSlot {
    /// A parsed or derived value.
    Value(BoundValue),
    /// The explicit-null sentinel, only produced when null input is
    /// enabled globally.
    Null,
}

/// Typed arguments for one invocation, keyed by parameter primary name.
#[derive(Debug, Clone, Default)]
pub struct BoundArgs {
    slots: Vec<(String, BoundSlot)>,
}

impl BoundArgs {
    pub(crate) fn new(slots: Vec<(String, BoundSlot)>) -> Self {
        Self { slots }
    }

    /// The slot for a parameter, if it was bound at all.
    pub fn slot(&self, name: &str) -> Option<&BoundSlot> {
        self.slots
            .iter()
            .find(|(held, _)| held == name)
            .map(|(_, slot)| slot)
    }

    /// Borrow a bound value as `T`.
    ///
    /// `None` when the parameter is unbound, explicitly null, or of
    /// another type.
    pub fn get<T: Any>(&self, name: &str) -> Option<&T> {
        match self.slot(name)? {
            BoundSlot::Value(value) => value.downcast_ref(),
            BoundSlot::Null => None,
        }
    }

    /// Whether the parameter was bound to the explicit-null sentinel.
    pub fn is_null(&self, name: &str) -> bool {
        matches!(self.slot(name), Some(BoundSlot::Null))
    }

    /// Whether the parameter was bound at all.
    pub fn contains(&self, name: &str) -> bool {
        self.slot(name).is_some()
    }

    /// Bound parameter names, in declaration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.slots.iter().map(|(name, _)| name.as_str())
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }
}

/// A required parameter nobody filled.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct MissingParam {
    /// Primary name of the parameter.
    pub name: String,
    /// 1-based declared position.
    pub position: usize,
}

fn list_missing(missing: &[MissingParam]) -> String {
    missing
        .iter()
        .map(|m| format!("{:?} (position {})", m.name, m.position))
        .collect::<Vec<_>>()
        .join(", ")
}

/// The one fatal binding outcome.
#[derive(Debug, Error)]
pub enum BindError {
    /// Binding finished with required parameters unbound. Every missing
    /// parameter is listed, along with the diagnostics gathered on the way.
    #[error("missing required parameter(s): {}", list_missing(.missing))]
    MissingRequired {
        missing: Vec<MissingParam>,
        report: BindReport,
    },
}

/// A successful bind: the arguments plus everything recovered from.
#[derive(Debug)]
pub struct BindOutcome {
    pub args: BoundArgs,
    pub report: BindReport,
}
