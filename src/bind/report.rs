//! bind::report
//!
//! Per-bind diagnostics, aggregated instead of thrown.
//!
//! Binding recovers locally from almost everything: a malformed token is
//! dropped, a token nobody claims is left over, a failed parse moves on.
//! The report collects all of it so the caller sees one consolidated
//! account rather than the first mishap.

use serde::Serialize;

/// One recovered incident during binding.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BindNote {
    /// A token addressed a parameter but would not parse.
    ParseFailed {
        param: String,
        raw: String,
        reason: String,
    },
    /// An ambiguity prompt for a parameter expired unanswered.
    ChoiceExpired { param: String, raw: String },
    /// An ambiguous parse was settled without asking the caller.
    ChoseFirst { param: String, raw: String },
}

impl std::fmt::Display for BindNote {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BindNote::ParseFailed { param, raw, reason } => {
                write!(f, "could not use {raw:?} for {param:?}: {reason}")
            }
            BindNote::ChoiceExpired { param, raw } => {
                write!(f, "choice for {param:?} ({raw:?}) expired unanswered")
            }
            BindNote::ChoseFirst { param, raw } => {
                write!(f, "took the first match of {raw:?} for {param:?}")
            }
        }
    }
}

/// Everything a bind recovered from, in one place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BindReport {
    /// Tokens dropped for bad `key=value` syntax.
    pub malformed: Vec<String>,
    /// Tokens no parameter claimed by the end of the token passes.
    pub unmatched: Vec<String>,
    /// Recovered incidents, in the order they happened.
    pub notes: Vec<BindNote>,
}

impl BindReport {
    /// True when there is nothing to tell the caller.
    pub fn is_quiet(&self) -> bool {
        self.malformed.is_empty() && self.unmatched.is_empty() && self.notes.is_empty()
    }

    /// Human-readable lines for caller surfacing, one incident each.
    pub fn summary_lines(&self) -> Vec<String> {
        let mut lines = Vec::new();
        if !self.malformed.is_empty() {
            lines.push(format!(
                "Dropped malformed token(s): {}",
                self.malformed.join(", ")
            ));
        }
        if !self.unmatched.is_empty() {
            lines.push(format!(
                "Ignored unmatched argument(s): {}",
                self.unmatched.join(", ")
            ));
        }
        for note in &self.notes {
            lines.push(note.to_string());
        }
        lines
    }

    /// The report as JSON, for hosts that log structured diagnostics.
    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
