//! caller
//!
//! The host-caller abstraction consumed by the engine.
//!
//! # Design
//!
//! The engine never talks to a terminal, a chat connection, or a socket
//! directly. Everything it needs to know about "who is asking" flows through
//! the [`Caller`] trait: a display name for logs, an [`Origin`] classification
//! for visibility gating, a permission check, a capability flag for
//! interactive follow-up, and a plain-text delivery method. Rendering
//! (colors, click actions, sound) is the host's job inside its `Caller`
//! implementation.
//!
//! # Thread Safety
//!
//! Implementations must be `Send + Sync`: a caller handle is shared between
//! the invocation task, the sync execution lane, and the ambiguity table.

pub mod mock;

pub use mock::MockCaller;

/// Where a caller's request originates.
///
/// Hosts map their own notion of "a person inside the world" versus "the
/// operator terminal" onto these two kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Origin {
    /// An in-world participant (chat user, player, bot avatar).
    Player,
    /// The host's operator console or an automation channel.
    Console,
}

impl std::fmt::Display for Origin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Origin::Player => write!(f, "player"),
            Origin::Console => write!(f, "console"),
        }
    }
}

/// Which origins a command node admits.
///
/// Declared on nodes and inherited by descendants that do not declare their
/// own restriction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OriginFilter {
    /// No restriction.
    #[default]
    Any,
    /// Only in-world callers.
    PlayerOnly,
    /// Only console callers.
    ConsoleOnly,
}

impl OriginFilter {
    /// Check whether a caller origin passes this filter.
    pub fn allows(&self, origin: Origin) -> bool {
        match self {
            OriginFilter::Any => true,
            OriginFilter::PlayerOnly => origin == Origin::Player,
            OriginFilter::ConsoleOnly => origin == Origin::Console,
        }
    }
}

impl std::fmt::Display for OriginFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OriginFilter::Any => write!(f, "any"),
            OriginFilter::PlayerOnly => write!(f, "player-only"),
            OriginFilter::ConsoleOnly => write!(f, "console-only"),
        }
    }
}

/// A source of commands: who asked, what they may see, how to answer them.
///
/// # Interactivity
///
/// [`supports_prompts`](Caller::supports_prompts) gates the ambiguity
/// resolution protocol. A caller that cannot answer a follow-up prompt
/// (automation, console pipelines) always receives the deterministic
/// first-candidate resolution instead of a question.
pub trait Caller: Send + Sync {
    /// Stable display name, used in logs and reports.
    fn display_name(&self) -> &str;

    /// Origin classification, checked against node origin filters.
    fn origin(&self) -> Origin;

    /// Whether this caller holds the given permission string.
    fn has_permission(&self, permission: &str) -> bool;

    /// Whether this caller can answer an interactive follow-up prompt.
    fn supports_prompts(&self) -> bool;

    /// Deliver one plain-text line to the caller.
    ///
    /// The engine uses this for reports, help listings, and ambiguity
    /// prompts. Implementations decide how (and whether) to render it.
    fn send(&self, line: &str);
}

#[cfg(test)]
mod tests {
    use super::*;

    mod origin {
        use super::*;

        #[test]
        fn display_forms() {
            assert_eq!(Origin::Player.to_string(), "player");
            assert_eq!(Origin::Console.to_string(), "console");
        }
    }

    mod origin_filter {
        use super::*;

        #[test]
        fn any_allows_both() {
            assert!(OriginFilter::Any.allows(Origin::Player));
            assert!(OriginFilter::Any.allows(Origin::Console));
        }

        #[test]
        fn player_only_rejects_console() {
            assert!(OriginFilter::PlayerOnly.allows(Origin::Player));
            assert!(!OriginFilter::PlayerOnly.allows(Origin::Console));
        }

        #[test]
        fn console_only_rejects_player() {
            assert!(!OriginFilter::ConsoleOnly.allows(Origin::Player));
            assert!(OriginFilter::ConsoleOnly.allows(Origin::Console));
        }

        #[test]
        fn default_is_any() {
            assert_eq!(OriginFilter::default(), OriginFilter::Any);
        }

        #[test]
        fn display_forms() {
            assert_eq!(OriginFilter::Any.to_string(), "any");
            assert_eq!(OriginFilter::PlayerOnly.to_string(), "player-only");
            assert_eq!(OriginFilter::ConsoleOnly.to_string(), "console-only");
        }
    }
}
