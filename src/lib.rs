//! Behest - Declarative command trees with typed argument binding
//!
//! Behest resolves pre-tokenized command lines against a tree of declared
//! categories and leaves, binds the remaining tokens to strongly typed
//! parameters, and dispatches the leaf handler under its declared
//! concurrency contract. The same machinery, run in a non-committal mode,
//! powers incremental completion.
//!
//! # Architecture
//!
//! The crate is layered around one owning [`engine::CommandEngine`]:
//!
//! - [`tree`] - Declarations, the built immutable tree, and the root table
//! - [`matcher`] - Tiered fuzzy matching for descent and completion
//! - [`registry`] - Type handlers (parse/render/enumerate) and context handlers
//! - [`bind`] - The multi-pass argument binder and its report
//! - [`ambiguity`] - Correlated, expiring prompts for ambiguous values
//! - [`dispatch`] - Sync/async execution lanes behind a panic guard
//! - [`complete`] - Suggestion generation on the same machinery
//! - [`caller`] - The host-facing caller abstraction
//! - [`config`] - Engine policy, loadable from TOML
//! - [`engine`] - The facade that owns all of the above
//!
//! # Correctness Invariants
//!
//! 1. A caller can never resolve, complete, or be told about a node its
//!    origin or permissions hide
//! 2. Binding is deterministic for a given token list, tree, and registry
//! 3. A bind succeeds only with every required parameter filled
//! 4. Handler failures and panics stop at the dispatch boundary

pub mod ambiguity;
pub mod bind;
pub mod caller;
pub mod complete;
pub mod config;
pub mod dispatch;
pub mod engine;
pub mod matcher;
pub mod registry;
pub mod tree;
