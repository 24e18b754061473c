//! engine
//!
//! The owning facade: build the tree once, then run, complete, fulfill.
//!
//! # Architecture
//!
//! One [`CommandEngine`] owns every piece of shared state the redesigned
//! model calls for: the handler and context registries, the built tree,
//! the ambiguity table, the dispatcher, and the policy knobs. Nothing is
//! global; hosts construct the engine through [`EngineBuilder`] and pass
//! callers explicitly per invocation.
//!
//! A command runs in four phases:
//!
//! ```text
//! resolve root group -> descend -> bind -> dispatch
//! ```
//!
//! Resolution may instead stop early with a structured outcome: a
//! category listing, a cross-root ambiguity, or not-found with a
//! suggestion. Bind-level diagnostics are sent to the caller as plain
//! text; the host receives the structured [`RunOutcome`] either way.
//!
//! # Invariants
//!
//! - Same input, same tree, same caller: same outcome (the only
//!   suspension is an ambiguity prompt, and only for interactive
//!   callers).
//! - A caller is never told about a root or child its gating hides.
//! - Outcomes carry structure; only bind diagnostics and handler failure
//!   lines go through `Caller::send`.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use behest::caller::MockCaller;
//! use behest::engine::{EngineBuilder, RunOutcome};
//! use behest::tree::{CategoryDecl, LeafDecl, ParamDecl};
//!
//! # fn main() -> Result<(), behest::config::ConfigError> {
//! let (engine, report) = EngineBuilder::new()
//!     .root(
//!         CategoryDecl::new("bank").leaf(
//!             LeafDecl::new("pay", |invocation| {
//!                 let amount = invocation.args.get::<i64>("amount");
//!                 invocation.caller.send(&format!("paid {amount:?}"));
//!                 Ok(())
//!             })
//!             .param(ParamDecl::new::<i64>("amount")),
//!         ),
//!     )
//!     .build()?;
//! assert!(report.is_clean());
//!
//! let caller = Arc::new(MockCaller::player("ada"));
//! let outcome = tokio_test::block_on(engine.run_line(caller.clone(), "bank pay amount=5"));
//! assert!(matches!(outcome, RunOutcome::Dispatched(_)));
//! assert!(caller.saw("paid Some(5)"));
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;

use crate::ambiguity::{AmbiguityTable, CorrelationToken};
use crate::bind::{BindError, Binder, BindOutcome, BindReport, MissingParam};
use crate::caller::Caller;
use crate::complete::Completer;
use crate::config::{ConfigError, EngineConfig};
use crate::dispatch::{DispatchReceipt, Dispatcher, InlineExecutor, Invocation, SyncExecutor};
use crate::matcher::{self, Descent, MatchTier};
use crate::registry::{ContextHandler, ContextRegistry, HandlerRegistry, TypeHandler};
use crate::tree::{BuildReport, Category, CategoryDecl, CommandTree};

/// How far typo suggestions may stray from a real name.
const SUGGEST_DISTANCE: usize = 2;

/// What one command invocation came to.
#[derive(Debug)]
pub enum RunOutcome {
    /// A leaf ran, or was queued on the synchronous executor.
    Dispatched(DispatchReceipt),
    /// Resolution stopped at a category; `children` are the names this
    /// caller may see, in declaration order.
    Listing {
        path: String,
        children: Vec<String>,
    },
    /// More than one same-named root resolved the tokens. `paths` holds
    /// each terminus, in registration order.
    Ambiguous { paths: Vec<String> },
    /// Nothing matched, with a close visible name when one exists.
    NotFound { suggestion: Option<String> },
    /// Binding failed on required parameters.
    Unbound {
        missing: Vec<MissingParam>,
        report: BindReport,
    },
}

/// Assembles a [`CommandEngine`].
///
/// Builtin value handlers are pre-registered; host handlers, context
/// handlers, roots, policy, and the synchronous executor stack on top.
pub struct EngineBuilder {
    config: EngineConfig,
    registry: HandlerRegistry,
    contexts: ContextRegistry,
    executor: Arc<dyn SyncExecutor>,
    roots: Vec<CategoryDecl>,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self {
            config: EngineConfig::default(),
            registry: HandlerRegistry::with_builtins(),
            contexts: ContextRegistry::new(),
            executor: Arc::new(InlineExecutor),
            roots: Vec::new(),
        }
    }

    /// Replace the default policy.
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a value handler. Later registrations for the same type
    /// replace earlier ones, builtins included.
    pub fn handler<H: TypeHandler>(mut self, handler: H) -> Self {
        self.registry.register(handler);
        self
    }

    /// Register a context handler for contextual parameters.
    pub fn context_handler<H: ContextHandler>(mut self, handler: H) -> Self {
        self.contexts.register(handler);
        self
    }

    /// Where synchronous leaves run. Defaults to [`InlineExecutor`].
    pub fn sync_executor(mut self, executor: Arc<dyn SyncExecutor>) -> Self {
        self.executor = executor;
        self
    }

    /// Declare one root category. Several roots may share a name.
    pub fn root(mut self, root: CategoryDecl) -> Self {
        self.roots.push(root);
        self
    }

    /// Validate policy and build every root.
    ///
    /// Root construction failures are not fatal: the report lists built
    /// and failed roots, and an engine with a partial tree still serves
    /// the healthy ones.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the policy itself is invalid.
    pub fn build(self) -> Result<(CommandEngine, BuildReport), ConfigError> {
        self.config.validate()?;
        let (tree, report) =
            CommandTree::build(self.roots, &self.registry, self.config.max_roots_per_name);
        let table = AmbiguityTable::new(self.config.decision_window(), self.config.sweep_interval());
        let engine = CommandEngine {
            dispatcher: Dispatcher::new(self.executor),
            registry: self.registry,
            contexts: self.contexts,
            tree,
            table,
            config: self.config,
        };
        Ok((engine, report))
    }
}

/// The resolution and dispatch facade.
pub struct CommandEngine {
    config: EngineConfig,
    registry: HandlerRegistry,
    contexts: ContextRegistry,
    tree: CommandTree,
    table: AmbiguityTable,
    dispatcher: Dispatcher,
}

impl CommandEngine {
    /// The active policy.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run one command: a root name token plus pre-split argument tokens.
    ///
    /// Suspends only while an ambiguity prompt waits on this caller,
    /// never longer than the decision window.
    pub async fn run(
        &self,
        caller: Arc<dyn Caller>,
        root_token: &str,
        tokens: &[String],
    ) -> RunOutcome {
        let Some(group) = self.resolve_group(caller.as_ref(), root_token) else {
            let suggestion = self.suggest_root(caller.as_ref(), root_token);
            tracing::debug!(root = root_token, ?suggestion, "no root matched");
            return RunOutcome::NotFound { suggestion };
        };

        // Each accepting same-named root descends independently.
        enum Hit {
            Leaf(Arc<crate::tree::Leaf>, Vec<String>),
            Category(Arc<Category>),
        }
        let mut resolved = Vec::new();
        let mut first_dead: Option<(Arc<Category>, String)> = None;
        for root in &group {
            match matcher::descend(root, tokens, caller.as_ref()) {
                Descent::Leaf { leaf, rest } => resolved.push(Hit::Leaf(leaf, rest)),
                Descent::Category { category } => resolved.push(Hit::Category(category)),
                Descent::Dead { category, token } => {
                    if first_dead.is_none() {
                        first_dead = Some((category, token));
                    }
                }
            }
        }

        if resolved.is_empty() {
            let suggestion = first_dead.as_ref().and_then(|(category, token)| {
                suggest_from(
                    category
                        .children()
                        .iter()
                        .filter(|child| visible(child.meta(), caller.as_ref()))
                        .map(|child| child.meta().name()),
                    token,
                )
            });
            tracing::debug!(root = root_token, ?suggestion, "descent found nothing");
            return RunOutcome::NotFound { suggestion };
        }

        if resolved.len() > 1 {
            let paths = resolved
                .iter()
                .map(|hit| match hit {
                    Hit::Leaf(leaf, _) => leaf.meta().path().to_string(),
                    Hit::Category(category) => category.meta().path().to_string(),
                })
                .collect();
            tracing::debug!(root = root_token, candidates = resolved.len(),
                "resolution ambiguous across roots");
            return RunOutcome::Ambiguous { paths };
        }

        match resolved.remove(0) {
            Hit::Leaf(leaf, rest) => self.bind_and_dispatch(caller, &leaf, &rest).await,
            Hit::Category(category) => RunOutcome::Listing {
                path: category.meta().path().to_string(),
                children: self.visible_children(&category, caller.as_ref()),
            },
        }
    }

    /// [`run`](Self::run) over a whole line: whitespace-split, first word
    /// is the root name, empty words discarded.
    pub async fn run_line(&self, caller: Arc<dyn Caller>, line: &str) -> RunOutcome {
        let mut words = line.split_whitespace().map(str::to_string);
        let Some(root_token) = words.next() else {
            return RunOutcome::NotFound { suggestion: None };
        };
        let tokens: Vec<String> = words.collect();
        self.run(caller, &root_token, &tokens).await
    }

    /// Suggestions for the trailing token under one root name.
    pub fn complete(
        &self,
        caller: &dyn Caller,
        root_token: &str,
        tokens: &[String],
    ) -> Vec<String> {
        let Some(group) = self.resolve_group(caller, root_token) else {
            return Vec::new();
        };
        let completer = Completer::new(self.binder());
        completer.suggest(&group, tokens, caller)
    }

    /// Answer a pending ambiguity prompt.
    ///
    /// `true` only when the token was pending, within its window, and the
    /// choice named one of its candidates.
    pub fn fulfill(&self, token: CorrelationToken, choice: &str) -> bool {
        self.table.fulfill(token, choice)
    }

    /// Parse and answer one out-of-band line: `<prefix> <token> <choice>`.
    ///
    /// The prefix must equal the configured choice prefix; everything
    /// after the token is the chosen value verbatim.
    pub fn fulfill_line(&self, line: &str) -> bool {
        let line = line.trim();
        let Some((prefix, rest)) = line.split_once(char::is_whitespace) else {
            return false;
        };
        if !prefix.eq_ignore_ascii_case(&self.config.choice_prefix) {
            return false;
        }
        let Some((token_text, choice)) = rest.trim_start().split_once(char::is_whitespace)
        else {
            return false;
        };
        let Some(token) = CorrelationToken::parse(token_text) else {
            return false;
        };
        self.table.fulfill(token, choice.trim())
    }

    async fn bind_and_dispatch(
        &self,
        caller: Arc<dyn Caller>,
        leaf: &Arc<crate::tree::Leaf>,
        rest: &[String],
    ) -> RunOutcome {
        match self.binder().bind(leaf, rest, caller.as_ref()).await {
            Ok(BindOutcome { args, report }) => {
                self.surface(&report, caller.as_ref());
                let invocation = Invocation {
                    caller: Arc::clone(&caller),
                    path: leaf.meta().path().to_string(),
                    args,
                };
                let receipt = self.dispatcher.dispatch(leaf, invocation);
                RunOutcome::Dispatched(receipt)
            }
            Err(error) => {
                caller.send(&error.to_string());
                let BindError::MissingRequired { missing, report } = error;
                self.surface(&report, caller.as_ref());
                RunOutcome::Unbound { missing, report }
            }
        }
    }

    fn binder(&self) -> Binder<'_> {
        Binder::new(&self.registry, &self.contexts, &self.table, &self.config)
    }

    fn surface(&self, report: &BindReport, caller: &dyn Caller) {
        for line in report.summary_lines() {
            caller.send(&line);
        }
    }

    /// Pick the root group for a token: best tier over every usable root,
    /// earlier registration on ties; then every same-named root that
    /// accepts the token itself.
    fn resolve_group(&self, caller: &dyn Caller, token: &str) -> Option<Vec<Arc<Category>>> {
        if token.is_empty() {
            return None;
        }

        let mut best: Option<(MatchTier, &Arc<Category>)> = None;
        for root in self.tree.roots() {
            let tier = matcher::match_node(root.meta(), caller, token);
            if tier == MatchTier::Rejected {
                continue;
            }
            if best.map_or(true, |(held, _)| tier > held) {
                best = Some((tier, root));
            }
        }
        let (_, winner) = best?;

        let members: Vec<Arc<Category>> = self
            .tree
            .roots_named(winner.meta().name())
            .filter(|root| matcher::match_node(root.meta(), caller, token) != MatchTier::Rejected)
            .map(Arc::clone)
            .collect();
        Some(members)
    }

    fn suggest_root(&self, caller: &dyn Caller, token: &str) -> Option<String> {
        suggest_from(
            self.tree
                .roots()
                .iter()
                .filter(|root| visible(root.meta(), caller))
                .map(|root| root.meta().name()),
            token,
        )
    }

    fn visible_children(&self, category: &Category, caller: &dyn Caller) -> Vec<String> {
        category
            .children()
            .iter()
            .filter(|child| visible(child.meta(), caller))
            .map(|child| child.meta().name().to_string())
            .collect()
    }
}

impl std::fmt::Debug for CommandEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CommandEngine")
            .field("roots", &self.tree.len())
            .field("handlers", &self.registry.len())
            .field("pending_prompts", &self.table.pending_len())
            .finish_non_exhaustive()
    }
}

fn visible(meta: &crate::tree::NodeMeta, caller: &dyn Caller) -> bool {
    matcher::match_node(meta, caller, "") != MatchTier::Rejected
}

/// Closest visible name by edit distance, if any is close enough.
fn suggest_from<'a>(names: impl Iterator<Item = &'a str>, token: &str) -> Option<String> {
    let token = token.to_lowercase();
    let mut best: Option<(usize, &str)> = None;
    for name in names {
        let distance = strsim::levenshtein(&token, &name.to_lowercase());
        if distance <= SUGGEST_DISTANCE && best.map_or(true, |(held, _)| distance < held) {
            best = Some((distance, name));
        }
    }
    best.map(|(_, name)| name.to_string())
}
