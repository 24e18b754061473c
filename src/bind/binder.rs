//! bind::binder
//!
//! The pass pipeline that turns partitioned tokens into bound arguments.
//!
//! # Invariants
//!
//! - Passes run in a fixed order; each touches only parameters still
//!   unbound and tokens still unconsumed.
//!
//! - Keyed matching tightens never loosens: a key that hits on an exact
//!   pass is gone before the substring passes run.
//!
//! - In the positional pass an ambiguous parse is recorded and the scan
//!   moves on; only parameters the whole scan left unbound escalate their
//!   first recorded ambiguity.
//!
//! - Binding is deterministic for a given token list, parameter list, and
//!   registry state. Nothing here iterates a map.

use crate::ambiguity::AmbiguityTable;
use crate::caller::Caller;
use crate::config::EngineConfig;
use crate::registry::{BoundValue, ContextRegistry, HandlerRegistry, ParseFailure};
use crate::tree::{Leaf, Parameter};

use super::report::{BindNote, BindReport};
use super::tokens::partition;
use super::{BindError, BindOutcome, BoundArgs, BoundSlot, MissingParam};

#[derive(Debug, Clone, Copy)]
enum KeyedPass {
    Exact,
    ExactCaseless,
    KeyInName,
    NameInKey,
}

const KEYED_PASSES: [KeyedPass; 4] = [
    KeyedPass::Exact,
    KeyedPass::ExactCaseless,
    KeyedPass::KeyInName,
    KeyedPass::NameInKey,
];

fn key_matches(pass: KeyedPass, key: &str, name: &str) -> bool {
    match pass {
        KeyedPass::Exact => key == name,
        KeyedPass::ExactCaseless => key.to_lowercase() == name.to_lowercase(),
        KeyedPass::KeyInName => name.to_lowercase().contains(&key.to_lowercase()),
        KeyedPass::NameInKey => key.to_lowercase().contains(&name.to_lowercase()),
    }
}

fn param_matches(pass: KeyedPass, key: &str, param: &Parameter) -> bool {
    param
        .all_names()
        .iter()
        .any(|name| key_matches(pass, key, name))
}

/// Binds tokens against one leaf's parameters.
///
/// Borrows the engine's shared registries and policy; construct one per
/// bind, it is free.
pub struct Binder<'a> {
    registry: &'a HandlerRegistry,
    contexts: &'a ContextRegistry,
    table: &'a AmbiguityTable,
    config: &'a EngineConfig,
}

impl<'a> Binder<'a> {
    pub fn new(
        registry: &'a HandlerRegistry,
        contexts: &'a ContextRegistry,
        table: &'a AmbiguityTable,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            registry,
            contexts,
            table,
            config,
        }
    }

    /// Run the full pass pipeline.
    ///
    /// Suspends only when an ambiguity prompt is waiting on the caller,
    /// bounded by the decision window.
    ///
    /// # Errors
    ///
    /// Returns [`BindError::MissingRequired`] when required parameters are
    /// unbound after every pass; the error carries the full report.
    pub async fn bind(
        &self,
        leaf: &Leaf,
        tokens: &[String],
        caller: &dyn Caller,
    ) -> Result<BindOutcome, BindError> {
        let params = leaf.params();
        let mut buckets = partition(tokens, self.config.allow_null_input);
        let mut report = BindReport {
            malformed: std::mem::take(&mut buckets.malformed),
            ..BindReport::default()
        };

        let mut slots: Vec<Option<BoundSlot>> = vec![None; params.len()];
        let mut keyed_used = vec![false; buckets.keyed.len()];
        let mut null_used = vec![false; buckets.nulls.len()];
        let mut keyless_used = vec![false; buckets.keyless.len()];

        // Passes 1-4: keyed tokens, strictest key match first.
        for pass in KEYED_PASSES {
            for (ti, token) in buckets.keyed.iter().enumerate() {
                if keyed_used[ti] {
                    continue;
                }
                let mut hit = None;
                for (pi, param) in params.iter().enumerate() {
                    if slots[pi].is_none() && param_matches(pass, &token.key, param) {
                        hit = Some(pi);
                        break;
                    }
                }
                let Some(pi) = hit else { continue };
                keyed_used[ti] = true;
                if let Some(value) = self
                    .resolve_value(&params[pi], &token.value, caller, &mut report)
                    .await
                {
                    slots[pi] = Some(BoundSlot::Value(value));
                }
            }
        }

        // Pass 5: the same key matching over the null bucket, binding the
        // sentinel instead of parsing.
        for pass in KEYED_PASSES {
            for (ti, token) in buckets.nulls.iter().enumerate() {
                if null_used[ti] {
                    continue;
                }
                let mut hit = None;
                for (pi, param) in params.iter().enumerate() {
                    if slots[pi].is_none() && param_matches(pass, &token.key, param) {
                        hit = Some(pi);
                        break;
                    }
                }
                let Some(pi) = hit else { continue };
                null_used[ti] = true;
                slots[pi] = Some(BoundSlot::Null);
            }
        }

        // Pass 6: positional parsing in parameter sort order. Ambiguous
        // parses are recorded, first per parameter, without stopping the
        // scan.
        let mut deferred: Vec<(usize, usize, Vec<BoundValue>, String)> = Vec::new();
        for &pi in leaf.sort_order() {
            if slots[pi].is_some() {
                continue;
            }
            let param = &params[pi];
            let mut recorded = false;
            for (ti, token) in buckets.keyless.iter().enumerate() {
                if keyless_used[ti] {
                    continue;
                }
                match param.handler().parse(token, false) {
                    Ok(value) => {
                        slots[pi] = Some(BoundSlot::Value(value));
                        keyless_used[ti] = true;
                        break;
                    }
                    Err(ParseFailure::Invalid { reason, .. }) => {
                        report.notes.push(BindNote::ParseFailed {
                            param: param.name().to_string(),
                            raw: token.clone(),
                            reason,
                        });
                    }
                    Err(ParseFailure::Ambiguous { candidates, .. }) => {
                        if !recorded {
                            deferred.push((pi, ti, candidates, token.clone()));
                            recorded = true;
                        }
                    }
                }
            }
        }
        for (pi, ti, candidates, raw) in deferred {
            if slots[pi].is_some() || keyless_used[ti] {
                continue;
            }
            if let Some(value) = self
                .settle(&params[pi], &raw, candidates, caller, &mut report)
                .await
            {
                slots[pi] = Some(BoundSlot::Value(value));
                keyless_used[ti] = true;
            }
        }

        // Pass 7: default literals.
        for (pi, param) in params.iter().enumerate() {
            if slots[pi].is_some() {
                continue;
            }
            let Some(literal) = param.default_literal() else {
                continue;
            };
            if let Some(value) = self.resolve_value(param, literal, caller, &mut report).await {
                slots[pi] = Some(BoundSlot::Value(value));
            }
        }

        // Pass 8: contextual derivation from the caller.
        for (pi, param) in params.iter().enumerate() {
            if slots[pi].is_some() || !param.contextual() {
                continue;
            }
            if let Some(value) = self.contexts.derive(param.value_type(), caller) {
                slots[pi] = Some(BoundSlot::Value(value));
            }
        }

        // Leftover tokens are surfaced, never fatal on their own.
        for (ti, token) in buckets.keyed.iter().enumerate() {
            if !keyed_used[ti] {
                report.unmatched.push(token.raw.clone());
            }
        }
        for (ti, token) in buckets.nulls.iter().enumerate() {
            if !null_used[ti] {
                report.unmatched.push(token.raw.clone());
            }
        }
        for (ti, token) in buckets.keyless.iter().enumerate() {
            if !keyless_used[ti] {
                report.unmatched.push(token.clone());
            }
        }

        // Pass 9: required validation, all gaps listed at once.
        let mut missing = Vec::new();
        for (pi, param) in params.iter().enumerate() {
            if param.required() && slots[pi].is_none() {
                missing.push(MissingParam {
                    name: param.name().to_string(),
                    position: pi + 1,
                });
            }
        }
        if !missing.is_empty() {
            return Err(BindError::MissingRequired { missing, report });
        }

        let mut bound = Vec::new();
        for (pi, param) in params.iter().enumerate() {
            if let Some(slot) = slots[pi].take() {
                bound.push((param.name().to_string(), slot));
            }
        }
        Ok(BindOutcome {
            args: BoundArgs::new(bound),
            report,
        })
    }

    /// Which parameters the given tokens would claim, by declared index.
    ///
    /// Completion uses this to skip already-supplied parameters. Key
    /// matching alone claims a parameter for keyed tokens; keyless tokens
    /// are parsed with forced choice. No prompting, defaults, or context.
    pub(crate) fn probe(&self, leaf: &Leaf, tokens: &[String]) -> Vec<bool> {
        let params = leaf.params();
        let buckets = partition(tokens, self.config.allow_null_input);
        let mut taken = vec![false; params.len()];
        let mut keyed_used = vec![false; buckets.keyed.len()];
        let mut null_used = vec![false; buckets.nulls.len()];
        let mut keyless_used = vec![false; buckets.keyless.len()];

        for pass in KEYED_PASSES {
            for (ti, token) in buckets.keyed.iter().enumerate() {
                if keyed_used[ti] {
                    continue;
                }
                for (pi, param) in params.iter().enumerate() {
                    if !taken[pi] && param_matches(pass, &token.key, param) {
                        taken[pi] = true;
                        keyed_used[ti] = true;
                        break;
                    }
                }
            }
            for (ti, token) in buckets.nulls.iter().enumerate() {
                if null_used[ti] {
                    continue;
                }
                for (pi, param) in params.iter().enumerate() {
                    if !taken[pi] && param_matches(pass, &token.key, param) {
                        taken[pi] = true;
                        null_used[ti] = true;
                        break;
                    }
                }
            }
        }

        for &pi in leaf.sort_order() {
            if taken[pi] {
                continue;
            }
            for (ti, token) in buckets.keyless.iter().enumerate() {
                if keyless_used[ti] {
                    continue;
                }
                if params[pi].handler().parse(token, true).is_ok() {
                    taken[pi] = true;
                    keyless_used[ti] = true;
                    break;
                }
            }
        }

        taken
    }

    async fn resolve_value(
        &self,
        param: &Parameter,
        raw: &str,
        caller: &dyn Caller,
        report: &mut BindReport,
    ) -> Option<BoundValue> {
        match param.handler().parse(raw, false) {
            Ok(value) => Some(value),
            Err(ParseFailure::Invalid { reason, .. }) => {
                report.notes.push(BindNote::ParseFailed {
                    param: param.name().to_string(),
                    raw: raw.to_string(),
                    reason,
                });
                None
            }
            Err(ParseFailure::Ambiguous { candidates, .. }) => {
                self.settle(param, raw, candidates, caller, report).await
            }
        }
    }

    /// Settle an ambiguous parse: policy first, then the caller.
    async fn settle(
        &self,
        param: &Parameter,
        raw: &str,
        candidates: Vec<BoundValue>,
        caller: &dyn Caller,
        report: &mut BindReport,
    ) -> Option<BoundValue> {
        if self.config.pick_first_on_ambiguity || !caller.supports_prompts() {
            report.notes.push(BindNote::ChoseFirst {
                param: param.name().to_string(),
                raw: raw.to_string(),
            });
            return candidates.into_iter().next();
        }

        let rendered: Vec<(String, BoundValue)> = candidates
            .into_iter()
            .enumerate()
            .map(|(index, value)| {
                let text = self
                    .registry
                    .render_value(&value)
                    .unwrap_or_else(|| format!("option{}", index + 1));
                (text, value)
            })
            .collect();

        let ticket = self.table.open(rendered.iter().map(|(t, _)| t.clone()).collect());
        let token = ticket.token();

        caller.send(&format!(
            "{raw:?} matches several {} values for {:?}. Answer within {}s with:",
            param.handler().type_name(),
            param.name(),
            self.config.decision_window().as_secs(),
        ));
        for (text, _) in &rendered {
            caller.send(&format!("  {} {} {}", self.config.choice_prefix, token, text));
        }
        tracing::debug!(param = param.name(), %token, options = rendered.len(),
            "ambiguity prompt opened");

        match self.table.await_choice(ticket).await {
            Some(choice) => rendered
                .into_iter()
                .find(|(text, _)| *text == choice)
                .map(|(_, value)| value),
            None => {
                report.notes.push(BindNote::ChoiceExpired {
                    param: param.name().to_string(),
                    raw: raw.to_string(),
                });
                caller.send(&format!("Selection for {:?} expired.", param.name()));
                None
            }
        }
    }
}
