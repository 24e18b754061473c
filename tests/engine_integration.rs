//! Integration tests for the full engine flow.
//!
//! These drive the engine the way a host would: declare roots, build,
//! feed pre-tokenized lines, then check the structured outcome and the
//! caller's transcript.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use behest::caller::{Caller, MockCaller, Origin, OriginFilter};
use behest::config::EngineConfig;
use behest::dispatch::{DispatchReceipt, SyncLane, FAILURE_LINE};
use behest::engine::{CommandEngine, EngineBuilder, RunOutcome};
use behest::registry::{ContextHandler, Parsed, TypeHandler};
use behest::tree::{CategoryDecl, LeafDecl, ParamDecl};

// ============================================================================
// Test fixtures
// ============================================================================

/// Route the engine's tracing output through the test harness so failing
/// runs show the resolution and dispatch decisions. First caller wins;
/// later inits are no-ops.
fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer()
        .try_init();
}

const ROSTER: [&str; 3] = ["Bobby", "Bobo", "Ann"];

/// In-world target resolved by case-insensitive prefix over a fixed
/// roster, so "bob" is ambiguous and "an" is not.
#[derive(Debug, Clone, PartialEq)]
struct Target(String);

struct TargetHandler;

impl TypeHandler for TargetHandler {
    type Value = Target;

    fn type_name(&self) -> &'static str {
        "target"
    }

    fn parse(&self, raw: &str) -> Result<Parsed<Target>, String> {
        let lower = raw.to_lowercase();
        let hits: Vec<Target> = ROSTER
            .iter()
            .filter(|name| name.to_lowercase().starts_with(&lower))
            .map(|name| Target(name.to_string()))
            .collect();
        match hits.len() {
            0 => Err(format!("no target named {raw:?}")),
            1 => Ok(Parsed::One(hits.into_iter().next().unwrap())),
            _ => Ok(Parsed::Many(hits)),
        }
    }

    fn render(&self, value: &Target) -> String {
        value.0.clone()
    }

    fn possibilities(&self) -> Option<Vec<Target>> {
        Some(ROSTER.iter().map(|name| Target(name.to_string())).collect())
    }

    fn example(&self) -> String {
        "Bobby".to_string()
    }
}

/// Derives the caller itself for in-world callers, declines for the
/// console.
struct SelfTarget;

impl ContextHandler for SelfTarget {
    type Value = Target;

    fn derive(&self, caller: &dyn Caller) -> Option<Target> {
        (caller.origin() == Origin::Player).then(|| Target(caller.display_name().to_string()))
    }
}

/// Everything the leaf handlers witnessed.
#[derive(Default)]
struct Observed {
    paid: Mutex<Vec<(i64, Option<String>)>>,
    kicked: Mutex<Vec<String>>,
    muted: Mutex<Vec<String>>,
}

fn sample_engine(config: EngineConfig) -> (CommandEngine, Arc<Observed>) {
    init_tracing();
    let observed = Arc::new(Observed::default());
    let pay_sink = Arc::clone(&observed);
    let kick_sink = Arc::clone(&observed);
    let mute_sink = Arc::clone(&observed);

    let (engine, report) = EngineBuilder::new()
        .config(config)
        .handler(TargetHandler)
        .context_handler(SelfTarget)
        .root(
            CategoryDecl::new("bank")
                .leaf(
                    LeafDecl::new("pay", move |invocation| {
                        let amount = invocation
                            .args
                            .get::<i64>("amount")
                            .copied()
                            .unwrap_or_default();
                        let memo = invocation.args.get::<String>("memo").cloned();
                        pay_sink.paid.lock().unwrap().push((amount, memo));
                        Ok(())
                    })
                    .param(ParamDecl::new::<i64>("amount"))
                    .param(ParamDecl::new::<String>("memo").default_literal("none")),
                )
                .leaf(LeafDecl::new("bed", |_| Ok(())).origin(OriginFilter::PlayerOnly)),
        )
        .root(
            CategoryDecl::new("mod")
                .leaf(
                    LeafDecl::new("kick", move |invocation| {
                        if let Some(target) = invocation.args.get::<Target>("who") {
                            kick_sink.kicked.lock().unwrap().push(target.0.clone());
                        }
                        Ok(())
                    })
                    .param(ParamDecl::new::<Target>("who")),
                )
                .leaf(
                    LeafDecl::new("mute", move |invocation| {
                        if let Some(target) = invocation.args.get::<Target>("who") {
                            mute_sink.muted.lock().unwrap().push(target.0.clone());
                        }
                        Ok(())
                    })
                    .param(ParamDecl::new::<Target>("who").contextual()),
                ),
        )
        .build()
        .expect("engine builds");
    assert!(report.is_clean());
    (engine, observed)
}

fn default_engine() -> (CommandEngine, Arc<Observed>) {
    sample_engine(EngineConfig::default())
}

// ============================================================================
// Binding scenarios
// ============================================================================

#[tokio::test]
async fn keyed_token_binds_and_dispatches() {
    let (engine, observed) = default_engine();
    let caller = Arc::new(MockCaller::player("ada"));

    let outcome = engine.run_line(caller.clone(), "bank pay amount=5").await;
    assert!(matches!(
        outcome,
        RunOutcome::Dispatched(DispatchReceipt::Completed)
    ));
    assert_eq!(
        *observed.paid.lock().unwrap(),
        [(5, Some("none".to_string()))]
    );
    assert!(caller.sent().is_empty());
}

#[tokio::test]
async fn keyless_token_binds_positionally() {
    let (engine, observed) = default_engine();
    let caller = Arc::new(MockCaller::player("ada"));

    engine.run_line(caller.clone(), "bank pay 5 gift").await;
    assert_eq!(
        *observed.paid.lock().unwrap(),
        [(5, Some("gift".to_string()))]
    );
}

#[tokio::test]
async fn default_literal_fills_the_gap() {
    let (engine, observed) = default_engine();

    engine
        .run_line(Arc::new(MockCaller::player("ada")), "bank pay 7")
        .await;
    assert_eq!(
        *observed.paid.lock().unwrap(),
        [(7, Some("none".to_string()))]
    );
}

#[tokio::test]
async fn explicit_null_suppresses_the_default() {
    let config = EngineConfig {
        allow_null_input: true,
        ..EngineConfig::default()
    };
    let (engine, observed) = sample_engine(config);

    engine
        .run_line(Arc::new(MockCaller::player("ada")), "bank pay 7 memo=null")
        .await;
    assert_eq!(*observed.paid.lock().unwrap(), [(7, None)]);
}

#[tokio::test]
async fn missing_required_parameter_fails_the_bind() {
    let (engine, observed) = default_engine();
    let caller = Arc::new(MockCaller::player("ada"));

    let outcome = engine.run_line(caller.clone(), "bank pay memo=hello").await;
    let RunOutcome::Unbound { missing, .. } = outcome else {
        panic!("expected unbound, got {outcome:?}");
    };
    assert_eq!(missing.len(), 1);
    assert_eq!(missing[0].name, "amount");
    assert_eq!(missing[0].position, 1);
    assert!(caller.saw("missing required parameter"));
    assert!(caller.saw("\"amount\" (position 1)"));
    assert!(observed.paid.lock().unwrap().is_empty());
}

#[tokio::test]
async fn malformed_and_unmatched_tokens_are_reported_not_fatal() {
    let (engine, observed) = default_engine();
    let caller = Arc::new(MockCaller::player("ada"));

    let outcome = engine
        .run_line(caller.clone(), "bank pay 5 a=b=c stray=1")
        .await;
    assert!(matches!(outcome, RunOutcome::Dispatched(_)));
    assert_eq!(
        *observed.paid.lock().unwrap(),
        [(5, Some("none".to_string()))]
    );
    assert!(caller.saw("Dropped malformed token(s): a=b=c"));
    assert!(caller.saw("Ignored unmatched argument(s): stray=1"));
}

#[tokio::test]
async fn contextual_parameter_derives_from_the_caller() {
    let (engine, observed) = default_engine();

    engine
        .run_line(Arc::new(MockCaller::player("ada")), "mod mute")
        .await;
    assert_eq!(*observed.muted.lock().unwrap(), ["ada"]);

    // The console gets no derived value and the parameter stays required.
    let console = Arc::new(MockCaller::console());
    let outcome = engine.run_line(console, "mod mute").await;
    assert!(matches!(outcome, RunOutcome::Unbound { .. }));
    assert_eq!(*observed.muted.lock().unwrap(), ["ada"]);
}

// ============================================================================
// Ambiguity settlement
// ============================================================================

#[tokio::test]
async fn non_interactive_caller_gets_the_first_candidate() {
    let (engine, observed) = default_engine();
    let console = Arc::new(MockCaller::console());

    let outcome = engine.run_line(console.clone(), "mod kick bob").await;
    assert!(matches!(outcome, RunOutcome::Dispatched(_)));
    assert_eq!(*observed.kicked.lock().unwrap(), ["Bobby"]);
    assert!(console.saw("took the first match"));
}

#[tokio::test]
async fn pick_first_policy_applies_to_interactive_callers() {
    let config = EngineConfig {
        pick_first_on_ambiguity: true,
        ..EngineConfig::default()
    };
    let (engine, observed) = sample_engine(config);
    let caller = Arc::new(MockCaller::player("ada"));

    engine.run_line(caller.clone(), "mod kick bob").await;
    assert_eq!(*observed.kicked.lock().unwrap(), ["Bobby"]);
    assert!(!caller.saw("matches several"));
}

#[tokio::test(start_paused = true)]
async fn fulfilled_prompt_binds_the_chosen_candidate() {
    let (engine, observed) = default_engine();
    let caller = Arc::new(MockCaller::player("ada"));
    let transcript = caller.clone();

    let run = engine.run_line(caller.clone(), "mod kick bob");
    let answer = async {
        tokio::time::sleep(Duration::from_millis(5)).await;
        let line = transcript
            .sent()
            .into_iter()
            .find(|line| line.ends_with(" Bobo"))
            .expect("prompt line for Bobo");
        let token = line.split_whitespace().nth(1).expect("token").to_string();

        assert!(engine.fulfill_line(&format!("pick {token} Bobo")));
        // A second answer for the same token finds nothing.
        assert!(!engine.fulfill_line(&format!("pick {token} Bobby")));
    };

    let (outcome, ()) = tokio::join!(run, answer);
    assert!(matches!(outcome, RunOutcome::Dispatched(_)));
    assert_eq!(*observed.kicked.lock().unwrap(), ["Bobo"]);
}

#[tokio::test(start_paused = true)]
async fn expired_prompt_fails_as_missing_never_defaults() {
    let (engine, observed) = default_engine();
    let caller = Arc::new(MockCaller::player("ada"));

    // Nobody answers; paused time runs straight through the window.
    let outcome = engine.run_line(caller.clone(), "mod kick bob").await;
    let RunOutcome::Unbound { missing, .. } = outcome else {
        panic!("expected unbound, got {outcome:?}");
    };
    assert_eq!(missing[0].name, "who");
    assert!(caller.saw("matches several"));
    assert!(caller.saw("expired"));
    assert!(observed.kicked.lock().unwrap().is_empty());

    // The expired token is gone; a late answer is ignored.
    let line = caller
        .sent()
        .into_iter()
        .find(|line| line.ends_with(" Bobo"))
        .expect("prompt line");
    let token = line.split_whitespace().nth(1).expect("token").to_string();
    assert!(!engine.fulfill_line(&format!("pick {token} Bobo")));
}

// ============================================================================
// Resolution outcomes
// ============================================================================

#[tokio::test]
async fn listing_respects_origin_gating() {
    let (engine, _) = default_engine();

    let outcome = engine
        .run_line(Arc::new(MockCaller::player("ada")), "bank")
        .await;
    let RunOutcome::Listing { path, children } = outcome else {
        panic!("expected listing");
    };
    assert_eq!(path, "bank");
    assert_eq!(children, ["pay", "bed"]);

    // The console never sees the player-only leaf.
    let outcome = engine
        .run_line(Arc::new(MockCaller::console()), "bank")
        .await;
    let RunOutcome::Listing { children, .. } = outcome else {
        panic!("expected listing");
    };
    assert_eq!(children, ["pay"]);
}

#[tokio::test]
async fn origin_gating_hides_a_leaf_entirely() {
    let (engine, _) = default_engine();

    // "bed" is an exact name, but a gated one is as good as absent, and
    // nothing visible is close enough to suggest.
    let outcome = engine
        .run_line(Arc::new(MockCaller::console()), "bank bed")
        .await;
    let RunOutcome::NotFound { suggestion } = outcome else {
        panic!("expected not-found");
    };
    assert_eq!(suggestion, None);
}

#[tokio::test]
async fn partial_build_serves_the_healthy_roots() {
    init_tracing();
    let (engine, report) = EngineBuilder::new()
        .root(CategoryDecl::new("ok").leaf(LeafDecl::new("go", |_| Ok(()))))
        .root(CategoryDecl::new("bad name").leaf(LeafDecl::new("go", |_| Ok(()))))
        .build()
        .expect("engine builds");
    assert_eq!(report.built, ["ok"]);
    assert_eq!(report.failed.len(), 1);
    assert!(report.failure_lines()[0].contains("bad name"));

    let outcome = engine
        .run_line(Arc::new(MockCaller::player("ada")), "ok go")
        .await;
    assert!(matches!(outcome, RunOutcome::Dispatched(_)));
}

// ============================================================================
// Dispatch contract
// ============================================================================

#[tokio::test]
async fn sync_leaf_waits_for_the_host_tick() {
    init_tracing();
    let fired = Arc::new(Mutex::new(false));
    let sink = Arc::clone(&fired);
    let (lane, mut receiver) = SyncLane::new();
    let (engine, _) = EngineBuilder::new()
        .sync_executor(Arc::new(lane))
        .root(
            CategoryDecl::new("world").leaf(
                LeafDecl::new("save", move |_| {
                    *sink.lock().unwrap() = true;
                    Ok(())
                })
                .sync(),
            ),
        )
        .build()
        .expect("engine builds");

    let outcome = engine
        .run_line(Arc::new(MockCaller::player("ada")), "world save")
        .await;
    assert!(matches!(
        outcome,
        RunOutcome::Dispatched(DispatchReceipt::Scheduled)
    ));
    assert!(!*fired.lock().unwrap());

    assert_eq!(receiver.drain(), 1);
    assert!(*fired.lock().unwrap());
}

#[tokio::test]
async fn handler_panic_is_contained_at_the_boundary() {
    init_tracing();
    let (engine, _) = EngineBuilder::new()
        .root(CategoryDecl::new("ops").leaf(LeafDecl::new("explode", |_| panic!("boom"))))
        .build()
        .expect("engine builds");
    let caller = Arc::new(MockCaller::player("ada"));

    let outcome = engine.run_line(caller.clone(), "ops explode").await;
    assert!(matches!(
        outcome,
        RunOutcome::Dispatched(DispatchReceipt::Completed)
    ));
    assert_eq!(caller.sent(), [FAILURE_LINE]);
}

#[tokio::test]
async fn handler_error_is_one_generic_line() {
    init_tracing();
    let (engine, _) = EngineBuilder::new()
        .root(CategoryDecl::new("ops").leaf(LeafDecl::new("fail", |_| {
            Err(anyhow::anyhow!("db connection refused"))
        })))
        .build()
        .expect("engine builds");
    let caller = Arc::new(MockCaller::player("ada"));

    engine.run_line(caller.clone(), "ops fail").await;
    assert_eq!(caller.sent(), [FAILURE_LINE]);
    assert!(!caller.saw("db connection"));
}

// ============================================================================
// Completion
// ============================================================================

#[test]
fn completion_walks_categories_and_parameters() {
    let (engine, _) = default_engine();
    let caller = MockCaller::player("ada");

    // Child names under a category, gated.
    let toks = |parts: &[&str]| parts.iter().map(|p| p.to_string()).collect::<Vec<_>>();
    assert_eq!(engine.complete(&caller, "bank", &toks(&[""])), ["pay", "bed"]);
    assert_eq!(
        engine.complete(&MockCaller::console(), "bank", &toks(&[""])),
        ["pay"]
    );

    // name=value pairs at a leaf, narrowed by the partial.
    let suggestions = engine.complete(&caller, "mod", &toks(&["kick", "who=bob"]));
    assert_eq!(suggestions, ["who=Bobby", "who=Bobo"]);

    let suggestions = engine.complete(&caller, "mod", &toks(&["kick", "who=ann"]));
    assert_eq!(suggestions, ["who=Ann"]);

    // A supplied parameter stops suggesting.
    let suggestions = engine.complete(&caller, "mod", &toks(&["kick", "who=Ann", ""]));
    assert!(suggestions.is_empty());
}
