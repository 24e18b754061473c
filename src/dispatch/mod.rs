//! dispatch
//!
//! Runs resolved commands and shields the engine from them.
//!
//! # Architecture
//!
//! A dispatched leaf runs in one of two lanes. Ordinary leaves run on the
//! current task as soon as binding finishes. Leaves marked synchronous
//! (directly or through an ancestor) are handed to the host's
//! [`SyncExecutor`], which decides when and on which thread they run; the
//! dispatcher reports [`DispatchReceipt::Scheduled`] and moves on.
//!
//! Either way the handler runs behind a guard: a returned error or a
//! panic is logged with the full command path and the caller receives one
//! generic failure line. Handler trouble never crosses back into the
//! engine.
//!
//! # Invariants
//!
//! - The dispatcher never blocks on a scheduled job.
//! - Handler errors and panics are contained; the caller sees
//!   [`FAILURE_LINE`] and nothing of the internals.
//! - Jobs queued on a [`SyncLane`] run in schedule order when the host
//!   drains them.

use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::bind::BoundArgs;
use crate::caller::Caller;
use crate::tree::Leaf;

/// A leaf's handler body.
///
/// Handlers report failure through `anyhow`; the dispatcher logs the chain
/// and keeps the details away from the caller.
pub type HandlerFn = Arc<dyn Fn(&Invocation) -> anyhow::Result<()> + Send + Sync>;

/// A unit of work queued on a [`SyncExecutor`].
pub type SyncJob = Box<dyn FnOnce() + Send>;

/// The one line a caller sees when a handler fails for any reason.
pub const FAILURE_LINE: &str = "The command could not be completed.";

/// Everything a handler receives: who called, the resolved path, the
/// bound arguments.
#[derive(Clone)]
pub struct Invocation {
    pub caller: Arc<dyn Caller>,
    /// Space-joined primary names from root to leaf.
    pub path: String,
    pub args: BoundArgs,
}

impl fmt::Debug for Invocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Invocation")
            .field("caller", &self.caller.display_name())
            .field("path", &self.path)
            .field("args", &self.args)
            .finish()
    }
}

/// How the dispatcher delivered a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchReceipt {
    /// The handler ran to completion on the current task.
    Completed,
    /// The handler was queued on the synchronous executor.
    Scheduled,
}

/// Where synchronous leaves run.
///
/// Hosts with a designated thread (a game tick, a UI loop) implement this
/// to queue work there. [`InlineExecutor`] is the default for hosts
/// without that constraint; [`SyncLane`] is a ready-made queue for hosts
/// with one.
pub trait SyncExecutor: Send + Sync {
    /// Queue a job. Must not run it on the calling thread synchronously
    /// unless that is the designated thread.
    fn schedule(&self, job: SyncJob);
}

/// Runs scheduled jobs immediately on the calling thread.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineExecutor;

impl SyncExecutor for InlineExecutor {
    fn schedule(&self, job: SyncJob) {
        job();
    }
}

/// Sending half of a queue-backed executor.
///
/// Hand the [`SyncLaneReceiver`] to whatever owns the designated thread
/// and call [`drain`](SyncLaneReceiver::drain) once per tick.
#[derive(Debug, Clone)]
pub struct SyncLane {
    tx: mpsc::UnboundedSender<SyncJob>,
}

/// Receiving half of a [`SyncLane`].
#[derive(Debug)]
pub struct SyncLaneReceiver {
    rx: mpsc::UnboundedReceiver<SyncJob>,
}

impl SyncLane {
    pub fn new() -> (Self, SyncLaneReceiver) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, SyncLaneReceiver { rx })
    }
}

impl SyncExecutor for SyncLane {
    fn schedule(&self, job: SyncJob) {
        // A closed receiver means the host is gone; the job goes with it.
        let _ = self.tx.send(job);
    }
}

impl SyncLaneReceiver {
    /// Run every job queued so far, in schedule order.
    ///
    /// Returns how many ran. Jobs queued while draining run in the same
    /// call.
    pub fn drain(&mut self) -> usize {
        let mut ran = 0;
        while let Ok(job) = self.rx.try_recv() {
            job();
            ran += 1;
        }
        ran
    }
}

/// Runs resolved leaves behind the guard.
pub struct Dispatcher {
    executor: Arc<dyn SyncExecutor>,
}

impl fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher").finish_non_exhaustive()
    }
}

impl Dispatcher {
    pub fn new(executor: Arc<dyn SyncExecutor>) -> Self {
        Self { executor }
    }

    /// Run `invocation` against `leaf`.
    ///
    /// Synchronous leaves are queued and [`DispatchReceipt::Scheduled`]
    /// comes back immediately; everything else runs right here.
    pub fn dispatch(&self, leaf: &Leaf, invocation: Invocation) -> DispatchReceipt {
        if leaf.meta().sync() {
            let handler = Arc::clone(leaf.handler());
            self.executor.schedule(Box::new(move || {
                run_guarded(&handler, &invocation);
            }));
            DispatchReceipt::Scheduled
        } else {
            run_guarded(leaf.handler(), &invocation);
            DispatchReceipt::Completed
        }
    }
}

/// Run one handler, containing failures and panics.
fn run_guarded(handler: &HandlerFn, invocation: &Invocation) {
    match catch_unwind(AssertUnwindSafe(|| handler(invocation))) {
        Ok(Ok(())) => {
            tracing::debug!(path = %invocation.path,
                caller = invocation.caller.display_name(), "command completed");
        }
        Ok(Err(error)) => {
            tracing::error!(path = %invocation.path,
                caller = invocation.caller.display_name(),
                "command handler failed: {error:#}");
            invocation.caller.send(FAILURE_LINE);
        }
        Err(_) => {
            tracing::error!(path = %invocation.path,
                caller = invocation.caller.display_name(), "command handler panicked");
            invocation.caller.send(FAILURE_LINE);
        }
    }
}
