//! ambiguity
//!
//! Pending-choice table for ambiguous value resolution.
//!
//! # Design
//!
//! When a token parses to several values and policy says the caller should
//! choose, the binder opens a request here and suspends on the returned
//! [`Ticket`]. The caller answers out of band with a correlated line; the
//! engine routes that to [`AmbiguityTable::fulfill`], which completes the
//! ticket's channel exactly once.
//!
//! Correlation tokens are unguessable and single-use. A request expires
//! after the configured decision window; expiry is checked on every access
//! rather than by a background timer, and a rate-limited sweep piggybacked
//! on table access clears entries nobody ever answered or awaited.
//!
//! # Invariants
//!
//! - A request is fulfilled at most once; later answers are ignored.
//! - An answer after the deadline is ignored and drops the request.
//! - An answer naming a non-candidate value is ignored and the request
//!   stays answerable until its deadline.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::oneshot;
use tokio::time::Instant;
use uuid::Uuid;

/// Unguessable handle correlating a prompt with its answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CorrelationToken(Uuid);

impl CorrelationToken {
    fn mint() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a token printed earlier with `Display`.
    pub fn parse(text: &str) -> Option<Self> {
        Uuid::parse_str(text).ok().map(Self)
    }
}

impl fmt::Display for CorrelationToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.simple())
    }
}

struct Pending {
    candidates: Vec<String>,
    deadline: Instant,
    tx: oneshot::Sender<String>,
}

struct TableInner {
    pending: HashMap<CorrelationToken, Pending>,
    last_sweep: Instant,
}

/// One opened request, held by the suspending binder.
pub struct Ticket {
    token: CorrelationToken,
    deadline: Instant,
    rx: oneshot::Receiver<String>,
}

impl Ticket {
    /// The token the caller must echo back.
    pub fn token(&self) -> CorrelationToken {
        self.token
    }
}

/// The shared table of unanswered requests.
pub struct AmbiguityTable {
    inner: Mutex<TableInner>,
    decision_window: Duration,
    sweep_interval: Duration,
}

impl AmbiguityTable {
    pub fn new(decision_window: Duration, sweep_interval: Duration) -> Self {
        Self {
            inner: Mutex::new(TableInner {
                pending: HashMap::new(),
                last_sweep: Instant::now(),
            }),
            decision_window,
            sweep_interval,
        }
    }

    fn lock(&self) -> MutexGuard<'_, TableInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open a request over the given candidate texts.
    pub fn open(&self, candidates: Vec<String>) -> Ticket {
        let (tx, rx) = oneshot::channel();
        let token = CorrelationToken::mint();
        let deadline = Instant::now() + self.decision_window;
        let mut inner = self.lock();
        self.sweep_locked(&mut inner);
        inner.pending.insert(
            token,
            Pending {
                candidates,
                deadline,
                tx,
            },
        );
        Ticket {
            token,
            deadline,
            rx,
        }
    }

    /// Suspend until the request is answered or its deadline passes.
    ///
    /// `None` means expiry; the caller must treat the value as not
    /// provided, never fall back to a default silently.
    pub async fn await_choice(&self, ticket: Ticket) -> Option<String> {
        match tokio::time::timeout_at(ticket.deadline, ticket.rx).await {
            Ok(Ok(choice)) => Some(choice),
            Ok(Err(_)) | Err(_) => {
                self.abandon(ticket.token);
                None
            }
        }
    }

    /// Answer a request. Returns whether the answer was accepted.
    ///
    /// Unknown tokens and late answers are ignored; a late answer also
    /// drops the request. An answer that names no candidate is ignored
    /// without dropping the request.
    pub fn fulfill(&self, token: CorrelationToken, choice: &str) -> bool {
        let mut inner = self.lock();
        self.sweep_locked(&mut inner);
        match inner.pending.get(&token) {
            None => false,
            Some(entry) if Instant::now() >= entry.deadline => {
                inner.pending.remove(&token);
                tracing::debug!(%token, "ambiguity answer arrived after expiry");
                false
            }
            Some(entry) if !entry.candidates.iter().any(|c| c == choice) => false,
            Some(_) => {
                if let Some(entry) = inner.pending.remove(&token) {
                    // The binder may have given up; a dead receiver is fine.
                    let _ = entry.tx.send(choice.to_string());
                }
                true
            }
        }
    }

    /// Drop a request without an answer.
    pub fn abandon(&self, token: CorrelationToken) {
        self.lock().pending.remove(&token);
    }

    /// Number of unanswered requests, expired ones included until swept.
    pub fn pending_len(&self) -> usize {
        self.lock().pending.len()
    }

    fn sweep_locked(&self, inner: &mut TableInner) {
        let now = Instant::now();
        if now.duration_since(inner.last_sweep) < self.sweep_interval {
            return;
        }
        inner.last_sweep = now;
        let before = inner.pending.len();
        inner.pending.retain(|_, entry| now < entry.deadline);
        let removed = before - inner.pending.len();
        if removed > 0 {
            tracing::debug!(removed, "swept expired ambiguity requests");
        }
    }
}

impl fmt::Debug for AmbiguityTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AmbiguityTable")
            .field("pending", &self.pending_len())
            .field("decision_window", &self.decision_window)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WINDOW: Duration = Duration::from_secs(15);
    const SWEEP: Duration = Duration::from_secs(30);

    fn table() -> AmbiguityTable {
        AmbiguityTable::new(WINDOW, SWEEP)
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn token_text_round_trips() {
        let table = table();
        let ticket = table.open(names(&["a"]));
        let text = ticket.token().to_string();
        assert_eq!(CorrelationToken::parse(&text), Some(ticket.token()));
        assert!(CorrelationToken::parse("not-a-token").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn answer_reaches_the_waiter() {
        let table = table();
        let ticket = table.open(names(&["Bobby", "Bobo"]));
        assert!(table.fulfill(ticket.token(), "Bobo"));
        assert_eq!(table.await_choice(ticket).await.as_deref(), Some("Bobo"));
        assert_eq!(table.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn second_answer_is_ignored() {
        let table = table();
        let ticket = table.open(names(&["Bobby", "Bobo"]));
        let token = ticket.token();
        assert!(table.fulfill(token, "Bobby"));
        assert!(!table.fulfill(token, "Bobo"));
        assert_eq!(table.await_choice(ticket).await.as_deref(), Some("Bobby"));
    }

    #[test]
    fn unknown_token_is_ignored() {
        let table = table();
        let stray = {
            let other = AmbiguityTable::new(WINDOW, SWEEP);
            other.open(names(&["x"])).token()
        };
        assert!(!table.fulfill(stray, "x"));
    }

    #[test]
    fn non_candidate_answer_keeps_request_alive() {
        let table = table();
        let ticket = table.open(names(&["Bobby", "Bobo"]));
        assert!(!table.fulfill(ticket.token(), "bobby"));
        assert_eq!(table.pending_len(), 1);
        assert!(table.fulfill(ticket.token(), "Bobby"));
    }

    #[tokio::test(start_paused = true)]
    async fn expiry_means_not_provided() {
        let table = table();
        let ticket = table.open(names(&["Bobby", "Bobo"]));
        let token = ticket.token();
        assert_eq!(table.await_choice(ticket).await, None);
        assert!(!table.fulfill(token, "Bobby"));
        assert_eq!(table.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_answer_drops_the_request() {
        let table = table();
        let ticket = table.open(names(&["Bobby"]));
        tokio::time::advance(WINDOW + Duration::from_millis(1)).await;
        assert!(!table.fulfill(ticket.token(), "Bobby"));
        assert_eq!(table.pending_len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn sweep_is_rate_limited() {
        let table = table();
        let _a = table.open(names(&["a"]));
        let _b = table.open(names(&["b"]));
        assert_eq!(table.pending_len(), 2);

        // Past the first deadlines but before the sweep interval: stay.
        tokio::time::advance(WINDOW + Duration::from_secs(1)).await;
        let _c = table.open(names(&["c"]));
        assert_eq!(table.pending_len(), 3);

        // Past the sweep interval with c still alive: a and b are purged
        // by the next access.
        tokio::time::advance(Duration::from_secs(14)).await;
        let _d = table.open(names(&["d"]));
        assert_eq!(table.pending_len(), 2);
    }
}
