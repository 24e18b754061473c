//! caller::mock
//!
//! Mock caller implementation for deterministic testing.
//!
//! # Design
//!
//! The mock caller records every line sent to it and lets tests configure
//! origin, permissions, and interactivity up front. Cloning shares the
//! recorded transcript, so a test can hand a clone to the engine and inspect
//! the original afterwards.
//!
//! # Example
//!
//! ```
//! use behest::caller::{Caller, MockCaller, Origin};
//!
//! let caller = MockCaller::player("Sarah");
//! assert_eq!(caller.origin(), Origin::Player);
//! assert!(caller.supports_prompts());
//!
//! caller.send("hello");
//! assert_eq!(caller.sent(), vec!["hello".to_string()]);
//! ```

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use super::{Caller, Origin};

/// Recording caller for tests.
///
/// Thread-safe via internal `Arc<Mutex<...>>` wrapping.
#[derive(Debug, Clone)]
pub struct MockCaller {
    name: String,
    origin: Origin,
    prompts: bool,
    /// `None` grants every permission; `Some` grants only the listed ones.
    granted: Option<HashSet<String>>,
    inner: Arc<Mutex<MockCallerInner>>,
}

/// Internal mutable state.
#[derive(Debug, Default)]
struct MockCallerInner {
    sent: Vec<String>,
}

impl MockCaller {
    /// An interactive in-world caller holding every permission.
    pub fn player(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            origin: Origin::Player,
            prompts: true,
            granted: None,
            inner: Arc::new(Mutex::new(MockCallerInner::default())),
        }
    }

    /// A console caller holding every permission, unable to answer prompts.
    pub fn console() -> Self {
        Self {
            name: "console".to_string(),
            origin: Origin::Console,
            prompts: false,
            granted: None,
            inner: Arc::new(Mutex::new(MockCallerInner::default())),
        }
    }

    /// Restrict the caller to exactly the listed permissions.
    pub fn with_permissions<I, S>(mut self, permissions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.granted = Some(permissions.into_iter().map(Into::into).collect());
        self
    }

    /// Disable interactive follow-up for this caller.
    pub fn without_prompts(mut self) -> Self {
        self.prompts = false;
        self
    }

    /// Enable interactive follow-up for this caller.
    pub fn with_prompts(mut self) -> Self {
        self.prompts = true;
        self
    }

    /// Every line delivered so far, in order.
    pub fn sent(&self) -> Vec<String> {
        self.inner.lock().expect("mock caller lock").sent.clone()
    }

    /// True if any delivered line contains `needle`.
    pub fn saw(&self, needle: &str) -> bool {
        self.inner
            .lock()
            .expect("mock caller lock")
            .sent
            .iter()
            .any(|line| line.contains(needle))
    }

    /// Forget the transcript.
    pub fn clear(&self) {
        self.inner.lock().expect("mock caller lock").sent.clear();
    }
}

impl Caller for MockCaller {
    fn display_name(&self) -> &str {
        &self.name
    }

    fn origin(&self) -> Origin {
        self.origin
    }

    fn has_permission(&self, permission: &str) -> bool {
        match &self.granted {
            None => true,
            Some(set) => set.contains(permission),
        }
    }

    fn supports_prompts(&self) -> bool {
        self.prompts
    }

    fn send(&self, line: &str) {
        self.inner
            .lock()
            .expect("mock caller lock")
            .sent
            .push(line.to_string());
    }
}
