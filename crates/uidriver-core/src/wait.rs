//! Wait conditions: predicates with an interval and a timeout.
//!
//! A [`WaitCondition`] does not sleep or poll by itself. It is evaluated by a
//! step each time the scheduler re-invokes that step, and answers with what
//! should happen next: pass, retry after an interval, or give up. The timeout
//! comparison is strict, so a condition evaluated at exactly its timeout
//! still gets one more retry.

use std::sync::Arc;
use std::time::Duration;

use crate::locator::By;
use crate::tree::UiTree;

/// Default timeout for the standard conditions.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(3);

/// Default retry interval for the standard conditions.
pub const DEFAULT_INTERVAL: Duration = Duration::from_millis(100);

/// The outcome of evaluating a condition at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitResponse {
    /// The predicate holds.
    Passed,
    /// The predicate does not hold yet; re-evaluate after this interval.
    Wait(Duration),
    /// The predicate did not hold and the elapsed time exceeded the timeout.
    Failed,
}

type Predicate = dyn Fn(&dyn UiTree) -> bool + Send + Sync;

/// A predicate over the UI tree paired with retry timing.
///
/// Cheap to clone; clones share the predicate.
#[derive(Clone)]
pub struct WaitCondition {
    description: String,
    predicate: Arc<Predicate>,
    interval: Duration,
    timeout: Duration,
}

impl WaitCondition {
    /// Builds a condition from an arbitrary predicate.
    pub fn new<F>(description: impl Into<String>, predicate: F) -> Self
    where
        F: Fn(&dyn UiTree) -> bool + Send + Sync + 'static,
    {
        Self {
            description: description.into(),
            predicate: Arc::new(predicate),
            interval: DEFAULT_INTERVAL,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Overrides the retry interval.
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Overrides the timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Human-readable description, used in logs and timeout errors.
    pub fn description(&self) -> &str {
        &self.description
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Evaluates the predicate against the current tree.
    ///
    /// Fails only when the predicate does not hold *and* `elapsed` strictly
    /// exceeds the timeout; at `elapsed == timeout` the answer is still
    /// [`WaitResponse::Wait`].
    pub fn evaluate(&self, tree: &dyn UiTree, elapsed: Duration) -> WaitResponse {
        if (self.predicate)(tree) {
            return WaitResponse::Passed;
        }
        if elapsed > self.timeout {
            return WaitResponse::Failed;
        }
        WaitResponse::Wait(self.interval)
    }
}

impl std::fmt::Debug for WaitCondition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitCondition")
            .field("description", &self.description)
            .field("interval", &self.interval)
            .field("timeout", &self.timeout)
            .finish()
    }
}

/// Constructors for the standard element conditions.
///
/// Zero located elements is a failing predicate, never an error; a condition
/// built here simply keeps retrying until something matches or time runs out.
pub mod until {
    use super::*;

    /// At least one element matches the locator.
    pub fn element_exists(locator: By) -> WaitCondition {
        let description = format!("element {locator} exists");
        WaitCondition::new(description, move |tree| !locator.locate(tree).is_empty())
    }

    /// At least one element matches and every match is visible.
    pub fn element_is_visible(locator: By) -> WaitCondition {
        let description = format!("element {locator} is visible");
        WaitCondition::new(description, move |tree| {
            let found = locator.locate(tree);
            !found.is_empty() && found.iter().all(|e| tree.is_visible(e.node()))
        })
    }

    /// Every match is visible and accepts input.
    pub fn element_is_interactable(locator: By) -> WaitCondition {
        let description = format!("element {locator} is interactable");
        WaitCondition::new(description, move |tree| {
            let found = locator.locate(tree);
            !found.is_empty()
                && found
                    .iter()
                    .all(|e| tree.is_visible(e.node()) && tree.is_interactable(e.node()))
        })
    }

    /// Every match reports its scroll position at the beginning.
    pub fn element_is_scrolled_to_beginning(locator: By) -> WaitCondition {
        let description = format!("element {locator} is scrolled to beginning");
        WaitCondition::new(description, move |tree| {
            let found = locator.locate(tree);
            !found.is_empty()
                && found
                    .iter()
                    .all(|e| tree.scroll_state(e.node()).is_some_and(|s| s.at_beginning))
        })
    }

    /// Every match reports its scroll position at the end.
    pub fn element_is_scrolled_to_end(locator: By) -> WaitCondition {
        let description = format!("element {locator} is scrolled to end");
        WaitCondition::new(description, move |tree| {
            let found = locator.locate(tree);
            !found.is_empty()
                && found
                    .iter()
                    .all(|e| tree.scroll_state(e.node()).is_some_and(|s| s.at_end))
        })
    }

    /// An arbitrary boolean callback over the tree.
    pub fn condition<F>(description: impl Into<String>, predicate: F) -> WaitCondition
    where
        F: Fn(&dyn UiTree) -> bool + Send + Sync + 'static,
    {
        WaitCondition::new(description, predicate)
    }
}
