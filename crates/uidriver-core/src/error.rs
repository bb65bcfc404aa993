//! Error taxonomy for the automation engine.
//!
//! Failures fall into two families: *retryable* conditions that individual
//! steps poll for until the implicit wait elapses (element not found, not
//! visible, not interactable, not hovered), and *programmer errors* that fail
//! fast the moment they are detected (queue misuse, malformed locator paths,
//! overlapping performs). Both families share this one enum so logs and step
//! results report failures uniformly.

use thiserror::Error;

/// Errors produced by locators, the step executor, and the driver facade.
#[derive(Error, Debug, Clone)]
pub enum AutomationError {
    /// More than one element matched a locator that requires exactly one.
    #[error("more than one element matched locator {locator}")]
    AmbiguousLocator {
        /// Debug representation of the offending locator.
        locator: String,
    },

    /// No element matched the locator within the implicit wait.
    #[error("no element matched locator {locator}")]
    LocatorNotFound {
        /// Debug representation of the offending locator.
        locator: String,
    },

    /// The element was located but is not visible.
    #[error("element {locator} is not visible")]
    ElementNotVisible {
        /// Debug representation of the offending locator.
        locator: String,
    },

    /// The element was located but is not interactable.
    #[error("element {locator} is not interactable")]
    ElementNotInteractable {
        /// Debug representation of the offending locator.
        locator: String,
    },

    /// The element has no owning window to activate.
    #[error("element {locator} has no owning window")]
    ElementHasNoWindow {
        /// Debug representation of the offending locator.
        locator: String,
    },

    /// A click was attempted on an element that is not under the cursor.
    #[error("element {locator} is not under the cursor")]
    ElementNotHovered {
        /// Debug representation of the offending locator.
        locator: String,
    },

    /// `perform` was called while a previous perform is still in flight,
    /// or `execute` was called twice on one executor.
    #[error("sequence is already executing")]
    SequenceAlreadyExecuting,

    /// A locator path failed to compile.
    #[error("invalid locator path {path:?}: {reason}")]
    PathCompile {
        /// The original path string.
        path: String,
        /// Why compilation failed.
        reason: String,
    },

    /// A wait condition did not pass before its timeout.
    #[error("wait condition {description:?} timed out")]
    WaitTimedOut {
        /// Human-readable description of the condition.
        description: String,
    },

    /// Steps may only be appended before execution starts.
    #[error("steps can only be appended before execution starts")]
    AppendAfterExecute,

    /// Steps may only be spliced in while the queue is executing.
    #[error("steps can only be inserted while the queue is executing")]
    InsertOutsideExecution,

    /// The driver has been disabled.
    #[error("the automation driver is disabled")]
    DriverDisabled,
}
