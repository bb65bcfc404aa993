//! # uidriver-core
//!
//! Engine for driving UI tests with simulated user input.
//!
//! Callers describe a batch of actions (move, click, type, scroll, wait)
//! against elements located in a live, mutable UI tree, then perform the
//! batch with retry-until-timeout semantics and get an asynchronous
//! pass/fail answer. The engine owns none of the UI: it consumes a
//! [`tree::UiTree`] to locate elements and an [`input::InputDispatcher`] to
//! deliver events, both supplied at driver construction.
//!
//! ## Modules
//!
//! - [`driver`] - The [`Driver`](driver::Driver) facade: element finding,
//!   sequence creation, waits, configuration
//! - [`sequence`] - Fluent action-sequence builder and composite action
//!   decomposition
//! - [`step`] - The cooperative step scheduler behind every perform
//! - [`locator`] - [`By`](locator::By) locators and the backtracking tree
//!   search
//! - [`path`] - Locator path syntax (`"#Suite//Piano/Key//<TextBlock>"`)
//! - [`wait`] - Wait conditions with interval/timeout semantics
//! - [`tree`] / [`input`] - The collaborator traits callers implement
//! - [`report`] - Per-run execution reports
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use uidriver_core::{By, Driver, MouseButton};
//! # use uidriver_core::{InputDispatcher, UiTree};
//!
//! # async fn run(tree: Arc<dyn UiTree>, input: Arc<dyn InputDispatcher>) {
//! let driver = Driver::new(tree, input, tokio::runtime::Handle::current());
//!
//! let user = By::id("UserName");
//! let passed = driver
//!     .create_sequence()
//!     .click(user.clone(), MouseButton::Left)
//!     .type_text("automation")
//!     .perform()
//!     .await
//!     .unwrap();
//! assert!(passed);
//! # }
//! ```

pub mod driver;
pub mod error;
pub mod input;
pub mod locator;
pub mod path;
pub mod report;
pub mod sequence;
pub mod step;
pub mod tree;
pub mod wait;

pub use driver::{Driver, DriverConfiguration, DriverElement, DriverElements};
pub use error::AutomationError;
pub use input::{InputDispatcher, InputState, Key, ModifierKeys, MouseButton};
pub use locator::By;
pub use report::SequenceReport;
pub use sequence::{ActionSequence, PendingRun};
pub use step::{Completion, Step, StepExecutor, StepQueue, StepResult, StepScope, StepState};
pub use tree::{
    ElementHandle, Extent, MetadataKind, NodeId, Point, ScrollState, UiTree, WindowId,
};
pub use wait::{until, WaitCondition, WaitResponse};
