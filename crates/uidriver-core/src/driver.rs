//! The driver facade: the single entry point callers hold.
//!
//! A [`Driver`] is an explicit instance wired up with its two collaborators
//! (the UI tree and the input dispatcher) plus the runtime handle that hosts
//! scheduler tasks. It hands out lazy [`DriverElement`]s, builds
//! [`ActionSequence`]s, and owns the shared state a run needs: the
//! pressed-input record and the mutable configuration. Only one sequence
//! should execute at a time; the pressed-input record is process-wide.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, RwLock};
use std::time::Duration;

use tokio::runtime::Handle;
use tracing::debug;

use crate::error::AutomationError;
use crate::input::{InputDispatcher, InputState, Key, ModifierKeys, MouseButton};
use crate::locator::By;
use crate::sequence::{cursor_within, ActionSequence};
use crate::tree::{ElementHandle, Extent, NodeId, Point, UiTree};
use crate::wait::{WaitCondition, WaitResponse};

/// Tunables shared by every sequence the driver performs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DriverConfiguration {
    /// How long element guards retry before failing a step.
    pub implicit_wait: Duration,
    /// Delay between guard retries.
    pub wait_interval: Duration,
    /// Scales every scheduler delay; above 1.0 slows execution down.
    pub speed_multiplier: f64,
}

impl Default for DriverConfiguration {
    fn default() -> Self {
        Self {
            implicit_wait: Duration::from_secs(3),
            wait_interval: Duration::from_millis(100),
            speed_multiplier: 1.0,
        }
    }
}

/// Shared wiring behind a driver and everything it hands out.
pub(crate) struct DriverContext {
    pub(crate) tree: Arc<dyn UiTree>,
    pub(crate) input: Arc<dyn InputDispatcher>,
    pub(crate) runtime: Handle,
    state: Mutex<InputState>,
    config: RwLock<DriverConfiguration>,
    enabled: AtomicBool,
}

impl DriverContext {
    pub(crate) fn config(&self) -> DriverConfiguration {
        *self.config.read().expect("configuration lock poisoned")
    }

    pub(crate) fn input_state(&self) -> MutexGuard<'_, InputState> {
        self.state.lock().expect("input state lock poisoned")
    }

    pub(crate) fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }
}

/// The automation driver.
///
/// Construction enables it; [`disable`](Driver::disable) makes every
/// subsequent perform fail with [`AutomationError::DriverDisabled`] without
/// touching in-flight runs.
pub struct Driver {
    context: Arc<DriverContext>,
}

impl Driver {
    /// Wires a driver to its collaborators. `runtime` hosts the scheduler
    /// task of every performed sequence.
    pub fn new(tree: Arc<dyn UiTree>, input: Arc<dyn InputDispatcher>, runtime: Handle) -> Self {
        debug!("automation driver created");
        Self {
            context: Arc::new(DriverContext {
                tree,
                input,
                runtime,
                state: Mutex::new(InputState::new()),
                config: RwLock::new(DriverConfiguration::default()),
                enabled: AtomicBool::new(true),
            }),
        }
    }

    pub fn enable(&self) {
        self.context.enabled.store(true, Ordering::SeqCst);
    }

    pub fn disable(&self) {
        self.context.enabled.store(false, Ordering::SeqCst);
    }

    pub fn is_enabled(&self) -> bool {
        self.context.is_enabled()
    }

    /// Snapshot of the current configuration.
    pub fn configuration(&self) -> DriverConfiguration {
        self.context.config()
    }

    /// Mutates the configuration in place; later performs pick up the change.
    pub fn configure(&self, apply: impl FnOnce(&mut DriverConfiguration)) {
        let mut config = self
            .context
            .config
            .write()
            .expect("configuration lock poisoned");
        apply(&mut config);
    }

    /// A lazy handle to the single element the locator should match.
    ///
    /// Nothing is resolved here; call [`DriverElement::exists`] or any query
    /// to resolve against the live tree.
    pub fn find_element(&self, locator: By) -> DriverElement {
        DriverElement {
            context: Arc::clone(&self.context),
            locator,
        }
    }

    /// A lazy collection of every element the locator matches.
    pub fn find_elements(&self, locator: By) -> DriverElements {
        DriverElements {
            context: Arc::clone(&self.context),
            locator,
        }
    }

    /// An empty sequence bound to this driver.
    pub fn create_sequence(&self) -> ActionSequence {
        ActionSequence::new(Arc::clone(&self.context))
    }

    /// Sleeps for the duration (outside any sequence).
    pub async fn wait(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Polls the condition at its own interval until it passes or times out.
    pub async fn wait_until(&self, condition: WaitCondition) -> Result<(), AutomationError> {
        let mut elapsed = Duration::ZERO;
        loop {
            match condition.evaluate(self.context.tree.as_ref(), elapsed) {
                WaitResponse::Passed => return Ok(()),
                WaitResponse::Failed => {
                    return Err(AutomationError::WaitTimedOut {
                        description: condition.description().to_string(),
                    })
                }
                WaitResponse::Wait(interval) => {
                    tokio::time::sleep(interval).await;
                    elapsed += interval;
                }
            }
        }
    }

    /// Where the driver last moved the cursor.
    pub fn cursor_position(&self) -> Point {
        self.context.input_state().cursor()
    }

    /// Modifier keys the driver currently holds down.
    pub fn modifier_keys(&self) -> ModifierKeys {
        self.context.input_state().modifier_keys()
    }
}

/// Lazy handle to the single element a locator should match.
///
/// Every query re-resolves against the live tree. A locator matching more
/// than one element resolves to nothing: ambiguity and absence are the same
/// answer for single-element use.
pub struct DriverElement {
    context: Arc<DriverContext>,
    locator: By,
}

impl DriverElement {
    pub fn locator(&self) -> &By {
        &self.locator
    }

    fn resolve(&self) -> Option<ElementHandle> {
        let mut found = self.locator.locate(self.context.tree.as_ref());
        if found.len() == 1 {
            Some(found.remove(0))
        } else {
            None
        }
    }

    /// Whether exactly one element currently matches.
    pub fn exists(&self) -> bool {
        self.resolve().is_some()
    }

    pub fn is_visible(&self) -> bool {
        self.resolve()
            .is_some_and(|h| self.context.tree.is_visible(h.node()))
    }

    pub fn is_interactable(&self) -> bool {
        self.resolve().is_some_and(|h| {
            let tree = self.context.tree.as_ref();
            tree.is_visible(h.node()) && tree.is_interactable(h.node())
        })
    }

    /// Whether the driver's cursor currently sits inside the element.
    pub fn is_hovered(&self) -> bool {
        self.resolve().is_some_and(|h| {
            let cursor = self.context.input_state().cursor();
            cursor_within(self.context.tree.as_ref(), h.node(), cursor)
        })
    }

    pub fn is_focused(&self) -> bool {
        self.resolve()
            .is_some_and(|h| self.context.tree.is_focused(h.node()))
    }

    /// Whether the element is able to receive keyboard focus at all.
    pub fn can_focus(&self) -> bool {
        self.resolve()
            .is_some_and(|h| self.context.tree.can_focus(h.node()))
    }

    /// Whether any node below the element holds focus.
    pub fn has_focused_descendants(&self) -> bool {
        fn any_focused(tree: &dyn UiTree, node: NodeId) -> bool {
            tree.arrange_children(node)
                .into_iter()
                .any(|child| tree.is_focused(child) || any_focused(tree, child))
        }
        self.resolve()
            .is_some_and(|h| any_focused(self.context.tree.as_ref(), h.node()))
    }

    pub fn absolute_position(&self) -> Option<Point> {
        self.resolve()
            .and_then(|h| self.context.tree.absolute_position(h.node()))
    }

    pub fn size(&self) -> Option<Extent> {
        self.resolve().and_then(|h| self.context.tree.size(h.node()))
    }

    /// The element's displayed text.
    ///
    /// Resolves to the element's own text value, or the text of its single
    /// text-valued descendant. Zero or several text descendants yield an
    /// empty string.
    pub fn text(&self) -> String {
        fn collect(tree: &dyn UiTree, node: NodeId, out: &mut Vec<String>) {
            if let Some(text) = tree.text_value(node) {
                out.push(text);
            }
            for child in tree.arrange_children(node) {
                collect(tree, child, out);
            }
        }

        let Some(handle) = self.resolve() else {
            return String::new();
        };
        let mut texts = Vec::new();
        collect(self.context.tree.as_ref(), handle.node(), &mut texts);
        if texts.len() == 1 {
            texts.remove(0)
        } else {
            String::new()
        }
    }

    pub fn is_scrolled_to_beginning(&self) -> bool {
        self.resolve().is_some_and(|h| {
            self.context
                .tree
                .scroll_state(h.node())
                .is_some_and(|s| s.at_beginning)
        })
    }

    pub fn is_scrolled_to_end(&self) -> bool {
        self.resolve().is_some_and(|h| {
            self.context
                .tree
                .scroll_state(h.node())
                .is_some_and(|s| s.at_end)
        })
    }

    fn sequence(&self) -> ActionSequence {
        ActionSequence::new(Arc::clone(&self.context))
    }

    /// Moves the cursor over the element.
    pub async fn hover(&self) -> Result<bool, AutomationError> {
        self.sequence()
            .move_to_element(self.locator.clone())
            .perform()
            .await
    }

    pub async fn click(&self, button: MouseButton) -> Result<bool, AutomationError> {
        self.sequence()
            .click(self.locator.clone(), button)
            .perform()
            .await
    }

    pub async fn double_click(&self, button: MouseButton) -> Result<bool, AutomationError> {
        self.sequence()
            .double_click(self.locator.clone(), button)
            .perform()
            .await
    }

    /// Focuses the element, then types the text.
    pub async fn type_text(&self, text: &str) -> Result<bool, AutomationError> {
        self.sequence()
            .focus(self.locator.clone())
            .type_text(text)
            .perform()
            .await
    }

    pub async fn type_chord(
        &self,
        keys: impl IntoIterator<Item = Key>,
    ) -> Result<bool, AutomationError> {
        self.sequence()
            .focus(self.locator.clone())
            .type_chord(keys)
            .perform()
            .await
    }

    pub async fn focus(&self) -> Result<bool, AutomationError> {
        self.sequence().focus(self.locator.clone()).perform().await
    }

    pub async fn scroll_by(&self, delta: f64) -> Result<bool, AutomationError> {
        self.sequence()
            .scroll_by(self.locator.clone(), delta)
            .perform()
            .await
    }

    pub async fn scroll_to_beginning(&self) -> Result<bool, AutomationError> {
        self.sequence()
            .scroll_to_beginning(self.locator.clone())
            .perform()
            .await
    }

    pub async fn scroll_to_end(&self) -> Result<bool, AutomationError> {
        self.sequence()
            .scroll_to_end(self.locator.clone())
            .perform()
            .await
    }
}

/// Lazy handle to every element a locator matches.
pub struct DriverElements {
    context: Arc<DriverContext>,
    locator: By,
}

impl DriverElements {
    pub fn locator(&self) -> &By {
        &self.locator
    }

    /// How many elements currently match.
    pub fn count(&self) -> usize {
        self.locator.locate(self.context.tree.as_ref()).len()
    }

    /// The matching handles, in traversal order.
    pub fn handles(&self) -> Vec<ElementHandle> {
        self.locator.locate(self.context.tree.as_ref())
    }

    /// One [`DriverElement`] per current match, each pinned to the handle it
    /// was resolved from. A pinned element stops existing when its handle
    /// goes stale.
    pub fn elements(&self) -> Vec<DriverElement> {
        self.handles()
            .into_iter()
            .map(|handle| {
                let pinned = handle.clone();
                DriverElement {
                    context: Arc::clone(&self.context),
                    locator: By::delegate(handle.debug_name().to_string(), move |tree| {
                        if pinned.is_valid(tree) {
                            vec![pinned.clone()]
                        } else {
                            Vec::new()
                        }
                    }),
                }
            })
            .collect()
    }
}
