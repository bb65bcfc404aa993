//! The fluent action-sequence builder.
//!
//! Builder calls record step *factories*; nothing touches the UI until
//! [`ActionSequence::perform`]. Each perform builds a fresh executor and
//! queue from the factories, so one sequence can be performed repeatedly.
//! Only one run of a given sequence may be in flight at a time.
//!
//! Semantic actions decompose into primitive steps. A click is a cursor move
//! plus a guarded press+release; a double click splices its event steps in
//! mid-run once the target's window is known; moving to an off-screen element
//! splices in a scroll-into-view loop. Every guard (found, visible,
//! interactable, hovered) retries until the configured implicit wait elapses
//! before it fails the sequence.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, info_span, Span};

use crate::driver::{DriverConfiguration, DriverContext};
use crate::error::AutomationError;
use crate::input::{Key, MouseButton};
use crate::locator::By;
use crate::report::SequenceReport;
use crate::step::{Completion, Step, StepExecutor, StepResult, StepScope};
use crate::tree::{ElementHandle, NodeId, Point, UiTree};
use crate::wait::{WaitCondition, WaitResponse};

/// Pause appended after a scroll loop so the UI consumes the final wheel
/// event before the next action runs.
const SCROLL_SETTLE: Duration = Duration::from_millis(500);

type StepFactory = Box<dyn Fn(Arc<DriverContext>) -> Step + Send + Sync>;

/// A buildable, repeatable batch of simulated user actions.
pub struct ActionSequence {
    context: Arc<DriverContext>,
    factories: Vec<StepFactory>,
    running: Arc<AtomicBool>,
}

impl ActionSequence {
    pub(crate) fn new(context: Arc<DriverContext>) -> Self {
        Self {
            context,
            factories: Vec::new(),
            running: Arc::new(AtomicBool::new(false)),
        }
    }

    fn push(mut self, factory: StepFactory) -> Self {
        self.factories.push(factory);
        self
    }

    /// Moves the cursor to the element's on-screen center, scrolling it into
    /// view first if it is hidden inside a scrollable ancestor.
    pub fn move_to_element(self, locator: By) -> Self {
        self.push(Box::new(move |ctx| move_step(ctx, locator.clone(), None)))
    }

    /// Like [`move_to_element`](Self::move_to_element), but places the cursor
    /// at `offset` from the element's top-left corner.
    pub fn move_to_element_offset(self, locator: By, offset: Point) -> Self {
        self.push(Box::new(move |ctx| {
            move_step(ctx, locator.clone(), Some(offset))
        }))
    }

    /// Moves the cursor by a relative offset from wherever it is now.
    pub fn move_by_offset(self, dx: f64, dy: f64) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                let from = ctx.input_state().cursor();
                let to = Point::new(from.x + dx, from.y + dy);
                ctx.input.mouse_move(to);
                ctx.input_state().set_cursor(to);
                StepResult::done()
            })
        }))
    }

    /// Moves to the element, then presses and releases `button` on it.
    pub fn click(self, locator: By, button: MouseButton) -> Self {
        self.move_to_element(locator.clone())
            .push(Box::new(move |ctx| click_step(ctx, locator.clone(), button)))
    }

    /// Presses and releases `button` at the current cursor position, with no
    /// element guards.
    pub fn click_at(self, button: MouseButton) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                press_button_events(&ctx, button);
                release_button_events(&ctx, button);
                StepResult::done()
            })
        }))
    }

    /// Moves to the element, then delivers press, double-click and release
    /// events on it.
    pub fn double_click(self, locator: By, button: MouseButton) -> Self {
        self.move_to_element(locator.clone()).push(Box::new(move |ctx| {
            double_click_step(ctx, locator.clone(), button)
        }))
    }

    /// Press, double-click and release at the current cursor position.
    pub fn double_click_at(self, button: MouseButton) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                press_button_events(&ctx, button);
                ctx.input.mouse_double_click(button);
                release_button_events(&ctx, button);
                StepResult::done()
            })
        }))
    }

    /// Moves over the element and turns the wheel by `delta` notches
    /// (positive scrolls toward the beginning).
    pub fn scroll_by(self, locator: By, delta: f64) -> Self {
        self.move_to_element(locator).push(Box::new(move |ctx| {
            Box::new(move |_| {
                ctx.input.mouse_wheel(delta);
                StepResult::done()
            })
        }))
    }

    /// Scrolls the element to its beginning, one notch per tick.
    pub fn scroll_to_beginning(self, locator: By) -> Self {
        self.scroll_to_bound(locator, true, 1.0)
    }

    /// Scrolls the element to its beginning, `amount` notches per tick.
    pub fn scroll_to_beginning_by(self, locator: By, amount: f64) -> Self {
        self.scroll_to_bound(locator, true, amount)
    }

    /// Scrolls the element to its end, one notch per tick.
    pub fn scroll_to_end(self, locator: By) -> Self {
        self.scroll_to_bound(locator, false, 1.0)
    }

    /// Scrolls the element to its end, `amount` notches per tick.
    pub fn scroll_to_end_by(self, locator: By, amount: f64) -> Self {
        self.scroll_to_bound(locator, false, amount)
    }

    fn scroll_to_bound(self, locator: By, toward_beginning: bool, amount: f64) -> Self {
        self.move_to_element(locator.clone())
            .push(Box::new(move |ctx| {
                scroll_to_bound_step(ctx, locator.clone(), toward_beginning, amount.abs())
            }))
            .push(Box::new(|_| settle_step()))
    }

    /// Scrolls `scrollable` toward its beginning until `desired` is located
    /// and visible. Fails if the scroll bound is reached first.
    pub fn scroll_to_beginning_until(self, scrollable: By, desired: By) -> Self {
        self.scroll_until(scrollable, desired, true)
    }

    /// Scrolls `scrollable` toward its end until `desired` is located and
    /// visible. Fails if the scroll bound is reached first.
    pub fn scroll_to_end_until(self, scrollable: By, desired: By) -> Self {
        self.scroll_until(scrollable, desired, false)
    }

    fn scroll_until(self, scrollable: By, desired: By, toward_beginning: bool) -> Self {
        self.move_to_element(scrollable.clone())
            .push(Box::new(move |ctx| {
                scroll_until_step(
                    ctx,
                    scrollable.clone(),
                    desired.clone(),
                    toward_beginning,
                )
            }))
            .push(Box::new(|_| settle_step()))
    }

    /// Types the text one character at a time, each as its own press+release
    /// step. `\n` and `\t` become Enter and Tab; characters with no key
    /// mapping are delivered as character-only events.
    pub fn type_text(self, text: impl Into<String>) -> Self {
        let mut sequence = self;
        for c in text.into().chars() {
            sequence = sequence.push(Box::new(move |ctx| {
                Box::new(move |_| {
                    type_char_events(&ctx, c);
                    StepResult::done()
                })
            }));
        }
        sequence
    }

    /// Presses and releases one key.
    pub fn type_key(self, key: Key) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                press_key_events(&ctx, key);
                release_key_events(&ctx, key);
                StepResult::done()
            })
        }))
    }

    /// Presses the keys in order, then releases them in reverse order, as one
    /// step. This is how modifier chords (e.g. control+shift+key) are typed.
    pub fn type_chord(self, keys: impl IntoIterator<Item = Key>) -> Self {
        let keys: Vec<Key> = keys.into_iter().collect();
        self.push(Box::new(move |ctx| {
            let keys = keys.clone();
            Box::new(move |_| {
                for &key in &keys {
                    press_key_events(&ctx, key);
                }
                for &key in keys.iter().rev() {
                    release_key_events(&ctx, key);
                }
                StepResult::done()
            })
        }))
    }

    /// Presses a key and leaves it held. Pressing an already-held key emits
    /// nothing.
    pub fn press_key(self, key: Key) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                press_key_events(&ctx, key);
                StepResult::done()
            })
        }))
    }

    /// Releases a held key. Releasing an unheld key emits nothing.
    pub fn release_key(self, key: Key) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                release_key_events(&ctx, key);
                StepResult::done()
            })
        }))
    }

    /// Presses a mouse button and leaves it held.
    pub fn press_button(self, button: MouseButton) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                press_button_events(&ctx, button);
                StepResult::done()
            })
        }))
    }

    /// Releases a held mouse button.
    pub fn release_button(self, button: MouseButton) -> Self {
        self.push(Box::new(move |ctx| {
            Box::new(move |_| {
                release_button_events(&ctx, button);
                StepResult::done()
            })
        }))
    }

    /// Gives keyboard focus to the element, unless it already has it.
    pub fn focus(self, locator: By) -> Self {
        self.push(Box::new(move |ctx| focus_step(ctx, locator.clone())))
    }

    /// Pauses the sequence for the given duration.
    pub fn wait(self, duration: Duration) -> Self {
        self.push(Box::new(move |_| wait_step(duration)))
    }

    /// Pauses the sequence until the condition passes; fails the sequence if
    /// it times out.
    pub fn wait_until(self, condition: WaitCondition) -> Self {
        self.push(Box::new(move |ctx| {
            let condition = condition.clone();
            Box::new(move |scope| {
                match condition.evaluate(ctx.tree.as_ref(), scope.elapsed()) {
                    WaitResponse::Passed => StepResult::done(),
                    WaitResponse::Wait(interval) => StepResult::repeat(interval),
                    WaitResponse::Failed => StepResult::failed(AutomationError::WaitTimedOut {
                        description: condition.description().to_string(),
                    }),
                }
            })
        }))
    }

    /// Number of recorded actions (steps instantiated per perform).
    pub fn len(&self) -> usize {
        self.factories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factories.is_empty()
    }

    /// Builds a fresh executor from the recorded factories and starts it.
    pub fn start(&self) -> Result<PendingRun, AutomationError> {
        if !self.context.is_enabled() {
            return Err(AutomationError::DriverDisabled);
        }
        if self.running.swap(true, Ordering::SeqCst) {
            return Err(AutomationError::SequenceAlreadyExecuting);
        }
        let guard = RunGuard {
            flag: Arc::clone(&self.running),
        };

        let config = self.context.config();
        let executor = StepExecutor::new(self.context.runtime.clone(), config.speed_multiplier);
        for factory in &self.factories {
            executor.queue().add(factory(Arc::clone(&self.context)))?;
        }

        let report = SequenceReport::begin();
        let span = info_span!("sequence", id = %report.id, steps = self.factories.len());
        span.in_scope(|| debug!("sequence starting"));
        let completion = executor.execute()?;

        Ok(PendingRun {
            executor,
            completion,
            report,
            span,
            _guard: guard,
        })
    }

    /// Runs the sequence to completion. Resolves `true` only if every step
    /// completed.
    pub async fn perform(&self) -> Result<bool, AutomationError> {
        Ok(self.start()?.wait().await)
    }

    /// Blocking variant of [`perform`](Self::perform) for callers not on the
    /// runtime.
    ///
    /// # Panics
    ///
    /// Panics when called from a runtime worker thread: blocking the thread
    /// that drives the scheduler would deadlock the run.
    pub fn perform_blocking(&self) -> Result<bool, AutomationError> {
        assert!(
            tokio::runtime::Handle::try_current().is_err(),
            "perform_blocking called from a runtime worker thread; \
             use perform instead"
        );
        Ok(self.start()?.wait_blocking())
    }
}

/// An in-flight run. Owns the executor; dropping this aborts the run and
/// resolves it as failed.
pub struct PendingRun {
    executor: StepExecutor,
    completion: Completion,
    report: SequenceReport,
    span: Span,
    _guard: RunGuard,
}

impl PendingRun {
    pub async fn wait(self) -> bool {
        let passed = self.completion.wait().await;
        finish(self.span, self.report, self.executor, passed)
    }

    pub fn wait_blocking(self) -> bool {
        let passed = self.completion.wait_blocking();
        finish(self.span, self.report, self.executor, passed)
    }
}

fn finish(span: Span, report: SequenceReport, executor: StepExecutor, passed: bool) -> bool {
    let report = report.finish(executor.queue().completed_steps(), passed);
    span.in_scope(|| match serde_json::to_string(&report) {
        Ok(json) => info!(report = %json, "sequence finished"),
        Err(_) => info!(passed = report.passed, "sequence finished"),
    });
    passed
}

struct RunGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

// ---------------------------------------------------------------------------
// Step bodies
// ---------------------------------------------------------------------------

/// Locates exactly one element or says why it could not.
fn resolve_unique(tree: &dyn UiTree, locator: &By) -> Result<ElementHandle, AutomationError> {
    let mut found = locator.locate(tree);
    match found.len() {
        0 => Err(AutomationError::LocatorNotFound {
            locator: locator.debug_name().to_string(),
        }),
        1 => Ok(found.remove(0)),
        _ => Err(AutomationError::AmbiguousLocator {
            locator: locator.debug_name().to_string(),
        }),
    }
}

/// Retries transient conditions until the implicit wait elapses, then fails.
/// Non-transient errors fail immediately.
fn retry_or_fail(
    elapsed: Duration,
    config: &DriverConfiguration,
    error: AutomationError,
) -> StepResult {
    let transient = matches!(
        error,
        AutomationError::LocatorNotFound { .. }
            | AutomationError::ElementNotVisible { .. }
            | AutomationError::ElementNotInteractable { .. }
            | AutomationError::ElementNotHovered { .. }
    );
    if transient && elapsed <= config.implicit_wait {
        StepResult::repeat(config.wait_interval)
    } else {
        StepResult::failed(error)
    }
}

fn not_visible(locator: &By) -> AutomationError {
    AutomationError::ElementNotVisible {
        locator: locator.debug_name().to_string(),
    }
}

fn element_center(tree: &dyn UiTree, node: NodeId) -> Option<Point> {
    let position = tree.absolute_position(node)?;
    let size = tree.size(node)?;
    Some(Point::new(
        position.x + size.width / 2.0,
        position.y + size.height / 2.0,
    ))
}

pub(crate) fn cursor_within(tree: &dyn UiTree, node: NodeId, cursor: Point) -> bool {
    let (Some(position), Some(size)) = (tree.absolute_position(node), tree.size(node)) else {
        return false;
    };
    cursor.x >= position.x
        && cursor.x < position.x + size.width
        && cursor.y >= position.y
        && cursor.y < position.y + size.height
}

/// Nearest ancestor of the handle that reports a scroll state.
fn scrollable_ancestor(tree: &dyn UiTree, handle: &ElementHandle) -> Option<NodeId> {
    handle
        .ancestors()
        .find(|&node| tree.scroll_state(node).is_some())
}

fn press_button_events(ctx: &DriverContext, button: MouseButton) {
    if ctx.input_state().press_button(button) {
        ctx.input.mouse_down(button);
    }
}

fn release_button_events(ctx: &DriverContext, button: MouseButton) {
    if ctx.input_state().release_button(button) {
        ctx.input.mouse_up(button);
    }
}

fn press_key_events(ctx: &DriverContext, key: Key) {
    if ctx.input_state().press_key(key) {
        ctx.input.key_down(key, key.to_char(), false);
    }
}

fn release_key_events(ctx: &DriverContext, key: Key) {
    if ctx.input_state().release_key(key) {
        ctx.input.key_up(key);
    }
}

fn type_char_events(ctx: &DriverContext, c: char) {
    match Key::from_char(c) {
        Some(key) => {
            press_key_events(ctx, key);
            release_key_events(ctx, key);
        }
        None => ctx.input.key_char(c, false),
    }
}

/// Splices steps so they run in the order given.
///
/// Each insertion lands at the same splice point, so inserting in reverse
/// yields the desired run order.
fn splice_in_order(scope: &StepScope<'_>, steps: Vec<Step>) -> Result<(), AutomationError> {
    for step in steps.into_iter().rev() {
        scope.insert_next(step)?;
    }
    Ok(())
}

/// The locate half of a cursor move. Splices in the scroll-into-view loop
/// when the target is hidden inside a scrollable ancestor, and always splices
/// the final cursor placement after it.
fn move_step(ctx: Arc<DriverContext>, locator: By, offset: Option<Point>) -> Step {
    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let handle = match resolve_unique(tree, &locator) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };

        if tree.is_visible(handle.node()) {
            let place = cursor_to_element_step(Arc::clone(&ctx), locator.clone(), offset);
            return match scope.insert_next(place) {
                Ok(()) => StepResult::done(),
                Err(error) => StepResult::failed(error),
            };
        }

        if let Some(scrollable) = scrollable_ancestor(tree, &handle) {
            let scroll = scroll_into_view_step(Arc::clone(&ctx), locator.clone(), scrollable);
            let place = cursor_to_element_step(Arc::clone(&ctx), locator.clone(), offset);
            return match splice_in_order(scope, vec![scroll, place]) {
                Ok(()) => StepResult::done(),
                Err(error) => StepResult::failed(error),
            };
        }

        retry_or_fail(scope.elapsed(), &config, not_visible(&locator))
    })
}

/// Final cursor placement on a resolved, visible element.
fn cursor_to_element_step(ctx: Arc<DriverContext>, locator: By, offset: Option<Point>) -> Step {
    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let handle = match resolve_unique(tree, &locator) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };
        let node = handle.node();
        let (Some(position), Some(size)) = (tree.absolute_position(node), tree.size(node)) else {
            return retry_or_fail(scope.elapsed(), &config, not_visible(&locator));
        };

        let target = match offset {
            Some(offset) => Point::new(position.x + offset.x, position.y + offset.y),
            None => Point::new(position.x + size.width / 2.0, position.y + size.height / 2.0),
        };
        ctx.input.mouse_move(target);
        ctx.input_state().set_cursor(target);
        StepResult::done()
    })
}

/// Wheel loop that brings a hidden element into view inside `scrollable`.
///
/// Scrolls toward the target when relative geometry is known; otherwise
/// sweeps toward the end first and then back toward the beginning. Fails when
/// both bounds are exhausted or the scroll position stops changing.
fn scroll_into_view_step(ctx: Arc<DriverContext>, locator: By, scrollable: NodeId) -> Step {
    let mut cursor_placed = false;
    let mut last_offset: Option<f64> = None;
    let mut sweeping_back = false;

    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let handle = match resolve_unique(tree, &locator) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };
        if tree.is_visible(handle.node()) {
            return StepResult::done();
        }

        let Some(scroll) = tree.scroll_state(scrollable) else {
            return StepResult::failed(not_visible(&locator));
        };

        // Wheel events land under the cursor, so hover the scrollable first.
        if !cursor_placed {
            let Some(center) = element_center(tree, scrollable) else {
                return retry_or_fail(scope.elapsed(), &config, not_visible(&locator));
            };
            ctx.input.mouse_move(center);
            ctx.input_state().set_cursor(center);
            cursor_placed = true;
        }

        let target = tree.absolute_position(handle.node());
        let origin = tree.absolute_position(scrollable);
        let delta = match (target, origin) {
            (Some(target), Some(origin)) => {
                if target.y >= origin.y {
                    if scroll.at_end {
                        return StepResult::failed(not_visible(&locator));
                    }
                    -1.0
                } else {
                    if scroll.at_beginning {
                        return StepResult::failed(not_visible(&locator));
                    }
                    1.0
                }
            }
            // Geometry unknown: sweep to the end, then back to the beginning.
            _ if !sweeping_back => {
                if scroll.at_end {
                    sweeping_back = true;
                    last_offset = None;
                    1.0
                } else {
                    -1.0
                }
            }
            _ => {
                if scroll.at_beginning {
                    return StepResult::failed(not_visible(&locator));
                }
                1.0
            }
        };

        if last_offset == Some(scroll.offset) {
            // The wheel no longer moves anything; the target is unreachable.
            return StepResult::failed(not_visible(&locator));
        }
        last_offset = Some(scroll.offset);

        ctx.input.mouse_wheel(delta);
        StepResult::repeat(config.wait_interval)
    })
}

/// Wheel loop that runs the element to one of its scroll bounds.
fn scroll_to_bound_step(
    ctx: Arc<DriverContext>,
    locator: By,
    toward_beginning: bool,
    amount: f64,
) -> Step {
    let mut last_offset: Option<f64> = None;

    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let handle = match resolve_unique(tree, &locator) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };
        let Some(scroll) = tree.scroll_state(handle.node()) else {
            return StepResult::failed(AutomationError::ElementNotInteractable {
                locator: locator.debug_name().to_string(),
            });
        };

        let at_bound = if toward_beginning {
            scroll.at_beginning
        } else {
            scroll.at_end
        };
        // Treat a stalled offset like a bound: some providers never report
        // the bound flags.
        if at_bound || last_offset == Some(scroll.offset) {
            return StepResult::done();
        }
        last_offset = Some(scroll.offset);

        ctx.input
            .mouse_wheel(if toward_beginning { amount } else { -amount });
        StepResult::repeat(config.wait_interval)
    })
}

/// Wheel loop that scrolls until `desired` is located and visible, failing
/// if the bound arrives first.
fn scroll_until_step(
    ctx: Arc<DriverContext>,
    scrollable: By,
    desired: By,
    toward_beginning: bool,
) -> Step {
    let mut last_offset: Option<f64> = None;

    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let found = desired.locate(tree);
        if !found.is_empty() && found.iter().all(|e| tree.is_visible(e.node())) {
            return StepResult::done();
        }

        let handle = match resolve_unique(tree, &scrollable) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };
        let Some(scroll) = tree.scroll_state(handle.node()) else {
            return StepResult::failed(AutomationError::ElementNotInteractable {
                locator: scrollable.debug_name().to_string(),
            });
        };

        let at_bound = if toward_beginning {
            scroll.at_beginning
        } else {
            scroll.at_end
        };
        if at_bound || last_offset == Some(scroll.offset) {
            return StepResult::failed(not_visible(&desired));
        }
        last_offset = Some(scroll.offset);

        ctx.input
            .mouse_wheel(if toward_beginning { 1.0 } else { -1.0 });
        StepResult::repeat(config.wait_interval)
    })
}

/// One fixed pause after a scroll loop.
fn settle_step() -> Step {
    Box::new(|scope| {
        if scope.elapsed().is_zero() {
            StepResult::repeat(SCROLL_SETTLE)
        } else {
            StepResult::done()
        }
    })
}

/// Guarded press+release on a resolved element.
fn click_step(ctx: Arc<DriverContext>, locator: By, button: MouseButton) -> Step {
    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let handle = match resolve_unique(tree, &locator) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };
        let node = handle.node();
        if let Err(error) = guard_clickable(&ctx, tree, node, &locator) {
            return retry_or_fail(scope.elapsed(), &config, error);
        }
        let Some(window) = tree.owning_window(node) else {
            return StepResult::failed(AutomationError::ElementHasNoWindow {
                locator: locator.debug_name().to_string(),
            });
        };

        ctx.input.activate_window(window);
        press_button_events(&ctx, button);
        release_button_events(&ctx, button);
        StepResult::done()
    })
}

/// Guarded double click. Once the target's window is activated, the press,
/// double-click and release events are spliced in as separate steps so each
/// gets its own tick.
fn double_click_step(ctx: Arc<DriverContext>, locator: By, button: MouseButton) -> Step {
    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let handle = match resolve_unique(tree, &locator) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };
        let node = handle.node();
        if let Err(error) = guard_clickable(&ctx, tree, node, &locator) {
            return retry_or_fail(scope.elapsed(), &config, error);
        }
        let Some(window) = tree.owning_window(node) else {
            return StepResult::failed(AutomationError::ElementHasNoWindow {
                locator: locator.debug_name().to_string(),
            });
        };
        ctx.input.activate_window(window);

        let down = {
            let ctx = Arc::clone(&ctx);
            Box::new(move |_: &mut StepScope<'_>| {
                press_button_events(&ctx, button);
                StepResult::done()
            }) as Step
        };
        let double = {
            let ctx = Arc::clone(&ctx);
            Box::new(move |_: &mut StepScope<'_>| {
                ctx.input.mouse_double_click(button);
                StepResult::done()
            }) as Step
        };
        let up = {
            let ctx = Arc::clone(&ctx);
            Box::new(move |_: &mut StepScope<'_>| {
                release_button_events(&ctx, button);
                StepResult::done()
            }) as Step
        };

        match splice_in_order(scope, vec![down, double, up]) {
            Ok(()) => StepResult::done(),
            Err(error) => StepResult::failed(error),
        }
    })
}

/// Visible, interactable, and actually under the cursor. The hover check
/// guards against the UI shifting between the move step and the click step.
fn guard_clickable(
    ctx: &DriverContext,
    tree: &dyn UiTree,
    node: NodeId,
    locator: &By,
) -> Result<(), AutomationError> {
    if !tree.is_visible(node) {
        return Err(not_visible(locator));
    }
    if !tree.is_interactable(node) {
        return Err(AutomationError::ElementNotInteractable {
            locator: locator.debug_name().to_string(),
        });
    }
    if !cursor_within(tree, node, ctx.input_state().cursor()) {
        return Err(AutomationError::ElementNotHovered {
            locator: locator.debug_name().to_string(),
        });
    }
    Ok(())
}

/// Focuses the element once it is visible, skipping the event if it already
/// has focus.
fn focus_step(ctx: Arc<DriverContext>, locator: By) -> Step {
    Box::new(move |scope| {
        let config = ctx.config();
        let tree = ctx.tree.as_ref();

        let handle = match resolve_unique(tree, &locator) {
            Ok(handle) => handle,
            Err(error) => return retry_or_fail(scope.elapsed(), &config, error),
        };
        let node = handle.node();
        if !tree.is_visible(node) {
            return retry_or_fail(scope.elapsed(), &config, not_visible(&locator));
        }

        if !tree.is_focused(node) {
            ctx.input.set_focus(node);
        }
        StepResult::done()
    })
}

/// Fixed-duration pause.
fn wait_step(duration: Duration) -> Step {
    Box::new(move |scope| {
        if scope.elapsed() >= duration {
            StepResult::done()
        } else {
            StepResult::repeat(duration - scope.elapsed())
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::step::{StepQueue, StepState};

    #[test]
    fn test_wait_step_repeats_for_remaining_time() {
        let queue = StepQueue::new();
        let mut step = wait_step(Duration::from_millis(300));

        let mut scope = StepScope::for_test(&queue, Duration::ZERO);
        let result = step(&mut scope);
        assert_eq!(result.state(), StepState::Repeat);
        assert_eq!(result.next_wait(), Duration::from_millis(300));

        let mut scope = StepScope::for_test(&queue, Duration::from_millis(100));
        let result = step(&mut scope);
        assert_eq!(result.state(), StepState::Repeat);
        assert_eq!(result.next_wait(), Duration::from_millis(200));

        let mut scope = StepScope::for_test(&queue, Duration::from_millis(300));
        assert_eq!(step(&mut scope).state(), StepState::Done);
    }

    #[test]
    fn test_settle_step_pauses_once() {
        let queue = StepQueue::new();
        let mut step = settle_step();

        let mut scope = StepScope::for_test(&queue, Duration::ZERO);
        let result = step(&mut scope);
        assert_eq!(result.state(), StepState::Repeat);
        assert_eq!(result.next_wait(), SCROLL_SETTLE);

        let mut scope = StepScope::for_test(&queue, SCROLL_SETTLE);
        assert_eq!(step(&mut scope).state(), StepState::Done);
    }

    #[test]
    fn test_retry_or_fail_policy() {
        let config = DriverConfiguration::default();
        let transient = AutomationError::LocatorNotFound {
            locator: "#A".to_string(),
        };
        let result = retry_or_fail(Duration::ZERO, &config, transient.clone());
        assert_eq!(result.state(), StepState::Repeat);

        let result = retry_or_fail(config.implicit_wait * 2, &config, transient);
        assert_eq!(result.state(), StepState::Failed);

        // Programmer errors never retry.
        let result = retry_or_fail(
            Duration::ZERO,
            &config,
            AutomationError::ElementHasNoWindow {
                locator: "#A".to_string(),
            },
        );
        assert_eq!(result.state(), StepState::Failed);
    }
}
