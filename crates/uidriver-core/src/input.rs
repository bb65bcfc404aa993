//! Input dispatch collaborator and pressed-input bookkeeping.
//!
//! The engine does not deliver events itself; it drives an
//! [`InputDispatcher`] implementation that injects simulated events into the
//! application under test. The driver tracks which keys and buttons it
//! currently holds down in an [`InputState`], which is what makes repeated
//! presses idempotent and releases of unpressed inputs no-ops.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::tree::{NodeId, Point, WindowId};

/// A simulated mouse button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

/// A simulated keyboard key.
///
/// Printable characters with a dedicated key use [`Key::Char`]; everything
/// else is a named key. Characters with no key mapping at all (most
/// non-ASCII text) are typed as character-only events and never appear here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Key {
    /// A printable character key (ASCII graphic or space).
    Char(char),
    Enter,
    Tab,
    Escape,
    Backspace,
    Delete,
    Home,
    End,
    Left,
    Right,
    Up,
    Down,
    LeftShift,
    RightShift,
    LeftControl,
    RightControl,
    LeftAlt,
    RightAlt,
}

impl Key {
    /// The key a character maps to, if it has a dedicated key.
    ///
    /// `\n` and `\t` map to [`Key::Enter`] and [`Key::Tab`]; other control
    /// characters and non-ASCII text have no key and must be sent as
    /// character-only events.
    pub fn from_char(c: char) -> Option<Key> {
        match c {
            '\n' | '\r' => Some(Key::Enter),
            '\t' => Some(Key::Tab),
            c if c.is_ascii_graphic() || c == ' ' => Some(Key::Char(c)),
            _ => None,
        }
    }

    /// The character this key produces when typed, if any.
    pub fn to_char(self) -> Option<char> {
        match self {
            Key::Char(c) => Some(c),
            Key::Enter => Some('\n'),
            Key::Tab => Some('\t'),
            _ => None,
        }
    }

    /// Whether this key is a modifier (shift/control/alt).
    pub fn is_modifier(self) -> bool {
        matches!(
            self,
            Key::LeftShift
                | Key::RightShift
                | Key::LeftControl
                | Key::RightControl
                | Key::LeftAlt
                | Key::RightAlt
        )
    }
}

/// Snapshot of the modifier keys currently held down by the driver.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModifierKeys {
    pub left_shift: bool,
    pub right_shift: bool,
    pub left_control: bool,
    pub right_control: bool,
    pub left_alt: bool,
    pub right_alt: bool,
}

impl ModifierKeys {
    /// Either shift key is down.
    pub fn shift(&self) -> bool {
        self.left_shift || self.right_shift
    }

    /// Either control key is down.
    pub fn control(&self) -> bool {
        self.left_control || self.right_control
    }

    /// Either alt key is down.
    pub fn alt(&self) -> bool {
        self.left_alt || self.right_alt
    }
}

/// The input delivery collaborator.
///
/// Each method injects exactly one simulated event and returns immediately;
/// implementations must not block, since these are called from step bodies on
/// the scheduler task. The engine guarantees it never emits a duplicate down
/// event for an already-pressed input and never emits an up event for an
/// input it does not hold.
pub trait InputDispatcher: Send + Sync {
    /// Cursor moved to `position` (absolute screen coordinates).
    fn mouse_move(&self, position: Point);

    /// Mouse button pressed at the current cursor position.
    fn mouse_down(&self, button: MouseButton);

    /// Mouse button released at the current cursor position.
    fn mouse_up(&self, button: MouseButton);

    /// Double-click event at the current cursor position.
    fn mouse_double_click(&self, button: MouseButton);

    /// Mouse wheel turned by `delta` notches at the current cursor position.
    /// Positive deltas scroll toward the beginning of scrollable content.
    fn mouse_wheel(&self, delta: f64);

    /// Key pressed, with the character it produces (if any).
    fn key_down(&self, key: Key, character: Option<char>, repeat: bool);

    /// Key released.
    fn key_up(&self, key: Key);

    /// Character-only input for text with no dedicated key.
    fn key_char(&self, character: char, repeat: bool);

    /// Warp the cursor to `position` without synthesizing a move event.
    fn set_cursor_position(&self, position: Point);

    /// Bring `window` to the front and give it OS-level activation.
    fn activate_window(&self, window: WindowId);

    /// Move keyboard focus to `node`.
    fn set_focus(&self, node: NodeId);
}

/// Driver-owned record of currently pressed inputs and cursor position.
///
/// This is process-wide state shared by every sequence the driver performs,
/// which is one of the reasons only one sequence may execute at a time.
#[derive(Debug, Default)]
pub struct InputState {
    cursor: Point,
    pressed_keys: HashSet<Key>,
    pressed_buttons: HashSet<MouseButton>,
}

impl InputState {
    pub fn new() -> Self {
        Self::default()
    }

    /// The cursor position as last moved by the driver.
    pub fn cursor(&self) -> Point {
        self.cursor
    }

    pub fn set_cursor(&mut self, position: Point) {
        self.cursor = position;
    }

    /// Records a key press. Returns `false` if the key was already held,
    /// in which case no down event should be emitted.
    pub fn press_key(&mut self, key: Key) -> bool {
        self.pressed_keys.insert(key)
    }

    /// Records a key release. Returns `false` if the key was not held,
    /// in which case no up event should be emitted.
    pub fn release_key(&mut self, key: Key) -> bool {
        self.pressed_keys.remove(&key)
    }

    /// Records a button press; same idempotency contract as [`press_key`].
    ///
    /// [`press_key`]: InputState::press_key
    pub fn press_button(&mut self, button: MouseButton) -> bool {
        self.pressed_buttons.insert(button)
    }

    /// Records a button release; same contract as [`release_key`].
    ///
    /// [`release_key`]: InputState::release_key
    pub fn release_button(&mut self, button: MouseButton) -> bool {
        self.pressed_buttons.remove(&button)
    }

    pub fn is_key_pressed(&self, key: Key) -> bool {
        self.pressed_keys.contains(&key)
    }

    pub fn is_button_pressed(&self, button: MouseButton) -> bool {
        self.pressed_buttons.contains(&button)
    }

    /// Modifier-key snapshot derived from the pressed-key set.
    pub fn modifier_keys(&self) -> ModifierKeys {
        ModifierKeys {
            left_shift: self.is_key_pressed(Key::LeftShift),
            right_shift: self.is_key_pressed(Key::RightShift),
            left_control: self.is_key_pressed(Key::LeftControl),
            right_control: self.is_key_pressed(Key::RightControl),
            left_alt: self.is_key_pressed(Key::LeftAlt),
            right_alt: self.is_key_pressed(Key::RightAlt),
        }
    }
}
