//! UI tree collaborator interface and element handles.
//!
//! The engine never owns UI state. It consumes a [`UiTree`] implementation
//! that exposes a live, mutable widget hierarchy, and refers to nodes through
//! opaque [`NodeId`]s minted by that implementation. Because the tree can
//! change between any two queries, located elements are represented as
//! [`ElementHandle`]s: weak root-to-node id paths that are re-resolved before
//! every use and never cached across scheduler ticks.

use serde::{Deserialize, Serialize};

/// Opaque identifier for a node in the external UI tree.
///
/// The provider decides what the value means; an arena index/generation pair
/// packed into the `u64` works well. The engine only compares ids for
/// equality and hands them back to the provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct NodeId(pub u64);

/// Opaque identifier for a top-level window owning part of the UI tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WindowId(pub u64);

/// A point in absolute screen coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// The on-screen size of an element.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Extent {
    pub width: f64,
    pub height: f64,
}

impl Extent {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }
}

/// Scroll introspection for a scrollable element.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScrollState {
    /// The element cannot scroll any further toward its beginning.
    pub at_beginning: bool,
    /// The element cannot scroll any further toward its end.
    pub at_end: bool,
    /// Provider-defined scroll offset, used only to detect progress.
    pub offset: f64,
}

/// The kinds of matchable metadata a node can carry.
///
/// A node may expose several values per kind (e.g. multiple tags).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetadataKind {
    /// An explicit, author-assigned identifier (`#Name` in path syntax).
    Id,
    /// A free-form tag (bare text in path syntax).
    Tag,
}

/// The UI tree collaborator consumed by the engine.
///
/// Implementations expose a snapshot view of a live widget hierarchy. All
/// methods are synchronous and must be cheap: locators walk the tree on every
/// resolution, and step bodies query it on every retry. Which children count
/// as "arranged" (and therefore searchable) is the provider's decision, not
/// the engine's.
///
/// Methods taking a [`NodeId`] must tolerate stale ids and answer with an
/// empty/`false`/`None` result rather than panicking; the tree may have
/// mutated since the id was minted.
pub trait UiTree: Send + Sync {
    /// The currently visible root nodes, in front-to-back order.
    fn visible_roots(&self) -> Vec<NodeId>;

    /// The layout-arranged children of `node`, in document order.
    fn arrange_children(&self, node: NodeId) -> Vec<NodeId>;

    /// The metadata values of the given kind attached to `node`.
    fn metadata(&self, node: NodeId, kind: MetadataKind) -> Vec<String>;

    /// The concrete widget type name of `node`, if it has one.
    fn type_name(&self, node: NodeId) -> Option<String>;

    /// Whether `node` still exists in the tree.
    fn contains(&self, node: NodeId) -> bool;

    /// Whether `node` is currently visible on screen.
    fn is_visible(&self, node: NodeId) -> bool;

    /// Whether `node` currently accepts input.
    fn is_interactable(&self, node: NodeId) -> bool;

    /// Whether `node` currently holds focus.
    fn is_focused(&self, node: NodeId) -> bool;

    /// Whether `node` is able to receive keyboard focus at all.
    fn can_focus(&self, node: NodeId) -> bool;

    /// The absolute screen position of `node`'s top-left corner.
    fn absolute_position(&self, node: NodeId) -> Option<Point>;

    /// The on-screen size of `node`.
    fn size(&self, node: NodeId) -> Option<Extent>;

    /// Scroll introspection, or `None` if `node` is not scrollable.
    fn scroll_state(&self, node: NodeId) -> Option<ScrollState>;

    /// The window owning `node`, if it is attached to one.
    fn owning_window(&self, node: NodeId) -> Option<WindowId>;

    /// The text displayed by `node` itself, if it is a text-valued widget.
    fn text_value(&self, node: NodeId) -> Option<String>;

    /// A short human-readable label for `node`, used in logs and handles.
    ///
    /// The default composes the id, first tag, or type name, whichever is
    /// available first.
    fn debug_label(&self, node: NodeId) -> String {
        if let Some(id) = self.metadata(node, MetadataKind::Id).into_iter().next() {
            return format!("#{id}");
        }
        if let Some(tag) = self.metadata(node, MetadataKind::Tag).into_iter().next() {
            return tag;
        }
        match self.type_name(node) {
            Some(ty) => format!("<{ty}>"),
            None => format!("node:{}", node.0),
        }
    }
}

/// A weak, non-owning reference to a located element.
///
/// Holds the id path from a visible root down to the matched node plus a
/// debug string for logs. Handles are only trustworthy for the single
/// locate-and-use cycle that produced them; anything that acts on a handle
/// later must re-resolve through its locator first. Equality is identity
/// based (same id path), never value based.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ElementHandle {
    path: Vec<NodeId>,
    debug: String,
}

impl ElementHandle {
    /// Creates a handle from a non-empty root-to-node id path.
    pub fn new(path: Vec<NodeId>, debug: impl Into<String>) -> Self {
        debug_assert!(!path.is_empty());
        Self {
            path,
            debug: debug.into(),
        }
    }

    /// The matched node (last entry of the path).
    pub fn node(&self) -> NodeId {
        *self.path.last().expect("element handle path is never empty")
    }

    /// The full root-to-node id path.
    pub fn path(&self) -> &[NodeId] {
        &self.path
    }

    /// Ancestor ids of the matched node, nearest first.
    pub fn ancestors(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.path.iter().rev().skip(1).copied()
    }

    /// The debug representation used in logs.
    pub fn debug_name(&self) -> &str {
        &self.debug
    }

    /// Whether the handle's node still exists in `tree`.
    pub fn is_valid(&self, tree: &dyn UiTree) -> bool {
        self.path.iter().all(|id| tree.contains(*id))
    }
}

impl PartialEq for ElementHandle {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ElementHandle {}

impl std::fmt::Display for ElementHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.debug)
    }
}
