//! Shared test helpers for uidriver-core integration tests.
//!
//! Provides a mutable in-memory UI tree, an input dispatcher that records
//! every event and feeds wheel/focus events back into the tree, and a
//! pre-built fixture resembling a small test application.

#![allow(dead_code)]

use std::sync::{Arc, Mutex, MutexGuard};

use uidriver_core::{
    Driver, Extent, InputDispatcher, Key, MetadataKind, MouseButton, NodeId, Point, ScrollState,
    UiTree, WindowId,
};

// ---------------------------------------------------------------------------
// FakeTree — a mutable arena-backed UI tree
// ---------------------------------------------------------------------------

#[derive(Default)]
struct FakeNode {
    ids: Vec<String>,
    tags: Vec<String>,
    type_name: Option<String>,
    visible: bool,
    interactable: bool,
    focused: bool,
    focusable: bool,
    position: Option<Point>,
    size: Option<Extent>,
    text: Option<String>,
    window: Option<WindowId>,
    children: Vec<NodeId>,
    removed: bool,
    scroll: Option<ScrollModel>,
}

/// Viewport-style scroll model: of the container's items, those with index
/// in `offset..offset + viewport` are visible. One wheel notch moves the
/// offset by one (positive deltas scroll toward the beginning). A retained
/// model keeps arranged geometry on off-viewport items; a virtualized one
/// strips it.
struct ScrollModel {
    offset: i64,
    viewport: i64,
    items: Vec<NodeId>,
    item_height: f64,
    retain_geometry: bool,
}

impl ScrollModel {
    fn max_offset(&self) -> i64 {
        (self.items.len() as i64 - self.viewport).max(0)
    }
}

struct Inner {
    nodes: Vec<FakeNode>,
    roots: Vec<NodeId>,
}

/// A thread-safe fake UI tree that tests mutate mid-run.
pub struct FakeTree {
    inner: Mutex<Inner>,
}

/// Builder for one node's attributes.
///
/// Nodes default to visible, interactable, no geometry. The window id is
/// inherited from the parent unless set explicitly.
#[derive(Default)]
pub struct NodeSpec {
    ids: Vec<String>,
    tags: Vec<String>,
    type_name: Option<String>,
    hidden: bool,
    inert: bool,
    unfocusable: bool,
    position: Option<Point>,
    size: Option<Extent>,
    text: Option<String>,
    window: Option<WindowId>,
}

impl NodeSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn id(mut self, id: &str) -> Self {
        self.ids.push(id.to_string());
        self
    }

    pub fn tag(mut self, tag: &str) -> Self {
        self.tags.push(tag.to_string());
        self
    }

    pub fn type_name(mut self, name: &str) -> Self {
        self.type_name = Some(name.to_string());
        self
    }

    pub fn hidden(mut self) -> Self {
        self.hidden = true;
        self
    }

    pub fn inert(mut self) -> Self {
        self.inert = true;
        self
    }

    pub fn unfocusable(mut self) -> Self {
        self.unfocusable = true;
        self
    }

    pub fn rect(mut self, x: f64, y: f64, width: f64, height: f64) -> Self {
        self.position = Some(Point::new(x, y));
        self.size = Some(Extent::new(width, height));
        self
    }

    pub fn text(mut self, text: &str) -> Self {
        self.text = Some(text.to_string());
        self
    }

    pub fn window(mut self, window: WindowId) -> Self {
        self.window = Some(window);
        self
    }

    fn build(self, inherited_window: Option<WindowId>) -> FakeNode {
        FakeNode {
            ids: self.ids,
            tags: self.tags,
            type_name: self.type_name,
            visible: !self.hidden,
            interactable: !self.inert,
            focused: false,
            focusable: !self.unfocusable,
            position: self.position,
            size: self.size,
            text: self.text,
            window: self.window.or(inherited_window),
            children: Vec::new(),
            removed: false,
            scroll: None,
        }
    }
}

impl FakeTree {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(Inner {
                nodes: Vec::new(),
                roots: Vec::new(),
            }),
        })
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap()
    }

    pub fn add_root(&self, spec: NodeSpec) -> NodeId {
        let mut inner = self.lock();
        let id = NodeId(inner.nodes.len() as u64);
        inner.nodes.push(spec.build(None));
        inner.roots.push(id);
        id
    }

    pub fn add_child(&self, parent: NodeId, spec: NodeSpec) -> NodeId {
        let mut inner = self.lock();
        let inherited = inner.nodes[parent.0 as usize].window;
        let id = NodeId(inner.nodes.len() as u64);
        inner.nodes.push(spec.build(inherited));
        inner.nodes[parent.0 as usize].children.push(id);
        id
    }

    /// Turns `node` into a virtualized scrollable container over its current
    /// children. Items outside the viewport become invisible and lose their
    /// geometry until scrolled in.
    pub fn make_scrollable(&self, node: NodeId, viewport: i64, item_height: f64) {
        self.install_scroll(node, viewport, item_height, false);
    }

    /// Like [`make_scrollable`](Self::make_scrollable), but off-viewport
    /// items stay arranged: invisible yet with known geometry, the way a
    /// non-virtualizing scroll container lays out.
    pub fn make_scrollable_retained(&self, node: NodeId, viewport: i64, item_height: f64) {
        self.install_scroll(node, viewport, item_height, true);
    }

    fn install_scroll(&self, node: NodeId, viewport: i64, item_height: f64, retain_geometry: bool) {
        let mut inner = self.lock();
        let items = inner.nodes[node.0 as usize].children.clone();
        inner.nodes[node.0 as usize].scroll = Some(ScrollModel {
            offset: 0,
            viewport,
            items,
            item_height,
            retain_geometry,
        });
        refresh_scrollable(&mut inner, node);
    }

    /// Scroll offset of a scrollable container, for assertions.
    pub fn scroll_offset(&self, node: NodeId) -> i64 {
        self.lock().nodes[node.0 as usize]
            .scroll
            .as_ref()
            .expect("node is not scrollable")
            .offset
    }

    pub fn set_visible(&self, node: NodeId, visible: bool) {
        self.lock().nodes[node.0 as usize].visible = visible;
    }

    pub fn set_interactable(&self, node: NodeId, interactable: bool) {
        self.lock().nodes[node.0 as usize].interactable = interactable;
    }

    /// Moves focus to `node`, clearing it everywhere else.
    pub fn set_focused(&self, node: NodeId) {
        let mut inner = self.lock();
        for n in &mut inner.nodes {
            n.focused = false;
        }
        inner.nodes[node.0 as usize].focused = true;
    }

    pub fn remove(&self, node: NodeId) {
        self.lock().nodes[node.0 as usize].removed = true;
    }

    /// Applies a wheel turn to the scrollable container under `cursor`.
    pub fn apply_wheel(&self, cursor: Point, delta: f64) {
        let mut inner = self.lock();
        let target = (0..inner.nodes.len()).map(|i| NodeId(i as u64)).find(|&id| {
            let n = &inner.nodes[id.0 as usize];
            if n.scroll.is_none() || n.removed {
                return false;
            }
            match (n.position, n.size) {
                (Some(p), Some(s)) => {
                    cursor.x >= p.x
                        && cursor.x < p.x + s.width
                        && cursor.y >= p.y
                        && cursor.y < p.y + s.height
                }
                _ => false,
            }
        });
        if let Some(node) = target {
            let scroll = inner.nodes[node.0 as usize].scroll.as_mut().unwrap();
            // Positive deltas scroll toward the beginning.
            let max = scroll.max_offset();
            scroll.offset = (scroll.offset - delta.round() as i64).clamp(0, max);
            refresh_scrollable(&mut inner, node);
        }
    }
}

/// Recomputes visibility and geometry of a scrollable's items.
fn refresh_scrollable(inner: &mut Inner, node: NodeId) {
    let (origin, items, offset, viewport, item_height, retain_geometry) = {
        let n = &inner.nodes[node.0 as usize];
        let scroll = n.scroll.as_ref().unwrap();
        (
            n.position.unwrap_or_default(),
            scroll.items.clone(),
            scroll.offset,
            scroll.viewport,
            scroll.item_height,
            scroll.retain_geometry,
        )
    };
    let width = inner.nodes[node.0 as usize]
        .size
        .map(|s| s.width)
        .unwrap_or(100.0);

    for (index, item) in items.iter().enumerate() {
        let index = index as i64;
        let item = &mut inner.nodes[item.0 as usize];
        let arranged = Point::new(origin.x, origin.y + (index - offset) as f64 * item_height);
        if index >= offset && index < offset + viewport {
            item.visible = true;
            item.position = Some(arranged);
            item.size = Some(Extent::new(width, item_height));
        } else {
            item.visible = false;
            if retain_geometry {
                item.position = Some(arranged);
                item.size = Some(Extent::new(width, item_height));
            } else {
                item.position = None;
                item.size = None;
            }
        }
    }
}

impl UiTree for FakeTree {
    fn visible_roots(&self) -> Vec<NodeId> {
        let inner = self.lock();
        inner
            .roots
            .iter()
            .copied()
            .filter(|&id| !inner.nodes[id.0 as usize].removed)
            .collect()
    }

    fn arrange_children(&self, node: NodeId) -> Vec<NodeId> {
        let inner = self.lock();
        match inner.nodes.get(node.0 as usize) {
            Some(n) if !n.removed => n
                .children
                .iter()
                .copied()
                .filter(|&c| !inner.nodes[c.0 as usize].removed)
                .collect(),
            _ => Vec::new(),
        }
    }

    fn metadata(&self, node: NodeId, kind: MetadataKind) -> Vec<String> {
        let inner = self.lock();
        match inner.nodes.get(node.0 as usize) {
            Some(n) if !n.removed => match kind {
                MetadataKind::Id => n.ids.clone(),
                MetadataKind::Tag => n.tags.clone(),
            },
            _ => Vec::new(),
        }
    }

    fn type_name(&self, node: NodeId) -> Option<String> {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .filter(|n| !n.removed)
            .and_then(|n| n.type_name.clone())
    }

    fn contains(&self, node: NodeId) -> bool {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .is_some_and(|n| !n.removed)
    }

    fn is_visible(&self, node: NodeId) -> bool {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .is_some_and(|n| !n.removed && n.visible)
    }

    fn is_interactable(&self, node: NodeId) -> bool {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .is_some_and(|n| !n.removed && n.visible && n.interactable)
    }

    fn is_focused(&self, node: NodeId) -> bool {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .is_some_and(|n| !n.removed && n.focused)
    }

    fn can_focus(&self, node: NodeId) -> bool {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .is_some_and(|n| !n.removed && n.focusable)
    }

    fn absolute_position(&self, node: NodeId) -> Option<Point> {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .filter(|n| !n.removed)
            .and_then(|n| n.position)
    }

    fn size(&self, node: NodeId) -> Option<Extent> {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .filter(|n| !n.removed)
            .and_then(|n| n.size)
    }

    fn scroll_state(&self, node: NodeId) -> Option<ScrollState> {
        let inner = self.lock();
        let n = inner.nodes.get(node.0 as usize).filter(|n| !n.removed)?;
        let scroll = n.scroll.as_ref()?;
        Some(ScrollState {
            at_beginning: scroll.offset == 0,
            at_end: scroll.offset == scroll.max_offset(),
            offset: scroll.offset as f64,
        })
    }

    fn owning_window(&self, node: NodeId) -> Option<WindowId> {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .filter(|n| !n.removed)
            .and_then(|n| n.window)
    }

    fn text_value(&self, node: NodeId) -> Option<String> {
        let inner = self.lock();
        inner
            .nodes
            .get(node.0 as usize)
            .filter(|n| !n.removed)
            .and_then(|n| n.text.clone())
    }
}

// ---------------------------------------------------------------------------
// RecordingInput — input dispatcher that logs events and feeds the tree
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    MouseMove(Point),
    MouseDown(MouseButton),
    MouseUp(MouseButton),
    MouseDoubleClick(MouseButton),
    MouseWheel(f64),
    KeyDown(Key, Option<char>),
    KeyUp(Key),
    KeyChar(char),
    SetCursor(Point),
    ActivateWindow(WindowId),
    SetFocus(NodeId),
}

/// Records every dispatched event. Wheel events scroll the fake tree and
/// focus events move its focus, so retry loops observe real progress.
pub struct RecordingInput {
    tree: Arc<FakeTree>,
    events: Mutex<Vec<InputEvent>>,
    cursor: Mutex<Point>,
}

impl RecordingInput {
    pub fn new(tree: Arc<FakeTree>) -> Arc<Self> {
        Arc::new(Self {
            tree,
            events: Mutex::new(Vec::new()),
            cursor: Mutex::new(Point::default()),
        })
    }

    fn record(&self, event: InputEvent) {
        self.events.lock().unwrap().push(event);
    }

    pub fn events(&self) -> Vec<InputEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Events with cursor-placement noise (moves, warps) filtered out.
    pub fn button_and_key_events(&self) -> Vec<InputEvent> {
        self.events()
            .into_iter()
            .filter(|e| {
                !matches!(
                    e,
                    InputEvent::MouseMove(_)
                        | InputEvent::SetCursor(_)
                        | InputEvent::ActivateWindow(_)
                        | InputEvent::MouseWheel(_)
                )
            })
            .collect()
    }
}

impl InputDispatcher for RecordingInput {
    fn mouse_move(&self, position: Point) {
        *self.cursor.lock().unwrap() = position;
        self.record(InputEvent::MouseMove(position));
    }

    fn mouse_down(&self, button: MouseButton) {
        self.record(InputEvent::MouseDown(button));
    }

    fn mouse_up(&self, button: MouseButton) {
        self.record(InputEvent::MouseUp(button));
    }

    fn mouse_double_click(&self, button: MouseButton) {
        self.record(InputEvent::MouseDoubleClick(button));
    }

    fn mouse_wheel(&self, delta: f64) {
        let cursor = *self.cursor.lock().unwrap();
        self.record(InputEvent::MouseWheel(delta));
        self.tree.apply_wheel(cursor, delta);
    }

    fn key_down(&self, key: Key, character: Option<char>, _repeat: bool) {
        self.record(InputEvent::KeyDown(key, character));
    }

    fn key_up(&self, key: Key) {
        self.record(InputEvent::KeyUp(key));
    }

    fn key_char(&self, character: char, _repeat: bool) {
        self.record(InputEvent::KeyChar(character));
    }

    fn set_cursor_position(&self, position: Point) {
        *self.cursor.lock().unwrap() = position;
        self.record(InputEvent::SetCursor(position));
    }

    fn activate_window(&self, window: WindowId) {
        self.record(InputEvent::ActivateWindow(window));
    }

    fn set_focus(&self, node: NodeId) {
        self.record(InputEvent::SetFocus(node));
        self.tree.set_focused(node);
    }
}

// ---------------------------------------------------------------------------
// Suite — a pre-built application-like fixture
// ---------------------------------------------------------------------------

/// A window with a piano (7 keys under a keyboard), a form with two editable
/// fields, and a scrollable document list of 20 rows showing 5 at a time.
pub struct Suite {
    pub tree: Arc<FakeTree>,
    pub input: Arc<RecordingInput>,
    pub driver: Driver,
    pub window: NodeId,
    pub keyboard: NodeId,
    pub keys: Vec<NodeId>,
    pub user_name: NodeId,
    pub password: NodeId,
    pub documents: NodeId,
    pub document_rows: Vec<NodeId>,
}

/// Initializes log capture once per test binary. Honors `RUST_LOG`.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Builds the suite fixture. Must run inside a tokio runtime.
pub fn build_suite() -> Suite {
    init_tracing();
    let tree = FakeTree::new();

    let window = tree.add_root(
        NodeSpec::new()
            .type_name("Window")
            .window(WindowId(1))
            .rect(0.0, 0.0, 1200.0, 900.0),
    );
    let suite = tree.add_child(
        window,
        NodeSpec::new()
            .id("Suite")
            .type_name("VerticalBox")
            .rect(0.0, 0.0, 1200.0, 900.0),
    );

    // Piano: #Piano > Keyboard > 7 keys, each with a text label child.
    let piano = tree.add_child(
        suite,
        NodeSpec::new()
            .id("Piano")
            .tag("Piano")
            .type_name("Border")
            .rect(40.0, 60.0, 700.0, 120.0),
    );
    let keyboard = tree.add_child(
        piano,
        NodeSpec::new()
            .tag("Keyboard")
            .type_name("HorizontalBox")
            .rect(40.0, 60.0, 700.0, 120.0),
    );
    let notes = ["A", "B", "C", "D", "E", "F", "G"];
    let mut keys = Vec::new();
    for (i, note) in notes.iter().enumerate() {
        let key = tree.add_child(
            keyboard,
            NodeSpec::new()
                .id(&format!("Key{note}"))
                .tag("Key")
                .type_name("Button")
                .rect(50.0 + i as f64 * 95.0, 80.0, 80.0, 80.0),
        );
        tree.add_child(
            key,
            NodeSpec::new()
                .type_name("TextBlock")
                .text(note)
                .rect(60.0 + i as f64 * 95.0, 100.0, 60.0, 20.0)
                .inert()
                .unfocusable(),
        );
        keys.push(key);
    }

    // Form: two editable rows.
    let form = tree.add_child(
        suite,
        NodeSpec::new()
            .id("Form")
            .tag("Form")
            .type_name("VerticalBox")
            .rect(40.0, 220.0, 400.0, 120.0),
    );
    let user_name = tree.add_child(
        form,
        NodeSpec::new()
            .id("UserName")
            .type_name("EditableText")
            .rect(40.0, 220.0, 400.0, 50.0),
    );
    let password = tree.add_child(
        form,
        NodeSpec::new()
            .id("Password")
            .type_name("EditableText")
            .rect(40.0, 280.0, 400.0, 50.0),
    );

    // Documents: a scrollable list of 20 rows, 5 visible at a time.
    let documents = tree.add_child(
        suite,
        NodeSpec::new()
            .id("Documents")
            .type_name("ScrollBox")
            .rect(40.0, 400.0, 400.0, 250.0),
    );
    let mut document_rows = Vec::new();
    for i in 0..20 {
        let row = tree.add_child(
            documents,
            NodeSpec::new()
                .id(&format!("Doc{i}"))
                .tag("Document")
                .type_name("Border"),
        );
        document_rows.push(row);
    }
    tree.make_scrollable(documents, 5, 50.0);

    let input = RecordingInput::new(Arc::clone(&tree));
    let driver = Driver::new(
        Arc::clone(&tree) as Arc<dyn UiTree>,
        Arc::clone(&input) as Arc<dyn InputDispatcher>,
        tokio::runtime::Handle::current(),
    );

    Suite {
        tree,
        input,
        driver,
        window,
        keyboard,
        keys,
        user_name,
        password,
        documents,
        document_rows,
    }
}
