//! The document seam. Presenters only ever touch the page through
//! [`PageSurface`]; [`MemorySurface`] is a complete in-memory document used by
//! tests and the headless binary.

use std::collections::BTreeMap;

use parking_lot::Mutex;
use serde::Serialize;

use crate::channel::ChipKind;
use crate::error::SpeechError;
use crate::geometry::{Point, Rect, Size};

pub type NodeId = u64;

/// The live selection: trimmed text plus its bounding rectangle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Selection {
    pub text: String,
    pub rect: Rect,
}

/// Every element the engine injects is one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum NodeKind {
    Tooltip,
    Popup,
    Chip,
    /// Shared animation stylesheet, injected once.
    Styles,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TooltipBody {
    Translating,
    Meaning(String),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TooltipView {
    pub word: String,
    pub body: TooltipBody,
    /// "Click for details" affordance, shown once hovered.
    pub hint: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub enum PopupTab {
    #[default]
    Definitions,
    Examples,
    Phrases,
}

impl PopupTab {
    pub const ALL: [PopupTab; 3] = [PopupTab::Definitions, PopupTab::Examples, PopupTab::Phrases];

    pub fn label(self) -> &'static str {
        match self {
            PopupTab::Definitions => "解释",
            PopupTab::Examples => "例子",
            PopupTab::Phrases => "常用短语",
        }
    }
}

/// Content of one tab pane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Pane {
    Empty(&'static str),
    Items(Vec<String>),
}

impl Pane {
    pub fn lines(&self) -> usize {
        match self {
            Pane::Empty(_) => 1,
            Pane::Items(items) => items.len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PopupContent {
    pub word: String,
    pub phonetic: Option<String>,
    pub translation: String,
    pub active_tab: PopupTab,
    pub definitions: Pane,
    pub examples: Pane,
    pub phrases: Pane,
    pub save_label: String,
}

impl PopupContent {
    pub fn pane(&self, tab: PopupTab) -> &Pane {
        match tab {
            PopupTab::Definitions => &self.definitions,
            PopupTab::Examples => &self.examples,
            PopupTab::Phrases => &self.phrases,
        }
    }

    /// Exactly one pane is visible at a time.
    pub fn visible_pane(&self) -> &Pane {
        self.pane(self.active_tab)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum PopupView {
    Loading { word: String },
    Error { word: String, message: String },
    Content(Box<PopupContent>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipView {
    pub kind: ChipKind,
    pub message: String,
    pub icon: &'static str,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum NodeContent {
    Tooltip(TooltipView),
    Popup(PopupView),
    Chip(ChipView),
    Styles,
}

pub trait PageSurface: Send + Sync {
    fn viewport(&self) -> Size;

    /// The current selection, `None` when nothing is selected or the range
    /// has no width.
    fn selection(&self) -> Option<Selection>;

    /// Trimmed text of the live selection, empty when collapsed.
    fn selection_text(&self) -> String;

    fn clear_selection(&self);

    /// Mount a node hidden so it can be measured before it is placed.
    fn mount(&self, kind: NodeKind, content: NodeContent) -> NodeId;

    /// Replace a node's content. `false` if the node is gone.
    fn update(&self, id: NodeId, content: NodeContent) -> bool;

    /// Bounding rectangle of a mounted node.
    fn measure(&self, id: NodeId) -> Option<Rect>;

    fn place(&self, id: NodeId, at: Point);

    fn show(&self, id: NodeId);

    /// Start the exit animation; the caller removes the node afterwards.
    fn fade_out(&self, id: NodeId);

    fn remove(&self, id: NodeId);

    /// Remove every injected node. Returns how many were removed.
    fn remove_all_injected(&self) -> usize;

    fn has_node(&self, kind: NodeKind) -> bool;

    /// Attach or detach the native pointer/selection/key/scroll listeners.
    fn set_listeners(&self, attached: bool);

    fn speak(&self, text: &str, lang: &str, rate: f32) -> Result<(), SpeechError>;

    fn page_title(&self) -> String;

    fn page_url(&self) -> String;
}

/// Mount the shared stylesheet unless it is already there.
pub(crate) fn ensure_styles(surface: &dyn PageSurface) {
    if !surface.has_node(NodeKind::Styles) {
        let id = surface.mount(NodeKind::Styles, NodeContent::Styles);
        surface.show(id);
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub kind: NodeKind,
    pub content: NodeContent,
    pub origin: Point,
    pub visible: bool,
    pub fading: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Utterance {
    pub text: String,
    pub lang: String,
    pub rate: f32,
}

struct Document {
    viewport: Size,
    selection: Option<Selection>,
    nodes: BTreeMap<NodeId, Node>,
    next_id: NodeId,
    listeners_attached: bool,
    speech_supported: bool,
    spoken: Vec<Utterance>,
    title: String,
    url: String,
}

pub struct MemorySurface {
    doc: Mutex<Document>,
}

impl Default for MemorySurface {
    fn default() -> Self {
        Self::new(Size::new(1280.0, 800.0))
    }
}

impl MemorySurface {
    pub fn new(viewport: Size) -> Self {
        Self {
            doc: Mutex::new(Document {
                viewport,
                selection: None,
                nodes: BTreeMap::new(),
                next_id: 1,
                listeners_attached: false,
                speech_supported: true,
                spoken: Vec::new(),
                title: String::new(),
                url: String::new(),
            }),
        }
    }

    pub fn set_page(&self, title: &str, url: &str) {
        let mut doc = self.doc.lock();
        doc.title = title.to_string();
        doc.url = url.to_string();
    }

    pub fn set_viewport(&self, viewport: Size) {
        self.doc.lock().viewport = viewport;
    }

    pub fn select(&self, text: &str, rect: Rect) {
        self.doc.lock().selection = Some(Selection {
            text: text.to_string(),
            rect,
        });
    }

    pub fn collapse_selection(&self) {
        self.doc.lock().selection = None;
    }

    pub fn set_speech_supported(&self, supported: bool) {
        self.doc.lock().speech_supported = supported;
    }

    pub fn listeners_attached(&self) -> bool {
        self.doc.lock().listeners_attached
    }

    pub fn spoken(&self) -> Vec<Utterance> {
        self.doc.lock().spoken.clone()
    }

    pub fn nodes(&self) -> Vec<Node> {
        self.doc.lock().nodes.values().cloned().collect()
    }

    /// First live (not fading) node of a kind.
    pub fn find(&self, kind: NodeKind) -> Option<Node> {
        self.doc
            .lock()
            .nodes
            .values()
            .find(|n| n.kind == kind && !n.fading)
            .cloned()
    }

    pub fn tooltip(&self) -> Option<TooltipView> {
        match self.find(NodeKind::Tooltip)?.content {
            NodeContent::Tooltip(view) => Some(view),
            _ => None,
        }
    }

    pub fn popup(&self) -> Option<PopupView> {
        match self.find(NodeKind::Popup)?.content {
            NodeContent::Popup(view) => Some(view),
            _ => None,
        }
    }

    pub fn chip(&self) -> Option<ChipView> {
        match self.find(NodeKind::Chip)?.content {
            NodeContent::Chip(view) => Some(view),
            _ => None,
        }
    }

    pub fn injected_count(&self) -> usize {
        self.doc.lock().nodes.len()
    }
}

/// Size model: content decides the box, like the browser's layout would.
fn layout(content: &NodeContent) -> Size {
    const CHAR_W: f64 = 8.0;
    match content {
        NodeContent::Tooltip(view) => {
            let body_chars = match &view.body {
                TooltipBody::Translating => "Translating…".chars().count(),
                TooltipBody::Meaning(m) => m.chars().count() * 2,
            };
            let chars = view.word.chars().count().max(body_chars);
            let width = (chars as f64 * CHAR_W + 24.0).clamp(80.0, 280.0);
            let height = if view.hint { 66.0 } else { 46.0 };
            Size::new(width, height)
        }
        NodeContent::Popup(PopupView::Loading { .. }) => Size::new(380.0, 120.0),
        NodeContent::Popup(PopupView::Error { .. }) => Size::new(380.0, 110.0),
        NodeContent::Popup(PopupView::Content(c)) => {
            let height = 190.0 + 24.0 * c.visible_pane().lines() as f64;
            Size::new(380.0, height.min(480.0))
        }
        NodeContent::Chip(chip) => Size::new(chip.message.chars().count() as f64 * CHAR_W + 60.0, 28.0),
        NodeContent::Styles => Size::new(0.0, 0.0),
    }
}

impl PageSurface for MemorySurface {
    fn viewport(&self) -> Size {
        self.doc.lock().viewport
    }

    fn selection(&self) -> Option<Selection> {
        let doc = self.doc.lock();
        let sel = doc.selection.as_ref()?;
        let text = sel.text.trim();
        if text.is_empty() || sel.rect.width <= 0.0 {
            return None;
        }
        Some(Selection {
            text: text.to_string(),
            rect: sel.rect,
        })
    }

    fn selection_text(&self) -> String {
        self.doc
            .lock()
            .selection
            .as_ref()
            .map(|s| s.text.trim().to_string())
            .unwrap_or_default()
    }

    fn clear_selection(&self) {
        self.doc.lock().selection = None;
    }

    fn mount(&self, kind: NodeKind, content: NodeContent) -> NodeId {
        let mut doc = self.doc.lock();
        let id = doc.next_id;
        doc.next_id += 1;
        doc.nodes.insert(
            id,
            Node {
                id,
                kind,
                content,
                origin: Point::default(),
                visible: false,
                fading: false,
            },
        );
        id
    }

    fn update(&self, id: NodeId, content: NodeContent) -> bool {
        match self.doc.lock().nodes.get_mut(&id) {
            Some(node) => {
                node.content = content;
                true
            }
            None => false,
        }
    }

    fn measure(&self, id: NodeId) -> Option<Rect> {
        let doc = self.doc.lock();
        let node = doc.nodes.get(&id)?;
        Some(Rect::from_origin(node.origin, layout(&node.content)))
    }

    fn place(&self, id: NodeId, at: Point) {
        if let Some(node) = self.doc.lock().nodes.get_mut(&id) {
            node.origin = at;
        }
    }

    fn show(&self, id: NodeId) {
        if let Some(node) = self.doc.lock().nodes.get_mut(&id) {
            node.visible = true;
        }
    }

    fn fade_out(&self, id: NodeId) {
        if let Some(node) = self.doc.lock().nodes.get_mut(&id) {
            node.fading = true;
        }
    }

    fn remove(&self, id: NodeId) {
        self.doc.lock().nodes.remove(&id);
    }

    fn remove_all_injected(&self) -> usize {
        let mut doc = self.doc.lock();
        let n = doc.nodes.len();
        doc.nodes.clear();
        n
    }

    fn has_node(&self, kind: NodeKind) -> bool {
        self.doc.lock().nodes.values().any(|n| n.kind == kind)
    }

    fn set_listeners(&self, attached: bool) {
        self.doc.lock().listeners_attached = attached;
    }

    fn speak(&self, text: &str, lang: &str, rate: f32) -> Result<(), SpeechError> {
        let mut doc = self.doc.lock();
        if !doc.speech_supported {
            return Err(SpeechError::Unsupported);
        }
        doc.spoken.push(Utterance {
            text: text.to_string(),
            lang: lang.to_string(),
            rate,
        });
        Ok(())
    }

    fn page_title(&self) -> String {
        self.doc.lock().title.clone()
    }

    fn page_url(&self) -> String {
        self.doc.lock().url.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_width_selection_is_empty() {
        let surface = MemorySurface::default();
        surface.select("cat", Rect::new(10.0, 10.0, 0.0, 16.0));
        assert_eq!(surface.selection(), None);
        assert_eq!(surface.selection_text(), "cat");
    }

    #[test]
    fn mount_is_hidden_until_shown() {
        let surface = MemorySurface::default();
        let id = surface.mount(
            NodeKind::Tooltip,
            NodeContent::Tooltip(TooltipView {
                word: "cat".into(),
                body: TooltipBody::Translating,
                hint: false,
            }),
        );
        assert!(!surface.find(NodeKind::Tooltip).unwrap().visible);
        surface.place(id, Point::new(5.0, 6.0));
        surface.show(id);
        let rect = surface.measure(id).unwrap();
        assert_eq!((rect.left, rect.top), (5.0, 6.0));
        assert!(surface.find(NodeKind::Tooltip).unwrap().visible);
    }

    #[test]
    fn fading_nodes_are_not_found_but_still_injected() {
        let surface = MemorySurface::default();
        let id = surface.mount(NodeKind::Styles, NodeContent::Styles);
        surface.fade_out(id);
        assert!(surface.find(NodeKind::Styles).is_none());
        assert_eq!(surface.injected_count(), 1);
        assert_eq!(surface.remove_all_injected(), 1);
        assert_eq!(surface.injected_count(), 0);
    }
}
