//! Structure-preserving DOM operations
//!
//! Thin layer over `scraper`'s `ego_tree` document. Splitting never creates
//! nodes: both halves are clones of the same tree with the other half
//! detached, so node ids stay valid across every fragment derived from one
//! parse.

use ego_tree::NodeId;
use scraper::{ElementRef, Html};

/// Elements that carry content even without text
const CONTENT_ELEMENTS: &[&str] = &[
    "img", "iframe", "video", "audio", "object", "embed", "table", "hr", "input", "svg",
    "canvas", "select", "textarea",
];

/// Wrappers removed when a split leaves them empty
const WRAPPER_ELEMENTS: &[&str] = &["div", "p"];

/// Parsed markup fragment
#[derive(Debug, Clone)]
pub struct Fragment {
    html: Html,
}

impl Fragment {
    /// Parse fragment markup
    #[must_use]
    pub fn parse(markup: &str) -> Self {
        Self {
            html: Html::parse_fragment(markup),
        }
    }

    /// Serialize the fragment's content
    #[must_use]
    pub fn to_html(&self) -> String {
        self.html.root_element().inner_html()
    }

    /// Id of the synthetic root element wrapping the fragment
    #[inline]
    #[must_use]
    pub fn root_id(&self) -> NodeId {
        self.html.root_element().id()
    }

    /// Element by id, if the node is an element
    #[must_use]
    pub fn element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        self.html.tree.get(id).and_then(ElementRef::wrap)
    }

    /// Attached elements with one of `names`, in document order
    #[must_use]
    pub fn elements_named(&self, names: &[&str]) -> Vec<NodeId> {
        let root = self.html.root_element();
        root.descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|e| names.contains(&e.value().name()))
            .map(|e| e.id())
            .collect()
    }

    /// Whether `id` is still reachable from the root
    #[must_use]
    pub fn is_attached(&self, id: NodeId) -> bool {
        let root = self.root_id();
        self.html
            .tree
            .get(id)
            .is_some_and(|n| n.ancestors().any(|a| a.id() == root))
    }

    /// Whether any ancestor below the root is one of `names`
    #[must_use]
    pub fn has_ancestor(&self, id: NodeId, names: &[&str]) -> bool {
        let root = self.root_id();
        let Some(node) = self.html.tree.get(id) else {
            return false;
        };
        node.ancestors()
            .take_while(|a| a.id() != root)
            .filter_map(ElementRef::wrap)
            .any(|e| names.contains(&e.value().name()))
    }

    /// Parent element below the root
    #[must_use]
    pub fn parent_element(&self, id: NodeId) -> Option<ElementRef<'_>> {
        let root = self.root_id();
        let parent = self.html.tree.get(id)?.parent()?;
        if parent.id() == root {
            return None;
        }
        ElementRef::wrap(parent)
    }

    /// Split around `id`
    ///
    /// Returns the markup preceding `id` and the markup following it in
    /// document order. Every ancestor of `id` is kept in both halves, so
    /// `<div><p>a<img>b</p></div>` splits into `<div><p>a</p></div>` and
    /// `<div><p>b</p></div>`. The node itself is in neither half.
    #[must_use]
    pub fn split_at(&self, id: NodeId) -> (Fragment, Fragment) {
        let root = self.root_id();
        let mut before = self.html.clone();
        let mut after = self.html.clone();

        let mut current = self.html.tree.get(id);
        while let Some(node) = current {
            if node.id() == root {
                break;
            }
            for sibling in node.next_siblings() {
                detach(&mut before, sibling.id());
            }
            for sibling in node.prev_siblings() {
                detach(&mut after, sibling.id());
            }
            current = node.parent();
        }
        detach(&mut before, id);
        detach(&mut after, id);

        (Fragment { html: before }, Fragment { html: after })
    }

    /// Detach a node from the tree
    pub fn remove(&mut self, id: NodeId) {
        detach(&mut self.html, id);
    }

    /// Remove `div`/`p` elements with no text and no content elements
    pub fn strip_empty_wrappers(&mut self) {
        let root = self.html.root_element();
        let empties: Vec<NodeId> = root
            .descendants()
            .skip(1)
            .filter_map(ElementRef::wrap)
            .filter(|e| WRAPPER_ELEMENTS.contains(&e.value().name()) && is_empty_element(*e))
            .map(|e| e.id())
            .collect();

        for id in empties {
            detach(&mut self.html, id);
        }
    }

    /// Whether the fragment renders nothing
    #[must_use]
    pub fn is_semantically_empty(&self) -> bool {
        is_empty_element(self.html.root_element())
    }

    /// Concatenated text below `id`
    #[must_use]
    pub fn text_of(&self, id: NodeId) -> String {
        self.element(id)
            .map(|e| e.text().collect::<String>())
            .unwrap_or_default()
    }
}

/// Whether markup has no visible text and no content elements
#[must_use]
pub fn is_semantically_empty(markup: &str) -> bool {
    if markup.trim().is_empty() {
        return true;
    }
    Fragment::parse(markup).is_semantically_empty()
}

fn is_empty_element(element: ElementRef<'_>) -> bool {
    if element.text().any(|t| !t.trim().is_empty()) {
        return false;
    }
    !element
        .descendants()
        .skip(1)
        .filter_map(ElementRef::wrap)
        .any(|e| CONTENT_ELEMENTS.contains(&e.value().name()))
}

fn detach(html: &mut Html, id: NodeId) {
    if let Some(mut node) = html.tree.get_mut(id) {
        node.detach();
    }
}
