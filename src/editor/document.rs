use std::str::FromStr;
use strum::EnumString;

/// Stable handle to a node in a [`Document`] arena.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub(crate) struct NodeId(usize);

/// Element vocabulary understood by the editor.
///
/// `Other` keeps markup the browser produced outside the command set (e.g. `<span>`) so
/// that loading and saving a record never drops it.
#[derive(Clone, Debug, PartialEq, Eq, EnumString)]
#[strum(serialize_all = "lowercase")]
pub(crate) enum ElementTag {
    H1,
    H2,
    H3,
    Ul,
    Ol,
    Li,
    Blockquote,
    Pre,
    Code,
    Strong,
    Em,
    Div,
    P,
    Br,
    #[strum(default)]
    Other(String),
}

const VOID_OTHER: [&str; 4] = ["hr", "img", "wbr", "input"];

impl ElementTag {
    pub fn from_name(name: &str) -> Self {
        let lower = name.to_ascii_lowercase();
        // Infallible thanks to the `default` variant.
        ElementTag::from_str(&lower).unwrap_or(ElementTag::Other(lower))
    }

    pub fn name(&self) -> &str {
        match self {
            ElementTag::H1 => "h1",
            ElementTag::H2 => "h2",
            ElementTag::H3 => "h3",
            ElementTag::Ul => "ul",
            ElementTag::Ol => "ol",
            ElementTag::Li => "li",
            ElementTag::Blockquote => "blockquote",
            ElementTag::Pre => "pre",
            ElementTag::Code => "code",
            ElementTag::Strong => "strong",
            ElementTag::Em => "em",
            ElementTag::Div => "div",
            ElementTag::P => "p",
            ElementTag::Br => "br",
            ElementTag::Other(name) => name,
        }
    }

    /// Structural blocks that must sit directly under the editable root.
    pub fn is_block(&self) -> bool {
        matches!(
            self,
            ElementTag::H1
                | ElementTag::H2
                | ElementTag::H3
                | ElementTag::Ul
                | ElementTag::Ol
                | ElementTag::Blockquote
                | ElementTag::Pre
        )
    }

    /// Containers that swallow Enter as an internal newline.
    pub fn is_exit_container(&self) -> bool {
        matches!(self, ElementTag::Blockquote | ElementTag::Pre)
    }

    pub fn is_void(&self) -> bool {
        match self {
            ElementTag::Br => true,
            ElementTag::Other(name) => VOID_OTHER.contains(&name.as_str()),
            _ => false,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum NodeKind {
    Text(String),
    Element {
        tag: ElementTag,
        /// Raw attribute text between the tag name and `>`, kept verbatim.
        attrs: String,
    },
}

#[derive(Clone, Debug)]
struct NodeData {
    kind: NodeKind,
    parent: Option<NodeId>,
    children: Vec<NodeId>,
}

/// Arena-backed node tree rooted at the editable surface.
///
/// Removed nodes stay in the arena (detached) so stale ids never alias new nodes.
/// Every structural or text mutation bumps `revision`.
#[derive(Clone, Debug)]
pub(crate) struct Document {
    nodes: Vec<NodeData>,
    root: NodeId,
    revision: u64,
}

impl Default for Document {
    fn default() -> Self {
        Self::new()
    }
}

impl Document {
    pub fn new() -> Self {
        let root = NodeData {
            kind: NodeKind::Element {
                tag: ElementTag::Div,
                attrs: String::new(),
            },
            parent: None,
            children: Vec::new(),
        };
        Self {
            nodes: vec![root],
            root: NodeId(0),
            revision: 0,
        }
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn contains(&self, id: NodeId) -> bool {
        id.0 < self.nodes.len()
    }

    pub fn kind(&self, id: NodeId) -> Option<&NodeKind> {
        self.nodes.get(id.0).map(|n| &n.kind)
    }

    pub fn tag(&self, id: NodeId) -> Option<&ElementTag> {
        match self.kind(id)? {
            NodeKind::Element { tag, .. } => Some(tag),
            NodeKind::Text(_) => None,
        }
    }

    pub fn text(&self, id: NodeId) -> Option<&str> {
        match self.kind(id)? {
            NodeKind::Text(s) => Some(s.as_str()),
            NodeKind::Element { .. } => None,
        }
    }

    pub fn is_text(&self, id: NodeId) -> bool {
        self.text(id).is_some()
    }

    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.nodes.get(id.0).and_then(|n| n.parent)
    }

    pub fn children(&self, id: NodeId) -> &[NodeId] {
        self.nodes
            .get(id.0)
            .map(|n| n.children.as_slice())
            .unwrap_or(&[])
    }

    pub fn index_in_parent(&self, id: NodeId) -> Option<usize> {
        let parent = self.parent(id)?;
        self.children(parent).iter().position(|c| *c == id)
    }

    /// Parents of `id`, nearest first, ending at the root.
    pub fn ancestors(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        std::iter::successors(self.parent(id), move |n| self.parent(*n))
    }

    pub fn is_attached(&self, id: NodeId) -> bool {
        id == self.root || self.ancestors(id).any(|a| a == self.root)
    }

    /// Nearest ancestor-or-self that is a direct child of the root.
    pub fn top_level_ancestor(&self, id: NodeId) -> Option<NodeId> {
        let mut current = id;
        loop {
            let parent = self.parent(current)?;
            if parent == self.root {
                return Some(current);
            }
            current = parent;
        }
    }

    pub fn last_element_child(&self, id: NodeId) -> Option<NodeId> {
        self.children(id)
            .iter()
            .rev()
            .copied()
            .find(|c| self.tag(*c).is_some())
    }

    /// All descendants of `id` in document order (excluding `id`).
    pub fn descendants(&self, id: NodeId) -> Vec<NodeId> {
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = self.children(id).iter().rev().copied().collect();
        while let Some(n) = stack.pop() {
            out.push(n);
            stack.extend(self.children(n).iter().rev().copied());
        }
        out
    }

    pub fn text_nodes(&self, id: NodeId) -> Vec<NodeId> {
        self.descendants(id)
            .into_iter()
            .filter(|n| self.is_text(*n))
            .collect()
    }

    pub fn text_content(&self, id: NodeId) -> String {
        if let Some(t) = self.text(id) {
            return t.to_string();
        }
        self.text_nodes(id)
            .into_iter()
            .filter_map(|n| self.text(n))
            .collect()
    }

    pub fn create_text(&mut self, text: impl Into<String>) -> NodeId {
        self.push(NodeKind::Text(text.into()))
    }

    pub fn create_element(&mut self, tag: ElementTag) -> NodeId {
        self.create_element_with_attrs(tag, String::new())
    }

    pub fn create_element_with_attrs(&mut self, tag: ElementTag, attrs: String) -> NodeId {
        self.push(NodeKind::Element { tag, attrs })
    }

    fn push(&mut self, kind: NodeKind) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(NodeData {
            kind,
            parent: None,
            children: Vec::new(),
        });
        id
    }

    pub fn set_text(&mut self, id: NodeId, text: impl Into<String>) -> bool {
        match self.nodes.get_mut(id.0).map(|n| &mut n.kind) {
            Some(NodeKind::Text(s)) => {
                *s = text.into();
                self.revision += 1;
                true
            }
            _ => false,
        }
    }

    /// `true` if attaching `child` under `parent` would create a cycle.
    fn would_cycle(&self, parent: NodeId, child: NodeId) -> bool {
        parent == child || self.ancestors(parent).any(|a| a == child)
    }

    fn can_hold_children(&self, id: NodeId) -> bool {
        matches!(self.kind(id), Some(NodeKind::Element { tag, .. }) if !tag.is_void())
    }

    fn detach(&mut self, id: NodeId) {
        if let Some(parent) = self.parent(id) {
            self.nodes[parent.0].children.retain(|c| *c != id);
            self.nodes[id.0].parent = None;
        }
    }

    fn attach_at(&mut self, parent: NodeId, index: usize, child: NodeId) -> bool {
        if !self.contains(parent)
            || !self.contains(child)
            || !self.can_hold_children(parent)
            || self.would_cycle(parent, child)
        {
            return false;
        }
        let mut index = index;
        if self.parent(child) == Some(parent) {
            if let Some(current) = self.index_in_parent(child) {
                if current < index {
                    index -= 1;
                }
            }
        }
        self.detach(child);
        let siblings = &mut self.nodes[parent.0].children;
        let index = index.min(siblings.len());
        siblings.insert(index, child);
        self.nodes[child.0].parent = Some(parent);
        self.revision += 1;
        true
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> bool {
        let len = self.children(parent).len();
        self.attach_at(parent, len, child)
    }

    pub fn insert_before(&mut self, reference: NodeId, node: NodeId) -> bool {
        let (Some(parent), Some(idx)) = (self.parent(reference), self.index_in_parent(reference))
        else {
            return false;
        };
        self.attach_at(parent, idx, node)
    }

    pub fn insert_after(&mut self, reference: NodeId, node: NodeId) -> bool {
        let (Some(parent), Some(idx)) = (self.parent(reference), self.index_in_parent(reference))
        else {
            return false;
        };
        self.attach_at(parent, idx + 1, node)
    }

    /// Put `new` where `old` is and detach `old`.
    pub fn replace(&mut self, old: NodeId, new: NodeId) -> bool {
        if !self.insert_before(old, new) {
            return false;
        }
        self.detach(old);
        true
    }

    pub fn remove(&mut self, id: NodeId) -> bool {
        if self.parent(id).is_none() {
            return false;
        }
        self.detach(id);
        self.revision += 1;
        true
    }
}
