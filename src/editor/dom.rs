use super::document::{Document, NodeId};
use super::markup::{parse, serialize};
use super::selection::{Position, Selection};
use wasm_bindgen::JsCast;

const COMMENT_NODE: u16 = 8;

/// Child indices leading from the root to `node`.
pub(crate) fn path_of(doc: &Document, node: NodeId) -> Option<Vec<usize>> {
    let root = doc.root();
    let mut path = Vec::new();
    let mut current = node;
    while current != root {
        path.push(doc.index_in_parent(current)?);
        current = doc.parent(current)?;
    }
    path.reverse();
    Some(path)
}

pub(crate) fn node_at_path(doc: &Document, path: &[usize]) -> Option<NodeId> {
    path.iter()
        .try_fold(doc.root(), |node, idx| doc.children(node).get(*idx).copied())
}

fn is_comment(node: &web_sys::Node) -> bool {
    node.node_type() == COMMENT_NODE
}

/// Index of `node` among its parent's children, not counting comments.
fn dom_index(node: &web_sys::Node) -> Option<usize> {
    let parent = node.parent_node()?;
    let siblings = parent.child_nodes();
    let mut idx = 0;
    for i in 0..siblings.length() {
        let sib = siblings.item(i)?;
        if sib.is_same_node(Some(node)) {
            return Some(idx);
        }
        if !is_comment(&sib) {
            idx += 1;
        }
    }
    None
}

fn dom_path(root: &web_sys::Node, node: &web_sys::Node) -> Option<Vec<usize>> {
    let mut path = Vec::new();
    let mut current = node.clone();
    while !current.is_same_node(Some(root)) {
        path.push(dom_index(&current)?);
        current = current.parent_node()?;
    }
    path.reverse();
    Some(path)
}

fn dom_child(node: &web_sys::Node, idx: usize) -> Option<web_sys::Node> {
    let children = node.child_nodes();
    (0..children.length())
        .filter_map(|i| children.item(i))
        .filter(|c| !is_comment(c))
        .nth(idx)
}

fn dom_node_at_path(root: &web_sys::Node, path: &[usize]) -> Option<web_sys::Node> {
    path.iter()
        .try_fold(root.clone(), |node, idx| dom_child(&node, *idx))
}

/// Element offsets count children; drop comments from the count.
fn element_offset(container: &web_sys::Node, offset: u32) -> usize {
    let children = container.child_nodes();
    (0..offset.min(children.length()))
        .filter_map(|i| children.item(i))
        .filter(|c| !is_comment(c))
        .count()
}

fn dom_position(
    root: &web_sys::Node,
    doc: &Document,
    container: &web_sys::Node,
    offset: u32,
) -> Option<Position> {
    let path = dom_path(root, container)?;
    let node = node_at_path(doc, &path)?;
    let offset = if doc.is_text(node) {
        offset as usize
    } else {
        element_offset(container, offset)
    };
    Some(Position::new(node, offset))
}

fn live_range() -> Option<web_sys::Range> {
    let sel = web_sys::window()?.get_selection().ok().flatten()?;
    if sel.range_count() == 0 {
        return None;
    }
    sel.get_range_at(0).ok()
}

/// Map the live DOM range into `doc`, which must mirror the surface's structure.
pub(crate) fn live_selection(root: &web_sys::HtmlElement, doc: &Document) -> Option<Selection> {
    let root_node: &web_sys::Node = root.as_ref();
    let range = live_range()?;
    let start = dom_position(
        root_node,
        doc,
        &range.start_container().ok()?,
        range.start_offset().ok()?,
    )?;
    let end = dom_position(
        root_node,
        doc,
        &range.end_container().ok()?,
        range.end_offset().ok()?,
    )?;
    Some(Selection { start, end })
}

/// Snapshot the editable surface and map the live caret into it.
pub(crate) fn read_surface(root: &web_sys::HtmlElement) -> (Document, Option<Selection>) {
    let root_node: &web_sys::Node = root.as_ref();
    root_node.normalize();
    let doc = parse(&root.inner_html());
    let selection = live_selection(root, &doc);
    (doc, selection)
}

/// `true` when the live caret sits in a text node inside `root`.
pub(crate) fn caret_in_text(root: &web_sys::HtmlElement) -> bool {
    let root_node: &web_sys::Node = root.as_ref();
    live_range()
        .and_then(|range| range.start_container().ok())
        .map(|c| c.node_type() == web_sys::Node::TEXT_NODE && root_node.contains(Some(&c)))
        .unwrap_or(false)
}

pub(crate) fn render(root: &web_sys::HtmlElement, doc: &Document) {
    root.set_inner_html(&serialize(doc));
}

/// Put the live caret at `selection`; a position that no longer maps is ignored.
pub(crate) fn place_caret(root: &web_sys::HtmlElement, doc: &Document, selection: Selection) {
    let root_node: &web_sys::Node = root.as_ref();
    let locate = |pos: Position| -> Option<(web_sys::Node, u32)> {
        let path = path_of(doc, pos.node)?;
        let node = dom_node_at_path(root_node, &path)?;
        Some((node, u32::try_from(pos.offset).ok()?))
    };
    let (Some((start, so)), Some((end, eo))) = (locate(selection.start), locate(selection.end))
    else {
        tracing::debug!("caret target not found in surface");
        return;
    };

    let Some(window) = web_sys::window() else {
        return;
    };
    let Some(document) = window.document() else {
        return;
    };
    let Ok(range) = document.create_range() else {
        return;
    };
    if range.set_start(&start, so).is_err() || range.set_end(&end, eo).is_err() {
        return;
    }
    if let Ok(Some(sel)) = window.get_selection() {
        let _ = sel.remove_all_ranges();
        let _ = sel.add_range(&range);
    }
    let _ = root.focus();
}

/// Insert only the plain-text flavour of a paste.
pub(crate) fn paste_plain_text(ev: &web_sys::ClipboardEvent) {
    ev.prevent_default();
    let Some(text) = ev
        .clipboard_data()
        .and_then(|data| data.get_data("text/plain").ok())
    else {
        return;
    };
    let html_doc = web_sys::window()
        .and_then(|w| w.document())
        .and_then(|d| d.dyn_into::<web_sys::HtmlDocument>().ok());
    if let Some(html_doc) = html_doc {
        let _ = html_doc.exec_command_with_show_ui_and_value("insertText", false, &text);
    }
}
