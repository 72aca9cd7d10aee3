use super::document::{Document, ElementTag, NodeId, NodeKind};
use super::selection::Position;
use crate::util::utf16_to_byte_idx;

/// Let a double Enter at the end of a quote or code block step out of it.
///
/// Returns the caret position in the new plain line, or `None` when the browser should
/// handle the key itself.
pub(crate) fn exit_container(doc: &mut Document, caret: Position) -> Option<Position> {
    let container = exit_container_of(doc, caret.node)?;
    if !text_after(doc, container, caret).is_empty() {
        return None;
    }

    let content = doc.text_content(container);
    let blank = content.trim().is_empty();
    if !blank && !content.ends_with('\n') {
        return None;
    }

    let line = empty_line(doc);
    if blank {
        doc.replace(container, line);
    } else {
        strip_trailing_newline(doc, container);
        doc.insert_after(container, line);
    }
    tracing::debug!(replaced = blank, "left container block");
    Some(Position::new(line, 0))
}

fn exit_container_of(doc: &Document, node: NodeId) -> Option<NodeId> {
    let root = doc.root();
    std::iter::once(node)
        .chain(doc.ancestors(node))
        .take_while(|n| *n != root)
        .find(|n| doc.tag(*n).map(ElementTag::is_exit_container).unwrap_or(false))
}

fn empty_line(doc: &mut Document) -> NodeId {
    let div = doc.create_element(ElementTag::Div);
    let br = doc.create_element(ElementTag::Br);
    doc.append_child(div, br);
    div
}

fn strip_trailing_newline(doc: &mut Document, container: NodeId) {
    let Some(last) = doc.text_nodes(container).last().copied() else {
        return;
    };
    let Some(text) = doc.text(last) else {
        return;
    };
    let Some(stripped) = text.strip_suffix('\n') else {
        return;
    };
    if stripped.is_empty() {
        doc.remove(last);
    } else {
        let stripped = stripped.to_string();
        doc.set_text(last, stripped);
    }
}

/// Text between the caret and the end of `container`.
fn text_after(doc: &Document, container: NodeId, caret: Position) -> String {
    let mut out = String::new();
    let mut started = false;
    collect_after(doc, container, caret, &mut started, &mut out);
    out
}

fn collect_after(
    doc: &Document,
    node: NodeId,
    caret: Position,
    started: &mut bool,
    out: &mut String,
) {
    if node == caret.node {
        match doc.kind(node) {
            Some(NodeKind::Text(t)) => {
                let from = utf16_to_byte_idx(t, caret.offset);
                out.push_str(&t[from..]);
            }
            Some(NodeKind::Element { .. }) => {
                for child in doc.children(node).iter().skip(caret.offset) {
                    out.push_str(&doc.text_content(*child));
                }
            }
            None => {}
        }
        *started = true;
        return;
    }

    if *started {
        out.push_str(&doc.text_content(node));
        return;
    }
    for child in doc.children(node) {
        collect_after(doc, *child, caret, started, out);
    }
}
