use super::document::{Document, ElementTag, NodeId};
use super::markup::parse_fragment_into;
use super::palette::{detect_trigger, Command};
use super::selection::{Position, Selection};
use crate::util::utf16_to_byte_idx;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum SpliceError {
    #[error("selection anchor is not a text node")]
    NotTextAnchor,
    #[error("no trigger segment ends at the caret")]
    TriggerMissing,
    #[error("anchor text node has no parent")]
    Detached,
    #[error("command markup produced no element")]
    EmptyCommand,
}

#[derive(Debug, PartialEq, Eq)]
pub(crate) struct Spliced {
    pub inserted: NodeId,
    pub cursor: Selection,
}

/// Replace the `/filter` segment ending at `anchor` with the command's empty block.
///
/// Inline commands land in place. Block commands are hoisted so they sit directly under
/// the root: the line that held the trigger is replaced when nothing is left in it,
/// otherwise the block goes right after it, and text that followed the caret moves to a
/// new plain line below the block.
pub(crate) fn apply_command(
    doc: &mut Document,
    command: &Command,
    anchor: Position,
) -> Result<Spliced, SpliceError> {
    let text_node = anchor.node;
    let text = doc
        .text(text_node)
        .ok_or(SpliceError::NotTextAnchor)?
        .to_string();
    let trigger = detect_trigger(&text, anchor.offset).ok_or(SpliceError::TriggerMissing)?;
    let parent = doc.parent(text_node).ok_or(SpliceError::Detached)?;

    let slash = utf16_to_byte_idx(&text, trigger.slash_utf16);
    let cursor = utf16_to_byte_idx(&text, anchor.offset);
    let before = text[..slash].to_string();
    let after = text[cursor..].to_string();

    let block = instantiate(doc, command)?;
    let is_block = doc.tag(block).map(ElementTag::is_block).unwrap_or(false);
    let root = doc.root();

    if is_block && parent != root {
        let host = doc
            .top_level_ancestor(text_node)
            .ok_or(SpliceError::Detached)?;

        if before.is_empty() {
            doc.remove(text_node);
        } else {
            doc.set_text(text_node, before);
        }

        if doc.text_content(host).trim().is_empty() {
            doc.replace(host, block);
        } else {
            doc.insert_after(host, block);
        }

        if !after.is_empty() {
            let line = doc.create_element(ElementTag::Div);
            let rest = doc.create_text(after);
            doc.append_child(line, rest);
            doc.insert_after(block, line);
        }
    } else {
        if !before.is_empty() {
            let t = doc.create_text(before);
            doc.insert_before(text_node, t);
        }
        doc.insert_before(text_node, block);
        if !after.is_empty() {
            let t = doc.create_text(after);
            doc.insert_before(text_node, t);
        }
        doc.remove(text_node);
    }

    let target = caret_target(doc, block);
    tracing::debug!(
        command = command.label,
        hoisted = is_block && parent != root,
        "spliced command block"
    );

    Ok(Spliced {
        inserted: block,
        cursor: Selection::collapsed(Position::new(target, 0)),
    })
}

/// Build the command's element; every empty element gets a `<br>` so it stays focusable.
fn instantiate(doc: &mut Document, command: &Command) -> Result<NodeId, SpliceError> {
    let nodes = parse_fragment_into(doc, &command.markup());
    let block = nodes
        .into_iter()
        .find(|n| doc.tag(*n).is_some())
        .ok_or(SpliceError::EmptyCommand)?;

    let mut elements = vec![block];
    elements.extend(
        doc.descendants(block)
            .into_iter()
            .filter(|n| doc.tag(*n).is_some()),
    );
    for el in elements {
        let empty = doc.children(el).is_empty();
        let void = doc.tag(el).map(ElementTag::is_void).unwrap_or(true);
        if empty && !void {
            let br = doc.create_element(ElementTag::Br);
            doc.append_child(el, br);
        }
    }
    Ok(block)
}

/// Deepest last element child that is not the `<br>` placeholder.
fn caret_target(doc: &Document, block: NodeId) -> NodeId {
    let mut target = block;
    while let Some(last) = doc.last_element_child(target) {
        if doc.tag(last) == Some(&ElementTag::Br) {
            break;
        }
        target = last;
    }
    target
}
