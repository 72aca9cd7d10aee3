use super::document::{Document, ElementTag, NodeId, NodeKind};

/// Parse a record's stored markup into a fresh document.
///
/// Rules:
/// - Tag names are case-insensitive; attribute text is kept verbatim.
/// - Void elements (`br`, `hr`, `img`, ...) and `<x/>` never take children.
/// - A close tag pops back to its matching open element; stray close tags are dropped.
/// - Comments are dropped; text on both sides of a comment stays one text run.
pub(crate) fn parse(markup: &str) -> Document {
    let mut doc = Document::new();
    let root = doc.root();
    parse_into(&mut doc, root, markup);
    doc
}

/// Parse `markup` into detached nodes owned by `doc` and return the top-level ones.
pub(crate) fn parse_fragment_into(doc: &mut Document, markup: &str) -> Vec<NodeId> {
    let holder = doc.create_element(ElementTag::Div);
    parse_into(doc, holder, markup);
    let top = doc.children(holder).to_vec();
    for n in &top {
        doc.remove(*n);
    }
    top
}

fn parse_into(doc: &mut Document, container: NodeId, markup: &str) {
    let bytes = markup.as_bytes();
    let mut stack: Vec<NodeId> = vec![container];
    let mut pending = String::new();
    let mut i = 0;

    while i < bytes.len() {
        let Some(rel) = markup[i..].find('<') else {
            pending.push_str(&markup[i..]);
            break;
        };
        let lt = i + rel;
        pending.push_str(&markup[i..lt]);

        if markup[lt..].starts_with("<!--") {
            i = match markup[lt + 4..].find("-->") {
                Some(end) => lt + 4 + end + 3,
                None => bytes.len(),
            };
            continue;
        }

        if markup[lt..].starts_with("</") {
            let Some(gt) = find_tag_end(bytes, lt + 2) else {
                pending.push_str(&markup[lt..]);
                break;
            };
            let name = markup[lt + 2..gt].trim().to_ascii_lowercase();
            flush_text(doc, &stack, &mut pending);
            // Never pop the container itself.
            if let Some(pos) = stack
                .iter()
                .rposition(|n| doc.tag(*n).map(|t| t.name() == name).unwrap_or(false))
                .filter(|pos| *pos > 0)
            {
                stack.truncate(pos);
            }
            i = gt + 1;
            continue;
        }

        let starts_tag = bytes
            .get(lt + 1)
            .map(|b| b.is_ascii_alphabetic())
            .unwrap_or(false);
        if !starts_tag {
            pending.push('<');
            i = lt + 1;
            continue;
        }

        let Some(gt) = find_tag_end(bytes, lt + 1) else {
            pending.push_str(&markup[lt..]);
            break;
        };

        let inner = &markup[lt + 1..gt];
        let name_len = inner
            .find(|c: char| !(c.is_ascii_alphanumeric() || c == '-'))
            .unwrap_or(inner.len());
        let tag = ElementTag::from_name(&inner[..name_len]);
        let attrs = inner[name_len..].to_string();
        let self_closing = attrs.trim_end().ends_with('/');

        flush_text(doc, &stack, &mut pending);
        let leaf = tag.is_void() || self_closing;
        let el = doc.create_element_with_attrs(tag, attrs);
        if let Some(top) = stack.last() {
            doc.append_child(*top, el);
        }
        if !leaf {
            stack.push(el);
        }
        i = gt + 1;
    }

    flush_text(doc, &stack, &mut pending);
}

/// Index of the `>` closing a tag, skipping quoted attribute values.
fn find_tag_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut quote: Option<u8> = None;
    for (j, b) in bytes.iter().enumerate().skip(start) {
        match quote {
            Some(q) if *b == q => quote = None,
            Some(_) => {}
            None => match b {
                b'"' | b'\'' => quote = Some(*b),
                b'>' => return Some(j),
                _ => {}
            },
        }
    }
    None
}

fn flush_text(doc: &mut Document, stack: &[NodeId], pending: &mut String) {
    if pending.is_empty() {
        return;
    }
    let text = decode_entities(pending);
    pending.clear();
    if let Some(top) = stack.last() {
        let t = doc.create_text(text);
        doc.append_child(*top, t);
    }
}

pub(crate) fn decode_entities(raw: &str) -> String {
    if !raw.contains('&') {
        return raw.to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let tail = &rest[amp..];
        let decoded = tail.find(';').filter(|semi| *semi <= 10).and_then(|semi| {
            let entity = &tail[1..semi];
            let ch = match entity {
                "amp" => Some('&'),
                "lt" => Some('<'),
                "gt" => Some('>'),
                "quot" => Some('"'),
                "apos" | "#39" => Some('\''),
                "nbsp" => Some('\u{00A0}'),
                _ => entity
                    .strip_prefix("#x")
                    .or_else(|| entity.strip_prefix("#X"))
                    .and_then(|hex| u32::from_str_radix(hex, 16).ok())
                    .or_else(|| entity.strip_prefix('#').and_then(|d| d.parse::<u32>().ok()))
                    .and_then(char::from_u32),
            };
            ch.map(|c| (c, semi))
        });

        match decoded {
            Some((c, semi)) => {
                out.push(c);
                rest = &tail[semi + 1..];
            }
            None => {
                out.push('&');
                rest = &tail[1..];
            }
        }
    }
    out.push_str(rest);
    out
}

fn escape_text(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '\u{00A0}' => out.push_str("&nbsp;"),
            _ => out.push(c),
        }
    }
}

/// Markup for the whole document (the root's children, not the root itself).
pub(crate) fn serialize(doc: &Document) -> String {
    let mut out = String::new();
    for child in doc.children(doc.root()) {
        write_node(doc, *child, &mut out);
    }
    out
}

/// Outer markup of a single node.
#[cfg(test)]
pub(crate) fn serialize_node(doc: &Document, id: NodeId) -> String {
    let mut out = String::new();
    write_node(doc, id, &mut out);
    out
}

fn write_node(doc: &Document, id: NodeId, out: &mut String) {
    match doc.kind(id) {
        Some(NodeKind::Text(t)) => escape_text(t, out),
        Some(NodeKind::Element { tag, attrs }) => {
            out.push('<');
            out.push_str(tag.name());
            out.push_str(attrs);
            out.push('>');
            if tag.is_void() {
                return;
            }
            for child in doc.children(id) {
                write_node(doc, *child, out);
            }
            out.push_str("</");
            out.push_str(tag.name());
            out.push('>');
        }
        None => {}
    }
}
