use crate::models::Record;
use std::collections::{HashMap, HashSet};

/// A record with its child pages, rebuilt on every render.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct TreeNode {
    pub record: Record,
    pub children: Vec<TreeNode>,
}

impl TreeNode {
    pub fn id(&self) -> &str {
        &self.record.id
    }
}

/// Order records the way the sidebar lists them.
pub(crate) fn sort_for_tree(records: &mut [Record]) {
    records.sort_by(|a, b| {
        a.sort_order
            .cmp(&b.sort_order)
            .then_with(|| a.created_at.cmp(&b.created_at))
    });
}

/// Arrange a flat record list into a forest.
///
/// A record whose `parent_id` is unset or unknown becomes a root. Sibling order follows
/// the input. Records on a `parent_id` cycle hang under each other and never reach a
/// root, so they are left out.
pub(crate) fn build_page_tree(records: &[Record]) -> Vec<TreeNode> {
    let mut index: HashMap<&str, usize> = HashMap::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        if index.insert(r.id.as_str(), i).is_some() {
            tracing::warn!(id = %r.id, "duplicate record id in page list");
        }
    }

    let mut children: Vec<Vec<usize>> = vec![Vec::new(); records.len()];
    let mut roots: Vec<usize> = Vec::new();
    let mut linked: HashSet<&str> = HashSet::with_capacity(records.len());
    for (i, r) in records.iter().enumerate() {
        // The last row with a given id owns it; earlier duplicates are skipped.
        if index.get(r.id.as_str()) != Some(&i) || !linked.insert(r.id.as_str()) {
            continue;
        }
        match r.parent_id.as_deref().and_then(|p| index.get(p)) {
            Some(parent) => children[*parent].push(i),
            None => roots.push(i),
        }
    }

    let forest: Vec<TreeNode> = roots
        .iter()
        .map(|i| materialize(records, &children, *i))
        .collect();

    let reachable = count_nodes(&forest);
    if reachable < linked.len() {
        tracing::warn!(
            unreachable = linked.len() - reachable,
            "page tree has records on a parent cycle"
        );
    }
    forest
}

fn materialize(records: &[Record], children: &[Vec<usize>], i: usize) -> TreeNode {
    TreeNode {
        record: records[i].clone(),
        children: children[i]
            .iter()
            .map(|c| materialize(records, children, *c))
            .collect(),
    }
}

fn count_nodes(nodes: &[TreeNode]) -> usize {
    nodes.iter().map(|n| 1 + count_nodes(&n.children)).sum()
}

/// One visible line of the navigation tree.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct TreeRow {
    pub id: String,
    pub title: String,
    pub icon: Option<String>,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
}

/// Depth-first rows, descending only into expanded nodes.
pub(crate) fn visible_rows(roots: &[TreeNode], expanded: &HashSet<String>) -> Vec<TreeRow> {
    fn walk(nodes: &[TreeNode], depth: usize, expanded: &HashSet<String>, out: &mut Vec<TreeRow>) {
        for n in nodes {
            let is_open = expanded.contains(n.id());
            out.push(TreeRow {
                id: n.record.id.clone(),
                title: n.record.title.clone(),
                icon: n.record.icon.clone(),
                depth,
                has_children: !n.children.is_empty(),
                expanded: is_open,
            });
            if is_open {
                walk(&n.children, depth + 1, expanded, out);
            }
        }
    }

    let mut out = Vec::new();
    walk(roots, 0, expanded, &mut out);
    out
}

fn find<'a>(nodes: &'a [TreeNode], id: &str) -> Option<&'a TreeNode> {
    nodes.iter().find_map(|n| {
        if n.id() == id {
            Some(n)
        } else {
            find(&n.children, id)
        }
    })
}

/// Ids of every page below `id`.
pub(crate) fn descendant_ids(roots: &[TreeNode], id: &str) -> Vec<String> {
    fn collect(nodes: &[TreeNode], out: &mut Vec<String>) {
        for n in nodes {
            out.push(n.record.id.clone());
            collect(&n.children, out);
        }
    }

    let mut out = Vec::new();
    if let Some(node) = find(roots, id) {
        collect(&node.children, &mut out);
    }
    out
}

/// Whether `id` may be moved under `new_parent` (`None` is the top level).
///
/// A page cannot become its own parent or a child of one of its descendants.
pub(crate) fn can_move(roots: &[TreeNode], id: &str, new_parent: Option<&str>) -> bool {
    match new_parent {
        None => true,
        Some(parent) if parent == id => false,
        Some(parent) => !descendant_ids(roots, id).iter().any(|d| d == parent),
    }
}

/// `sort_order` that puts a new or moved page last among the children of `parent_id`.
pub(crate) fn next_sort_order(
    records: &[Record],
    parent_id: Option<&str>,
    skip: Option<&str>,
) -> i32 {
    records
        .iter()
        .filter(|r| r.parent_id.as_deref() == parent_id && Some(r.id.as_str()) != skip)
        .map(|r| r.sort_order + 1)
        .max()
        .unwrap_or(0)
}
