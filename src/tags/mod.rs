use crate::api::{ApiResult, TagStore};
use crate::models::{Record, Tag};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

fn markup_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<[^>]*>").expect("valid markup regex"))
}

fn hashtag_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"#([A-Za-z][A-Za-z0-9_-]*)").expect("valid hashtag regex"))
}

/// Drop every `<...>` tag, keeping the text between them.
pub(crate) fn strip_markup(content: &str) -> String {
    markup_re().replace_all(content, "").into_owned()
}

/// `#tag` tokens in `text`, lower-cased, deduplicated in first-seen order.
pub(crate) fn extract_hashtags(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    hashtag_re()
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str().to_lowercase())
        .filter(|name| seen.insert(name.clone()))
        .collect()
}

/// Make the record's tag associations match the hashtags in `content`.
///
/// A tag whose upsert fails is left out; the associations are still replaced with the
/// tags that succeeded. Returns the tags now attached to the record.
pub(crate) async fn sync_tags_from_content<S: TagStore>(
    store: &S,
    record_id: &str,
    content: &str,
    owner: &str,
) -> ApiResult<Vec<Tag>> {
    let names = extract_hashtags(&strip_markup(content));
    if names.is_empty() {
        store.replace_associations(record_id, &[]).await?;
        return Ok(vec![]);
    }

    let mut tags: Vec<Tag> = Vec::with_capacity(names.len());
    for name in &names {
        match store.upsert_tag(owner, name).await {
            Ok(tag) => tags.push(tag),
            Err(e) => tracing::warn!(record_id, tag = %name, error = %e, "dropping tag"),
        }
    }

    let ids: Vec<String> = tags.iter().map(|t| t.id.clone()).collect();
    store.replace_associations(record_id, &ids).await?;
    tracing::debug!(record_id, count = tags.len(), "tags synchronized");
    Ok(tags)
}

/// Merge freshly synchronized tags into the cached global list (by id, ordered by name).
pub(crate) fn merge_tag_cache(cache: &[Tag], fresh: &[Tag]) -> Vec<Tag> {
    let mut out: Vec<Tag> = cache.to_vec();
    for tag in fresh {
        match out.iter_mut().find(|t| t.id == tag.id) {
            Some(existing) => *existing = tag.clone(),
            None => out.push(tag.clone()),
        }
    }
    out.sort_by(|a, b| a.name.cmp(&b.name));
    out
}

/// Records carrying every tag in `tag_ids`; an empty filter keeps everything.
pub(crate) fn records_with_all_tags(records: &[Record], tag_ids: &[String]) -> Vec<Record> {
    records
        .iter()
        .filter(|r| {
            tag_ids
                .iter()
                .all(|id| r.tags.iter().any(|t| &t.id == id))
        })
        .cloned()
        .collect()
}
