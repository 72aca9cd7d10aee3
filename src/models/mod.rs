use serde::{Deserialize, Serialize};

/// A page/note row.
///
/// `content` is the editor's serialized markup. `tags` is only filled when the list
/// query embeds the association table.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub(crate) struct Record {
    pub id: String,
    #[serde(default)]
    pub workspace_id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub is_archived: bool,
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub updated_at: String,
    #[serde(default, skip_serializing)]
    pub tags: Vec<Tag>,
}

#[derive(Serialize, Clone, Debug, PartialEq)]
pub(crate) struct RecordInsert {
    pub workspace_id: String,
    pub user_id: String,
    pub title: String,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<String>,
    pub sort_order: i32,
}

/// Partial update; `None` fields are left untouched by the backend.
#[derive(Serialize, Clone, Debug, Default, PartialEq)]
pub(crate) struct RecordPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// `Some(None)` moves the record to the top level.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Option<String>>,
    /// `Some(None)` clears the icon.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
}

impl RecordPatch {
    pub fn title_and_content(title: &str, content: &str) -> Self {
        Self {
            title: Some(title.to_string()),
            content: Some(content.to_string()),
            ..Self::default()
        }
    }

    /// Reparent a record and place it at `sort_order` among its new siblings.
    pub fn moved(parent_id: Option<String>, sort_order: i32) -> Self {
        Self {
            parent_id: Some(parent_id),
            sort_order: Some(sort_order),
            ..Self::default()
        }
    }

    pub fn icon(icon: Option<String>) -> Self {
        Self {
            icon: Some(icon),
            ..Self::default()
        }
    }
}

/// A user's container of pages.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Workspace {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct WorkspaceInsert {
    pub user_id: String,
    pub name: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct Tag {
    pub id: String,
    #[serde(default)]
    pub user_id: String,
    pub name: String,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub created_at: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct RecordTag {
    pub page_id: String,
    pub tag_id: String,
}
