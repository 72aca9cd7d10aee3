use super::{ApiError, ApiErrorKind, ApiResult, RecordStore, TagStore, WorkspaceStore};
use crate::models::{Record, RecordInsert, RecordPatch, Tag, Workspace, WorkspaceInsert};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashSet};

#[derive(Default)]
struct State {
    records: BTreeMap<String, Record>,
    tags: Vec<Tag>,
    associations: BTreeMap<String, Vec<String>>,
    workspaces: Vec<Workspace>,
    next_id: u64,
    update_calls: Vec<(String, RecordPatch)>,
}

/// In-process stand-in for the hosted backend.
#[derive(Default)]
pub(crate) struct MemoryBackend {
    state: RefCell<State>,
    pub fail_updates: RefCell<bool>,
    pub fail_associations: RefCell<bool>,
    /// Tag names whose upsert fails.
    pub fail_tag_names: RefCell<HashSet<String>>,
}

impl MemoryBackend {
    pub fn with_record(id: &str, title: &str, content: &str) -> Self {
        let backend = Self::default();
        backend.state.borrow_mut().records.insert(
            id.to_string(),
            Record {
                id: id.to_string(),
                workspace_id: "w1".to_string(),
                user_id: "u1".to_string(),
                parent_id: None,
                title: title.to_string(),
                content: content.to_string(),
                icon: None,
                sort_order: 0,
                is_archived: false,
                created_at: String::new(),
                updated_at: String::new(),
                tags: vec![],
            },
        );
        backend
    }

    pub fn record(&self, id: &str) -> Option<Record> {
        self.state.borrow().records.get(id).cloned()
    }

    pub fn update_calls(&self) -> Vec<(String, RecordPatch)> {
        self.state.borrow().update_calls.clone()
    }

    pub fn tag_names(&self) -> Vec<String> {
        self.state.borrow().tags.iter().map(|t| t.name.clone()).collect()
    }

    /// Tag names associated with `record_id`, in association order.
    pub fn associated_names(&self, record_id: &str) -> Vec<String> {
        let state = self.state.borrow();
        state
            .associations
            .get(record_id)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| state.tags.iter().find(|t| &t.id == id))
                    .map(|t| t.name.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Associate `names` with `record_id`, creating the tags for `owner`.
    pub fn with_associations(self, record_id: &str, owner: &str, names: &[&str]) -> Self {
        {
            let mut state = self.state.borrow_mut();
            let mut ids = Vec::new();
            for name in names {
                let id = Self::next_id(&mut state, "tag");
                state.tags.push(Tag {
                    id: id.clone(),
                    user_id: owner.to_string(),
                    name: name.to_string(),
                    color: None,
                    created_at: String::new(),
                });
                ids.push(id);
            }
            state.associations.insert(record_id.to_string(), ids);
        }
        self
    }

    pub fn add_workspace(&self, id: &str, name: &str, sort_order: i32) {
        self.state.borrow_mut().workspaces.push(Workspace {
            id: id.to_string(),
            user_id: "u1".to_string(),
            name: name.to_string(),
            sort_order,
            created_at: String::new(),
        });
    }

    pub fn workspace_count(&self) -> usize {
        self.state.borrow().workspaces.len()
    }

    fn next_id(state: &mut State, prefix: &str) -> String {
        state.next_id += 1;
        format!("{prefix}-{}", state.next_id)
    }
}

impl RecordStore for MemoryBackend {
    async fn create_record(&self, record: RecordInsert) -> ApiResult<Record> {
        let mut state = self.state.borrow_mut();
        let id = Self::next_id(&mut state, "page");
        let created = Record {
            id: id.clone(),
            workspace_id: record.workspace_id,
            user_id: record.user_id,
            parent_id: record.parent_id,
            title: record.title,
            content: record.content,
            icon: None,
            sort_order: record.sort_order,
            is_archived: false,
            created_at: String::new(),
            updated_at: String::new(),
            tags: vec![],
        };
        state.records.insert(id, created.clone());
        Ok(created)
    }

    async fn update_record(&self, id: &str, patch: RecordPatch) -> ApiResult<Record> {
        let mut state = self.state.borrow_mut();
        state.update_calls.push((id.to_string(), patch.clone()));
        if *self.fail_updates.borrow() {
            return Err(ApiError::new(ApiErrorKind::Network, "offline"));
        }
        let record = state
            .records
            .get_mut(id)
            .ok_or_else(|| ApiError::new(ApiErrorKind::NotFound, "page not found"))?;
        if let Some(title) = patch.title {
            record.title = title;
        }
        if let Some(content) = patch.content {
            record.content = content;
        }
        if let Some(parent_id) = patch.parent_id {
            record.parent_id = parent_id;
        }
        if let Some(sort_order) = patch.sort_order {
            record.sort_order = sort_order;
        }
        if let Some(icon) = patch.icon {
            record.icon = icon;
        }
        Ok(record.clone())
    }

    async fn delete_record(&self, id: &str) -> ApiResult<()> {
        let mut state = self.state.borrow_mut();
        state.associations.remove(id);
        state
            .records
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| ApiError::new(ApiErrorKind::NotFound, "page not found"))
    }

    async fn list_records(&self, workspace_id: &str) -> ApiResult<Vec<Record>> {
        let state = self.state.borrow();
        Ok(state
            .records
            .values()
            .filter(|r| r.workspace_id == workspace_id && !r.is_archived)
            .cloned()
            .collect())
    }
}

impl TagStore for MemoryBackend {
    async fn upsert_tag(&self, owner: &str, name: &str) -> ApiResult<Tag> {
        if self.fail_tag_names.borrow().contains(name) {
            return Err(ApiError::new(ApiErrorKind::Http, format!("rejected tag {name}")));
        }
        let mut state = self.state.borrow_mut();
        if let Some(existing) = state
            .tags
            .iter()
            .find(|t| t.user_id == owner && t.name == name)
        {
            return Ok(existing.clone());
        }
        let tag = Tag {
            id: Self::next_id(&mut state, "tag"),
            user_id: owner.to_string(),
            name: name.to_string(),
            color: None,
            created_at: String::new(),
        };
        state.tags.push(tag.clone());
        Ok(tag)
    }

    async fn replace_associations(&self, record_id: &str, tag_ids: &[String]) -> ApiResult<()> {
        if *self.fail_associations.borrow() {
            return Err(ApiError::new(ApiErrorKind::Network, "offline"));
        }
        let mut state = self.state.borrow_mut();
        if tag_ids.is_empty() {
            state.associations.remove(record_id);
        } else {
            state
                .associations
                .insert(record_id.to_string(), tag_ids.to_vec());
        }
        Ok(())
    }

    async fn list_tags(&self) -> ApiResult<Vec<Tag>> {
        let mut tags = self.state.borrow().tags.clone();
        tags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(tags)
    }
}

impl WorkspaceStore for MemoryBackend {
    async fn list_workspaces(&self) -> ApiResult<Vec<Workspace>> {
        let mut list = self.state.borrow().workspaces.clone();
        list.sort_by_key(|w| w.sort_order);
        Ok(list)
    }

    async fn create_workspace(&self, workspace: WorkspaceInsert) -> ApiResult<Workspace> {
        let mut state = self.state.borrow_mut();
        let created = Workspace {
            id: Self::next_id(&mut state, "ws"),
            user_id: workspace.user_id,
            name: workspace.name,
            sort_order: 0,
            created_at: String::new(),
        };
        state.workspaces.push(created.clone());
        Ok(created)
    }
}
