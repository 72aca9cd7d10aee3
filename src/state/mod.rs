use crate::api::ApiClient;
use crate::config::EnvConfig;
use crate::models::{Record, Tag};
use crate::storage::{self, OWNER_KEY, WORKSPACE_KEY};
use leptos::prelude::*;
use std::collections::HashSet;

#[derive(Clone)]
pub(crate) struct AppState {
    pub config: EnvConfig,
    pub api_client: RwSignal<ApiClient>,

    /// Signed-in user; tags are keyed by this id.
    pub owner_id: RwSignal<Option<String>>,
    pub workspace_id: RwSignal<Option<String>>,

    /// Pages of the current workspace, in tree order.
    pub records: RwSignal<Vec<Record>>,
    pub records_loading: RwSignal<bool>,
    pub records_error: RwSignal<Option<String>>,

    /// Global tag list, ordered by name.
    pub tags: RwSignal<Vec<Tag>>,
    /// Tag ids a page must all carry to be listed; empty lists everything.
    pub tag_filter: RwSignal<Vec<String>>,

    pub current_record_id: RwSignal<Option<String>>,
    pub expanded: RwSignal<HashSet<String>>,
}

impl AppState {
    pub fn new(config: EnvConfig) -> Self {
        let stored_client = ApiClient::load_from_storage(&config);
        let workspace_id = storage::load_string(WORKSPACE_KEY);
        let current_record_id = workspace_id
            .as_deref()
            .and_then(storage::load_last_page);

        Self {
            config,
            api_client: RwSignal::new(stored_client),
            owner_id: RwSignal::new(storage::load_string(OWNER_KEY)),
            workspace_id: RwSignal::new(workspace_id),
            records: RwSignal::new(vec![]),
            records_loading: RwSignal::new(false),
            records_error: RwSignal::new(None),
            tags: RwSignal::new(vec![]),
            tag_filter: RwSignal::new(vec![]),
            current_record_id: RwSignal::new(current_record_id),
            expanded: RwSignal::new(storage::load_expanded().into_iter().collect()),
        }
    }

    pub fn set_owner(&self, owner_id: &str) {
        storage::save_string(OWNER_KEY, owner_id);
        self.owner_id.set(Some(owner_id.to_string()));
    }

    /// Switch to `workspace_id` and reopen the page last viewed there.
    pub fn set_workspace(&self, workspace_id: &str) {
        storage::save_string(WORKSPACE_KEY, workspace_id);
        self.current_record_id.set(storage::load_last_page(workspace_id));
        self.workspace_id.set(Some(workspace_id.to_string()));
    }

    pub fn select_record(&self, id: &str) {
        self.current_record_id.set(Some(id.to_string()));
        if let Some(ws) = self.workspace_id.get_untracked() {
            storage::write_last_page(&ws, id);
        }
    }

    /// Drop the session after the backend rejected the token.
    pub fn sign_out(&self) {
        self.api_client.update(|c| c.logout());
        self.owner_id.set(None);
        self.workspace_id.set(None);
        self.records.set(vec![]);
        self.tags.set(vec![]);
        self.current_record_id.set(None);
    }

    pub fn toggle_expanded(&self, id: &str) {
        self.expanded.update(|set| {
            if !set.remove(id) {
                set.insert(id.to_string());
            }
        });
        let ids: Vec<String> = self.expanded.with_untracked(|set| set.iter().cloned().collect());
        storage::save_expanded(&ids);
    }
}

#[derive(Clone)]
pub(crate) struct AppContext(pub AppState);
