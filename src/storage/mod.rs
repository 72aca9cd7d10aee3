use serde::{Deserialize, Serialize};

pub(crate) const TOKEN_KEY: &str = "quire_token";
pub(crate) const OWNER_KEY: &str = "quire_owner_id";
pub(crate) const WORKSPACE_KEY: &str = "quire_workspace_id";
pub(crate) const LAST_PAGE_KEY: &str = "quire_last_page";
pub(crate) const EXPANDED_KEY: &str = "quire_expanded_pages";

fn local_storage() -> Option<web_sys::Storage> {
    web_sys::window().and_then(|w| w.local_storage().ok().flatten())
}

pub(crate) fn load_string(key: &str) -> Option<String> {
    local_storage()?
        .get_item(key)
        .ok()
        .flatten()
        .filter(|s| !s.trim().is_empty())
}

pub(crate) fn save_string(key: &str, value: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.set_item(key, value);
    }
}

pub(crate) fn remove(key: &str) {
    if let Some(storage) = local_storage() {
        let _ = storage.remove_item(key);
    }
}

pub(crate) fn load_json_from_storage<T: for<'de> Deserialize<'de>>(key: &str) -> Option<T> {
    let json = local_storage()?.get_item(key).ok().flatten()?;
    serde_json::from_str(&json).ok()
}

pub(crate) fn save_json_to_storage<T: Serialize>(key: &str, value: &T) {
    if let Ok(json) = serde_json::to_string(value) {
        save_string(key, &json);
    }
}

/// Page the user had open, keyed per workspace.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub(crate) struct LastPage {
    pub workspace_id: String,
    pub page_id: String,
}

pub(crate) fn load_last_page(workspace_id: &str) -> Option<String> {
    load_json_from_storage::<LastPage>(LAST_PAGE_KEY)
        .filter(|p| p.workspace_id == workspace_id)
        .map(|p| p.page_id)
}

pub(crate) fn write_last_page(workspace_id: &str, page_id: &str) {
    if workspace_id.trim().is_empty() || page_id.trim().is_empty() {
        return;
    }
    save_json_to_storage(
        LAST_PAGE_KEY,
        &LastPage {
            workspace_id: workspace_id.to_string(),
            page_id: page_id.to_string(),
        },
    );
}

pub(crate) fn load_expanded() -> Vec<String> {
    load_json_from_storage::<Vec<String>>(EXPANDED_KEY).unwrap_or_default()
}

pub(crate) fn save_expanded(ids: &[String]) {
    save_json_to_storage(EXPANDED_KEY, &ids);
}

pub(crate) fn clear_session() {
    remove(TOKEN_KEY);
    remove(OWNER_KEY);
    remove(WORKSPACE_KEY);
    remove(LAST_PAGE_KEY);
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    #[wasm_bindgen_test]
    fn test_last_page_is_scoped_to_workspace() {
        write_last_page("w1", "p9");
        assert_eq!(load_last_page("w1").as_deref(), Some("p9"));
        assert_eq!(load_last_page("w2"), None);
        clear_session();
        assert_eq!(load_last_page("w1"), None);
    }

    #[wasm_bindgen_test]
    fn test_token_roundtrip() {
        save_string(TOKEN_KEY, "t1");
        assert_eq!(load_string(TOKEN_KEY).as_deref(), Some("t1"));
        remove(TOKEN_KEY);
        assert!(load_string(TOKEN_KEY).is_none());
    }

    #[wasm_bindgen_test]
    fn test_clear_session_forgets_workspace() {
        save_string(WORKSPACE_KEY, "w1");
        save_string(OWNER_KEY, "u1");
        clear_session();
        assert_eq!(load_string(WORKSPACE_KEY), None);
        assert_eq!(load_string(OWNER_KEY), None);
    }
}
