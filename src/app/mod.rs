use crate::api::{get_or_create_default_workspace, ApiErrorKind, RecordStore, TagStore};
use crate::autosave::AutosaveController;
use crate::config::EnvConfig;
use crate::editor::NoteEditor;
use crate::models::{RecordInsert, RecordPatch};
use crate::state::{AppContext, AppState};
use crate::tags::records_with_all_tags;
use crate::tree::{
    build_page_tree, can_move, descendant_ids, next_sort_order, sort_for_tree, visible_rows,
};
use leptos::prelude::*;
use leptos::task::spawn_local;

#[component]
pub fn App(config: EnvConfig) -> impl IntoView {
    let app_state = AppContext(AppState::new(config));
    provide_context(app_state.clone());
    provide_context(AutosaveController::new(app_state.clone()));

    let state = app_state.0.clone();

    // Resolve who is signed in and which workspace to open.
    Effect::new({
        let state = state.clone();
        move |_| {
            let api_client = state.api_client.get();
            if !api_client.is_authenticated() {
                return;
            }
            let known_owner = state.owner_id.get_untracked();
            if known_owner.is_some() && state.workspace_id.get_untracked().is_some() {
                return;
            }
            let state = state.clone();
            spawn_local(async move {
                let owner = match known_owner {
                    Some(owner) => owner,
                    None => match api_client.current_user_id().await {
                        Ok(owner) => {
                            state.set_owner(&owner);
                            owner
                        }
                        Err(e) if e.kind == ApiErrorKind::Unauthorized => {
                            tracing::warn!("session expired; signing out");
                            state.sign_out();
                            return;
                        }
                        Err(e) => {
                            tracing::warn!(error = %e, "failed to resolve the signed-in user");
                            return;
                        }
                    },
                };
                if state.workspace_id.get_untracked().is_some() {
                    return;
                }
                match get_or_create_default_workspace(&api_client, &owner).await {
                    Ok(ws) => state.set_workspace(&ws.id),
                    Err(e) => {
                        tracing::warn!(error = %e, "failed to open a workspace");
                        state.records_error.set(Some(e.to_string()));
                    }
                }
            });
        }
    });

    // Load the workspace's pages whenever the workspace changes.
    Effect::new({
        let state = state.clone();
        move |_| {
            let Some(ws) = state.workspace_id.get() else {
                return;
            };
            let api_client = state.api_client.get_untracked();
            let state = state.clone();
            state.records_loading.set(true);
            state.records_error.set(None);
            spawn_local(async move {
                match api_client.list_records(&ws).await {
                    Ok(mut records) => {
                        sort_for_tree(&mut records);
                        state.records.set(records);
                    }
                    Err(e) if e.kind == ApiErrorKind::Unauthorized => {
                        tracing::warn!("session expired; signing out");
                        state.sign_out();
                    }
                    Err(e) => {
                        tracing::warn!(workspace_id = %ws, error = %e, "failed to load pages");
                        state.records_error.set(Some(e.to_string()));
                    }
                }
                state.records_loading.set(false);
            });
        }
    });

    Effect::new({
        let state = state.clone();
        move |_| {
            let api_client = state.api_client.get();
            if !api_client.is_authenticated() {
                return;
            }
            let tags = state.tags;
            spawn_local(async move {
                match api_client.list_tags().await {
                    Ok(list) => tags.set(list),
                    Err(e) => tracing::warn!(error = %e, "failed to load tags"),
                }
            });
        }
    });

    let editor_state = state.clone();

    view! {
        <div class="flex h-screen bg-background text-foreground">
            <Sidebar />
            {move || {
                // Re-key on selection or a finished load; saves that touch `records`
                // must not remount the editor.
                let _ = editor_state.records_loading.get();
                let record = editor_state.current_record_id.get().and_then(|id| {
                    editor_state
                        .records
                        .with_untracked(|list| list.iter().find(|r| r.id == id).cloned())
                });
                match record {
                    Some(record) => view! { <NoteEditor record=record /> }.into_any(),
                    None => view! {
                        <div class="flex-1 flex items-center justify-center text-sm text-muted-foreground">
                            "Select or create a page"
                        </div>
                    }
                    .into_any(),
                }
            }}
        </div>
    }
}

#[component]
fn Sidebar() -> impl IntoView {
    let app_state = expect_context::<AppContext>();
    let state = app_state.0.clone();

    let rows = {
        let state = state.clone();
        move || {
            let filter = state.tag_filter.get();
            let records = state.records.with(|list| records_with_all_tags(list, &filter));
            let roots = build_page_tree(&records);
            state.expanded.with(|expanded| visible_rows(&roots, expanded))
        }
    };

    let on_create = {
        let state = state.clone();
        move |parent_id: Option<String>| {
            let (Some(ws), Some(owner)) =
                (state.workspace_id.get_untracked(), state.owner_id.get_untracked())
            else {
                tracing::warn!("no workspace or user; page not created");
                return;
            };
            let sort_order = state
                .records
                .with_untracked(|list| next_sort_order(list, parent_id.as_deref(), None));
            let insert = RecordInsert {
                workspace_id: ws,
                user_id: owner,
                title: String::new(),
                content: String::new(),
                parent_id: parent_id.clone(),
                sort_order,
            };
            let api_client = state.api_client.get_untracked();
            let state = state.clone();
            spawn_local(async move {
                match api_client.create_record(insert).await {
                    Ok(record) => {
                        let id = record.id.clone();
                        state.records.update(|list| {
                            list.push(record);
                            sort_for_tree(list);
                        });
                        if let Some(parent) = parent_id {
                            state.expanded.update(|set| {
                                set.insert(parent);
                            });
                        }
                        state.select_record(&id);
                    }
                    Err(e) => tracing::warn!(error = %e, "failed to create page"),
                }
            });
        }
    };

    let autosave = expect_context::<AutosaveController>();
    let on_delete = {
        let state = state.clone();
        move |id: String| {
            let autosave = autosave.clone();
            let api_client = state.api_client.get_untracked();
            let state = state.clone();
            spawn_local(async move {
                if let Err(e) = api_client.delete_record(&id).await {
                    tracing::warn!(record_id = %id, error = %e, "failed to delete page");
                    return;
                }
                // The backend removes the subtree with its root.
                let mut gone = state
                    .records
                    .with_untracked(|list| descendant_ids(&build_page_tree(list), &id));
                gone.push(id);
                state.records.update(|list| list.retain(|r| !gone.contains(&r.id)));
                if state
                    .current_record_id
                    .get_untracked()
                    .is_some_and(|cur| gone.contains(&cur))
                {
                    autosave.close();
                    state.current_record_id.set(None);
                }
            });
        }
    };

    // Drop `id` under `new_parent`, last among its new siblings.
    let on_move = {
        let state = state.clone();
        move |id: String, new_parent: Option<String>| {
            let Some(sort_order) = state.records.with_untracked(|list| {
                let current = list.iter().find(|r| r.id == id)?;
                if current.parent_id == new_parent {
                    return None;
                }
                can_move(&build_page_tree(list), &id, new_parent.as_deref())
                    .then(|| next_sort_order(list, new_parent.as_deref(), Some(&id)))
            }) else {
                tracing::debug!(record_id = %id, "move rejected");
                return;
            };
            let api_client = state.api_client.get_untracked();
            let state = state.clone();
            spawn_local(async move {
                let patch = RecordPatch::moved(new_parent.clone(), sort_order);
                if let Err(e) = api_client.update_record(&id, patch).await {
                    tracing::warn!(record_id = %id, error = %e, "failed to move page");
                    return;
                }
                state.records.update(|list| {
                    if let Some(r) = list.iter_mut().find(|r| r.id == id) {
                        r.parent_id = new_parent.clone();
                        r.sort_order = sort_order;
                    }
                    sort_for_tree(list);
                });
                if let Some(parent) = new_parent {
                    state.expanded.update(|set| {
                        set.insert(parent);
                    });
                }
            });
        }
    };
    let dragging: RwSignal<Option<String>> = RwSignal::new(None);

    let toggle_tag = {
        let state = state.clone();
        move |tag_id: String| {
            state.tag_filter.update(|filter| {
                if let Some(pos) = filter.iter().position(|t| *t == tag_id) {
                    filter.remove(pos);
                } else {
                    filter.push(tag_id);
                }
            });
        }
    };

    let error_state = state.clone();
    let tags_state = state.clone();
    let row_state = state.clone();
    let create_root = on_create.clone();
    let move_to_root = on_move.clone();

    view! {
        <aside class="w-64 shrink-0 border-r border-border flex flex-col">
            <div
                class="flex items-center justify-between px-3 py-2"
                on:dragover=move |ev: web_sys::DragEvent| ev.prevent_default()
                on:drop=move |ev: web_sys::DragEvent| {
                    ev.prevent_default();
                    if let Some(id) = dragging.get_untracked() {
                        dragging.set(None);
                        move_to_root(id, None);
                    }
                }
            >
                <span class="text-sm font-semibold">"Pages"</span>
                <button
                    class="h-7 rounded-md px-2 text-sm hover:bg-accent"
                    on:click=move |_| create_root(None)
                >
                    "+ New"
                </button>
            </div>

            {move || {
                error_state
                    .records_error
                    .get()
                    .map(|e| view! { <p class="px-3 text-xs text-destructive">{e}</p> })
            }}

            <div class="flex flex-wrap gap-1 px-3 pb-2">
                {move || {
                    let selected = tags_state.tag_filter.get();
                    tags_state
                        .tags
                        .get()
                        .into_iter()
                        .map(|tag| {
                            let active = selected.contains(&tag.id);
                            let class = if active {
                                "rounded-full border border-border px-2 text-xs bg-accent"
                            } else {
                                "rounded-full border border-border px-2 text-xs"
                            };
                            let toggle_tag = toggle_tag.clone();
                            let id = tag.id.clone();
                            view! {
                                <button class=class on:click=move |_| toggle_tag(id.clone())>
                                    "#"{tag.name}
                                </button>
                            }
                        })
                        .collect_view()
                }}
            </div>

            <nav class="flex-1 overflow-y-auto px-1">
                {move || {
                    let current = row_state.current_record_id.get();
                    rows()
                        .into_iter()
                        .map(|row| {
                            let indent = format!("padding-left: {}rem", 0.5 + row.depth as f32);
                            let active = current.as_deref() == Some(row.id.as_str());
                            let class = if active {
                                "group flex items-center gap-1 rounded-sm py-1 pr-1 text-sm bg-accent"
                            } else {
                                "group flex items-center gap-1 rounded-sm py-1 pr-1 text-sm hover:bg-accent"
                            };
                            let marker = match (row.has_children, row.expanded) {
                                (false, _) => " ",
                                (true, true) => "▾",
                                (true, false) => "▸",
                            };
                            let title = if row.title.trim().is_empty() {
                                "Untitled".to_string()
                            } else {
                                row.title.clone()
                            };
                            let s_toggle = row_state.clone();
                            let s_select = row_state.clone();
                            let on_create = on_create.clone();
                            let on_delete = on_delete.clone();
                            let on_move = on_move.clone();
                            let (id_toggle, id_select, id_child, id_delete) =
                                (row.id.clone(), row.id.clone(), row.id.clone(), row.id.clone());
                            let (id_drag, id_drop) = (row.id.clone(), row.id.clone());
                            let icon = row.icon.clone();
                            view! {
                                <div
                                    class=class
                                    style=indent
                                    draggable="true"
                                    on:dragstart=move |_ev: web_sys::DragEvent| {
                                        dragging.set(Some(id_drag.clone()));
                                    }
                                    on:dragover=move |ev: web_sys::DragEvent| ev.prevent_default()
                                    on:drop=move |ev: web_sys::DragEvent| {
                                        ev.prevent_default();
                                        ev.stop_propagation();
                                        if let Some(id) = dragging.get_untracked() {
                                            dragging.set(None);
                                            on_move(id, Some(id_drop.clone()));
                                        }
                                    }
                                >
                                    <button
                                        class="w-4 text-xs text-muted-foreground"
                                        on:click=move |_| s_toggle.toggle_expanded(&id_toggle)
                                    >
                                        {marker}
                                    </button>
                                    <button
                                        class="flex-1 truncate text-left"
                                        on:click=move |_| s_select.select_record(&id_select)
                                    >
                                        {icon.map(|i| view! { <span class="mr-1">{i}</span> })}
                                        {title}
                                    </button>
                                    <button
                                        class="hidden group-hover:block text-xs text-muted-foreground"
                                        title="Add sub-page"
                                        on:click=move |_| on_create(Some(id_child.clone()))
                                    >
                                        "+"
                                    </button>
                                    <button
                                        class="hidden group-hover:block text-xs text-muted-foreground"
                                        title="Delete"
                                        on:click=move |_| on_delete(id_delete.clone())
                                    >
                                        "×"
                                    </button>
                                </div>
                            }
                        })
                        .collect_view()
                }}
            </nav>
        </aside>
    }
}
