mod block_exit;
pub(crate) mod document;
mod dom;
pub(crate) mod markup;
pub(crate) mod palette;
pub(crate) mod selection;
pub(crate) mod session;
mod splice;

use crate::api::RecordStore;
use crate::autosave::AutosaveController;
use crate::models::{Record, RecordPatch};
use crate::state::AppContext;
use leptos::ev;
use leptos::html;
use leptos::prelude::*;
use leptos::task::spawn_local;
use palette::{Command, PaletteState};
use session::{EditOutcome, EditorSession, Key, KeyInput};
use wasm_bindgen::JsCast;

const ICON_CHOICES: &[&str] = &[
    "📄", "📝", "📚", "💡", "✅", "📌", "🗂️", "🚀", "🎯", "🔖", "🧪", "⭐",
];

/// Push a session outcome back to the surface. Returns `true` if the document changed.
fn show_outcome(
    el: &web_sys::HtmlElement,
    session: StoredValue<EditorSession>,
    outcome: EditOutcome,
) -> bool {
    let EditOutcome::Mutated { cursor } = outcome else {
        return false;
    };
    session.with_value(|s| {
        dom::render(el, s.document());
        dom::place_caret(el, s.document(), cursor);
    });
    true
}

#[component]
pub fn NoteEditor(record: Record) -> impl IntoView {
    let autosave = expect_context::<AutosaveController>();
    autosave.open_record(&record.id);

    let dirty = autosave.dirty;
    let saving = autosave.saving;
    let autosave_sv = StoredValue::new(autosave);

    let session = StoredValue::new(EditorSession::open(
        record.id.clone(),
        record.title.clone(),
        &record.content,
    ));
    let title = RwSignal::new(record.title.clone());
    let icon = RwSignal::new(record.icon.clone());
    let icon_open = RwSignal::new(false);
    let app_state = StoredValue::new(expect_context::<AppContext>());
    let palette: RwSignal<PaletteState> = RwSignal::new(PaletteState::Closed);

    let surface_ref: NodeRef<html::Div> = NodeRef::new();
    let palette_ref: NodeRef<html::Div> = NodeRef::new();

    session.with_value(|s| tracing::debug!(record_id = s.record_id(), "editor opened"));

    // Fill the surface once it is mounted; afterwards the browser owns it between edits.
    Effect::new(move |_| {
        if let Some(el) = surface_ref.get() {
            session.with_value(|s| dom::render(&el, s.document()));
        }
    });

    let sync_palette = move || {
        if let Some(state) = session.try_with_value(|s| s.palette().clone()) {
            palette.set(state);
        }
    };

    let edited = move || {
        let Some((t, markup)) = session
            .try_with_value(|s| s.is_touched().then(|| (s.title().to_string(), s.markup())))
            .flatten()
        else {
            return;
        };
        autosave_sv.with_value(|a| a.on_edit(&t, &markup));
    };

    let pick = move |command: &'static Command| {
        let Some(el) = surface_ref.get_untracked() else {
            return;
        };
        let outcome = session
            .try_update_value(|s| s.apply_command(command))
            .unwrap_or(EditOutcome::Consumed);
        sync_palette();
        if show_outcome(&el, session, outcome) {
            edited();
        }
    };

    let set_icon = move |next: Option<String>| {
        icon_open.set(false);
        let previous = icon.get_untracked();
        if previous == next {
            return;
        }
        icon.set(next.clone());
        let Some(state) = app_state.try_get_value().map(|ctx| ctx.0) else {
            return;
        };
        let Some(record_id) = session.try_with_value(|s| s.record_id().to_string()) else {
            return;
        };
        let api_client = state.api_client.get_untracked();
        spawn_local(async move {
            match api_client
                .update_record(&record_id, RecordPatch::icon(next.clone()))
                .await
            {
                Ok(_) => state.records.update(|list| {
                    if let Some(r) = list.iter_mut().find(|r| r.id == record_id) {
                        r.icon = next;
                    }
                }),
                Err(e) => {
                    tracing::warn!(record_id = %record_id, error = %e, "failed to set icon");
                    icon.set(previous);
                }
            }
        });
    };

    let pointer_handle = window_event_listener(ev::mousedown, move |ev: web_sys::MouseEvent| {
        if !palette.get_untracked().is_open() {
            return;
        }
        let target = ev
            .target()
            .and_then(|t| t.dyn_into::<web_sys::Node>().ok());
        let inside = |el: Option<web_sys::HtmlDivElement>| {
            el.map(|el| el.contains(target.as_ref())).unwrap_or(false)
        };
        if inside(surface_ref.get_untracked()) || inside(palette_ref.get_untracked()) {
            return;
        }
        session.try_update_value(|s| s.on_pointer_outside());
        sync_palette();
    });
    on_cleanup(move || pointer_handle.remove());

    let check_caret = move || {
        if !palette.get_untracked().is_open() {
            return;
        }
        let Some(el) = surface_ref.get_untracked() else {
            return;
        };
        if !dom::caret_in_text(&el) {
            session.try_update_value(|s| s.on_cursor_left_text());
            sync_palette();
        }
    };

    view! {
        <div class="flex-1 flex flex-col bg-background">
            <div class="border-b border-border p-4">
                <div class="flex items-center justify-between gap-4">
                    <div class="relative">
                        <button
                            class="h-9 w-9 rounded-md text-xl hover:bg-accent"
                            title="Page icon"
                            on:click=move |_| icon_open.update(|open| *open = !*open)
                        >
                            {move || icon.get().unwrap_or_else(|| "📄".to_string())}
                        </button>
                        <Show when=move || icon_open.get()>
                            <div class="absolute left-0 top-10 z-50 grid w-48 grid-cols-6 gap-1 rounded-md border border-border bg-popover p-2 shadow-md">
                                {ICON_CHOICES
                                    .iter()
                                    .map(|choice| {
                                        view! {
                                            <button
                                                class="rounded-sm text-lg hover:bg-accent"
                                                on:click=move |_| set_icon(Some(choice.to_string()))
                                            >
                                                {*choice}
                                            </button>
                                        }
                                    })
                                    .collect_view()}
                                <button
                                    class="col-span-6 mt-1 text-xs text-muted-foreground hover:underline"
                                    on:click=move |_| set_icon(None)
                                >
                                    "Remove icon"
                                </button>
                            </div>
                        </Show>
                    </div>
                    <input
                        class="text-xl font-semibold border-none shadow-none px-0 w-full bg-transparent outline-none"
                        placeholder="Untitled"
                        prop:value=move || title.get()
                        on:input=move |ev: web_sys::Event| {
                            let Some(input) = ev
                                .target()
                                .and_then(|t| t.dyn_into::<web_sys::HtmlInputElement>().ok())
                            else {
                                return;
                            };
                            let v = input.value();
                            title.set(v.clone());
                            session.try_update_value(|s| s.set_title(v));
                            edited();
                        }
                    />
                    <button
                        class="h-8 rounded-md border border-border px-3 text-sm disabled:opacity-50"
                        disabled=move || !dirty.get() || saving.get()
                        on:click=move |_| autosave_sv.with_value(|a| a.save_now())
                    >
                        {move || if saving.get() { "Saving..." } else { "Save" }}
                    </button>
                </div>
                <Show when=move || dirty.get()>
                    <p class="text-xs text-muted-foreground mt-1">"Unsaved changes"</p>
                </Show>
            </div>

            <div class="relative flex-1 p-4">
                <div
                    node_ref=surface_ref
                    class="quire-surface min-h-full outline-none"
                    contenteditable="true"
                    on:input=move |_ev: web_sys::Event| {
                        let Some(el) = surface_ref.get_untracked() else {
                            return;
                        };
                        let (doc, live) = dom::read_surface(&el);
                        session.try_update_value(|s| s.on_surface_changed(doc, live));
                        sync_palette();
                        edited();
                    }
                    on:keydown=move |ev: web_sys::KeyboardEvent| {
                        let Some(el) = surface_ref.get_untracked() else {
                            return;
                        };
                        let input = KeyInput {
                            key: Key::from_name(&ev.key()),
                            shift: ev.shift_key(),
                            ctrl: ev.ctrl_key(),
                            alt: ev.alt_key(),
                            meta: ev.meta_key(),
                        };
                        let outcome = session
                            .try_update_value(|s| {
                                let live = dom::live_selection(&el, s.document());
                                s.on_key(input, live)
                            })
                            .unwrap_or(EditOutcome::Ignored);
                        sync_palette();

                        if outcome != EditOutcome::Ignored {
                            ev.prevent_default();
                        }
                        if show_outcome(&el, session, outcome) {
                            edited();
                        }
                    }
                    on:keyup=move |_ev: web_sys::KeyboardEvent| check_caret()
                    on:click=move |_ev: web_sys::MouseEvent| check_caret()
                    on:paste=move |ev: web_sys::ClipboardEvent| dom::paste_plain_text(&ev)
                ></div>

                {move || {
                    let state = palette.get();
                    if !state.is_open() {
                        return ().into_any();
                    }
                    let selected = state.selected().unwrap_or(0);
                    let commands = state.visible_commands();

                    view! {
                        <div
                            node_ref=palette_ref
                            class="absolute left-4 top-4 z-50 w-64 rounded-md border border-border bg-popover p-1 shadow-md"
                            role="listbox"
                        >
                            {if commands.is_empty() {
                                view! {
                                    <div class="px-2 py-1.5 text-sm text-muted-foreground">
                                        "No commands found"
                                    </div>
                                }
                                .into_any()
                            } else {
                                commands
                                    .into_iter()
                                    .enumerate()
                                    .map(|(i, command)| {
                                        let aria_selected = if i == selected { "true" } else { "false" };
                                        let class = if i == selected {
                                            "w-full rounded-sm px-2 py-1.5 text-left bg-accent"
                                        } else {
                                            "w-full rounded-sm px-2 py-1.5 text-left"
                                        };
                                        view! {
                                            <button
                                                class=class
                                                role="option"
                                                aria-selected=aria_selected
                                                on:mousedown=move |ev: web_sys::MouseEvent| {
                                                    // Keep focus (and the caret) in the surface.
                                                    ev.prevent_default();
                                                    pick(command);
                                                }
                                            >
                                                <div class="text-sm font-medium">{command.label}</div>
                                                <div class="text-xs text-muted-foreground">
                                                    {command.description}
                                                </div>
                                            </button>
                                        }
                                    })
                                    .collect_view()
                                    .into_any()
                            }}
                        </div>
                    }
                    .into_any()
                }}
            </div>
        </div>
    }
}
