use super::{persist, AutosaveScheduler, SaveJob, TimerAction};
use crate::api::ApiResult;
use crate::models::Tag;
use crate::state::AppContext;
use crate::tags::merge_tag_cache;
use crate::util::now_ms;
use leptos::prelude::*;
use leptos::task::spawn_local;
use std::sync::{Arc, Mutex};
use wasm_bindgen::JsCast;

/// Browser side of autosave: one timeout per scheduler deadline, saves run on the
/// local executor.
#[derive(Clone)]
pub(crate) struct AutosaveController {
    app_state: AppContext,
    scheduler: Arc<Mutex<AutosaveScheduler>>,
    timer_id: Arc<Mutex<Option<i32>>>,

    /// Mirrors the scheduler for the "Unsaved changes" indicator.
    pub dirty: RwSignal<bool>,
    pub saving: RwSignal<bool>,
}

impl AutosaveController {
    pub fn new(app_state: AppContext) -> Self {
        let debounce_ms = app_state.0.config.autosave_ms;
        Self {
            app_state,
            scheduler: Arc::new(Mutex::new(AutosaveScheduler::new(debounce_ms))),
            timer_id: Arc::new(Mutex::new(None)),
            dirty: RwSignal::new(false),
            saving: RwSignal::new(false),
        }
    }

    fn with_scheduler<T>(&self, f: impl FnOnce(&mut AutosaveScheduler) -> T) -> Option<T> {
        self.scheduler.lock().ok().map(|mut s| f(&mut s))
    }

    /// Start tracking `record_id`; unsaved edits of the previous record are dropped.
    pub fn open_record(&self, record_id: &str) {
        self.cancel_timer();
        self.with_scheduler(|s| s.open_record(record_id));
        self.dirty.set(false);
    }

    /// Stop tracking the open record without saving it.
    pub fn close(&self) {
        self.cancel_timer();
        self.with_scheduler(|s| s.close());
        self.dirty.set(false);
    }

    pub fn on_edit(&self, title: &str, content: &str) {
        let armed = self.with_scheduler(|s| {
            s.mark_dirty(title, content, now_ms());
            s.is_dirty().then(|| s.debounce_ms())
        });
        if let Some(Some(delay)) = armed {
            self.dirty.set(true);
            self.arm_timer(delay);
        }
    }

    pub fn save_now(&self) {
        self.cancel_timer();
        if let Some(Some(job)) = self.with_scheduler(|s| s.save_now()) {
            self.run(job);
        }
    }

    fn cancel_timer(&self) {
        let Some(win) = web_sys::window() else {
            return;
        };
        if let Ok(mut slot) = self.timer_id.lock() {
            if let Some(tid) = slot.take() {
                win.clear_timeout_with_handle(tid);
            }
        }
    }

    fn arm_timer(&self, delay_ms: i64) {
        self.cancel_timer();
        let Some(win) = web_sys::window() else {
            return;
        };

        let s2 = self.clone();
        let cb = wasm_bindgen::closure::Closure::once_into_js(move || {
            s2.fire();
        });
        let tid = win
            .set_timeout_with_callback_and_timeout_and_arguments_0(
                cb.as_ref().unchecked_ref(),
                i32::try_from(delay_ms).unwrap_or(i32::MAX),
            )
            .ok();

        if let Ok(mut slot) = self.timer_id.lock() {
            *slot = tid;
        }
    }

    fn fire(&self) {
        if let Ok(mut slot) = self.timer_id.lock() {
            *slot = None;
        }
        match self.with_scheduler(|s| s.on_timer(now_ms())) {
            Some(TimerAction::Save(job)) => self.run(job),
            Some(TimerAction::Rearm(wait_ms)) => {
                tracing::debug!(wait_ms, "autosave timer fired early; re-arming");
                self.arm_timer(wait_ms);
            }
            Some(TimerAction::Idle) | None => {}
        }
    }

    fn run(&self, job: SaveJob) {
        let Some(owner) = self.app_state.0.owner_id.get_untracked() else {
            tracing::warn!(record_id = %job.record_id, "not signed in; save skipped");
            return;
        };
        let api_client = self.app_state.0.api_client.get_untracked();
        let s2 = self.clone();
        self.saving.set(true);
        spawn_local(async move {
            let result = persist(&job, &api_client, &api_client, &owner).await;
            s2.finish(job, result);
        });
    }

    fn finish(&self, job: SaveJob, result: ApiResult<Option<Vec<Tag>>>) {
        let ok = result.is_ok();
        let still_dirty = self
            .with_scheduler(|s| {
                s.complete(&job, ok);
                s.is_dirty()
            })
            .unwrap_or(true);
        self.dirty.set(still_dirty);
        self.saving.set(false);

        match result {
            Ok(tags) => {
                tracing::info!(record_id = %job.record_id, tags = ?tags.as_ref().map(Vec::len), "saved");
                self.app_state.0.records.update(|records| {
                    if let Some(r) = records.iter_mut().find(|r| r.id == job.record_id) {
                        r.title = job.title.clone();
                        r.content = job.content.clone();
                        // Unknown tags keep the cached set; the backend still has it.
                        if let Some(tags) = &tags {
                            r.tags = tags.clone();
                        }
                    }
                });
                if let Some(tags) = tags.filter(|t| !t.is_empty()) {
                    self.app_state
                        .0
                        .tags
                        .update(|cache| *cache = merge_tag_cache(cache, &tags));
                }
            }
            Err(e) => {
                tracing::warn!(record_id = %job.record_id, error = %e, "autosave failed");
            }
        }
    }
}

#[cfg(all(test, target_arch = "wasm32"))]
mod wasm_tests {
    use super::*;
    use crate::config::EnvConfig;
    use crate::state::AppState;
    use wasm_bindgen_test::*;

    wasm_bindgen_test_configure!(run_in_browser);

    fn controller() -> AutosaveController {
        AutosaveController::new(AppContext(AppState::new(EnvConfig::default())))
    }

    fn timer_armed(c: &AutosaveController) -> bool {
        c.timer_id.lock().map(|slot| slot.is_some()).unwrap_or(false)
    }

    #[wasm_bindgen_test]
    fn test_early_fire_rearms_instead_of_dropping_edit() {
        let c = controller();
        c.open_record("p1");
        c.on_edit("T", "<div>x</div>");
        assert!(c.dirty.get_untracked());
        assert!(timer_armed(&c));

        // Fired well before the debounce deadline.
        c.fire();
        assert!(timer_armed(&c));
        assert!(c.dirty.get_untracked());
        assert!(!c.saving.get_untracked());

        c.close();
        assert!(!timer_armed(&c));
        assert!(!c.dirty.get_untracked());
    }
}
