use crate::api::{ApiResult, RecordStore, TagStore};
use crate::models::{RecordPatch, Tag};
use crate::tags::sync_tags_from_content;

mod controller;

pub(crate) use controller::AutosaveController;

/// One persistence call: the record's title and content as of `generation`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct SaveJob {
    pub record_id: String,
    pub title: String,
    pub content: String,
    pub generation: u64,
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct Pending {
    title: String,
    content: String,
}

/// What a fired browser timer should do.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum TimerAction {
    Save(SaveJob),
    /// The deadline is still ahead of the clock; wait this many more milliseconds.
    Rearm(i64),
    Idle,
}

/// Debounces edits into save jobs. Time is passed in as epoch milliseconds.
///
/// Every edit re-arms the single deadline; there is no maximum wait. Opening another
/// record drops the pending edits of the previous one without saving them.
#[derive(Clone, Debug)]
pub(crate) struct AutosaveScheduler {
    debounce_ms: i64,
    record_id: Option<String>,
    pending: Option<Pending>,
    generation: u64,
    deadline: Option<i64>,
    dirty: bool,
}

impl AutosaveScheduler {
    pub fn new(debounce_ms: u32) -> Self {
        Self {
            debounce_ms: i64::from(debounce_ms),
            record_id: None,
            pending: None,
            generation: 0,
            deadline: None,
            dirty: false,
        }
    }

    pub fn debounce_ms(&self) -> i64 {
        self.debounce_ms
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    #[cfg(test)]
    pub fn deadline(&self) -> Option<i64> {
        self.deadline
    }

    pub fn open_record(&mut self, record_id: impl Into<String>) {
        let record_id = record_id.into();
        if self.dirty {
            tracing::warn!(
                previous = self.record_id.as_deref().unwrap_or_default(),
                next = %record_id,
                "switching records with unsaved edits"
            );
        }
        self.record_id = Some(record_id);
        self.pending = None;
        self.deadline = None;
        self.dirty = false;
        self.generation += 1;
    }

    pub fn close(&mut self) {
        self.record_id = None;
        self.pending = None;
        self.deadline = None;
        self.dirty = false;
        self.generation += 1;
    }

    /// Record an edit and push the deadline out to `now + debounce`.
    pub fn mark_dirty(&mut self, title: &str, content: &str, now: i64) {
        if self.record_id.is_none() {
            return;
        }
        self.pending = Some(Pending {
            title: title.to_string(),
            content: content.to_string(),
        });
        self.generation += 1;
        self.dirty = true;
        self.deadline = Some(now + self.debounce_ms);
    }

    /// The job to run if the deadline has passed.
    pub fn poll(&mut self, now: i64) -> Option<SaveJob> {
        match self.deadline {
            Some(at) if at <= now => {
                self.deadline = None;
                self.job()
            }
            _ => None,
        }
    }

    /// A timer armed for the deadline went off.
    ///
    /// Timers may fire before the clock reaches the deadline; the remaining wait is
    /// returned instead of dropping the edit.
    pub fn on_timer(&mut self, now: i64) -> TimerAction {
        if let Some(job) = self.poll(now) {
            return TimerAction::Save(job);
        }
        match self.deadline {
            Some(at) if self.dirty => TimerAction::Rearm((at - now).max(1)),
            _ => TimerAction::Idle,
        }
    }

    /// Manual save: skip the timer. `None` when there is nothing unsaved.
    pub fn save_now(&mut self) -> Option<SaveJob> {
        self.deadline = None;
        self.job()
    }

    fn job(&self) -> Option<SaveJob> {
        if !self.dirty {
            return None;
        }
        let record_id = self.record_id.clone()?;
        let pending = self.pending.as_ref()?;
        Some(SaveJob {
            record_id,
            title: pending.title.clone(),
            content: pending.content.clone(),
            generation: self.generation,
        })
    }

    /// Report a finished job. Dirty is cleared only when it succeeded and nothing newer
    /// was edited meanwhile.
    pub fn complete(&mut self, job: &SaveJob, ok: bool) {
        if self.record_id.as_deref() != Some(job.record_id.as_str()) {
            return;
        }
        if ok && job.generation == self.generation {
            self.dirty = false;
            self.pending = None;
        }
    }
}

/// Save the record, then bring its tags in line with the saved content.
///
/// A failed record update is returned as the error. A failed tag sync is logged and
/// yields `None`: the save itself still counts as done, and the record's tags are
/// unknown rather than empty.
pub(crate) async fn persist<R: RecordStore, T: TagStore>(
    job: &SaveJob,
    records: &R,
    tags: &T,
    owner: &str,
) -> ApiResult<Option<Vec<Tag>>> {
    records
        .update_record(
            &job.record_id,
            RecordPatch::title_and_content(&job.title, &job.content),
        )
        .await?;

    match sync_tags_from_content(tags, &job.record_id, &job.content, owner).await {
        Ok(synced) => Ok(Some(synced)),
        Err(e) => {
            tracing::warn!(record_id = %job.record_id, error = %e, "tag sync failed");
            Ok(None)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::memory::MemoryBackend;
    use futures::executor::block_on;

    fn scheduler() -> AutosaveScheduler {
        let mut s = AutosaveScheduler::new(2000);
        s.open_record("p1");
        s
    }

    #[test]
    fn test_burst_of_edits_yields_one_job_with_final_content() {
        let mut s = scheduler();
        let mut jobs = Vec::new();
        for (i, now) in [0, 500, 1000, 1500, 1900].into_iter().enumerate() {
            s.mark_dirty("T", &format!("<div>v{i}</div>"), now);
            jobs.extend(s.poll(now));
        }
        assert!(jobs.is_empty());
        assert_eq!(s.poll(3899), None);

        let job = s.poll(3900).expect("deadline passed");
        assert_eq!(job.content, "<div>v4</div>");
        assert_eq!(s.poll(10_000), None);
    }

    #[test]
    fn test_success_clears_dirty() {
        let mut s = scheduler();
        s.mark_dirty("T", "c", 0);
        let job = s.poll(2000).expect("job");
        s.complete(&job, true);
        assert!(!s.is_dirty());
    }

    #[test]
    fn test_failure_keeps_dirty_without_retry() {
        let mut s = scheduler();
        s.mark_dirty("T", "c", 0);
        let job = s.poll(2000).expect("job");
        s.complete(&job, false);
        assert!(s.is_dirty());
        assert_eq!(s.poll(60_000), None);
        // A manual save retries.
        assert_eq!(s.save_now().map(|j| j.content), Some("c".to_string()));
    }

    #[test]
    fn test_edit_during_save_stays_dirty() {
        let mut s = scheduler();
        s.mark_dirty("T", "first", 0);
        let job = s.poll(2000).expect("job");
        s.mark_dirty("T", "second", 2100);
        s.complete(&job, true);
        assert!(s.is_dirty());
        assert_eq!(s.poll(4100).map(|j| j.content), Some("second".to_string()));
    }

    #[test]
    fn test_save_now_cancels_timer() {
        let mut s = scheduler();
        s.mark_dirty("T", "c", 0);
        let job = s.save_now().expect("job");
        assert_eq!(s.deadline(), None);
        assert_eq!(s.poll(5000), None);
        s.complete(&job, true);
        assert_eq!(s.save_now(), None);
    }

    #[test]
    fn test_switching_record_drops_pending_edits() {
        let mut s = scheduler();
        s.mark_dirty("T", "lost", 0);
        let stale = s.save_now().expect("job");
        s.open_record("p2");
        assert!(!s.is_dirty());
        assert_eq!(s.poll(10_000), None);

        // A completion for the previous record does not touch the new one.
        s.mark_dirty("U", "kept", 0);
        s.complete(&stale, true);
        assert!(s.is_dirty());
    }

    #[test]
    fn test_edits_without_open_record_are_ignored() {
        let mut s = AutosaveScheduler::new(2000);
        s.mark_dirty("T", "c", 0);
        assert!(!s.is_dirty());
        assert_eq!(s.save_now(), None);
    }

    fn job(content: &str) -> SaveJob {
        SaveJob {
            record_id: "p1".to_string(),
            title: "Plan".to_string(),
            content: content.to_string(),
            generation: 1,
        }
    }

    #[test]
    fn test_persist_updates_record_then_tags() {
        let store = MemoryBackend::with_record("p1", "Old", "");
        let tags = block_on(persist(&job("<div>#Work</div>"), &store, &store, "u1"))
            .expect("saved")
            .expect("tags synced");

        let saved = store.record("p1").expect("record");
        assert_eq!(saved.title, "Plan");
        assert_eq!(saved.content, "<div>#Work</div>");
        assert_eq!(tags.len(), 1);
        assert_eq!(store.associated_names("p1"), vec!["work"]);
    }

    #[test]
    fn test_persist_failure_skips_tag_sync() {
        let store = MemoryBackend::with_record("p1", "Old", "");
        *store.fail_updates.borrow_mut() = true;
        assert!(block_on(persist(&job("#x"), &store, &store, "u1")).is_err());
        assert!(store.tag_names().is_empty());
        assert_eq!(store.update_calls().len(), 1);
    }

    #[test]
    fn test_tag_sync_failure_does_not_fail_save() {
        let store = MemoryBackend::with_record("p1", "Old", "");
        *store.fail_associations.borrow_mut() = true;
        let tags = block_on(persist(&job("#x"), &store, &store, "u1")).expect("saved");
        assert_eq!(tags, None);
        assert_eq!(store.record("p1").map(|r| r.content), Some("#x".to_string()));
    }

    #[test]
    fn test_tag_sync_failure_reports_unknown_tags_not_empty() {
        let store = MemoryBackend::with_record("p1", "Old", "<div>#old</div>")
            .with_associations("p1", "u1", &["old"]);
        *store.fail_associations.borrow_mut() = true;

        let tags = block_on(persist(&job("<div>#old #new</div>"), &store, &store, "u1"))
            .expect("saved");
        assert_eq!(tags, None);
        assert_eq!(store.associated_names("p1"), vec!["old"]);
    }

    #[test]
    fn test_early_timer_rearms_for_remaining_wait() {
        let mut s = scheduler();
        s.mark_dirty("T", "c", 1000);
        assert_eq!(s.on_timer(2999), TimerAction::Rearm(1));
        assert_eq!(s.deadline(), Some(3000));
        assert_eq!(s.on_timer(2500), TimerAction::Rearm(500));

        match s.on_timer(3000) {
            TimerAction::Save(job) => assert_eq!(job.content, "c"),
            other => panic!("expected a save, got {other:?}"),
        }
        assert_eq!(s.on_timer(9000), TimerAction::Idle);
    }

    #[test]
    fn test_timer_after_clock_step_back_still_rearms() {
        let mut s = scheduler();
        s.mark_dirty("T", "c", 5000);
        // Wall clock moved back an hour before the timer fired.
        assert_eq!(s.on_timer(5000 - 3_600_000), TimerAction::Rearm(3_602_000));
        assert!(s.is_dirty());
    }

    #[test]
    fn test_timer_when_clean_is_idle() {
        let mut s = scheduler();
        assert_eq!(s.on_timer(10_000), TimerAction::Idle);
    }

    #[test]
    fn test_single_persistence_call_for_burst() {
        let store = MemoryBackend::with_record("p1", "T", "");
        let mut s = scheduler();
        for now in 0..10 {
            s.mark_dirty("T", &format!("n{now}"), now * 100);
        }
        while let Some(job) = s.poll(5000) {
            let ok = block_on(persist(&job, &store, &store, "u1")).is_ok();
            s.complete(&job, ok);
        }
        let calls = store.update_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1.content.as_deref(), Some("n9"));
    }
}
