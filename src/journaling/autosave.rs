use std::time::{Duration, Instant};

use time::OffsetDateTime;

use crate::blog::{Category, DraftManager, DraftTarget};
use crate::config::AutoSaveConfig;
use crate::storage::KeyValueStore;

#[derive(Debug, Clone)]
pub enum AutoSaveStatus {
    Disabled,
    Idle {
        last_staged_at: Option<OffsetDateTime>,
    },
    Pending {
        category: Category,
        target: DraftTarget,
        since: OffsetDateTime,
    },
    Error {
        message: String,
        occurred_at: OffsetDateTime,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AutoSaveEvent {
    Staged {
        category: Category,
        target: DraftTarget,
        timestamp: i64,
    },
    /// Both fields were blank, so no draft was written.
    Skipped {
        category: Category,
        target: DraftTarget,
    },
    Error {
        category: Category,
        target: DraftTarget,
        message: String,
    },
}

/// Debounce timer in front of [`DraftManager::stage`].
///
/// Holds at most one pending stage. Scheduling again replaces it and restarts
/// the quiet period; only a stage that survives the full period runs.
#[derive(Debug)]
pub struct AutoSaveRuntime {
    enabled: bool,
    debounce: Duration,
    pending: Option<PendingStage>,
    last_staged_at: Option<OffsetDateTime>,
    last_error: Option<AutoSaveFailure>,
}

#[derive(Debug)]
struct PendingStage {
    category: Category,
    target: DraftTarget,
    title: String,
    content: String,
    due: Instant,
    since: OffsetDateTime,
}

#[derive(Debug, Clone)]
struct AutoSaveFailure {
    message: String,
    occurred_at: OffsetDateTime,
}

impl AutoSaveRuntime {
    pub fn new(config: &AutoSaveConfig) -> Self {
        Self {
            enabled: config.enabled,
            debounce: config.debounce_duration(),
            pending: None,
            last_staged_at: None,
            last_error: None,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn status(&self) -> AutoSaveStatus {
        if !self.enabled {
            return AutoSaveStatus::Disabled;
        }
        if let Some(pending) = &self.pending {
            return AutoSaveStatus::Pending {
                category: pending.category,
                target: pending.target,
                since: pending.since,
            };
        }
        if let Some(failure) = &self.last_error {
            return AutoSaveStatus::Error {
                message: failure.message.clone(),
                occurred_at: failure.occurred_at,
            };
        }
        AutoSaveStatus::Idle {
            last_staged_at: self.last_staged_at,
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// Returns `false` when autosave is disabled.
    pub fn schedule(
        &mut self,
        category: Category,
        target: DraftTarget,
        title: &str,
        content: &str,
    ) -> bool {
        if !self.enabled {
            return false;
        }
        let now = Instant::now();
        let since = match &self.pending {
            Some(previous) if previous.category == category && previous.target == target => {
                previous.since
            }
            _ => OffsetDateTime::now_utc(),
        };
        self.pending = Some(PendingStage {
            category,
            target,
            title: title.to_string(),
            content: content.to_string(),
            due: now + self.debounce,
            since,
        });
        tracing::trace!(%category, %target, "autosave rescheduled");
        true
    }

    pub fn cancel(&mut self) -> bool {
        let cancelled = self.pending.take().is_some();
        if cancelled {
            tracing::trace!("pending autosave cancelled");
        }
        cancelled
    }

    /// Time left before the pending stage is due, zero if overdue.
    pub fn time_until_due(&self) -> Option<Duration> {
        self.pending
            .as_ref()
            .map(|pending| pending.due.saturating_duration_since(Instant::now()))
    }

    pub fn poll<S: KeyValueStore>(&mut self, drafts: &DraftManager<S>) -> Option<AutoSaveEvent> {
        self.poll_at(drafts, Instant::now())
    }

    pub fn poll_at<S: KeyValueStore>(
        &mut self,
        drafts: &DraftManager<S>,
        now: Instant,
    ) -> Option<AutoSaveEvent> {
        let ready = self
            .pending
            .as_ref()
            .map(|pending| now >= pending.due)
            .unwrap_or(false);
        if !ready {
            return None;
        }
        self.run_pending(drafts)
    }

    /// Runs the pending stage now, ignoring the quiet period.
    pub fn flush_now<S: KeyValueStore>(
        &mut self,
        drafts: &DraftManager<S>,
    ) -> Option<AutoSaveEvent> {
        self.run_pending(drafts)
    }

    /// Stages the given fields immediately, replacing any pending stage.
    /// Runs whether or not autosave is enabled.
    pub fn stage_now<S: KeyValueStore>(
        &mut self,
        drafts: &DraftManager<S>,
        category: Category,
        target: DraftTarget,
        title: &str,
        content: &str,
    ) -> Option<AutoSaveEvent> {
        self.pending = Some(PendingStage {
            category,
            target,
            title: title.to_string(),
            content: content.to_string(),
            due: Instant::now(),
            since: OffsetDateTime::now_utc(),
        });
        self.run_pending(drafts)
    }

    /// Store failures are reported as [`AutoSaveEvent::Error`] and kept in
    /// [`status`](Self::status); they never abort the caller.
    fn run_pending<S: KeyValueStore>(
        &mut self,
        drafts: &DraftManager<S>,
    ) -> Option<AutoSaveEvent> {
        let PendingStage {
            category,
            target,
            title,
            content,
            ..
        } = self.pending.take()?;
        let event = match drafts.stage(category, target, &title, &content) {
            Ok(Some(draft)) => {
                self.last_staged_at = draft.staged_at();
                self.last_error = None;
                AutoSaveEvent::Staged {
                    category,
                    target,
                    timestamp: draft.timestamp,
                }
            }
            Ok(None) => AutoSaveEvent::Skipped { category, target },
            Err(err) => {
                let message = err.to_string();
                tracing::warn!(%category, %target, %message, "autosave failed");
                self.last_error = Some(AutoSaveFailure {
                    message: message.clone(),
                    occurred_at: OffsetDateTime::now_utc(),
                });
                AutoSaveEvent::Error {
                    category,
                    target,
                    message,
                }
            }
        };
        Some(event)
    }
}
