use std::sync::Arc;
use std::time::Duration;

use crate::blog::{
    Category, CategoryMap, DraftManager, DraftTarget, Outcome, Post, PostRepository, Result,
    SessionState,
};
use crate::config::AppConfig;
use crate::journaling::{AutoSaveEvent, AutoSaveRuntime, AutoSaveStatus};
use crate::storage::KeyValueStore;

mod editor;

pub use editor::{EditorOrigin, EditorSession};

/// Owns the posts, drafts, session flag and the single open editor.
///
/// Everything runs on the caller's thread; the autosave deadline only
/// advances when [`tick`](Self::tick) is called.
pub struct BlogApp<S> {
    pub config: Arc<AppConfig>,
    posts: PostRepository<S>,
    drafts: DraftManager<S>,
    session: SessionState<S>,
    auto_save: AutoSaveRuntime,
    editor: Option<EditorSession>,
}

impl<S: KeyValueStore + Clone> BlogApp<S> {
    pub fn open(store: S, config: Arc<AppConfig>) -> Result<Self> {
        let posts = PostRepository::load(store.clone())?;
        let session = SessionState::restored(store.clone(), config.admin.password.clone())?;
        let drafts = DraftManager::new(store);
        let auto_save = AutoSaveRuntime::new(&config.auto_save);
        Ok(Self {
            config,
            posts,
            drafts,
            session,
            auto_save,
            editor: None,
        })
    }

    pub fn posts(&self) -> &CategoryMap {
        self.posts.posts()
    }

    pub fn post(&self, category: Category, id: u64) -> Option<&Post> {
        self.posts.get(category, id)
    }

    pub fn drafts(&self) -> &DraftManager<S> {
        &self.drafts
    }

    pub fn is_admin(&self) -> bool {
        self.session.is_admin()
    }

    pub fn editor(&self) -> Option<&EditorSession> {
        self.editor.as_ref()
    }

    pub fn autosave_status(&self) -> AutoSaveStatus {
        self.auto_save.status()
    }

    pub fn autosave_due_in(&self) -> Option<Duration> {
        self.auto_save.time_until_due()
    }

    pub fn login(&mut self, secret: &str) -> Result<bool> {
        self.session.login(secret)
    }

    /// Closes any open editor without keeping its pending input, then logs
    /// out and drops every draft.
    pub fn logout(&mut self) -> Result<usize> {
        self.auto_save.cancel();
        self.editor = None;
        self.session.logout()
    }

    /// Opens the new-post form, restoring the category's new-post draft if
    /// one exists. `None` when not logged in.
    pub fn begin_new(&mut self, category: Category) -> Result<Option<&EditorSession>> {
        if !self.session.is_admin() {
            return Ok(None);
        }
        self.close();
        let draft = self.drafts.load(category, DraftTarget::New)?;
        self.editor = Some(EditorSession::for_new(category, draft));
        Ok(self.editor.as_ref())
    }

    /// Opens an existing post; a draft for it takes precedence over the stored
    /// fields. `None` when not logged in or the post does not exist.
    pub fn begin_edit(&mut self, category: Category, id: u64) -> Result<Option<&EditorSession>> {
        if !self.session.is_admin() {
            return Ok(None);
        }
        let Some(post) = self.posts.get(category, id).cloned() else {
            return Ok(None);
        };
        self.close();
        let draft = self.drafts.load(category, DraftTarget::Post(id))?;
        self.editor = Some(EditorSession::for_post(category, &post, draft));
        Ok(self.editor.as_ref())
    }

    /// Records the form's current fields and restarts the autosave timer.
    pub fn input(&mut self, title: &str, content: &str) -> bool {
        if !self.session.is_admin() {
            return false;
        }
        let Some(editor) = self.editor.as_mut() else {
            return false;
        };
        editor.title = title.to_string();
        editor.content = content.to_string();
        self.auto_save
            .schedule(editor.category, editor.target, title, content);
        true
    }

    pub fn tick(&mut self) -> Option<AutoSaveEvent> {
        self.auto_save.poll(&self.drafts)
    }

    /// Stages the pending draft right away, if any.
    pub fn flush_draft(&mut self) -> Option<AutoSaveEvent> {
        self.auto_save.flush_now(&self.drafts)
    }

    /// Saves the open form as a post.
    ///
    /// A validation error leaves the form open with its pending autosave.
    /// On success the pending autosave is dropped so it cannot bring the
    /// draft back.
    pub fn save(&mut self) -> Result<Outcome<Post>> {
        if !self.session.is_admin() {
            return Ok(Outcome::Denied);
        }
        let Some(editor) = self.editor.as_ref() else {
            return Ok(Outcome::NotFound);
        };
        let outcome = match editor.target {
            DraftTarget::New => {
                self.posts
                    .add(&self.session, editor.category, &editor.title, &editor.content)?
            }
            DraftTarget::Post(id) => self.posts.update(
                &self.session,
                editor.category,
                id,
                &editor.title,
                &editor.content,
            )?,
        };
        self.auto_save.cancel();
        self.editor = None;
        Ok(outcome)
    }

    /// Closes the form and keeps the work as a draft, staging any pending
    /// input immediately. With autosave disabled the form's fields are
    /// staged directly. `None` when there was nothing new to stage.
    pub fn close(&mut self) -> Option<AutoSaveEvent> {
        let editor = self.editor.take()?;
        if self.auto_save.is_enabled() {
            return self.flush_draft();
        }
        self.auto_save.stage_now(
            &self.drafts,
            editor.category,
            editor.target,
            &editor.title,
            &editor.content,
        )
    }

    /// Closes the form and throws its draft away.
    pub fn discard(&mut self) -> Result<bool> {
        let Some(editor) = self.editor.take() else {
            return Ok(false);
        };
        self.auto_save.cancel();
        self.drafts.clear(editor.category, editor.target)?;
        tracing::debug!(category = %editor.category, target = %editor.target, "draft discarded");
        Ok(true)
    }

    pub fn delete(&mut self, category: Category, id: u64) -> Result<Outcome<Post>> {
        let outcome = self.posts.remove(&self.session, category, id)?;
        if outcome.is_applied() {
            self.drop_editor_for(|editor| {
                editor.category == category && editor.target == DraftTarget::Post(id)
            });
        }
        Ok(outcome)
    }

    pub fn delete_all(&mut self, category: Category) -> Result<Outcome<usize>> {
        let outcome = self.posts.remove_all(&self.session, category)?;
        if outcome.is_applied() {
            self.drop_editor_for(|editor| editor.category == category);
        }
        Ok(outcome)
    }

    /// Re-writes the full post map. Admin only.
    pub fn persist_now(&mut self) -> Result<bool> {
        if !self.session.is_admin() {
            return Ok(false);
        }
        self.posts.persist()?;
        Ok(true)
    }

    pub fn draft_count(&self) -> Result<usize> {
        Ok(self.drafts.list()?.len())
    }

    /// Drops the editor (and its pending stage) when it points at posts that
    /// no longer exist.
    fn drop_editor_for(&mut self, predicate: impl Fn(&EditorSession) -> bool) {
        if self.editor.as_ref().is_some_and(predicate) {
            self.auto_save.cancel();
            self.editor = None;
        }
    }
}
