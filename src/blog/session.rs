use super::drafts::DraftManager;
use super::model::ADMIN_KEY;
use super::Result;
use crate::storage::KeyValueStore;

const ADMIN_VALUE: &str = "true";

/// The admin flag. Survives restarts until an explicit logout.
pub struct SessionState<S> {
    store: S,
    drafts: DraftManager<S>,
    secret: String,
    admin: bool,
}

impl<S: KeyValueStore + Clone> SessionState<S> {
    /// Starts logged out; call [`restore`](Self::restore) to pick up a
    /// persisted login.
    pub fn new(store: S, secret: impl Into<String>) -> Self {
        let drafts = DraftManager::new(store.clone());
        Self {
            store,
            drafts,
            secret: secret.into(),
            admin: false,
        }
    }

    pub fn restored(store: S, secret: impl Into<String>) -> Result<Self> {
        let mut session = Self::new(store, secret);
        session.restore()?;
        Ok(session)
    }

    pub fn is_admin(&self) -> bool {
        self.admin
    }

    pub fn restore(&mut self) -> Result<bool> {
        self.admin = self.store.get(ADMIN_KEY)?.as_deref() == Some(ADMIN_VALUE);
        tracing::debug!(admin = self.admin, "session restored");
        Ok(self.admin)
    }

    /// Returns `false` on a wrong secret, leaving the session untouched.
    pub fn login(&mut self, supplied: &str) -> Result<bool> {
        if supplied != self.secret {
            tracing::warn!("admin login rejected");
            return Ok(false);
        }
        self.store.set(ADMIN_KEY, ADMIN_VALUE)?;
        self.admin = true;
        tracing::info!("admin logged in");
        Ok(true)
    }

    /// Leaves admin mode and drops every draft. Returns the number of drafts
    /// removed.
    pub fn logout(&mut self) -> Result<usize> {
        self.admin = false;
        self.store.remove(ADMIN_KEY)?;
        let cleared = self.drafts.clear_all()?;
        tracing::info!(drafts = cleared, "admin logged out");
        Ok(cleared)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blog::model::{Category, DraftTarget, POSTS_KEY};
    use crate::blog::PostRepository;
    use crate::storage::MemoryStore;

    #[test]
    fn wrong_secret_changes_nothing() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut session = SessionState::new(store.clone(), "admin123");

        assert!(!session.login("letmein")?);
        assert!(!session.is_admin());
        assert_eq!(store.get(ADMIN_KEY)?, None);
        Ok(())
    }

    #[test]
    fn correct_secret_sets_flag_and_key() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let mut session = SessionState::new(store.clone(), "admin123");

        assert!(session.login("admin123")?);
        assert!(session.is_admin());
        assert_eq!(store.get(ADMIN_KEY)?.as_deref(), Some("true"));
        Ok(())
    }

    #[test]
    fn restore_trusts_the_persisted_flag() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        SessionState::new(store.clone(), "admin123").login("admin123")?;

        let session = SessionState::restored(store.clone(), "admin123")?;
        assert!(session.is_admin());

        store.set(ADMIN_KEY, "yes")?;
        let session = SessionState::restored(store, "admin123")?;
        assert!(!session.is_admin());
        Ok(())
    }

    #[test]
    fn logout_clears_drafts_but_not_posts() -> anyhow::Result<()> {
        let store = MemoryStore::new();
        let repo = PostRepository::load(store.clone())?;
        let mut session = SessionState::new(store.clone(), "admin123");
        session.login("admin123")?;

        let drafts = DraftManager::new(store.clone());
        drafts.stage(Category::Musings, DraftTarget::New, "a", "")?;
        drafts.stage(Category::Observations, DraftTarget::Post(3), "b", "")?;
        drafts.stage(Category::Thoughts, DraftTarget::Post(6), "c", "")?;
        let posts_before = store.get(POSTS_KEY)?;

        assert_eq!(session.logout()?, 3);
        assert!(!session.is_admin());
        assert!(store.keys_with_prefix("draft_")?.is_empty());
        assert_eq!(store.get(ADMIN_KEY)?, None);
        assert_eq!(store.get(POSTS_KEY)?, posts_before);
        assert_eq!(repo.posts().total(), 6);
        Ok(())
    }
}
