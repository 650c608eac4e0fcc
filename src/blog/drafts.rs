use std::cmp::Ordering;

use anyhow::Context;

use super::model::{category_draft_prefix, draft_key, Category, Draft, DraftTarget, DRAFT_PREFIX};
use super::Result;
use crate::storage::KeyValueStore;

/// Staging area for unsaved edits, one record per (category, post) slot.
///
/// Holds no state of its own; every call goes straight to the store, so clones
/// are interchangeable.
#[derive(Clone)]
pub struct DraftManager<S> {
    store: S,
}

impl<S: KeyValueStore> DraftManager<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Writes or overwrites the draft for the slot.
    ///
    /// Blank title and content is ignored: nothing is written and an older
    /// draft for the slot stays in place.
    pub fn stage(
        &self,
        category: Category,
        target: DraftTarget,
        title: &str,
        content: &str,
    ) -> Result<Option<Draft>> {
        let title = title.trim();
        let content = content.trim();
        if title.is_empty() && content.is_empty() {
            tracing::debug!(%category, %target, "skipping blank draft");
            return Ok(None);
        }
        let draft = Draft::new(category, target, title, content);
        let key = draft_key(category, target);
        let json = serde_json::to_string(&draft).context("serialising draft")?;
        self.store.set(&key, &json)?;
        tracing::debug!(%key, "draft staged");
        Ok(Some(draft))
    }

    /// An unreadable record is reported as absent and left in the store.
    pub fn load(&self, category: Category, target: DraftTarget) -> Result<Option<Draft>> {
        let key = draft_key(category, target);
        Ok(self.read(&key)?)
    }

    pub fn clear(&self, category: Category, target: DraftTarget) -> Result<()> {
        self.store.remove(&draft_key(category, target))?;
        Ok(())
    }

    pub fn clear_all(&self) -> Result<usize> {
        self.clear_prefix(DRAFT_PREFIX)
    }

    pub fn clear_category(&self, category: Category) -> Result<usize> {
        self.clear_prefix(&category_draft_prefix(category))
    }

    /// Every readable draft, most recently staged first.
    pub fn list(&self) -> Result<Vec<Draft>> {
        let mut drafts = Vec::new();
        for key in self.store.keys_with_prefix(DRAFT_PREFIX)? {
            if let Some(draft) = self.read(&key)? {
                drafts.push(draft);
            }
        }
        drafts.sort_by(|a, b| match b.timestamp.cmp(&a.timestamp) {
            Ordering::Equal => a.category.cmp(&b.category),
            other => other,
        });
        Ok(drafts)
    }

    fn read(&self, key: &str) -> anyhow::Result<Option<Draft>> {
        let Some(raw) = self.store.get(key)? else {
            return Ok(None);
        };
        match serde_json::from_str::<Draft>(&raw) {
            Ok(draft) => Ok(Some(draft)),
            Err(err) => {
                tracing::warn!(?err, %key, "ignoring unreadable draft");
                Ok(None)
            }
        }
    }

    fn clear_prefix(&self, prefix: &str) -> Result<usize> {
        let keys = self.store.keys_with_prefix(prefix)?;
        for key in &keys {
            self.store.remove(key)?;
        }
        if !keys.is_empty() {
            tracing::debug!(prefix, removed = keys.len(), "drafts cleared");
        }
        Ok(keys.len())
    }
}
