//! Posts, drafts and the admin session, all persisted through a
//! [`KeyValueStore`](crate::storage::KeyValueStore).

mod drafts;
mod model;
mod posts;
mod session;

use thiserror::Error;

pub use drafts::DraftManager;
pub use model::{
    category_draft_prefix, draft_key, format_date, now_millis, today, Category, CategoryMap,
    Draft, DraftTarget, Post, ADMIN_KEY, DRAFT_PREFIX, POSTS_KEY,
};
pub use posts::PostRepository;
pub use session::SessionState;

#[derive(Debug, Error)]
pub enum BlogError {
    #[error("{0}")]
    Validation(String),
    #[error("stored value under `{key}` is unreadable; leaving it untouched")]
    Corrupt {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

pub type Result<T, E = BlogError> = std::result::Result<T, E>;

/// Result of a gated mutation. Permission and not-found cases are quiet
/// no-ops rather than errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome<T> {
    Applied(T),
    /// Caller is not logged in as admin.
    Denied,
    NotFound,
    /// Bulk operation on an already empty category.
    Empty,
}

impl<T> Outcome<T> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Outcome::Applied(_))
    }

    pub fn applied(self) -> Option<T> {
        match self {
            Outcome::Applied(value) => Some(value),
            _ => None,
        }
    }
}
