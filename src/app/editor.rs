use crate::blog::{Category, Draft, DraftTarget, Post};

/// Where the editor's starting values came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditorOrigin {
    /// An unsaved draft took precedence; carries its epoch-millis timestamp.
    Draft { timestamp: i64 },
    /// The stored post, no draft existed.
    Post,
    /// Empty fields for a new post.
    Blank,
}

/// The one open editing form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditorSession {
    pub category: Category,
    pub target: DraftTarget,
    pub title: String,
    pub content: String,
    pub origin: EditorOrigin,
}

impl EditorSession {
    pub(crate) fn for_new(category: Category, draft: Option<Draft>) -> Self {
        match draft {
            Some(draft) => Self::from_draft(category, DraftTarget::New, draft),
            None => Self {
                category,
                target: DraftTarget::New,
                title: String::new(),
                content: String::new(),
                origin: EditorOrigin::Blank,
            },
        }
    }

    pub(crate) fn for_post(category: Category, post: &Post, draft: Option<Draft>) -> Self {
        let target = DraftTarget::Post(post.id);
        match draft {
            Some(draft) => Self::from_draft(category, target, draft),
            None => Self {
                category,
                target,
                title: post.title.clone(),
                content: post.content.clone(),
                origin: EditorOrigin::Post,
            },
        }
    }

    fn from_draft(category: Category, target: DraftTarget, draft: Draft) -> Self {
        Self {
            category,
            target,
            title: draft.title,
            content: draft.content,
            origin: EditorOrigin::Draft {
                timestamp: draft.timestamp,
            },
        }
    }

    pub fn is_new(&self) -> bool {
        self.target == DraftTarget::New
    }

    pub fn restored_from_draft(&self) -> bool {
        matches!(self.origin, EditorOrigin::Draft { .. })
    }
}
