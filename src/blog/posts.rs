use anyhow::Context;

use super::drafts::DraftManager;
use super::model::{today, Category, CategoryMap, DraftTarget, Post, POSTS_KEY};
use super::session::SessionState;
use super::{BlogError, Outcome, Result};
use crate::storage::KeyValueStore;

/// In-memory category map, written through to the store on every mutation.
///
/// Each mutation builds the new map first and only adopts it once the store
/// accepted it, so the persisted map and `posts()` never disagree.
pub struct PostRepository<S> {
    store: S,
    drafts: DraftManager<S>,
    posts: CategoryMap,
}

impl<S: KeyValueStore + Clone> PostRepository<S> {
    /// Reads the stored map, seeding and persisting the defaults on first run.
    pub fn load(store: S) -> Result<Self> {
        let drafts = DraftManager::new(store.clone());
        let posts = match store.get(POSTS_KEY)? {
            Some(raw) => {
                let mut posts: CategoryMap =
                    serde_json::from_str(&raw).map_err(|source| BlogError::Corrupt {
                        key: POSTS_KEY.to_string(),
                        source,
                    })?;
                posts.fill_missing();
                posts
            }
            None => {
                tracing::info!("seeding first-run posts");
                let seeded = CategoryMap::seeded();
                write_map(&store, &seeded)?;
                seeded
            }
        };
        tracing::debug!(total = posts.total(), "posts loaded");
        Ok(Self {
            store,
            drafts,
            posts,
        })
    }

    pub fn posts(&self) -> &CategoryMap {
        &self.posts
    }

    pub fn category(&self, category: Category) -> &[Post] {
        self.posts.posts(category)
    }

    pub fn get(&self, category: Category, id: u64) -> Option<&Post> {
        self.category(category).iter().find(|post| post.id == id)
    }

    pub fn add(
        &mut self,
        session: &SessionState<S>,
        category: Category,
        title: &str,
        content: &str,
    ) -> Result<Outcome<Post>> {
        if !session.is_admin() {
            return Ok(Outcome::Denied);
        }
        let (title, content) = validate(title, content)?;
        let post = Post {
            id: self.posts.next_id(category),
            title,
            content,
            date: today(),
        };
        let mut next = self.posts.clone();
        next.posts_mut(category).insert(0, post.clone());
        self.commit(next)?;
        self.drafts.clear(category, DraftTarget::New)?;
        tracing::info!(%category, id = post.id, "post created");
        Ok(Outcome::Applied(post))
    }

    /// Replaces title and content; the original date is kept.
    pub fn update(
        &mut self,
        session: &SessionState<S>,
        category: Category,
        id: u64,
        title: &str,
        content: &str,
    ) -> Result<Outcome<Post>> {
        if !session.is_admin() {
            return Ok(Outcome::Denied);
        }
        let (title, content) = validate(title, content)?;
        let mut next = self.posts.clone();
        let Some(post) = next.posts_mut(category).iter_mut().find(|p| p.id == id) else {
            return Ok(Outcome::NotFound);
        };
        post.title = title;
        post.content = content;
        let updated = post.clone();
        self.commit(next)?;
        self.drafts.clear(category, DraftTarget::Post(id))?;
        tracing::info!(%category, id, "post updated");
        Ok(Outcome::Applied(updated))
    }

    pub fn remove(
        &mut self,
        session: &SessionState<S>,
        category: Category,
        id: u64,
    ) -> Result<Outcome<Post>> {
        if !session.is_admin() {
            return Ok(Outcome::Denied);
        }
        let mut next = self.posts.clone();
        let list = next.posts_mut(category);
        let Some(index) = list.iter().position(|p| p.id == id) else {
            return Ok(Outcome::NotFound);
        };
        let removed = list.remove(index);
        self.commit(next)?;
        self.drafts.clear(category, DraftTarget::Post(id))?;
        tracing::info!(%category, id, "post deleted");
        Ok(Outcome::Applied(removed))
    }

    /// Empties one category and drops all of its drafts. Returns the number
    /// of posts removed.
    pub fn remove_all(
        &mut self,
        session: &SessionState<S>,
        category: Category,
    ) -> Result<Outcome<usize>> {
        if !session.is_admin() {
            return Ok(Outcome::Denied);
        }
        let count = self.category(category).len();
        if count == 0 {
            return Ok(Outcome::Empty);
        }
        let mut next = self.posts.clone();
        next.posts_mut(category).clear();
        self.commit(next)?;
        let drafts = self.drafts.clear_category(category)?;
        tracing::info!(%category, posts = count, drafts, "category emptied");
        Ok(Outcome::Applied(count))
    }

    /// Re-writes the current map as is.
    pub fn persist(&self) -> Result<()> {
        write_map(&self.store, &self.posts)
    }

    fn commit(&mut self, next: CategoryMap) -> Result<()> {
        write_map(&self.store, &next)?;
        self.posts = next;
        Ok(())
    }
}

fn write_map<S: KeyValueStore>(store: &S, posts: &CategoryMap) -> Result<()> {
    let json = serde_json::to_string(posts).context("serialising posts")?;
    store.set(POSTS_KEY, &json)?;
    Ok(())
}

fn validate(title: &str, content: &str) -> Result<(String, String)> {
    let title = title.trim();
    let content = content.trim();
    if title.is_empty() || content.is_empty() {
        return Err(BlogError::Validation(
            "title and content cannot be empty".to_string(),
        ));
    }
    Ok((title.to_string(), content.to_string()))
}
