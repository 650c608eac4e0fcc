use std::fmt;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum::{Display, EnumIter, EnumString, IntoEnumIterator};
use time::{Date, OffsetDateTime};

pub const POSTS_KEY: &str = "personal_blog_posts";
pub const ADMIN_KEY: &str = "personal_blog_admin";
pub const DRAFT_PREFIX: &str = "draft_";

#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    PartialOrd,
    Ord,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    EnumIter,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum Category {
    Musings,
    Observations,
    Thoughts,
}

impl Category {
    pub fn all() -> impl Iterator<Item = Category> {
        Category::iter()
    }

    pub fn label(self) -> &'static str {
        match self {
            Category::Musings => "Musings",
            Category::Observations => "Observations",
            Category::Thoughts => "Thoughts",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    pub id: u64,
    pub title: String,
    pub content: String,
    /// Host-local creation date, `YYYY-MM-DD`.
    pub date: String,
}

/// Category → posts, newest first. Key order follows the stored JSON so a
/// load/persist cycle writes the same bytes back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryMap(IndexMap<Category, Vec<Post>>);

impl CategoryMap {
    pub fn empty() -> Self {
        Self(Category::all().map(|category| (category, Vec::new())).collect())
    }

    pub fn seeded() -> Self {
        let mut map = Self::empty();
        for (category, id, title, content, date) in SEED_POSTS {
            map.posts_mut(*category).push(Post {
                id: *id,
                title: (*title).to_string(),
                content: (*content).to_string(),
                date: (*date).to_string(),
            });
        }
        map
    }

    /// Adds empty lists for categories missing from a stored map.
    pub(crate) fn fill_missing(&mut self) {
        for category in Category::all() {
            self.0.entry(category).or_default();
        }
    }

    pub fn posts(&self, category: Category) -> &[Post] {
        self.0.get(&category).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn posts_mut(&mut self, category: Category) -> &mut Vec<Post> {
        self.0.entry(category).or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Category, &[Post])> {
        self.0.iter().map(|(category, posts)| (*category, posts.as_slice()))
    }

    pub fn total(&self) -> usize {
        self.0.values().map(Vec::len).sum()
    }

    pub fn next_id(&self, category: Category) -> u64 {
        self.posts(category)
            .iter()
            .map(|post| post.id)
            .max()
            .unwrap_or(0)
            + 1
    }
}

/// Which post a draft belongs to. New-post drafts share one slot per
/// category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DraftTarget {
    New,
    Post(u64),
}

impl DraftTarget {
    pub fn from_post_id(post_id: Option<u64>) -> Self {
        post_id.map_or(DraftTarget::New, DraftTarget::Post)
    }

    pub fn post_id(self) -> Option<u64> {
        match self {
            DraftTarget::New => None,
            DraftTarget::Post(id) => Some(id),
        }
    }

    /// Value of the record's `postId` field: empty for new posts.
    fn post_id_field(self) -> String {
        self.post_id().map(|id| id.to_string()).unwrap_or_default()
    }
}

impl fmt::Display for DraftTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DraftTarget::New => f.write_str("new"),
            DraftTarget::Post(id) => write!(f, "{id}"),
        }
    }
}

pub fn draft_key(category: Category, target: DraftTarget) -> String {
    format!("{DRAFT_PREFIX}{category}_{target}")
}

pub fn category_draft_prefix(category: Category) -> String {
    format!("{DRAFT_PREFIX}{category}_")
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub content: String,
    pub category: Category,
    #[serde(default)]
    pub post_id: String,
    /// Epoch milliseconds of the last stage.
    #[serde(default)]
    pub timestamp: i64,
}

impl Draft {
    pub fn new(category: Category, target: DraftTarget, title: &str, content: &str) -> Self {
        Self {
            title: title.to_string(),
            content: content.to_string(),
            category,
            post_id: target.post_id_field(),
            timestamp: now_millis(),
        }
    }

    pub fn target(&self) -> DraftTarget {
        DraftTarget::from_post_id(self.post_id.trim().parse().ok())
    }

    pub fn staged_at(&self) -> Option<OffsetDateTime> {
        OffsetDateTime::from_unix_timestamp_nanos(self.timestamp as i128 * 1_000_000).ok()
    }
}

pub fn now_millis() -> i64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

pub fn today() -> String {
    let now = OffsetDateTime::now_local().unwrap_or_else(|_| OffsetDateTime::now_utc());
    format_date(now.date())
}

pub fn format_date(date: Date) -> String {
    format!(
        "{:04}-{:02}-{:02}",
        date.year(),
        u8::from(date.month()),
        date.day()
    )
}

const SEED_POSTS: &[(Category, u64, &str, &str, &str)] = &[
    (
        Category::Musings,
        1,
        "关于慢生活的思考",
        "在这个快节奏的世界里，我越来越觉得慢下来是一种奢侈。今天早上泡茶的时候，看着茶叶在水中慢慢舒展，突然意识到生活的美好往往藏在这些被我们忽略的细节中。",
        "2024-03-20",
    ),
    (
        Category::Musings,
        2,
        "平凡中的不平凡",
        "昨天路过小区花园，看到一位老爷爷在认真地修剪花草。他专注的神情让我想到，也许真正的幸福就是能在平凡的事情中找到意义和乐趣。",
        "2024-03-18",
    ),
    (
        Category::Observations,
        3,
        "数字化时代的孤独",
        "地铁上每个人都在看手机，明明距离很近却彼此陌生。我们比以往任何时候都更容易联系，却也更容易感到孤独。这种矛盾现象值得我们深思。",
        "2024-03-19",
    ),
    (
        Category::Observations,
        4,
        "城市中的自然力量",
        "今天看到墙缝里长出的小草，顽强地向阳光伸展。大自然的生命力总是让我惊叹，即使在最恶劣的环境中，生命也能找到出路。",
        "2024-03-17",
    ),
    (
        Category::Thoughts,
        5,
        "重新定义成功",
        "成功不应该只用金钱和地位来衡量。真正的成功可能是内心的平静，是与他人建立真诚的连接，是为这个世界带来一点点正面的改变。",
        "2024-03-21",
    ),
    (
        Category::Thoughts,
        6,
        "提问的艺术",
        "好的问题比标准答案更有价值。它们开启对话，激发思考，让我们看到新的可能性。学会提出好问题，也许是我们需要培养的最重要的能力之一。",
        "2024-03-16",
    ),
];
