use anyhow::Result;
use chrono::NaiveDateTime;
use serde::Serialize;

pub mod memory;

#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize)]
pub struct PostId(pub String);

#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize)]
pub struct CategoryId(pub String);

#[derive(Debug, Clone, Eq, Hash, PartialEq, Serialize)]
pub struct TagId(pub String);

#[derive(Debug, Clone, PartialEq)]
pub struct PostRecord {
    pub id: PostId,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub created_at: NaiveDateTime,
    pub category_id: Option<CategoryId>,
    pub tag_ids: Vec<TagId>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryRecord {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TagRecord {
    pub id: TagId,
    pub name: String,
    pub slug: String,
}

/// Payload for [`Store::create_post`]. The store assigns the id, and uses
/// `created_at` only when the caller overrides the creation timestamp.
#[derive(Debug, Clone)]
pub struct NewPost {
    pub slug: String,
    pub title: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub created_at: Option<NaiveDateTime>,
    pub category_id: Option<CategoryId>,
    pub tag_ids: Vec<TagId>,
}

/// Persistence collaborator of the import/export pipeline. One process-wide
/// handle, injected where needed. Every operation is individually atomic;
/// there is no batch transaction.
pub trait Store: Send + Sync {
    fn find_post_by_slug(&self, slug: &str) -> Result<Option<PostRecord>>;

    /// All posts, in no particular order.
    fn list_posts(&self) -> Result<Vec<PostRecord>>;

    /// Fails when the slug is already taken, like a unique-key constraint.
    fn create_post(&self, new_post: NewPost) -> Result<PostRecord>;

    /// Looks a category up by the slug of its name, creating it if absent.
    fn find_or_create_category(&self, name: &str) -> Result<CategoryRecord>;

    /// Looks a tag up by the slug of its name, creating it if absent.
    fn find_or_create_tag(&self, name: &str) -> Result<TagRecord>;

    fn get_category(&self, id: &CategoryId) -> Result<Option<CategoryRecord>>;

    fn get_tag(&self, id: &TagId) -> Result<Option<TagRecord>>;
}
