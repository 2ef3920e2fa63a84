use std::collections::HashMap;
use std::sync::RwLock;

use anyhow::{anyhow, Result};
use chrono::Utc;
use uuid::Uuid;

use crate::slug::slug_from_text;
use crate::store::{
    CategoryId, CategoryRecord, NewPost, PostId, PostRecord, Store, TagId, TagRecord,
};

/// In-process store. Each map is keyed by the entity's unique slug; one
/// write lock per operation gives the per-operation atomicity the pipeline
/// relies on.
pub struct MemoryStore {
    inner: RwLock<Tables>,
}

#[derive(Default)]
struct Tables {
    posts: HashMap<String, PostRecord>,
    categories: HashMap<String, CategoryRecord>,
    tags: HashMap<String, TagRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            inner: RwLock::new(Tables::default()),
        }
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl Store for MemoryStore {
    fn find_post_by_slug(&self, slug: &str) -> Result<Option<PostRecord>> {
        let tables = self.inner.read().unwrap();
        Ok(tables.posts.get(slug).cloned())
    }

    fn list_posts(&self) -> Result<Vec<PostRecord>> {
        let tables = self.inner.read().unwrap();
        Ok(tables.posts.values().cloned().collect())
    }

    fn create_post(&self, new_post: NewPost) -> Result<PostRecord> {
        let mut tables = self.inner.write().unwrap();
        if tables.posts.contains_key(&new_post.slug) {
            return Err(anyhow!("A post with slug '{}' already exists", new_post.slug));
        }

        let record = PostRecord {
            id: PostId(Uuid::new_v4().to_string()),
            slug: new_post.slug.clone(),
            title: new_post.title,
            content: new_post.content,
            excerpt: new_post.excerpt,
            published: new_post.published,
            featured: new_post.featured,
            created_at: new_post.created_at.unwrap_or_else(|| Utc::now().naive_utc()),
            category_id: new_post.category_id,
            tag_ids: new_post.tag_ids,
        };

        tables.posts.insert(new_post.slug, record.clone());
        Ok(record)
    }

    fn find_or_create_category(&self, name: &str) -> Result<CategoryRecord> {
        let slug = slug_from_text(name);
        let mut tables = self.inner.write().unwrap();
        if let Some(existing) = tables.categories.get(&slug) {
            return Ok(existing.clone());
        }

        let record = CategoryRecord {
            id: CategoryId(Uuid::new_v4().to_string()),
            name: name.to_string(),
            slug: slug.clone(),
        };
        tables.categories.insert(slug, record.clone());
        Ok(record)
    }

    fn find_or_create_tag(&self, name: &str) -> Result<TagRecord> {
        let slug = slug_from_text(name);
        let mut tables = self.inner.write().unwrap();
        if let Some(existing) = tables.tags.get(&slug) {
            return Ok(existing.clone());
        }

        let record = TagRecord {
            id: TagId(Uuid::new_v4().to_string()),
            name: name.to_string(),
            slug: slug.clone(),
        };
        tables.tags.insert(slug, record.clone());
        Ok(record)
    }

    fn get_category(&self, id: &CategoryId) -> Result<Option<CategoryRecord>> {
        let tables = self.inner.read().unwrap();
        Ok(tables.categories.values().find(|c| &c.id == id).cloned())
    }

    fn get_tag(&self, id: &TagId) -> Result<Option<TagRecord>> {
        let tables = self.inner.read().unwrap();
        Ok(tables.tags.values().find(|t| &t.id == id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_post(slug: &str) -> NewPost {
        NewPost {
            slug: slug.to_string(),
            title: "A post".to_string(),
            content: "Body".to_string(),
            excerpt: None,
            published: true,
            featured: false,
            created_at: None,
            category_id: None,
            tag_ids: vec![],
        }
    }

    #[test]
    fn test_create_and_find_post() {
        let store = MemoryStore::new();
        let created = store.create_post(new_post("hello-world")).unwrap();

        let found = store.find_post_by_slug("hello-world").unwrap().unwrap();
        assert_eq!(found, created);
        assert!(store.find_post_by_slug("other").unwrap().is_none());
    }

    #[test]
    fn test_create_post_rejects_duplicate_slug() {
        let store = MemoryStore::new();
        store.create_post(new_post("hello-world")).unwrap();

        let err = store.create_post(new_post("hello-world")).unwrap_err();
        assert!(err.to_string().contains("hello-world"));
        assert_eq!(store.list_posts().unwrap().len(), 1);
    }

    #[test]
    fn test_create_post_with_overridden_date() {
        let store = MemoryStore::new();
        let mut post = new_post("dated");
        post.created_at = Some(crate::date_utils::parse_date_time("2023-06-01").unwrap());

        let created = store.create_post(post).unwrap();
        assert_eq!(crate::date_utils::format_date(&created.created_at), "2023-06-01");
    }

    #[test]
    fn test_find_or_create_category_reuses_by_name_slug() {
        let store = MemoryStore::new();
        let first = store.find_or_create_category("AI Technology").unwrap();
        let second = store.find_or_create_category("AI Technology").unwrap();

        assert_eq!(first, second);
        assert_eq!(first.slug, "ai-technology");
        assert_eq!(store.get_category(&first.id).unwrap().unwrap().name, "AI Technology");
    }

    #[test]
    fn test_find_or_create_tag() {
        let store = MemoryStore::new();
        let rust = store.find_or_create_tag("Rust").unwrap();
        let again = store.find_or_create_tag("Rust").unwrap();
        let other = store.find_or_create_tag("Web").unwrap();

        assert_eq!(rust.id, again.id);
        assert_ne!(rust.id, other.id);
        assert_eq!(store.get_tag(&other.id).unwrap().unwrap().slug, "web");
    }
}
