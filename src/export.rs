use anyhow::Result;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::frontmatter::{serialize_frontmatter, FrontmatterSource};
use crate::store::{PostRecord, Store};

/// Renders a stored post back into the import document format: serialized
/// metadata block, blank line, body.
pub fn render_post_document(post: &PostRecord, category: Option<&str>, tags: &[String]) -> String {
    let source = FrontmatterSource {
        title: &post.title,
        created_at: post.created_at.date(),
        category,
        tags,
        excerpt: post.excerpt.as_deref(),
        published: post.published,
        featured: post.featured,
        slug: &post.slug,
    };

    let mut document = serialize_frontmatter(&source);
    document.push('\n');
    document.push_str(&post.content);
    if !document.ends_with('\n') {
        document.push('\n');
    }
    document
}

pub(crate) fn expand_names(store: &dyn Store, post: &PostRecord) -> Result<(Option<String>, Vec<String>)> {
    let category = match post.category_id {
        Some(ref id) => store.get_category(id)?.map(|c| c.name),
        None => None,
    };

    let mut tags = Vec::with_capacity(post.tag_ids.len());
    for id in &post.tag_ids {
        if let Some(tag) = store.get_tag(id)? {
            tags.push(tag.name);
        }
    }

    Ok((category, tags))
}

/// Single-post export. `None` when the slug is unknown.
pub fn export_post(store: &dyn Store, slug: &str) -> Result<Option<String>> {
    let Some(post) = store.find_post_by_slug(slug)? else {
        return Ok(None);
    };

    let (category, tags) = expand_names(store, &post)?;
    Ok(Some(render_post_document(&post, category.as_deref(), &tags)))
}

/// Bulk export: every stored post rendered as `<slug>.md` and packed into a
/// gzipped tar archive, newest post first.
pub fn export_archive(store: &dyn Store) -> Result<Vec<u8>> {
    let mut posts = store.list_posts()?;
    posts.sort_by(|a, b| b.created_at.cmp(&a.created_at));

    let enc = GzEncoder::new(Vec::new(), Compression::default());
    let mut archive = tar::Builder::new(enc);

    for post in &posts {
        let (category, tags) = expand_names(store, post)?;
        let document = render_post_document(post, category.as_deref(), &tags);
        let data = document.as_bytes();

        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_mtime(post.created_at.and_utc().timestamp() as u64);
        archive.append_data(&mut header, format!("{}.md", post.slug), data)?;
    }

    let enc = archive.into_inner()?;
    Ok(enc.finish()?)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::GzDecoder;

    use crate::frontmatter::parse_document;
    use crate::import::{confirm_batch, ImportRecord};
    use crate::store::memory::MemoryStore;

    use super::*;

    fn seeded_store() -> MemoryStore {
        let store = MemoryStore::new();
        let record = ImportRecord {
            title: "Hello World".to_string(),
            content: "Body content...".to_string(),
            category: Some("AI Technology".to_string()),
            tags: vec!["AI".to_string(), "ML".to_string()],
            excerpt: Some("A brief description".to_string()),
            published: true,
            date: Some("2024-01-15".to_string()),
            ..Default::default()
        };
        let report = confirm_batch(&store, &[record]);
        assert_eq!(report.imported, 1);
        store
    }

    #[test]
    fn test_export_post_round_trips() {
        let store = seeded_store();
        let document = export_post(&store, "hello-world").unwrap().unwrap();

        let doc = parse_document(&document);
        assert_eq!(doc.frontmatter.title, "Hello World");
        assert_eq!(doc.frontmatter.date, "2024-01-15");
        assert_eq!(doc.frontmatter.category.as_deref(), Some("AI Technology"));
        assert_eq!(doc.frontmatter.tags, Some(vec!["AI".to_string(), "ML".to_string()]));
        assert_eq!(doc.frontmatter.published, Some(true));
        assert_eq!(doc.frontmatter.featured, Some(false));
        assert_eq!(doc.frontmatter.slug.as_deref(), Some("hello-world"));
        assert_eq!(doc.content, "Body content...");
    }

    #[test]
    fn test_export_unknown_slug() {
        let store = MemoryStore::new();
        assert!(export_post(&store, "missing").unwrap().is_none());
    }

    #[test]
    fn test_export_archive_contains_all_posts() {
        let store = seeded_store();
        confirm_batch(
            &store,
            &[ImportRecord {
                title: "Second Post".to_string(),
                content: "More".to_string(),
                ..Default::default()
            }],
        );

        let archive = export_archive(&store).unwrap();

        let mut tar_bytes = Vec::new();
        GzDecoder::new(archive.as_slice()).read_to_end(&mut tar_bytes).unwrap();
        let mut entries = tar::Archive::new(tar_bytes.as_slice());

        let names: Vec<String> = entries
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().to_string_lossy().into_owned())
            .collect();

        assert_eq!(names.len(), 2);
        assert!(names.contains(&"hello-world.md".to_string()));
        assert!(names.contains(&"second-post.md".to_string()));
    }
}
