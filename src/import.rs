use std::collections::HashSet;

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

use crate::date_utils::parse_date_time;
use crate::frontmatter::{parse_document, validate_frontmatter, Frontmatter};
use crate::slug::{resolve_slug, slug_from_filename, slug_from_text, SlugResolution};
use crate::store::{NewPost, PostRecord, Store};

/// One file of an upload batch, as received from the HTTP layer.
pub struct UploadedFile {
    pub name: String,
    pub data: Vec<u8>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum ConflictType {
    /// The slug is taken by an already persisted post.
    #[serde(rename = "existing")]
    Existing,
    /// The slug collides with another file of the same upload batch.
    #[serde(rename = "batch")]
    InBatch,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportPreview {
    pub filename: String,
    pub frontmatter: Frontmatter,
    pub slug: String,
    pub conflict: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conflict_type: Option<ConflictType>,
    pub errors: Vec<String>,
    pub content: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreviewReport {
    pub total: usize,
    pub valid: usize,
    pub conflicting: usize,
    pub previews: Vec<ImportPreview>,
}

/// Record descriptor for the confirm phase, shaped like the preview output
/// the caller selected from.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ImportRecord {
    pub title: String,
    pub content: String,
    pub slug: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub excerpt: Option<String>,
    pub published: bool,
    pub featured: bool,
    pub date: Option<String>,
    pub overwrite_slug: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportOutcome {
    pub slug: String,
    pub title: String,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub post_id: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportReport {
    pub imported: usize,
    pub failed: usize,
    pub results: Vec<ImportOutcome>,
}

fn preview_error(filename: &str, message: String) -> ImportPreview {
    ImportPreview {
        filename: filename.to_string(),
        frontmatter: Frontmatter::untitled(),
        slug: String::new(),
        conflict: false,
        conflict_type: None,
        errors: vec![message],
        content: String::new(),
    }
}

/// Working slug of a previewed file: explicit frontmatter slug, else derived
/// from the title, else from the filename. Explicit values are re-normalized
/// through the same derivation rules, which is a no-op for valid slugs.
fn working_slug(fm: &Frontmatter, filename: &str) -> String {
    if let Some(ref explicit) = fm.slug {
        let explicit = slug_from_text(explicit);
        if !explicit.is_empty() {
            return explicit;
        }
    }

    let from_title = slug_from_text(&fm.title);
    if !from_title.is_empty() {
        return from_title;
    }

    slug_from_filename(filename)
}

/// Preview phase: pure and replayable, nothing is persisted. Previews come
/// back in input order; conflicts are checked against the persisted posts
/// and against slugs claimed by earlier files of this same pass, so two
/// uploads that would collide with each other are both visible up front.
pub fn preview_batch(store: &dyn Store, files: &[UploadedFile]) -> Result<PreviewReport> {
    let mut claimed: HashSet<String> = HashSet::new();
    let mut previews = Vec::with_capacity(files.len());

    for file in files {
        if !file.name.to_lowercase().ends_with(".md") {
            previews.push(preview_error(&file.name, "Only .md files can be imported".to_string()));
            continue;
        }

        let text = match std::str::from_utf8(&file.data) {
            Ok(text) => text,
            Err(_) => {
                previews.push(preview_error(&file.name, "File is not valid UTF-8".to_string()));
                continue;
            }
        };

        let doc = parse_document(text);
        let mut errors = validate_frontmatter(&doc.frontmatter).errors;

        let slug = working_slug(&doc.frontmatter, &file.name);
        let mut conflict_type = None;
        if slug.is_empty() {
            errors.push("Could not derive a slug for this file".to_string());
        } else {
            if store.find_post_by_slug(&slug)?.is_some() {
                conflict_type = Some(ConflictType::Existing);
            } else if claimed.contains(&slug) {
                conflict_type = Some(ConflictType::InBatch);
            }
            claimed.insert(slug.clone());
        }

        previews.push(ImportPreview {
            filename: file.name.clone(),
            frontmatter: doc.frontmatter,
            slug,
            conflict: conflict_type.is_some(),
            conflict_type,
            errors,
            content: doc.content,
        });
    }

    Ok(PreviewReport {
        total: previews.len(),
        valid: previews.iter().filter(|p| p.errors.is_empty()).count(),
        conflicting: previews.iter().filter(|p| p.conflict).count(),
        previews,
    })
}

fn base_slug(record: &ImportRecord) -> String {
    if let Some(ref explicit) = record.slug {
        let explicit = slug_from_text(explicit);
        if !explicit.is_empty() {
            return explicit;
        }
    }
    slug_from_text(&record.title)
}

fn import_record(store: &dyn Store, record: &ImportRecord, base: &str) -> Result<PostRecord> {
    if record.title.trim().is_empty() || record.content.trim().is_empty() {
        bail!("Title and content are required");
    }

    let resolution = resolve_slug(base, record.overwrite_slug, |candidate| {
        Ok(store.find_post_by_slug(candidate)?.is_some())
    })?;
    let slug = match resolution {
        SlugResolution::Free(slug) | SlugResolution::Renamed(slug) => slug,
        SlugResolution::Conflict(slug) => {
            bail!("A post with slug '{}' already exists", slug)
        }
    };

    let category_id = match record.category {
        Some(ref name) if !name.trim().is_empty() => {
            Some(store.find_or_create_category(name)?.id)
        }
        _ => None,
    };

    let mut tag_ids = Vec::with_capacity(record.tags.len());
    for tag in record.tags.iter().filter(|t| !t.trim().is_empty()) {
        tag_ids.push(store.find_or_create_tag(tag)?.id);
    }

    // A date that does not parse falls back to the store's own clock rather
    // than discarding the record
    let created_at = record
        .date
        .as_deref()
        .and_then(|date| parse_date_time(date).ok());

    store.create_post(NewPost {
        slug,
        title: record.title.clone(),
        content: record.content.clone(),
        excerpt: record.excerpt.clone(),
        published: record.published,
        featured: record.featured,
        created_at,
        category_id,
        tag_ids,
    })
}

/// Confirm phase. Records are processed one at a time, in order, each in its
/// own failure domain: a failed record is reported and skipped, never
/// aborting its siblings. Sequential processing is what lets record N's slug
/// resolution observe records 1..N-1 already persisted.
pub fn confirm_batch(store: &dyn Store, records: &[ImportRecord]) -> ImportReport {
    let mut results = Vec::with_capacity(records.len());

    for record in records {
        let base = base_slug(record);
        let outcome = match import_record(store, record, &base) {
            Ok(post) => ImportOutcome {
                slug: post.slug,
                title: post.title,
                success: true,
                error: None,
                post_id: Some(post.id.0),
            },
            Err(e) => ImportOutcome {
                slug: base,
                title: record.title.clone(),
                success: false,
                error: Some(e.to_string()),
                post_id: None,
            },
        };
        results.push(outcome);
    }

    let imported = results.iter().filter(|r| r.success).count();
    ImportReport {
        imported,
        failed: results.len() - imported,
        results,
    }
}
