use std::fmt::Write;

use chrono::{NaiveDate, Utc};
use serde::Serialize;

/// Metadata block of a markdown document.
///
/// Example of an imported document:
/// ---
/// title: "Your Post Title"
/// date: "2024-01-15"
/// category: "AI Technology"
/// tags: ["AI", "Machine Learning"]
/// excerpt: "A brief description"
/// published: true
/// featured: false
/// slug: "custom-slug-optional"
/// ---
///
/// Body content...
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Frontmatter {
    pub title: String,
    pub date: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub published: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub featured: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
}

impl Frontmatter {
    /// Placeholder value used when a document carries no metadata block.
    /// Callers must treat the empty title as "needs a title".
    pub fn untitled() -> Self {
        Frontmatter {
            title: String::new(),
            date: Utc::now().date_naive().format("%Y-%m-%d").to_string(),
            category: None,
            tags: None,
            excerpt: None,
            published: None,
            featured: None,
            slug: None,
        }
    }
}

#[derive(Debug, PartialEq)]
pub struct ParsedDocument {
    pub frontmatter: Frontmatter,
    pub content: String,
}

/// Splits a document into its metadata block and body text and decodes the
/// block. A block is only recognized when the very first line is `---`;
/// anything else, including a block preceded by blank lines, is body text.
pub fn parse_document(raw: &str) -> ParsedDocument {
    match split_metadata_block(raw) {
        Some((block, body)) => ParsedDocument {
            frontmatter: parse_block(block),
            content: body.trim().to_string(),
        },
        None => ParsedDocument {
            frontmatter: Frontmatter::untitled(),
            content: raw.trim().to_string(),
        },
    }
}

fn split_metadata_block(raw: &str) -> Option<(&str, &str)> {
    let first_break = raw.find('\n')?;
    if raw[..first_break].trim_end_matches('\r') != "---" {
        return None;
    }

    let mut pos = first_break + 1;
    while pos <= raw.len() {
        let line_end = raw[pos..].find('\n').map(|i| pos + i).unwrap_or(raw.len());
        if raw[pos..line_end].trim_end_matches('\r') == "---" {
            let block = &raw[first_break + 1..pos];
            let body = if line_end < raw.len() { &raw[line_end + 1..] } else { "" };
            return Some((block, body));
        }
        if line_end == raw.len() {
            break;
        }
        pos = line_end + 1;
    }

    None
}

enum Scalar {
    Bool(bool),
    // Numbers keep their source text so string fields survive coercion intact
    Number(String),
    Text(String),
}

impl Scalar {
    fn into_text(self) -> String {
        match self {
            Scalar::Bool(b) => b.to_string(),
            Scalar::Number(s) => s,
            Scalar::Text(s) => s,
        }
    }
}

fn coerce_scalar(value: &str) -> Scalar {
    if value.eq_ignore_ascii_case("true") {
        return Scalar::Bool(true);
    }
    if value.eq_ignore_ascii_case("false") {
        return Scalar::Bool(false);
    }
    if !value.is_empty() && value.parse::<f64>().is_ok() {
        return Scalar::Number(value.to_string());
    }
    Scalar::Text(value.to_string())
}

/// Strips one level of `"…"` or `'…'` quoting. Double-quoted values also get
/// the serializer's escapes undone, keeping parse a left inverse of serialize.
fn unquote(value: &str) -> String {
    if value.len() >= 2 && value.starts_with('"') && value.ends_with('"') {
        let inner = &value[1..value.len() - 1];
        let mut out = String::with_capacity(inner.len());
        let mut chars = inner.chars();
        while let Some(c) = chars.next() {
            if c != '\\' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('n') => out.push('\n'),
                Some(escaped) => out.push(escaped),
                None => out.push('\\'),
            }
        }
        return out;
    }

    if value.len() >= 2 && value.starts_with('\'') && value.ends_with('\'') {
        return value[1..value.len() - 1].to_string();
    }

    value.to_string()
}

fn parse_inline_array(value: &str) -> Vec<String> {
    let inner = value[1..value.len() - 1].trim();
    if inner.is_empty() {
        return vec![];
    }
    inner.split(',').map(|item| unquote(item.trim())).collect()
}

/// Decodes the restricted YAML subset: scalar `key: value` pairs, inline
/// arrays `key: [a, b]` and indented `- item` lists after a bare `key:`.
/// Anything else is dropped, as are unrecognized keys.
fn parse_block(block: &str) -> Frontmatter {
    let mut fm = Frontmatter::untitled();
    let mut pending_list: Option<(String, Vec<String>)> = None;

    for line in block.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if let Some(item) = trimmed.strip_prefix("- ") {
            if let Some((_, ref mut items)) = pending_list {
                items.push(unquote(item.trim()));
            }
            continue;
        }

        if let Some((key, items)) = pending_list.take() {
            assign_list(&mut fm, &key, items);
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };
        let (key, value) = (key.trim(), value.trim());

        if value.is_empty() {
            pending_list = Some((key.to_string(), vec![]));
        } else if value.starts_with('[') && value.ends_with(']') {
            assign_list(&mut fm, key, parse_inline_array(value));
        } else {
            assign_scalar(&mut fm, key, coerce_scalar(&unquote(value)));
        }
    }

    if let Some((key, items)) = pending_list.take() {
        assign_list(&mut fm, &key, items);
    }

    fm
}

fn assign_scalar(fm: &mut Frontmatter, key: &str, value: Scalar) {
    match key {
        "title" => fm.title = value.into_text(),
        "date" => fm.date = value.into_text(),
        "category" => fm.category = Some(value.into_text()),
        "excerpt" => fm.excerpt = Some(value.into_text()),
        "slug" => fm.slug = Some(value.into_text()),
        "published" => {
            if let Scalar::Bool(b) = value {
                fm.published = Some(b);
            }
        }
        "featured" => {
            if let Scalar::Bool(b) = value {
                fm.featured = Some(b);
            }
        }
        _ => {}
    }
}

fn assign_list(fm: &mut Frontmatter, key: &str, items: Vec<String>) {
    if key == "tags" {
        fm.tags = Some(items);
    }
}

/// Post-shaped input for [`serialize_frontmatter`].
pub struct FrontmatterSource<'a> {
    pub title: &'a str,
    pub created_at: NaiveDate,
    pub category: Option<&'a str>,
    pub tags: &'a [String],
    pub excerpt: Option<&'a str>,
    pub published: bool,
    pub featured: bool,
    pub slug: &'a str,
}

fn quoted(value: &str) -> String {
    let escaped = value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n");
    format!("\"{}\"", escaped)
}

/// Renders the metadata block in its fixed field order. `published` and
/// `featured` are always written; `category`, `tags` and `excerpt` only when
/// present. Parsing the output reproduces every field written here.
pub fn serialize_frontmatter(source: &FrontmatterSource) -> String {
    let mut buf = String::new();

    let _ = writeln!(&mut buf, "---");
    let _ = writeln!(&mut buf, "title: {}", quoted(source.title));
    let _ = writeln!(&mut buf, "date: {}", quoted(&source.created_at.format("%Y-%m-%d").to_string()));
    if let Some(category) = source.category {
        let _ = writeln!(&mut buf, "category: {}", quoted(category));
    }
    if !source.tags.is_empty() {
        let items: Vec<String> = source.tags.iter().map(|tag| quoted(tag)).collect();
        let _ = writeln!(&mut buf, "tags: [{}]", items.join(", "));
    }
    if let Some(excerpt) = source.excerpt {
        let _ = writeln!(&mut buf, "excerpt: {}", quoted(excerpt));
    }
    let _ = writeln!(&mut buf, "published: {}", source.published);
    let _ = writeln!(&mut buf, "featured: {}", source.featured);
    let _ = writeln!(&mut buf, "slug: {}", quoted(source.slug));
    let _ = writeln!(&mut buf, "---");

    buf
}

pub const TITLE_MAX_CHARS: usize = 200;
pub const EXCERPT_MAX_CHARS: usize = 500;

#[derive(Debug, PartialEq)]
pub struct Validation {
    pub is_valid: bool,
    pub errors: Vec<String>,
}

/// Reports every validation problem at once. Never fails.
pub fn validate_frontmatter(fm: &Frontmatter) -> Validation {
    let mut errors = vec![];

    if fm.title.trim().is_empty() {
        errors.push("Title is required".to_string());
    } else if fm.title.chars().count() > TITLE_MAX_CHARS {
        errors.push(format!("Title must be {} characters or less", TITLE_MAX_CHARS));
    }

    if let Some(ref excerpt) = fm.excerpt {
        if excerpt.chars().count() > EXCERPT_MAX_CHARS {
            errors.push(format!("Excerpt must be {} characters or less", EXCERPT_MAX_CHARS));
        }
    }

    Validation {
        is_valid: errors.is_empty(),
        errors,
    }
}

#[cfg(test)]
mod tests {
    use crate::test_data::{FULL_DOC, NO_FRONTMATTER_DOC};

    use super::*;

    #[test]
    fn test_parse_full_document() {
        let doc = parse_document(FULL_DOC);
        let fm = &doc.frontmatter;

        assert_eq!(fm.title, "Your Post Title");
        assert_eq!(fm.date, "2024-01-15");
        assert_eq!(fm.category.as_deref(), Some("AI Technology"));
        assert_eq!(fm.tags, Some(vec!["AI".to_string(), "Machine Learning".to_string()]));
        assert_eq!(fm.excerpt.as_deref(), Some("A brief description"));
        assert_eq!(fm.published, Some(true));
        assert_eq!(fm.featured, Some(false));
        assert_eq!(fm.slug.as_deref(), Some("custom-slug-optional"));
        assert_eq!(doc.content, "Body content...");
    }

    #[test]
    fn test_parse_without_block_falls_back() {
        let doc = parse_document(NO_FRONTMATTER_DOC);

        assert_eq!(doc.frontmatter.title, "");
        assert_eq!(doc.frontmatter.published, None);
        assert_eq!(doc.content, NO_FRONTMATTER_DOC.trim());
    }

    #[test]
    fn test_block_must_start_on_first_line() {
        let raw = "\n---\ntitle: \"Late\"\n---\nBody";
        let doc = parse_document(raw);
        assert_eq!(doc.frontmatter.title, "");
        assert_eq!(doc.content, raw.trim());
    }

    #[test]
    fn test_unterminated_block_is_body_text() {
        let raw = "---\ntitle: \"Half open\"\nBody without closing delimiter";
        let doc = parse_document(raw);
        assert_eq!(doc.frontmatter.title, "");
        assert_eq!(doc.content, raw.trim());
    }

    #[test]
    fn test_parse_multiline_tags() {
        let raw = "---\ntitle: 'Lists'\ntags:\n  - \"AI\"\n  - ML\n---\nBody";
        let doc = parse_document(raw);
        assert_eq!(doc.frontmatter.tags, Some(vec!["AI".to_string(), "ML".to_string()]));
    }

    #[test]
    fn test_parse_inline_tags_preserves_order() {
        let raw = "---\ntitle: t\ntags: [\"AI\", \"ML\"]\n---\n";
        let doc = parse_document(raw);
        assert_eq!(doc.frontmatter.tags, Some(vec!["AI".to_string(), "ML".to_string()]));
    }

    #[test]
    fn test_scalar_coercion() {
        let raw = "---\ntitle: Plain title\npublished: TRUE\nfeatured: false\ndate: 2024-01-15\n---\n";
        let doc = parse_document(raw);
        assert_eq!(doc.frontmatter.title, "Plain title");
        assert_eq!(doc.frontmatter.published, Some(true));
        assert_eq!(doc.frontmatter.featured, Some(false));
        assert_eq!(doc.frontmatter.date, "2024-01-15");
    }

    #[test]
    fn test_unrecognized_keys_are_dropped() {
        let raw = "---\ntitle: t\nauthor: someone\nlayout: wide\n---\nBody";
        let doc = parse_document(raw);
        assert_eq!(doc.frontmatter.title, "t");
        assert_eq!(doc.content, "Body");
    }

    #[test]
    fn test_serialize_field_order_and_omissions() {
        let source = FrontmatterSource {
            title: "Minimal",
            created_at: NaiveDate::from_ymd_opt(2024, 3, 9).unwrap(),
            category: None,
            tags: &[],
            excerpt: None,
            published: false,
            featured: false,
            slug: "minimal",
        };

        let block = serialize_frontmatter(&source);
        assert_eq!(
            block,
            "---\ntitle: \"Minimal\"\ndate: \"2024-03-09\"\npublished: false\nfeatured: false\nslug: \"minimal\"\n---\n"
        );
    }

    #[test]
    fn test_serialize_then_parse_round_trip() {
        let tags = vec!["AI".to_string(), "Machine Learning".to_string()];
        let source = FrontmatterSource {
            title: "A title with \"quotes\" and \\ slashes",
            created_at: NaiveDate::from_ymd_opt(2024, 1, 15).unwrap(),
            category: Some("AI Technology"),
            tags: &tags,
            excerpt: Some("Line one\nline two"),
            published: true,
            featured: false,
            slug: "a-title",
        };

        let document = format!("{}\nBody content...", serialize_frontmatter(&source));
        let doc = parse_document(&document);
        let fm = doc.frontmatter;

        assert_eq!(fm.title, source.title);
        assert_eq!(fm.date, "2024-01-15");
        assert_eq!(fm.category.as_deref(), source.category);
        assert_eq!(fm.tags.as_deref(), Some(tags.as_slice()));
        assert_eq!(fm.excerpt.as_deref(), source.excerpt);
        assert_eq!(fm.published, Some(true));
        assert_eq!(fm.featured, Some(false));
        assert_eq!(fm.slug.as_deref(), Some(source.slug));
        assert_eq!(doc.content, "Body content...");
    }

    #[test]
    fn test_validate_reports_all_errors() {
        let mut fm = Frontmatter::untitled();
        fm.excerpt = Some("x".repeat(EXCERPT_MAX_CHARS + 1));

        let validation = validate_frontmatter(&fm);
        assert!(!validation.is_valid);
        assert_eq!(
            validation.errors,
            vec![
                "Title is required".to_string(),
                "Excerpt must be 500 characters or less".to_string(),
            ]
        );
    }

    #[test]
    fn test_validate_title_length() {
        let mut fm = Frontmatter::untitled();
        fm.title = "x".repeat(TITLE_MAX_CHARS + 1);

        let validation = validate_frontmatter(&fm);
        assert_eq!(validation.errors, vec!["Title must be 200 characters or less".to_string()]);

        fm.title = "x".repeat(TITLE_MAX_CHARS);
        assert!(validate_frontmatter(&fm).is_valid);
    }
}
