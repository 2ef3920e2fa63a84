use anyhow::Result;
use lazy_static::lazy_static;
use regex::Regex;

/// Turns free text into a URL-path-safe identifier. Non-ASCII input is
/// transliterated before normalization, so `ábaco` and `abaco` end up equal.
pub fn slug_from_text(text: &str) -> String {
    lazy_static! {
        static ref DISALLOWED: Regex = Regex::new(r"[^\w\s-]").unwrap();
        static ref SEPARATOR_RUN: Regex = Regex::new(r"[\s_]+").unwrap();
    }

    let text = unidecode::unidecode(text).to_lowercase();
    let text = DISALLOWED.replace_all(&text, "");
    let text = SEPARATOR_RUN.replace_all(&text, "-");
    text.trim_matches('-').to_string()
}

/// Same normalization as [`slug_from_text`], after dropping a trailing `.md`
/// extension. Both derivations must stay textually identical so a slug built
/// from a title and one built from an equivalent filename compare equal.
pub fn slug_from_filename(file_name: &str) -> String {
    let stem = match file_name.char_indices().rev().nth(2) {
        Some((idx, _)) if file_name[idx..].eq_ignore_ascii_case(".md") => &file_name[..idx],
        _ => file_name,
    };
    slug_from_text(stem)
}

#[derive(Debug, PartialEq)]
pub enum SlugResolution {
    /// The candidate was free and can be used as-is.
    Free(String),
    /// The candidate was occupied; a numbered variant was picked instead.
    Renamed(String),
    /// The candidate was occupied and renaming was not allowed.
    Conflict(String),
}

impl SlugResolution {
    pub fn slug(&self) -> &str {
        match self {
            SlugResolution::Free(s) => s,
            SlugResolution::Renamed(s) => s,
            SlugResolution::Conflict(s) => s,
        }
    }
}

/// Resolves `candidate` against whatever `taken` reports as occupied. The
/// closure is consulted again for every numbered attempt, so a caller that
/// tracks slugs claimed earlier in the same batch keeps two same-base records
/// from ever receiving the same variant.
pub fn resolve_slug<F>(candidate: &str, auto_rename: bool, mut taken: F) -> Result<SlugResolution>
where
    F: FnMut(&str) -> Result<bool>,
{
    if !taken(candidate)? {
        return Ok(SlugResolution::Free(candidate.to_string()));
    }

    if !auto_rename {
        return Ok(SlugResolution::Conflict(candidate.to_string()));
    }

    let mut suffix = 1u32;
    loop {
        let attempt = format!("{}-{}", candidate, suffix);
        if !taken(&attempt)? {
            return Ok(SlugResolution::Renamed(attempt));
        }
        suffix += 1;
    }
}
