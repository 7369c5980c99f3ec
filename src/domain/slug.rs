//! Group slug handling.
//!
//! Slugs are the public identifiers of communities (`/group/<slug>/`). They
//! are either supplied by an operator and validated here, or derived from the
//! group title through the `slug` crate.

use slug::slugify;
use thiserror::Error;

pub const MAX_SLUG_LEN: usize = 50;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("slug `{slug}` may only contain letters, digits, `-` and `_`")]
    InvalidCharacters { slug: String },
    #[error("slug exceeds {MAX_SLUG_LEN} characters")]
    TooLong,
}

/// Derive a slug from human-readable text such as a group title.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }

    Ok(truncate(candidate))
}

/// Check an operator-supplied slug and return it trimmed.
pub fn validate_slug(input: &str) -> Result<String, SlugError> {
    let slug = input.trim();
    if slug.is_empty() {
        return Err(SlugError::EmptyInput);
    }
    if slug.chars().count() > MAX_SLUG_LEN {
        return Err(SlugError::TooLong);
    }
    if !slug
        .chars()
        .all(|ch| ch.is_alphanumeric() || ch == '-' || ch == '_')
    {
        return Err(SlugError::InvalidCharacters {
            slug: slug.to_string(),
        });
    }

    Ok(slug.to_string())
}

fn truncate(slug: String) -> String {
    if slug.chars().count() <= MAX_SLUG_LEN {
        return slug;
    }
    slug.chars()
        .take(MAX_SLUG_LEN)
        .collect::<String>()
        .trim_end_matches('-')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn derive_slug_from_title() {
        let slug = derive_slug("Rust Weekly Notes").expect("slug");
        assert_eq!(slug, "rust-weekly-notes");
    }

    #[test]
    fn derive_slug_rejects_blank_input() {
        assert_eq!(derive_slug("   "), Err(SlugError::EmptyInput));
    }

    #[test]
    fn derive_slug_caps_length() {
        let title = "word ".repeat(40);
        let slug = derive_slug(&title).expect("slug");
        assert!(slug.chars().count() <= MAX_SLUG_LEN);
        assert!(!slug.ends_with('-'));
    }

    #[test]
    fn validate_slug_accepts_dashes_and_underscores() {
        assert_eq!(validate_slug(" test-slug_1 ").as_deref(), Ok("test-slug_1"));
    }

    #[test]
    fn validate_slug_rejects_spaces_and_slashes() {
        assert!(matches!(
            validate_slug("bad slug"),
            Err(SlugError::InvalidCharacters { .. })
        ));
        assert!(matches!(
            validate_slug("a/b"),
            Err(SlugError::InvalidCharacters { .. })
        ));
    }
}
