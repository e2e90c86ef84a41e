//! Norm list filtering and content excerpts.
//!
//! # Invariants
//! - Matching is case-insensitive over title, description and tags.
//! - A blank query matches every norm.
//! - Excerpts never exceed `EXCERPT_MAX_CHARS` characters (plus ellipsis).

use crate::model::norm::Norm;
use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum excerpt length in characters.
pub const EXCERPT_MAX_CHARS: usize = 160;

static MARKDOWN_LINK_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\]]+)\]\(([^)]+)\)").expect("valid link regex"));
static MARKDOWN_HEADING_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^\s{0,3}#{1,6}\s+").expect("valid heading regex"));
static MARKDOWN_SYMBOL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"[\*_`>~]+"#).expect("valid markdown symbol regex"));
static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Whether `norm` matches the free-text `query`.
pub fn matches_query(norm: &Norm, query: &str) -> bool {
    let needle = query.trim().to_lowercase();
    if needle.is_empty() {
        return true;
    }

    norm.title.to_lowercase().contains(&needle)
        || norm.description.to_lowercase().contains(&needle)
        || norm.tags.iter().any(|tag| tag.to_lowercase().contains(&needle))
}

/// Plain-text excerpt of markdown content.
///
/// Headings markers, emphasis symbols and link targets are stripped and
/// whitespace collapsed. Returns `None` for content with no text.
pub fn derive_excerpt(content: &str) -> Option<String> {
    let without_links = MARKDOWN_LINK_RE.replace_all(content, "$1");
    let without_headings = MARKDOWN_HEADING_RE.replace_all(&without_links, "");
    let without_symbols = MARKDOWN_SYMBOL_RE.replace_all(&without_headings, " ");
    let normalized = WHITESPACE_RE.replace_all(&without_symbols, " ");
    let trimmed = normalized.trim();
    if trimmed.is_empty() {
        return None;
    }

    let mut excerpt: String = trimmed.chars().take(EXCERPT_MAX_CHARS).collect();
    if trimmed.chars().count() > EXCERPT_MAX_CHARS {
        excerpt.push('…');
    }
    Some(excerpt)
}

#[cfg(test)]
mod tests {
    use super::{derive_excerpt, matches_query, EXCERPT_MAX_CHARS};
    use crate::model::norm::{Norm, NormHeader};
    use chrono::Utc;

    fn norm() -> Norm {
        Norm::new(
            NormHeader {
                id: "reg-acad-001".to_string(),
                title: "Reglamento Académico General".to_string(),
                short_title: "RAG".to_string(),
                description: "Norma que rige los procesos académicos.".to_string(),
                tags: vec!["Evaluación".to_string()],
                is_confidential: false,
            },
            "# Título\n\nTexto",
            Utc::now(),
        )
    }

    #[test]
    fn matches_title_description_and_tags_case_insensitively() {
        let norm = norm();
        assert!(matches_query(&norm, "reglamento"));
        assert!(matches_query(&norm, "PROCESOS"));
        assert!(matches_query(&norm, "evalua"));
        assert!(matches_query(&norm, "   "));
        assert!(!matches_query(&norm, "inversiones"));
    }

    #[test]
    fn excerpt_strips_markdown_and_collapses_whitespace() {
        let excerpt = derive_excerpt("# Reglamento\n## Versión 1\n\n**Artículo** [ver](http://x)")
            .expect("excerpt should exist");
        assert_eq!(excerpt, "Reglamento Versión 1 Artículo ver");
    }

    #[test]
    fn excerpt_is_capped_and_empty_content_has_none() {
        let long = "palabra ".repeat(100);
        let excerpt = derive_excerpt(&long).expect("excerpt should exist");
        assert_eq!(excerpt.chars().count(), EXCERPT_MAX_CHARS + 1);
        assert!(excerpt.ends_with('…'));
        assert!(derive_excerpt("  \n# \n").is_none());
    }
}
