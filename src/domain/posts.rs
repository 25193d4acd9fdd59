//! Post content rules.

use super::error::DomainError;

pub const TITLE_MAX_CHARS: usize = 200;
pub const CONTENT_MAX_CHARS: usize = 50_000;

/// Trimmed title and content of a post that satisfies the content rules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostDraft {
    pub title: String,
    pub content: String,
}

impl PostDraft {
    pub fn parse(title: &str, content: &str) -> Result<Self, DomainError> {
        let title = ensure_non_empty(title, "title")?;
        if title.chars().count() > TITLE_MAX_CHARS {
            return Err(DomainError::validation("title", "must be at most 200 characters"));
        }
        let content = ensure_non_empty(content, "content")?;
        if content.chars().count() > CONTENT_MAX_CHARS {
            return Err(DomainError::validation(
                "content",
                "must be at most 50000 characters",
            ));
        }
        Ok(Self {
            title: title.to_string(),
            content: content.to_string(),
        })
    }
}

fn ensure_non_empty<'a>(value: &'a str, field: &'static str) -> Result<&'a str, DomainError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation(field, "must not be empty"));
    }
    Ok(trimmed)
}
