//! Cache keys for paginated queries.
//!
//! A key is the ordered list of non-empty parts `[base, username, searchTerm,
//! page, limit]`. Blank strings and missing values are dropped, so
//! `{page: 1}` and `{page: 1, searchTerm: ""}` land on the same entry.

use std::fmt;

use postboard_api_types::PostsQueryParams;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyPart {
    Text(String),
    Number(u64),
}

impl fmt::Display for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyPart::Text(value) => f.write_str(value),
            KeyPart::Number(value) => write!(f, "{value}"),
        }
    }
}

impl From<&str> for KeyPart {
    fn from(value: &str) -> Self {
        KeyPart::Text(value.to_string())
    }
}

impl From<u64> for KeyPart {
    fn from(value: u64) -> Self {
        KeyPart::Number(value)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QueryKey(Vec<KeyPart>);

impl fmt::Display for QueryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (index, part) in self.0.iter().enumerate() {
            if index > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{part}")?;
        }
        f.write_str("]")
    }
}

/// Drop missing and blank parts, keeping the order of the rest.
pub fn filter_empty_keys<I>(parts: I) -> QueryKey
where
    I: IntoIterator<Item = Option<KeyPart>>,
{
    QueryKey(
        parts
            .into_iter()
            .flatten()
            .filter_map(|part| match part {
                KeyPart::Text(text) => {
                    let trimmed = text.trim();
                    (!trimmed.is_empty()).then(|| KeyPart::Text(trimmed.to_string()))
                }
                number => Some(number),
            })
            .collect(),
    )
}

/// Key for a posts listing under `base`. A missing page counts as page 1.
pub fn posts_key(base: &str, params: &PostsQueryParams) -> QueryKey {
    filter_empty_keys([
        Some(KeyPart::from(base)),
        params.username.as_deref().map(KeyPart::from),
        params.search_term.as_deref().map(KeyPart::from),
        Some(KeyPart::Number(params.page.unwrap_or(1))),
        params.limit.map(KeyPart::Number),
    ])
}
