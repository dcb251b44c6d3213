use std::collections::BTreeSet;

use crate::error::{ServiceError, ServiceResult};

/// Maximum number of interests one owner may carry
pub const MAX_INTERESTS: usize = 20;
/// Maximum length of a single interest tag
pub const MAX_INTEREST_LEN: usize = 30;

/// A normalized, deduplicated interest set.
///
/// Tags are trimmed and lowercased; a `BTreeSet` keeps iteration (and the
/// arrays bound into SQL) deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InterestSet(BTreeSet<String>);

impl InterestSet {
    /// Strict parse for externally-supplied interest lists.
    ///
    /// Rejects empty tags, tags longer than [`MAX_INTEREST_LEN`], and sets
    /// that exceed [`MAX_INTERESTS`] after deduplication.
    pub fn parse<I>(raw: I) -> ServiceResult<Self>
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let mut tags = BTreeSet::new();
        for tag in raw {
            let normalized = tag.as_ref().trim().to_lowercase();
            if normalized.is_empty() || normalized.len() > MAX_INTEREST_LEN {
                return Err(ServiceError::Validation(format!(
                    "interests must be between 1-{} characters",
                    MAX_INTEREST_LEN
                )));
            }
            tags.insert(normalized);
        }
        if tags.len() > MAX_INTERESTS {
            return Err(ServiceError::Validation(format!(
                "maximum {} interests",
                MAX_INTERESTS
            )));
        }
        Ok(Self(tags))
    }

    /// Lenient normalization for interest sets loaded from the store.
    ///
    /// Out-of-bound entries are dropped rather than failing the request, so
    /// dirty legacy rows cannot break ranking.
    pub fn sanitize<I>(raw: I) -> Self
    where
        I: IntoIterator,
        I::Item: AsRef<str>,
    {
        let tags = raw
            .into_iter()
            .map(|tag| tag.as_ref().trim().to_lowercase())
            .filter(|tag| !tag.is_empty() && tag.len() <= MAX_INTEREST_LEN)
            .take(MAX_INTERESTS)
            .collect();
        Self(tags)
    }

    /// Count of interests shared with `other`. Order-independent.
    pub fn overlap(&self, other: &InterestSet) -> usize {
        self.0.intersection(&other.0).count()
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.0.contains(tag)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Tags in deterministic order, for SQL array binding
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}
