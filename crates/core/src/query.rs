use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ValidationError, ValidationReason};
use crate::provider::CloudProvider;

/// Default page size for list and search queries.
pub const DEFAULT_LIMIT: u32 = 50;

/// Hard cap on page size; larger requests are capped silently.
pub const MAX_LIMIT: u32 = 1000;

/// Sort column for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    /// Sort by creation time (the default).
    #[default]
    CreatedAt,
    /// Sort by last-modification time.
    ModifiedAt,
    /// Sort by the human-readable name.
    Name,
}

impl SortBy {
    /// The column name used by relational backends. Sort columns come from
    /// this enum, never from caller-supplied strings.
    pub fn as_column(self) -> &'static str {
        match self {
            Self::CreatedAt => "created_at",
            Self::ModifiedAt => "modified_at",
            Self::Name => "name",
        }
    }
}

/// Sort direction for list queries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    /// Ascending.
    Asc,
    /// Descending (the default).
    #[default]
    Desc,
}

impl SortOrder {
    /// The SQL keyword for this direction.
    pub fn as_sql(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// The canonical input to list, text, and vector retrieval.
///
/// Unrecognized sort columns and orders are rejected at deserialization
/// time by the typed enums; negative limits and offsets are unrepresentable.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchQuery {
    /// Free-text needle for text search. Ignored by plain lists.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Filter to one provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provider: Option<CloudProvider>,

    /// Filter to one resource type tag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    /// Metadata filter predicates, ANDed together. Recognized keys:
    /// `region`, `environment`, `cost_center`, and `tag:<name>`.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub filters: BTreeMap<String, String>,

    /// Maximum results to return (default 50, capped at 1000). A limit of
    /// zero yields an empty result set without error.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,

    /// Results to skip for pagination.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,

    /// Sort column.
    #[serde(default)]
    pub sort_by: SortBy,

    /// Sort direction.
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl SearchQuery {
    /// The effective limit: default 50, silently capped at [`MAX_LIMIT`].
    pub fn effective_limit(&self) -> u32 {
        self.limit.unwrap_or(DEFAULT_LIMIT).min(MAX_LIMIT)
    }

    /// The effective offset, defaulting to 0.
    pub fn effective_offset(&self) -> u32 {
        self.offset.unwrap_or(0)
    }

    /// Check that every filter key is recognized.
    pub fn validate(&self) -> Result<(), ValidationError> {
        for key in self.filters.keys() {
            let recognized = matches!(key.as_str(), "region" | "environment" | "cost_center")
                || key
                    .strip_prefix("tag:")
                    .is_some_and(|name| !name.is_empty());
            if !recognized {
                return Err(ValidationError::new(
                    format!("filters.{key}"),
                    ValidationReason::UnknownField,
                ));
            }
        }
        Ok(())
    }

    /// Set the text needle.
    #[must_use]
    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// Filter to one provider.
    #[must_use]
    pub fn with_provider(mut self, provider: CloudProvider) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Filter to one resource type.
    #[must_use]
    pub fn with_resource_type(mut self, resource_type: impl Into<String>) -> Self {
        self.resource_type = Some(resource_type.into());
        self
    }

    /// Add a filter predicate.
    #[must_use]
    pub fn with_filter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.filters.insert(key.into(), value.into());
        self
    }

    /// Set the page size.
    #[must_use]
    pub fn with_limit(mut self, limit: u32) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Set the pagination offset.
    #[must_use]
    pub fn with_offset(mut self, offset: u32) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Set the sort column and direction.
    #[must_use]
    pub fn with_sort(mut self, sort_by: SortBy, sort_order: SortOrder) -> Self {
        self.sort_by = sort_by;
        self.sort_order = sort_order;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let q = SearchQuery::default();
        assert_eq!(q.effective_limit(), 50);
        assert_eq!(q.effective_offset(), 0);
        assert_eq!(q.sort_by, SortBy::CreatedAt);
        assert_eq!(q.sort_order, SortOrder::Desc);
    }

    #[test]
    fn limit_caps_silently() {
        let q = SearchQuery::default().with_limit(5000);
        assert_eq!(q.effective_limit(), 1000);
    }

    #[test]
    fn zero_limit_is_preserved() {
        let q = SearchQuery::default().with_limit(0);
        assert_eq!(q.effective_limit(), 0);
    }

    #[test]
    fn validate_accepts_known_filters() {
        let q = SearchQuery::default()
            .with_filter("region", "us-east-1")
            .with_filter("environment", "production")
            .with_filter("cost_center", "cc-42")
            .with_filter("tag:team", "platform");
        assert!(q.validate().is_ok());
    }

    #[test]
    fn validate_rejects_unknown_filters() {
        let q = SearchQuery::default().with_filter("owner", "alice");
        let err = q.validate().unwrap_err();
        assert_eq!(err.field, "filters.owner");
        assert_eq!(err.reason, ValidationReason::UnknownField);

        // A bare "tag:" prefix is not a usable key either.
        let q = SearchQuery::default().with_filter("tag:", "x");
        assert!(q.validate().is_err());
    }

    #[test]
    fn unknown_sort_order_fails_deserialization() {
        let result =
            serde_json::from_str::<SearchQuery>(r#"{"sort_order": "sideways"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn serde_roundtrip() {
        let q = SearchQuery::default()
            .with_text("web")
            .with_provider(CloudProvider::Aws)
            .with_sort(SortBy::Name, SortOrder::Asc)
            .with_limit(10);
        let json = serde_json::to_string(&q).unwrap();
        let back: SearchQuery = serde_json::from_str(&json).unwrap();
        assert_eq!(back.text.as_deref(), Some("web"));
        assert_eq!(back.provider, Some(CloudProvider::Aws));
        assert_eq!(back.sort_by, SortBy::Name);
        assert_eq!(back.limit, Some(10));
    }
}
