//! Normalized task description supplied by the ingestion side.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::task::SlaLevel;

/// Input record for `add_task`.
///
/// Mirrors what an issue fetcher produces after label parsing: the category
/// picks the base tier, everything else is available to priority rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskDetails {
    pub id: String,
    pub category: String,
    #[serde(default)]
    pub labels: Vec<String>,
    /// ISO8601 timestamp of the source item
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub sla_level: SlaLevel,
    #[serde(default)]
    pub assignees: Vec<String>,
    #[serde(default)]
    pub mentions: Vec<String>,
    #[serde(default)]
    pub repository: String,
}

impl TaskDetails {
    pub fn new(id: impl Into<String>, category: impl Into<String>, created_at: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            category: category.into(),
            labels: Vec::new(),
            created_at,
            sla_level: SlaLevel::default(),
            assignees: Vec::new(),
            mentions: Vec::new(),
            repository: String::new(),
        }
    }

    pub fn with_labels<I, S>(mut self, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.labels = labels.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_sla(mut self, level: SlaLevel) -> Self {
        self.sla_level = level;
        self
    }

    pub fn with_assignees<I, S>(mut self, assignees: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.assignees = assignees.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_mentions<I, S>(mut self, mentions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.mentions = mentions.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_repository(mut self, repository: impl Into<String>) -> Self {
        self.repository = repository.into();
        self
    }

    pub fn has_label(&self, label: &str) -> bool {
        self.labels.iter().any(|l| l == label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_ingested_record() {
        let json = r#"{
            "id": "octo/repo#12",
            "category": "bug",
            "labels": ["security"],
            "createdAt": "2026-01-05T10:00:00Z",
            "slaLevel": "high",
            "assignees": ["mona"],
            "mentions": [],
            "repository": "octo/repo"
        }"#;
        let details: TaskDetails = serde_json::from_str(json).unwrap();
        assert_eq!(details.id, "octo/repo#12");
        assert_eq!(details.sla_level, SlaLevel::High);
        assert!(details.has_label("security"));
        assert_eq!(details.created_at.to_rfc3339(), "2026-01-05T10:00:00+00:00");
    }

    #[test]
    fn test_optional_fields_default() {
        let yaml = "id: t1\ncategory: misc\ncreatedAt: 2026-01-05T10:00:00Z\n";
        let details: TaskDetails = serde_yaml::from_str(yaml).unwrap();
        assert!(details.labels.is_empty());
        assert_eq!(details.sla_level, SlaLevel::Normal);
        assert!(details.repository.is_empty());
    }
}
