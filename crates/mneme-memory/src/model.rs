//! Memory data model shared by the stores, ranker, and engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Speaker of a short-term turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// Stable lowercase tag used in storage and transcripts.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "user" => Ok(Role::User),
            "assistant" => Ok(Role::Assistant),
            other => Err(format!("unknown role: {other}")),
        }
    }
}

/// One utterance in a session's short-term log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Turn {
    pub id: Uuid,
    pub session_id: String,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Category tag attached to a long-term memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryCategory {
    PersonalInfo,
    Preference,
    Fact,
    Decision,
    Goal,
    Other,
}

impl MemoryCategory {
    /// Stable snake_case tag used in storage and context rendering.
    pub fn as_str(&self) -> &'static str {
        match self {
            MemoryCategory::PersonalInfo => "personal_info",
            MemoryCategory::Preference => "preference",
            MemoryCategory::Fact => "fact",
            MemoryCategory::Decision => "decision",
            MemoryCategory::Goal => "goal",
            MemoryCategory::Other => "other",
        }
    }

    /// Parse a free-form tag; unknown tags become `Other`.
    ///
    /// Matching ignores case and treats `-` and spaces like `_`.
    pub fn from_tag(tag: &str) -> Self {
        let normalized = tag.trim().to_ascii_lowercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "personal_info" => MemoryCategory::PersonalInfo,
            "preference" => MemoryCategory::Preference,
            "fact" => MemoryCategory::Fact,
            "decision" => MemoryCategory::Decision,
            "goal" => MemoryCategory::Goal,
            _ => MemoryCategory::Other,
        }
    }
}

impl fmt::Display for MemoryCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lowest importance a record may carry.
pub const MIN_IMPORTANCE: u8 = 1;
/// Highest importance a record may carry.
pub const MAX_IMPORTANCE: u8 = 10;

/// Fields supplied when admitting a new long-term memory.
#[derive(Debug, Clone, PartialEq)]
pub struct NewRecord {
    pub content: String,
    pub category: MemoryCategory,
    pub importance: u8,
    pub embedding: Vec<f32>,
}

/// Persisted long-term memory.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LongTermRecord {
    pub id: Uuid,
    pub owner_id: String,
    pub content: String,
    pub category: MemoryCategory,
    /// Importance in `[1, 10]`.
    pub importance: u8,
    pub embedding: Vec<f32>,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub access_count: u64,
}

/// Running summary of compacted turns for one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub summary_text: String,
    pub updated_at: DateTime<Utc>,
}

/// Emphasis tier assigned to a ranked memory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Emphasis {
    High,
    Medium,
    Low,
}

impl Emphasis {
    /// Marker prefixed to the memory line in an assembled context.
    pub fn marker(&self) -> Option<&'static str> {
        match self {
            Emphasis::High => Some("IMPORTANT"),
            Emphasis::Medium => Some("Note"),
            Emphasis::Low => None,
        }
    }
}

/// A long-term record matched against a query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResult {
    pub record: LongTermRecord,
    /// Cosine similarity in `[0, 1]`.
    pub similarity: f64,
    /// Blended relevance in `[0, 1]`; equals similarity until ranked.
    pub relevance: f64,
    pub emphasis: Emphasis,
}

#[cfg(test)]
mod tests {
    use super::{Emphasis, MemoryCategory, Role};
    use pretty_assertions::assert_eq;

    #[test]
    fn category_tags_are_lenient() {
        assert_eq!(
            MemoryCategory::from_tag("Personal Info"),
            MemoryCategory::PersonalInfo
        );
        assert_eq!(
            MemoryCategory::from_tag("personal-info"),
            MemoryCategory::PersonalInfo
        );
        assert_eq!(MemoryCategory::from_tag(" GOAL "), MemoryCategory::Goal);
        assert_eq!(MemoryCategory::from_tag("hobby"), MemoryCategory::Other);
        assert_eq!(MemoryCategory::PersonalInfo.to_string(), "personal_info");
    }

    #[test]
    fn role_round_trips_through_tag() {
        assert_eq!("assistant".parse::<Role>(), Ok(Role::Assistant));
        assert!("system".parse::<Role>().is_err());
        assert_eq!(Role::User.as_str(), "user");
    }

    #[test]
    fn emphasis_markers() {
        assert_eq!(Emphasis::High.marker(), Some("IMPORTANT"));
        assert_eq!(Emphasis::Medium.marker(), Some("Note"));
        assert_eq!(Emphasis::Low.marker(), None);
    }
}
