//! Invalidation events and results

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntityType {
    LearningPath,
    Module,
    Challenge,
    Enrollment,
    Progress,
    Submission,
    User,
}

impl EntityType {
    pub const ALL: [EntityType; 7] = [
        EntityType::LearningPath,
        EntityType::Module,
        EntityType::Challenge,
        EntityType::Enrollment,
        EntityType::Progress,
        EntityType::Submission,
        EntityType::User,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::LearningPath => "LEARNING_PATH",
            EntityType::Module => "MODULE",
            EntityType::Challenge => "CHALLENGE",
            EntityType::Enrollment => "ENROLLMENT",
            EntityType::Progress => "PROGRESS",
            EntityType::Submission => "SUBMISSION",
            EntityType::User => "USER",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = EventError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_uppercase().replace('-', "_");
        EntityType::ALL
            .into_iter()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| EventError::UnknownEntityType(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EventError {
    #[error("Unknown entity type: {0}")]
    UnknownEntityType(String),

    #[error("{field} must not be empty")]
    EmptyField { field: &'static str },

    #[error("{field} contains key pattern characters: {value}")]
    PatternCharacters { field: &'static str, value: String },
}

/// A domain entity changed; dependent cache entries must go.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationEvent {
    #[serde(rename = "type")]
    pub entity_type: EntityType,
    pub entity_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
    #[serde(default = "Utc::now")]
    pub timestamp: DateTime<Utc>,
}

impl InvalidationEvent {
    pub fn new(entity_type: EntityType, entity_id: impl Into<String>) -> Self {
        Self {
            entity_type,
            entity_id: entity_id.into(),
            user_id: None,
            metadata: None,
            timestamp: Utc::now(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value.into());
        self
    }

    /// String or numeric metadata value; anything else is treated as absent
    pub fn metadata_str(&self, key: &str) -> Option<String> {
        match self.metadata.as_ref()?.get(key)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    }

    /// Ids end up inside key patterns, so glob characters are refused
    pub fn validate(&self) -> Result<(), EventError> {
        check_id("entityId", &self.entity_id)?;
        if let Some(user_id) = &self.user_id {
            check_id("userId", user_id)?;
        }
        if let Some(metadata) = &self.metadata {
            for (key, value) in metadata {
                if let Value::String(s) = value {
                    if crate::store::is_pattern(s) {
                        return Err(EventError::PatternCharacters {
                            field: "metadata",
                            value: format!("{}={}", key, s),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

pub fn check_id(field: &'static str, value: &str) -> Result<(), EventError> {
    if value.trim().is_empty() {
        return Err(EventError::EmptyField { field });
    }
    if crate::store::is_pattern(value) {
        return Err(EventError::PatternCharacters {
            field,
            value: value.to_string(),
        });
    }
    Ok(())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidationResult {
    pub success: bool,
    pub invalidated_keys: Vec<String>,
    pub errors: Vec<String>,
}
