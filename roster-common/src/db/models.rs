//! Database models shared by the roster services
//!
//! JSON field names are camelCase to match the web client.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One contact row after column normalization
///
/// `first_name` and `phone` are non-empty once a row has passed validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizedContact {
    pub first_name: String,
    pub phone: String,
    #[serde(default)]
    pub notes: String,
}

impl NormalizedContact {
    pub fn new(
        first_name: impl Into<String>,
        phone: impl Into<String>,
        notes: impl Into<String>,
    ) -> Self {
        Self {
            first_name: first_name.into(),
            phone: phone.into(),
            notes: notes.into(),
        }
    }
}

/// Agent roster entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Agent {
    pub id: String,
    pub name: String,
    pub email: String,
    pub mobile_number: String,
    pub created_at: DateTime<Utc>,
}

/// The part of an agent a distribution run needs
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AgentRef {
    pub id: String,
    pub name: String,
    pub email: String,
}

/// Persisted output of one distribution run for one agent
///
/// All records written by the same run share `batch_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DistributionBatch {
    pub id: String,
    pub batch_id: String,
    pub agent_id: String,
    pub agent_name: String,
    pub agent_email: String,
    pub items: Vec<NormalizedContact>,
    pub created_at: DateTime<Utc>,
}
