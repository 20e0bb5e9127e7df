use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identifier wrapper for tracked leads.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LeadId(pub String);

/// Identifier wrapper for sales representatives.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RepId(pub String);

/// Identifier wrapper for assignment rules.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RuleId(pub String);

/// Identifier wrapper for assignments.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AssignmentId(pub String);

/// Priority bucket derived from the numeric score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadClassification {
    Hot,
    Warm,
    Cold,
}

impl LeadClassification {
    /// Bucket a 0-100 score. Thresholds are shared by both scoring strategies.
    pub const fn from_score(score: u8) -> Self {
        if score >= 80 {
            LeadClassification::Hot
        } else if score >= 50 {
            LeadClassification::Warm
        } else {
            LeadClassification::Cold
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            LeadClassification::Hot => "hot",
            LeadClassification::Warm => "warm",
            LeadClassification::Cold => "cold",
        }
    }
}

/// Lifecycle stage tracked through the sales pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LeadStatus {
    New,
    Contacted,
    Qualified,
    Negotiating,
    Won,
    Lost,
}

impl LeadStatus {
    pub const fn label(self) -> &'static str {
        match self {
            LeadStatus::New => "new",
            LeadStatus::Contacted => "contacted",
            LeadStatus::Qualified => "qualified",
            LeadStatus::Negotiating => "negotiating",
            LeadStatus::Won => "won",
            LeadStatus::Lost => "lost",
        }
    }
}

/// Typed view over the free-form intake metadata. Recognized keys are declared
/// once here; scoring and assignment condition filters read through
/// [`LeadMetadata::field`] instead of threading an untyped map around.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadMetadata {
    #[serde(default)]
    pub budget_min: Option<u32>,
    #[serde(default)]
    pub budget_max: Option<u32>,
    #[serde(default)]
    pub product_interest: Option<String>,
    #[serde(default)]
    pub intake_notes: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

impl LeadMetadata {
    /// Uniform accessor over typed fields and arbitrary tags.
    pub fn field(&self, key: &str) -> Option<String> {
        match key {
            "budget_min" => self.budget_min.map(|value| value.to_string()),
            "budget_max" => self.budget_max.map(|value| value.to_string()),
            "product_interest" => self.product_interest.clone(),
            "intake_notes" => self.intake_notes.clone(),
            _ => self.tags.get(key).cloned(),
        }
    }

    /// Budget clarity requires both ends of the range.
    pub fn has_budget_range(&self) -> bool {
        self.budget_min.is_some() && self.budget_max.is_some()
    }
}

/// Intake payload for a new lead before the pipeline assigns an identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadIntake {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub source: String,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub metadata: LeadMetadata,
    #[serde(default)]
    pub created_by: Option<RepId>,
}

/// A prospective customer tracked through scoring and assignment. The cached
/// `current_score`/`classification` pair is a projection of the latest
/// scoring run; history rows record every transition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Lead {
    pub id: LeadId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub source: String,
    pub location: Option<String>,
    pub current_score: u8,
    pub classification: LeadClassification,
    pub status: LeadStatus,
    pub metadata: LeadMetadata,
    pub created_by: Option<RepId>,
    pub created_at: DateTime<Utc>,
}

impl Lead {
    pub fn from_intake(id: LeadId, intake: LeadIntake, now: DateTime<Utc>) -> Self {
        Self {
            id,
            first_name: intake.first_name,
            last_name: intake.last_name,
            email: intake.email,
            phone: intake.phone,
            source: intake.source,
            location: intake.location,
            current_score: 0,
            classification: LeadClassification::Cold,
            status: LeadStatus::New,
            metadata: intake.metadata,
            created_by: intake.created_by,
            created_at: now,
        }
    }

    pub fn display_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }
}

/// Append-only event logged against a lead by intake or external integrations.
/// Read-only to the engines.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Activity {
    pub lead_id: LeadId,
    pub activity_type: String,
    pub points_awarded: i16,
    #[serde(default)]
    pub notes: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

/// Finer-grained telemetry (opens, clicks, visits) with a free-form payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementEvent {
    pub lead_id: LeadId,
    pub event_type: String,
    #[serde(default)]
    pub payload: BTreeMap<String, String>,
    pub occurred_at: DateTime<Utc>,
}

/// Directory entry for an assignable sales representative.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Representative {
    pub id: RepId,
    pub name: String,
    pub role: String,
    pub active: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignmentStatus {
    Active,
    Transferred,
    Completed,
}

impl AssignmentStatus {
    pub const fn label(self) -> &'static str {
        match self {
            AssignmentStatus::Active => "active",
            AssignmentStatus::Transferred => "transferred",
            AssignmentStatus::Completed => "completed",
        }
    }
}

/// Ownership link between a lead and a representative. At most one Active
/// assignment may exist per lead; the engine enforces this, not storage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Assignment {
    pub id: AssignmentId,
    pub lead_id: LeadId,
    pub rep_id: RepId,
    pub rule_id: Option<RuleId>,
    pub status: AssignmentStatus,
    pub is_primary: bool,
    pub assigned_at: DateTime<Utc>,
}
