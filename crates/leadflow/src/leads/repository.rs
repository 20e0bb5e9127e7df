use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::assignment::AssignmentRule;
use super::domain::{
    Activity, Assignment, EngagementEvent, Lead, LeadId, RepId, Representative, RuleId,
};
use super::scoring::{ScoreHistory, ScoreSnapshot};

/// Storage abstraction so the engines can be exercised in isolation. Each
/// method maps to one transactional unit; `insert_assignment` in particular
/// must commit the assignment row and the optional rotation-state update as
/// one all-or-nothing write.
pub trait LeadRepository: Send + Sync {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError>;
    fn update_lead(&self, lead: Lead) -> Result<(), RepositoryError>;
    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError>;

    fn append_activity(&self, activity: Activity) -> Result<(), RepositoryError>;
    fn activities_for(&self, id: &LeadId) -> Result<Vec<Activity>, RepositoryError>;
    fn append_event(&self, event: EngagementEvent) -> Result<(), RepositoryError>;
    fn events_for(&self, id: &LeadId) -> Result<Vec<EngagementEvent>, RepositoryError>;

    fn append_snapshot(&self, snapshot: ScoreSnapshot) -> Result<(), RepositoryError>;
    fn latest_snapshot(&self, id: &LeadId) -> Result<Option<ScoreSnapshot>, RepositoryError>;
    fn append_history(&self, entry: ScoreHistory) -> Result<(), RepositoryError>;
    fn history_for(&self, id: &LeadId) -> Result<Vec<ScoreHistory>, RepositoryError>;

    fn insert_rule(&self, rule: AssignmentRule) -> Result<AssignmentRule, RepositoryError>;
    fn fetch_rule(&self, id: &RuleId) -> Result<Option<AssignmentRule>, RepositoryError>;
    fn assignment_rules(&self) -> Result<Vec<AssignmentRule>, RepositoryError>;

    fn active_assignment(&self, id: &LeadId) -> Result<Option<Assignment>, RepositoryError>;
    fn active_assignment_count(&self, rep: &RepId) -> Result<usize, RepositoryError>;
    /// Insert-if-absent over the one-active-assignment-per-lead invariant.
    /// Returns `Conflict` when the lead already holds an active assignment;
    /// `rule_state`, when present, is the advanced round-robin rule and must
    /// land in the same transaction.
    fn insert_assignment(
        &self,
        assignment: Assignment,
        rule_state: Option<AssignmentRule>,
    ) -> Result<Assignment, RepositoryError>;

    fn fetch_representative(&self, id: &RepId) -> Result<Option<Representative>, RepositoryError>;
    /// Active representatives carrying the given role.
    fn representatives_with_role(&self, role: &str)
        -> Result<Vec<Representative>, RepositoryError>;
}

/// Error enumeration for repository failures. `Conflict` doubles as the
/// optimistic-concurrency loss signal for the assignment guard.
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("record already exists")]
    Conflict,
    #[error("record not found")]
    NotFound,
    #[error("repository unavailable: {0}")]
    Unavailable(String),
}

/// Trait describing outbound notification hooks. Delivery is
/// fire-and-forget; the pipeline logs failures and moves on.
pub trait LeadNotifier: Send + Sync {
    fn publish(&self, alert: LeadAlert) -> Result<(), NotifyError>;
}

/// Notification payload so routes/tests can assert integration boundaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeadAlert {
    pub template: String,
    pub lead_id: LeadId,
    pub details: BTreeMap<String, String>,
}

/// Notification dispatch error.
#[derive(Debug, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
}

/// Sanitized representation of a lead's exposed pipeline state.
#[derive(Debug, Clone, Serialize)]
pub struct LeadView {
    pub lead_id: LeadId,
    pub name: String,
    pub source: String,
    pub status: &'static str,
    pub score: u8,
    pub classification: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scored_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<RepId>,
}

impl LeadView {
    pub fn project(
        lead: &Lead,
        snapshot: Option<&ScoreSnapshot>,
        assignment: Option<&Assignment>,
    ) -> Self {
        Self {
            lead_id: lead.id.clone(),
            name: lead.display_name(),
            source: lead.source.clone(),
            status: lead.status.label(),
            score: lead.current_score,
            classification: lead.classification.label(),
            confidence: snapshot.map(|snapshot| snapshot.report.confidence),
            scored_at: snapshot.map(|snapshot| snapshot.scored_at),
            assigned_to: assignment.map(|assignment| assignment.rep_id.clone()),
        }
    }
}
