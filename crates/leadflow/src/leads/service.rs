use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::assignment::{
    ApplyError, AssignmentConfig, AssignmentEngine, AssignmentLogic, AssignmentRule,
    RuleConditions, RuleProbe, RuleValidationError,
};
use super::domain::{
    Activity, Assignment, EngagementEvent, Lead, LeadClassification, LeadId, LeadIntake, RepId,
    RuleId,
};
use super::repository::{LeadAlert, LeadNotifier, LeadRepository, LeadView, RepositoryError};
use super::scoring::{
    InsightBudget, InsightModel, NoInsightModel, ScoreHistory, ScoreSnapshot, ScoringConfig,
    ScoringPolicy,
};

static LEAD_SEQUENCE: AtomicU64 = AtomicU64::new(1);
static RULE_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_lead_id() -> LeadId {
    let id = LEAD_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    LeadId(format!("lead-{id:06}"))
}

fn next_rule_id() -> RuleId {
    let id = RULE_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    RuleId(format!("rule-{id:06}"))
}

/// Activity intake payload; the pipeline stamps the timestamp when the
/// producer omits one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivitySubmission {
    pub activity_type: String,
    #[serde(default)]
    pub points_awarded: i16,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Engagement telemetry intake payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventSubmission {
    pub event_type: String,
    #[serde(default)]
    pub payload: BTreeMap<String, String>,
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

/// Draft for the rule administration surface; identifier and creation time
/// are assigned by the pipeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDraft {
    pub name: String,
    pub priority: u8,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub logic: AssignmentLogic,
}

const fn default_active() -> bool {
    true
}

/// Result of one pipeline pass: the refreshed view, whether scoring
/// succeeded, and the representative an assignment landed on.
#[derive(Debug, Clone, Serialize)]
pub struct PipelineOutcome {
    pub lead: LeadView,
    pub scored: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_to: Option<RepId>,
}

/// Error raised by the lead pipeline service.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    Validation(#[from] RuleValidationError),
}

/// Service composing the scoring policy and the assignment engine over one
/// repository. Every lead mutation synchronously rescores and then attempts
/// assignment resolution as a single unit of work.
pub struct LeadPipelineService<R, N, M> {
    repository: Arc<R>,
    notifier: Arc<N>,
    scoring: ScoringPolicy<M>,
    assignment: AssignmentEngine<R>,
}

impl<R, N> LeadPipelineService<R, N, NoInsightModel>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
{
    /// Deterministic-only pipeline, for deployments without a model
    /// credential.
    pub fn new(
        repository: Arc<R>,
        notifier: Arc<N>,
        scoring: ScoringConfig,
        assignment: AssignmentConfig,
    ) -> Self {
        Self {
            repository: repository.clone(),
            notifier,
            scoring: ScoringPolicy::rule_based_only(scoring),
            assignment: AssignmentEngine::new(repository, assignment),
        }
    }
}

impl<R, N, M> LeadPipelineService<R, N, M>
where
    R: LeadRepository + 'static,
    N: LeadNotifier + 'static,
    M: InsightModel + 'static,
{
    pub fn with_model(
        repository: Arc<R>,
        notifier: Arc<N>,
        scoring: ScoringConfig,
        assignment: AssignmentConfig,
        model: M,
        budget: InsightBudget,
    ) -> Self {
        Self {
            repository: repository.clone(),
            notifier,
            scoring: ScoringPolicy::with_model(scoring, model, budget),
            assignment: AssignmentEngine::new(repository, assignment),
        }
    }

    /// Register a lead, run the initial scoring pass, and attempt
    /// auto-assignment.
    pub fn create_lead(
        &self,
        intake: LeadIntake,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let lead = Lead::from_intake(next_lead_id(), intake, now);
        let stored = self.repository.insert_lead(lead)?;
        Ok(self.score_and_route(stored, "lead_created", now))
    }

    /// Append an activity and synchronously recompute downstream state. The
    /// activity write commits even when scoring fails.
    pub fn record_activity(
        &self,
        lead_id: &LeadId,
        submission: ActivitySubmission,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let lead = self
            .repository
            .fetch_lead(lead_id)?
            .ok_or(RepositoryError::NotFound)?;

        let trigger = format!("activity:{}", submission.activity_type);
        self.repository.append_activity(Activity {
            lead_id: lead.id.clone(),
            activity_type: submission.activity_type,
            points_awarded: submission.points_awarded,
            notes: submission.notes,
            occurred_at: submission.occurred_at.unwrap_or(now),
        })?;

        Ok(self.score_and_route(lead, &trigger, now))
    }

    /// Append an engagement event and synchronously recompute downstream
    /// state.
    pub fn record_event(
        &self,
        lead_id: &LeadId,
        submission: EventSubmission,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let lead = self
            .repository
            .fetch_lead(lead_id)?
            .ok_or(RepositoryError::NotFound)?;

        let trigger = format!("event:{}", submission.event_type);
        self.repository.append_event(EngagementEvent {
            lead_id: lead.id.clone(),
            event_type: submission.event_type,
            payload: submission.payload,
            occurred_at: submission.occurred_at.unwrap_or(now),
        })?;

        Ok(self.score_and_route(lead, &trigger, now))
    }

    /// Manual recompute entry point; batch re-sync callers land here.
    pub fn rescore(
        &self,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<PipelineOutcome, PipelineError> {
        let lead = self
            .repository
            .fetch_lead(lead_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(self.score_and_route(lead, "manual_rescore", now))
    }

    pub fn lead_view(&self, lead_id: &LeadId) -> Result<LeadView, PipelineError> {
        let lead = self
            .repository
            .fetch_lead(lead_id)?
            .ok_or(RepositoryError::NotFound)?;
        let snapshot = self.repository.latest_snapshot(lead_id)?;
        let assignment = self.repository.active_assignment(lead_id)?;
        Ok(LeadView::project(&lead, snapshot.as_ref(), assignment.as_ref()))
    }

    pub fn history(&self, lead_id: &LeadId) -> Result<Vec<ScoreHistory>, PipelineError> {
        self.repository
            .fetch_lead(lead_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(self.repository.history_for(lead_id)?)
    }

    /// Rule administration: structural and directory validation precede the
    /// insert so the engine never evaluates a rule naming an unassignable
    /// representative.
    pub fn create_rule(
        &self,
        draft: RuleDraft,
        now: DateTime<Utc>,
    ) -> Result<AssignmentRule, PipelineError> {
        let rule = AssignmentRule {
            id: next_rule_id(),
            name: draft.name,
            priority: draft.priority,
            active: draft.active,
            conditions: draft.conditions,
            logic: draft.logic,
            created_at: now,
        };
        self.assignment.validate_rule(&rule)?;
        Ok(self.repository.insert_rule(rule)?)
    }

    /// Side-effect-free single-rule evaluation.
    pub fn probe_rule(
        &self,
        rule_id: &RuleId,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<RuleProbe, PipelineError> {
        let rule = self
            .repository
            .fetch_rule(rule_id)?
            .ok_or(RepositoryError::NotFound)?;
        let lead = self
            .repository
            .fetch_lead(lead_id)?
            .ok_or(RepositoryError::NotFound)?;
        Ok(self.assignment.probe(&rule, &lead, now)?)
    }

    /// Mutating single-rule evaluation with a structured result, bypassing
    /// the priority scan.
    pub fn apply_rule(
        &self,
        rule_id: &RuleId,
        lead_id: &LeadId,
        now: DateTime<Utc>,
    ) -> Result<Assignment, ApplyError> {
        let rule = self
            .repository
            .fetch_rule(rule_id)?
            .ok_or(RepositoryError::NotFound)?;
        let lead = self
            .repository
            .fetch_lead(lead_id)?
            .ok_or(RepositoryError::NotFound)?;
        let assignment = self.assignment.apply(&rule, &lead, now)?;
        self.notify_assignment(&assignment);
        Ok(assignment)
    }

    /// Scoring then assignment for one trigger. Neither a scoring nor an
    /// assignment failure propagates to the caller of the triggering write.
    fn score_and_route(&self, lead: Lead, trigger: &str, now: DateTime<Utc>) -> PipelineOutcome {
        let (lead, scored) = match self.run_scoring(&lead, trigger, now) {
            Ok(updated) => (updated, true),
            Err(err) => {
                warn!(lead_id = %lead.id.0, %err, "scoring run failed, signal write preserved");
                (lead, false)
            }
        };

        let assigned_to = match self.assignment.resolve(&lead, now) {
            Ok(Some(assignment)) => {
                self.notify_assignment(&assignment);
                Some(assignment.rep_id)
            }
            Ok(None) => None,
            Err(err) => {
                warn!(lead_id = %lead.id.0, %err, "assignment resolution failed");
                None
            }
        };

        let snapshot = self.repository.latest_snapshot(&lead.id).ok().flatten();
        let assignment = self.repository.active_assignment(&lead.id).ok().flatten();
        PipelineOutcome {
            lead: LeadView::project(&lead, snapshot.as_ref(), assignment.as_ref()),
            scored,
            assigned_to,
        }
    }

    /// One scoring run: append a snapshot always, a history row and cached
    /// field update only when the computed values differ from the lead's
    /// current cached values. Recomputing with unchanged inputs is therefore
    /// idempotent.
    fn run_scoring(
        &self,
        lead: &Lead,
        trigger: &str,
        now: DateTime<Utc>,
    ) -> Result<Lead, RepositoryError> {
        let activities = self.repository.activities_for(&lead.id)?;
        let events = self.repository.events_for(&lead.id)?;
        let report = self.scoring.evaluate(lead, &activities, &events, now);

        self.repository.append_snapshot(ScoreSnapshot {
            lead_id: lead.id.clone(),
            report: report.clone(),
            scored_at: now,
        })?;

        if report.score == lead.current_score && report.classification == lead.classification {
            return Ok(lead.clone());
        }

        self.repository.append_history(ScoreHistory {
            lead_id: lead.id.clone(),
            old_score: lead.current_score,
            new_score: report.score,
            old_classification: lead.classification,
            new_classification: report.classification,
            triggered_by: trigger.to_string(),
            changed_at: now,
        })?;

        let mut updated = lead.clone();
        updated.current_score = report.score;
        updated.classification = report.classification;
        self.repository.update_lead(updated.clone())?;

        if lead.classification != LeadClassification::Hot
            && updated.classification == LeadClassification::Hot
        {
            let mut details = BTreeMap::new();
            details.insert("score".to_string(), updated.current_score.to_string());
            self.publish("lead_became_hot", &updated.id, details);
        }

        Ok(updated)
    }

    fn notify_assignment(&self, assignment: &Assignment) {
        let mut details = BTreeMap::new();
        details.insert("rep_id".to_string(), assignment.rep_id.0.clone());
        if let Some(rule_id) = &assignment.rule_id {
            details.insert("rule_id".to_string(), rule_id.0.clone());
        }
        self.publish("lead_assigned", &assignment.lead_id, details);
    }

    fn publish(&self, template: &str, lead_id: &LeadId, details: BTreeMap<String, String>) {
        let alert = LeadAlert {
            template: template.to_string(),
            lead_id: lead_id.clone(),
            details,
        };
        if let Err(err) = self.notifier.publish(alert) {
            warn!(lead_id = %lead_id.0, %err, template, "notification dispatch failed");
        }
    }
}
