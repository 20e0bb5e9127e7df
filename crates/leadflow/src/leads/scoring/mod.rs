//! Lead scoring: a deterministic rule-based strategy and a model-assisted
//! strategy sharing one output contract.

mod config;
mod insight;
mod rules;

pub use config::ScoringConfig;
pub use insight::{
    InsightBudget, InsightError, InsightGeneration, InsightModel, InsightPrompt,
    ModelAssistedScorer, NoInsightModel,
};
pub use rules::RuleBasedScorer;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use super::domain::{Activity, EngagementEvent, Lead, LeadClassification, LeadId};

/// Which strategy produced a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreOrigin {
    RuleBased,
    ModelAssisted,
}

impl ScoreOrigin {
    pub const fn label(self) -> &'static str {
        match self {
            ScoreOrigin::RuleBased => "rule_based",
            ScoreOrigin::ModelAssisted => "model_assisted",
        }
    }
}

/// Signal dimension a factor contributes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalCategory {
    Engagement,
    BuyingSignals,
    Demographic,
}

/// Discrete contribution to a score, allowing transparent audits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactor {
    pub category: SignalCategory,
    pub points: i16,
    pub notes: String,
}

/// Capped sub-scores. Each dimension is clamped before summation so no
/// single dimension can dominate past its budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreBreakdown {
    pub engagement: u8,
    pub buying_signals: u8,
    pub demographic: u8,
}

/// Output contract shared by both strategies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreReport {
    pub origin: ScoreOrigin,
    pub score: u8,
    pub classification: LeadClassification,
    pub breakdown: ScoreBreakdown,
    pub factors: Vec<ScoreFactor>,
    /// Data completeness in [0, 1], never a model-reported probability.
    pub confidence: f32,
    pub insights: Vec<String>,
}

/// One row per scoring run, appended regardless of whether the cached score
/// changed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreSnapshot {
    pub lead_id: LeadId,
    pub report: ScoreReport,
    pub scored_at: DateTime<Utc>,
}

/// One row per change to the cached score/classification. Written only when
/// the freshly computed values differ from the lead's current cached values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreHistory {
    pub lead_id: LeadId,
    pub old_score: u8,
    pub new_score: u8,
    pub old_classification: LeadClassification,
    pub new_classification: LeadClassification,
    pub triggered_by: String,
    pub changed_at: DateTime<Utc>,
}

/// Error raised by a scoring strategy.
#[derive(Debug, thiserror::Error)]
pub enum ScoringError {
    #[error("per-lead insight quota exhausted")]
    RateLimited,
    #[error(transparent)]
    Insight(#[from] InsightError),
}

/// Scoring capability with exactly one method and two implementations.
pub trait LeadScorer: Send + Sync {
    fn score(
        &self,
        lead: &Lead,
        activities: &[Activity],
        events: &[EngagementEvent],
        now: DateTime<Utc>,
    ) -> Result<ScoreReport, ScoringError>;
}

/// Caller policy: try the model-assisted scorer when one is attached, fall
/// back to the deterministic scorer on any typed failure. Fallback is logged
/// and never surfaced to the lead-mutation caller.
pub struct ScoringPolicy<M> {
    rule_based: RuleBasedScorer,
    model: Option<ModelAssistedScorer<M>>,
}

impl ScoringPolicy<NoInsightModel> {
    pub fn rule_based_only(config: ScoringConfig) -> Self {
        Self {
            rule_based: RuleBasedScorer::new(config),
            model: None,
        }
    }
}

impl<M> ScoringPolicy<M>
where
    M: InsightModel,
{
    pub fn with_model(config: ScoringConfig, model: M, budget: InsightBudget) -> Self {
        Self {
            rule_based: RuleBasedScorer::new(config),
            model: Some(ModelAssistedScorer::new(model, budget)),
        }
    }

    /// Infallible evaluation: the deterministic scorer is the fallback for
    /// every model failure mode.
    pub fn evaluate(
        &self,
        lead: &Lead,
        activities: &[Activity],
        events: &[EngagementEvent],
        now: DateTime<Utc>,
    ) -> ScoreReport {
        if let Some(model) = &self.model {
            match model.score(lead, activities, events, now) {
                Ok(report) => return report,
                Err(ScoringError::RateLimited) => {
                    warn!(lead_id = %lead.id.0, "insight quota exhausted, using rule-based scorer");
                }
                Err(ScoringError::Insight(InsightError::NotConfigured)) => {
                    // Expected when no credential is present.
                }
                Err(ScoringError::Insight(err)) => {
                    warn!(lead_id = %lead.id.0, %err, "insight model failed, using rule-based scorer");
                }
            }
        }

        self.rule_based.report(lead, activities, events, now)
    }
}

const EXPECTED_SIGNAL_CATEGORIES: f32 = 6.0;

/// Confidence from data completeness: populated signal categories over the
/// six expected ones (email activity, web activity, buying signals, budget
/// range, location, source).
pub(crate) fn data_completeness(
    lead: &Lead,
    activities: &[Activity],
    events: &[EngagementEvent],
) -> f32 {
    let has_signal = |kinds: &[&str]| {
        activities
            .iter()
            .any(|activity| kinds.contains(&activity.activity_type.as_str()))
            || events
                .iter()
                .any(|event| kinds.contains(&event.event_type.as_str()))
    };

    let mut populated = 0u8;
    if has_signal(&["email_open", "email_click"]) {
        populated += 1;
    }
    if has_signal(&["website_visit"]) {
        populated += 1;
    }
    if has_signal(&[
        "pricing_page_view",
        "trade_in_calculator",
        "finance_calculator",
        "test_drive_request",
    ]) {
        populated += 1;
    }
    if lead.metadata.has_budget_range() {
        populated += 1;
    }
    if lead.location.is_some() {
        populated += 1;
    }
    if !lead.source.is_empty() {
        populated += 1;
    }

    f32::from(populated) / EXPECTED_SIGNAL_CATEGORIES
}
