use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::super::domain::{Activity, EngagementEvent, Lead};
use super::{
    data_completeness, LeadScorer, ScoreBreakdown, ScoreFactor, ScoreOrigin, ScoreReport,
    ScoringError, SignalCategory,
};
use crate::leads::domain::LeadClassification;

// Historical weight scheme carried by the model-assisted path; the
// deterministic scorer's 40/40/20 scheme is the system of record.
const MODEL_ENGAGEMENT_CAP: u8 = 35;
const MODEL_BUYING_CAP: u8 = 40;
const MODEL_DEMOGRAPHIC_CAP: u8 = 25;

/// Structured prompt handed to the text-generation collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InsightPrompt {
    pub lead_summary: String,
    pub activity_digest: String,
    pub engagement_digest: String,
}

impl InsightPrompt {
    pub fn for_lead(lead: &Lead, activities: &[Activity], events: &[EngagementEvent]) -> Self {
        let lead_summary = format!(
            "{} | source={} | location={} | budget={:?}-{:?} | interest={}",
            lead.display_name(),
            lead.source,
            lead.location.as_deref().unwrap_or("unknown"),
            lead.metadata.budget_min,
            lead.metadata.budget_max,
            lead.metadata.product_interest.as_deref().unwrap_or("unspecified"),
        );
        let activity_digest = activities
            .iter()
            .map(|activity| activity.activity_type.as_str())
            .collect::<Vec<_>>()
            .join(",");
        let engagement_digest = events
            .iter()
            .map(|event| event.event_type.as_str())
            .collect::<Vec<_>>()
            .join(",");

        Self {
            lead_summary,
            activity_digest,
            engagement_digest,
        }
    }
}

/// Raw output of the collaborator before local clamping and confidence
/// computation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsightGeneration {
    pub engagement: u8,
    pub buying_signals: u8,
    pub demographic: u8,
    pub overall: u8,
    pub tier_hint: String,
    pub rationale: String,
    #[serde(default)]
    pub insights: Vec<String>,
    pub tokens_used: u32,
}

/// Text-generation collaborator failure modes. `NotConfigured` is an
/// expected state when no credential is present, not a fatal error.
#[derive(Debug, thiserror::Error)]
pub enum InsightError {
    #[error("insight model not configured")]
    NotConfigured,
    #[error("insight model transport failure: {0}")]
    Transport(String),
    #[error("insight model timed out after {0}s")]
    Timeout(u64),
}

/// Text-generation collaborator contract. Implementations own prompt
/// delivery, timeouts, and token accounting.
pub trait InsightModel: Send + Sync {
    fn generate(&self, prompt: &InsightPrompt) -> Result<InsightGeneration, InsightError>;
}

/// Stand-in for deployments without a configured model; every call reports
/// `NotConfigured` so the policy falls through to the deterministic scorer.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoInsightModel;

impl InsightModel for NoInsightModel {
    fn generate(&self, _prompt: &InsightPrompt) -> Result<InsightGeneration, InsightError> {
        Err(InsightError::NotConfigured)
    }
}

/// Per-lead quota and cache settings for the model-assisted path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsightBudget {
    pub max_calls_per_window: usize,
    pub window_minutes: i64,
    pub cache_ttl_hours: i64,
}

impl Default for InsightBudget {
    fn default() -> Self {
        Self {
            max_calls_per_window: 3,
            window_minutes: 30,
            cache_ttl_hours: 24,
        }
    }
}

#[derive(Debug, Default)]
struct LeadCallState {
    calls: Vec<DateTime<Utc>>,
    cached: Option<(ScoreReport, DateTime<Utc>)>,
}

/// Scorer delegating sub-scores and rationale to an [`InsightModel`],
/// rate-limited and cached per lead. Each lead's quota and cache sit behind
/// their own mutex: overlapping calls for the same lead serialize, while
/// calls for distinct leads run model generations concurrently.
pub struct ModelAssistedScorer<M> {
    model: M,
    budget: InsightBudget,
    states: Mutex<HashMap<String, Arc<Mutex<LeadCallState>>>>,
}

impl<M> ModelAssistedScorer<M>
where
    M: InsightModel,
{
    pub fn new(model: M, budget: InsightBudget) -> Self {
        Self {
            model,
            budget,
            states: Mutex::new(HashMap::new()),
        }
    }

    // Holds the map lock only long enough to hand out the per-lead state.
    fn lead_state(&self, lead_id: &str) -> Arc<Mutex<LeadCallState>> {
        let mut states = self.states.lock().expect("insight state mutex poisoned");
        Arc::clone(states.entry(lead_id.to_string()).or_default())
    }

    fn build_report(
        &self,
        lead: &Lead,
        activities: &[Activity],
        events: &[EngagementEvent],
        generation: InsightGeneration,
    ) -> ScoreReport {
        let engagement = generation.engagement.min(MODEL_ENGAGEMENT_CAP);
        let buying = generation.buying_signals.min(MODEL_BUYING_CAP);
        let demographic = generation.demographic.min(MODEL_DEMOGRAPHIC_CAP);
        let total = u16::from(engagement) + u16::from(buying) + u16::from(demographic);
        let score = total.min(100) as u8;

        let mut insights = generation.insights;
        if !generation.rationale.is_empty() {
            insights.insert(0, generation.rationale);
        }

        debug!(
            lead_id = %lead.id.0,
            tokens = generation.tokens_used,
            "insight generation accepted"
        );

        ScoreReport {
            origin: ScoreOrigin::ModelAssisted,
            score,
            classification: LeadClassification::from_score(score),
            breakdown: ScoreBreakdown {
                engagement,
                buying_signals: buying,
                demographic,
            },
            factors: vec![ScoreFactor {
                category: SignalCategory::Engagement,
                points: i16::from(engagement),
                notes: format!("model tier hint: {}", generation.tier_hint),
            }],
            confidence: data_completeness(lead, activities, events),
            insights,
        }
    }
}

impl<M> LeadScorer for ModelAssistedScorer<M>
where
    M: InsightModel,
{
    fn score(
        &self,
        lead: &Lead,
        activities: &[Activity],
        events: &[EngagementEvent],
        now: DateTime<Utc>,
    ) -> Result<ScoreReport, ScoringError> {
        let handle = self.lead_state(&lead.id.0);
        let mut state = handle.lock().expect("insight state mutex poisoned");

        if let Some((report, stored_at)) = &state.cached {
            if now.signed_duration_since(*stored_at)
                < Duration::hours(self.budget.cache_ttl_hours)
            {
                return Ok(report.clone());
            }
        }

        let window = Duration::minutes(self.budget.window_minutes);
        state
            .calls
            .retain(|called_at| now.signed_duration_since(*called_at) < window);
        if state.calls.len() >= self.budget.max_calls_per_window {
            return Err(ScoringError::RateLimited);
        }

        let prompt = InsightPrompt::for_lead(lead, activities, events);
        state.calls.push(now);
        let generation = self.model.generate(&prompt)?;

        let report = self.build_report(lead, activities, events, generation);
        state.cached = Some((report.clone(), now));
        Ok(report)
    }
}
