//! Lead pipeline: scoring and assignment engines sharing the [`domain::Lead`]
//! entity, plus the service facade and HTTP router that drive them.

pub mod assignment;
pub mod domain;
pub mod repository;
pub mod router;
pub mod scoring;
pub mod service;

#[cfg(test)]
mod tests;

pub use assignment::{
    ApplyError, AssignmentConfig, AssignmentEngine, AssignmentLogic, AssignmentRule, HoursWindow,
    MetadataMatch, RuleConditions, RuleProbe, RuleValidationError, ScoreRange, ScoreTier,
};
pub use domain::{
    Activity, Assignment, AssignmentId, AssignmentStatus, EngagementEvent, Lead,
    LeadClassification, LeadId, LeadIntake, LeadMetadata, LeadStatus, RepId, Representative,
    RuleId,
};
pub use repository::{
    LeadAlert, LeadNotifier, LeadRepository, LeadView, NotifyError, RepositoryError,
};
pub use router::lead_router;
pub use scoring::{
    InsightBudget, InsightError, InsightGeneration, InsightModel, InsightPrompt, LeadScorer,
    ModelAssistedScorer, NoInsightModel, RuleBasedScorer, ScoreBreakdown, ScoreFactor,
    ScoreHistory, ScoreOrigin, ScoreReport, ScoreSnapshot, ScoringConfig, ScoringError,
    ScoringPolicy,
};
pub use service::{
    ActivitySubmission, EventSubmission, LeadPipelineService, PipelineError, PipelineOutcome,
    RuleDraft,
};
