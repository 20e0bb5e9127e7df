//! Assignment engine: ordered rule scan, condition matching, and four
//! candidate-resolution strategies with rotation/workload state.

mod conditions;
mod strategy;

pub use conditions::{HoursWindow, MetadataMatch, RuleConditions, ScoreRange};
pub use strategy::{
    select_candidate, AssignmentLogic, CandidatePool, Pick, RotationAdvance, ScoreTier,
};

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::domain::{
    Assignment, AssignmentId, AssignmentStatus, Lead, RepId, RuleId,
};
use super::repository::{LeadRepository, RepositoryError};

/// Administrator-defined routing policy. Higher priority rules are evaluated
/// first; the engine itself mutates `logic` only to advance round-robin
/// rotation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentRule {
    pub id: RuleId,
    pub name: String,
    /// 1-10, higher evaluated first.
    pub priority: u8,
    pub active: bool,
    #[serde(default)]
    pub conditions: RuleConditions,
    pub logic: AssignmentLogic,
    pub created_at: DateTime<Utc>,
}

impl AssignmentRule {
    /// Structural checks enforced at write time, before any directory
    /// lookups.
    pub fn validate(&self) -> Result<(), RuleValidationError> {
        if !(1..=10).contains(&self.priority) {
            return Err(RuleValidationError::PriorityOutOfRange(self.priority));
        }
        if !self.logic.has_candidate_material() {
            return Err(RuleValidationError::NoCandidates);
        }
        if let AssignmentLogic::ScoreBased { tiers, .. } = &self.logic {
            for tier in tiers {
                if tier.min_score > tier.max_score {
                    return Err(RuleValidationError::InvalidTier {
                        min: tier.min_score,
                        max: tier.max_score,
                    });
                }
            }
        }
        Ok(())
    }

    fn with_rotation(&self, advance: &RotationAdvance) -> Option<Self> {
        let AssignmentLogic::RoundRobin {
            reps,
            max_leads_per_rep,
            ..
        } = &self.logic
        else {
            return None;
        };
        let mut advanced = self.clone();
        advanced.logic = AssignmentLogic::RoundRobin {
            reps: reps.clone(),
            last_index: Some(advance.last_index),
            last_assigned: Some(advance.last_assigned.clone()),
            max_leads_per_rep: *max_leads_per_rep,
        };
        Some(advanced)
    }
}

/// Validation failures surfaced by the rule administration surface.
#[derive(Debug, thiserror::Error)]
pub enum RuleValidationError {
    #[error("priority {0} outside 1-10")]
    PriorityOutOfRange(u8),
    #[error("rule names no candidate representatives")]
    NoCandidates,
    #[error("tier range {min}-{max} is inverted")]
    InvalidTier { min: u8, max: u8 },
    #[error("representative {} does not exist", .0 .0)]
    UnknownRepresentative(RepId),
    #[error("representative {} is inactive or not assignable", .0 .0)]
    IneligibleRepresentative(RepId),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Outcome of the pure single-rule probe.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleProbe {
    pub matched: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate: Option<RepId>,
}

/// Structured failure for the single-rule apply entry point. Unlike
/// `resolve`, apply never falls through to other rules.
#[derive(Debug, thiserror::Error)]
pub enum ApplyError {
    #[error("rule is inactive")]
    RuleInactive,
    #[error("lead already has an active assignment")]
    AlreadyAssigned,
    #[error("rule conditions did not match")]
    ConditionsNotMet,
    #[error("no eligible representative")]
    NoEligibleRepresentative,
    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Engine-level settings. The assignable role bounds the workload default
/// pool and the admin-side representative check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssignmentConfig {
    pub assignable_role: String,
}

impl Default for AssignmentConfig {
    fn default() -> Self {
        Self {
            assignable_role: "sales_rep".to_string(),
        }
    }
}

static ASSIGNMENT_SEQUENCE: AtomicU64 = AtomicU64::new(1);

fn next_assignment_id() -> AssignmentId {
    let id = ASSIGNMENT_SEQUENCE.fetch_add(1, Ordering::Relaxed);
    AssignmentId(format!("asg-{id:06}"))
}

/// Evaluates assignment rules against a lead and records the winning
/// decision. Rotation state is committed atomically with the assignment it
/// produced.
pub struct AssignmentEngine<R> {
    repository: Arc<R>,
    config: AssignmentConfig,
}

impl<R> AssignmentEngine<R>
where
    R: LeadRepository,
{
    pub fn new(repository: Arc<R>, config: AssignmentConfig) -> Self {
        Self { repository, config }
    }

    /// Full priority scan. An existing active assignment short-circuits to a
    /// no-op; a matching rule with no eligible candidate falls through to the
    /// next rule.
    pub fn resolve(
        &self,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Option<Assignment>, RepositoryError> {
        if self.repository.active_assignment(&lead.id)?.is_some() {
            return Ok(None);
        }

        let mut rules = self.repository.assignment_rules()?;
        rules.retain(|rule| rule.active);
        rules.sort_by(|a, b| {
            b.priority
                .cmp(&a.priority)
                .then_with(|| a.created_at.cmp(&b.created_at))
        });

        for rule in &rules {
            if !rule.conditions.matches(lead, now) {
                continue;
            }
            match self.try_rule(rule, lead, now)? {
                RuleAttempt::Assigned(assignment) => return Ok(Some(assignment)),
                RuleAttempt::LeadTaken => return Ok(None),
                RuleAttempt::NoCandidate => continue,
            }
        }

        Ok(None)
    }

    /// Pure single-rule evaluation: reports whether conditions match and who
    /// would be picked, without advancing rotation or writing anything.
    pub fn probe(
        &self,
        rule: &AssignmentRule,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<RuleProbe, RepositoryError> {
        if !rule.active || !rule.conditions.matches(lead, now) {
            return Ok(RuleProbe {
                matched: false,
                candidate: None,
            });
        }

        let pool = self.pool_for(&rule.logic)?;
        Ok(RuleProbe {
            matched: true,
            candidate: select_candidate(&rule.logic, lead, &pool).map(|pick| pick.rep),
        })
    }

    /// Mutating single-rule evaluation, bypassing the priority scan.
    pub fn apply(
        &self,
        rule: &AssignmentRule,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<Assignment, ApplyError> {
        if !rule.active {
            return Err(ApplyError::RuleInactive);
        }
        if self.repository.active_assignment(&lead.id)?.is_some() {
            return Err(ApplyError::AlreadyAssigned);
        }
        if !rule.conditions.matches(lead, now) {
            return Err(ApplyError::ConditionsNotMet);
        }

        match self.try_rule(rule, lead, now)? {
            RuleAttempt::Assigned(assignment) => Ok(assignment),
            RuleAttempt::LeadTaken => Err(ApplyError::AlreadyAssigned),
            RuleAttempt::NoCandidate => Err(ApplyError::NoEligibleRepresentative),
        }
    }

    /// Directory-backed rule validation: every referenced representative must
    /// be an active holder of the assignable role. The engine assumes this
    /// precondition at evaluation time.
    pub fn validate_rule(&self, rule: &AssignmentRule) -> Result<(), RuleValidationError> {
        rule.validate()?;
        for rep in rule.logic.referenced_reps() {
            let record = self
                .repository
                .fetch_representative(&rep)?
                .ok_or_else(|| RuleValidationError::UnknownRepresentative(rep.clone()))?;
            if !record.active || record.role != self.config.assignable_role {
                return Err(RuleValidationError::IneligibleRepresentative(rep));
            }
        }
        Ok(())
    }

    fn try_rule(
        &self,
        rule: &AssignmentRule,
        lead: &Lead,
        now: DateTime<Utc>,
    ) -> Result<RuleAttempt, RepositoryError> {
        // One optimistic retry: re-read loads, re-check eligibility, give up
        // if the lead was taken by a concurrent resolution.
        for attempt in 0..2 {
            let pool = self.pool_for(&rule.logic)?;
            let Some(pick) = select_candidate(&rule.logic, lead, &pool) else {
                return Ok(RuleAttempt::NoCandidate);
            };

            let assignment = Assignment {
                id: next_assignment_id(),
                lead_id: lead.id.clone(),
                rep_id: pick.rep.clone(),
                rule_id: Some(rule.id.clone()),
                status: AssignmentStatus::Active,
                is_primary: true,
                assigned_at: now,
            };
            let rule_state = pick
                .rotation
                .as_ref()
                .and_then(|advance| rule.with_rotation(advance));

            match self.repository.insert_assignment(assignment, rule_state) {
                Ok(stored) => {
                    debug!(
                        lead_id = %lead.id.0,
                        rep_id = %stored.rep_id.0,
                        rule = %rule.name,
                        "lead assigned"
                    );
                    return Ok(RuleAttempt::Assigned(stored));
                }
                Err(RepositoryError::Conflict) => {
                    if self.repository.active_assignment(&lead.id)?.is_some() {
                        return Ok(RuleAttempt::LeadTaken);
                    }
                    if attempt == 0 {
                        continue;
                    }
                    return Ok(RuleAttempt::NoCandidate);
                }
                Err(other) => return Err(other),
            }
        }
        Ok(RuleAttempt::NoCandidate)
    }

    fn pool_for(&self, logic: &AssignmentLogic) -> Result<CandidatePool, RepositoryError> {
        let mut pool = CandidatePool::default();

        if let AssignmentLogic::Workload { reps, role, .. } = logic {
            if reps.is_empty() {
                let role = role.as_deref().unwrap_or(&self.config.assignable_role);
                pool.role_default = self
                    .repository
                    .representatives_with_role(role)?
                    .into_iter()
                    .map(|rep| rep.id)
                    .collect();
            }
        }

        for rep in logic
            .referenced_reps()
            .into_iter()
            .chain(pool.role_default.iter().cloned())
        {
            let load = self.repository.active_assignment_count(&rep)?;
            pool.loads.insert(rep, load);
        }

        Ok(pool)
    }
}

enum RuleAttempt {
    Assigned(Assignment),
    LeadTaken,
    NoCandidate,
}
