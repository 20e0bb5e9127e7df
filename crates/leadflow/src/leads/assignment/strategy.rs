use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::super::domain::{Lead, RepId};

/// Strategy-specific payload of an assignment rule. The serde tag makes a
/// declared-type/payload mismatch unrepresentable at deserialization time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AssignmentLogic {
    /// Rotating cursor over a fixed candidate list. `last_index` and
    /// `last_assigned` are mutable rotation state owned by the engine.
    RoundRobin {
        reps: Vec<RepId>,
        #[serde(default)]
        last_index: Option<usize>,
        #[serde(default)]
        last_assigned: Option<RepId>,
        #[serde(default)]
        max_leads_per_rep: Option<usize>,
    },
    /// Normalized location lookup with a flat fallback list; min-load
    /// selection, not rotation.
    Territory {
        territories: BTreeMap<String, Vec<RepId>>,
        #[serde(default)]
        fallback_reps: Vec<RepId>,
        #[serde(default)]
        max_leads_per_rep: Option<usize>,
    },
    /// Min-load selection over a flat list, defaulting to every active rep
    /// carrying `role` when the list is empty.
    Workload {
        #[serde(default)]
        reps: Vec<RepId>,
        #[serde(default)]
        role: Option<String>,
        #[serde(default)]
        max_leads_per_rep: Option<usize>,
    },
    /// First tier containing the current score wins; min-load within it,
    /// with a separate fallback list when no tier matches or the tier is
    /// saturated.
    ScoreBased {
        tiers: Vec<ScoreTier>,
        #[serde(default)]
        fallback_reps: Vec<RepId>,
        #[serde(default)]
        max_leads_per_rep: Option<usize>,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreTier {
    pub min_score: u8,
    pub max_score: u8,
    pub reps: Vec<RepId>,
}

impl AssignmentLogic {
    pub const fn rule_type(&self) -> &'static str {
        match self {
            AssignmentLogic::RoundRobin { .. } => "round_robin",
            AssignmentLogic::Territory { .. } => "territory",
            AssignmentLogic::Workload { .. } => "workload",
            AssignmentLogic::ScoreBased { .. } => "score_based",
        }
    }

    pub fn max_leads_per_rep(&self) -> Option<usize> {
        match self {
            AssignmentLogic::RoundRobin {
                max_leads_per_rep, ..
            }
            | AssignmentLogic::Territory {
                max_leads_per_rep, ..
            }
            | AssignmentLogic::Workload {
                max_leads_per_rep, ..
            }
            | AssignmentLogic::ScoreBased {
                max_leads_per_rep, ..
            } => *max_leads_per_rep,
        }
    }

    /// Every representative id the payload can hand a lead to, for admin
    /// validation and load prefetching.
    pub fn referenced_reps(&self) -> Vec<RepId> {
        let mut reps = match self {
            AssignmentLogic::RoundRobin { reps, .. } => reps.clone(),
            AssignmentLogic::Territory {
                territories,
                fallback_reps,
                ..
            } => {
                let mut reps: Vec<RepId> = territories.values().flatten().cloned().collect();
                reps.extend(fallback_reps.iter().cloned());
                reps
            }
            AssignmentLogic::Workload { reps, .. } => reps.clone(),
            AssignmentLogic::ScoreBased {
                tiers,
                fallback_reps,
                ..
            } => {
                let mut reps: Vec<RepId> =
                    tiers.iter().flat_map(|tier| tier.reps.iter().cloned()).collect();
                reps.extend(fallback_reps.iter().cloned());
                reps
            }
        };
        reps.sort();
        reps.dedup();
        reps
    }

    /// Whether the payload can name any candidate at all. Workload rules may
    /// leave the list empty and rely on the role default.
    pub fn has_candidate_material(&self) -> bool {
        match self {
            AssignmentLogic::RoundRobin { reps, .. } => !reps.is_empty(),
            AssignmentLogic::Territory {
                territories,
                fallback_reps,
                ..
            } => territories.values().any(|reps| !reps.is_empty()) || !fallback_reps.is_empty(),
            AssignmentLogic::Workload { .. } => true,
            AssignmentLogic::ScoreBased {
                tiers,
                fallback_reps,
                ..
            } => tiers.iter().any(|tier| !tier.reps.is_empty()) || !fallback_reps.is_empty(),
        }
    }
}

/// Active-assignment load per candidate plus the role-default list, fetched
/// by the engine before selection so the strategy math stays pure.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    pub loads: BTreeMap<RepId, usize>,
    pub role_default: Vec<RepId>,
}

impl CandidatePool {
    fn load(&self, rep: &RepId) -> usize {
        self.loads.get(rep).copied().unwrap_or(0)
    }

    fn eligible(&self, rep: &RepId, cap: Option<usize>) -> bool {
        match cap {
            Some(cap) => self.load(rep) < cap,
            None => true,
        }
    }
}

/// Candidate resolved by a strategy, plus the rotation advance a round-robin
/// pick requires. The advance is only applied when the assignment commits.
#[derive(Debug, Clone, PartialEq)]
pub struct Pick {
    pub rep: RepId,
    pub rotation: Option<RotationAdvance>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RotationAdvance {
    pub last_index: usize,
    pub last_assigned: RepId,
}

/// Resolve a candidate for a matching rule. Pure: rotation state is returned
/// in the pick, never written here. `None` is the normal no-match outcome.
pub fn select_candidate(
    logic: &AssignmentLogic,
    lead: &Lead,
    pool: &CandidatePool,
) -> Option<Pick> {
    let cap = logic.max_leads_per_rep();
    match logic {
        AssignmentLogic::RoundRobin {
            reps, last_index, ..
        } => {
            if reps.is_empty() {
                return None;
            }
            let start = last_index.map(|index| (index + 1) % reps.len()).unwrap_or(0);
            for offset in 0..reps.len() {
                let index = (start + offset) % reps.len();
                let rep = &reps[index];
                if pool.eligible(rep, cap) {
                    return Some(Pick {
                        rep: rep.clone(),
                        rotation: Some(RotationAdvance {
                            last_index: index,
                            last_assigned: rep.clone(),
                        }),
                    });
                }
            }
            None
        }
        AssignmentLogic::Territory {
            territories,
            fallback_reps,
            ..
        } => {
            let location = lead
                .location
                .as_deref()
                .map(|location| location.trim().to_lowercase());
            let territory_reps = location.as_deref().and_then(|location| {
                territories
                    .iter()
                    .find(|(territory, _)| territory.trim().eq_ignore_ascii_case(location))
                    .map(|(_, reps)| reps.as_slice())
            });
            let candidates = territory_reps.unwrap_or(fallback_reps.as_slice());
            min_load(candidates, pool, cap)
        }
        AssignmentLogic::Workload { reps, .. } => {
            let candidates = if reps.is_empty() {
                pool.role_default.as_slice()
            } else {
                reps.as_slice()
            };
            min_load(candidates, pool, cap)
        }
        AssignmentLogic::ScoreBased {
            tiers,
            fallback_reps,
            ..
        } => {
            let tier = tiers
                .iter()
                .find(|tier| lead.current_score >= tier.min_score && lead.current_score <= tier.max_score);
            tier.and_then(|tier| min_load(&tier.reps, pool, cap))
                .or_else(|| min_load(fallback_reps, pool, cap))
        }
    }
}

/// Fewest active assignments wins; ties broken by lexicographic rep id so
/// selection is stable across runs.
fn min_load(candidates: &[RepId], pool: &CandidatePool, cap: Option<usize>) -> Option<Pick> {
    candidates
        .iter()
        .filter(|rep| pool.eligible(rep, cap))
        .min_by(|a, b| pool.load(a).cmp(&pool.load(b)).then_with(|| a.0.cmp(&b.0)))
        .map(|rep| Pick {
            rep: rep.clone(),
            rotation: None,
        })
}
