use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

use axum::response::Response;
use chrono::{DateTime, Duration, TimeZone, Utc};
use serde_json::Value;

use crate::leads::assignment::{AssignmentConfig, AssignmentEngine, AssignmentRule};
use crate::leads::domain::{
    Activity, Assignment, AssignmentStatus, EngagementEvent, Lead, LeadId, LeadIntake,
    LeadMetadata, RepId, Representative, RuleId,
};
use crate::leads::repository::{
    LeadAlert, LeadNotifier, LeadRepository, NotifyError, RepositoryError,
};
use crate::leads::scoring::{
    InsightError, InsightGeneration, InsightModel, InsightPrompt, ScoreHistory, ScoreSnapshot,
    ScoringConfig,
};
use crate::leads::service::LeadPipelineService;

/// Wednesday 15:00 UTC, inside common business-hours windows.
pub(super) fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 4, 15, 0, 0).single().expect("valid timestamp")
}

pub(super) fn scoring_config() -> ScoringConfig {
    ScoringConfig::default()
}

pub(super) fn intake() -> LeadIntake {
    LeadIntake {
        first_name: "Jordan".to_string(),
        last_name: "Avery".to_string(),
        email: "jordan.avery@example.com".to_string(),
        phone: Some("+1-515-555-0142".to_string()),
        source: "referral".to_string(),
        location: Some("Des Moines".to_string()),
        metadata: LeadMetadata {
            budget_min: Some(20_000),
            budget_max: Some(30_000),
            product_interest: Some("crossover".to_string()),
            intake_notes: None,
            tags: BTreeMap::new(),
        },
        created_by: None,
    }
}

pub(super) fn lead(id: &str) -> Lead {
    Lead::from_intake(LeadId(format!("lead-{id}")), intake(), now() - Duration::days(2))
}

pub(super) fn activity(lead: &Lead, activity_type: &str, age_hours: i64) -> Activity {
    Activity {
        lead_id: lead.id.clone(),
        activity_type: activity_type.to_string(),
        points_awarded: 0,
        notes: None,
        occurred_at: now() - Duration::hours(age_hours),
    }
}

pub(super) fn event(lead: &Lead, event_type: &str, age_hours: i64) -> EngagementEvent {
    EngagementEvent {
        lead_id: lead.id.clone(),
        event_type: event_type.to_string(),
        payload: BTreeMap::new(),
        occurred_at: now() - Duration::hours(age_hours),
    }
}

pub(super) fn rep(id: &str) -> Representative {
    Representative {
        id: RepId(id.to_string()),
        name: format!("Rep {id}"),
        role: "sales_rep".to_string(),
        active: true,
    }
}

#[derive(Default)]
struct MemoryState {
    leads: HashMap<LeadId, Lead>,
    activities: Vec<Activity>,
    events: Vec<EngagementEvent>,
    snapshots: Vec<ScoreSnapshot>,
    history: Vec<ScoreHistory>,
    rules: HashMap<RuleId, AssignmentRule>,
    assignments: Vec<Assignment>,
    reps: HashMap<RepId, Representative>,
}

/// Single-mutex store standing in for the transactional persistence
/// collaborator; `insert_assignment` commits the assignment and rotation
/// state under one lock.
#[derive(Default, Clone)]
pub(super) struct MemoryRepository {
    state: Arc<Mutex<MemoryState>>,
}

impl MemoryRepository {
    pub(super) fn add_representative(&self, rep: Representative) {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.reps.insert(rep.id.clone(), rep);
    }

    pub(super) fn snapshot_count(&self, id: &LeadId) -> usize {
        let state = self.state.lock().expect("repository mutex poisoned");
        state
            .snapshots
            .iter()
            .filter(|snapshot| &snapshot.lead_id == id)
            .count()
    }

    pub(super) fn assignments(&self) -> Vec<Assignment> {
        let state = self.state.lock().expect("repository mutex poisoned");
        state.assignments.clone()
    }

    pub(super) fn rule(&self, id: &RuleId) -> Option<AssignmentRule> {
        let state = self.state.lock().expect("repository mutex poisoned");
        state.rules.get(id).cloned()
    }
}

impl LeadRepository for MemoryRepository {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if state.leads.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        state.leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn update_lead(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        if !state.leads.contains_key(&lead.id) {
            return Err(RepositoryError::NotFound);
        }
        state.leads.insert(lead.id.clone(), lead);
        Ok(())
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.leads.get(id).cloned())
    }

    fn append_activity(&self, activity: Activity) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.activities.push(activity);
        Ok(())
    }

    fn activities_for(&self, id: &LeadId) -> Result<Vec<Activity>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .activities
            .iter()
            .filter(|activity| &activity.lead_id == id)
            .cloned()
            .collect())
    }

    fn append_event(&self, event: EngagementEvent) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.events.push(event);
        Ok(())
    }

    fn events_for(&self, id: &LeadId) -> Result<Vec<EngagementEvent>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .events
            .iter()
            .filter(|event| &event.lead_id == id)
            .cloned()
            .collect())
    }

    fn append_snapshot(&self, snapshot: ScoreSnapshot) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.snapshots.push(snapshot);
        Ok(())
    }

    fn latest_snapshot(&self, id: &LeadId) -> Result<Option<ScoreSnapshot>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .snapshots
            .iter()
            .filter(|snapshot| &snapshot.lead_id == id)
            .last()
            .cloned())
    }

    fn append_history(&self, entry: ScoreHistory) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.history.push(entry);
        Ok(())
    }

    fn history_for(&self, id: &LeadId) -> Result<Vec<ScoreHistory>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .history
            .iter()
            .filter(|entry| &entry.lead_id == id)
            .cloned()
            .collect())
    }

    fn insert_rule(&self, rule: AssignmentRule) -> Result<AssignmentRule, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        state.rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    fn fetch_rule(&self, id: &RuleId) -> Result<Option<AssignmentRule>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.rules.get(id).cloned())
    }

    fn assignment_rules(&self) -> Result<Vec<AssignmentRule>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.rules.values().cloned().collect())
    }

    fn active_assignment(&self, id: &LeadId) -> Result<Option<Assignment>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .assignments
            .iter()
            .find(|assignment| {
                &assignment.lead_id == id && assignment.status == AssignmentStatus::Active
            })
            .cloned())
    }

    fn active_assignment_count(&self, rep: &RepId) -> Result<usize, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state
            .assignments
            .iter()
            .filter(|assignment| {
                &assignment.rep_id == rep && assignment.status == AssignmentStatus::Active
            })
            .count())
    }

    fn insert_assignment(
        &self,
        assignment: Assignment,
        rule_state: Option<AssignmentRule>,
    ) -> Result<Assignment, RepositoryError> {
        let mut state = self.state.lock().expect("repository mutex poisoned");
        let taken = state.assignments.iter().any(|existing| {
            existing.lead_id == assignment.lead_id
                && existing.status == AssignmentStatus::Active
        });
        if taken {
            return Err(RepositoryError::Conflict);
        }
        state.assignments.push(assignment.clone());
        if let Some(rule) = rule_state {
            state.rules.insert(rule.id.clone(), rule);
        }
        Ok(assignment)
    }

    fn fetch_representative(&self, id: &RepId) -> Result<Option<Representative>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        Ok(state.reps.get(id).cloned())
    }

    fn representatives_with_role(
        &self,
        role: &str,
    ) -> Result<Vec<Representative>, RepositoryError> {
        let state = self.state.lock().expect("repository mutex poisoned");
        let mut reps: Vec<Representative> = state
            .reps
            .values()
            .filter(|rep| rep.active && rep.role == role)
            .cloned()
            .collect();
        reps.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(reps)
    }
}

#[derive(Default, Clone)]
pub(super) struct MemoryNotifier {
    events: Arc<Mutex<Vec<LeadAlert>>>,
}

impl MemoryNotifier {
    pub(super) fn events(&self) -> Vec<LeadAlert> {
        self.events.lock().expect("notifier mutex poisoned").clone()
    }
}

impl LeadNotifier for MemoryNotifier {
    fn publish(&self, alert: LeadAlert) -> Result<(), NotifyError> {
        self.events
            .lock()
            .expect("notifier mutex poisoned")
            .push(alert);
        Ok(())
    }
}

/// Model returning a fixed generation, for clamping/caching assertions.
pub(super) struct StaticInsightModel {
    pub(super) generation: InsightGeneration,
    pub(super) calls: Arc<Mutex<usize>>,
}

impl StaticInsightModel {
    pub(super) fn new(generation: InsightGeneration) -> Self {
        Self {
            generation,
            calls: Arc::new(Mutex::new(0)),
        }
    }

}

impl InsightModel for StaticInsightModel {
    fn generate(&self, _prompt: &InsightPrompt) -> Result<InsightGeneration, InsightError> {
        *self.calls.lock().expect("call counter mutex poisoned") += 1;
        Ok(self.generation.clone())
    }
}

/// Model that always fails at the transport layer.
pub(super) struct FailingInsightModel;

impl InsightModel for FailingInsightModel {
    fn generate(&self, _prompt: &InsightPrompt) -> Result<InsightGeneration, InsightError> {
        Err(InsightError::Transport("socket closed".to_string()))
    }
}

pub(super) fn generation(engagement: u8, buying: u8, demographic: u8) -> InsightGeneration {
    InsightGeneration {
        engagement,
        buying_signals: buying,
        demographic,
        overall: engagement.saturating_add(buying).saturating_add(demographic),
        tier_hint: "warm".to_string(),
        rationale: "steady engagement with clear budget".to_string(),
        insights: vec!["follow up within 24h".to_string()],
        tokens_used: 412,
    }
}

pub(super) fn build_service() -> (
    Arc<LeadPipelineService<MemoryRepository, MemoryNotifier, crate::leads::NoInsightModel>>,
    Arc<MemoryRepository>,
    Arc<MemoryNotifier>,
) {
    let repository = Arc::new(MemoryRepository::default());
    let notifier = Arc::new(MemoryNotifier::default());
    let service = Arc::new(LeadPipelineService::new(
        repository.clone(),
        notifier.clone(),
        scoring_config(),
        AssignmentConfig::default(),
    ));
    (service, repository, notifier)
}

pub(super) fn build_engine(
    repository: Arc<MemoryRepository>,
) -> AssignmentEngine<MemoryRepository> {
    AssignmentEngine::new(repository, AssignmentConfig::default())
}

pub(super) async fn read_json_body(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), 64 * 1024)
        .await
        .expect("read body");
    serde_json::from_slice(&body).expect("json payload")
}
