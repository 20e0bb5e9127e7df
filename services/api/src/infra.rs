use metrics_exporter_prometheus::PrometheusHandle;
use std::collections::HashMap;
use std::sync::atomic::AtomicBool;
use std::sync::{Arc, Mutex};
use tracing::info;

use leadflow::leads::{
    Activity, Assignment, AssignmentRule, AssignmentStatus, EngagementEvent, Lead, LeadAlert,
    LeadId, LeadNotifier, LeadRepository, NotifyError, RepId, Representative, RepositoryError,
    RuleId, ScoreHistory, ScoreSnapshot,
};

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) readiness: Arc<AtomicBool>,
    pub(crate) metrics: Arc<PrometheusHandle>,
}

#[derive(Default)]
struct Store {
    leads: HashMap<LeadId, Lead>,
    activities: Vec<Activity>,
    events: Vec<EngagementEvent>,
    snapshots: Vec<ScoreSnapshot>,
    history: Vec<ScoreHistory>,
    rules: HashMap<RuleId, AssignmentRule>,
    assignments: Vec<Assignment>,
    representatives: HashMap<RepId, Representative>,
}

/// Process-local persistence. One mutex guards the whole store, which gives
/// `insert_assignment` the all-or-nothing commit the engine relies on.
#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadRepository {
    store: Arc<Mutex<Store>>,
}

impl InMemoryLeadRepository {
    pub(crate) fn seed_representatives(&self, reps: Vec<Representative>) {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        for rep in reps {
            guard.representatives.insert(rep.id.clone(), rep);
        }
    }
}

impl LeadRepository for InMemoryLeadRepository {
    fn insert_lead(&self, lead: Lead) -> Result<Lead, RepositoryError> {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        if guard.leads.contains_key(&lead.id) {
            return Err(RepositoryError::Conflict);
        }
        guard.leads.insert(lead.id.clone(), lead.clone());
        Ok(lead)
    }

    fn update_lead(&self, lead: Lead) -> Result<(), RepositoryError> {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        if guard.leads.contains_key(&lead.id) {
            guard.leads.insert(lead.id.clone(), lead);
            Ok(())
        } else {
            Err(RepositoryError::NotFound)
        }
    }

    fn fetch_lead(&self, id: &LeadId) -> Result<Option<Lead>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard.leads.get(id).cloned())
    }

    fn append_activity(&self, activity: Activity) -> Result<(), RepositoryError> {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        guard.activities.push(activity);
        Ok(())
    }

    fn activities_for(&self, id: &LeadId) -> Result<Vec<Activity>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard
            .activities
            .iter()
            .filter(|activity| &activity.lead_id == id)
            .cloned()
            .collect())
    }

    fn append_event(&self, event: EngagementEvent) -> Result<(), RepositoryError> {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        guard.events.push(event);
        Ok(())
    }

    fn events_for(&self, id: &LeadId) -> Result<Vec<EngagementEvent>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard
            .events
            .iter()
            .filter(|event| &event.lead_id == id)
            .cloned()
            .collect())
    }

    fn append_snapshot(&self, snapshot: ScoreSnapshot) -> Result<(), RepositoryError> {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        guard.snapshots.push(snapshot);
        Ok(())
    }

    fn latest_snapshot(&self, id: &LeadId) -> Result<Option<ScoreSnapshot>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard
            .snapshots
            .iter()
            .filter(|snapshot| &snapshot.lead_id == id)
            .last()
            .cloned())
    }

    fn append_history(&self, entry: ScoreHistory) -> Result<(), RepositoryError> {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        guard.history.push(entry);
        Ok(())
    }

    fn history_for(&self, id: &LeadId) -> Result<Vec<ScoreHistory>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard
            .history
            .iter()
            .filter(|entry| &entry.lead_id == id)
            .cloned()
            .collect())
    }

    fn insert_rule(&self, rule: AssignmentRule) -> Result<AssignmentRule, RepositoryError> {
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        guard.rules.insert(rule.id.clone(), rule.clone());
        Ok(rule)
    }

    fn fetch_rule(&self, id: &RuleId) -> Result<Option<AssignmentRule>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard.rules.get(id).cloned())
    }

    fn assignment_rules(&self) -> Result<Vec<AssignmentRule>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard.rules.values().cloned().collect())
    }

    fn active_assignment(&self, id: &LeadId) -> Result<Option<Assignment>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard
            .assignments
            .iter()
            .find(|assignment| {
                &assignment.lead_id == id && assignment.status == AssignmentStatus::Active
            })
            .cloned())
    }

    fn active_assignment_count(&self, rep: &RepId) -> Result<usize, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard
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
        let mut guard = self.store.lock().expect("repository mutex poisoned");
        let taken = guard.assignments.iter().any(|existing| {
            existing.lead_id == assignment.lead_id && existing.status == AssignmentStatus::Active
        });
        if taken {
            return Err(RepositoryError::Conflict);
        }
        guard.assignments.push(assignment.clone());
        if let Some(rule) = rule_state {
            guard.rules.insert(rule.id.clone(), rule);
        }
        Ok(assignment)
    }

    fn fetch_representative(&self, id: &RepId) -> Result<Option<Representative>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        Ok(guard.representatives.get(id).cloned())
    }

    fn representatives_with_role(
        &self,
        role: &str,
    ) -> Result<Vec<Representative>, RepositoryError> {
        let guard = self.store.lock().expect("repository mutex poisoned");
        let mut reps: Vec<Representative> = guard
            .representatives
            .values()
            .filter(|rep| rep.active && rep.role == role)
            .cloned()
            .collect();
        reps.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(reps)
    }
}

/// Notifier logging alerts and retaining them for inspection. A production
/// deployment swaps this for an email/CRM bridge behind the same trait.
#[derive(Default, Clone)]
pub(crate) struct InMemoryLeadNotifier {
    alerts: Arc<Mutex<Vec<LeadAlert>>>,
}

impl LeadNotifier for InMemoryLeadNotifier {
    fn publish(&self, alert: LeadAlert) -> Result<(), NotifyError> {
        info!(
            template = %alert.template,
            lead_id = %alert.lead_id.0,
            "lead alert published"
        );
        let mut guard = self.alerts.lock().expect("alert mutex poisoned");
        guard.push(alert);
        Ok(())
    }
}

impl InMemoryLeadNotifier {
    #[cfg(test)]
    pub(crate) fn alerts(&self) -> Vec<LeadAlert> {
        self.alerts.lock().expect("alert mutex poisoned").clone()
    }
}

/// Demo sales directory for the in-memory deployment.
pub(crate) fn seed_directory() -> Vec<Representative> {
    ["alicia", "ben", "carmen"]
        .into_iter()
        .map(|name| Representative {
            id: RepId(format!("rep-{name}")),
            name: {
                let mut chars = name.chars();
                let first = chars.next().map(|c| c.to_ascii_uppercase()).unwrap_or('?');
                format!("{first}{}", chars.as_str())
            },
            role: "sales_rep".to_string(),
            active: true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use leadflow::leads::{LeadAlert, LeadId, LeadNotifier};

    use super::InMemoryLeadNotifier;

    #[test]
    fn published_alerts_are_retained_for_inspection() {
        let notifier = InMemoryLeadNotifier::default();
        let alert = LeadAlert {
            template: "lead_hot".to_string(),
            lead_id: LeadId("lead-42".to_string()),
            details: BTreeMap::from([("score".to_string(), "88".to_string())]),
        };

        notifier.publish(alert.clone()).expect("publish succeeds");

        assert_eq!(notifier.alerts(), vec![alert]);
    }
}
