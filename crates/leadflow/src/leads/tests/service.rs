use chrono::Duration;

use super::common::{build_service, intake, now, rep};
use crate::leads::assignment::{AssignmentLogic, RuleConditions};
use crate::leads::domain::{LeadId, RepId};
use crate::leads::repository::RepositoryError;
use crate::leads::service::{ActivitySubmission, PipelineError, RuleDraft};

fn activity_submission(activity_type: &str) -> ActivitySubmission {
    ActivitySubmission {
        activity_type: activity_type.to_string(),
        points_awarded: 0,
        notes: None,
        occurred_at: None,
    }
}

fn round_robin_draft(name: &str, reps: &[&str]) -> RuleDraft {
    RuleDraft {
        name: name.to_string(),
        priority: 5,
        active: true,
        conditions: RuleConditions::default(),
        logic: AssignmentLogic::RoundRobin {
            reps: reps.iter().map(|id| RepId(id.to_string())).collect(),
            last_index: None,
            last_assigned: None,
            max_leads_per_rep: None,
        },
    }
}

#[test]
fn create_lead_scores_and_records_history() {
    let (service, repository, _notifier) = build_service();

    let outcome = service.create_lead(intake(), now()).expect("lead created");

    assert!(outcome.scored);
    assert_eq!(outcome.lead.score, 26);
    assert_eq!(outcome.lead.classification, "cold");
    assert_eq!(repository.snapshot_count(&outcome.lead.lead_id), 1);

    let history = service.history(&outcome.lead.lead_id).expect("history loads");
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].old_score, 0);
    assert_eq!(history[0].new_score, 26);
    assert_eq!(history[0].triggered_by, "lead_created");
}

#[test]
fn rescore_with_unchanged_inputs_appends_no_history() {
    let (service, repository, _notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.clone();

    let outcome = service
        .rescore(&lead_id, now() + Duration::minutes(5))
        .expect("rescore runs");

    assert!(outcome.scored);
    assert_eq!(outcome.lead.score, 26);
    // A snapshot lands on every run, a history row only on change.
    assert_eq!(repository.snapshot_count(&lead_id), 2);
    assert_eq!(service.history(&lead_id).expect("history loads").len(), 1);
}

#[test]
fn activity_moves_the_score_and_extends_history() {
    let (service, _repository, _notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.clone();

    let outcome = service
        .record_activity(&lead_id, activity_submission("email_open"), now())
        .expect("activity recorded");

    // 3 for the open plus the fresh-touch recency bonus.
    assert_eq!(outcome.lead.score, 37);

    let history = service.history(&lead_id).expect("history loads");
    assert_eq!(history.len(), 2);
    assert_eq!(history[1].old_score, 26);
    assert_eq!(history[1].new_score, 37);
    assert_eq!(history[1].triggered_by, "activity:email_open");
}

#[test]
fn hot_transition_publishes_an_alert() {
    let (service, _repository, notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.clone();

    for signal in [
        "email_open",
        "email_open",
        "email_open",
        "email_open",
        "email_open",
        "website_visit",
        "website_visit",
        "pricing_page_view",
        "trade_in_calculator",
        "finance_calculator",
        "test_drive_request",
    ] {
        service
            .record_activity(&lead_id, activity_submission(signal), now())
            .expect("activity recorded");
    }

    let view = service.lead_view(&lead_id).expect("view loads");
    assert_eq!(view.classification, "hot");
    assert!(notifier
        .events()
        .iter()
        .any(|alert| alert.template == "lead_became_hot" && alert.lead_id == lead_id));
}

#[test]
fn new_lead_is_auto_assigned_when_a_rule_matches() {
    let (service, repository, notifier) = build_service();
    repository.add_representative(rep("rep-a"));
    repository.add_representative(rep("rep-b"));
    service
        .create_rule(round_robin_draft("inbound rotation", &["rep-a", "rep-b"]), now())
        .expect("rule created");

    let first = service.create_lead(intake(), now()).expect("lead created");
    let second = service.create_lead(intake(), now()).expect("lead created");

    assert_eq!(first.assigned_to, Some(RepId("rep-a".to_string())));
    assert_eq!(second.assigned_to, Some(RepId("rep-b".to_string())));
    assert!(notifier
        .events()
        .iter()
        .any(|alert| alert.template == "lead_assigned"));
}

#[test]
fn create_rule_rejects_unknown_representatives() {
    let (service, _repository, _notifier) = build_service();

    let err = service
        .create_rule(round_robin_draft("ghost rotation", &["rep-ghost"]), now())
        .expect_err("unknown rep rejected");
    assert!(matches!(err, PipelineError::Validation(_)));
}

#[test]
fn apply_rule_assigns_and_notifies() {
    let (service, repository, notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");
    let lead_id = created.lead.lead_id.clone();
    assert!(created.assigned_to.is_none());

    repository.add_representative(rep("rep-a"));
    let rule = service
        .create_rule(round_robin_draft("manual push", &["rep-a"]), now())
        .expect("rule created");

    let assignment = service
        .apply_rule(&rule.id, &lead_id, now())
        .expect("apply assigns");
    assert_eq!(assignment.rep_id, RepId("rep-a".to_string()));
    assert_eq!(assignment.rule_id, Some(rule.id.clone()));
    assert!(notifier
        .events()
        .iter()
        .any(|alert| alert.template == "lead_assigned" && alert.lead_id == lead_id));
}

#[test]
fn probe_rule_leaves_no_trace() {
    let (service, repository, _notifier) = build_service();
    let created = service.create_lead(intake(), now()).expect("lead created");

    repository.add_representative(rep("rep-a"));
    let rule = service
        .create_rule(round_robin_draft("dry run", &["rep-a"]), now())
        .expect("rule created");

    let probe = service
        .probe_rule(&rule.id, &created.lead.lead_id, now())
        .expect("probe runs");
    assert!(probe.matched);
    assert_eq!(probe.candidate, Some(RepId("rep-a".to_string())));
    assert!(repository.assignments().is_empty());
}

#[test]
fn unknown_lead_is_reported_as_not_found() {
    let (service, _repository, _notifier) = build_service();
    let missing = LeadId("lead-missing".to_string());

    let err = service
        .record_activity(&missing, activity_submission("email_open"), now())
        .expect_err("missing lead rejected");
    assert!(matches!(
        err,
        PipelineError::Repository(RepositoryError::NotFound)
    ));

    assert!(service.lead_view(&missing).is_err());
    assert!(service.history(&missing).is_err());
}
