use chrono::Utc;
use clap::Args;
use std::path::PathBuf;

use leadflow::error::AppError;
use leadflow::leads::{Activity, Lead, LeadId, LeadIntake, RuleBasedScorer, ScoringConfig};

#[derive(Args, Debug)]
pub(crate) struct ScoreArgs {
    /// Path to a JSON lead intake payload
    #[arg(long)]
    pub(crate) intake: PathBuf,
    /// Activity types to count as already recorded (repeatable)
    #[arg(long = "activity")]
    pub(crate) activities: Vec<String>,
}

/// Offline scoring pass over an intake file, printing the full report so the
/// weight scheme can be inspected without standing up the service.
pub(crate) fn run_score_demo(args: ScoreArgs) -> Result<(), AppError> {
    let raw = std::fs::read_to_string(&args.intake)?;
    let intake: LeadIntake = serde_json::from_str(&raw).map_err(|err| {
        AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?;

    let now = Utc::now();
    let lead = Lead::from_intake(LeadId("lead-preview".to_string()), intake, now);
    let activities: Vec<Activity> = args
        .activities
        .iter()
        .map(|activity_type| Activity {
            lead_id: lead.id.clone(),
            activity_type: activity_type.clone(),
            points_awarded: 0,
            notes: None,
            occurred_at: now,
        })
        .collect();

    let scorer = RuleBasedScorer::new(ScoringConfig::default());
    let report = scorer.report(&lead, &activities, &[], now);

    let rendered = serde_json::to_string_pretty(&report).map_err(|err| {
        AppError::Io(std::io::Error::new(std::io::ErrorKind::InvalidData, err))
    })?;
    println!("{rendered}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use leadflow::leads::LeadMetadata;

    #[test]
    fn preview_report_matches_service_scoring() {
        let intake = LeadIntake {
            first_name: "Jordan".to_string(),
            last_name: "Avery".to_string(),
            email: "jordan.avery@example.com".to_string(),
            phone: None,
            source: "referral".to_string(),
            location: Some("Des Moines".to_string()),
            metadata: LeadMetadata {
                budget_min: Some(20_000),
                budget_max: Some(30_000),
                ..LeadMetadata::default()
            },
            created_by: None,
        };
        let now = Utc::now();
        let lead = Lead::from_intake(LeadId("lead-preview".to_string()), intake, now);

        let scorer = RuleBasedScorer::new(ScoringConfig::default());
        let report = scorer.report(&lead, &[], &[], now);

        assert_eq!(report.score, 26);
        assert_eq!(report.classification.label(), "cold");
    }
}
