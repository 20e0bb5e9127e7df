use chrono::{DateTime, Duration, Utc};

use super::super::domain::{Activity, EngagementEvent, Lead};
use super::config::ScoringConfig;
use super::{
    data_completeness, LeadScorer, ScoreBreakdown, ScoreFactor, ScoreOrigin, ScoreReport,
    ScoringError, SignalCategory,
};
use crate::leads::domain::LeadClassification;

const URGENCY_LEXICON: &[&str] = &["asap", "today", "urgent", "immediately", "this week", "now"];

/// Deterministic scorer applying the configured weight scheme. Three
/// independently capped sub-scores summed and clamped to 100.
pub struct RuleBasedScorer {
    config: ScoringConfig,
}

impl RuleBasedScorer {
    pub fn new(config: ScoringConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ScoringConfig {
        &self.config
    }

    /// Infallible entry point; the [`LeadScorer`] impl delegates here.
    pub fn report(
        &self,
        lead: &Lead,
        activities: &[Activity],
        events: &[EngagementEvent],
        now: DateTime<Utc>,
    ) -> ScoreReport {
        let mut factors = Vec::new();

        let engagement = self.engagement_score(activities, events, now, &mut factors);
        let buying = self.buying_score(lead, activities, events, &mut factors);
        let demographic = self.demographic_score(lead, &mut factors);

        let total = u16::from(engagement) + u16::from(buying) + u16::from(demographic);
        let score = total.min(100) as u8;

        ScoreReport {
            origin: ScoreOrigin::RuleBased,
            score,
            classification: LeadClassification::from_score(score),
            breakdown: ScoreBreakdown {
                engagement,
                buying_signals: buying,
                demographic,
            },
            factors,
            confidence: data_completeness(lead, activities, events),
            insights: Vec::new(),
        }
    }

    fn engagement_score(
        &self,
        activities: &[Activity],
        events: &[EngagementEvent],
        now: DateTime<Utc>,
        factors: &mut Vec<ScoreFactor>,
    ) -> u8 {
        let config = &self.config;
        let mut raw = 0u16;

        let opens = count_signal(activities, events, "email_open").min(config.per_signal_max);
        if opens > 0 {
            let points = opens as u16 * u16::from(config.email_open_points);
            raw += points;
            push_factor(
                factors,
                SignalCategory::Engagement,
                points,
                format!("{opens} email open(s)"),
            );
        }

        let clicks = count_signal(activities, events, "email_click").min(config.per_signal_max);
        if clicks > 0 {
            let points = clicks as u16 * u16::from(config.email_click_points);
            raw += points;
            push_factor(
                factors,
                SignalCategory::Engagement,
                points,
                format!("{clicks} email click(s)"),
            );
        }

        let visits = count_signal(activities, events, "website_visit").min(config.per_signal_max);
        if visits > 0 {
            let points = visits as u16 * u16::from(config.website_visit_points);
            raw += points;
            push_factor(
                factors,
                SignalCategory::Engagement,
                points,
                format!("{visits} website visit(s)"),
            );
        }

        if let Some(latest) = latest_signal(activities, events) {
            let age = now.signed_duration_since(latest);
            let bonus = recency_bonus(age);
            if bonus > 0 {
                raw += u16::from(bonus);
                push_factor(
                    factors,
                    SignalCategory::Engagement,
                    u16::from(bonus),
                    format!("last touch {}h ago", age.num_hours().max(0)),
                );
            }
        }

        cap(raw, config.engagement_cap)
    }

    fn buying_score(
        &self,
        lead: &Lead,
        activities: &[Activity],
        events: &[EngagementEvent],
        factors: &mut Vec<ScoreFactor>,
    ) -> u8 {
        let config = &self.config;
        let mut raw = 0u16;

        let intent_signals = [
            ("pricing_page_view", config.pricing_view_bonus, "viewed pricing"),
            ("trade_in_calculator", config.trade_in_bonus, "used trade-in calculator"),
            (
                "finance_calculator",
                config.finance_calculator_bonus,
                "used finance calculator",
            ),
            (
                "test_drive_request",
                config.test_drive_bonus,
                "requested a test drive",
            ),
        ];
        for (signal, bonus, notes) in intent_signals {
            if count_signal(activities, events, signal) > 0 {
                raw += u16::from(bonus);
                push_factor(
                    factors,
                    SignalCategory::BuyingSignals,
                    u16::from(bonus),
                    notes.to_string(),
                );
            }
        }

        if lead.metadata.has_budget_range() {
            raw += u16::from(config.budget_clarity_bonus);
            push_factor(
                factors,
                SignalCategory::BuyingSignals,
                u16::from(config.budget_clarity_bonus),
                "declared a full budget range".to_string(),
            );
        }

        let urgency = self.urgency_bonus(lead, activities);
        if urgency > 0 {
            raw += u16::from(urgency);
            push_factor(
                factors,
                SignalCategory::BuyingSignals,
                u16::from(urgency),
                "urgency keywords in notes".to_string(),
            );
        }

        cap(raw, config.buying_cap)
    }

    /// Keyword hits against intake notes plus activity notes, capped
    /// independently of the other buying-signal bonuses.
    fn urgency_bonus(&self, lead: &Lead, activities: &[Activity]) -> u8 {
        let mut corpus = lead
            .metadata
            .intake_notes
            .clone()
            .unwrap_or_default()
            .to_lowercase();
        for activity in activities {
            if let Some(notes) = &activity.notes {
                corpus.push(' ');
                corpus.push_str(&notes.to_lowercase());
            }
        }

        let hits = URGENCY_LEXICON
            .iter()
            .filter(|keyword| corpus.contains(*keyword))
            .count() as u16;
        let bonus = hits * u16::from(self.config.urgency_points_per_hit);
        bonus.min(u16::from(self.config.urgency_cap)) as u8
    }

    fn demographic_score(&self, lead: &Lead, factors: &mut Vec<ScoreFactor>) -> u8 {
        let config = &self.config;
        let mut raw = 0u16;

        if let Some(location) = &lead.location {
            let normalized = location.trim().to_lowercase();
            if config
                .service_areas
                .iter()
                .any(|area| area.eq_ignore_ascii_case(&normalized))
            {
                raw += 8;
                push_factor(
                    factors,
                    SignalCategory::Demographic,
                    8,
                    format!("inside service area ({normalized})"),
                );
            } else if config
                .service_regions
                .iter()
                .any(|region| normalized.contains(&region.to_lowercase()))
            {
                raw += 4;
                push_factor(
                    factors,
                    SignalCategory::Demographic,
                    4,
                    format!("inside service region ({normalized})"),
                );
            }
        }

        if let Some(bracket) = budget_bracket_points(lead.metadata.budget_max) {
            raw += u16::from(bracket);
            push_factor(
                factors,
                SignalCategory::Demographic,
                u16::from(bracket),
                "budget bracket".to_string(),
            );
        }

        if config
            .referral_sources
            .iter()
            .any(|source| source.eq_ignore_ascii_case(&lead.source))
        {
            raw += u16::from(config.referral_bonus);
            push_factor(
                factors,
                SignalCategory::Demographic,
                u16::from(config.referral_bonus),
                format!("{} source", lead.source),
            );
        }

        cap(raw, config.demographic_cap)
    }
}

impl LeadScorer for RuleBasedScorer {
    fn score(
        &self,
        lead: &Lead,
        activities: &[Activity],
        events: &[EngagementEvent],
        now: DateTime<Utc>,
    ) -> Result<ScoreReport, ScoringError> {
        Ok(self.report(lead, activities, events, now))
    }
}

fn count_signal(activities: &[Activity], events: &[EngagementEvent], signal: &str) -> usize {
    activities
        .iter()
        .filter(|activity| activity.activity_type == signal)
        .count()
        + events.iter().filter(|event| event.event_type == signal).count()
}

fn latest_signal(activities: &[Activity], events: &[EngagementEvent]) -> Option<DateTime<Utc>> {
    let newest_activity = activities.iter().map(|activity| activity.occurred_at).max();
    let newest_event = events.iter().map(|event| event.occurred_at).max();
    newest_activity.max(newest_event)
}

fn recency_bonus(age: Duration) -> u8 {
    // Future timestamps yield a negative age and land in the freshest band.
    if age < Duration::hours(1) {
        8
    } else if age < Duration::hours(24) {
        5
    } else if age < Duration::hours(72) {
        2
    } else {
        0
    }
}

fn budget_bracket_points(budget_max: Option<u32>) -> Option<u8> {
    let budget = budget_max?;
    if budget >= 40_000 {
        Some(6)
    } else if budget >= 25_000 {
        Some(4)
    } else if budget >= 10_000 {
        Some(2)
    } else {
        None
    }
}

fn cap(raw: u16, cap: u8) -> u8 {
    raw.min(u16::from(cap)) as u8
}

fn push_factor(
    factors: &mut Vec<ScoreFactor>,
    category: SignalCategory,
    points: u16,
    notes: String,
) {
    factors.push(ScoreFactor {
        category,
        points: points as i16,
        notes,
    });
}
