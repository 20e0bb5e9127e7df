use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use super::super::domain::Lead;

/// Inclusive score window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoreRange {
    pub min: u8,
    pub max: u8,
}

impl ScoreRange {
    pub fn contains(&self, score: u8) -> bool {
        score >= self.min && score <= self.max
    }
}

/// Half-open UTC hour window for the business-hours gate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HoursWindow {
    pub start_hour: u8,
    pub end_hour: u8,
}

impl HoursWindow {
    fn contains(&self, now: DateTime<Utc>) -> bool {
        let hour = now.hour() as u8;
        hour >= self.start_hour && hour < self.end_hour
    }
}

/// Metadata filter: exact value or membership in a value list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MetadataMatch {
    Value(String),
    AnyOf(Vec<String>),
}

impl MetadataMatch {
    fn matches(&self, value: &str) -> bool {
        match self {
            MetadataMatch::Value(expected) => expected == value,
            MetadataMatch::AnyOf(options) => options.iter().any(|option| option == value),
        }
    }
}

/// Condition predicates for an assignment rule. All optional, AND-combined;
/// an empty set matches every lead.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleConditions {
    #[serde(default)]
    pub score_range: Option<ScoreRange>,
    #[serde(default)]
    pub sources: Option<Vec<String>>,
    #[serde(default)]
    pub locations: Option<Vec<String>>,
    /// ISO weekdays, Monday = 1 through Sunday = 7.
    #[serde(default)]
    pub weekdays: Option<Vec<u8>>,
    #[serde(default)]
    pub business_hours: Option<HoursWindow>,
    #[serde(default)]
    pub metadata: Option<BTreeMap<String, MetadataMatch>>,
}

impl RuleConditions {
    pub fn matches(&self, lead: &Lead, now: DateTime<Utc>) -> bool {
        if let Some(range) = &self.score_range {
            if !range.contains(lead.current_score) {
                return false;
            }
        }

        if let Some(sources) = &self.sources {
            if !sources
                .iter()
                .any(|source| source.eq_ignore_ascii_case(&lead.source))
            {
                return false;
            }
        }

        if let Some(locations) = &self.locations {
            let matched = lead.location.as_deref().is_some_and(|location| {
                locations
                    .iter()
                    .any(|allowed| allowed.eq_ignore_ascii_case(location.trim()))
            });
            if !matched {
                return false;
            }
        }

        if let Some(weekdays) = &self.weekdays {
            let today = now.weekday().number_from_monday() as u8;
            if !weekdays.contains(&today) {
                return false;
            }
        }

        if let Some(window) = &self.business_hours {
            if !window.contains(now) {
                return false;
            }
        }

        if let Some(filters) = &self.metadata {
            for (key, filter) in filters {
                let matched = lead
                    .metadata
                    .field(key)
                    .is_some_and(|value| filter.matches(&value));
                if !matched {
                    return false;
                }
            }
        }

        true
    }
}
