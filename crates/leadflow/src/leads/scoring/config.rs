use serde::{Deserialize, Serialize};

/// Weight scheme for the deterministic scorer. The 40/40/20 caps are the
/// system of record; the model-assisted variant carries its own 35/40/25
/// scheme for compatibility with historical snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringConfig {
    pub engagement_cap: u8,
    pub buying_cap: u8,
    pub demographic_cap: u8,
    pub email_open_points: u8,
    pub email_click_points: u8,
    pub website_visit_points: u8,
    /// Per-signal occurrence ceiling for linear engagement credit.
    pub per_signal_max: usize,
    pub pricing_view_bonus: u8,
    pub trade_in_bonus: u8,
    pub finance_calculator_bonus: u8,
    pub test_drive_bonus: u8,
    pub budget_clarity_bonus: u8,
    pub urgency_points_per_hit: u8,
    pub urgency_cap: u8,
    /// Locations granted the full demographic location bonus (exact,
    /// case-insensitive).
    pub service_areas: Vec<String>,
    /// Broader regions granted the partial location bonus (substring,
    /// case-insensitive).
    pub service_regions: Vec<String>,
    pub referral_sources: Vec<String>,
    pub referral_bonus: u8,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            engagement_cap: 40,
            buying_cap: 40,
            demographic_cap: 20,
            email_open_points: 3,
            email_click_points: 3,
            website_visit_points: 4,
            per_signal_max: 5,
            pricing_view_bonus: 10,
            trade_in_bonus: 8,
            finance_calculator_bonus: 8,
            test_drive_bonus: 12,
            budget_clarity_bonus: 8,
            urgency_points_per_hit: 2,
            urgency_cap: 6,
            service_areas: vec!["des moines".to_string(), "ankeny".to_string()],
            service_regions: vec!["iowa".to_string()],
            referral_sources: vec!["referral".to_string(), "repeat_customer".to_string()],
            referral_bonus: 6,
        }
    }
}
