//! Point values for article relevance scoring.

use serde::{Deserialize, Serialize};

/// Fixed point contributions per factor.
/// These are hand-tuned heuristics; keep the literals as they are.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    /// Multiplier on ln(sjr + 1).
    pub journal_log_scale: f64,
    /// Ceiling for the journal impact contribution.
    pub journal_cap: f64,
    /// Points per year of age (applied as a penalty).
    pub per_year: f64,
    pub disease_match: f64,
    pub pediatric_focus: f64,
    pub clinical_trial: f64,
    pub review: f64,
    /// Points per actionable event matching the query.
    pub per_matched_event: f64,
    pub drugs_tested: f64,
    pub treatment_shown: f64,
    pub cell_studies: f64,
    pub mice_studies: f64,
    pub case_report: f64,
    pub series_of_case_reports: f64,
    pub clinical_study: f64,
    pub clinical_study_on_children: f64,
    pub novelty: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            journal_log_scale:          5.0,
            journal_cap:               25.0,
            per_year:                  -5.0,
            disease_match:             50.0,
            pediatric_focus:           20.0,
            clinical_trial:            40.0,
            review:                    -5.0,
            per_matched_event:         15.0,
            drugs_tested:               5.0,
            treatment_shown:           50.0,
            cell_studies:               5.0,
            mice_studies:              10.0,
            case_report:                5.0,
            series_of_case_reports:    10.0,
            clinical_study:            15.0,
            clinical_study_on_children: 20.0,
            novelty:                   10.0,
        }
    }
}
