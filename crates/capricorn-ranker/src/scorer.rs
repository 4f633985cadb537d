//! Article relevance score.
//!
//! `score` is pure: metadata plus the current year in, point total and
//! breakdown out. A factor appears in the breakdown only when it contributes
//! a non-zero amount, and the total is always the sum of the breakdown.

use chrono::Datelike;

use capricorn_common::{ExtractedMetadata, ScoreBreakdown};

use crate::normalise::log_capped;
use crate::weights::ScoringWeights;

/// Calendar year in UTC.
pub fn current_year() -> i32 {
    chrono::Utc::now().year()
}

/// Compute the relevance score for one article.
pub fn score(meta: &ExtractedMetadata, current_year: i32, weights: &ScoringWeights) -> (f64, ScoreBreakdown) {
    let mut breakdown = ScoreBreakdown::new();

    let journal = log_capped(meta.journal_sjr, weights.journal_log_scale, weights.journal_cap);
    if journal > 0.0 {
        breakdown.insert("journal_impact", journal);
    }

    if let Some(year) = meta.year_value() {
        let age = (current_year - year) as f64;
        let points = weights.per_year * age;
        if points != 0.0 {
            breakdown.insert("year", points);
        }
    }

    if meta.disease_match {
        breakdown.insert("disease_match", weights.disease_match);
    }
    if meta.pediatric_focus {
        breakdown.insert("pediatric_focus", weights.pediatric_focus);
    }

    let paper_type = meta.paper_type.to_lowercase();
    if paper_type.contains("clinical trial") {
        breakdown.insert("paper_type", weights.clinical_trial);
    } else if paper_type.contains("review") {
        breakdown.insert("paper_type", weights.review);
    }

    let matched = meta.matched_event_count();
    if matched > 0 {
        breakdown.insert("actionable_events", weights.per_matched_event * matched as f64);
    }

    let flags = [
        (meta.drugs_tested, "drugs_tested", weights.drugs_tested),
        (meta.treatment_shown, "treatment_shown", weights.treatment_shown),
        (meta.cell_studies, "cell_studies", weights.cell_studies),
        (meta.mice_studies, "mice_studies", weights.mice_studies),
        (meta.case_report, "case_report", weights.case_report),
        (meta.series_of_case_reports, "series_of_case_reports", weights.series_of_case_reports),
        (meta.clinical_study, "clinical_study", weights.clinical_study),
        (meta.clinical_study_on_children, "clinical_study_on_children", weights.clinical_study_on_children),
        (meta.novelty, "novelty", weights.novelty),
    ];
    for (set, name, points) in flags {
        if set {
            breakdown.insert(name, points);
        }
    }

    (breakdown.total(), breakdown)
}

/// Score with default weights and attach the result to the metadata.
pub fn score_and_apply(meta: &mut ExtractedMetadata, current_year: i32) -> f64 {
    let (total, breakdown) = score(meta, current_year, &ScoringWeights::default());
    tracing::debug!(
        title = %meta.title,
        total,
        factors = breakdown.len(),
        "article scored"
    );
    meta.apply_score(total, breakdown);
    total
}
