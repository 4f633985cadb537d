//! Article types shared by the corpus store, extractor, scorer and web layer.
//! Field names follow the JSON shape the model is asked to produce, which is
//! also the shape streamed back to callers.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

pub const ARTICLE_LINK_BASE: &str = "https://pubmed.ncbi.nlm.nih.gov";

/// Fields a metadata object must carry to be accepted.
pub const REQUIRED_METADATA_FIELDS: [&str; 6] = [
    "title",
    "journal_title",
    "journal_sjr",
    "type_of_disease",
    "paper_type",
    "actionable_events",
];

/// Canonical URL for an external article identifier.
pub fn article_link(external_id: &str) -> String {
    format!("{}/{}/", ARTICLE_LINK_BASE, external_id.trim())
}

// ---------------------------------------------------------------------------
// Candidate document
// ---------------------------------------------------------------------------

/// One similarity-search hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateDocument {
    /// Identifier inside the corpus store (PMCID-style).
    pub corpus_id: String,
    /// Public literature identifier, absent until resolved.
    pub external_id: Option<String>,
    pub raw_text: String,
    /// Lower is closer.
    pub similarity_distance: f64,
}

impl CandidateDocument {
    /// Identifier used in messages and events: the external id when known.
    pub fn display_id(&self) -> &str {
        self.external_id.as_deref().unwrap_or(&self.corpus_id)
    }
}

// ---------------------------------------------------------------------------
// Extracted metadata
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionableEventMatch {
    #[serde(default, deserialize_with = "lenient::string")]
    pub event: String,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub matches_query: bool,
}

/// Signed point contribution per scoring factor.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ScoreBreakdown(BTreeMap<String, f64>);

impl ScoreBreakdown {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, factor: impl Into<String>, points: f64) {
        self.0.insert(factor.into(), points);
    }

    pub fn get(&self, factor: &str) -> Option<f64> {
        self.0.get(factor).copied()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

/// Structured facts about one article, parsed from a model response.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedMetadata {
    #[serde(default, deserialize_with = "lenient::string")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient::year")]
    pub year: Option<String>,
    #[serde(default, deserialize_with = "lenient::string")]
    pub journal_title: String,
    #[serde(default, deserialize_with = "lenient::number")]
    pub journal_sjr: f64,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub disease_focus: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub pediatric_focus: bool,
    #[serde(default, deserialize_with = "lenient::string")]
    pub type_of_disease: String,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub disease_match: bool,
    #[serde(default, deserialize_with = "lenient::string")]
    pub paper_type: String,
    #[serde(default)]
    pub actionable_events: Vec<ActionableEventMatch>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub drugs_tested: bool,
    #[serde(default)]
    pub drug_results: Vec<String>,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub treatment_shown: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub cell_studies: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub mice_studies: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub case_report: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub series_of_case_reports: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub clinical_study: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub clinical_study_on_children: bool,
    #[serde(default, deserialize_with = "lenient::boolean")]
    pub novelty: bool,

    #[serde(rename = "PMID", default, skip_serializing_if = "Option::is_none")]
    pub pmid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub overall_points: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub point_breakdown: Option<ScoreBreakdown>,
}

impl ExtractedMetadata {
    /// Number of actionable events the model matched against the query.
    pub fn matched_event_count(&self) -> usize {
        self.actionable_events.iter().filter(|e| e.matches_query).count()
    }

    /// Publication year as an integer, when it parses.
    pub fn year_value(&self) -> Option<i32> {
        self.year.as_deref().and_then(|y| y.trim().parse::<i32>().ok())
    }

    /// Attach the external identifier and its canonical link.
    pub fn stamp_identifier(&mut self, external_id: &str) {
        self.pmid = Some(external_id.to_string());
        self.link = Some(article_link(external_id));
    }

    /// Attach score and breakdown. Scores are assigned once; a second call is ignored.
    pub fn apply_score(&mut self, points: f64, breakdown: ScoreBreakdown) {
        if self.overall_points.is_some() {
            tracing::warn!(title = %self.title, "metadata already scored; keeping first score");
            return;
        }
        self.overall_points = Some(points);
        self.point_breakdown = Some(breakdown);
    }
}

/// Payload of an `article_analysis` stream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleAnalysis {
    pub article_metadata: ExtractedMetadata,
    pub full_article_text: String,
}

// ---------------------------------------------------------------------------
// Lenient field decoding: models return numbers as strings, years as numbers,
// and nulls for unknowns.
// ---------------------------------------------------------------------------

mod lenient {
    use serde::{Deserialize, Deserializer};
    use serde_json::Value;

    pub fn string<'de, D: Deserializer<'de>>(d: D) -> Result<String, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) => s,
            Value::Null => String::new(),
            other => other.to_string(),
        })
    }

    pub fn year<'de, D: Deserializer<'de>>(d: D) -> Result<Option<String>, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Value::Number(n) => match n.as_i64() {
                Some(i) => Some(i.to_string()),
                // 2021.0 reads as 2021; fractional years stay as written.
                None => n
                    .as_f64()
                    .map(|f| if f.fract() == 0.0 { format!("{}", f as i64) } else { n.to_string() }),
            },
            _ => None,
        })
    }

    pub fn number<'de, D: Deserializer<'de>>(d: D) -> Result<f64, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Number(n) => n.as_f64().unwrap_or(0.0),
            Value::String(s) => s.trim().parse::<f64>().unwrap_or(0.0),
            _ => 0.0,
        })
    }

    pub fn boolean<'de, D: Deserializer<'de>>(d: D) -> Result<bool, D::Error> {
        Ok(match Value::deserialize(d)? {
            Value::Bool(b) => b,
            Value::String(s) => s.trim().eq_ignore_ascii_case("true"),
            _ => false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_lenient_decoding() {
        let meta: ExtractedMetadata = serde_json::from_value(json!({
            "title": "NRAS in JMML",
            "year": 2021,
            "journal_title": "Blood",
            "journal_sjr": "3.5",
            "type_of_disease": null,
            "paper_type": "Review",
            "actionable_events": [{"event": "NRAS", "matches_query": "true"}],
            "pediatric_focus": true
        }))
        .unwrap();

        assert_eq!(meta.year.as_deref(), Some("2021"));
        assert_eq!(meta.year_value(), Some(2021));
        assert_eq!(meta.journal_sjr, 3.5);
        assert_eq!(meta.type_of_disease, "");
        assert!(meta.pediatric_focus);
        assert!(!meta.novelty);
        assert_eq!(meta.matched_event_count(), 1);
    }

    #[test]
    fn test_integral_float_year() {
        let meta: ExtractedMetadata =
            serde_json::from_value(json!({"title": "t", "year": 2021.0})).unwrap();
        assert_eq!(meta.year.as_deref(), Some("2021"));
        assert_eq!(meta.year_value(), Some(2021));

        let odd: ExtractedMetadata =
            serde_json::from_value(json!({"title": "t", "year": 2021.5})).unwrap();
        assert_eq!(odd.year_value(), None);
    }

    #[test]
    fn test_unparseable_year_has_no_value() {
        let meta = ExtractedMetadata { year: Some("circa 2019".into()), ..Default::default() };
        assert_eq!(meta.year_value(), None);
    }

    #[test]
    fn test_stamp_identifier_builds_link() {
        let mut meta = ExtractedMetadata::default();
        meta.stamp_identifier("34567890");
        assert_eq!(meta.pmid.as_deref(), Some("34567890"));
        assert_eq!(meta.link.as_deref(), Some("https://pubmed.ncbi.nlm.nih.gov/34567890/"));
    }

    #[test]
    fn test_score_is_applied_once() {
        let mut meta = ExtractedMetadata::default();
        let mut first = ScoreBreakdown::new();
        first.insert("disease_match", 50.0);
        meta.apply_score(50.0, first);
        meta.apply_score(10.0, ScoreBreakdown::new());
        assert_eq!(meta.overall_points, Some(50.0));
        assert_eq!(meta.point_breakdown.as_ref().map(|b| b.len()), Some(1));
    }

    #[test]
    fn test_serialises_identifier_as_pmid() {
        let mut meta = ExtractedMetadata::default();
        meta.stamp_identifier("1");
        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["PMID"], json!("1"));
        assert!(value.get("overall_points").is_none());
    }
}
