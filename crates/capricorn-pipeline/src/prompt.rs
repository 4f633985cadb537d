//! Extraction prompt construction.
//!
//! A caller may supply its own methodology template. Templates can reference
//! `{article_text}`, `{disease}`, `{events}` and `{journal_context}`; the JSON
//! instruction suffix is always appended.

use capricorn_common::JournalImpactTable;

/// Appended to every extraction prompt.
pub const JSON_ONLY_SUFFIX: &str = "\n\nIMPORTANT: Return ONLY the raw JSON object. Do not include any explanatory text, markdown formatting, or code blocks. The response should start with '{' and end with '}' with no other characters before or after.";

const DEFAULT_METHODOLOGY: &str = r#"You are an expert pediatric oncologist and you are the chair of the International Leukemia Tumor Board. Your goal is to evaluate full research articles related to oncology, especially those concerning pediatric leukemia, to identify potential advancements in treatment and understanding of the disease.
{case_context}
Journal Impact Data (SJR scores):
The following is a list of journal titles and their SJR scores. When extracting the journal title from the article, find the best matching title from this list and use its SJR score. If no match is found, use 0 as the SJR score.

Journal Titles and Scores:
{journal_context}

<Article>
{article_text}
</Article>

<Instructions>
Read the full article, extract key information, and assess its relevance and potential impact for the patient.

As an expert oncologist:
1. Set disease_match to true if the article's cancer type is relevant to the patient's condition.
2. Set treatment_shown to true if the article demonstrates positive treatment results.
3. For each actionable event in the article, decide whether it matches any of the patient's actionable events. For genetic mutations create two events: one for the gene (e.g. NRAS when the patient has NRAS G12D) and one for the specific variant (NRAS G12D) if the article mentions it.

Respond with a JSON object of this structure:

{
  "article_metadata": {
    "title": "...",
    "year": "...",
    "journal_title": "...",
    "journal_sjr": 0,
    "disease_focus": true/false,
    "pediatric_focus": true/false,
    "type_of_disease": "...",
    "disease_match": true/false,
    "paper_type": "...",
    "actionable_events": [
      { "event": "...", "matches_query": true/false }
    ],
    "drugs_tested": true/false,
    "drug_results": ["..."],
    "treatment_shown": true/false,
    "cell_studies": true/false,
    "mice_studies": true/false,
    "case_report": true/false,
    "series_of_case_reports": true/false,
    "clinical_study": true/false,
    "clinical_study_on_children": true/false,
    "novelty": true/false
  }
}
</Instructions>"#;

/// Replace `{name}` placeholders in one pass. Substituted text is never
/// rescanned, so an article that happens to contain `{disease}` stays intact.
pub fn fill_placeholders(template: &str, values: &[(&str, &str)]) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    'scan: while let Some(open) = rest.find('{') {
        out.push_str(&rest[..open]);
        let tail = &rest[open..];
        for (name, value) in values {
            let len = name.len();
            if tail.len() >= len + 2
                && tail[1..].starts_with(name)
                && tail[1 + len..].starts_with('}')
            {
                out.push_str(value);
                rest = &tail[len + 2..];
                continue 'scan;
            }
        }
        out.push('{');
        rest = &tail[1..];
    }
    out.push_str(rest);
    out
}

fn case_context(disease: Option<&str>, events: &str) -> String {
    let mut ctx = String::new();
    if let Some(d) = disease.filter(|d| !d.trim().is_empty()) {
        ctx.push_str(&format!("\nThe patient's disease is: {}\n", d.trim()));
    }
    if !events.trim().is_empty() {
        ctx.push_str(&format!("\nThe patient's actionable events are: {}\n", events.trim()));
    }
    ctx
}

/// Full extraction prompt for one article.
pub fn build_extraction_prompt(
    article_text: &str,
    methodology: Option<&str>,
    disease: Option<&str>,
    events: &str,
    journals: &JournalImpactTable,
) -> String {
    let journal_context = journals.prompt_context();
    let case = case_context(disease, events);
    let template = methodology
        .filter(|m| !m.trim().is_empty())
        .unwrap_or(DEFAULT_METHODOLOGY);

    let mut prompt = fill_placeholders(
        template,
        &[
            ("article_text", article_text),
            ("disease", disease.unwrap_or("")),
            ("events", events),
            ("journal_context", &journal_context),
            ("case_context", &case),
        ],
    );
    prompt.push_str(JSON_ONLY_SUFFIX);
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    fn journals() -> JournalImpactTable {
        vec![("Blood".to_string(), 5.5)].into_iter().collect()
    }

    #[test]
    fn test_default_prompt_embeds_everything() {
        let p = build_extraction_prompt("ARTICLE BODY", None, Some("JMML"), "NRAS G12D", &journals());
        assert!(p.contains("<Article>\nARTICLE BODY\n</Article>"));
        assert!(p.contains("The patient's disease is: JMML"));
        assert!(p.contains("The patient's actionable events are: NRAS G12D"));
        assert!(p.contains("- Blood: 5.5"));
        assert!(p.contains("\"article_metadata\""));
        assert!(p.ends_with(JSON_ONLY_SUFFIX));
    }

    #[test]
    fn test_custom_methodology_placeholders() {
        let tpl = "Disease={disease}; Events={events}; Text={article_text}; J={journal_context}";
        let p = build_extraction_prompt("body", Some(tpl), None, "KMT2A", &journals());
        assert!(p.starts_with("Disease=; Events=KMT2A; Text=body; J=- Blood: 5.5\n"));
    }

    #[test]
    fn test_substituted_text_is_not_rescanned() {
        let out = fill_placeholders("{article_text}|{disease}", &[("article_text", "see {disease}"), ("disease", "ALL")]);
        assert_eq!(out, "see {disease}|ALL");
    }

    #[test]
    fn test_unknown_braces_pass_through() {
        let out = fill_placeholders("{ \"a\": {x} }", &[("disease", "ALL")]);
        assert_eq!(out, "{ \"a\": {x} }");
    }

    #[test]
    fn test_blank_disease_adds_no_context() {
        let p = build_extraction_prompt("b", None, Some("  "), "", &journals());
        assert!(!p.contains("The patient's disease is"));
        assert!(!p.contains("actionable events are"));
    }
}
