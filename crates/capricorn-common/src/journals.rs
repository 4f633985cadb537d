//! Journal impact reference data (SJR-style scores).
//!
//! Loaded once at startup and shared read-only behind an `Arc` for the life
//! of the process.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalImpact {
    pub title: String,
    pub sjr: f64,
}

/// Journal title → impact score, ordered by descending score.
#[derive(Debug, Clone, Default)]
pub struct JournalImpactTable {
    entries: Vec<JournalImpact>,
    by_title: HashMap<String, f64>,
}

fn normalise_title(title: &str) -> String {
    title.trim().to_lowercase()
}

impl JournalImpactTable {
    /// Build a table. Duplicate titles keep the highest score.
    pub fn new(entries: impl IntoIterator<Item = JournalImpact>) -> Self {
        let mut entries: Vec<JournalImpact> = entries
            .into_iter()
            .filter(|e| !e.title.trim().is_empty() && e.sjr.is_finite())
            .collect();
        entries.sort_by(|a, b| b.sjr.partial_cmp(&a.sjr).unwrap_or(std::cmp::Ordering::Equal));

        let mut by_title = HashMap::with_capacity(entries.len());
        entries.retain(|e| {
            let key = normalise_title(&e.title);
            if by_title.contains_key(&key) {
                false
            } else {
                by_title.insert(key, e.sjr);
                true
            }
        });

        Self { entries, by_title }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Case-insensitive lookup on the trimmed title.
    pub fn lookup(&self, title: &str) -> Option<f64> {
        self.by_title.get(&normalise_title(title)).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &JournalImpact> {
        self.entries.iter()
    }

    /// Reference list embedded in extraction prompts, one `- title: score` per line.
    pub fn prompt_context(&self) -> String {
        let mut out = String::with_capacity(self.entries.len() * 32);
        for e in &self.entries {
            out.push_str("- ");
            out.push_str(&e.title);
            out.push_str(": ");
            out.push_str(&e.sjr.to_string());
            out.push('\n');
        }
        out
    }
}

impl FromIterator<(String, f64)> for JournalImpactTable {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(title, sjr)| JournalImpact { title, sjr }))
    }
}
