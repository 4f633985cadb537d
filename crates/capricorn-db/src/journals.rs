//! Journal impact reference table loader.

use tracing::info;

use capricorn_common::{JournalImpact, JournalImpactTable};

use crate::database::Database;
use crate::error::Result;

/// Read every journal row once. Called at startup; the result is shared
/// read-only for the life of the process.
pub async fn load_journal_impact_table(db: &Database, table: &str) -> Result<JournalImpactTable> {
    let sql = format!("SELECT title, sjr FROM {} ORDER BY sjr DESC", table);
    let rows = db.client().query(&sql, &[]).await?;

    let mut entries = Vec::with_capacity(rows.len());
    for row in rows {
        let title: Option<String> = row.try_get("title")?;
        let sjr: Option<f64> = row.try_get("sjr")?;
        if let (Some(title), Some(sjr)) = (title, sjr) {
            entries.push(JournalImpact { title, sjr });
        }
    }

    let table = JournalImpactTable::new(entries);
    info!(journals = table.len(), "Loaded journal impact records");
    Ok(table)
}
