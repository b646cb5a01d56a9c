//! The technician work queue.

use anyhow::{Context, Result};
use rusqlite::{Connection, params, types::Type};
use serde::Serialize;
use std::str::FromStr;

use buildline_core::model::journey::Stage;

/// One entry in a technician's queue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct QueueEntry {
    pub barcode: String,
    pub model_sku: String,
    pub status: Stage,
    pub priority: bool,
    pub assigned_at_us: Option<i64>,
    pub bin_id: Option<i64>,
    pub assembly_paused: bool,
    pub parts_missing: bool,
}

/// Journeys assigned to one technician that still need work
/// (`assigned` or `in_progress`), priority items first, then
/// first-assigned-first-served within each tier.
pub fn technician_queue(conn: &Connection, technician_id: &str) -> Result<Vec<QueueEntry>> {
    let mut stmt = conn
        .prepare(
            "SELECT barcode, model_sku, current_status, priority, assigned_at_us,
                    bin_id, assembly_paused, parts_missing
             FROM journeys
             WHERE technician_id = ?1
               AND current_status IN ('assigned', 'in_progress')
             ORDER BY priority DESC, assigned_at_us ASC, barcode ASC",
        )
        .context("prepare technician queue query")?;

    let rows = stmt
        .query_map(params![technician_id], |row| {
            let status: String = row.get(2)?;
            Ok(QueueEntry {
                barcode: row.get(0)?,
                model_sku: row.get(1)?,
                status: Stage::from_str(&status).map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
                })?,
                priority: row.get(3)?,
                assigned_at_us: row.get(4)?,
                bin_id: row.get(5)?,
                assembly_paused: row.get(6)?,
                parts_missing: row.get(7)?,
            })
        })
        .context("query technician queue")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read queue for technician {technician_id}"))?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::technician_queue;
    use buildline_core::db::open_in_memory;
    use buildline_core::model::journey::Stage;
    use rusqlite::params;

    #[test]
    fn queue_filters_by_technician_and_active_stages() {
        let conn = open_in_memory().expect("open store");
        for (barcode, status, technician) in [
            ("BK001", "assigned", "tech-1"),
            ("BK002", "in_progress", "tech-1"),
            ("BK003", "ready_for_sale", "tech-1"),
            ("BK004", "assigned", "tech-2"),
        ] {
            conn.execute(
                "INSERT INTO journeys (
                    barcode, model_sku, current_status, technician_id,
                    assigned_at_us, inwarded_at_us, created_at_us, updated_at_us
                 ) VALUES (?1, 'MTB-29', ?2, ?3, 5, 1, 1, 1)",
                params![barcode, status, technician],
            )
            .expect("insert journey");
        }

        let queue = technician_queue(&conn, "tech-1").expect("queue");
        let barcodes: Vec<&str> = queue.iter().map(|entry| entry.barcode.as_str()).collect();
        assert_eq!(barcodes, vec!["BK001", "BK002"]);
        assert_eq!(queue[0].status, Stage::Assigned);
    }
}
