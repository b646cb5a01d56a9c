//! Per-technician workload aggregates.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use serde::Serialize;

/// Workload summary for one technician.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TechnicianLoad {
    pub technician_id: String,
    /// Journeys waiting in `assigned`.
    pub assigned: usize,
    /// Journeys actively `in_progress`.
    pub in_progress: usize,
    /// Journeys this technician carried to `ready_for_sale`.
    pub ready_for_sale: usize,
    /// Cumulative QC rework across this technician's journeys.
    pub rework_total: u64,
}

/// Workload for every technician with at least one journey, ordered by
/// technician id for stable output.
pub fn technician_workload(conn: &Connection) -> Result<Vec<TechnicianLoad>> {
    let mut stmt = conn
        .prepare(
            "SELECT technician_id,
                    SUM(CASE WHEN current_status = 'assigned' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN current_status = 'in_progress' THEN 1 ELSE 0 END),
                    SUM(CASE WHEN current_status = 'ready_for_sale' THEN 1 ELSE 0 END),
                    SUM(rework_count)
             FROM journeys
             WHERE technician_id IS NOT NULL
             GROUP BY technician_id
             ORDER BY technician_id ASC",
        )
        .context("prepare workload query")?;

    let rows = stmt
        .query_map(params![], |row| {
            let assigned: i64 = row.get(1)?;
            let in_progress: i64 = row.get(2)?;
            let ready: i64 = row.get(3)?;
            let rework: i64 = row.get(4)?;
            Ok(TechnicianLoad {
                technician_id: row.get(0)?,
                assigned: usize::try_from(assigned).unwrap_or_default(),
                in_progress: usize::try_from(in_progress).unwrap_or_default(),
                ready_for_sale: usize::try_from(ready).unwrap_or_default(),
                rework_total: u64::try_from(rework).unwrap_or_default(),
            })
        })
        .context("query technician workload")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read technician workload")?;

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::technician_workload;
    use buildline_core::db::open_in_memory;
    use rusqlite::params;

    #[test]
    fn workload_groups_and_orders_by_technician() {
        let conn = open_in_memory().expect("open store");
        for (barcode, status, technician, rework) in [
            ("BK001", "assigned", Some("tech-2"), 0_i64),
            ("BK002", "in_progress", Some("tech-1"), 2),
            ("BK003", "in_progress", Some("tech-1"), 0),
            ("BK004", "ready_for_sale", Some("tech-1"), 1),
            ("BK005", "inwarded", None, 0),
        ] {
            conn.execute(
                "INSERT INTO journeys (
                    barcode, model_sku, current_status, technician_id, rework_count,
                    inwarded_at_us, created_at_us, updated_at_us
                 ) VALUES (?1, 'MTB-29', ?2, ?3, ?4, 1, 1, 1)",
                params![barcode, status, technician, rework],
            )
            .expect("insert journey");
        }

        let workload = technician_workload(&conn).expect("workload");
        assert_eq!(workload.len(), 2, "unassigned journeys are invisible");

        assert_eq!(workload[0].technician_id, "tech-1");
        assert_eq!(workload[0].assigned, 0);
        assert_eq!(workload[0].in_progress, 2);
        assert_eq!(workload[0].ready_for_sale, 1);
        assert_eq!(workload[0].rework_total, 3);

        assert_eq!(workload[1].technician_id, "tech-2");
        assert_eq!(workload[1].assigned, 1);
    }
}
