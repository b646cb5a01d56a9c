//! Bottleneck and aging reports.
//!
//! Dwell time is `now - entry into the current stage`, where stage entry
//! comes from the latest status trail row (falling back to the inward
//! timestamp for journeys that predate their trail). These reports only
//! observe; nothing is ever auto-escalated.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params, types::Type};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;
use tracing::debug;

use buildline_core::config::ReportConfig;
use buildline_core::model::bin::Zone;
use buildline_core::model::journey::Stage;

/// A journey dwelling in its current stage past the report threshold.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AgingEntry {
    pub barcode: String,
    pub model_sku: String,
    pub status: Stage,
    pub technician_id: Option<String>,
    pub entered_stage_at_us: i64,
    pub dwell_us: i64,
}

/// Current wall-clock in store microseconds.
#[must_use]
pub fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// The configured staleness threshold in microseconds.
#[must_use]
pub const fn stale_threshold_us(config: &ReportConfig) -> i64 {
    (config.stale_after_hours as i64) * 3_600 * 1_000_000
}

struct DwellRow {
    barcode: String,
    model_sku: String,
    status: Stage,
    technician_id: Option<String>,
    entered_stage_at_us: i64,
}

/// Non-terminal journeys with their stage entry timestamps. The latest
/// status trail row is the authoritative entry time.
fn dwell_rows(conn: &Connection) -> Result<Vec<DwellRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT j.barcode, j.model_sku, j.current_status, j.technician_id,
                    COALESCE(
                        (SELECT MAX(h.changed_at_us)
                         FROM status_history h
                         WHERE h.barcode = j.barcode),
                        j.inwarded_at_us
                    )
             FROM journeys j
             WHERE j.current_status <> 'ready_for_sale'",
        )
        .context("prepare dwell query")?;

    let rows = stmt
        .query_map(params![], |row| {
            let status: String = row.get(2)?;
            Ok(DwellRow {
                barcode: row.get(0)?,
                model_sku: row.get(1)?,
                status: Stage::from_str(&status).map_err(|error| {
                    rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
                })?,
                technician_id: row.get(3)?,
                entered_stage_at_us: row.get(4)?,
            })
        })
        .context("query dwell rows")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read dwell rows")?;

    Ok(rows)
}

/// Journeys stuck in their current stage for at least `threshold_us`,
/// longest-dwelling first. Terminal journeys are never stuck.
pub fn aging_report(conn: &Connection, now_us: i64, threshold_us: i64) -> Result<Vec<AgingEntry>> {
    let mut entries: Vec<AgingEntry> = dwell_rows(conn)?
        .into_iter()
        .map(|row| AgingEntry {
            dwell_us: now_us.saturating_sub(row.entered_stage_at_us),
            barcode: row.barcode,
            model_sku: row.model_sku,
            status: row.status,
            technician_id: row.technician_id,
            entered_stage_at_us: row.entered_stage_at_us,
        })
        .filter(|entry| entry.dwell_us >= threshold_us)
        .collect();

    entries.sort_by(|a, b| b.dwell_us.cmp(&a.dwell_us).then(a.barcode.cmp(&b.barcode)));
    debug!(flagged = entries.len(), threshold_us, "aging report computed");
    Ok(entries)
}

fn average_dwell_by<K, F>(conn: &Connection, now_us: i64, key: F) -> Result<HashMap<K, i64>>
where
    K: std::hash::Hash + Eq,
    F: Fn(&DwellRow) -> Option<K>,
{
    let mut sums: HashMap<K, (i64, i64)> = HashMap::new();
    for row in dwell_rows(conn)? {
        let Some(group) = key(&row) else { continue };
        let dwell = now_us.saturating_sub(row.entered_stage_at_us);
        let entry = sums.entry(group).or_insert((0, 0));
        entry.0 += dwell;
        entry.1 += 1;
    }

    Ok(sums
        .into_iter()
        .map(|(group, (total, count))| (group, total / count.max(1)))
        .collect())
}

/// Mean dwell per stage across all non-terminal journeys.
pub fn average_dwell_by_stage(conn: &Connection, now_us: i64) -> Result<HashMap<Stage, i64>> {
    average_dwell_by(conn, now_us, |row| Some(row.status))
}

/// Mean dwell per technician (journeys without a technician are skipped).
pub fn average_dwell_by_technician(
    conn: &Connection,
    now_us: i64,
) -> Result<HashMap<String, i64>> {
    average_dwell_by(conn, now_us, |row| row.technician_id.clone())
}

/// Mean dwell per model SKU.
pub fn average_dwell_by_model(conn: &Connection, now_us: i64) -> Result<HashMap<String, i64>> {
    average_dwell_by(conn, now_us, |row| Some(row.model_sku.clone()))
}

/// Mean dwell per storage zone, derived from each journey's current
/// stage.
pub fn average_dwell_by_zone(conn: &Connection, now_us: i64) -> Result<HashMap<Zone, i64>> {
    average_dwell_by(conn, now_us, |row| Some(Zone::for_stage(row.status)))
}

#[cfg(test)]
mod tests {
    use super::{aging_report, average_dwell_by_stage, stale_threshold_us};
    use buildline_core::config::ReportConfig;
    use buildline_core::db::open_in_memory;
    use buildline_core::model::journey::Stage;
    use rusqlite::params;

    fn insert_journey_with_trail(
        conn: &rusqlite::Connection,
        barcode: &str,
        status: &str,
        entered_at_us: i64,
    ) {
        conn.execute(
            "INSERT INTO journeys (
                barcode, model_sku, current_status,
                inwarded_at_us, created_at_us, updated_at_us
             ) VALUES (?1, 'MTB-29', ?2, 1, 1, ?3)",
            params![barcode, status, entered_at_us],
        )
        .expect("insert journey");
        conn.execute(
            "INSERT INTO status_history (barcode, from_status, to_status, actor, changed_at_us)
             VALUES (?1, NULL, ?2, 'test', ?3)",
            params![barcode, status, entered_at_us],
        )
        .expect("insert trail row");
    }

    #[test]
    fn aging_flags_only_past_threshold_and_sorts_by_dwell() {
        let conn = open_in_memory().expect("open store");
        insert_journey_with_trail(&conn, "BK001", "in_progress", 100);
        insert_journey_with_trail(&conn, "BK002", "assigned", 500);
        insert_journey_with_trail(&conn, "BK003", "in_progress", 900);
        insert_journey_with_trail(&conn, "BK004", "ready_for_sale", 1);

        let report = aging_report(&conn, 1_000, 400).expect("aging report");
        let barcodes: Vec<&str> = report.iter().map(|entry| entry.barcode.as_str()).collect();
        // BK001 dwelt 900, BK002 dwelt 500; BK003 (100) is under threshold,
        // BK004 is terminal.
        assert_eq!(barcodes, vec!["BK001", "BK002"]);
        assert_eq!(report[0].dwell_us, 900);
        assert_eq!(report[0].status, Stage::InProgress);
    }

    #[test]
    fn average_dwell_groups_by_stage() {
        let conn = open_in_memory().expect("open store");
        insert_journey_with_trail(&conn, "BK001", "in_progress", 200);
        insert_journey_with_trail(&conn, "BK002", "in_progress", 400);
        insert_journey_with_trail(&conn, "BK003", "assigned", 900);

        let averages = average_dwell_by_stage(&conn, 1_000).expect("averages");
        assert_eq!(averages.get(&Stage::InProgress), Some(&700));
        assert_eq!(averages.get(&Stage::Assigned), Some(&100));
    }

    #[test]
    fn average_dwell_groups_assigned_and_in_progress_into_one_zone() {
        let conn = open_in_memory().expect("open store");
        insert_journey_with_trail(&conn, "BK001", "in_progress", 200);
        insert_journey_with_trail(&conn, "BK002", "assigned", 600);
        insert_journey_with_trail(&conn, "BK003", "qc_review", 900);

        let averages = super::average_dwell_by_zone(&conn, 1_000).expect("averages");
        assert_eq!(
            averages.get(&buildline_core::model::bin::Zone::AssemblyZone),
            Some(&600)
        );
        assert_eq!(
            averages.get(&buildline_core::model::bin::Zone::QcZone),
            Some(&100)
        );
    }

    #[test]
    fn threshold_converts_hours_to_micros() {
        let config = ReportConfig {
            stale_after_hours: 2,
        };
        assert_eq!(stale_threshold_us(&config), 7_200_000_000);
    }
}
