//! Append-only audit trail recorders.
//!
//! Three trails: status changes, location changes, and bin movements.
//! Each recorder is a pure append over the caller's connection with no
//! business validation; the workflow engine and bin allocator invoke them
//! inside the same transaction as the state change they describe, so a
//! trail entry can never exist without its change (or vice versa).

use anyhow::{Context, Result};
use rusqlite::{Connection, params};

use crate::model::journey::Stage;

/// Append one status change entry.
pub fn record_status_change(
    conn: &Connection,
    barcode: &str,
    from: Option<Stage>,
    to: Stage,
    actor: &str,
    reason: Option<&str>,
    changed_at_us: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO status_history (barcode, from_status, to_status, actor, reason, changed_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            barcode,
            from.map(|s| s.to_string()),
            to.to_string(),
            actor,
            reason,
            changed_at_us
        ],
    )
    .with_context(|| format!("record status change for {barcode}"))?;
    Ok(())
}

/// Append one location change entry.
pub fn record_location_change(
    conn: &Connection,
    barcode: &str,
    from: Option<&str>,
    to: &str,
    actor: &str,
    reason: Option<&str>,
    changed_at_us: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO location_history (barcode, from_location_id, to_location_id, actor, reason, changed_at_us)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![barcode, from, to, actor, reason, changed_at_us],
    )
    .with_context(|| format!("record location change for {barcode}"))?;
    Ok(())
}

/// Append one bin movement entry.
#[allow(clippy::too_many_arguments)]
pub fn record_bin_movement(
    conn: &Connection,
    barcode: &str,
    from_bin: Option<i64>,
    to_bin: Option<i64>,
    from_status: Stage,
    to_status: Stage,
    actor: &str,
    reason: Option<&str>,
    auto_assigned: bool,
    moved_at_us: i64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO bin_movements (
            barcode, from_bin_id, to_bin_id, from_status, to_status,
            actor, reason, auto_assigned, moved_at_us
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            barcode,
            from_bin,
            to_bin,
            from_status.to_string(),
            to_status.to_string(),
            actor,
            reason,
            auto_assigned,
            moved_at_us
        ],
    )
    .with_context(|| format!("record bin movement for {barcode}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{record_bin_movement, record_location_change, record_status_change};
    use crate::db::{open_in_memory, query};
    use crate::model::journey::Stage;

    fn conn_with_journey() -> rusqlite::Connection {
        let conn = open_in_memory().expect("open store");
        conn.execute(
            "INSERT INTO journeys (barcode, model_sku, inwarded_at_us, created_at_us, updated_at_us)
             VALUES ('BK001', 'MTB-29', 1, 1, 1)",
            [],
        )
        .expect("insert journey");
        conn
    }

    #[test]
    fn status_trail_appends_in_order() {
        let conn = conn_with_journey();

        record_status_change(&conn, "BK001", None, Stage::Inwarded, "intake", None, 1)
            .expect("record intake");
        record_status_change(
            &conn,
            "BK001",
            Some(Stage::Inwarded),
            Stage::Assigned,
            "sup-1",
            Some("morning batch"),
            2,
        )
        .expect("record assignment");

        let trail = query::status_history(&conn, "BK001").expect("read trail");
        assert_eq!(trail.len(), 2);
        assert_eq!(trail[0].from_status, None);
        assert_eq!(trail[1].from_status, Some(Stage::Inwarded));
        assert_eq!(trail[1].to_status, Stage::Assigned);
        assert_eq!(trail[1].reason.as_deref(), Some("morning batch"));
    }

    #[test]
    fn location_and_bin_trails_append() {
        let conn = conn_with_journey();

        record_location_change(&conn, "BK001", None, "loc-blr", "intake", None, 1)
            .expect("record location");
        record_bin_movement(
            &conn,
            "BK001",
            None,
            None,
            Stage::Inwarded,
            Stage::Inwarded,
            "intake",
            None,
            true,
            1,
        )
        .expect("record movement");

        let locations = query::location_history(&conn, "BK001").expect("read locations");
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].to_location_id, "loc-blr");

        let moves = query::bin_movements(&conn, "BK001").expect("read movements");
        assert_eq!(moves.len(), 1);
        assert!(moves[0].auto_assigned);
    }
}
