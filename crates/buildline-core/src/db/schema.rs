//! Canonical SQLite schema for the buildline store.
//!
//! The schema is normalized for queryability and auditability:
//! - `journeys` keeps the latest aggregate fields for each tracked asset
//! - `bins` carries the zoned storage slots with capacity bookkeeping
//! - `status_history`, `location_history`, and `bin_movements` are
//!   append-only audit trails, one row per observed change
//! - `qc_checklists` stores one detailed inspection record per QC attempt

/// Migration v1: core tables.
pub const MIGRATION_V1_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS bins (
    bin_id INTEGER PRIMARY KEY AUTOINCREMENT,
    location_id TEXT NOT NULL CHECK (length(trim(location_id)) > 0),
    bin_code TEXT NOT NULL CHECK (length(trim(bin_code)) > 0),
    status_zone TEXT NOT NULL CHECK (status_zone IN (
        'inward_zone', 'assembly_zone', 'completion_zone', 'qc_zone', 'ready_zone'
    )),
    bin_status TEXT NOT NULL DEFAULT 'active' CHECK (bin_status IN (
        'active', 'maintenance', 'full', 'inactive'
    )),
    capacity INTEGER NOT NULL CHECK (capacity >= 0),
    current_occupancy INTEGER NOT NULL DEFAULT 0,
    created_at_us INTEGER NOT NULL,
    UNIQUE (location_id, bin_code),
    CHECK (current_occupancy >= 0 AND current_occupancy <= capacity)
);

CREATE TABLE IF NOT EXISTS journeys (
    barcode TEXT PRIMARY KEY CHECK (length(trim(barcode)) > 0),
    model_sku TEXT NOT NULL,
    frame_number TEXT,
    current_status TEXT NOT NULL DEFAULT 'inwarded' CHECK (current_status IN (
        'inwarded', 'assigned', 'in_progress', 'completed', 'qc_review', 'ready_for_sale'
    )),
    current_location_id TEXT,
    bin_id INTEGER REFERENCES bins(bin_id) ON DELETE SET NULL,
    priority INTEGER NOT NULL DEFAULT 0 CHECK (priority IN (0, 1)),
    checklist_tyres INTEGER NOT NULL DEFAULT 0 CHECK (checklist_tyres IN (0, 1)),
    checklist_brakes INTEGER NOT NULL DEFAULT 0 CHECK (checklist_brakes IN (0, 1)),
    checklist_gears INTEGER NOT NULL DEFAULT 0 CHECK (checklist_gears IN (0, 1)),
    technician_id TEXT,
    supervisor_id TEXT,
    qc_person_id TEXT,
    inwarded_at_us INTEGER NOT NULL,
    assigned_at_us INTEGER,
    started_at_us INTEGER,
    completed_at_us INTEGER,
    qc_started_at_us INTEGER,
    qc_completed_at_us INTEGER,
    parts_missing INTEGER NOT NULL DEFAULT 0 CHECK (parts_missing IN (0, 1)),
    parts_missing_list TEXT,
    damage_reported INTEGER NOT NULL DEFAULT 0 CHECK (damage_reported IN (0, 1)),
    damage_notes TEXT,
    damage_photos TEXT,
    assembly_paused INTEGER NOT NULL DEFAULT 0 CHECK (assembly_paused IN (0, 1)),
    pause_reason TEXT,
    qc_status TEXT NOT NULL DEFAULT 'pending' CHECK (qc_status IN ('pending', 'pass', 'fail')),
    qc_failure_reason TEXT,
    qc_photos TEXT,
    rework_count INTEGER NOT NULL DEFAULT 0 CHECK (rework_count >= 0),
    created_at_us INTEGER NOT NULL,
    updated_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS status_history (
    entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
    barcode TEXT NOT NULL REFERENCES journeys(barcode) ON DELETE CASCADE,
    from_status TEXT CHECK (from_status IS NULL OR from_status IN (
        'inwarded', 'assigned', 'in_progress', 'completed', 'qc_review', 'ready_for_sale'
    )),
    to_status TEXT NOT NULL CHECK (to_status IN (
        'inwarded', 'assigned', 'in_progress', 'completed', 'qc_review', 'ready_for_sale'
    )),
    actor TEXT NOT NULL,
    reason TEXT,
    changed_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS location_history (
    entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
    barcode TEXT NOT NULL REFERENCES journeys(barcode) ON DELETE CASCADE,
    from_location_id TEXT,
    to_location_id TEXT NOT NULL,
    actor TEXT NOT NULL,
    reason TEXT,
    changed_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS bin_movements (
    entry_id INTEGER PRIMARY KEY AUTOINCREMENT,
    barcode TEXT NOT NULL REFERENCES journeys(barcode) ON DELETE CASCADE,
    from_bin_id INTEGER REFERENCES bins(bin_id) ON DELETE SET NULL,
    to_bin_id INTEGER REFERENCES bins(bin_id) ON DELETE SET NULL,
    from_status TEXT NOT NULL,
    to_status TEXT NOT NULL,
    actor TEXT NOT NULL,
    reason TEXT,
    auto_assigned INTEGER NOT NULL DEFAULT 0 CHECK (auto_assigned IN (0, 1)),
    moved_at_us INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS qc_checklists (
    qc_id INTEGER PRIMARY KEY AUTOINCREMENT,
    barcode TEXT NOT NULL REFERENCES journeys(barcode) ON DELETE CASCADE,
    qc_person_id TEXT NOT NULL,
    brake_ok INTEGER NOT NULL DEFAULT 0 CHECK (brake_ok IN (0, 1)),
    brake_notes TEXT,
    drivetrain_ok INTEGER NOT NULL DEFAULT 0 CHECK (drivetrain_ok IN (0, 1)),
    drivetrain_notes TEXT,
    alignment_ok INTEGER NOT NULL DEFAULT 0 CHECK (alignment_ok IN (0, 1)),
    alignment_notes TEXT,
    torque_ok INTEGER NOT NULL DEFAULT 0 CHECK (torque_ok IN (0, 1)),
    torque_notes TEXT,
    accessories_ok INTEGER NOT NULL DEFAULT 0 CHECK (accessories_ok IN (0, 1)),
    accessories_notes TEXT,
    result TEXT NOT NULL DEFAULT 'pending' CHECK (result IN ('pending', 'pass', 'fail')),
    failure_reason TEXT,
    photos TEXT,
    started_at_us INTEGER NOT NULL,
    completed_at_us INTEGER
);
"#;

/// Migration v2: read-path indexes.
pub const MIGRATION_V2_SQL: &str = r#"
CREATE INDEX IF NOT EXISTS idx_journeys_technician_status
    ON journeys(technician_id, current_status);

CREATE INDEX IF NOT EXISTS idx_journeys_status_updated
    ON journeys(current_status, updated_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_bins_zone_pick
    ON bins(location_id, status_zone, bin_status, current_occupancy, bin_code);

CREATE INDEX IF NOT EXISTS idx_status_history_barcode
    ON status_history(barcode, changed_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_location_history_barcode
    ON location_history(barcode, changed_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_bin_movements_barcode
    ON bin_movements(barcode, moved_at_us DESC);

CREATE INDEX IF NOT EXISTS idx_qc_checklists_barcode
    ON qc_checklists(barcode, started_at_us DESC);
"#;

/// Indexes expected by queue/board/history query paths.
pub const REQUIRED_INDEXES: &[&str] = &[
    "idx_journeys_technician_status",
    "idx_journeys_status_updated",
    "idx_bins_zone_pick",
    "idx_status_history_barcode",
    "idx_location_history_barcode",
    "idx_bin_movements_barcode",
    "idx_qc_checklists_barcode",
];

#[cfg(test)]
mod tests {
    use crate::db::migrations;
    use rusqlite::{Connection, params};

    fn seeded_conn() -> rusqlite::Result<Connection> {
        let mut conn = Connection::open_in_memory()?;
        migrations::migrate(&mut conn)?;

        for idx in 0..12_u32 {
            let zone = if idx % 2 == 0 {
                "assembly_zone"
            } else {
                "qc_zone"
            };
            conn.execute(
                "INSERT INTO bins (
                    location_id, bin_code, status_zone, bin_status,
                    capacity, current_occupancy, created_at_us
                 ) VALUES ('loc-blr', ?1, ?2, 'active', 4, ?3, ?4)",
                params![format!("B-{idx:02}"), zone, i64::from(idx % 3), i64::from(idx)],
            )?;
        }

        for idx in 0..24_u32 {
            let status = if idx % 3 == 0 { "assigned" } else { "in_progress" };
            let technician = if idx % 2 == 0 { "tech-1" } else { "tech-2" };
            conn.execute(
                "INSERT INTO journeys (
                    barcode, model_sku, current_status, current_location_id,
                    priority, technician_id, inwarded_at_us, assigned_at_us,
                    created_at_us, updated_at_us
                 ) VALUES (?1, 'MTB-29', ?2, 'loc-blr', ?3, ?4, ?5, ?6, ?5, ?6)",
                params![
                    format!("BK{idx:03}"),
                    status,
                    i64::from(idx % 4 == 0),
                    technician,
                    i64::from(idx),
                    i64::from(idx) + 1_000
                ],
            )?;
        }

        Ok(conn)
    }

    fn query_plan_details(conn: &Connection, sql: &str) -> rusqlite::Result<Vec<String>> {
        let mut stmt = conn.prepare(&format!("EXPLAIN QUERY PLAN {sql}"))?;
        stmt.query_map([], |row| row.get::<_, String>(3))?
            .collect::<Result<Vec<_>, _>>()
    }

    #[test]
    fn query_plan_uses_queue_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT barcode
             FROM journeys
             WHERE technician_id = 'tech-1'
               AND current_status IN ('assigned', 'in_progress')
             ORDER BY priority DESC, assigned_at_us ASC",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_journeys_technician_status")),
            "expected queue index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn query_plan_uses_bin_pick_index() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;
        let details = query_plan_details(
            &conn,
            "SELECT bin_id
             FROM bins
             WHERE location_id = 'loc-blr'
               AND status_zone = 'assembly_zone'
               AND bin_status = 'active'
               AND current_occupancy < capacity
             ORDER BY current_occupancy ASC, bin_code ASC",
        )?;

        assert!(
            details
                .iter()
                .any(|detail| detail.contains("idx_bins_zone_pick")),
            "expected bin pick index in plan, got: {details:?}"
        );

        Ok(())
    }

    #[test]
    fn occupancy_check_constraint_holds() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;

        let over_capacity = conn.execute(
            "UPDATE bins SET current_occupancy = capacity + 1 WHERE bin_id = 1",
            [],
        );
        assert!(over_capacity.is_err(), "occupancy above capacity must fail");

        let negative = conn.execute("UPDATE bins SET current_occupancy = -1 WHERE bin_id = 1", []);
        assert!(negative.is_err(), "negative occupancy must fail");

        Ok(())
    }

    #[test]
    fn journey_status_check_constraint_holds() -> rusqlite::Result<()> {
        let conn = seeded_conn()?;

        let bogus = conn.execute(
            "UPDATE journeys SET current_status = 'sold' WHERE barcode = 'BK000'",
            [],
        );
        assert!(bogus.is_err(), "unknown status must fail the CHECK");

        Ok(())
    }
}
