//! Typed query helpers for the buildline store.
//!
//! All functions take a shared `&Connection` reference and return
//! `anyhow::Result<T>` with typed structs (never raw rows). Enum columns
//! are parsed into model types at the row boundary, so callers never see
//! raw status strings.

use anyhow::{Context, Result};
use rusqlite::{Connection, OptionalExtension, Row, params, types::Type};
use std::str::FromStr;

use crate::model::bin::{BinStatus, Zone};
use crate::model::journey::{Checklist, Stage};
use crate::model::qc::QcVerdict;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A journey row from the `journeys` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JourneyRow {
    pub barcode: String,
    pub model_sku: String,
    pub frame_number: Option<String>,
    pub current_status: Stage,
    pub current_location_id: Option<String>,
    pub bin_id: Option<i64>,
    pub priority: bool,
    pub checklist: Checklist,
    pub technician_id: Option<String>,
    pub supervisor_id: Option<String>,
    pub qc_person_id: Option<String>,
    pub inwarded_at_us: i64,
    pub assigned_at_us: Option<i64>,
    pub started_at_us: Option<i64>,
    pub completed_at_us: Option<i64>,
    pub qc_started_at_us: Option<i64>,
    pub qc_completed_at_us: Option<i64>,
    pub parts_missing: bool,
    pub parts_missing_list: Vec<String>,
    pub damage_reported: bool,
    pub damage_notes: Option<String>,
    pub damage_photos: Vec<String>,
    pub assembly_paused: bool,
    pub pause_reason: Option<String>,
    pub qc_status: QcVerdict,
    pub qc_failure_reason: Option<String>,
    pub qc_photos: Vec<String>,
    pub rework_count: u32,
    pub created_at_us: i64,
    pub updated_at_us: i64,
}

/// A bin row from the `bins` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinRow {
    pub bin_id: i64,
    pub location_id: String,
    pub bin_code: String,
    pub status_zone: Zone,
    pub bin_status: BinStatus,
    pub capacity: i64,
    pub current_occupancy: i64,
    pub created_at_us: i64,
}

/// An append-only status change entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusChangeRow {
    pub entry_id: i64,
    pub barcode: String,
    pub from_status: Option<Stage>,
    pub to_status: Stage,
    pub actor: String,
    pub reason: Option<String>,
    pub changed_at_us: i64,
}

/// An append-only location change entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationChangeRow {
    pub entry_id: i64,
    pub barcode: String,
    pub from_location_id: Option<String>,
    pub to_location_id: String,
    pub actor: String,
    pub reason: Option<String>,
    pub changed_at_us: i64,
}

/// An append-only bin movement entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinMovementRow {
    pub entry_id: i64,
    pub barcode: String,
    pub from_bin_id: Option<i64>,
    pub to_bin_id: Option<i64>,
    pub from_status: Stage,
    pub to_status: Stage,
    pub actor: String,
    pub reason: Option<String>,
    pub auto_assigned: bool,
    pub moved_at_us: i64,
}

/// A detailed QC inspection record, one per attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QcChecklistRow {
    pub qc_id: i64,
    pub barcode: String,
    pub qc_person_id: String,
    pub brake_ok: bool,
    pub brake_notes: Option<String>,
    pub drivetrain_ok: bool,
    pub drivetrain_notes: Option<String>,
    pub alignment_ok: bool,
    pub alignment_notes: Option<String>,
    pub torque_ok: bool,
    pub torque_notes: Option<String>,
    pub accessories_ok: bool,
    pub accessories_notes: Option<String>,
    pub result: QcVerdict,
    pub failure_reason: Option<String>,
    pub photos: Vec<String>,
    pub started_at_us: i64,
    pub completed_at_us: Option<i64>,
}

// ---------------------------------------------------------------------------
// Column parsing
// ---------------------------------------------------------------------------

fn parse_column<T>(idx: usize, value: &str) -> rusqlite::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    T::from_str(value).map_err(|error| {
        rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
    })
}

fn parse_json_list(idx: usize, value: Option<String>) -> rusqlite::Result<Vec<String>> {
    match value {
        None => Ok(Vec::new()),
        Some(raw) => serde_json::from_str(&raw).map_err(|error| {
            rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(error))
        }),
    }
}

const JOURNEY_COLUMNS: &str = "barcode, model_sku, frame_number, current_status, \
     current_location_id, bin_id, priority, \
     checklist_tyres, checklist_brakes, checklist_gears, \
     technician_id, supervisor_id, qc_person_id, \
     inwarded_at_us, assigned_at_us, started_at_us, completed_at_us, \
     qc_started_at_us, qc_completed_at_us, \
     parts_missing, parts_missing_list, damage_reported, damage_notes, damage_photos, \
     assembly_paused, pause_reason, \
     qc_status, qc_failure_reason, qc_photos, rework_count, \
     created_at_us, updated_at_us";

impl JourneyRow {
    /// Map a row selected with [`JOURNEY_COLUMNS`] order.
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let status: String = row.get(3)?;
        let qc_status: String = row.get(26)?;
        Ok(Self {
            barcode: row.get(0)?,
            model_sku: row.get(1)?,
            frame_number: row.get(2)?,
            current_status: parse_column(3, &status)?,
            current_location_id: row.get(4)?,
            bin_id: row.get(5)?,
            priority: row.get(6)?,
            checklist: Checklist {
                tyres: row.get(7)?,
                brakes: row.get(8)?,
                gears: row.get(9)?,
            },
            technician_id: row.get(10)?,
            supervisor_id: row.get(11)?,
            qc_person_id: row.get(12)?,
            inwarded_at_us: row.get(13)?,
            assigned_at_us: row.get(14)?,
            started_at_us: row.get(15)?,
            completed_at_us: row.get(16)?,
            qc_started_at_us: row.get(17)?,
            qc_completed_at_us: row.get(18)?,
            parts_missing: row.get(19)?,
            parts_missing_list: parse_json_list(20, row.get(20)?)?,
            damage_reported: row.get(21)?,
            damage_notes: row.get(22)?,
            damage_photos: parse_json_list(23, row.get(23)?)?,
            assembly_paused: row.get(24)?,
            pause_reason: row.get(25)?,
            qc_status: parse_column(26, &qc_status)?,
            qc_failure_reason: row.get(27)?,
            qc_photos: parse_json_list(28, row.get(28)?)?,
            rework_count: row.get(29)?,
            created_at_us: row.get(30)?,
            updated_at_us: row.get(31)?,
        })
    }
}

impl BinRow {
    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        let zone: String = row.get(3)?;
        let status: String = row.get(4)?;
        Ok(Self {
            bin_id: row.get(0)?,
            location_id: row.get(1)?,
            bin_code: row.get(2)?,
            status_zone: parse_column(3, &zone)?,
            bin_status: parse_column(4, &status)?,
            capacity: row.get(5)?,
            current_occupancy: row.get(6)?,
            created_at_us: row.get(7)?,
        })
    }
}

pub(crate) const BIN_COLUMNS: &str =
    "bin_id, location_id, bin_code, status_zone, bin_status, capacity, current_occupancy, created_at_us";

// ---------------------------------------------------------------------------
// Lookups
// ---------------------------------------------------------------------------

/// Fetch a journey by barcode.
pub fn get_journey(conn: &Connection, barcode: &str) -> Result<Option<JourneyRow>> {
    conn.query_row(
        &format!("SELECT {JOURNEY_COLUMNS} FROM journeys WHERE barcode = ?1"),
        params![barcode],
        JourneyRow::from_row,
    )
    .optional()
    .with_context(|| format!("load journey {barcode}"))
}

/// Fetch a bin by id.
pub fn get_bin(conn: &Connection, bin_id: i64) -> Result<Option<BinRow>> {
    conn.query_row(
        &format!("SELECT {BIN_COLUMNS} FROM bins WHERE bin_id = ?1"),
        params![bin_id],
        BinRow::from_row,
    )
    .optional()
    .with_context(|| format!("load bin {bin_id}"))
}

/// Fetch a bin by its per-location code.
pub fn get_bin_by_code(
    conn: &Connection,
    location_id: &str,
    bin_code: &str,
) -> Result<Option<BinRow>> {
    conn.query_row(
        &format!("SELECT {BIN_COLUMNS} FROM bins WHERE location_id = ?1 AND bin_code = ?2"),
        params![location_id, bin_code],
        BinRow::from_row,
    )
    .optional()
    .with_context(|| format!("load bin {bin_code} at {location_id}"))
}

/// Status trail for one journey, oldest first.
pub fn status_history(conn: &Connection, barcode: &str) -> Result<Vec<StatusChangeRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT entry_id, barcode, from_status, to_status, actor, reason, changed_at_us
             FROM status_history
             WHERE barcode = ?1
             ORDER BY changed_at_us ASC, entry_id ASC",
        )
        .context("prepare status history query")?;

    let rows = stmt
        .query_map(params![barcode], |row| {
            let from: Option<String> = row.get(2)?;
            let to: String = row.get(3)?;
            Ok(StatusChangeRow {
                entry_id: row.get(0)?,
                barcode: row.get(1)?,
                from_status: from.as_deref().map(|s| parse_column(2, s)).transpose()?,
                to_status: parse_column(3, &to)?,
                actor: row.get(4)?,
                reason: row.get(5)?,
                changed_at_us: row.get(6)?,
            })
        })
        .context("query status history")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read status history for {barcode}"))?;

    Ok(rows)
}

/// Location trail for one journey, oldest first.
pub fn location_history(conn: &Connection, barcode: &str) -> Result<Vec<LocationChangeRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT entry_id, barcode, from_location_id, to_location_id, actor, reason, changed_at_us
             FROM location_history
             WHERE barcode = ?1
             ORDER BY changed_at_us ASC, entry_id ASC",
        )
        .context("prepare location history query")?;

    let rows = stmt
        .query_map(params![barcode], |row| {
            Ok(LocationChangeRow {
                entry_id: row.get(0)?,
                barcode: row.get(1)?,
                from_location_id: row.get(2)?,
                to_location_id: row.get(3)?,
                actor: row.get(4)?,
                reason: row.get(5)?,
                changed_at_us: row.get(6)?,
            })
        })
        .context("query location history")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read location history for {barcode}"))?;

    Ok(rows)
}

/// Bin movement trail for one journey, oldest first.
pub fn bin_movements(conn: &Connection, barcode: &str) -> Result<Vec<BinMovementRow>> {
    let mut stmt = conn
        .prepare(
            "SELECT entry_id, barcode, from_bin_id, to_bin_id, from_status, to_status,
                    actor, reason, auto_assigned, moved_at_us
             FROM bin_movements
             WHERE barcode = ?1
             ORDER BY moved_at_us ASC, entry_id ASC",
        )
        .context("prepare bin movement query")?;

    let rows = stmt
        .query_map(params![barcode], |row| {
            let from: String = row.get(4)?;
            let to: String = row.get(5)?;
            Ok(BinMovementRow {
                entry_id: row.get(0)?,
                barcode: row.get(1)?,
                from_bin_id: row.get(2)?,
                to_bin_id: row.get(3)?,
                from_status: parse_column(4, &from)?,
                to_status: parse_column(5, &to)?,
                actor: row.get(6)?,
                reason: row.get(7)?,
                auto_assigned: row.get(8)?,
                moved_at_us: row.get(9)?,
            })
        })
        .context("query bin movements")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read bin movements for {barcode}"))?;

    Ok(rows)
}

fn qc_row(row: &Row<'_>) -> rusqlite::Result<QcChecklistRow> {
    let result: String = row.get(13)?;
    Ok(QcChecklistRow {
        qc_id: row.get(0)?,
        barcode: row.get(1)?,
        qc_person_id: row.get(2)?,
        brake_ok: row.get(3)?,
        brake_notes: row.get(4)?,
        drivetrain_ok: row.get(5)?,
        drivetrain_notes: row.get(6)?,
        alignment_ok: row.get(7)?,
        alignment_notes: row.get(8)?,
        torque_ok: row.get(9)?,
        torque_notes: row.get(10)?,
        accessories_ok: row.get(11)?,
        accessories_notes: row.get(12)?,
        result: parse_column(13, &result)?,
        failure_reason: row.get(14)?,
        photos: parse_json_list(15, row.get(15)?)?,
        started_at_us: row.get(16)?,
        completed_at_us: row.get(17)?,
    })
}

const QC_COLUMNS: &str = "qc_id, barcode, qc_person_id, \
     brake_ok, brake_notes, drivetrain_ok, drivetrain_notes, \
     alignment_ok, alignment_notes, torque_ok, torque_notes, \
     accessories_ok, accessories_notes, \
     result, failure_reason, photos, started_at_us, completed_at_us";

/// All QC attempts for one journey, oldest first.
pub fn qc_checklists(conn: &Connection, barcode: &str) -> Result<Vec<QcChecklistRow>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {QC_COLUMNS}
             FROM qc_checklists
             WHERE barcode = ?1
             ORDER BY started_at_us ASC, qc_id ASC"
        ))
        .context("prepare qc checklist query")?;

    let rows = stmt
        .query_map(params![barcode], qc_row)
        .context("query qc checklists")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .with_context(|| format!("read qc checklists for {barcode}"))?;

    Ok(rows)
}

/// The most recent still-pending QC attempt, if any.
pub fn open_qc_checklist(conn: &Connection, barcode: &str) -> Result<Option<QcChecklistRow>> {
    conn.query_row(
        &format!(
            "SELECT {QC_COLUMNS}
             FROM qc_checklists
             WHERE barcode = ?1 AND result = 'pending'
             ORDER BY started_at_us DESC, qc_id DESC
             LIMIT 1"
        ),
        params![barcode],
        qc_row,
    )
    .optional()
    .with_context(|| format!("load open qc checklist for {barcode}"))
}
