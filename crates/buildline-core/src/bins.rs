//! Zoned-bin registry: capacity-guarded reservations and zone listings.
//!
//! Occupancy changes are single conditional UPDATE statements, so the
//! capacity check and the increment are indivisible. A failed reservation
//! leaves occupancy untouched. All registry calls run on the caller's
//! connection; when the caller holds a transaction, a rolled-back
//! transition rolls the occupancy change back with it.

use rusqlite::{Connection, params};
use tracing::{debug, warn};

use crate::db::query::{BIN_COLUMNS, BinRow};
use crate::model::bin::{BinStatus, Zone};

/// Errors raised by registry operations.
#[derive(Debug, thiserror::Error)]
pub enum BinError {
    /// The bin exists but has no spare capacity.
    #[error("bin {bin_id} is at capacity")]
    CapacityExceeded { bin_id: i64 },

    /// No bin with this id.
    #[error("bin {bin_id} not found")]
    NotFound { bin_id: i64 },

    /// A bin with this code already exists at the location.
    #[error("bin code '{bin_code}' already exists at {location_id}")]
    DuplicateBinCode {
        location_id: String,
        bin_code: String,
    },

    /// Underlying store failure.
    #[error("bin store query failed: {0}")]
    Store(#[from] rusqlite::Error),
}

/// Reserve one slot in a bin.
///
/// The guard `current_occupancy < capacity` and the increment are one
/// statement; under contention the loser sees zero affected rows and the
/// count never exceeds capacity.
///
/// # Errors
///
/// [`BinError::CapacityExceeded`] when the bin is full,
/// [`BinError::NotFound`] when it does not exist.
pub fn reserve_slot(conn: &Connection, bin_id: i64) -> Result<(), BinError> {
    let changed = conn.execute(
        "UPDATE bins
         SET current_occupancy = current_occupancy + 1
         WHERE bin_id = ?1 AND current_occupancy < capacity",
        params![bin_id],
    )?;

    if changed == 1 {
        return Ok(());
    }

    let exists: bool = conn.query_row(
        "SELECT EXISTS(SELECT 1 FROM bins WHERE bin_id = ?1)",
        params![bin_id],
        |row| row.get(0),
    )?;

    if exists {
        Err(BinError::CapacityExceeded { bin_id })
    } else {
        Err(BinError::NotFound { bin_id })
    }
}

/// Release one slot in a bin. Floored at zero; releasing an empty or
/// unknown bin is logged and otherwise ignored.
pub fn release_slot(conn: &Connection, bin_id: i64) -> Result<(), BinError> {
    let changed = conn.execute(
        "UPDATE bins
         SET current_occupancy = current_occupancy - 1
         WHERE bin_id = ?1 AND current_occupancy > 0",
        params![bin_id],
    )?;

    if changed == 0 {
        warn!(bin_id, "release on empty or unknown bin ignored");
    }

    Ok(())
}

/// Active bins with spare capacity in one zone at one location, ordered
/// by ascending occupancy then ascending bin code.
pub fn list_active_bins_in_zone(
    conn: &Connection,
    location_id: &str,
    zone: Zone,
) -> Result<Vec<BinRow>, BinError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {BIN_COLUMNS}
         FROM bins
         WHERE location_id = ?1
           AND status_zone = ?2
           AND bin_status = 'active'
           AND current_occupancy < capacity
         ORDER BY current_occupancy ASC, bin_code ASC"
    ))?;

    let rows = stmt
        .query_map(params![location_id, zone.to_string()], BinRow::from_row)?
        .collect::<rusqlite::Result<Vec<_>>>()?;

    Ok(rows)
}

/// Provision a new bin. Warehouse-setup helper; returns the new bin id.
///
/// # Errors
///
/// [`BinError::DuplicateBinCode`] when the code is already taken at the
/// location.
pub fn provision_bin(
    conn: &Connection,
    location_id: &str,
    bin_code: &str,
    zone: Zone,
    capacity: i64,
    now_us: i64,
) -> Result<i64, BinError> {
    let inserted = conn.execute(
        "INSERT OR IGNORE INTO bins (
            location_id, bin_code, status_zone, bin_status,
            capacity, current_occupancy, created_at_us
         ) VALUES (?1, ?2, ?3, 'active', ?4, 0, ?5)",
        params![location_id, bin_code, zone.to_string(), capacity, now_us],
    )?;

    if inserted == 0 {
        return Err(BinError::DuplicateBinCode {
            location_id: location_id.to_string(),
            bin_code: bin_code.to_string(),
        });
    }

    let bin_id = conn.last_insert_rowid();
    debug!(bin_id, location_id, bin_code, %zone, capacity, "provisioned bin");
    Ok(bin_id)
}

/// Change a bin's operational status (maintenance, inactive, ...).
pub fn set_bin_status(conn: &Connection, bin_id: i64, status: BinStatus) -> Result<(), BinError> {
    let changed = conn.execute(
        "UPDATE bins SET bin_status = ?2 WHERE bin_id = ?1",
        params![bin_id, status.to_string()],
    )?;

    if changed == 0 {
        return Err(BinError::NotFound { bin_id });
    }

    Ok(())
}
