//! Automatic bin placement on stage transitions.
//!
//! Every stage transition asks the allocator to re-place the journey in
//! the zone matching its new stage. A full zone is not fatal: the journey
//! keeps its previous placement and the transition proceeds.

use anyhow::{Context, Result};
use rusqlite::{Connection, params};
use tracing::debug;

use crate::audit;
use crate::bins::{self, BinError};
use crate::model::bin::Zone;
use crate::model::journey::Stage;

/// Re-place a journey after a stage change.
///
/// Maps `new_status` to its target zone and picks the least-occupied
/// active bin in that zone at the journey's location. When the best
/// candidate is already the journey's bin, placement is left alone.
/// Otherwise the first candidate that accepts a reservation wins (a
/// candidate filled by a concurrent reservation is skipped), the prior
/// bin is released, and the move is recorded as automatic.
///
/// Returns the new bin id, or `None` when placement was unchanged —
/// including the "no free bin in zone" case, which the caller treats as
/// success.
#[allow(clippy::too_many_arguments)]
pub fn auto_assign_bin(
    conn: &Connection,
    barcode: &str,
    location_id: Option<&str>,
    current_bin: Option<i64>,
    old_status: Stage,
    new_status: Stage,
    actor: &str,
    now_us: i64,
) -> Result<Option<i64>> {
    let Some(location) = location_id else {
        return Ok(None);
    };

    let zone = Zone::for_stage(new_status);
    let candidates = bins::list_active_bins_in_zone(conn, location, zone)
        .with_context(|| format!("list {zone} bins at {location}"))?;

    if candidates.is_empty() {
        debug!(barcode, %zone, location, "no free bin in zone, placement unchanged");
        return Ok(None);
    }

    for candidate in &candidates {
        if Some(candidate.bin_id) == current_bin {
            // Already in the best available bin for this zone.
            return Ok(None);
        }

        match bins::reserve_slot(conn, candidate.bin_id) {
            Ok(()) => {
                if let Some(prior) = current_bin {
                    bins::release_slot(conn, prior)
                        .with_context(|| format!("release prior bin {prior}"))?;
                }

                conn.execute(
                    "UPDATE journeys SET bin_id = ?2, updated_at_us = ?3 WHERE barcode = ?1",
                    params![barcode, candidate.bin_id, now_us],
                )
                .with_context(|| format!("update bin placement for {barcode}"))?;

                audit::record_bin_movement(
                    conn,
                    barcode,
                    current_bin,
                    Some(candidate.bin_id),
                    old_status,
                    new_status,
                    actor,
                    None,
                    true,
                    now_us,
                )?;

                debug!(
                    barcode,
                    bin_id = candidate.bin_id,
                    bin_code = %candidate.bin_code,
                    %zone,
                    "auto-assigned bin"
                );
                return Ok(Some(candidate.bin_id));
            }
            // Lost a race for this candidate; try the next one.
            Err(BinError::CapacityExceeded { .. }) => {}
            Err(error) => {
                return Err(error).with_context(|| {
                    format!("reserve bin {} for {barcode}", candidate.bin_id)
                });
            }
        }
    }

    debug!(barcode, %zone, location, "all candidate bins filled, placement unchanged");
    Ok(None)
}
