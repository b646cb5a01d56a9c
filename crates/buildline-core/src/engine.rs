//! The assembly workflow engine.
//!
//! Every guarded operation runs as one `BEGIN IMMEDIATE` transaction
//! covering, in order: the field change, the audit trail entries, the bin
//! allocator, and the occupancy bookkeeping. A denied guard rolls the
//! whole transaction back, so a failed transition never leaves partial
//! state. Stage updates carry a `current_status` compare-and-swap in the
//! WHERE clause, so two racing calls against the same barcode cannot both
//! pass a stale guard.
//!
//! Business failures are [`OperationOutcome`] denials, never `Err`;
//! `Err` is reserved for store faults.

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, params};
use std::str::FromStr;
use tracing::{debug, info};

use crate::allocator;
use crate::audit;
use crate::bins::{self, BinError};
use crate::config::WorkflowConfig;
use crate::db::query::{self, JourneyRow};
use crate::error::ErrorCode;
use crate::model::bin::BinStatus;
use crate::model::journey::{Checklist, Stage};
use crate::model::qc::{QcInspection, QcVerdict};

/// Structured result of a guarded operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OperationOutcome {
    pub success: bool,
    pub barcode: String,
    pub status: Option<Stage>,
    pub bin_id: Option<i64>,
    pub code: Option<ErrorCode>,
    pub message: String,
}

impl OperationOutcome {
    fn ok(
        barcode: &str,
        status: Stage,
        bin_id: Option<i64>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            success: true,
            barcode: barcode.to_string(),
            status: Some(status),
            bin_id,
            code: None,
            message: message.into(),
        }
    }

    fn denied(barcode: &str, code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            success: false,
            barcode: barcode.to_string(),
            status: None,
            bin_id: None,
            code: Some(code),
            message: message.into(),
        }
    }
}

fn now_us() -> i64 {
    Utc::now().timestamp_micros()
}

/// The workflow engine over one store connection.
pub struct Engine<'conn> {
    conn: &'conn Connection,
    workflow: WorkflowConfig,
}

impl<'conn> Engine<'conn> {
    /// Engine with default workflow configuration (self-certified
    /// completion path).
    pub fn new(conn: &'conn Connection) -> Self {
        Self::with_config(conn, WorkflowConfig::default())
    }

    pub fn with_config(conn: &'conn Connection, workflow: WorkflowConfig) -> Self {
        Self { conn, workflow }
    }

    /// Run `f` inside one immediate transaction. Commits only successful
    /// outcomes; denials and store faults roll back every write made so
    /// far, audit rows and occupancy included.
    fn in_transaction<F>(&self, op: &'static str, f: F) -> Result<OperationOutcome>
    where
        F: FnOnce(&Connection) -> Result<OperationOutcome>,
    {
        self.conn
            .execute_batch("BEGIN IMMEDIATE")
            .context("begin workflow transaction")?;

        match f(self.conn) {
            Ok(outcome) => {
                if outcome.success {
                    self.conn
                        .execute_batch("COMMIT")
                        .context("commit workflow transaction")?;
                } else {
                    self.conn
                        .execute_batch("ROLLBACK")
                        .context("roll back denied operation")?;
                    debug!(
                        op,
                        barcode = %outcome.barcode,
                        code = ?outcome.code,
                        message = %outcome.message,
                        "operation denied"
                    );
                }
                Ok(outcome)
            }
            Err(error) => {
                let _ = self.conn.execute_batch("ROLLBACK");
                Err(error)
            }
        }
    }

    // -----------------------------------------------------------------------
    // Intake
    // -----------------------------------------------------------------------

    /// Create a journey in `inwarded` and place it in the inward zone.
    pub fn intake_bike(
        &self,
        barcode: &str,
        model_sku: &str,
        frame_number: Option<&str>,
        location_id: Option<&str>,
        priority: bool,
        actor: &str,
    ) -> Result<OperationOutcome> {
        self.in_transaction("intake_bike", |conn| {
            if query::get_journey(conn, barcode)?.is_some() {
                return Ok(OperationOutcome::denied(
                    barcode,
                    ErrorCode::DuplicateBarcode,
                    format!("bike {barcode} is already inwarded"),
                ));
            }

            let now = now_us();
            conn.execute(
                "INSERT INTO journeys (
                    barcode, model_sku, frame_number, current_status,
                    current_location_id, priority,
                    inwarded_at_us, created_at_us, updated_at_us
                 ) VALUES (?1, ?2, ?3, 'inwarded', ?4, ?5, ?6, ?6, ?6)",
                params![barcode, model_sku, frame_number, location_id, priority, now],
            )
            .with_context(|| format!("insert journey {barcode}"))?;

            audit::record_status_change(conn, barcode, None, Stage::Inwarded, actor, None, now)?;
            if let Some(location) = location_id {
                audit::record_location_change(conn, barcode, None, location, actor, None, now)?;
            }

            let bin = allocator::auto_assign_bin(
                conn,
                barcode,
                location_id,
                None,
                Stage::Inwarded,
                Stage::Inwarded,
                actor,
                now,
            )?;

            info!(barcode, model_sku, priority, "inwarded bike");
            Ok(OperationOutcome::ok(
                barcode,
                Stage::Inwarded,
                bin,
                format!("bike {barcode} inwarded"),
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Stage transitions
    // -----------------------------------------------------------------------

    /// `inwarded -> assigned`: hand the bike to a technician.
    pub fn assign_to_technician(
        &self,
        barcode: &str,
        technician_id: &str,
        supervisor_id: &str,
    ) -> Result<OperationOutcome> {
        self.in_transaction("assign_to_technician", |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            if let Some(denial) = guard_stage(&journey, Stage::Assigned, &[Stage::Inwarded]) {
                return Ok(denial);
            }

            let now = now_us();
            let changed = conn
                .execute(
                    "UPDATE journeys
                     SET technician_id = ?2, supervisor_id = ?3,
                         current_status = 'assigned', assigned_at_us = ?4, updated_at_us = ?4
                     WHERE barcode = ?1 AND current_status = 'inwarded'",
                    params![barcode, technician_id, supervisor_id, now],
                )
                .with_context(|| format!("assign journey {barcode}"))?;
            if changed == 0 {
                return Ok(stale(barcode));
            }

            audit::record_status_change(
                conn,
                barcode,
                Some(Stage::Inwarded),
                Stage::Assigned,
                supervisor_id,
                None,
                now,
            )?;
            let bin = allocator::auto_assign_bin(
                conn,
                barcode,
                journey.current_location_id.as_deref(),
                journey.bin_id,
                Stage::Inwarded,
                Stage::Assigned,
                supervisor_id,
                now,
            )?;

            info!(barcode, technician_id, supervisor_id, "assigned bike");
            Ok(OperationOutcome::ok(
                barcode,
                Stage::Assigned,
                bin.or(journey.bin_id),
                format!("bike {barcode} assigned to {technician_id}"),
            ))
        })
    }

    /// `assigned -> in_progress`: the assigned technician starts work.
    pub fn start_assembly(&self, barcode: &str, technician_id: &str) -> Result<OperationOutcome> {
        self.in_transaction("start_assembly", |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            if let Some(denial) = guard_stage(&journey, Stage::InProgress, &[Stage::Assigned]) {
                return Ok(denial);
            }
            if let Some(denial) = guard_technician(&journey, technician_id) {
                return Ok(denial);
            }

            let now = now_us();
            let changed = conn
                .execute(
                    "UPDATE journeys
                     SET current_status = 'in_progress', started_at_us = ?2, updated_at_us = ?2
                     WHERE barcode = ?1 AND current_status = 'assigned'",
                    params![barcode, now],
                )
                .with_context(|| format!("start journey {barcode}"))?;
            if changed == 0 {
                return Ok(stale(barcode));
            }

            audit::record_status_change(
                conn,
                barcode,
                Some(Stage::Assigned),
                Stage::InProgress,
                technician_id,
                None,
                now,
            )?;
            let bin = allocator::auto_assign_bin(
                conn,
                barcode,
                journey.current_location_id.as_deref(),
                journey.bin_id,
                Stage::Assigned,
                Stage::InProgress,
                technician_id,
                now,
            )?;

            info!(barcode, technician_id, "assembly started");
            Ok(OperationOutcome::ok(
                barcode,
                Stage::InProgress,
                bin.or(journey.bin_id),
                format!("assembly of bike {barcode} started"),
            ))
        })
    }

    /// `in_progress -> ready_for_sale` (self-certified, the default) or
    /// `in_progress -> completed` (QC-mandatory deployments). Gated on a
    /// fully-checked checklist either way.
    pub fn complete_assembly(
        &self,
        barcode: &str,
        technician_id: &str,
        checklist: Checklist,
    ) -> Result<OperationOutcome> {
        let require_qc = self.workflow.require_qc_review;
        self.in_transaction("complete_assembly", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            let target = if require_qc {
                Stage::Completed
            } else {
                Stage::ReadyForSale
            };
            if let Some(denial) = guard_stage(&journey, target, &[Stage::InProgress]) {
                return Ok(denial);
            }
            if let Some(denial) = guard_technician(&journey, technician_id) {
                return Ok(denial);
            }
            if !checklist.is_complete() {
                return Ok(OperationOutcome::denied(
                    barcode,
                    ErrorCode::ChecklistIncomplete,
                    format!(
                        "checklist incomplete for bike {barcode}: {} unchecked",
                        checklist.missing().join(", ")
                    ),
                ));
            }

            let now = now_us();
            let changed = if require_qc {
                conn.execute(
                    "UPDATE journeys
                     SET checklist_tyres = ?2, checklist_brakes = ?3, checklist_gears = ?4,
                         current_status = 'completed', completed_at_us = ?5, updated_at_us = ?5
                     WHERE barcode = ?1 AND current_status = 'in_progress'",
                    params![barcode, checklist.tyres, checklist.brakes, checklist.gears, now],
                )
            } else {
                conn.execute(
                    "UPDATE journeys
                     SET checklist_tyres = ?2, checklist_brakes = ?3, checklist_gears = ?4,
                         current_status = 'ready_for_sale', completed_at_us = ?5,
                         qc_status = 'pass', qc_completed_at_us = ?5, updated_at_us = ?5
                     WHERE barcode = ?1 AND current_status = 'in_progress'",
                    params![barcode, checklist.tyres, checklist.brakes, checklist.gears, now],
                )
            }
            .with_context(|| format!("complete journey {barcode}"))?;
            if changed == 0 {
                return Ok(stale(barcode));
            }

            audit::record_status_change(
                conn,
                barcode,
                Some(Stage::InProgress),
                target,
                technician_id,
                None,
                now,
            )?;
            let bin = allocator::auto_assign_bin(
                conn,
                barcode,
                journey.current_location_id.as_deref(),
                journey.bin_id,
                Stage::InProgress,
                target,
                technician_id,
                now,
            )?;

            info!(barcode, technician_id, stage = %target, "assembly completed");
            let message = if require_qc {
                format!("bike {barcode} completed, awaiting QC review")
            } else {
                format!("bike {barcode} completed and ready for sale")
            };
            Ok(OperationOutcome::ok(
                barcode,
                target,
                bin.or(journey.bin_id),
                message,
            ))
        })
    }

    /// `completed -> qc_review`: open a detailed QC inspection.
    pub fn start_qc_review(&self, barcode: &str, qc_person_id: &str) -> Result<OperationOutcome> {
        self.in_transaction("start_qc_review", |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            if let Some(denial) = guard_stage(&journey, Stage::QcReview, &[Stage::Completed]) {
                return Ok(denial);
            }

            let now = now_us();
            let changed = conn
                .execute(
                    "UPDATE journeys
                     SET current_status = 'qc_review', qc_person_id = ?2,
                         qc_started_at_us = ?3, updated_at_us = ?3
                     WHERE barcode = ?1 AND current_status = 'completed'",
                    params![barcode, qc_person_id, now],
                )
                .with_context(|| format!("start qc review for {barcode}"))?;
            if changed == 0 {
                return Ok(stale(barcode));
            }

            audit::record_status_change(
                conn,
                barcode,
                Some(Stage::Completed),
                Stage::QcReview,
                qc_person_id,
                None,
                now,
            )?;
            conn.execute(
                "INSERT INTO qc_checklists (barcode, qc_person_id, started_at_us)
                 VALUES (?1, ?2, ?3)",
                params![barcode, qc_person_id, now],
            )
            .with_context(|| format!("open qc checklist for {barcode}"))?;

            let bin = allocator::auto_assign_bin(
                conn,
                barcode,
                journey.current_location_id.as_deref(),
                journey.bin_id,
                Stage::Completed,
                Stage::QcReview,
                qc_person_id,
                now,
            )?;

            info!(barcode, qc_person_id, "qc review started");
            Ok(OperationOutcome::ok(
                barcode,
                Stage::QcReview,
                bin.or(journey.bin_id),
                format!("QC review of bike {barcode} started"),
            ))
        })
    }

    /// Submit a QC verdict from `completed` or `qc_review`. `pass` moves
    /// the journey to `ready_for_sale`; `fail` returns it to
    /// `in_progress` and bumps `rework_count`. Any other verdict is
    /// rejected.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_qc_result(
        &self,
        barcode: &str,
        qc_person_id: &str,
        verdict: &str,
        failure_reason: Option<&str>,
        photos: &[String],
        inspection: Option<&QcInspection>,
    ) -> Result<OperationOutcome> {
        self.in_transaction("submit_qc_result", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };

            let verdict = match QcVerdict::from_str(verdict) {
                Ok(value) if value.is_final() => value,
                _ => {
                    return Ok(OperationOutcome::denied(
                        barcode,
                        ErrorCode::InvalidQcVerdict,
                        format!("invalid QC verdict '{verdict}', expected 'pass' or 'fail'"),
                    ));
                }
            };

            let passed = verdict == QcVerdict::Pass;
            let target = if passed {
                Stage::ReadyForSale
            } else {
                Stage::InProgress
            };
            if let Some(denial) =
                guard_stage(&journey, target, &[Stage::Completed, Stage::QcReview])
            {
                return Ok(denial);
            }

            let now = now_us();
            let photos_json = json_list(photos)?;
            let from = journey.current_status;
            let changed = if passed {
                conn.execute(
                    "UPDATE journeys
                     SET current_status = 'ready_for_sale', qc_person_id = ?2,
                         qc_status = 'pass', qc_failure_reason = NULL, qc_photos = ?3,
                         qc_completed_at_us = ?4, updated_at_us = ?4
                     WHERE barcode = ?1 AND current_status = ?5",
                    params![barcode, qc_person_id, photos_json, now, from.to_string()],
                )
            } else {
                conn.execute(
                    "UPDATE journeys
                     SET current_status = 'in_progress', qc_person_id = ?2,
                         qc_status = 'fail', qc_failure_reason = ?3, qc_photos = ?4,
                         qc_completed_at_us = ?5, rework_count = rework_count + 1,
                         updated_at_us = ?5
                     WHERE barcode = ?1 AND current_status = ?6",
                    params![barcode, qc_person_id, failure_reason, photos_json, now, from.to_string()],
                )
            }
            .with_context(|| format!("record qc verdict for {barcode}"))?;
            if changed == 0 {
                return Ok(stale(barcode));
            }

            audit::record_status_change(
                conn,
                barcode,
                Some(from),
                target,
                qc_person_id,
                failure_reason,
                now,
            )?;
            close_qc_checklist(
                conn,
                barcode,
                qc_person_id,
                verdict,
                failure_reason,
                photos_json.as_deref(),
                inspection,
                now,
            )?;

            let bin = allocator::auto_assign_bin(
                conn,
                barcode,
                journey.current_location_id.as_deref(),
                journey.bin_id,
                from,
                target,
                qc_person_id,
                now,
            )?;

            info!(barcode, qc_person_id, verdict = %verdict, "qc verdict recorded");
            let message = if passed {
                format!("bike {barcode} passed QC and is ready for sale")
            } else {
                format!(
                    "bike {barcode} failed QC, returned for rework #{}",
                    journey.rework_count + 1
                )
            };
            Ok(OperationOutcome::ok(
                barcode,
                target,
                bin.or(journey.bin_id),
                message,
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Manual placement and location
    // -----------------------------------------------------------------------

    /// Manual bin override, independent of stage. The target must be an
    /// active bin with spare capacity.
    pub fn move_bike_to_bin(
        &self,
        barcode: &str,
        new_bin_id: i64,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<OperationOutcome> {
        self.in_transaction("move_bike_to_bin", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            let Some(bin) = query::get_bin(conn, new_bin_id)? else {
                return Ok(OperationOutcome::denied(
                    barcode,
                    ErrorCode::BinNotFound,
                    format!("bin {new_bin_id} not found"),
                ));
            };
            if bin.bin_status != BinStatus::Active {
                return Ok(OperationOutcome::denied(
                    barcode,
                    ErrorCode::BinUnavailable,
                    format!("bin {} is {}", bin.bin_code, bin.bin_status),
                ));
            }
            if journey.bin_id == Some(new_bin_id) {
                return Ok(OperationOutcome::ok(
                    barcode,
                    journey.current_status,
                    journey.bin_id,
                    format!("bike {barcode} is already in bin {}", bin.bin_code),
                ));
            }

            match bins::reserve_slot(conn, new_bin_id) {
                Ok(()) => {}
                Err(BinError::CapacityExceeded { .. }) => {
                    return Ok(OperationOutcome::denied(
                        barcode,
                        ErrorCode::BinCapacityExceeded,
                        format!("bin {} is at capacity", bin.bin_code),
                    ));
                }
                Err(BinError::NotFound { .. }) => {
                    return Ok(OperationOutcome::denied(
                        barcode,
                        ErrorCode::BinNotFound,
                        format!("bin {new_bin_id} not found"),
                    ));
                }
                Err(error) => {
                    return Err(error)
                        .with_context(|| format!("reserve bin {new_bin_id} for {barcode}"));
                }
            }

            let now = now_us();
            if let Some(prior) = journey.bin_id {
                bins::release_slot(conn, prior)
                    .with_context(|| format!("release prior bin {prior}"))?;
            }
            conn.execute(
                "UPDATE journeys SET bin_id = ?2, updated_at_us = ?3 WHERE barcode = ?1",
                params![barcode, new_bin_id, now],
            )
            .with_context(|| format!("update bin placement for {barcode}"))?;
            audit::record_bin_movement(
                conn,
                barcode,
                journey.bin_id,
                Some(new_bin_id),
                journey.current_status,
                journey.current_status,
                actor,
                reason,
                false,
                now,
            )?;

            info!(barcode, bin_id = new_bin_id, actor, "manual bin move");
            Ok(OperationOutcome::ok(
                barcode,
                journey.current_status,
                Some(new_bin_id),
                format!("bike {barcode} moved to bin {}", bin.bin_code),
            ))
        })
    }

    /// Move a journey to another physical location, re-placing it in the
    /// matching zone there (or releasing its bin when the new location
    /// has none free).
    pub fn transfer_location(
        &self,
        barcode: &str,
        new_location_id: &str,
        actor: &str,
        reason: Option<&str>,
    ) -> Result<OperationOutcome> {
        self.in_transaction("transfer_location", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            if journey.current_location_id.as_deref() == Some(new_location_id) {
                return Ok(OperationOutcome::ok(
                    barcode,
                    journey.current_status,
                    journey.bin_id,
                    format!("bike {barcode} is already at {new_location_id}"),
                ));
            }

            let now = now_us();
            conn.execute(
                "UPDATE journeys SET current_location_id = ?2, updated_at_us = ?3
                 WHERE barcode = ?1",
                params![barcode, new_location_id, now],
            )
            .with_context(|| format!("update location for {barcode}"))?;
            audit::record_location_change(
                conn,
                barcode,
                journey.current_location_id.as_deref(),
                new_location_id,
                actor,
                reason,
                now,
            )?;

            let stage = journey.current_status;
            let placed = allocator::auto_assign_bin(
                conn,
                barcode,
                Some(new_location_id),
                journey.bin_id,
                stage,
                stage,
                actor,
                now,
            )?;
            // The bike left its old location either way; a bin there must
            // not keep holding it.
            if placed.is_none() {
                if let Some(prior) = journey.bin_id {
                    bins::release_slot(conn, prior)
                        .with_context(|| format!("release prior bin {prior}"))?;
                    conn.execute(
                        "UPDATE journeys SET bin_id = NULL, updated_at_us = ?2 WHERE barcode = ?1",
                        params![barcode, now],
                    )
                    .with_context(|| format!("clear bin placement for {barcode}"))?;
                    audit::record_bin_movement(
                        conn, barcode, Some(prior), None, stage, stage, actor, reason, true, now,
                    )?;
                }
            }

            info!(barcode, new_location_id, actor, "location transfer");
            Ok(OperationOutcome::ok(
                barcode,
                stage,
                placed,
                format!("bike {barcode} transferred to {new_location_id}"),
            ))
        })
    }

    // -----------------------------------------------------------------------
    // Exception flags (side channel; never drive the state machine)
    // -----------------------------------------------------------------------

    /// Flag missing parts on a journey.
    pub fn report_parts_missing(
        &self,
        barcode: &str,
        actor: &str,
        parts: &[String],
    ) -> Result<OperationOutcome> {
        self.in_transaction("report_parts_missing", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };

            let list = json_list(parts)?;
            conn.execute(
                "UPDATE journeys SET parts_missing = 1, parts_missing_list = ?2, updated_at_us = ?3
                 WHERE barcode = ?1",
                params![barcode, list, now_us()],
            )
            .with_context(|| format!("flag parts missing for {barcode}"))?;

            debug!(barcode, actor, count = parts.len(), "parts reported missing");
            Ok(OperationOutcome::ok(
                barcode,
                journey.current_status,
                journey.bin_id,
                format!("parts flagged missing for bike {barcode}"),
            ))
        })
    }

    /// Clear the missing-parts flag once stock arrives.
    pub fn resolve_parts_missing(&self, barcode: &str, actor: &str) -> Result<OperationOutcome> {
        self.in_transaction("resolve_parts_missing", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };

            conn.execute(
                "UPDATE journeys SET parts_missing = 0, parts_missing_list = NULL, updated_at_us = ?2
                 WHERE barcode = ?1",
                params![barcode, now_us()],
            )
            .with_context(|| format!("clear parts missing for {barcode}"))?;

            debug!(barcode, actor, "parts missing resolved");
            Ok(OperationOutcome::ok(
                barcode,
                journey.current_status,
                journey.bin_id,
                format!("missing parts resolved for bike {barcode}"),
            ))
        })
    }

    /// Record damage observed on the asset.
    pub fn report_damage(
        &self,
        barcode: &str,
        actor: &str,
        notes: &str,
        photos: &[String],
    ) -> Result<OperationOutcome> {
        self.in_transaction("report_damage", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };

            let photos_json = json_list(photos)?;
            conn.execute(
                "UPDATE journeys
                 SET damage_reported = 1, damage_notes = ?2, damage_photos = ?3, updated_at_us = ?4
                 WHERE barcode = ?1",
                params![barcode, notes, photos_json, now_us()],
            )
            .with_context(|| format!("record damage for {barcode}"))?;

            debug!(barcode, actor, "damage reported");
            Ok(OperationOutcome::ok(
                barcode,
                journey.current_status,
                journey.bin_id,
                format!("damage recorded for bike {barcode}"),
            ))
        })
    }

    /// Pause active assembly. Only meaningful while `in_progress`.
    pub fn pause_assembly(
        &self,
        barcode: &str,
        technician_id: &str,
        reason: &str,
    ) -> Result<OperationOutcome> {
        self.in_transaction("pause_assembly", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            if journey.current_status != Stage::InProgress {
                return Ok(OperationOutcome::denied(
                    barcode,
                    ErrorCode::WrongStage,
                    format!(
                        "bike {barcode} is {}, only in_progress assembly can pause",
                        journey.current_status
                    ),
                ));
            }
            if let Some(denial) = guard_technician(&journey, technician_id) {
                return Ok(denial);
            }

            conn.execute(
                "UPDATE journeys SET assembly_paused = 1, pause_reason = ?2, updated_at_us = ?3
                 WHERE barcode = ?1",
                params![barcode, reason, now_us()],
            )
            .with_context(|| format!("pause assembly for {barcode}"))?;

            debug!(barcode, technician_id, reason, "assembly paused");
            Ok(OperationOutcome::ok(
                barcode,
                journey.current_status,
                journey.bin_id,
                format!("assembly of bike {barcode} paused"),
            ))
        })
    }

    /// Resume a paused assembly. A no-op when nothing is paused.
    pub fn resume_assembly(&self, barcode: &str, technician_id: &str) -> Result<OperationOutcome> {
        self.in_transaction("resume_assembly", move |conn| {
            let Some(journey) = query::get_journey(conn, barcode)? else {
                return Ok(not_found(barcode));
            };
            if !journey.assembly_paused {
                return Ok(OperationOutcome::ok(
                    barcode,
                    journey.current_status,
                    journey.bin_id,
                    format!("bike {barcode} is not paused"),
                ));
            }
            if let Some(denial) = guard_technician(&journey, technician_id) {
                return Ok(denial);
            }

            conn.execute(
                "UPDATE journeys SET assembly_paused = 0, pause_reason = NULL, updated_at_us = ?2
                 WHERE barcode = ?1",
                params![barcode, now_us()],
            )
            .with_context(|| format!("resume assembly for {barcode}"))?;

            debug!(barcode, technician_id, "assembly resumed");
            Ok(OperationOutcome::ok(
                barcode,
                journey.current_status,
                journey.bin_id,
                format!("assembly of bike {barcode} resumed"),
            ))
        })
    }
}

// ---------------------------------------------------------------------------
// Guards and small helpers
// ---------------------------------------------------------------------------

fn not_found(barcode: &str) -> OperationOutcome {
    OperationOutcome::denied(
        barcode,
        ErrorCode::JourneyNotFound,
        format!("bike {barcode} not found"),
    )
}

fn stale(barcode: &str) -> OperationOutcome {
    OperationOutcome::denied(
        barcode,
        ErrorCode::StaleJourney,
        format!("bike {barcode} changed underneath this operation, retry"),
    )
}

/// Stage guard: the journey must sit in one of `expected`, and the
/// lifecycle matrix must admit the move to `target`.
fn guard_stage(
    journey: &JourneyRow,
    target: Stage,
    expected: &[Stage],
) -> Option<OperationOutcome> {
    if !expected.contains(&journey.current_status) {
        let expected_names: Vec<String> = expected.iter().map(ToString::to_string).collect();
        return Some(OperationOutcome::denied(
            &journey.barcode,
            ErrorCode::WrongStage,
            format!(
                "bike {} is {}, expected {}",
                journey.barcode,
                journey.current_status,
                expected_names.join(" or ")
            ),
        ));
    }

    if let Err(invalid) = journey.current_status.can_transition_to(target) {
        return Some(OperationOutcome::denied(
            &journey.barcode,
            ErrorCode::WrongStage,
            invalid.to_string(),
        ));
    }

    None
}

fn guard_technician(journey: &JourneyRow, technician_id: &str) -> Option<OperationOutcome> {
    if journey.technician_id.as_deref() == Some(technician_id) {
        return None;
    }
    Some(OperationOutcome::denied(
        &journey.barcode,
        ErrorCode::NotAssignedTechnician,
        format!(
            "bike {} is not assigned to technician {technician_id}",
            journey.barcode
        ),
    ))
}

fn json_list(values: &[String]) -> Result<Option<String>> {
    if values.is_empty() {
        return Ok(None);
    }
    let json = serde_json::to_string(values).context("serialize list column")?;
    Ok(Some(json))
}

/// Close the open pending QC checklist row with the verdict detail, or
/// record a fresh one when the verdict arrived straight from `completed`.
#[allow(clippy::too_many_arguments)]
fn close_qc_checklist(
    conn: &Connection,
    barcode: &str,
    qc_person_id: &str,
    verdict: QcVerdict,
    failure_reason: Option<&str>,
    photos_json: Option<&str>,
    inspection: Option<&QcInspection>,
    now_us: i64,
) -> Result<()> {
    let detail = inspection.cloned().unwrap_or_default();

    if let Some(open) = query::open_qc_checklist(conn, barcode)? {
        conn.execute(
            "UPDATE qc_checklists
             SET qc_person_id = ?2,
                 brake_ok = ?3, brake_notes = ?4,
                 drivetrain_ok = ?5, drivetrain_notes = ?6,
                 alignment_ok = ?7, alignment_notes = ?8,
                 torque_ok = ?9, torque_notes = ?10,
                 accessories_ok = ?11, accessories_notes = ?12,
                 result = ?13, failure_reason = ?14, photos = ?15, completed_at_us = ?16
             WHERE qc_id = ?1",
            params![
                open.qc_id,
                qc_person_id,
                detail.brake.ok,
                detail.brake.notes,
                detail.drivetrain.ok,
                detail.drivetrain.notes,
                detail.alignment.ok,
                detail.alignment.notes,
                detail.torque.ok,
                detail.torque.notes,
                detail.accessories.ok,
                detail.accessories.notes,
                verdict.to_string(),
                failure_reason,
                photos_json,
                now_us
            ],
        )
        .with_context(|| format!("close qc checklist for {barcode}"))?;
    } else {
        conn.execute(
            "INSERT INTO qc_checklists (
                barcode, qc_person_id,
                brake_ok, brake_notes, drivetrain_ok, drivetrain_notes,
                alignment_ok, alignment_notes, torque_ok, torque_notes,
                accessories_ok, accessories_notes,
                result, failure_reason, photos, started_at_us, completed_at_us
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?16)",
            params![
                barcode,
                qc_person_id,
                detail.brake.ok,
                detail.brake.notes,
                detail.drivetrain.ok,
                detail.drivetrain.notes,
                detail.alignment.ok,
                detail.alignment.notes,
                detail.torque.ok,
                detail.torque.notes,
                detail.accessories.ok,
                detail.accessories.notes,
                verdict.to_string(),
                failure_reason,
                photos_json,
                now_us
            ],
        )
        .with_context(|| format!("record qc checklist for {barcode}"))?;
    }

    Ok(())
}
