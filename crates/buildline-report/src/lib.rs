#![forbid(unsafe_code)]
//! buildline-report library.
//!
//! Read-only aggregates over the buildline journey store: the technician
//! queue, the kanban board, per-technician workload, and bottleneck/aging
//! dwell-time reports. Nothing here mutates the store.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` for return types.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod bottleneck;
pub mod kanban;
pub mod queue;
pub mod workload;
