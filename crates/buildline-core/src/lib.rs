#![forbid(unsafe_code)]
//! buildline-core library.
//!
//! Journey store, zoned-bin registry and allocator, audit trails, the
//! assembly workflow engine, and the sale gate.
//!
//! # Conventions
//!
//! - **Errors**: `anyhow::Result` at the store layer; business denials are
//!   structured [`engine::OperationOutcome`] values, never `Err`.
//! - **Logging**: `tracing` macros (`info!`, `warn!`, `error!`, `debug!`).

pub mod allocator;
pub mod audit;
pub mod bins;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod gate;
pub mod model;
