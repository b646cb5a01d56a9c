//! The sale gate: the one interface the invoicing subsystem consults
//! before finalizing an invoice that references a physical asset.

use anyhow::Result;
use rusqlite::Connection;

use crate::db::query;
use crate::model::journey::Stage;

/// Whether a barcode may be invoiced, and why not when it may not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InvoiceDecision {
    pub can_invoice: bool,
    pub message: String,
    pub status: Option<Stage>,
    pub sku: Option<String>,
}

/// A bike may be invoiced if and only if its journey is `ready_for_sale`.
/// Unknown barcodes refuse with "not found"; anything mid-workflow refuses
/// with a message naming the blocking stage.
pub fn can_invoice_item(conn: &Connection, barcode: &str) -> Result<InvoiceDecision> {
    let Some(journey) = query::get_journey(conn, barcode)? else {
        return Ok(InvoiceDecision {
            can_invoice: false,
            message: format!("bike {barcode} not found"),
            status: None,
            sku: None,
        });
    };

    if journey.current_status == Stage::ReadyForSale {
        Ok(InvoiceDecision {
            can_invoice: true,
            message: format!("bike {barcode} is ready for sale"),
            status: Some(Stage::ReadyForSale),
            sku: Some(journey.model_sku),
        })
    } else {
        Ok(InvoiceDecision {
            can_invoice: false,
            message: format!(
                "bike {barcode} cannot be invoiced while {}",
                journey.current_status
            ),
            status: Some(journey.current_status),
            sku: Some(journey.model_sku),
        })
    }
}
