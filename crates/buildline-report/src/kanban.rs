//! Kanban board and per-stage counts.

use anyhow::{Context, Result};
use rusqlite::{Connection, params, types::Type};
use serde::Serialize;
use std::collections::HashMap;
use std::str::FromStr;

use buildline_core::model::journey::Stage;

/// One card on the kanban board.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KanbanCard {
    pub barcode: String,
    pub model_sku: String,
    pub priority: bool,
    pub technician_id: Option<String>,
    pub bin_id: Option<i64>,
    pub updated_at_us: i64,
}

/// One column of the board: a lifecycle stage and its cards, most
/// recently touched first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct KanbanColumn {
    pub stage: Stage,
    pub cards: Vec<KanbanCard>,
}

/// The full board: one column per lifecycle stage in workflow order,
/// empty columns included.
pub fn kanban_board(conn: &Connection) -> Result<Vec<KanbanColumn>> {
    let mut columns: Vec<KanbanColumn> = Stage::ALL
        .iter()
        .map(|stage| KanbanColumn {
            stage: *stage,
            cards: Vec::new(),
        })
        .collect();

    let mut stmt = conn
        .prepare(
            "SELECT barcode, model_sku, current_status, priority, technician_id,
                    bin_id, updated_at_us
             FROM journeys
             ORDER BY updated_at_us DESC, barcode ASC",
        )
        .context("prepare kanban query")?;

    let rows = stmt
        .query_map(params![], |row| {
            let status: String = row.get(2)?;
            let stage = Stage::from_str(&status).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(2, Type::Text, Box::new(error))
            })?;
            Ok((
                stage,
                KanbanCard {
                    barcode: row.get(0)?,
                    model_sku: row.get(1)?,
                    priority: row.get(3)?,
                    technician_id: row.get(4)?,
                    bin_id: row.get(5)?,
                    updated_at_us: row.get(6)?,
                },
            ))
        })
        .context("query kanban board")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read kanban board rows")?;

    for (stage, card) in rows {
        if let Some(column) = columns.iter_mut().find(|column| column.stage == stage) {
            column.cards.push(card);
        }
    }

    Ok(columns)
}

/// Journey counts per lifecycle stage.
pub fn counts_by_stage(conn: &Connection) -> Result<HashMap<Stage, usize>> {
    let mut stmt = conn
        .prepare("SELECT current_status, COUNT(*) FROM journeys GROUP BY current_status")
        .context("prepare stage count query")?;

    let rows = stmt
        .query_map(params![], |row| {
            let status: String = row.get(0)?;
            let count: i64 = row.get(1)?;
            let stage = Stage::from_str(&status).map_err(|error| {
                rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(error))
            })?;
            Ok((stage, count))
        })
        .context("query stage counts")?
        .collect::<rusqlite::Result<Vec<_>>>()
        .context("read stage counts")?;

    let mut counts = HashMap::new();
    for (stage, count) in rows {
        counts.insert(stage, usize::try_from(count).unwrap_or_default());
    }
    Ok(counts)
}
