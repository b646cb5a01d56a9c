//! Read models over journeys driven through the real workflow engine.

use buildline_core::bins::provision_bin;
use buildline_core::db::open_in_memory;
use buildline_core::engine::Engine;
use buildline_core::model::bin::Zone;
use buildline_core::model::journey::{Checklist, Stage};
use buildline_report::bottleneck::{aging_report, average_dwell_by_technician, now_us};
use buildline_report::kanban::{counts_by_stage, kanban_board};
use buildline_report::queue::technician_queue;
use buildline_report::workload::technician_workload;
use rusqlite::Connection;

const FULL_CHECKLIST: Checklist = Checklist {
    tyres: true,
    brakes: true,
    gears: true,
};

fn store_with_fleet() -> Connection {
    let conn = open_in_memory().expect("open store");
    for (code, zone) in [
        ("IN-01", Zone::InwardZone),
        ("A-01", Zone::AssemblyZone),
        ("R-01", Zone::ReadyZone),
    ] {
        provision_bin(&conn, "loc-blr", code, zone, 20, 1).expect("provision bin");
    }

    let engine = Engine::new(&conn);
    // tech-1: one priority bike in progress, one waiting, one sold-ready.
    for (barcode, priority) in [("BK001", false), ("BK002", true), ("BK003", false)] {
        engine
            .intake_bike(barcode, "MTB-29", None, Some("loc-blr"), priority, "intake")
            .expect("intake");
        engine
            .assign_to_technician(barcode, "tech-1", "sup-1")
            .expect("assign");
    }
    engine.start_assembly("BK002", "tech-1").expect("start");
    engine.start_assembly("BK003", "tech-1").expect("start");
    engine
        .complete_assembly("BK003", "tech-1", FULL_CHECKLIST)
        .expect("complete");

    // tech-2: a single untouched assignment.
    engine
        .intake_bike("BK010", "CITY-26", None, Some("loc-blr"), false, "intake")
        .expect("intake");
    engine
        .assign_to_technician("BK010", "tech-2", "sup-1")
        .expect("assign");

    // One bike still waiting at the dock.
    engine
        .intake_bike("BK020", "KIDS-20", None, Some("loc-blr"), false, "intake")
        .expect("intake");

    conn
}

#[test]
fn queue_reflects_live_assignments() {
    let conn = store_with_fleet();
    let queue = technician_queue(&conn, "tech-1").expect("queue");

    let barcodes: Vec<&str> = queue.iter().map(|entry| entry.barcode.as_str()).collect();
    // BK003 reached ready_for_sale and left the queue; priority BK002 leads.
    assert_eq!(barcodes, vec!["BK002", "BK001"]);
    assert!(queue[0].priority);
    assert_eq!(queue[0].status, Stage::InProgress);
    assert_eq!(queue[1].status, Stage::Assigned);
}

#[test]
fn counts_and_board_agree_with_engine_state() {
    let conn = store_with_fleet();

    let counts = counts_by_stage(&conn).expect("counts");
    assert_eq!(counts.get(&Stage::Inwarded), Some(&1));
    assert_eq!(counts.get(&Stage::Assigned), Some(&2));
    assert_eq!(counts.get(&Stage::InProgress), Some(&1));
    assert_eq!(counts.get(&Stage::ReadyForSale), Some(&1));

    let board = kanban_board(&conn).expect("board");
    let total_cards: usize = board.iter().map(|column| column.cards.len()).sum();
    assert_eq!(total_cards, 5);

    let ready = board
        .iter()
        .find(|column| column.stage == Stage::ReadyForSale)
        .expect("ready column");
    assert_eq!(ready.cards.len(), 1);
    assert_eq!(ready.cards[0].barcode, "BK003");
}

#[test]
fn workload_counts_active_and_finished_work() {
    let conn = store_with_fleet();
    let workload = technician_workload(&conn).expect("workload");

    assert_eq!(workload.len(), 2);
    assert_eq!(workload[0].technician_id, "tech-1");
    assert_eq!(workload[0].assigned, 1);
    assert_eq!(workload[0].in_progress, 1);
    assert_eq!(workload[0].ready_for_sale, 1);

    assert_eq!(workload[1].technician_id, "tech-2");
    assert_eq!(workload[1].assigned, 1);
    assert_eq!(workload[1].in_progress, 0);
}

#[test]
fn aging_report_sees_every_non_terminal_journey_at_zero_threshold() {
    let conn = store_with_fleet();
    let report = aging_report(&conn, now_us(), 0).expect("aging report");

    // Five journeys exist, one is terminal.
    assert_eq!(report.len(), 4);
    assert!(report.iter().all(|entry| entry.status != Stage::ReadyForSale));
    assert!(report.iter().all(|entry| entry.dwell_us >= 0));

    let dwell_by_tech = average_dwell_by_technician(&conn, now_us()).expect("dwell by tech");
    assert!(dwell_by_tech.contains_key("tech-1"));
    assert!(dwell_by_tech.contains_key("tech-2"));
}
