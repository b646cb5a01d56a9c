//! Queue ordering: priority items always surface first; within a
//! priority tier, first-assigned-first-served.

use buildline_core::db::open_in_memory;
use buildline_report::queue::technician_queue;
use proptest::prelude::*;
use rusqlite::{Connection, params};

fn insert_queued_journey(
    conn: &Connection,
    barcode: &str,
    priority: bool,
    assigned_at_us: i64,
    status: &str,
) {
    conn.execute(
        "INSERT INTO journeys (
            barcode, model_sku, current_status, technician_id, priority,
            assigned_at_us, inwarded_at_us, created_at_us, updated_at_us
         ) VALUES (?1, 'MTB-29', ?2, 'tech-1', ?3, ?4, 1, 1, 1)",
        params![barcode, status, priority, assigned_at_us],
    )
    .expect("insert journey");
}

#[test]
fn priority_tier_then_assignment_order() {
    let conn = open_in_memory().expect("open store");
    insert_queued_journey(&conn, "BK001", false, 10, "assigned");
    insert_queued_journey(&conn, "BK002", true, 40, "in_progress");
    insert_queued_journey(&conn, "BK003", false, 5, "in_progress");
    insert_queued_journey(&conn, "BK004", true, 20, "assigned");

    let queue = technician_queue(&conn, "tech-1").expect("queue");
    let barcodes: Vec<&str> = queue.iter().map(|entry| entry.barcode.as_str()).collect();
    // Priority bikes first (oldest assignment leading), then the rest.
    assert_eq!(barcodes, vec!["BK004", "BK002", "BK003", "BK001"]);
}

proptest! {
    #[test]
    fn queue_order_is_priority_desc_then_assigned_asc(
        entries in proptest::collection::vec((any::<bool>(), 0_i64..10_000), 1..24),
    ) {
        let conn = open_in_memory().expect("open store");
        for (idx, (priority, assigned_at)) in entries.iter().enumerate() {
            insert_queued_journey(
                &conn,
                &format!("BK{idx:03}"),
                *priority,
                *assigned_at,
                if idx % 2 == 0 { "assigned" } else { "in_progress" },
            );
        }

        let queue = technician_queue(&conn, "tech-1").expect("queue");
        prop_assert_eq!(queue.len(), entries.len());

        for pair in queue.windows(2) {
            // Priority tier never goes back up.
            prop_assert!(pair[0].priority >= pair[1].priority);
            if pair[0].priority == pair[1].priority {
                prop_assert!(pair[0].assigned_at_us <= pair[1].assigned_at_us);
            }
        }

        let priority_count = queue.iter().filter(|entry| entry.priority).count();
        let expected = entries.iter().filter(|(priority, _)| *priority).count();
        prop_assert_eq!(priority_count, expected);
        // Every priority entry sits before every non-priority entry.
        prop_assert!(queue[..priority_count].iter().all(|entry| entry.priority));
    }
}
