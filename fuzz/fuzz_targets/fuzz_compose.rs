//! Fuzz target for the compose walk.
//!
//! Drives the client with an arbitrary sequence of enqueue, transaction and
//! template calls, then checks that compose never panics and returns exactly
//! the operations that were not rolled back.

#![no_main]

use libfuzzer_sys::fuzz_target;
use movilizer_outbox::{MasterdataEntry, OutboxClient, OutboxConfig};

fuzz_target!(|data: &[u8]| {
    let Ok(mut client) = OutboxClient::new(OutboxConfig::for_testing(1)) else {
        return;
    };

    let mut committed = 0usize;
    let mut open: Option<usize> = None;
    let mut pools = std::collections::HashSet::new();

    for chunk in data.chunks(2) {
        let op = chunk[0] % 8;
        let arg = chunk.get(1).copied().unwrap_or(0);
        match op {
            0 => client.enqueue_movelet_deletion(&format!("M{arg}"), None),
            1 => client.enqueue_participant_reset(&format!("+{arg}")),
            2 => client.enqueue_all_movelets_assignment_deletion(&format!("+{arg}")),
            3 => {
                if client.begin_transaction().is_ok() {
                    open = Some(0);
                }
                continue;
            }
            4 => {
                if client.commit_transaction().is_ok() {
                    committed += open.take().unwrap_or(0);
                }
                continue;
            }
            5 => {
                let _ = client.rollback_transaction();
                open = None;
                continue;
            }
            6 => {
                let pool = format!("pool-{}", arg % 4);
                client
                    .masterdata_template(&pool)
                    .update(MasterdataEntry::new(format!("k{arg}")));
                pools.insert(pool);
                continue;
            }
            _ => {
                let request = client.compose_request().expect("compose must not fail");
                assert_eq!(request.operation_count(), committed + pools.len());
                committed = 0;
                pools.clear();
                continue;
            }
        }
        match open.as_mut() {
            Some(pending) => *pending += 1,
            None => committed += 1,
        }
    }

    let request = client.compose_request().expect("compose must not fail");
    assert_eq!(request.operation_count(), committed + pools.len());
});
