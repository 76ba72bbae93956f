//! Merge of the server's authoritative message list into the local store.
//!
//! Each server record is updated in place or queued for one bulk insert;
//! local ids the server did not mention are deleted.  The store is locked per
//! operation, not for the whole merge, and the merge is not one transaction:
//! the caller advances the cursor only after it returns, so an interrupted
//! merge is redone on the next fetch.

use std::collections::HashSet;

use serde_json::Value;
use tracing::{debug, warn};

use postbox_shared::types::MessageId;
use postbox_store::{MessagePayload, Result, SharedDatabase};

/// What one merge did, for logging.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    pub updated: usize,
    pub inserted: usize,
    pub removed: usize,
    pub skipped: usize,
}

pub fn reconcile_messages(
    store: &SharedDatabase,
    server_messages: &[Value],
) -> Result<ReconcileReport> {
    let mut report = ReconcileReport::default();
    let mut to_insert = Vec::new();
    let mut server_ids: HashSet<MessageId> = HashSet::with_capacity(server_messages.len());

    for value in server_messages {
        let payload = match MessagePayload::parse(value) {
            Ok(payload) => payload,
            Err(e) => {
                warn!(error = %e, payload = %value, "skipping invalid message payload");
                report.skipped += 1;
                continue;
            }
        };

        server_ids.insert(payload.id.clone());

        if store.with(|db| db.update_message(&payload))? == 1 {
            report.updated += 1;
        } else {
            to_insert.push(payload);
        }
    }

    if !to_insert.is_empty() {
        report.inserted = store.with(|db| db.insert_messages(&to_insert))?;
    }

    let orphans: HashSet<MessageId> = store
        .with(|db| db.message_ids())?
        .difference(&server_ids)
        .cloned()
        .collect();
    report.removed = store.with(|db| db.delete_messages(&orphans))?;

    debug!(?report, "reconciled inbox messages");
    Ok(report)
}
