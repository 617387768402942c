//! Pull-side reconciliation with the remote service.
//!
//! Blocks are immutable, so reconciling is a set union by block id:
//! remote blocks unknown locally are inserted, known ones are left alone.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::remote::RemoteService;
use crate::error::CoreError;
use crate::round::{Block, BlockSource};
use crate::storage::Database;

/// A remote record that could not be merged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedBlock {
    pub id: Option<String>,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileReport {
    pub user_id: i64,
    pub date: NaiveDate,
    pub fetched: usize,
    /// Ids of blocks inserted locally.
    pub inserted: Vec<String>,
    pub already_known: usize,
    pub skipped: Vec<SkippedBlock>,
}

/// Fetch the remote blocks of `user_id` on `date` and insert the ones
/// missing locally.
///
/// # Errors
/// Remote failures and storage errors. Malformed remote records are
/// reported in [`ReconcileReport::skipped`] instead.
pub async fn reconcile(
    remote: &dyn RemoteService,
    db: &Database,
    user_id: i64,
    date: NaiveDate,
) -> Result<ReconcileReport, CoreError> {
    let drafts = remote.fetch_blocks(user_id, date).await?;
    let mut report = ReconcileReport {
        user_id,
        date,
        fetched: drafts.len(),
        inserted: Vec::new(),
        already_known: 0,
        skipped: Vec::new(),
    };

    for draft in drafts {
        let id = draft.id.clone();
        let skip = |reason: String| SkippedBlock {
            id: id.clone(),
            reason,
        };

        if draft.id.is_none() {
            report.skipped.push(skip("remote block has no id".into()));
            continue;
        }
        if draft.user_id != user_id || draft.date != date {
            report.skipped.push(skip(format!(
                "belongs to user {} on {}",
                draft.user_id, draft.date
            )));
            continue;
        }

        let block = match Block::from_draft(draft, BlockSource::Remote) {
            Ok(block) => block,
            Err(err) => {
                warn!(block_id = ?id, error = %err, "skipping malformed remote block");
                report.skipped.push(skip(err.to_string()));
                continue;
            }
        };
        if db.insert_block(&block)? {
            report.inserted.push(block.id().to_string());
        } else {
            report.already_known += 1;
        }
    }

    info!(
        user_id,
        %date,
        fetched = report.fetched,
        inserted = report.inserted.len(),
        skipped = report.skipped.len(),
        "reconciled"
    );
    Ok(report)
}
