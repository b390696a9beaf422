//! Sync engine: pulls ledger pages into the local mirror until caught up.

use crate::mirror::{LocalMirror, SecretRecord};
use crate::sync::cancel::Cancellation;
use crate::sync::client::RemoteLedger;
use crate::{KeeperError, Result};
use tracing::{debug, info};

/// Result of pulling and applying a single page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchOutcome {
    /// A full page was applied; more may be waiting.
    More { applied: usize },
    /// The server reported no further records past the cursor.
    CaughtUp { applied: usize },
}

/// Summary of a completed sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SyncReport {
    pub batches: usize,
    pub applied: usize,
    pub cursor: i64,
}

/// Drives the pull loop against a remote ledger.
///
/// Holds the mirror exclusively for the duration of the run.
pub struct SyncEngine<'a, R: RemoteLedger> {
    remote: &'a R,
    mirror: &'a mut LocalMirror,
    page_size: u32,
}

impl<'a, R: RemoteLedger> SyncEngine<'a, R> {
    pub fn new(remote: &'a R, mirror: &'a mut LocalMirror, page_size: u32) -> Self {
        Self {
            remote,
            mirror,
            page_size: page_size.max(1),
        }
    }

    /// Pull one page past the current cursor and apply it atomically.
    pub async fn pull_once(&mut self, cancel: &Cancellation) -> Result<BatchOutcome> {
        let cursor = self.mirror.current_cursor()?;
        let page = cancel
            .guard(self.remote.pull(cursor, self.page_size))
            .await?;

        if page.secure_data.is_empty() {
            return Ok(BatchOutcome::CaughtUp { applied: 0 });
        }

        let records: Vec<SecretRecord> = page.secure_data.into_iter().map(Into::into).collect();
        let applied = self.mirror.apply_batch(&records)?;
        let advanced = self.mirror.current_cursor()?;
        debug!(
            "Applied {} records, cursor {} -> {}",
            applied, cursor, advanced
        );

        if page.fully_synced {
            return Ok(BatchOutcome::CaughtUp { applied });
        }
        if advanced <= cursor {
            return Err(KeeperError::Server {
                status: 200,
                message: format!("sync page did not advance past history id {}", cursor),
            });
        }
        Ok(BatchOutcome::More { applied })
    }

    /// Loop until the server reports the mirror is fully synced.
    ///
    /// A failure aborts the run; batches already applied stay in place and the
    /// next run resumes from the advanced cursor.
    pub async fn sync_to_completion(&mut self, cancel: &Cancellation) -> Result<SyncReport> {
        let mut report = SyncReport::default();

        loop {
            let outcome = self.pull_once(cancel).await?;
            report.batches += 1;
            match outcome {
                BatchOutcome::More { applied } => report.applied += applied,
                BatchOutcome::CaughtUp { applied } => {
                    report.applied += applied;
                    break;
                }
            }
        }

        report.cursor = self.mirror.current_cursor()?;
        info!(
            "Sync complete: {} records in {} batches, cursor {}",
            report.applied, report.batches, report.cursor
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::models::{SyncRecord, SyncResponse};
    use std::cell::{Cell, RefCell};

    /// In-memory ledger that pages by history id like the server does.
    struct FakeLedger {
        records: RefCell<Vec<SyncRecord>>,
        calls: Cell<usize>,
        fail_on_call: Cell<Option<usize>>,
    }

    impl FakeLedger {
        fn with_records(count: i64) -> Self {
            let records = (1..=count)
                .map(|i| SyncRecord {
                    id: i,
                    data: vec![i as u8; 4],
                    metadata: format!("m{}", i),
                    is_active: true,
                    history_id: i,
                })
                .collect();
            Self {
                records: RefCell::new(records),
                calls: Cell::new(0),
                fail_on_call: Cell::new(None),
            }
        }

        fn touch(&self, id: i64, history_id: i64, active: bool) {
            let mut records = self.records.borrow_mut();
            if let Some(r) = records.iter_mut().find(|r| r.id == id) {
                r.history_id = history_id;
                r.is_active = active;
                r.data = vec![0xEE; 4];
            }
            records.sort_by_key(|r| r.history_id);
        }
    }

    impl RemoteLedger for FakeLedger {
        async fn pull(&self, last_history_id: i64, limit: u32) -> Result<SyncResponse> {
            let call = self.calls.get() + 1;
            self.calls.set(call);
            if self.fail_on_call.get() == Some(call) {
                return Err(KeeperError::Network("connection reset".to_string()));
            }

            let page: Vec<SyncRecord> = self
                .records
                .borrow()
                .iter()
                .filter(|r| r.history_id > last_history_id)
                .take(limit as usize)
                .cloned()
                .collect();
            let fully_synced = page.len() < limit as usize;
            Ok(SyncResponse {
                secure_data: page,
                fully_synced,
            })
        }
    }

    #[tokio::test]
    async fn test_empty_ledger() {
        let ledger = FakeLedger::with_records(0);
        let mut mirror = LocalMirror::in_memory().unwrap();

        let report = SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&Cancellation::new())
            .await
            .unwrap();

        assert_eq!(
            report,
            SyncReport {
                batches: 1,
                applied: 0,
                cursor: 0
            }
        );
    }

    #[tokio::test]
    async fn test_pages_until_caught_up() {
        let ledger = FakeLedger::with_records(25);
        let mut mirror = LocalMirror::in_memory().unwrap();

        let report = SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&Cancellation::new())
            .await
            .unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.applied, 25);
        assert_eq!(report.cursor, 25);
        assert_eq!(mirror.all_records().unwrap().len(), 25);
    }

    #[tokio::test]
    async fn test_exact_page_multiple_ends_on_empty_page() {
        let ledger = FakeLedger::with_records(20);
        let mut mirror = LocalMirror::in_memory().unwrap();

        let report = SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&Cancellation::new())
            .await
            .unwrap();

        assert_eq!(report.batches, 3);
        assert_eq!(report.applied, 20);
        assert_eq!(ledger.calls.get(), 3);
    }

    #[tokio::test]
    async fn test_second_sync_is_noop() {
        let ledger = FakeLedger::with_records(7);
        let mut mirror = LocalMirror::in_memory().unwrap();
        let cancel = Cancellation::new();

        SyncEngine::new(&ledger, &mut mirror, 5)
            .sync_to_completion(&cancel)
            .await
            .unwrap();
        let before = mirror.all_records().unwrap();

        let report = SyncEngine::new(&ledger, &mut mirror, 5)
            .sync_to_completion(&cancel)
            .await
            .unwrap();

        assert_eq!(report.applied, 0);
        assert_eq!(report.cursor, 7);
        assert_eq!(mirror.all_records().unwrap(), before);
    }

    #[tokio::test]
    async fn test_resume_after_failure() {
        let ledger = FakeLedger::with_records(25);
        ledger.fail_on_call.set(Some(2));
        let mut mirror = LocalMirror::in_memory().unwrap();
        let cancel = Cancellation::new();

        let result = SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&cancel)
            .await;
        assert!(matches!(result, Err(KeeperError::Network(_))));
        assert_eq!(mirror.current_cursor().unwrap(), 10);

        let report = SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&cancel)
            .await
            .unwrap();
        assert_eq!(report.applied, 15);
        assert_eq!(report.cursor, 25);
    }

    #[tokio::test]
    async fn test_updates_and_deletes_propagate() {
        let ledger = FakeLedger::with_records(3);
        let mut mirror = LocalMirror::in_memory().unwrap();
        let cancel = Cancellation::new();

        SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&cancel)
            .await
            .unwrap();

        ledger.touch(2, 4, true);
        ledger.touch(3, 5, false);

        let report = SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&cancel)
            .await
            .unwrap();
        assert_eq!(report.applied, 2);
        assert_eq!(report.cursor, 5);

        let active: Vec<i64> = mirror.list_active().unwrap().iter().map(|r| r.id).collect();
        assert_eq!(active, vec![2]);
        assert_eq!(mirror.get(2).unwrap().unwrap().data, vec![0xEE; 4]);
    }

    #[tokio::test]
    async fn test_cancelled_sync_leaves_mirror_untouched() {
        let ledger = FakeLedger::with_records(5);
        let mut mirror = LocalMirror::in_memory().unwrap();
        let cancel = Cancellation::new();
        cancel.cancel();

        let result = SyncEngine::new(&ledger, &mut mirror, 10)
            .sync_to_completion(&cancel)
            .await;
        assert!(matches!(result, Err(KeeperError::Cancelled)));
        assert_eq!(mirror.current_cursor().unwrap(), 0);
    }
}
