//! Job counters: `done`/`error` are plain atomics; `inProgress` is derived,
//! summed from each printer's submit queue.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::table::PrinterTable;

#[derive(Debug, Default)]
pub struct JobStats {
    done: AtomicU64,
    error: AtomicU64,
}

pub struct JobStatsSnapshot {
    pub done: u64,
    pub error: u64,
    pub in_progress: u64,
}

impl JobStats {
    pub fn record_done(&self) {
        self.done.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_error(&self) {
        self.error.fetch_add(1, Ordering::Relaxed);
    }

    /// `inProgress` is not tracked by a counter: it is always the live sum
    /// of outstanding submit-queue permits, so it can never drift from
    /// reality the way a separately-incremented/decremented count could.
    pub fn snapshot(&self, table: &PrinterTable) -> JobStatsSnapshot {
        let in_progress = table
            .iter()
            .map(|(_, entry)| entry.submit_queue.count() as u64)
            .sum();
        JobStatsSnapshot {
            done: self.done.load(Ordering::Relaxed),
            error: self.error.load(Ordering::Relaxed),
            in_progress,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use connector_core::{CapabilityDocument, NativePrinter, Presentation, PrinterIdentity, StateDocument};
    use connector_transport::BoundedSemaphore;

    use super::*;
    use crate::table::Entry;

    fn printer(name: &str) -> NativePrinter {
        NativePrinter {
            identity: PrinterIdentity {
                native_name: name.to_string(),
                cloud_id: None,
                uuid: format!("uuid-{name}"),
            },
            presentation: Presentation {
                display_name: name.to_string(),
                manufacturer: String::new(),
                model: String::new(),
            },
            description: CapabilityDocument::default(),
            state: StateDocument::default(),
            tags: Default::default(),
            is_raw: false,
            is_class: false,
        }
    }

    #[test]
    fn counters_accumulate_independently() {
        let stats = JobStats::default();
        stats.record_done();
        stats.record_done();
        stats.record_error();
        let snapshot = stats.snapshot(&PrinterTable::default());
        assert_eq!(snapshot.done, 2);
        assert_eq!(snapshot.error, 1);
        assert_eq!(snapshot.in_progress, 0);
    }

    #[tokio::test]
    async fn in_progress_sums_outstanding_submit_queue_permits() {
        let queue_a = Arc::new(BoundedSemaphore::new(2));
        let queue_b = Arc::new(BoundedSemaphore::new(2));
        queue_a.acquire().await;
        queue_b.acquire().await;
        queue_b.acquire().await;

        let table = PrinterTable::build(vec![
            (
                "A".to_string(),
                Entry {
                    cloud_id: "cloud-a".to_string(),
                    native: printer("A"),
                    submit_queue: queue_a,
                },
            ),
            (
                "B".to_string(),
                Entry {
                    cloud_id: "cloud-b".to_string(),
                    native: printer("B"),
                    submit_queue: queue_b,
                },
            ),
        ]);

        let stats = JobStats::default();
        let snapshot = stats.snapshot(&table);
        assert_eq!(snapshot.in_progress, 3);
    }
}
