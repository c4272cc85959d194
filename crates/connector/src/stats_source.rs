//! Composes the Printer Manager's table/job stats with the native
//! adapter's own enumeration to satisfy `connector_monitor::StatsSource`.
//! `cups_conn_qty` is hardcoded to 0: there is no real CUPS connection
//! pool behind the `LocalAdapter` stand-in this daemon drives.

use std::sync::Arc;

use connector_engine::{JobStats, PrinterManagerTable};
use connector_monitor::{StatsSnapshot, StatsSource};
use connector_native::NativeAdapter;

pub struct SupervisorStats {
    pub table: Arc<PrinterManagerTable>,
    pub stats: Arc<JobStats>,
    pub adapter: Arc<dyn NativeAdapter>,
    pub cups_conn_max_qty: u64,
}

#[async_trait::async_trait]
impl StatsSource for SupervisorStats {
    async fn collect(&self) -> Result<StatsSnapshot, String> {
        let table = self.table.load();
        let job_stats = self.stats.snapshot(&table);
        let local_printers = self
            .adapter
            .list_printers()
            .await
            .map_err(|e| e.to_string())?;
        let raw_printers = local_printers.iter().filter(|p| p.is_raw).count();

        Ok(StatsSnapshot {
            cups_printers: local_printers.len() as u64,
            cups_raw_printers: raw_printers as u64,
            gcp_printers: table.len() as u64,
            local_printers: local_printers.len() as u64,
            cups_conn_qty: 0,
            cups_conn_max_qty: self.cups_conn_max_qty,
            jobs_done: job_stats.done,
            jobs_error: job_stats.error,
            jobs_in_progress: job_stats.in_progress,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{CapabilityDocument, NativePrinter, Presentation, PrinterIdentity, StateDocument};
    use connector_native::LocalAdapter;

    fn printer(name: &str, is_raw: bool) -> NativePrinter {
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
            is_raw,
            is_class: false,
        }
    }

    #[tokio::test]
    async fn collect_counts_raw_printers_and_reports_configured_max_connections() {
        let local = LocalAdapter::new();
        local.add_printer(printer("HP1", false), "*PPD-HP1");
        local.add_printer(printer("Raw1", true), "*PPD-Raw1");
        let adapter: Arc<dyn NativeAdapter> = Arc::new(local);

        let stats = Arc::new(SupervisorStats {
            table: Arc::new(PrinterManagerTable::default()),
            stats: Arc::new(JobStats::default()),
            adapter,
            cups_conn_max_qty: 5,
        });

        let snapshot = stats.collect().await.unwrap();
        assert_eq!(snapshot.cups_printers, 2);
        assert_eq!(snapshot.cups_raw_printers, 1);
        assert_eq!(snapshot.local_printers, 2);
        assert_eq!(snapshot.gcp_printers, 0);
        assert_eq!(snapshot.cups_conn_qty, 0);
        assert_eq!(snapshot.cups_conn_max_qty, 5);
    }
}
