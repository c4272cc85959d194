//! The Printer Manager: owns the authoritative printer table, runs the
//! periodic sync loop, and drives the job pipeline.

use std::sync::Arc;
use std::time::Duration;

use connector_cloud::CloudClient;
use connector_core::NativePrinter;
use connector_native::NativeAdapter;
use connector_transport::{BoundedSemaphore, PrinterNotification};
use tokio::sync::{mpsc, Notify};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::jobs::{self, JobPipelineConfig};
use crate::stats::{JobStats, JobStatsSnapshot};
use crate::sync::{sync_cycle, SyncConfig};
use crate::table::{Entry, PrinterManagerTable, PrinterTable};

pub struct ManagerConfig {
    pub sync: SyncConfig,
    pub printer_poll_interval: Duration,
    pub job_pipeline: JobPipelineConfig,
    pub gcp_max_concurrent_downloads: usize,
}

/// Owns the printer table and the background sync/job-dispatch tasks.
/// Dropping the handle does not stop the tasks; call `quit().await` for
/// an orderly shutdown.
pub struct PrinterManager {
    table: Arc<PrinterManagerTable>,
    stats: Arc<JobStats>,
    cancel: CancellationToken,
    resync_now: Arc<Notify>,
    tasks: JoinSet<()>,
}

impl PrinterManager {
    /// Starts the sync loop and the job dispatcher. `bootstrap` seeds the
    /// initial table from the cloud's printer list so already-registered
    /// printers are recognized (not re-registered) on the first sync cycle.
    pub async fn start(
        adapter: Arc<dyn NativeAdapter>,
        cloud: Arc<CloudClient>,
        notifications: mpsc::Receiver<PrinterNotification>,
        config: ManagerConfig,
    ) -> Self {
        let initial = match cloud.list().await {
            Ok(result) => bootstrap_table(result.printers, config.sync.submit_queue_capacity),
            Err(e) => {
                warn!(error = %e, "initial cloud printer list fetch failed, starting from an empty table");
                PrinterTable::default()
            }
        };
        let printer_count = initial.len();
        let table = Arc::new(PrinterManagerTable::default());
        table.swap(initial);
        info!(printer_count, "printer manager bootstrapped");

        let stats = Arc::new(JobStats::default());
        let cancel = CancellationToken::new();
        let resync_now = Arc::new(Notify::new());
        let download_semaphore = Arc::new(BoundedSemaphore::new(config.gcp_max_concurrent_downloads.max(1)));

        let mut tasks = JoinSet::new();
        tasks.spawn(sync_loop(
            table.clone(),
            adapter.clone(),
            cloud.clone(),
            config.sync,
            config.printer_poll_interval,
            resync_now.clone(),
            cancel.clone(),
        ));
        tasks.spawn(job_dispatch_loop(
            table.clone(),
            adapter,
            cloud,
            notifications,
            download_semaphore,
            stats.clone(),
            resync_now.clone(),
            config.job_pipeline,
            cancel.clone(),
        ));

        PrinterManager {
            table,
            stats,
            cancel,
            resync_now,
            tasks,
        }
    }

    pub fn table(&self) -> Arc<PrinterTable> {
        self.table.load()
    }

    pub fn job_stats(&self) -> JobStatsSnapshot {
        self.stats.snapshot(&self.table())
    }

    /// A clone of the table handle, independent of this manager's lifetime.
    /// Lets a stats composer (the supervisor's `StatsSource` impl) keep
    /// observing the table after it no longer holds the manager itself.
    pub fn table_handle(&self) -> Arc<PrinterManagerTable> {
        self.table.clone()
    }

    /// A clone of the job-stats handle; see `table_handle`.
    pub fn stats_handle(&self) -> Arc<JobStats> {
        self.stats.clone()
    }

    /// Signals both background loops to exit and waits for acknowledgment.
    pub async fn quit(mut self) {
        self.cancel.cancel();
        while self.tasks.join_next().await.is_some() {}
    }
}

fn bootstrap_table(printers: Vec<connector_cloud::CloudPrinterSummary>, submit_queue_capacity: usize) -> PrinterTable {
    let entries = printers
        .into_iter()
        .map(|summary| {
            let native = NativePrinter {
                identity: connector_core::PrinterIdentity {
                    native_name: summary.native_name.clone(),
                    cloud_id: Some(summary.cloud_id.clone()),
                    uuid: String::new(),
                },
                presentation: connector_core::Presentation {
                    display_name: summary.native_name.clone(),
                    manufacturer: String::new(),
                    model: String::new(),
                },
                description: connector_core::CapabilityDocument::default(),
                state: connector_core::StateDocument::default(),
                tags: Default::default(),
                is_raw: false,
                is_class: false,
            };
            (
                summary.native_name,
                Entry {
                    cloud_id: summary.cloud_id,
                    native,
                    submit_queue: Arc::new(BoundedSemaphore::new(submit_queue_capacity)),
                },
            )
        })
        .collect();
    PrinterTable::build(entries)
}

#[allow(clippy::too_many_arguments)]
async fn sync_loop(
    table: Arc<PrinterManagerTable>,
    adapter: Arc<dyn NativeAdapter>,
    cloud: Arc<CloudClient>,
    config: SyncConfig,
    poll_interval: Duration,
    resync_now: Arc<Notify>,
    cancel: CancellationToken,
) {
    let mut ticker = tokio::time::interval(poll_interval);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("sync loop shutting down");
                return;
            }
            _ = ticker.tick() => {}
            _ = resync_now.notified() => {}
        }

        let current = table.load();
        let new_table = sync_cycle(adapter.as_ref(), &cloud, &current, &config).await;
        debug!(printer_count = new_table.len(), "sync cycle complete");
        table.swap(new_table);
    }
}

#[allow(clippy::too_many_arguments)]
async fn job_dispatch_loop(
    table: Arc<PrinterManagerTable>,
    adapter: Arc<dyn NativeAdapter>,
    cloud: Arc<CloudClient>,
    mut notifications: mpsc::Receiver<PrinterNotification>,
    download_semaphore: Arc<BoundedSemaphore>,
    stats: Arc<JobStats>,
    resync_now: Arc<Notify>,
    job_pipeline_config: JobPipelineConfig,
    cancel: CancellationToken,
) {
    let job_pipeline_config = Arc::new(job_pipeline_config);
    let mut workers = JoinSet::new();

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("job dispatcher shutting down");
                while workers.join_next().await.is_some() {}
                return;
            }
            notification = notifications.recv() => {
                let Some(notification) = notification else {
                    warn!("notification channel closed, job dispatcher idling until shutdown");
                    cancel.cancelled().await;
                    while workers.join_next().await.is_some() {}
                    return;
                };
                match notification {
                    PrinterNotification::NewJobs(_cloud_printer_id) => {
                        dispatch_next_batch(
                            &table, &adapter, &cloud, &download_semaphore, &stats, &job_pipeline_config, &mut workers,
                        ).await;
                    }
                    PrinterNotification::PrinterDelete(cloud_printer_id) => {
                        debug!(printer = %cloud_printer_id, "printer delete notification, triggering early resync");
                        resync_now.notify_one();
                    }
                }
            }
            Some(_) = workers.join_next(), if !workers.is_empty() => {}
        }
    }
}

async fn dispatch_next_batch(
    table: &Arc<PrinterManagerTable>,
    adapter: &Arc<dyn NativeAdapter>,
    cloud: &Arc<CloudClient>,
    download_semaphore: &Arc<BoundedSemaphore>,
    stats: &Arc<JobStats>,
    job_pipeline_config: &Arc<JobPipelineConfig>,
    workers: &mut JoinSet<()>,
) {
    let jobs = match cloud.next_job_batch().await {
        Ok(jobs) => jobs,
        Err(e) => {
            warn!(error = %e, "next job batch fetch failed");
            return;
        }
    };
    for job in jobs {
        let table = table.clone();
        let adapter = adapter.clone();
        let cloud = cloud.clone();
        let download_semaphore = download_semaphore.clone();
        let stats = stats.clone();
        let job_pipeline_config = job_pipeline_config.clone();
        let job = connector_core::Job {
            cloud_job_id: job.cloud_job_id,
            cloud_printer_id: job.cloud_printer_id,
            ticket_url: job.ticket_url,
            file_url: job.file_url,
            owner_id: job.owner_id,
            title: job.title,
        };
        workers.spawn(async move {
            let current = table.load();
            jobs::run_job(
                job,
                &current,
                adapter.as_ref(),
                &cloud,
                &download_semaphore,
                &stats,
                &job_pipeline_config,
            )
            .await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_cloud::OAuthConfig;
    use connector_native::LocalAdapter;

    use crate::filter::FilterConfig;

    fn cloud() -> CloudClient {
        CloudClient::new(
            "https://example.invalid",
            OAuthConfig {
                token_url: "https://example.invalid/token".to_string(),
                client_id: "client".to_string(),
                client_secret: "secret".to_string(),
                refresh_token: "refresh".to_string(),
            },
        )
    }

    #[tokio::test]
    async fn starts_with_empty_table_when_bootstrap_list_fails() {
        let (_tx, rx) = mpsc::channel(5);
        let manager = PrinterManager::start(
            Arc::new(LocalAdapter::new()),
            Arc::new(cloud()),
            rx,
            ManagerConfig {
                sync: SyncConfig {
                    filter: FilterConfig::default(),
                    build_date: "2026-01-01".to_string(),
                    hostname: "test-host".to_string(),
                    notification_channel: "xmpp".to_string(),
                    submit_queue_capacity: 4,
                },
                printer_poll_interval: Duration::from_secs(3600),
                job_pipeline: JobPipelineConfig {
                    prefix_job_id_to_job_title: true,
                    cups_job_full_username: false,
                    spool_dir: std::env::temp_dir(),
                },
                gcp_max_concurrent_downloads: 2,
            },
        )
        .await;
        assert!(manager.table().is_empty());
        manager.quit().await;
    }
}
