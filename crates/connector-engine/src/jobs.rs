//! The job pipeline: ticket fetch, bounded download, per-printer submit,
//! state polling, outcome reporting.

use std::time::{Duration, Instant};

use connector_cloud::CloudClient;
use connector_core::{translate_ticket, CloudJobState, Job};
use connector_native::{is_terminal, job_title, map_job_state, NativeAdapter};
use connector_transport::BoundedSemaphore;
use tracing::{debug, error, warn};

use crate::stats::JobStats;
use crate::table::PrinterTable;

/// How often the pipeline polls `adapter.job_state()` for an in-flight job.
const POLL_INTERVAL: Duration = Duration::from_secs(1);

pub struct JobPipelineConfig {
    pub prefix_job_id_to_job_title: bool,
    pub cups_job_full_username: bool,
    pub spool_dir: std::path::PathBuf,
}

/// Runs one job end to end. Never panics on ordinary failures — every
/// failure path reports an outcome through `stats` and returns.
///
/// Deadlock discipline: the download semaphore is always released before
/// the printer's submit queue permit is acquired; the two are never held
/// at once.
pub async fn run_job(
    job: Job,
    table: &PrinterTable,
    adapter: &dyn NativeAdapter,
    cloud: &CloudClient,
    download_semaphore: &BoundedSemaphore,
    stats: &JobStats,
    config: &JobPipelineConfig,
) {
    // a. Look up the printer by cloudPrinterID.
    let Some(entry) = table.by_cloud_id(&job.cloud_printer_id) else {
        warn!(job_id = %job.cloud_job_id, printer = %job.cloud_printer_id, "job for unknown printer, reporting error");
        let message = format!("Failed to find GCP printer {}", job.cloud_printer_id);
        let _ = cloud
            .control(&job.cloud_job_id, CloudJobState::Aborted, "UnknownPrinter", Some(&message))
            .await;
        stats.record_error();
        return;
    };

    // b. Fetch the ticket.
    let ticket = match cloud.ticket(&job.ticket_url).await {
        Ok(ticket) => ticket,
        Err(e) => {
            warn!(job_id = %job.cloud_job_id, error = %e, "ticket fetch failed");
            let _ = cloud
                .control(&job.cloud_job_id, CloudJobState::Aborted, "TicketFetchFailure", Some(&e.to_string()))
                .await;
            stats.record_error();
            return;
        }
    };

    // c. Download, gated by the global download semaphore.
    let dest = config.spool_dir.join(format!("{}.spool", job.cloud_job_id));
    download_semaphore.acquire().await;
    let download_start = Instant::now();
    let download_result = cloud.download(&dest, &job.file_url).await;
    download_semaphore.release();
    if let Err(e) = download_result {
        warn!(job_id = %job.cloud_job_id, error = %e, "download failed");
        let _ = cloud
            .control(&job.cloud_job_id, CloudJobState::Aborted, "DownloadFailure", Some(&e.to_string()))
            .await;
        stats.record_error();
        return;
    }
    debug!(job_id = %job.cloud_job_id, elapsed = ?download_start.elapsed(), "download complete");

    // d. Trim the owner id to its local part unless full usernames are kept.
    let owner = if config.cups_job_full_username {
        job.owner_id.clone()
    } else {
        local_part(&job.owner_id).to_string()
    };

    // e. Translate the ticket, then acquire the printer's submit queue.
    let options = match translate_ticket(&ticket, &entry.native.description) {
        Ok(options) => options,
        Err(e) => {
            warn!(job_id = %job.cloud_job_id, error = %e, "ticket translation rejected");
            let _ = cloud
                .control(&job.cloud_job_id, CloudJobState::Aborted, "InvalidTicket", Some(&e.to_string()))
                .await;
            let _ = tokio::fs::remove_file(&dest).await;
            stats.record_error();
            return;
        }
    };

    let title = job_title(&job.cloud_job_id, &job.title, config.prefix_job_id_to_job_title);
    let dest_str = dest.to_string_lossy().into_owned();

    entry.submit_queue.acquire().await;
    let native_job_id = match adapter
        .submit_job(&entry.native.identity.native_name, &dest_str, &title, &owner, &options)
        .await
    {
        Ok(id) => id,
        Err(e) => {
            warn!(job_id = %job.cloud_job_id, error = %e, "submit failed");
            entry.submit_queue.release();
            let _ = cloud
                .control(&job.cloud_job_id, CloudJobState::Aborted, "PrintFailure", Some(&e.to_string()))
                .await;
            let _ = tokio::fs::remove_file(&dest).await;
            stats.record_error();
            return;
        }
    };

    // f. Poll native state until terminal, reporting each observed change.
    let mut last_reported: Option<(CloudJobState, Option<String>)> = None;
    loop {
        let native_state = match adapter.job_state(&native_job_id).await {
            Ok(state) => state,
            Err(e) => {
                error!(job_id = %job.cloud_job_id, native_job_id = %native_job_id, error = %e, "job state poll failed");
                tokio::time::sleep(POLL_INTERVAL).await;
                continue;
            }
        };
        let mapped = map_job_state(native_state);
        let message = mapped.cause.map(|c| format!("{c:?}"));
        let changed = last_reported.as_ref().map(|(s, m)| (*s, m.clone())) != Some((mapped.cloud_state, message.clone()));
        if changed {
            let native_status = format!("{native_state:?}");
            if let Err(e) = cloud
                .control(&job.cloud_job_id, mapped.cloud_state, &native_status, message.as_deref())
                .await
            {
                warn!(job_id = %job.cloud_job_id, error = %e, "control report failed, will retry on next state change");
            } else {
                last_reported = Some((mapped.cloud_state, message));
            }
        }

        // g. Terminal: release the permit, delete the temp file, record the outcome.
        if is_terminal(mapped.cloud_state) {
            entry.submit_queue.release();
            let _ = tokio::fs::remove_file(&dest).await;
            match mapped.cloud_state {
                CloudJobState::Done => stats.record_done(),
                _ => stats.record_error(),
            }
            return;
        }

        tokio::time::sleep(POLL_INTERVAL).await;
    }
}

fn local_part(owner_id: &str) -> &str {
    owner_id.split('@').next().unwrap_or(owner_id)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_part_strips_domain() {
        assert_eq!(local_part("alice@example.com"), "alice");
        assert_eq!(local_part("alice"), "alice");
    }
}
