//! The native print adapter contract. The real adapter (CUPS bindings,
//! Windows spooler bindings, PPD/SNMP parsing) is an external
//! collaborator out of scope; this crate only defines the trait boundary
//! and a `LocalAdapter` test double realistic enough to exercise the rest
//! of the workspace.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use connector_core::{NativePrinter, OptionMap};
use thiserror::Error;

use crate::state::NativeJobState;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("printer {0:?} not found")]
    PrinterNotFound(String),
    #[error("job {0:?} not found")]
    JobNotFound(String),
    #[error("submit failed: {0}")]
    SubmitFailed(String),
    #[error("ppd fetch failed for {0:?}: {1}")]
    PpdFetchFailed(String, String),
}

/// Title prefix applied to jobs submitted on behalf of the cloud, when
/// configured: `gcp:{cloudJobID} {title}`.
pub fn job_title(cloud_job_id: &str, base_title: &str, prefix_enabled: bool) -> String {
    if prefix_enabled {
        format!("gcp:{cloud_job_id} {base_title}")
    } else {
        base_title.to_string()
    }
}

#[async_trait]
pub trait NativeAdapter: Send + Sync {
    /// Enumerate local printers, honoring raw/class filtering upstream
    /// (the adapter reports `is_raw`/`is_class`; filtering policy is the
    /// Printer Manager's job, not the adapter's).
    async fn list_printers(&self) -> Result<Vec<NativePrinter>, AdapterError>;

    /// Fetch PPD text for a printer by native name, used when registering
    /// or updating with the cloud.
    async fn fetch_ppd(&self, native_name: &str) -> Result<String, AdapterError>;

    /// Submit a downloaded job file with a translated option map and owning
    /// user; returns a native job id used for subsequent polling.
    async fn submit_job(
        &self,
        native_name: &str,
        file_path: &str,
        title: &str,
        owner: &str,
        options: &OptionMap,
    ) -> Result<String, AdapterError>;

    /// Poll the current native state of a previously submitted job.
    async fn job_state(&self, native_job_id: &str) -> Result<NativeJobState, AdapterError>;
}

#[derive(Debug, Clone)]
struct LocalJob {
    state: NativeJobState,
}

/// In-memory `NativeAdapter` used by engine tests and available as a
/// placeholder until a real backend lands.
#[derive(Default)]
pub struct LocalAdapter {
    printers: Mutex<HashMap<String, NativePrinter>>,
    ppds: Mutex<HashMap<String, String>>,
    jobs: Mutex<HashMap<String, LocalJob>>,
    next_job_id: Mutex<u64>,
}

impl LocalAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_printer(&self, printer: NativePrinter, ppd: impl Into<String>) {
        let name = printer.identity.native_name.clone();
        self.printers.lock().unwrap().insert(name.clone(), printer);
        self.ppds.lock().unwrap().insert(name, ppd.into());
    }

    pub fn remove_printer(&self, native_name: &str) {
        self.printers.lock().unwrap().remove(native_name);
        self.ppds.lock().unwrap().remove(native_name);
    }

    /// Force a submitted job's native state, so tests can exercise the
    /// polling/state-mapping path deterministically.
    pub fn set_job_state(&self, native_job_id: &str, state: NativeJobState) {
        if let Some(job) = self.jobs.lock().unwrap().get_mut(native_job_id) {
            job.state = state;
        }
    }
}

#[async_trait]
impl NativeAdapter for LocalAdapter {
    async fn list_printers(&self) -> Result<Vec<NativePrinter>, AdapterError> {
        Ok(self.printers.lock().unwrap().values().cloned().collect())
    }

    async fn fetch_ppd(&self, native_name: &str) -> Result<String, AdapterError> {
        self.ppds
            .lock()
            .unwrap()
            .get(native_name)
            .cloned()
            .ok_or_else(|| AdapterError::PpdFetchFailed(native_name.to_string(), "no ppd on file".into()))
    }

    async fn submit_job(
        &self,
        native_name: &str,
        _file_path: &str,
        _title: &str,
        _owner: &str,
        _options: &OptionMap,
    ) -> Result<String, AdapterError> {
        if !self.printers.lock().unwrap().contains_key(native_name) {
            return Err(AdapterError::PrinterNotFound(native_name.to_string()));
        }
        let mut next = self.next_job_id.lock().unwrap();
        *next += 1;
        let id = format!("native-job-{next}");
        self.jobs.lock().unwrap().insert(
            id.clone(),
            LocalJob {
                state: NativeJobState::Pending,
            },
        );
        Ok(id)
    }

    async fn job_state(&self, native_job_id: &str) -> Result<NativeJobState, AdapterError> {
        self.jobs
            .lock()
            .unwrap()
            .get(native_job_id)
            .map(|j| j.state)
            .ok_or_else(|| AdapterError::JobNotFound(native_job_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{CapabilityDocument, Presentation, PrinterIdentity, StateDocument};

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

    #[tokio::test]
    async fn list_printers_reflects_additions_and_removals() {
        let adapter = LocalAdapter::new();
        adapter.add_printer(printer("HP1"), "*PPD-Adobe");
        let printers = adapter.list_printers().await.unwrap();
        assert_eq!(printers.len(), 1);

        adapter.remove_printer("HP1");
        assert!(adapter.list_printers().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_job_against_unknown_printer_fails() {
        let adapter = LocalAdapter::new();
        let result = adapter
            .submit_job("missing", "/tmp/x", "title", "alice", &OptionMap::new())
            .await;
        assert!(matches!(result, Err(AdapterError::PrinterNotFound(_))));
    }

    #[tokio::test]
    async fn submitted_job_starts_pending_and_can_be_advanced() {
        let adapter = LocalAdapter::new();
        adapter.add_printer(printer("HP1"), "*PPD-Adobe");
        let job_id = adapter
            .submit_job("HP1", "/tmp/x", "title", "alice", &OptionMap::new())
            .await
            .unwrap();
        assert_eq!(
            adapter.job_state(&job_id).await.unwrap(),
            NativeJobState::Pending
        );
        adapter.set_job_state(&job_id, NativeJobState::Completed);
        assert_eq!(
            adapter.job_state(&job_id).await.unwrap(),
            NativeJobState::Completed
        );
    }

    #[test]
    fn job_title_prefix_prepends_gcp_and_job_id() {
        assert_eq!(job_title("12345", "report.pdf", true), "gcp:12345 report.pdf");
        assert_eq!(job_title("12345", "report.pdf", false), "report.pdf");
    }
}
