//! The authoritative printer table: single writer (the sync loop), many
//! readers, published by atomic pointer swap. Never mutated in place.

use std::collections::HashMap;
use std::sync::Arc;

use arc_swap::ArcSwap;
use connector_core::{CloudPrinterId, NativePrinter};
use connector_transport::BoundedSemaphore;

/// One managed printer: its native snapshot, cloud id, and its own submit
/// queue permit pool, sized to the configured queue capacity.
pub struct Entry {
    pub cloud_id: CloudPrinterId,
    pub native: NativePrinter,
    /// Shared by `Arc` across sync cycles for the same printer, so
    /// in-flight submit permits survive a table swap — the semaphore
    /// itself is not part of what gets replaced.
    pub submit_queue: Arc<BoundedSemaphore>,
}

#[derive(Default)]
pub struct PrinterTable {
    by_name: HashMap<String, Arc<Entry>>,
    by_cloud_id: HashMap<CloudPrinterId, Arc<Entry>>,
}

impl PrinterTable {
    pub fn build(entries: Vec<(String, Entry)>) -> Self {
        let mut by_name = HashMap::with_capacity(entries.len());
        let mut by_cloud_id = HashMap::with_capacity(entries.len());
        for (name, entry) in entries {
            let entry = Arc::new(entry);
            by_cloud_id.insert(entry.cloud_id.clone(), entry.clone());
            by_name.insert(name, entry);
        }
        PrinterTable { by_name, by_cloud_id }
    }

    pub fn by_name(&self, native_name: &str) -> Option<&Arc<Entry>> {
        self.by_name.get(native_name)
    }

    pub fn by_cloud_id(&self, cloud_id: &str) -> Option<&Arc<Entry>> {
        self.by_cloud_id.get(cloud_id)
    }

    pub fn as_diff_input(&self) -> HashMap<String, connector_core::ManagedPrinter> {
        self.by_name
            .iter()
            .map(|(name, entry)| {
                (
                    name.clone(),
                    connector_core::ManagedPrinter {
                        cloud_id: entry.cloud_id.clone(),
                        native: entry.native.clone(),
                    },
                )
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Arc<Entry>)> {
        self.by_name.iter()
    }

    pub fn len(&self) -> usize {
        self.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// The atomically-swapped holder. Readers call `load()`; the sync loop is
/// the sole writer, via `swap()`.
pub struct PrinterManagerTable {
    inner: ArcSwap<PrinterTable>,
}

impl Default for PrinterManagerTable {
    fn default() -> Self {
        PrinterManagerTable {
            inner: ArcSwap::from_pointee(PrinterTable::default()),
        }
    }
}

impl PrinterManagerTable {
    pub fn load(&self) -> Arc<PrinterTable> {
        self.inner.load_full()
    }

    pub fn swap(&self, table: PrinterTable) {
        self.inner.store(Arc::new(table));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_core::{CapabilityDocument, Presentation, PrinterIdentity, StateDocument};

    fn native(name: &str) -> NativePrinter {
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
    fn lookup_works_by_both_name_and_cloud_id() {
        let table = PrinterTable::build(vec![(
            "HP1".to_string(),
            Entry {
                cloud_id: "cloud-1".to_string(),
                native: native("HP1"),
                submit_queue: Arc::new(BoundedSemaphore::new(1)),
            },
        )]);
        assert!(table.by_name("HP1").is_some());
        assert!(table.by_cloud_id("cloud-1").is_some());
        assert!(table.by_cloud_id("missing").is_none());
    }

    #[test]
    fn swap_replaces_the_entire_table_atomically() {
        let manager_table = PrinterManagerTable::default();
        assert!(manager_table.load().is_empty());

        manager_table.swap(PrinterTable::build(vec![(
            "HP1".to_string(),
            Entry {
                cloud_id: "cloud-1".to_string(),
                native: native("HP1"),
                submit_queue: Arc::new(BoundedSemaphore::new(1)),
            },
        )]));
        let loaded = manager_table.load();
        assert_eq!(loaded.len(), 1);
    }
}
