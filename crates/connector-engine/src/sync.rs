//! The printer sync cycle: enumerate, tag, diff, fan out, swap.

use std::sync::Arc;

use connector_cloud::CloudClient;
use connector_core::{derived_tags, diff_printers, DiffOp};
use connector_native::NativeAdapter;
use connector_transport::BoundedSemaphore;
use tracing::{debug, error, warn};

use crate::filter::{self, FilterConfig};
use crate::table::{Entry, PrinterTable};

pub struct SyncConfig {
    pub filter: FilterConfig,
    pub build_date: String,
    pub hostname: String,
    pub notification_channel: String,
    pub submit_queue_capacity: usize,
}

/// Runs one full sync cycle and returns the table that should replace the
/// current one.
pub async fn sync_cycle(
    adapter: &dyn NativeAdapter,
    cloud: &CloudClient,
    current: &PrinterTable,
    config: &SyncConfig,
) -> PrinterTable {
    // 1. Enumerate, applying static filters.
    let local = match adapter.list_printers().await {
        Ok(printers) => filter::apply(printers, &config.filter),
        Err(e) => {
            error!(error = %e, "printer enumeration failed, retaining current table");
            return clone_entries(current);
        }
    };

    // 2. Annotate with derived tags.
    let tags = derived_tags(&config.build_date, &config.hostname, &config.notification_channel);
    let local: Vec<_> = local
        .into_iter()
        .map(|mut p| {
            p.tags.extend(tags.clone());
            p
        })
        .collect();

    // 3. Diff against the current table.
    let managed = current.as_diff_input();
    let diffs = diff_printers(&local, &managed);

    // 4 & 5. Fan out concurrently; collect survivors into the new table.
    let futures = diffs
        .into_iter()
        .map(|diff| apply_diff(adapter, cloud, current, diff, config.submit_queue_capacity));
    let results = futures::future::join_all(futures).await;

    let entries: Vec<(String, Entry)> = results.into_iter().flatten().collect();

    // 6. The caller swaps the table pointer; we only build the new value.
    PrinterTable::build(entries)
}

/// A failed enumeration retains every currently-managed printer, sharing
/// each printer's existing submit queue so in-flight jobs are unaffected.
fn clone_entries(current: &PrinterTable) -> PrinterTable {
    let entries = current
        .iter()
        .map(|(name, entry)| {
            (
                name.clone(),
                Entry {
                    cloud_id: entry.cloud_id.clone(),
                    native: entry.native.clone(),
                    submit_queue: entry.submit_queue.clone(),
                },
            )
        })
        .collect();
    PrinterTable::build(entries)
}

async fn apply_diff(
    adapter: &dyn NativeAdapter,
    cloud: &CloudClient,
    current: &PrinterTable,
    diff: connector_core::PrinterDiff,
    submit_queue_capacity: usize,
) -> Option<(String, Entry)> {
    match diff.operation {
        DiffOp::Register => {
            let printer = diff.printer?;
            let ppd = match adapter.fetch_ppd(&printer.identity.native_name).await {
                Ok(ppd) => ppd,
                Err(e) => {
                    warn!(printer = %printer.identity.native_name, error = %e, "ppd fetch failed, skipping register this cycle");
                    return None;
                }
            };
            match cloud.register(&printer, &ppd).await {
                Ok(cloud_id) => Some((
                    printer.identity.native_name.clone(),
                    Entry {
                        cloud_id,
                        native: printer,
                        submit_queue: Arc::new(BoundedSemaphore::new(submit_queue_capacity)),
                    },
                )),
                Err(e) => {
                    warn!(printer = %printer.identity.native_name, error = %e, "register failed, will retry next cycle");
                    None
                }
            }
        }
        DiffOp::Update => {
            let printer = diff.printer?;
            let ppd = if diff.caps_changed {
                adapter.fetch_ppd(&printer.identity.native_name).await.ok()
            } else {
                None
            };
            match cloud.update(&diff, ppd.as_deref()).await {
                Ok(()) => {
                    let cloud_id = diff.existing.as_ref()?.cloud_id.clone();
                    let submit_queue = current
                        .by_name(&printer.identity.native_name)
                        .map(|e| e.submit_queue.clone())
                        .unwrap_or_else(|| Arc::new(BoundedSemaphore::new(submit_queue_capacity)));
                    Some((
                        printer.identity.native_name.clone(),
                        Entry {
                            cloud_id,
                            native: printer,
                            submit_queue,
                        },
                    ))
                }
                Err(e) => {
                    warn!(printer = %printer.identity.native_name, error = %e, "update failed, will retry next cycle");
                    None
                }
            }
        }
        DiffOp::Delete => {
            let existing = diff.existing?;
            match cloud.delete(&existing.cloud_id).await {
                Ok(()) => None,
                Err(e) => {
                    warn!(printer = %diff.native_name, error = %e, "delete failed, will retry next cycle");
                    // Keep the printer in the table, sharing its existing
                    // submit queue, so the delete is retried next cycle.
                    let existing_entry = current.by_name(&diff.native_name)?;
                    Some((
                        diff.native_name.clone(),
                        Entry {
                            cloud_id: existing_entry.cloud_id.clone(),
                            native: existing_entry.native.clone(),
                            submit_queue: existing_entry.submit_queue.clone(),
                        },
                    ))
                }
            }
        }
        DiffOp::NoChange => {
            let printer = diff.printer?;
            let existing_entry = current.by_name(&printer.identity.native_name)?;
            debug!(printer = %printer.identity.native_name, "no change this cycle");
            Some((
                printer.identity.native_name.clone(),
                Entry {
                    cloud_id: existing_entry.cloud_id.clone(),
                    native: printer,
                    submit_queue: existing_entry.submit_queue.clone(),
                },
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use connector_cloud::OAuthConfig;
    use connector_core::{CapabilityDocument, Presentation, PrinterIdentity, StateDocument};
    use connector_native::LocalAdapter;

    fn printer(name: &str) -> connector_core::NativePrinter {
        connector_core::NativePrinter {
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

    fn config() -> SyncConfig {
        SyncConfig {
            filter: FilterConfig::default(),
            build_date: "2026-01-01".to_string(),
            hostname: "test-host".to_string(),
            notification_channel: "xmpp".to_string(),
            submit_queue_capacity: 4,
        }
    }

    #[tokio::test]
    async fn enumeration_failure_retains_current_table_sharing_submit_queues() {
        let adapter = LocalAdapter::new(); // no printers configured -> list_printers still Ok(empty)
        let current = PrinterTable::build(vec![(
            "HP1".to_string(),
            Entry {
                cloud_id: "cloud-1".to_string(),
                native: printer("HP1"),
                submit_queue: Arc::new(BoundedSemaphore::new(4)),
            },
        )]);
        // With an empty local set and nothing configured, sync_cycle treats
        // HP1 as gone locally -> Delete is attempted, which will fail
        // against the unreachable cloud and so HP1 survives via the retry
        // path, reusing its existing submit queue.
        let new_table = sync_cycle(&adapter, &cloud(), &current, &config()).await;
        let kept = new_table.by_name("HP1").expect("HP1 retried, not dropped");
        assert!(Arc::ptr_eq(&kept.submit_queue, &current.by_name("HP1").unwrap().submit_queue));
    }
}
