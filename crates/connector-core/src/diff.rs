//! Printer Diff. Pure, no I/O: given the current local printer set and
//! the current cloud-known table, produce an ordered list of operations.
//! Matching is by native name, never by cloud id.

use std::collections::HashMap;

use crate::types::{CloudPrinterId, NativePrinter};

/// One managed printer as tracked in the Printer Manager's table: the
/// native snapshot plus the cloud id it was registered under.
#[derive(Debug, Clone, PartialEq)]
pub struct ManagedPrinter {
    pub cloud_id: CloudPrinterId,
    pub native: NativePrinter,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffOp {
    Register,
    Update,
    Delete,
    NoChange,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PrinterDiff {
    pub operation: DiffOp,
    /// The native name this diff entry is keyed on.
    pub native_name: String,
    /// Present for Register/Update/NoChange; absent for Delete (only the
    /// cloud id + native name of the managed entry are known there).
    pub printer: Option<NativePrinter>,
    /// The existing managed entry, when one exists (Update/Delete/NoChange).
    pub existing: Option<ManagedPrinter>,
    pub caps_changed: bool,
}

/// Diff the local printer set `local` against the currently managed table
/// `managed` (keyed by native name). One entry is emitted per printer in
/// `local ∪ managed`, matched by native name.
pub fn diff_printers(
    local: &[NativePrinter],
    managed: &HashMap<String, ManagedPrinter>,
) -> Vec<PrinterDiff> {
    let mut out = Vec::with_capacity(local.len().max(managed.len()));
    let mut seen: std::collections::HashSet<&str> = std::collections::HashSet::new();

    for printer in local {
        let name = printer.identity.native_name.as_str();
        seen.insert(name);
        match managed.get(name) {
            None => out.push(PrinterDiff {
                operation: DiffOp::Register,
                native_name: name.to_string(),
                printer: Some(printer.clone()),
                existing: None,
                caps_changed: true,
            }),
            Some(existing) => {
                let caps_changed =
                    existing.native.description.fingerprint() != printer.description.fingerprint();
                let changed = caps_changed
                    || existing.native.presentation != printer.presentation
                    || existing.native.tags != printer.tags;
                out.push(PrinterDiff {
                    operation: if changed { DiffOp::Update } else { DiffOp::NoChange },
                    native_name: name.to_string(),
                    printer: Some(printer.clone()),
                    existing: Some(existing.clone()),
                    caps_changed,
                });
            }
        }
    }

    for (name, existing) in managed {
        if !seen.contains(name.as_str()) {
            out.push(PrinterDiff {
                operation: DiffOp::Delete,
                native_name: name.clone(),
                printer: None,
                existing: Some(existing.clone()),
                caps_changed: false,
            });
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{CapabilityDocument, Presentation, PrinterIdentity, StateDocument};

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

    fn managed_from(name: &str, native: NativePrinter) -> ManagedPrinter {
        ManagedPrinter {
            cloud_id: format!("cloud-{name}"),
            native,
        }
    }

    #[test]
    fn new_local_printer_registers() {
        let local = vec![printer("HP1")];
        let managed = HashMap::new();
        let diffs = diff_printers(&local, &managed);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].operation, DiffOp::Register);
        assert_eq!(diffs[0].native_name, "HP1");
    }

    #[test]
    fn missing_local_printer_deletes() {
        let local = vec![];
        let mut managed = HashMap::new();
        managed.insert("HP1".to_string(), managed_from("HP1", printer("HP1")));
        let diffs = diff_printers(&local, &managed);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].operation, DiffOp::Delete);
    }

    #[test]
    fn identical_snapshot_yields_only_nochange() {
        let p = printer("HP1");
        let local = vec![p.clone()];
        let mut managed = HashMap::new();
        managed.insert("HP1".to_string(), managed_from("HP1", p));
        let diffs = diff_printers(&local, &managed);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].operation, DiffOp::NoChange);
        assert!(!diffs[0].caps_changed);
    }

    #[test]
    fn changed_capability_triggers_update_with_caps_changed() {
        let mut old = printer("HP1");
        old.description.input_trays = vec!["Tray1".to_string()];
        let mut new = printer("HP1");
        new.description.input_trays = vec!["Tray1".to_string(), "Tray2".to_string()];

        let local = vec![new];
        let mut managed = HashMap::new();
        managed.insert("HP1".to_string(), managed_from("HP1", old));
        let diffs = diff_printers(&local, &managed);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].operation, DiffOp::Update);
        assert!(diffs[0].caps_changed);
    }

    #[test]
    fn emits_exactly_one_entry_per_printer_in_the_union() {
        let mut managed = HashMap::new();
        managed.insert("Stays".to_string(), managed_from("Stays", printer("Stays")));
        managed.insert("Gone".to_string(), managed_from("Gone", printer("Gone")));
        let local = vec![printer("Stays"), printer("New")];

        let diffs = diff_printers(&local, &managed);
        // L ∪ C = {Stays, Gone, New} -> exactly 3 entries, one per name.
        assert_eq!(diffs.len(), 3);
        let names: std::collections::HashSet<_> =
            diffs.iter().map(|d| d.native_name.clone()).collect();
        assert_eq!(
            names,
            ["Stays", "Gone", "New"]
                .into_iter()
                .map(String::from)
                .collect()
        );
    }

    #[test]
    fn blacklisted_printer_removed_from_local_set_deletes() {
        // printer_blacklist filtering happens before diff_printers is called
        // (the engine drops blacklisted entries from `local`); the diff
        // itself just sees an absence and emits Delete.
        let mut managed = HashMap::new();
        managed.insert("HP1".to_string(), managed_from("HP1", printer("HP1")));
        let local: Vec<NativePrinter> = vec![]; // HP1 filtered out upstream
        let diffs = diff_printers(&local, &managed);
        assert_eq!(diffs.len(), 1);
        assert_eq!(diffs[0].operation, DiffOp::Delete);
        assert_eq!(diffs[0].native_name, "HP1");
    }
}
