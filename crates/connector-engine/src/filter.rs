//! Static printer filtering applied before the diff: raw/class exclusion
//! and the `printer_blacklist`/`printer_whitelist` name lists.

use std::collections::HashSet;

use connector_core::NativePrinter;

#[derive(Debug, Clone, Default)]
pub struct FilterConfig {
    pub ignore_raw: bool,
    pub ignore_class: bool,
    pub blacklist: HashSet<String>,
    pub whitelist: HashSet<String>,
}

/// Applies raw/class filtering and allow/deny lists. An empty whitelist
/// means "no restriction"; a non-empty one is the complete allowed set.
pub fn apply(printers: Vec<NativePrinter>, config: &FilterConfig) -> Vec<NativePrinter> {
    printers
        .into_iter()
        .filter(|p| !(config.ignore_raw && p.is_raw))
        .filter(|p| !(config.ignore_class && p.is_class))
        .filter(|p| !config.blacklist.contains(&p.identity.native_name))
        .filter(|p| config.whitelist.is_empty() || config.whitelist.contains(&p.identity.native_name))
        .collect()
}
