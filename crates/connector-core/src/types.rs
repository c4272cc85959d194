//! Data model: printers, capability/state documents, tickets and jobs.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::lenient_int::LenientInt;

/// Stable identity of a printer as seen by this connector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrinterIdentity {
    /// Name as known to the native print subsystem; the diff matching key.
    pub native_name: String,
    /// Assigned once the printer is known to the cloud.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cloud_id: Option<String>,
    pub uuid: String,
}

impl PrinterIdentity {
    pub fn is_known(&self) -> bool {
        self.cloud_id.is_some()
    }
}

/// Human-facing presentation fields.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Presentation {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub manufacturer: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub model: String,
}

/// A single marker (ink/toner/staples) with color and level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Marker {
    pub vendor_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_percent: Option<u8>,
}

/// A vendor-defined capability: either a numeric range, a fixed set of
/// selectable values, or an opaque typed value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum VendorCapability {
    Range { id: String, min: f64, max: f64 },
    Select { id: String, options: Vec<String> },
    TypedValue { id: String, type_name: String, value: String },
}

impl VendorCapability {
    pub fn id(&self) -> &str {
        match self {
            VendorCapability::Range { id, .. } => id,
            VendorCapability::Select { id, .. } => id,
            VendorCapability::TypedValue { id, .. } => id,
        }
    }
}

/// Simple enumerated option, e.g. duplex or color, keyed by a vendor id and
/// an abstract `type_name` the engine can match against: color/duplex
/// options look up the vendor id directly or scan the description to
/// resolve by type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnumOption {
    pub vendor_id: String,
    pub type_name: String,
}

/// Discrete Width x Height media size, in micrometers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaSize {
    pub vendor_id: String,
    pub width_microns: u32,
    pub height_microns: u32,
}

/// The capability document. Every list-shaped field is optional-present:
/// `None` / empty means "this section was not supplied", distinct from
/// "supplied but empty".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CapabilityDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub supported_content_types: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_trays: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_bins: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<Marker>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_capabilities: Vec<VendorCapability>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub color: Vec<EnumOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub duplex: Vec<EnumOption>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub page_orientation: Vec<EnumOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<CopiesCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub margins: Option<MarginsCapability>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dpi: Vec<DpiOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fit_to_page: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_range: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_size: Vec<MediaSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_order: Option<bool>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopiesCapability {
    pub max: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MarginsCapability {
    pub top_microns: u32,
    pub bottom_microns: u32,
    pub left_microns: u32,
    pub right_microns: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DpiOption {
    pub horizontal: u32,
    pub vertical: u32,
}

macro_rules! absorb_field {
    ($self:expr, $other:expr, $field:ident) => {
        if !$other.$field.is_empty() {
            $self.$field = $other.$field.clone();
        }
    };
}

macro_rules! absorb_option {
    ($self:expr, $other:expr, $field:ident) => {
        if $other.$field.is_some() {
            $self.$field = $other.$field.clone();
        }
    };
}

impl CapabilityDocument {
    /// Replace any section that is non-empty in `other`, except
    /// `vendor_capabilities`, which is merged by id preserving `self`'s
    /// existing entries as authoritative.
    pub fn absorb(&mut self, other: &CapabilityDocument) {
        absorb_field!(self, other, supported_content_types);
        absorb_field!(self, other, input_trays);
        absorb_field!(self, other, output_bins);
        absorb_field!(self, other, markers);
        absorb_field!(self, other, covers);
        absorb_field!(self, other, media_paths);
        absorb_field!(self, other, color);
        absorb_field!(self, other, duplex);
        absorb_field!(self, other, page_orientation);
        absorb_field!(self, other, dpi);
        absorb_field!(self, other, media_size);
        absorb_option!(self, other, copies);
        absorb_option!(self, other, margins);
        absorb_option!(self, other, fit_to_page);
        absorb_option!(self, other, page_range);
        absorb_option!(self, other, collate);
        absorb_option!(self, other, reverse_order);

        if !other.vendor_capabilities.is_empty() {
            let mut seen: std::collections::HashSet<String> = self
                .vendor_capabilities
                .iter()
                .map(|c| c.id().to_string())
                .collect();
            for cap in &other.vendor_capabilities {
                if seen.insert(cap.id().to_string()) {
                    self.vendor_capabilities.push(cap.clone());
                }
            }
        }
    }

    /// A stable fingerprint used by the diff to decide whether
    /// capabilities changed between sync cycles.
    pub fn fingerprint(&self) -> u64 {
        use std::hash::{Hash, Hasher};
        // `f64` fields aren't `Hash`; hash via their serialized form instead
        // of hand-rolling bit-pattern hashing for every numeric section.
        let mut hasher = std::collections::hash_map::DefaultHasher::new();
        serde_json::to_string(self)
            .unwrap_or_default()
            .hash(&mut hasher);
        hasher.finish()
    }
}

/// Runtime status of a unit (input tray, output bin, marker, cover, media
/// path, or a free-form vendor item).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateItem {
    pub vendor_id: String,
    pub state: UnitState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level_percent: Option<u8>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vendor_message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitState {
    Ok,
    Warning,
    Error,
}

/// The state document: per-unit items keyed by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub input_trays: Vec<StateItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub output_bins: Vec<StateItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub markers: Vec<StateItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub covers: Vec<StateItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub media_paths: Vec<StateItem>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub vendor_items: Vec<StateItem>,
}

/// A print ticket: the chosen values for a specific job, a subset of
/// `CapabilityDocument`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PrintTicket {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<EnumOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duplex: Option<EnumOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_orientation: Option<EnumOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copies: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dpi: Option<DpiOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub media_size: Option<MediaSize>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collate: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reverse_order: Option<bool>,
    /// Vendor-id keyed ticket values, e.g. a device password.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub vendor_ticket_items: HashMap<String, String>,
}

/// A print job as produced by the cloud client or notification transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Job {
    pub cloud_job_id: String,
    pub cloud_printer_id: String,
    pub ticket_url: String,
    pub file_url: String,
    pub owner_id: String,
    pub title: String,
}

/// Cloud-authoritative job lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum CloudJobState {
    InProgress,
    Stopped,
    Aborted,
    Done,
}

/// The cause accompanying a non-terminal/terminal job state change.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStateCause {
    DeviceAction(DeviceActionCause),
    UserAction(UserActionCause),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceActionCause {
    Other,
    PrintFailure,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserActionCause {
    /// Spelled with two Ls on the wire — preserved as an external-contract
    /// quirk, not "fixed" to American spelling.
    #[serde(rename = "CANCELLED")]
    Canceled,
}

/// Per-printer tags: free-form string metadata plus the derived tags the
/// sync cycle stamps on every printer (build date, hostname, architecture,
/// notification channel).
pub type Tags = HashMap<String, String>;

pub fn derived_tags(build_date: &str, hostname: &str, notification_channel: &str) -> Tags {
    let mut tags = Tags::new();
    tags.insert("connector-build-date".into(), build_date.into());
    tags.insert("connector-hostname".into(), hostname.into());
    tags.insert("connector-arch".into(), std::env::consts::ARCH.into());
    tags.insert(
        "connector-notification-channel".into(),
        notification_channel.into(),
    );
    tags
}

/// A printer as the native adapter reports it: identity, presentation,
/// description and tags, no cloud id yet.
#[derive(Debug, Clone, PartialEq)]
pub struct NativePrinter {
    pub identity: PrinterIdentity,
    pub presentation: Presentation,
    pub description: CapabilityDocument,
    pub state: StateDocument,
    pub tags: Tags,
    pub is_raw: bool,
    pub is_class: bool,
}

/// A cloud-managed printer index key. Every managed printer has a
/// non-empty cloud id.
pub type CloudPrinterId = String;

/// A lenient-integer-typed counter used in wire payloads that need the
/// quoted-or-unquoted compatibility behavior.
pub type WireIndex = LenientInt;
