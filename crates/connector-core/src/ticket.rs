//! Ticket → option-map translation. The native adapter's actual option
//! keys are adapter specific; this module only specifies the shape and
//! the parts of the contract that are adapter-independent (unit
//! conversion, boolean stringification, DPI fallback format).

use std::collections::HashMap;

use thiserror::Error;

use crate::types::{CapabilityDocument, PrintTicket};

pub type OptionMap = HashMap<String, String>;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TicketError {
    #[error("ticket rejected: invalid vendor ticket item {0:?}")]
    InvalidTicket(String),
}

/// Converts a micron measurement to whole points: `round(microns * 72 / 25400)`,
/// half-up.
pub fn microns_to_points(microns: u32) -> u32 {
    let numerator = (microns as u64) * 72;
    let denominator = 25_400u64;
    ((numerator * 2 + denominator) / (denominator * 2)) as u32
}

/// Separator used to expand a vendor ticket item into key/value pairs.
const VENDOR_ITEM_SEPARATOR: char = '=';

/// Translate a print ticket into the adapter's option map. Only sections
/// present on the ticket *and* supported by `description` are emitted.
pub fn translate_ticket(
    ticket: &PrintTicket,
    description: &CapabilityDocument,
) -> Result<OptionMap, TicketError> {
    let mut options = OptionMap::new();

    if let Some(color) = &ticket.color {
        if let Some(resolved) = resolve_enum(&color.vendor_id, &color.type_name, &description.color)
        {
            options.insert("Color".to_string(), resolved);
        }
    }

    if let Some(duplex) = &ticket.duplex {
        if let Some(resolved) =
            resolve_enum(&duplex.vendor_id, &duplex.type_name, &description.duplex)
        {
            options.insert("Duplex".to_string(), resolved);
        }
    }

    if let Some(orientation) = &ticket.page_orientation {
        if let Some(resolved) = resolve_enum(
            &orientation.vendor_id,
            &orientation.type_name,
            &description.page_orientation,
        ) {
            options.insert("PageOrientation".to_string(), resolved);
        }
    }

    if let Some(copies) = ticket.copies {
        if description.copies.is_some() {
            options.insert("Copies".to_string(), copies.to_string());
        }
    }

    if let Some(dpi) = &ticket.dpi {
        if !description.dpi.is_empty() {
            options.insert(
                "DPI".to_string(),
                format!("{}x{}dpi", dpi.horizontal, dpi.vertical),
            );
        }
    }

    if let Some(media) = &ticket.media_size {
        if !description.media_size.is_empty() {
            let value = description
                .media_size
                .iter()
                .find(|m| m.vendor_id == media.vendor_id)
                .map(|m| m.vendor_id.clone())
                .unwrap_or_else(|| {
                    format!(
                        "Custom.{}x{}",
                        microns_to_points(media.width_microns),
                        microns_to_points(media.height_microns)
                    )
                });
            options.insert("MediaSize".to_string(), value);
        }
    }

    if let Some(collate) = ticket.collate {
        if description.collate.is_some() {
            options.insert(
                "Collate".to_string(),
                if collate { "true" } else { "false" }.to_string(),
            );
        }
    }

    if let Some(reverse) = ticket.reverse_order {
        if description.reverse_order.is_some() {
            options.insert(
                "ReverseOrder".to_string(),
                if reverse { "reverse" } else { "normal" }.to_string(),
            );
        }
    }

    for (key, value) in &ticket.vendor_ticket_items {
        let mut parts = value.splitn(2, VENDOR_ITEM_SEPARATOR);
        let k = parts.next().unwrap_or_default();
        match parts.next() {
            Some(v) if !k.is_empty() => {
                options.insert(format!("{key}.{k}"), v.to_string());
            }
            _ => return Err(TicketError::InvalidTicket(key.clone())),
        }
    }

    Ok(options)
}

/// Resolve an enum option (Color/Duplex/PageOrientation) against the
/// description: direct vendor-id match first, falling back to a scan by
/// `type_name`.
fn resolve_enum(
    vendor_id: &str,
    type_name: &str,
    supported: &[crate::types::EnumOption],
) -> Option<String> {
    if supported.iter().any(|o| o.vendor_id == vendor_id) {
        return Some(vendor_id.to_string());
    }
    supported
        .iter()
        .find(|o| o.type_name == type_name)
        .map(|o| o.vendor_id.clone())
}
