//! Shared data model for the connector workspace: printer, capability and
//! state types, the lenient integer scalar, the `Absorb` merge operation,
//! the pure printer diff, and the ticket → option-map translation
//! contract.

pub mod diff;
pub mod lenient_int;
pub mod ticket;
pub mod types;

pub use diff::{diff_printers, DiffOp, ManagedPrinter, PrinterDiff};
pub use lenient_int::LenientInt;
pub use ticket::{microns_to_points, translate_ticket, OptionMap, TicketError};
pub use types::*;
