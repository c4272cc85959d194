//! The native print adapter contract: the `NativeAdapter` trait, the
//! native→cloud job state mapping, and a `LocalAdapter` test double. The
//! real PPD/CUPS/spooler backend is an external collaborator.

pub mod adapter;
pub mod state;

pub use adapter::{job_title, AdapterError, LocalAdapter, NativeAdapter};
pub use state::{is_terminal, map_job_state, MappedState, NativeJobState};
