//! HTTP-stream notification transport.

mod framing;
mod token_cache;
mod transport;

pub use framing::{extract_printer_id, SizePrefixedFramer};
pub use token_cache::FcmTokenCache;
pub use transport::{FcmTokenProvider, HttpStreamTransport};
