//! Streaming-session notification transport.

mod framer;
mod keepalive;
mod stanza;
mod transport;

pub use stanza::{classify_stanza, decode_push_data, sasl_initial_response, IncomingStanza};
pub use transport::{XmppConfig, XmppTransport};
