//! Notification Transport and Bounded Semaphore.

pub mod http_stream;
pub mod semaphore;
pub mod xmpp;

use thiserror::Error;
use tokio::sync::mpsc;

pub use semaphore::BoundedSemaphore;

/// A notification pushed by either transport variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PrinterNotification {
    NewJobs(String),
    PrinterDelete(String),
}

/// Minimum sink channel depth: notifications are coalescible, so a small
/// bound is enough to avoid unbounded growth under a slow consumer.
pub const NOTIFICATION_SINK_DEPTH: usize = 5;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("transport io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("transport protocol error: {0}")]
    Protocol(String),
    #[error("tls error: {0}")]
    Tls(String),
    #[error("initial keep-alive ping failed; construction aborted")]
    InitialPingFailed,
    #[error("exhausted {0} reconnect attempts acquiring credentials")]
    ReconnectAttemptsExhausted(u32),
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}

/// A credential/identity provider the transport calls on each (re)connect.
#[async_trait::async_trait]
pub trait AccessTokenProvider: Send + Sync {
    async fn access_token(&self) -> Result<String, TransportError>;
}

/// Common shape both transport variants implement: creation (see each
/// variant's own `connect`) returns a handle plus the receiving end of
/// the notification sink and a `dead` one-shot; `quit` is idempotent.
#[async_trait::async_trait]
pub trait NotificationTransport: Send + Sync {
    fn quit(&self);
    /// Resolves once, the first time the transport dies unexpectedly.
    async fn dead(&self) -> ();
}

pub(crate) fn new_sink() -> (
    mpsc::Sender<PrinterNotification>,
    mpsc::Receiver<PrinterNotification>,
) {
    mpsc::channel(NOTIFICATION_SINK_DEPTH)
}
