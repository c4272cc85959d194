//! HTTP-stream notification transport: a long-lived `reqwest` streaming
//! GET parsed as an endless sequence of size-prefixed JSON records.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::http_stream::framing::{extract_printer_id, SizePrefixedFramer};
use crate::http_stream::token_cache::FcmTokenCache;
use crate::{NotificationTransport, PrinterNotification, TransportError};

/// Fixed backoff between reconnects on non-EOF network errors.
const RECONNECT_BACKOFF: Duration = Duration::from_secs(10);

/// Bounded retry count for token acquisition before asking the supervisor
/// to terminate.
const MAX_TOKEN_ATTEMPTS: u32 = 3;

#[async_trait::async_trait]
pub trait FcmTokenProvider: Send + Sync {
    async fn fcm_subscribe(&self, path: &str) -> Result<(String, Duration), TransportError>;
}

pub struct HttpStreamTransport {
    cancel: CancellationToken,
    dead_token: CancellationToken,
}

impl HttpStreamTransport {
    pub async fn connect(
        http: reqwest::Client,
        bind_url: String,
        subscribe_path: String,
        token_provider: Arc<dyn FcmTokenProvider>,
    ) -> Result<
        (
            HttpStreamTransport,
            mpsc::Receiver<PrinterNotification>,
            oneshot::Receiver<()>,
        ),
        TransportError,
    > {
        let (notif_tx, notif_rx) = crate::new_sink();
        let (dead_tx, dead_rx) = oneshot::channel();
        let cancel = CancellationToken::new();
        let dead_token = CancellationToken::new();

        let task_cancel = cancel.clone();
        let task_dead_token = dead_token.clone();
        tokio::spawn(Self::keepalive_loop(
            http,
            bind_url,
            subscribe_path,
            token_provider,
            notif_tx,
            task_cancel,
            dead_tx,
            task_dead_token,
        ));

        Ok((
            HttpStreamTransport { cancel, dead_token },
            notif_rx,
            dead_rx,
        ))
    }

    async fn keepalive_loop(
        http: reqwest::Client,
        bind_url: String,
        subscribe_path: String,
        token_provider: Arc<dyn FcmTokenProvider>,
        notif_tx: mpsc::Sender<PrinterNotification>,
        cancel: CancellationToken,
        dead_tx: oneshot::Sender<()>,
        dead_token: CancellationToken,
    ) {
        let mut cache = FcmTokenCache::new();

        loop {
            if cancel.is_cancelled() {
                return;
            }

            let token = match Self::acquire_token(&token_provider, &subscribe_path, &mut cache).await {
                Ok(token) => token,
                Err(_) => {
                    warn!("exhausted fcm token acquisition attempts, asking supervisor to terminate");
                    let _ = dead_tx.send(());
                    dead_token.cancel();
                    return;
                }
            };

            match Self::run_connection(&http, &bind_url, &token, &notif_tx, &cancel).await {
                Ok(()) => {
                    // cancelled cooperatively
                    return;
                }
                Err(ConnectionOutcome::Eof) => {
                    debug!("http-stream connection hit eof, reconnecting with a fresh token");
                    cache.set(String::new(), Duration::from_secs(0)); // force refresh next loop
                }
                Err(ConnectionOutcome::NetworkError(message)) => {
                    warn!(error = %message, "http-stream connection error, backing off");
                    tokio::select! {
                        _ = cancel.cancelled() => return,
                        _ = tokio::time::sleep(RECONNECT_BACKOFF) => {}
                    }
                }
            }
        }
    }

    async fn acquire_token(
        token_provider: &Arc<dyn FcmTokenProvider>,
        subscribe_path: &str,
        cache: &mut FcmTokenCache,
    ) -> Result<String, TransportError> {
        if let Some(token) = cache.get() {
            return Ok(token.to_string());
        }
        for attempt in 1..=MAX_TOKEN_ATTEMPTS {
            match token_provider.fcm_subscribe(subscribe_path).await {
                Ok((token, ttl)) => {
                    cache.set(token.clone(), ttl);
                    return Ok(token);
                }
                Err(e) if attempt < MAX_TOKEN_ATTEMPTS => {
                    debug!(attempt, error = %e, "fcm token acquisition failed, retrying");
                }
                Err(_) => break,
            }
        }
        Err(TransportError::ReconnectAttemptsExhausted(MAX_TOKEN_ATTEMPTS))
    }

    async fn run_connection(
        http: &reqwest::Client,
        bind_url: &str,
        token: &str,
        notif_tx: &mpsc::Sender<PrinterNotification>,
        cancel: &CancellationToken,
    ) -> Result<(), ConnectionOutcome> {
        let response = http
            .get(bind_url)
            .query(&[("token", token)])
            .send()
            .await
            .map_err(|e| ConnectionOutcome::NetworkError(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ConnectionOutcome::NetworkError(format!(
                "http {}",
                response.status()
            )));
        }

        let mut framer = SizePrefixedFramer::new();
        let mut byte_stream = response.bytes_stream();

        loop {
            tokio::select! {
                _ = cancel.cancelled() => return Ok(()),
                chunk = byte_stream.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            framer.push_bytes(&bytes);
                            while let Some(record) = framer.next_record() {
                                if let Some(printer_id) = extract_printer_id(&record) {
                                    if notif_tx
                                        .send(PrinterNotification::NewJobs(printer_id))
                                        .await
                                        .is_err()
                                    {
                                        return Ok(());
                                    }
                                }
                            }
                        }
                        Some(Err(e)) => return Err(ConnectionOutcome::NetworkError(e.to_string())),
                        None => return Err(ConnectionOutcome::Eof),
                    }
                }
            }
        }
    }
}

enum ConnectionOutcome {
    Eof,
    NetworkError(String),
}

#[async_trait::async_trait]
impl NotificationTransport for HttpStreamTransport {
    fn quit(&self) {
        self.cancel.cancel();
    }

    async fn dead(&self) {
        self.dead_token.cancelled().await;
    }
}
