//! Monitor: a Unix-domain stats endpoint. One connection in, one stats
//! block out, connection closed.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::net::{UnixListener, UnixStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("socket path {0:?} already exists, refusing to start (is another instance running?)")]
    SocketExists(PathBuf),
    #[error("failed to bind socket at {0:?}: {1}")]
    Bind(PathBuf, std::io::Error),
}

/// One rendering of the nine stats lines.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatsSnapshot {
    pub cups_printers: u64,
    pub cups_raw_printers: u64,
    pub gcp_printers: u64,
    pub local_printers: u64,
    pub cups_conn_qty: u64,
    pub cups_conn_max_qty: u64,
    pub jobs_done: u64,
    pub jobs_error: u64,
    pub jobs_in_progress: u64,
}

impl StatsSnapshot {
    /// Renders exactly nine `key=value\n` lines, in a fixed order.
    fn render(&self) -> String {
        format!(
            "cups-printers={}\n\
             cups-raw-printers={}\n\
             gcp-printers={}\n\
             local-printers={}\n\
             cups-conn-qty={}\n\
             cups-conn-max-qty={}\n\
             jobs-done={}\n\
             jobs-error={}\n\
             jobs-in-progress={}\n",
            self.cups_printers,
            self.cups_raw_printers,
            self.gcp_printers,
            self.local_printers,
            self.cups_conn_qty,
            self.cups_conn_max_qty,
            self.jobs_done,
            self.jobs_error,
            self.jobs_in_progress,
        )
    }
}

/// Anything that can produce a stats snapshot on demand. Implemented by the
/// supervisor by composing the Printer Manager's table/job stats with the
/// native adapter's own connection counters.
#[async_trait::async_trait]
pub trait StatsSource: Send + Sync {
    async fn collect(&self) -> Result<StatsSnapshot, String>;
}

pub struct Monitor {
    socket_path: PathBuf,
    cancel: CancellationToken,
    accept_task: tokio::task::JoinHandle<()>,
}

impl Monitor {
    /// Binds `socket_path`. Refuses to start if the path already exists,
    /// on the assumption another instance is running.
    pub async fn bind(
        socket_path: impl AsRef<Path>,
        source: std::sync::Arc<dyn StatsSource>,
    ) -> Result<Self, MonitorError> {
        let socket_path = socket_path.as_ref().to_path_buf();
        if socket_path.exists() {
            return Err(MonitorError::SocketExists(socket_path));
        }
        let listener = UnixListener::bind(&socket_path)
            .map_err(|e| MonitorError::Bind(socket_path.clone(), e))?;

        let cancel = CancellationToken::new();
        let accept_task = tokio::spawn(accept_loop(listener, source, cancel.clone()));

        Ok(Monitor {
            socket_path,
            cancel,
            accept_task,
        })
    }

    /// Closes the listener and waits for the accept loop's acknowledgment.
    pub async fn quit(self) {
        self.cancel.cancel();
        let _ = self.accept_task.await;
        let _ = std::fs::remove_file(&self.socket_path);
    }
}

async fn accept_loop(
    listener: UnixListener,
    source: std::sync::Arc<dyn StatsSource>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("monitor accept loop shutting down");
                return;
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, _addr)) => {
                        let source = source.clone();
                        tokio::spawn(async move {
                            if let Err(e) = serve_connection(stream, source.as_ref()).await {
                                warn!(error = %e, "monitor connection failed");
                            }
                        });
                    }
                    Err(e) => warn!(error = %e, "monitor accept failed"),
                }
            }
        }
    }
}

async fn serve_connection(
    mut stream: UnixStream,
    source: &dyn StatsSource,
) -> Result<(), std::io::Error> {
    let body = match source.collect().await {
        Ok(stats) => stats.render(),
        Err(e) => {
            warn!(error = %e, "stats collection failed");
            "error\n".to_string()
        }
    };
    stream.write_all(body.as_bytes()).await?;
    stream.shutdown().await
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU64, Ordering};
    use std::sync::Arc;
    use tokio::io::AsyncReadExt;

    struct FixedSource(StatsSnapshot);

    #[async_trait::async_trait]
    impl StatsSource for FixedSource {
        async fn collect(&self) -> Result<StatsSnapshot, String> {
            Ok(self.0)
        }
    }

    struct FailingSource;

    #[async_trait::async_trait]
    impl StatsSource for FailingSource {
        async fn collect(&self) -> Result<StatsSnapshot, String> {
            Err("adapter unreachable".to_string())
        }
    }

    struct CountingSource(AtomicU64);

    #[async_trait::async_trait]
    impl StatsSource for CountingSource {
        async fn collect(&self) -> Result<StatsSnapshot, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(StatsSnapshot::default())
        }
    }

    fn temp_socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("connector-monitor-test-{name}-{}.sock", std::process::id()))
    }

    #[test]
    fn render_emits_exactly_the_nine_lines_in_order() {
        let stats = StatsSnapshot {
            cups_printers: 3,
            cups_raw_printers: 1,
            gcp_printers: 2,
            local_printers: 3,
            cups_conn_qty: 1,
            cups_conn_max_qty: 4,
            jobs_done: 10,
            jobs_error: 1,
            jobs_in_progress: 2,
        };
        let rendered = stats.render();
        let lines: Vec<_> = rendered.lines().collect();
        assert_eq!(
            lines,
            vec![
                "cups-printers=3",
                "cups-raw-printers=1",
                "gcp-printers=2",
                "local-printers=3",
                "cups-conn-qty=1",
                "cups-conn-max-qty=4",
                "jobs-done=10",
                "jobs-error=1",
                "jobs-in-progress=2",
            ]
        );
        assert!(rendered.ends_with('\n'));
    }

    #[tokio::test]
    async fn refuses_to_start_if_socket_path_already_exists() {
        let path = temp_socket_path("exists");
        std::fs::write(&path, b"").unwrap();
        let result = Monitor::bind(&path, Arc::new(FixedSource(StatsSnapshot::default()))).await;
        assert!(matches!(result, Err(MonitorError::SocketExists(_))));
        std::fs::remove_file(&path).unwrap();
    }

    #[tokio::test]
    async fn serves_one_stats_block_per_connection_then_closes() {
        let path = temp_socket_path("serve");
        let stats = StatsSnapshot {
            gcp_printers: 5,
            ..Default::default()
        };
        let monitor = Monitor::bind(&path, Arc::new(FixedSource(stats))).await.unwrap();

        let mut client = UnixStream::connect(&path).await.unwrap();
        let mut body = String::new();
        client.read_to_string(&mut body).await.unwrap();
        assert!(body.contains("gcp-printers=5"));
        assert_eq!(body.lines().count(), 9);

        monitor.quit().await;
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn collection_failure_yields_error_line() {
        let path = temp_socket_path("error");
        let monitor = Monitor::bind(&path, Arc::new(FailingSource)).await.unwrap();

        let mut client = UnixStream::connect(&path).await.unwrap();
        let mut body = String::new();
        client.read_to_string(&mut body).await.unwrap();
        assert_eq!(body, "error\n");

        monitor.quit().await;
    }

    #[tokio::test]
    async fn quit_stops_accepting_new_connections() {
        let path = temp_socket_path("quit");
        let source = Arc::new(CountingSource(AtomicU64::new(0)));
        let monitor = Monitor::bind(&path, source.clone()).await.unwrap();
        monitor.quit().await;
        assert!(UnixStream::connect(&path).await.is_err());
    }
}
