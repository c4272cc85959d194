mod cli;
mod config;
mod host;
mod logging;
mod providers;
mod shutdown;
mod stats_source;

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use connector_cloud::{CloudClient, OAuthConfig};
use connector_engine::{FilterConfig, JobPipelineConfig, ManagerConfig, PrinterManager, SyncConfig};
use connector_monitor::Monitor;
use connector_native::{LocalAdapter, NativeAdapter};
use connector_transport::http_stream::HttpStreamTransport;
use connector_transport::xmpp::{XmppConfig, XmppTransport};
use connector_transport::{NotificationTransport, PrinterNotification};
use tokio::sync::{mpsc, oneshot};
use tracing::{info, warn};

use crate::cli::Cli;
use crate::config::Config;
use crate::providers::CloudTokenProvider;
use crate::shutdown::{spawn_signal_handlers, ShutdownController, ShutdownEvent};
use crate::stats_source::SupervisorStats;

/// How long the shutdown phase waits for the notification transport to
/// close before abandoning it.
const TRANSPORT_SHUTDOWN_GRACE: Duration = Duration::from_secs(3);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match Config::load(&cli.config) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e}");
            std::process::exit(1);
        }
    };
    if let Some(token) = &cli.robot_refresh_token {
        config.robot_refresh_token = token.clone();
    }
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if let Err(e) = config.validate() {
        eprintln!("config error: {e}");
        std::process::exit(1);
    }
    if cli.check_config {
        println!("config ok");
        return Ok(());
    }

    logging::init(&config)?;

    let oauth = OAuthConfig {
        token_url: config.gcp_oauth_token_url.clone(),
        client_id: config.gcp_oauth_client_id.clone(),
        client_secret: config.gcp_oauth_client_secret.clone(),
        refresh_token: config.robot_refresh_token.clone(),
    };
    let cloud = Arc::new(CloudClient::new(config.gcp_base_url.clone(), oauth));

    // The real CUPS/spooler adapter is an external collaborator out of
    // scope (connector-native's own doc comment); this daemon drives the
    // in-memory `LocalAdapter` until a real backend replaces it.
    let adapter: Arc<dyn NativeAdapter> = Arc::new(LocalAdapter::new());

    let (notif_tx, notif_rx) = mpsc::channel::<PrinterNotification>(connector_transport::NOTIFICATION_SINK_DEPTH);
    let mut transport: Option<Box<dyn NotificationTransport>> = None;
    let mut transport_dead: Option<oneshot::Receiver<()>> = None;
    if config.cloud_printing_enable {
        let (new_transport, dead_rx) = connect_transport(&config, cloud.clone(), notif_tx.clone()).await?;
        transport = Some(new_transport);
        transport_dead = Some(dead_rx);
    } else {
        drop(notif_tx);
    }

    let hostname = host::local_hostname();
    let manager = PrinterManager::start(
        adapter.clone(),
        cloud.clone(),
        notif_rx,
        ManagerConfig {
            sync: SyncConfig {
                filter: FilterConfig {
                    ignore_raw: config.cups_ignore_raw_printers,
                    ignore_class: config.cups_ignore_class_printers,
                    blacklist: config.printer_blacklist.iter().cloned().collect(),
                    whitelist: config.printer_whitelist.iter().cloned().collect(),
                },
                build_date: env!("CARGO_PKG_VERSION").to_string(),
                hostname,
                notification_channel: if config.fcm_notifications_enable { "fcm" } else { "xmpp" }.to_string(),
                submit_queue_capacity: config.native_job_queue_size.max(1),
            },
            printer_poll_interval: config.native_printer_poll_interval()?,
            job_pipeline: JobPipelineConfig {
                prefix_job_id_to_job_title: config.prefix_job_id_to_job_title,
                cups_job_full_username: config.cups_job_full_username,
                spool_dir: std::env::temp_dir(),
            },
            gcp_max_concurrent_downloads: config.gcp_max_concurrent_downloads,
        },
    )
    .await;

    let stats_source = Arc::new(SupervisorStats {
        table: manager.table_handle(),
        stats: manager.stats_handle(),
        adapter: adapter.clone(),
        cups_conn_max_qty: config.cups_max_connections,
    });
    let monitor = match Monitor::bind(&config.monitor_socket_filename, stats_source).await {
        Ok(monitor) => monitor,
        Err(e) => {
            eprintln!("monitor error: {e}");
            manager.quit().await;
            std::process::exit(1);
        }
    };

    let shutdown = Arc::new(ShutdownController::new());
    let (shutdown_tx, mut shutdown_rx) = mpsc::unbounded_channel::<ShutdownEvent>();
    spawn_signal_handlers(shutdown.clone(), shutdown_tx);

    if config.cloud_printing_enable {
        info!("Ready to rock as proxy '{}'", config.proxy_name);
    } else {
        info!("Ready to rock in local-only mode");
    }

    let mut shutdown_task: Option<tokio::task::JoinHandle<()>> = None;
    loop {
        tokio::select! {
            ev = shutdown_rx.recv() => {
                match ev {
                    Some(ShutdownEvent::Graceful) => {
                        if shutdown_task.is_none() {
                            info!("Shutting down");
                            shutdown_task = Some(tokio::spawn(run_shutdown(cloud.clone(), transport, manager, monitor)));
                            break;
                        }
                    }
                    Some(ShutdownEvent::Immediate) => {
                        warn!("forced shutdown on second signal");
                        std::process::exit(1);
                    }
                    None => break,
                }
            }
            _ = wait_dead(&mut transport_dead) => {
                warn!("notification transport died unexpectedly, reconnecting");
                transport = None;
                transport_dead = None;
                match connect_transport(&config, cloud.clone(), notif_tx.clone()).await {
                    Ok((new_transport, dead_rx)) => {
                        transport = Some(new_transport);
                        transport_dead = Some(dead_rx);
                    }
                    Err(e) => {
                        warn!(error = %e, "failed to reconnect notification transport");
                    }
                }
            }
        }
    }

    if let Some(task) = shutdown_task {
        let _ = task.await;
    }
    Ok(())
}

async fn run_shutdown(
    cloud: Arc<CloudClient>,
    transport: Option<Box<dyn NotificationTransport>>,
    manager: PrinterManager,
    monitor: Monitor,
) {
    cloud.quit();
    if let Some(transport) = transport {
        transport.quit();
        let _ = tokio::time::timeout(TRANSPORT_SHUTDOWN_GRACE, transport.dead()).await;
    }
    manager.quit().await;
    monitor.quit().await;
}

async fn connect_transport(
    config: &Config,
    cloud: Arc<CloudClient>,
    notif_tx: mpsc::Sender<PrinterNotification>,
) -> anyhow::Result<(Box<dyn NotificationTransport>, oneshot::Receiver<()>)> {
    let provider = Arc::new(CloudTokenProvider(cloud.clone()));
    if config.fcm_notifications_enable {
        let (transport, mut rx, dead_rx) = HttpStreamTransport::connect(
            reqwest::Client::new(),
            config.fcm_server_bind_url.clone(),
            format!("proxies/{}", config.proxy_name),
            provider,
        )
        .await?;
        forward_notifications(&mut rx, notif_tx);
        Ok((Box::new(transport), dead_rx))
    } else {
        let (transport, mut rx, dead_rx) = XmppTransport::connect(
            XmppConfig {
                server: config.xmpp_server.clone(),
                port: config.xmpp_port,
                domain: config.xmpp_server.clone(),
                user: config.xmpp_jid.clone(),
                resource: "cloudprint".to_string(),
                ping_interval: config.xmpp_ping_interval()?,
                ping_timeout: config.xmpp_ping_timeout()?,
            },
            provider,
        )
        .await?;
        forward_notifications(&mut rx, notif_tx);
        Ok((Box::new(transport), dead_rx))
    }
}

/// Awaits a transport's `dead` signal when one is pending; never resolves
/// when `None` (e.g. local-only mode, or a failed reconnect), so it can sit
/// unconditionally in the supervisor's `select!` loop.
async fn wait_dead(dead_rx: &mut Option<oneshot::Receiver<()>>) {
    match dead_rx {
        Some(rx) => {
            let _ = rx.await;
        }
        None => std::future::pending::<()>().await,
    }
}

/// Each transport variant owns its own `mpsc::Receiver`; the manager owns
/// the other end of a single shared channel, so a receive loop bridges them.
fn forward_notifications(rx: &mut mpsc::Receiver<PrinterNotification>, tx: mpsc::Sender<PrinterNotification>) {
    let mut rx = std::mem::replace(rx, mpsc::channel(1).1);
    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            if tx.send(notification).await.is_err() {
                return;
            }
        }
    });
}
