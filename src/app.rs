use std::{sync::Arc, time::Duration};

use anyhow::Result;
use reqwest::Client;
use tokio::{io::BufReader, time::timeout};

use crate::{
    analysis::AnalysisClient,
    bridge::{HostBridge, HostOutput},
    config::AppConfig,
    db::{self, SqliteStore},
    infrastructure::{
        directories::ResolvedPaths,
        shutdown::{Shutdown, ShutdownReason},
    },
    notify::{
        BannerChannel, NotificationDispatcher, PrimaryWithFallback, SystemChannel, WebhookNotifier,
    },
    tasks::{ChangeDebouncer, Monitor, PendingChange},
};

const SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

pub struct PhishGuardApp {
    store: Arc<SqliteStore>,
    bridge: Arc<HostBridge>,
    debouncer: Arc<ChangeDebouncer<PendingChange>>,
    shutdown: Shutdown,
}

impl PhishGuardApp {
    pub async fn initialize(config: AppConfig, paths: ResolvedPaths, shutdown: Shutdown) -> Result<Self> {
        tracing::info!(
            data_dir = %paths.data_dir.display(),
            logs_dir = %paths.logs_dir.display(),
            "starting phish guard monitor"
        );
        let pool = db::init_pool(&paths.db_path).await?;
        let store = Arc::new(SqliteStore::new(pool));

        let http_client = Client::builder()
            .user_agent(format!("phish-guard-rust/{}", env!("CARGO_PKG_VERSION")))
            .build()?;

        let output = Arc::new(HostOutput::stdout());
        if config.notify.webhook_url.is_none() {
            tracing::info!(target: "notify", "NOTIFY_WEBHOOK_URL unset; alerts use in-page banners");
        }
        let system = SystemChannel::new(Arc::new(WebhookNotifier::new(
            http_client.clone(),
            config.notify.webhook_url.clone(),
        )));
        let banner = BannerChannel::new(output.clone());
        let dispatcher = NotificationDispatcher::new(Arc::new(PrimaryWithFallback::new(
            Box::new(system),
            Box::new(banner),
        )));

        let monitor = Arc::new(Monitor::new(
            store.clone(),
            AnalysisClient::new(http_client, config.analysis.clone()),
            dispatcher,
            output.clone(),
            config.monitor.clone(),
        ));
        let debouncer = Arc::new(ChangeDebouncer::new(
            config.monitor.debounce,
            monitor.evaluator(),
        ));
        let bridge = Arc::new(HostBridge::new(monitor, debouncer.clone(), output));

        Ok(Self {
            store,
            bridge,
            debouncer,
            shutdown,
        })
    }

    pub async fn run(self) -> Result<()> {
        let PhishGuardApp {
            store,
            bridge,
            debouncer,
            shutdown,
        } = self;

        tracing::info!("phish guard monitor started");

        let input = BufReader::new(tokio::io::stdin());
        let outcome = bridge.run(input, shutdown.subscribe(), SHUTDOWN_GRACE).await;
        let reason = match &outcome {
            Ok(reason) => *reason,
            Err(err) => {
                tracing::error!(target: "bridge", error = %err, "host input failed");
                ShutdownReason::InputClosed
            }
        };
        shutdown.trigger(reason);
        match reason {
            ShutdownReason::Signal => tracing::info!("shutdown signal received (CTRL+C / SIGTERM)"),
            ShutdownReason::InputClosed => tracing::info!("browser shell disconnected"),
        }

        debouncer.cancel_all();
        if timeout(SHUTDOWN_GRACE, debouncer.wait_running()).await.is_err() {
            tracing::warn!(
                target: "pipeline",
                "evaluations did not finish within {:?}; abandoning them",
                SHUTDOWN_GRACE
            );
        }

        if timeout(SHUTDOWN_GRACE, store.close()).await.is_err() {
            tracing::warn!(
                target: "db",
                "store did not close within {:?}",
                SHUTDOWN_GRACE
            );
        }

        tracing::info!("phish guard monitor stopped");
        outcome.map(|_| ())
    }
}
