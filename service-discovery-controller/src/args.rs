use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use prometheus_client::registry::Registry;
use sdc_bus::{Credentials, NatsBusClient};
use sdc_core::{AddressTable, SystemClock};
use sdc_frontend::FrontendMetrics;
use sdc_subscriber::{Subscriber, SubscriberConfig, SubscriberMetrics};
use tracing::info;
use uuid::Uuid;

use crate::config::Config;
use crate::error::ExitError;
use crate::logging;

const GREET_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Parser)]
#[clap(name = "service-discovery-controller", about = "Service discovery controller")]
pub struct Args {
    /// Path to the JSON configuration file.
    #[clap(short = 'c', long = "config")]
    config_path: PathBuf,

    /// Initial `tracing` filter directive; adjustable at runtime via the
    /// admin server's `/log-level` endpoint.
    #[clap(long, default_value = "info", env = "RUST_LOG")]
    log_level: String,
}

impl Args {
    pub async fn run(self) -> Result<(), ExitError> {
        let set_log_level = logging::init(&self.log_level);

        let config = Config::load(&self.config_path).map_err(ExitError::Config)?;

        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);
        let frontend_metrics = FrontendMetrics::register(&mut registry);
        let registry = std::sync::Arc::new(registry);

        let table = AddressTable::new(
            Duration::from_secs(config.staleness_threshold_seconds),
            Duration::from_secs(config.pruning_interval_seconds),
            std::sync::Arc::new(SystemClock::default()),
        );

        let tls_config = sdc_frontend::load_server_config(
            std::path::Path::new(&config.ca_cert),
            std::path::Path::new(&config.server_cert),
            std::path::Path::new(&config.server_key),
        )
        .map_err(ExitError::Config)?;

        let subscriber = self
            .start_subscriber(&config, table.clone(), metrics)
            .await?;

        let (drain_signal, drain_watch) = drain::channel();

        let registration_addr = format!("{}:{}", config.address, config.port)
            .parse()
            .with_context(|| format!("invalid registration address {}:{}", config.address, config.port))
            .map_err(ExitError::Config)?;
        let admin_addr = format!("{}:{}", config.log_level_address, config.log_level_port)
            .parse()
            .with_context(|| {
                format!(
                    "invalid admin address {}:{}",
                    config.log_level_address, config.log_level_port
                )
            })
            .map_err(ExitError::Config)?;

        let registration_task = tokio::spawn(sdc_frontend::serve_registration(
            registration_addr,
            tls_config,
            table.clone(),
            frontend_metrics,
            drain_watch.clone(),
        ));
        let admin_task = tokio::spawn(sdc_frontend::serve_admin(
            admin_addr,
            table,
            registry,
            set_log_level,
            drain_watch,
        ));

        tokio::select! {
            _ = shutdown_signal() => {
                info!("shutdown signal received");
            }
            res = registration_task => {
                res.map_err(|e| ExitError::Runtime(e.into()))?.map_err(|e| ExitError::Runtime(e.into()))?;
            }
            res = admin_task => {
                res.map_err(|e| ExitError::Runtime(e.into()))?.map_err(|e| ExitError::Runtime(e.into()))?;
            }
        }

        drain_signal.drain().await;
        subscriber.close().await;
        Ok(())
    }

    async fn start_subscriber(
        &self,
        config: &Config,
        table: AddressTable,
        metrics: SubscriberMetrics,
    ) -> Result<Subscriber<NatsBusClient>, ExitError> {
        let id = format!("{}-{}", config.index, Uuid::new_v4());
        let credentials = config
            .nats_servers
            .first()
            .map(|server| Credentials {
                user: server.user.clone(),
                password: server.password.clone(),
            })
            .unwrap_or_default();

        let subscriber_config = SubscriberConfig {
            id,
            urls: config.nats_urls(),
            credentials,
            greet_timeout: GREET_TIMEOUT,
            ..SubscriberConfig::default()
        };

        Subscriber::start(NatsBusClient, table, subscriber_config, metrics)
            .await
            .map_err(|error| ExitError::Config(error.into()))
    }
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut terminate =
        signal(SignalKind::terminate()).expect("failed to install SIGTERM handler");
    let mut interrupt =
        signal(SignalKind::interrupt()).expect("failed to install SIGINT handler");

    tokio::select! {
        _ = terminate.recv() => {}
        _ = interrupt.recv() => {}
    }
}
