use std::sync::Arc;

use tracing_subscriber::prelude::*;
use tracing_subscriber::{reload, EnvFilter};

use sdc_frontend::LogLevelSetter;

/// Installs the process-wide `tracing` subscriber and returns a setter the
/// admin server's `/log-level` endpoint can use to change verbosity
/// without a restart, the direct analogue of the original's
/// `lager.ReconfigurableSink`.
pub fn init(initial_level: &str) -> LogLevelSetter {
    let filter = EnvFilter::try_new(initial_level).unwrap_or_else(|_| EnvFilter::new("info"));
    let (filter, reload_handle) = reload::Layer::new(filter);

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    Arc::new(move |level: &str| {
        let filter = EnvFilter::try_new(level)?;
        reload_handle.reload(filter)?;
        Ok(())
    })
}
