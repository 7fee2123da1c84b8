use sdc_bus::BusError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SubscriberError {
    #[error("failed to connect to the bus: {0}")]
    Connect(#[source] BusError),
    #[error("failed to subscribe to {subject}: {source}")]
    Subscribe {
        subject: &'static str,
        #[source]
        source: BusError,
    },
}
