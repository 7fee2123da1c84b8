use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::stream::Stream;

use crate::error::BusError;

/// A stream of [`Message`]s, as returned by [`Session::subscribe`] and
/// [`Session::reconnected`].
pub type BoxStream<T> = Pin<Box<dyn Stream<Item = T> + Send>>;

/// A single bus message delivered to a subscriber.
#[derive(Clone, Debug)]
pub struct Message {
    pub subject: String,
    pub reply: Option<String>,
    pub payload: Bytes,
}

/// Credentials used to authenticate a [`BusClient::connect`] call.
#[derive(Clone, Debug, Default)]
pub struct Credentials {
    pub user: Option<String>,
    pub password: Option<String>,
}

/// Abstracts a publish/subscribe transport so the Subscriber can be driven
/// and tested without a real broker.
#[async_trait]
pub trait BusClient: Send + Sync + 'static {
    type Session: Session;

    /// Establishes a session against the first reachable of `urls`. Fails
    /// with [`BusError::Unavailable`] if none responds within the
    /// implementation's bounded attempt budget.
    async fn connect(
        &self,
        urls: &[String],
        credentials: &Credentials,
    ) -> Result<Self::Session, BusError>;
}

/// A connected bus session. Sessions reconnect transparently and preserve
/// subscriptions across reconnects, but emit an event on
/// [`Session::reconnected`] each time they do.
#[async_trait]
pub trait Session: Send + Sync + 'static {
    /// Subscribes to `subject`. If `queue_group` is set the broker
    /// load-balances delivery across every subscriber sharing the group;
    /// `None` means every subscriber sees every message.
    async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<BoxStream<Message>, BusError>;

    /// Fire-and-forget publish, optionally carrying a reply-to subject.
    async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<(), BusError>;

    /// Publishes to `subject` and awaits exactly one reply on a private
    /// inbox, failing with [`BusError::Timeout`] if none arrives in time.
    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError>;

    /// Idempotent teardown.
    async fn close(&self) -> Result<(), BusError>;

    /// Fires once per underlying reconnect. Does not replay past events to
    /// late subscribers.
    fn reconnected(&self) -> BoxStream<()>;
}
