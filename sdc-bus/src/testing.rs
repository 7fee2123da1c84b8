//! A deterministic, in-memory [`BusClient`] for driving the Subscriber's
//! tests without a real broker.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::{broadcast, watch};
use tokio_stream::wrappers::{BroadcastStream, WatchStream};
use tokio_stream::StreamExt;

use crate::client::{BoxStream, BusClient, Credentials, Message, Session};
use crate::error::BusError;

const SUBJECT_BUFFER: usize = 64;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMessage {
    pub subject: String,
    pub reply: Option<String>,
    pub payload: Bytes,
}

struct Shared {
    subs: Mutex<HashMap<String, broadcast::Sender<Message>>>,
    published: Mutex<Vec<PublishedMessage>>,
    greet_reply: Mutex<Option<Bytes>>,
    reconnected_tx: watch::Sender<()>,
    reconnected_rx: watch::Receiver<()>,
}

/// A `BusClient` that never talks to a network; tests drive it directly
/// through [`MockBusClient::deliver`], [`MockBusClient::reconnect`], and
/// [`MockBusClient::set_greet_reply`].
#[derive(Clone)]
pub struct MockBusClient {
    shared: Arc<Shared>,
}

impl Default for MockBusClient {
    fn default() -> Self {
        let (reconnected_tx, reconnected_rx) = watch::channel(());
        Self {
            shared: Arc::new(Shared {
                subs: Mutex::new(HashMap::new()),
                published: Mutex::new(Vec::new()),
                greet_reply: Mutex::new(None),
                reconnected_tx,
                reconnected_rx,
            }),
        }
    }
}

impl MockBusClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates a message arriving on `subject`. Only subscribers already
    /// registered for it will see it, matching a real broker's behavior for
    /// a subscription that hasn't taken effect yet.
    pub fn deliver(&self, subject: &str, reply: Option<&str>, payload: impl Into<Bytes>) {
        let subs = self.shared.subs.lock();
        if let Some(tx) = subs.get(subject) {
            let _ = tx.send(Message {
                subject: subject.to_string(),
                reply: reply.map(str::to_string),
                payload: payload.into(),
            });
        }
    }

    /// Simulates a bus reconnect event.
    pub fn reconnect(&self) {
        let _ = self.shared.reconnected_tx.send(());
    }

    /// Sets the payload the next `greet` request will resolve with.
    /// `None` makes the request hang until its timeout elapses.
    pub fn set_greet_reply(&self, reply: Option<Bytes>) {
        *self.shared.greet_reply.lock() = reply;
    }

    /// Every `publish`/`request` issued through this session so far.
    pub fn published(&self) -> Vec<PublishedMessage> {
        self.shared.published.lock().clone()
    }
}

#[async_trait]
impl BusClient for MockBusClient {
    type Session = MockBusClient;

    async fn connect(
        &self,
        _urls: &[String],
        _credentials: &Credentials,
    ) -> Result<MockBusClient, BusError> {
        Ok(self.clone())
    }
}

#[async_trait]
impl Session for MockBusClient {
    async fn subscribe(
        &self,
        subject: &str,
        _queue_group: Option<&str>,
    ) -> Result<BoxStream<Message>, BusError> {
        let mut subs = self.shared.subs.lock();
        let tx = subs
            .entry(subject.to_string())
            .or_insert_with(|| broadcast::channel(SUBJECT_BUFFER).0)
            .clone();
        let rx = tx.subscribe();
        Ok(Box::pin(
            BroadcastStream::new(rx).filter_map(|item| item.ok()),
        ))
    }

    async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<(), BusError> {
        self.shared.published.lock().push(PublishedMessage {
            subject: subject.to_string(),
            reply: reply.map(str::to_string),
            payload,
        });
        Ok(())
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        self.shared.published.lock().push(PublishedMessage {
            subject: subject.to_string(),
            reply: None,
            payload,
        });
        match self.shared.greet_reply.lock().take() {
            Some(reply) => Ok(reply),
            None => {
                tokio::time::sleep(timeout).await;
                Err(BusError::Timeout)
            }
        }
    }

    async fn close(&self) -> Result<(), BusError> {
        Ok(())
    }

    fn reconnected(&self) -> BoxStream<()> {
        Box::pin(WatchStream::new(self.shared.reconnected_rx.clone()).skip(1))
    }
}
