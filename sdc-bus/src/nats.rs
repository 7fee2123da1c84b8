use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use crate::client::{BoxStream, BusClient, Credentials, Message, Session};
use crate::error::BusError;

impl From<async_nats::Message> for Message {
    fn from(msg: async_nats::Message) -> Self {
        Self {
            subject: msg.subject.to_string(),
            reply: msg.reply.map(|s| s.to_string()),
            payload: msg.payload,
        }
    }
}

/// [`BusClient`] backed by a real NATS connection.
#[derive(Clone, Copy, Debug, Default)]
pub struct NatsBusClient;

#[async_trait]
impl BusClient for NatsBusClient {
    type Session = NatsSession;

    async fn connect(
        &self,
        urls: &[String],
        credentials: &Credentials,
    ) -> Result<NatsSession, BusError> {
        let (reconnected_tx, reconnected_rx) = watch::channel(());
        let mut options = async_nats::ConnectOptions::new().event_callback(move |event| {
            let tx = reconnected_tx.clone();
            async move {
                if let async_nats::Event::Connected = event {
                    let _ = tx.send(());
                }
            }
        });
        if let Some(user) = &credentials.user {
            options = options.user_and_password(
                user.clone(),
                credentials.password.clone().unwrap_or_default(),
            );
        }

        let client = options
            .connect(urls.join(","))
            .await
            .map_err(|_| BusError::Unavailable)?;

        Ok(NatsSession {
            client,
            reconnected_rx,
        })
    }
}

/// A connected NATS session. Subscriptions, reconnection and resubscription
/// are all handled transparently by `async-nats`; this type only adapts its
/// API to the abstract [`Session`] contract.
pub struct NatsSession {
    client: async_nats::Client,
    reconnected_rx: watch::Receiver<()>,
}

#[async_trait]
impl Session for NatsSession {
    async fn subscribe(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<BoxStream<Message>, BusError> {
        let sub = match queue_group {
            Some(group) => {
                self.client
                    .queue_subscribe(subject.to_string(), group.to_string())
                    .await
            }
            None => self.client.subscribe(subject.to_string()).await,
        }
        .map_err(|error| BusError::Transport(error.into()))?;

        Ok(Box::pin(sub.map(Message::from)))
    }

    async fn publish(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<(), BusError> {
        let result = match reply {
            Some(reply) => {
                self.client
                    .publish_with_reply(subject.to_string(), reply.to_string(), payload)
                    .await
            }
            None => self.client.publish(subject.to_string(), payload).await,
        };
        result.map_err(|error| BusError::Transport(error.into()))
    }

    async fn request(
        &self,
        subject: &str,
        payload: Bytes,
        timeout: Duration,
    ) -> Result<Bytes, BusError> {
        let request = self.client.request(subject.to_string(), payload);
        match tokio::time::timeout(timeout, request).await {
            Err(_) => Err(BusError::Timeout),
            Ok(Err(error)) => Err(BusError::Transport(error.into())),
            Ok(Ok(message)) => Ok(message.payload),
        }
    }

    async fn close(&self) -> Result<(), BusError> {
        self.client
            .drain()
            .await
            .map_err(|error| BusError::Transport(error.into()))
    }

    fn reconnected(&self) -> BoxStream<()> {
        // `WatchStream` yields the channel's current value immediately;
        // skip that first tick so callers only see *new* reconnects.
        Box::pin(WatchStream::new(self.reconnected_rx.clone()).skip(1))
    }
}
