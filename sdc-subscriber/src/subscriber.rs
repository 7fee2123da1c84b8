use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;
use sdc_bus::{BoxStream, BusClient, Credentials, Message, Session};
use sdc_core::{AddressTable, Fqdn};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::SubscriberError;
use crate::messages::{
    GreetReply, GreetRequest, RegisterMessage, UnregisterMessage,
    DEFAULT_MINIMUM_REGISTER_INTERVAL_SECONDS, DEFAULT_PRUNE_THRESHOLD_SECONDS,
};
use crate::metrics::SubscriberMetrics;

const REGISTER_SUBJECT: &str = "service-discovery.register";
const UNREGISTER_SUBJECT: &str = "service-discovery.unregister";
const GREET_SUBJECT: &str = "service-discovery.greet";

/// Observable lifecycle state of a running [`Subscriber`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Greeting,
    Running,
    Reconnecting,
    Closed,
}

/// Bus connection parameters for a single subscriber instance. `id` is
/// expected to already be in its final `<index>-<uuid>` form; generating it
/// is the caller's responsibility. `minimum_register_interval_seconds`/
/// `prune_threshold_seconds` are announced to the fleet on every greet,
/// mirroring `main.go`'s `mbus.SubscriberOpts` defaults (60/120).
#[derive(Debug, Clone)]
pub struct SubscriberConfig {
    pub id: String,
    pub urls: Vec<String>,
    pub credentials: Credentials,
    pub greet_timeout: Duration,
    pub minimum_register_interval_seconds: u64,
    pub prune_threshold_seconds: u64,
}

impl Default for SubscriberConfig {
    fn default() -> Self {
        Self {
            id: String::new(),
            urls: Vec::new(),
            credentials: Credentials::default(),
            greet_timeout: Duration::from_secs(5),
            minimum_register_interval_seconds: DEFAULT_MINIMUM_REGISTER_INTERVAL_SECONDS,
            prune_threshold_seconds: DEFAULT_PRUNE_THRESHOLD_SECONDS,
        }
    }
}

struct Shared<B: BusClient> {
    id: String,
    session: B::Session,
    table: AddressTable,
    metrics: SubscriberMetrics,
    greet_timeout: Duration,
    minimum_register_interval_seconds: u64,
    prune_threshold_seconds: u64,
    state: Mutex<State>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

/// Drives the address table from a bus connection: subscribes to register
/// and unregister subjects, performs the greet handshake on warm-up and on
/// every reconnect, and keeps the table's warm flag in sync with handshake
/// outcomes.
pub struct Subscriber<B: BusClient> {
    shared: Arc<Shared<B>>,
}

impl<B: BusClient> Clone for Subscriber<B> {
    fn clone(&self) -> Self {
        Self {
            shared: self.shared.clone(),
        }
    }
}

impl<B: BusClient> Subscriber<B> {
    /// Connects, subscribes, greets, and starts the background tasks that
    /// keep `table` in sync. The table is warmed exactly once, regardless
    /// of whether the greet handshake completed or timed out.
    pub async fn start(
        bus: B,
        table: AddressTable,
        config: SubscriberConfig,
        metrics: SubscriberMetrics,
    ) -> Result<Self, SubscriberError> {
        let session = bus
            .connect(&config.urls, &config.credentials)
            .await
            .map_err(SubscriberError::Connect)?;

        table.pause_pruning();

        let register_stream = session.subscribe(REGISTER_SUBJECT, None).await.map_err(|source| {
            SubscriberError::Subscribe {
                subject: REGISTER_SUBJECT,
                source,
            }
        })?;
        let unregister_stream =
            session
                .subscribe(UNREGISTER_SUBJECT, None)
                .await
                .map_err(|source| SubscriberError::Subscribe {
                    subject: UNREGISTER_SUBJECT,
                    source,
                })?;

        let shared = Arc::new(Shared {
            id: config.id,
            session,
            table: table.clone(),
            metrics,
            greet_timeout: config.greet_timeout,
            minimum_register_interval_seconds: config.minimum_register_interval_seconds,
            prune_threshold_seconds: config.prune_threshold_seconds,
            state: Mutex::new(State::Greeting),
            tasks: Mutex::new(Vec::new()),
        });

        greet(
            &shared.session,
            &shared.id,
            shared.greet_timeout,
            shared.minimum_register_interval_seconds,
            shared.prune_threshold_seconds,
        )
        .await;
        table.set_warm(true);
        table.resume_pruning();
        *shared.state.lock() = State::Running;

        let register_task = spawn_consumer(register_stream, {
            let table = shared.table.clone();
            let metrics = shared.metrics.clone();
            move |payload| handle_register(&table, &metrics, payload)
        });
        let unregister_task = spawn_consumer(unregister_stream, {
            let table = shared.table.clone();
            let metrics = shared.metrics.clone();
            move |payload| handle_unregister(&table, &metrics, payload)
        });
        let reconnect_task = spawn_reconnect_watcher(shared.clone());

        shared
            .tasks
            .lock()
            .extend([register_task, unregister_task, reconnect_task]);

        Ok(Self { shared })
    }

    pub fn state(&self) -> State {
        *self.shared.state.lock()
    }

    /// Idempotent-in-spirit teardown: stops the background tasks, closes
    /// the bus session, and shuts down the table.
    pub async fn close(self) {
        *self.shared.state.lock() = State::Closed;
        for task in self.shared.tasks.lock().drain(..) {
            task.abort();
        }
        let _ = self.shared.session.close().await;
        self.shared.table.shutdown();
    }
}

fn spawn_reconnect_watcher<B: BusClient>(shared: Arc<Shared<B>>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut events = shared.session.reconnected();
        while events.next().await.is_some() {
            *shared.state.lock() = State::Reconnecting;
            shared.table.set_warm(false);
            shared.table.pause_pruning();
            greet(
                &shared.session,
                &shared.id,
                shared.greet_timeout,
                shared.minimum_register_interval_seconds,
                shared.prune_threshold_seconds,
            )
            .await;
            shared.table.set_warm(true);
            shared.table.resume_pruning();
            *shared.state.lock() = State::Running;
        }
    })
}

fn spawn_consumer<F>(mut stream: BoxStream<Message>, mut on_message: F) -> JoinHandle<()>
where
    F: FnMut(&[u8]) + Send + 'static,
{
    tokio::spawn(async move {
        while let Some(message) = stream.next().await {
            on_message(&message.payload);
        }
    })
}

/// Issues the greet handshake and logs its outcome. The table is warmed
/// unconditionally by the caller either way — a registrar that never
/// answers still leaves the table serving whatever it already knows.
async fn greet<S: Session>(
    session: &S,
    id: &str,
    timeout: Duration,
    minimum_register_interval_seconds: u64,
    prune_threshold_seconds: u64,
) -> Option<GreetReply> {
    let request = GreetRequest {
        id: id.to_string(),
        minimum_register_interval_in_seconds: minimum_register_interval_seconds,
        prune_threshold_in_seconds: prune_threshold_seconds,
    };
    let payload = match serde_json::to_vec(&request) {
        Ok(payload) => Bytes::from(payload),
        Err(error) => {
            warn!(%error, "failed to encode greet request");
            return None;
        }
    };

    match session.request(GREET_SUBJECT, payload, timeout).await {
        Ok(bytes) => match serde_json::from_slice::<GreetReply>(&bytes) {
            Ok(reply) => {
                info!(
                    minimum_register_interval_in_seconds = ?reply.minimum_register_interval_in_seconds,
                    prune_threshold_in_seconds = ?reply.prune_threshold_in_seconds,
                    "greet handshake completed"
                );
                Some(reply)
            }
            Err(error) => {
                warn!(%error, "greet reply was not valid JSON");
                None
            }
        },
        Err(error) => {
            warn!(%error, "greet request did not complete, warming table anyway");
            None
        }
    }
}

fn handle_register(table: &AddressTable, metrics: &SubscriberMetrics, payload: &[u8]) {
    match serde_json::from_slice::<RegisterMessage>(payload) {
        Ok(msg) if !msg.uris.is_empty() => {
            metrics.register_messages_received.inc();
            for uri in &msg.uris {
                let fqdn = Fqdn::from(uri.as_str());
                if table.add(&fqdn, msg.host.clone()).is_err() {
                    return;
                }
            }
        }
        _ => {
            metrics.invalid_messages_received.inc();
            debug!("dropped invalid or empty register message");
        }
    }
}

fn handle_unregister(table: &AddressTable, metrics: &SubscriberMetrics, payload: &[u8]) {
    match serde_json::from_slice::<UnregisterMessage>(payload) {
        Ok(msg) if !msg.uris.is_empty() => {
            metrics.unregister_messages_received.inc();
            for uri in &msg.uris {
                let fqdn = Fqdn::from(uri.as_str());
                if table.remove(&fqdn, &msg.host).is_err() {
                    return;
                }
            }
        }
        _ => {
            metrics.invalid_messages_received.inc();
            debug!("dropped invalid or empty unregister message");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus_client::registry::Registry;
    use sdc_bus::testing::MockBusClient;
    use sdc_core::TableError;
    use sdc_core::TestClock;

    fn config(greet_timeout: Duration) -> SubscriberConfig {
        SubscriberConfig {
            id: "0-test-subscriber".to_string(),
            urls: vec!["nats://localhost:4222".to_string()],
            credentials: Credentials::default(),
            greet_timeout,
            ..SubscriberConfig::default()
        }
    }

    fn table() -> AddressTable {
        AddressTable::new(
            Duration::from_secs(60),
            Duration::from_secs(10),
            Arc::new(TestClock::new()),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn warmup_marks_table_warm_even_when_greet_times_out() {
        let table = table();
        let bus = MockBusClient::new();
        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);

        let subscriber = Subscriber::start(bus, table.clone(), config(Duration::from_millis(20)), metrics)
            .await
            .unwrap();

        assert!(table.is_warm());
        assert_eq!(subscriber.state(), State::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn register_message_adds_ip_to_table() {
        let table = table();
        let bus = MockBusClient::new();
        bus.set_greet_reply(Some(Bytes::from_static(b"{}")));
        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);

        let _subscriber = Subscriber::start(bus.clone(), table.clone(), config(Duration::from_millis(20)), metrics)
            .await
            .unwrap();

        bus.deliver(
            REGISTER_SUBJECT,
            None,
            r#"{"host":"10.0.0.5","uris":["app.internal."]}"#,
        );
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(
            table.lookup(&"app.internal".into()),
            vec!["10.0.0.5".to_string()]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn unregister_message_removes_ip_from_table() {
        let table = table();
        let host: Fqdn = "app.internal".into();
        table.add(&host, "10.0.0.5").unwrap();
        let bus = MockBusClient::new();
        bus.set_greet_reply(Some(Bytes::from_static(b"{}")));
        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);

        let _subscriber = Subscriber::start(bus.clone(), table.clone(), config(Duration::from_millis(20)), metrics)
            .await
            .unwrap();

        bus.deliver(
            UNREGISTER_SUBJECT,
            None,
            r#"{"host":"10.0.0.5","uris":["app.internal."]}"#,
        );
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(table.lookup(&host).is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn empty_uris_are_dropped_as_invalid() {
        let table = table();
        let bus = MockBusClient::new();
        bus.set_greet_reply(Some(Bytes::from_static(b"{}")));
        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);

        let _subscriber = Subscriber::start(bus.clone(), table.clone(), config(Duration::from_millis(20)), metrics.clone())
            .await
            .unwrap();

        bus.deliver(REGISTER_SUBJECT, None, r#"{"host":"10.0.0.5","uris":[]}"#);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert!(table.lookup(&"app.internal".into()).is_empty());
        assert_eq!(metrics.invalid_messages_received.get(), 1);
        assert_eq!(metrics.register_messages_received.get(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn malformed_json_is_dropped_as_invalid() {
        let table = table();
        let bus = MockBusClient::new();
        bus.set_greet_reply(Some(Bytes::from_static(b"{}")));
        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);

        let _subscriber = Subscriber::start(bus.clone(), table.clone(), config(Duration::from_millis(20)), metrics.clone())
            .await
            .unwrap();

        bus.deliver(REGISTER_SUBJECT, None, r#"not json"#);
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        assert_eq!(metrics.invalid_messages_received.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_reruns_the_greet_handshake() {
        let table = table();
        let bus = MockBusClient::new();
        bus.set_greet_reply(Some(Bytes::from_static(b"{}")));
        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);

        let subscriber = Subscriber::start(bus.clone(), table.clone(), config(Duration::from_millis(20)), metrics)
            .await
            .unwrap();

        let before = bus
            .published()
            .iter()
            .filter(|m| m.subject == GREET_SUBJECT)
            .count();

        bus.set_greet_reply(Some(Bytes::from_static(b"{}")));
        bus.reconnect();
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;

        let after = bus
            .published()
            .iter()
            .filter(|m| m.subject == GREET_SUBJECT)
            .count();

        assert_eq!(after, before + 1);
        assert!(table.is_warm());
        assert_eq!(subscriber.state(), State::Running);
    }

    #[tokio::test(start_paused = true)]
    async fn close_shuts_down_the_table() {
        let table = table();
        let bus = MockBusClient::new();
        bus.set_greet_reply(Some(Bytes::from_static(b"{}")));
        let mut registry = Registry::default();
        let metrics = SubscriberMetrics::register(&mut registry);

        let subscriber = Subscriber::start(bus, table.clone(), config(Duration::from_millis(20)), metrics)
            .await
            .unwrap();

        subscriber.close().await;

        assert_eq!(
            table.add(&"app.internal".into(), "10.0.0.1"),
            Err(TableError::ShutDown)
        );
    }
}
