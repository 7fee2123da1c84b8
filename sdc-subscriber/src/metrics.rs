use prometheus_client::metrics::counter::Counter;
use prometheus_client::registry::Registry;

/// Monotonic counters exposed on the admin metrics endpoint.
#[derive(Clone, Default)]
pub struct SubscriberMetrics {
    pub register_messages_received: Counter,
    pub unregister_messages_received: Counter,
    pub invalid_messages_received: Counter,
}

impl SubscriberMetrics {
    /// Builds the metrics and registers them into `registry`.
    pub fn register(registry: &mut Registry) -> Self {
        let metrics = Self::default();
        registry.register(
            "register_messages_received",
            "Register messages applied to the address table",
            metrics.register_messages_received.clone(),
        );
        registry.register(
            "unregister_messages_received",
            "Unregister messages applied to the address table",
            metrics.unregister_messages_received.clone(),
        );
        registry.register(
            "invalid_messages_received",
            "Malformed or empty-uri messages dropped without being applied",
            metrics.invalid_messages_received.clone(),
        );
        metrics
    }
}
