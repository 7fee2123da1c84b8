use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::{Registry, Unit};

/// Buckets in milliseconds, sized for an in-memory table lookup rather than
/// a network call.
const BUCKETS: [f64; 7] = [0.1, 0.5, 1.0, 5.0, 10.0, 50.0, 100.0];

/// Metrics emitted by the HTTP frontend itself, as opposed to the
/// Subscriber's bus-facing counters.
#[derive(Clone, Debug)]
pub struct FrontendMetrics {
    pub address_table_lookup_time: Histogram,
}

impl FrontendMetrics {
    pub fn register(registry: &mut Registry) -> Self {
        let address_table_lookup_time = Histogram::new(BUCKETS);
        registry.register_with_unit(
            "addressTableLookupTime",
            "Time spent looking up a hostname in the address table, in milliseconds",
            Unit::Other("milliseconds".to_string()),
            address_table_lookup_time.clone(),
        );
        Self {
            address_table_lookup_time,
        }
    }
}
