//! Wire schemas for the three subjects the Subscriber speaks on. Fields not
//! listed here are tolerated and ignored; unknown fields never fail parsing.

use serde::{Deserialize, Serialize};

/// `service-discovery.register` — `host` is the IP a backend is reachable
/// at; `uris` are the fqdns it answers for. `port`/`tags`/`private_instance_id`
/// are accepted but not tracked: the table only ever stores the IP.
#[derive(Debug, Clone, Deserialize)]
pub struct RegisterMessage {
    pub host: String,
    #[serde(default)]
    pub uris: Vec<String>,
}

/// `service-discovery.unregister` — same shape as [`RegisterMessage`].
#[derive(Debug, Clone, Deserialize)]
pub struct UnregisterMessage {
    pub host: String,
    #[serde(default)]
    pub uris: Vec<String>,
}

/// Sent to `service-discovery.greet` on warm-up and on every reconnect.
/// `minimum_register_interval_in_seconds`/`prune_threshold_in_seconds`
/// tell the fleet how often to re-register and how stale an entry can get,
/// mirroring `main.go`'s `mbus.SubscriberOpts` defaults.
#[derive(Debug, Clone, Serialize)]
pub struct GreetRequest {
    pub id: String,
    #[serde(rename = "minimumRegisterIntervalInSeconds")]
    pub minimum_register_interval_in_seconds: u64,
    #[serde(rename = "pruneThresholdInSeconds")]
    pub prune_threshold_in_seconds: u64,
}

/// `main.go`'s `mbus.SubscriberOpts{MinimumRegisterIntervalInSeconds: 60,
/// PruneThresholdInSeconds: 120}` defaults.
pub const DEFAULT_MINIMUM_REGISTER_INTERVAL_SECONDS: u64 = 60;
pub const DEFAULT_PRUNE_THRESHOLD_SECONDS: u64 = 120;

/// A registrar's reply to a greet request. Carries no address data in this
/// deployment; the two fields are advisory only and are logged, not acted
/// on — the Subscriber's own configured staleness threshold and prune
/// interval remain authoritative.
#[derive(Debug, Clone, Deserialize)]
pub struct GreetReply {
    #[serde(default, rename = "minimumRegisterIntervalInSeconds")]
    pub minimum_register_interval_in_seconds: Option<u64>,
    #[serde(default, rename = "pruneThresholdInSeconds")]
    pub prune_threshold_in_seconds: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_message_tolerates_unknown_fields() {
        let raw = r#"{"host":"10.0.0.1","uris":["app.internal."],"port":8080,"tags":{"a":"b"}}"#;
        let msg: RegisterMessage = serde_json::from_str(raw).unwrap();
        assert_eq!(msg.host, "10.0.0.1");
        assert_eq!(msg.uris, vec!["app.internal.".to_string()]);
    }

    #[test]
    fn register_message_defaults_missing_uris_to_empty() {
        let raw = r#"{"host":"10.0.0.1"}"#;
        let msg: RegisterMessage = serde_json::from_str(raw).unwrap();
        assert!(msg.uris.is_empty());
    }

    #[test]
    fn greet_reply_tolerates_missing_fields() {
        let reply: GreetReply = serde_json::from_str("{}").unwrap();
        assert_eq!(reply.minimum_register_interval_in_seconds, None);
        assert_eq!(reply.prune_threshold_in_seconds, None);
    }

    #[test]
    fn greet_request_serializes_all_fields() {
        let req = GreetRequest {
            id: "3-uuid".to_string(),
            minimum_register_interval_in_seconds: DEFAULT_MINIMUM_REGISTER_INTERVAL_SECONDS,
            prune_threshold_in_seconds: DEFAULT_PRUNE_THRESHOLD_SECONDS,
        };
        let encoded = serde_json::to_string(&req).unwrap();
        assert_eq!(
            encoded,
            r#"{"id":"3-uuid","minimumRegisterIntervalInSeconds":60,"pruneThresholdInSeconds":120}"#
        );
    }
}
