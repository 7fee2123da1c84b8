use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// The flat configuration record read from the `-c <path>` JSON file.
/// Unknown top-level keys are tolerated; missing required ones fail to
/// deserialize, which is the only validation this record needs.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Config {
    pub address: String,
    pub port: u16,
    #[serde(rename = "CACert")]
    pub ca_cert: String,
    pub server_cert: String,
    pub server_key: String,
    pub nats_servers: Vec<NatsServer>,
    pub index: String,
    pub staleness_threshold_seconds: u64,
    pub pruning_interval_seconds: u64,
    pub metron_port: u16,
    pub metrics_emit_seconds: u64,
    pub log_level_address: String,
    pub log_level_port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NatsServer {
    pub host: String,
    pub port: u16,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Config = serde_json::from_slice(&bytes)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        if config.nats_servers.is_empty() {
            anyhow::bail!("NatsServers must list at least one server");
        }
        Ok(config)
    }

    pub fn nats_urls(&self) -> Vec<String> {
        self.nats_servers
            .iter()
            .map(|server| format!("nats://{}:{}", server.host, server.port))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_complete_config() {
        let raw = r#"{
            "Address": "0.0.0.0",
            "Port": 8080,
            "CACert": "/etc/sdc/ca.crt",
            "ServerCert": "/etc/sdc/server.crt",
            "ServerKey": "/etc/sdc/server.key",
            "NatsServers": [{"host":"10.0.0.1","port":4222,"user":"nats","password":"secret"}],
            "Index": "0",
            "StalenessThresholdSeconds": 120,
            "PruningIntervalSeconds": 60,
            "MetronPort": 3457,
            "MetricsEmitSeconds": 30,
            "LogLevelAddress": "127.0.0.1",
            "LogLevelPort": 8081
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.ca_cert, "/etc/sdc/ca.crt");
        assert_eq!(config.nats_urls(), vec!["nats://10.0.0.1:4222".to_string()]);
    }

    #[test]
    fn tolerates_unknown_top_level_fields() {
        let raw = r#"{
            "Address": "0.0.0.0",
            "Port": 8080,
            "CACert": "/ca",
            "ServerCert": "/cert",
            "ServerKey": "/key",
            "NatsServers": [{"host":"10.0.0.1","port":4222}],
            "Index": "0",
            "StalenessThresholdSeconds": 120,
            "PruningIntervalSeconds": 60,
            "MetronPort": 3457,
            "MetricsEmitSeconds": 30,
            "LogLevelAddress": "127.0.0.1",
            "LogLevelPort": 8081,
            "SomeFutureField": true
        }"#;
        let config: Config = serde_json::from_str(raw).unwrap();
        assert_eq!(config.index, "0");
    }
}
