use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::{info, warn};

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ConsoleConfig {
    pub mqtt: MqttConf,
    pub topics: TopicsConf,
    pub api: ApiConf,
    pub render: RenderConf,
    /// Load the node list over HTTP once at startup, before the first push.
    pub bootstrap: bool,
    pub health_log_secs: u64,
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            mqtt: MqttConf::default(),
            topics: TopicsConf::default(),
            api: ApiConf::default(),
            render: RenderConf::default(),
            bootstrap: true,
            health_log_secs: 30,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct MqttConf {
    pub host: String,
    pub port: u16,
    pub client_id: Option<String>,
    pub keep_alive_secs: u64,
    pub reconnect_delay_secs: u64,
}

impl Default for MqttConf {
    fn default() -> Self {
        Self {
            host: "localhost".into(),
            port: 1883,
            client_id: None,
            keep_alive_secs: 15,
            reconnect_delay_secs: 2,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct TopicsConf {
    pub snapshot: String,
    pub heartbeat: String,
}

impl Default for TopicsConf {
    fn default() -> Self {
        Self {
            snapshot: "symbion/cluster/nodes@v1".into(),
            heartbeat: "symbion/cluster/heartbeat@v1".into(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ApiConf {
    pub base_url: String,
    pub nodes_path: String,
    pub status_path: String,
    pub timeout_secs: u64,
    #[serde(skip_serializing)]
    pub api_key: Option<String>,
}

impl Default for ApiConf {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".into(),
            nodes_path: "/nodes".into(),
            status_path: "/".into(),
            timeout_secs: 10,
            api_key: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct RenderConf {
    /// Characters of the node id shown before truncation.
    pub id_width: usize,
    pub heartbeat_precision: usize,
    pub stale_after_secs: f64,
}

impl Default for RenderConf {
    fn default() -> Self {
        Self {
            id_width: 8,
            heartbeat_precision: 2,
            stale_after_secs: 30.0,
        }
    }
}

impl ConsoleConfig {
    pub fn from_yaml_str(txt: &str) -> Result<Self, serde_yaml::Error> {
        if txt.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(txt)
    }

    /// Applies `SYMBION_*` overrides from a lookup (the process env in production).
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup("SYMBION_MQTT_HOST") {
            self.mqtt.host = host;
        }
        if let Some(port) = lookup("SYMBION_MQTT_PORT") {
            match port.parse() {
                Ok(port) => self.mqtt.port = port,
                Err(_) => warn!("ignoring invalid SYMBION_MQTT_PORT {port:?}"),
            }
        }
        if let Some(url) = lookup("SYMBION_API_URL") {
            self.api.base_url = url;
        }
        if let Some(key) = lookup("SYMBION_API_KEY").filter(|k| !k.is_empty()) {
            self.api.api_key = Some(key);
        }
    }
}

pub async fn load_config_from(path: &Path) -> ConsoleConfig {
    if !path.exists() {
        info!("no {}, using default config", path.display());
        return ConsoleConfig::default();
    }
    let txt = match fs::read_to_string(path).await {
        Ok(txt) => txt,
        Err(e) => {
            warn!("cannot read {}: {e}, using default config", path.display());
            return ConsoleConfig::default();
        }
    };
    ConsoleConfig::from_yaml_str(&txt).unwrap_or_else(|e| {
        warn!("invalid config {}: {e}, using default config", path.display());
        ConsoleConfig::default()
    })
}

pub async fn load_config() -> ConsoleConfig {
    let path = std::env::var("SYMBION_CONSOLE_CONFIG").unwrap_or_else(|_| "console.yaml".into());
    let mut cfg = load_config_from(Path::new(&path)).await;
    cfg.apply_overrides(|key| std::env::var(key).ok());
    cfg
}
