/*!
Mock MQTT pour développer la console sans broker

Enregistre les abonnements et ne délivre les messages simulés que sur les
topics abonnés, comme le ferait le broker.
*/

use rumqttc::QoS;
use serde_json::{json, Map, Value};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use anyhow::Result;

pub const SNAPSHOT_TOPIC: &str = "symbion/cluster/nodes@v1";
pub const HEARTBEAT_TOPIC: &str = "symbion/cluster/heartbeat@v1";

#[derive(Debug, Clone)]
pub struct MockMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub qos: QoS,
}

/// Côté abonné d'un broker simulé
#[derive(Clone, Default)]
pub struct MockMqttClient {
    subscriptions: Arc<Mutex<Vec<String>>>,
    delivered: Arc<Mutex<Vec<MockMessage>>>,
    dropped: Arc<Mutex<usize>>,
    message_sender: Arc<Mutex<Option<mpsc::UnboundedSender<MockMessage>>>>,
}

impl MockMqttClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Channel sur lequel arrivent les messages délivrés
    pub fn setup_receiver(&self) -> mpsc::UnboundedReceiver<MockMessage> {
        let (sender, receiver) = mpsc::unbounded_channel();
        *self.message_sender.lock().unwrap() = Some(sender);
        receiver
    }

    pub async fn subscribe<S: Into<String>>(&self, filter: S, _qos: QoS) -> Result<()> {
        let filter = filter.into();
        log::info!("[mock] subscribed to {}", filter);
        self.subscriptions.lock().unwrap().push(filter);
        Ok(())
    }

    /// Simule une publication entrante; renvoie false si aucun abonnement ne correspond
    pub async fn simulate_incoming<S, V>(&self, topic: S, payload: V) -> Result<bool>
    where
        S: Into<String>,
        V: Into<Vec<u8>>,
    {
        let message = MockMessage {
            topic: topic.into(),
            payload: payload.into(),
            qos: QoS::AtLeastOnce,
        };

        let subscribed = self
            .subscriptions
            .lock()
            .unwrap()
            .iter()
            .any(|filter| topic_matches(filter, &message.topic));
        if !subscribed {
            log::debug!("[mock] no subscriber for {}", message.topic);
            *self.dropped.lock().unwrap() += 1;
            return Ok(false);
        }

        if let Some(sender) = self.message_sender.lock().unwrap().as_ref() {
            sender
                .send(message.clone())
                .map_err(|e| anyhow::anyhow!("Send error: {}", e))?;
        }
        log::info!("[mock] delivered {} ({} bytes)", message.topic, message.payload.len());
        self.delivered.lock().unwrap().push(message);
        Ok(true)
    }

    pub fn get_subscriptions(&self) -> Vec<String> {
        self.subscriptions.lock().unwrap().clone()
    }

    pub fn delivered_count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }

    pub fn dropped_count(&self) -> usize {
        *self.dropped.lock().unwrap()
    }

    pub fn clear(&self) {
        self.subscriptions.lock().unwrap().clear();
        self.delivered.lock().unwrap().clear();
        *self.dropped.lock().unwrap() = 0;
    }
}

/// Filtre MQTT avec jokers `+` (un niveau) et `#` (reste du topic)
pub fn topic_matches(filter: &str, topic: &str) -> bool {
    let mut filter_levels = filter.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (filter_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => {}
            (Some(f), Some(t)) if f == t => {}
            (None, None) => return true,
            _ => return false,
        }
    }
}

/// Construit des payloads conformes aux contrats `nodes@v1` et `heartbeat@v1`
#[derive(Debug, Default, Clone)]
pub struct ClusterMessageBuilder {
    nodes: Map<String, Value>,
}

impl ClusterMessageBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn node(mut self, id: &str, status: &str, cpu: f64, available_cpu: f64, pods: &[&str], last_heartbeat: f64) -> Self {
        self.nodes.insert(
            id.to_string(),
            json!({
                "status": status,
                "cpu": cpu,
                "available_cpu": available_cpu,
                "pods": pods,
                "last_heartbeat": last_heartbeat,
            }),
        );
        self
    }

    /// Node sain, inoccupé, heartbeat tout juste reçu
    pub fn idle_node(self, id: &str, cpu: f64) -> Self {
        self.node(id, "healthy", cpu, cpu, &[], 0.0)
    }

    pub fn build(self) -> Value {
        Value::Object(self.nodes)
    }

    pub fn to_bytes(self) -> Vec<u8> {
        serde_json::to_vec(&self.build()).unwrap_or_default()
    }

    /// n1 (4 cpu, 1 libre, 1 pod) + n2 (2 cpu libres, unhealthy)
    pub fn reference_cluster() -> Self {
        Self::new()
            .node("n1", "healthy", 4.0, 1.0, &["p1"], 0.5)
            .node("n2", "unhealthy", 2.0, 2.0, &[], 12.0)
    }

    pub fn heartbeat(node_id: &str) -> Value {
        json!({
            "node_id": node_id,
            "ts": chrono::Utc::now().to_rfc3339(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn delivers_only_subscribed_topics() {
        let client = MockMqttClient::new();
        let mut rx = client.setup_receiver();
        client.subscribe("symbion/cluster/+", QoS::AtLeastOnce).await.unwrap();

        assert!(client.simulate_incoming(SNAPSHOT_TOPIC, b"{}".to_vec()).await.unwrap());
        assert!(!client.simulate_incoming("symbion/hosts/heartbeat@v2", b"{}".to_vec()).await.unwrap());

        let msg = rx.try_recv().unwrap();
        assert_eq!(msg.topic, SNAPSHOT_TOPIC);
        assert!(rx.try_recv().is_err());
        assert_eq!(client.delivered_count(), 1);
        assert_eq!(client.dropped_count(), 1);
    }

    #[test]
    fn topic_filters() {
        assert!(topic_matches("symbion/#", "symbion/cluster/nodes@v1"));
        assert!(topic_matches(SNAPSHOT_TOPIC, SNAPSHOT_TOPIC));
        assert!(!topic_matches("symbion/+", "symbion/cluster/nodes@v1"));
        assert!(!topic_matches(SNAPSHOT_TOPIC, HEARTBEAT_TOPIC));
    }

    #[test]
    fn test_message_builders() {
        let snapshot = ClusterMessageBuilder::reference_cluster().build();
        assert_eq!(snapshot["n1"]["cpu"], 4.0);
        assert_eq!(snapshot["n1"]["pods"][0], "p1");
        assert_eq!(snapshot["n2"]["status"], "unhealthy");

        let heartbeat = ClusterMessageBuilder::heartbeat("n1");
        assert_eq!(heartbeat["node_id"], "n1");
        assert!(heartbeat["ts"].is_string());
    }
}
