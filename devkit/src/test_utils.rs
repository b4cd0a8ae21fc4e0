/*!
Test Harness pour la console cluster

Combine le broker simulé et le stub de l'API des nodes:
- abonnement automatique aux topics snapshot/heartbeat
- envoi de snapshots et heartbeats conformes aux contrats
- récupération des messages délivrés, dans l'ordre d'arrivée
*/

use crate::mqtt_stub::{ClusterMessageBuilder, MockMessage, MockMqttClient, HEARTBEAT_TOPIC, SNAPSHOT_TOPIC};
use crate::stub_api::{StubNodeApi, StubReply};
use rumqttc::QoS;
use serde_json::Value;
use tokio::sync::mpsc;
use anyhow::Result;

pub struct TestHarness {
    pub mqtt_client: MockMqttClient,
    inbox: mpsc::UnboundedReceiver<MockMessage>,
}

impl TestHarness {
    /// Harness abonné aux deux topics de la console
    pub async fn new() -> Result<Self> {
        env_logger::try_init().ok(); // Init logging pour tests

        let mqtt_client = MockMqttClient::new();
        let inbox = mqtt_client.setup_receiver();
        mqtt_client.subscribe(SNAPSHOT_TOPIC, QoS::AtLeastOnce).await?;
        mqtt_client.subscribe(HEARTBEAT_TOPIC, QoS::AtLeastOnce).await?;
        Ok(Self { mqtt_client, inbox })
    }

    /// Démarre en plus un stub de l'API des nodes
    pub async fn with_api(reply: StubReply) -> Result<(Self, StubNodeApi)> {
        let harness = Self::new().await?;
        let api = StubNodeApi::start(reply).await?;
        Ok((harness, api))
    }

    pub async fn send_snapshot(&self, snapshot: &Value) -> Result<()> {
        self.send_raw(SNAPSHOT_TOPIC, serde_json::to_vec(snapshot)?).await
    }

    pub async fn send_cluster(&self, builder: ClusterMessageBuilder) -> Result<()> {
        self.send_snapshot(&builder.build()).await
    }

    pub async fn send_heartbeat(&self, node_id: &str) -> Result<()> {
        let payload = serde_json::to_vec(&ClusterMessageBuilder::heartbeat(node_id))?;
        self.send_raw(HEARTBEAT_TOPIC, payload).await
    }

    /// Payload brut, utile pour les messages invalides
    pub async fn send_raw<V: Into<Vec<u8>>>(&self, topic: &str, payload: V) -> Result<()> {
        if !self.mqtt_client.simulate_incoming(topic, payload).await? {
            anyhow::bail!("no subscription for topic: {}", topic);
        }
        Ok(())
    }

    /// Prochain message délivré, sans attendre
    pub fn next_message(&mut self) -> Option<MockMessage> {
        self.inbox.try_recv().ok()
    }

    /// Vide la file des messages délivrés
    pub fn drain(&mut self) -> Vec<MockMessage> {
        let mut out = Vec::new();
        while let Some(msg) = self.next_message() {
            out.push(msg);
        }
        out
    }
}
