/*!
# Symbion DevKit - Stubs et Utilitaires pour Développement

Bibliothèque facilitant le développement et les tests de la console cluster:
- Stub MQTT pour simuler le flux snapshot/heartbeat sans broker
- Builders de payloads conformes aux contrats `nodes@v1` / `heartbeat@v1`
- Stub HTTP de l'API des nodes (add-node, liste, statut)
- Harness de test combinant les deux
*/

pub mod mqtt_stub;
pub mod stub_api;
pub mod test_utils;

pub use mqtt_stub::{ClusterMessageBuilder, MockMqttClient, HEARTBEAT_TOPIC, SNAPSHOT_TOPIC};
pub use stub_api::{StubNodeApi, StubReply};
pub use test_utils::TestHarness;
