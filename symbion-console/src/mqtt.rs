use crate::config::MqttConf;
use crate::console::ConsoleEvent;
use crate::contracts::{contract_name, EventKind, Topics};
use crate::error::TransportError;
use crate::health::StreamHealth;
use crate::listener::StreamEvent;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use std::time::Duration;
use tokio::sync::mpsc::UnboundedSender;
use tokio::task::{self, JoinHandle};
use tracing::{debug, error, info};
use uuid::Uuid;

pub fn mqtt_options(conf: &MqttConf) -> MqttOptions {
    let client_id = conf
        .client_id
        .clone()
        .unwrap_or_else(|| format!("symbion-console-{}", Uuid::new_v4().simple()));
    let mut opts = MqttOptions::new(client_id, &conf.host, conf.port);
    opts.set_keep_alive(Duration::from_secs(conf.keep_alive_secs.max(5)));
    opts.set_clean_session(true);
    // full snapshots can exceed the default packet size
    opts.set_max_packet_size(4 * 1024 * 1024, 4 * 1024 * 1024);
    opts
}

/// Maps an inbound publish to a stream event, `None` for foreign topics.
pub fn route_publish(topics: &Topics, topic: &str, payload: &[u8]) -> Option<StreamEvent> {
    match topics.route(topic)? {
        EventKind::Snapshot => Some(StreamEvent::Snapshot(payload.to_vec())),
        EventKind::Heartbeat => Some(StreamEvent::Heartbeat(payload.to_vec())),
    }
}

/// Polls the broker and forwards every routed publish into the console loop.
///
/// Subscriptions are renewed on each ConnAck since the session is clean.
pub fn spawn_mqtt_listener(
    conf: MqttConf,
    topics: Topics,
    events: UnboundedSender<ConsoleEvent>,
    health: StreamHealth,
) -> JoinHandle<()> {
    task::spawn(async move {
        let (client, mut eventloop) = AsyncClient::new(mqtt_options(&conf), 10);
        let reconnect_delay = Duration::from_secs(conf.reconnect_delay_secs);
        info!("connecting to MQTT broker {}:{}", conf.host, conf.port);

        loop {
            let event = match eventloop.poll().await {
                Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                    match subscribe_all(&client, &topics) {
                        Ok(()) => Some(StreamEvent::Connected),
                        Err(e) => Some(StreamEvent::Disconnected(e)),
                    }
                }
                Ok(Event::Incoming(Incoming::Publish(p))) => {
                    let routed = route_publish(&topics, &p.topic, &p.payload);
                    if routed.is_none() {
                        debug!("ignoring publish on {} ({})", p.topic, contract_name(&p.topic));
                    }
                    routed
                }
                Ok(_) => None,
                Err(e) => {
                    error!("MQTT error: {e:?}");
                    health.increment_reconnects();
                    if events
                        .send(ConsoleEvent::Stream(StreamEvent::Disconnected(TransportError::Connection(e.to_string()))))
                        .is_err()
                    {
                        break;
                    }
                    tokio::time::sleep(reconnect_delay).await;
                    None
                }
            };

            if let Some(event) = event {
                if events.send(ConsoleEvent::Stream(event)).is_err() {
                    debug!("console loop closed, stopping MQTT listener");
                    break;
                }
            }
        }
    })
}

fn subscribe_all(client: &AsyncClient, topics: &Topics) -> Result<(), TransportError> {
    for topic in topics.all() {
        client
            .try_subscribe(topic, QoS::AtLeastOnce)
            .map_err(|e| TransportError::Subscribe(format!("{topic}: {e}")))?;
        info!("subscribed to {topic}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn routes_snapshot_and_heartbeat() {
        let topics = Topics::default();
        assert!(matches!(
            route_publish(&topics, "symbion/cluster/nodes@v1", b"{}"),
            Some(StreamEvent::Snapshot(ref p)) if p == b"{}"
        ));
        assert!(matches!(
            route_publish(&topics, "symbion/cluster/heartbeat@v1", b"{\"node_id\":\"a\"}"),
            Some(StreamEvent::Heartbeat(_))
        ));
        assert!(route_publish(&topics, "symbion/kernel/health@v1", b"{}").is_none());
    }

    #[test]
    fn generated_client_ids_are_unique() {
        let conf = MqttConf::default();
        let a = mqtt_options(&conf);
        let b = mqtt_options(&conf);
        assert!(a.client_id().starts_with("symbion-console-"));
        assert_ne!(a.client_id(), b.client_id());
        assert_eq!(a.broker_address(), ("localhost".to_string(), 1883));
    }
}
