use crate::config::TopicsConf;

/// Kind of inbound stream event, derived from the publish topic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    Snapshot,
    Heartbeat,
}

/// Topics the console subscribes to.
#[derive(Debug, Clone)]
pub struct Topics {
    pub snapshot: String,
    pub heartbeat: String,
}

impl From<&TopicsConf> for Topics {
    fn from(conf: &TopicsConf) -> Self {
        Self {
            snapshot: conf.snapshot.clone(),
            heartbeat: conf.heartbeat.clone(),
        }
    }
}

impl Default for Topics {
    fn default() -> Self {
        Self::from(&TopicsConf::default())
    }
}

impl Topics {
    pub fn route(&self, topic: &str) -> Option<EventKind> {
        if topic == self.snapshot {
            Some(EventKind::Snapshot)
        } else if topic == self.heartbeat {
            Some(EventKind::Heartbeat)
        } else {
            None
        }
    }

    pub fn all(&self) -> [&str; 2] {
        [&self.snapshot, &self.heartbeat]
    }
}

/// Contract name at the end of a topic.
/// Ex: "symbion/cluster/nodes@v1" -> "nodes@v1"
pub fn contract_name(topic: &str) -> &str {
    topic.rsplit('/').next().unwrap_or(topic)
}
