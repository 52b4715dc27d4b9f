// Real-time event envelopes exchanged with the event source
use super::device::DeviceStatus;
use super::tag::DeviceTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataUpdate {
    pub device_id: String,
    pub tags: Vec<DeviceTag>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub device_id: String,
    pub status: DeviceStatus,
    pub timestamp: DateTime<Utc>,
}

/// Events pushed by the server: `{"event": "data:update", "data": {...}}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data")]
pub enum InboundEvent {
    #[serde(rename = "data:update")]
    DataUpdate(DataUpdate),
    #[serde(rename = "device:status")]
    DeviceStatus(StatusUpdate),
    #[serde(rename = "pong")]
    Pong,
}

impl InboundEvent {
    pub fn device_id(&self) -> Option<&str> {
        match self {
            InboundEvent::DataUpdate(update) => Some(&update.device_id),
            InboundEvent::DeviceStatus(update) => Some(&update.device_id),
            InboundEvent::Pong => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceSelection {
    pub device_ids: Vec<String>,
}

/// Commands sent to the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "lowercase")]
pub enum OutboundCommand {
    Subscribe(DeviceSelection),
    Unsubscribe(DeviceSelection),
    Heartbeat,
}

impl OutboundCommand {
    pub fn subscribe(device_ids: Vec<String>) -> Self {
        OutboundCommand::Subscribe(DeviceSelection { device_ids })
    }

    pub fn unsubscribe(device_ids: Vec<String>) -> Self {
        OutboundCommand::Unsubscribe(DeviceSelection { device_ids })
    }
}
