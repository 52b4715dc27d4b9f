// Device domain model
use super::tag::DeviceTag;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DeviceStatus {
    Online,
    Offline,
    Error,
}

impl DeviceStatus {
    pub fn label(&self) -> &'static str {
        match self {
            DeviceStatus::Online => "Online",
            DeviceStatus::Offline => "Offline",
            DeviceStatus::Error => "Error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRecord {
    pub id: String,
    pub name: String,
    #[serde(alias = "type")]
    pub device_type: String,
    pub status: DeviceStatus,
    #[serde(default = "Utc::now")]
    pub last_update: DateTime<Utc>,
    #[serde(default)]
    pub tags: Vec<DeviceTag>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub gateway_id: Option<String>,
}

impl DeviceRecord {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        device_type: impl Into<String>,
        status: DeviceStatus,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            device_type: device_type.into(),
            status,
            last_update: Utc::now(),
            tags: Vec::new(),
            gateway_id: None,
        }
    }

    /// Copy of this record carrying a new tag list
    pub fn with_tags(&self, tags: Vec<DeviceTag>, at: DateTime<Utc>) -> Self {
        Self {
            tags,
            last_update: at,
            ..self.clone()
        }
    }

    /// Copy of this record carrying a new status; tags are left as they were
    pub fn with_status(&self, status: DeviceStatus, at: DateTime<Utc>) -> Self {
        Self {
            status,
            last_update: at,
            ..self.clone()
        }
    }
}
