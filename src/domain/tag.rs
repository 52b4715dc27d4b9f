// Tag domain models - typed measurement values, quality and history points
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagDataType {
    Float,
    Integer,
    Boolean,
    String,
}

impl TagDataType {
    /// Guess the declared type from a raw JSON value when the backend omits it
    pub fn infer(raw: &Value) -> Option<Self> {
        match raw {
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(TagDataType::Integer),
            Value::Number(_) => Some(TagDataType::Float),
            Value::Bool(_) => Some(TagDataType::Boolean),
            Value::String(_) => Some(TagDataType::String),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TagQuality {
    #[default]
    Good,
    Bad,
    Uncertain,
}

/// Current value of a tag, keyed by its declared data type.
///
/// A value whose runtime type disagrees with the declared type is kept as
/// `Unavailable` and rendered as "N/A".
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Float(f64),
    Integer(i64),
    Boolean(bool),
    Text(String),
    Unavailable,
}

impl TagValue {
    pub fn from_json(data_type: TagDataType, raw: &Value) -> Self {
        match (data_type, raw) {
            // Integers are widened for float tags
            (TagDataType::Float, Value::Number(n)) => {
                n.as_f64().map(TagValue::Float).unwrap_or(TagValue::Unavailable)
            }
            (TagDataType::Integer, Value::Number(n)) => n
                .as_i64()
                .or_else(|| {
                    n.as_f64()
                        .filter(|f| f.fract() == 0.0 && f.abs() < i64::MAX as f64)
                        .map(|f| f as i64)
                })
                .map(TagValue::Integer)
                .unwrap_or(TagValue::Unavailable),
            (TagDataType::Boolean, Value::Bool(b)) => TagValue::Boolean(*b),
            (TagDataType::String, Value::String(s)) => TagValue::Text(s.clone()),
            _ => TagValue::Unavailable,
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            TagValue::Float(v) => serde_json::Number::from_f64(*v)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            TagValue::Integer(v) => Value::from(*v),
            TagValue::Boolean(b) => Value::Bool(*b),
            TagValue::Text(s) => Value::String(s.clone()),
            TagValue::Unavailable => Value::Null,
        }
    }

    /// Numeric projection used by charts and gauges
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            TagValue::Float(v) => Some(*v),
            TagValue::Integer(v) => Some(*v as f64),
            TagValue::Boolean(b) => Some(if *b { 1.0 } else { 0.0 }),
            TagValue::Text(_) | TagValue::Unavailable => None,
        }
    }

    pub fn is_available(&self) -> bool {
        !matches!(self, TagValue::Unavailable)
    }
}

impl fmt::Display for TagValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TagValue::Float(v) => write!(f, "{}", v),
            TagValue::Integer(v) => write!(f, "{}", v),
            TagValue::Boolean(b) => write!(f, "{}", b),
            TagValue::Text(s) => f.write_str(s),
            TagValue::Unavailable => f.write_str("N/A"),
        }
    }
}

impl Serialize for TagValue {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_json().serialize(serializer)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireTag", into = "WireTag")]
pub struct DeviceTag {
    pub id: String,
    pub device_id: String,
    pub name: String,
    pub data_type: TagDataType,
    pub value: TagValue,
    pub quality: TagQuality,
    pub unit: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl DeviceTag {
    pub fn new(
        id: impl Into<String>,
        device_id: impl Into<String>,
        data_type: TagDataType,
        value: TagValue,
        timestamp: DateTime<Utc>,
    ) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            device_id: device_id.into(),
            data_type,
            value,
            quality: TagQuality::Good,
            unit: None,
            timestamp,
        }
    }

    pub fn data_point(&self) -> DataPoint {
        DataPoint {
            timestamp: self.timestamp,
            value: self.value.clone(),
            quality: self.quality,
        }
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireTag {
    id: String,
    #[serde(default)]
    device_id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    data_type: Option<TagDataType>,
    #[serde(default)]
    value: Value,
    #[serde(default)]
    quality: TagQuality,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    unit: Option<String>,
    #[serde(default = "Utc::now")]
    timestamp: DateTime<Utc>,
}

impl From<WireTag> for DeviceTag {
    fn from(wire: WireTag) -> Self {
        let data_type = wire
            .data_type
            .or_else(|| TagDataType::infer(&wire.value))
            .unwrap_or(TagDataType::Float);
        let value = TagValue::from_json(data_type, &wire.value);
        let name = if wire.name.is_empty() { wire.id.clone() } else { wire.name };

        Self {
            id: wire.id,
            device_id: wire.device_id,
            name,
            data_type,
            value,
            quality: wire.quality,
            unit: wire.unit,
            timestamp: wire.timestamp,
        }
    }
}

impl From<DeviceTag> for WireTag {
    fn from(tag: DeviceTag) -> Self {
        Self {
            value: tag.value.to_json(),
            id: tag.id,
            device_id: tag.device_id,
            name: tag.name,
            data_type: Some(tag.data_type),
            quality: tag.quality,
            unit: tag.unit,
            timestamp: tag.timestamp,
        }
    }
}

/// One history entry per tag per inbound update
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DataPoint {
    pub timestamp: DateTime<Utc>,
    pub value: TagValue,
    pub quality: TagQuality,
}
