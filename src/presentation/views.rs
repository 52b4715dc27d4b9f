// View models - pure derivations of store state for UI clients
use crate::application::connection_state::ConnectionSnapshot;
use crate::application::device_store::DeviceMap;
use crate::domain::device::{DeviceRecord, DeviceStatus};
use crate::domain::tag::{DataPoint, TagDataType, TagQuality};
use chrono::{DateTime, Utc};
use serde::Serialize;

pub const DEFAULT_MAX_CHART_POINTS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceRow {
    pub id: String,
    pub name: String,
    pub device_type: String,
    pub status: DeviceStatus,
    pub status_label: &'static str,
    pub tag_count: usize,
    pub last_update: DateTime<Utc>,
}

impl From<&DeviceRecord> for DeviceRow {
    fn from(device: &DeviceRecord) -> Self {
        Self {
            id: device.id.clone(),
            name: device.name.clone(),
            device_type: device.device_type.clone(),
            status: device.status,
            status_label: device.status.label(),
            tag_count: device.tags.len(),
            last_update: device.last_update,
        }
    }
}

/// Device table rows ordered by name, then id
pub fn device_rows(devices: &DeviceMap) -> Vec<DeviceRow> {
    let mut rows: Vec<DeviceRow> = devices.values().map(|d| DeviceRow::from(d.as_ref())).collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
    rows
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Gauge {
    pub tag_id: String,
    pub name: String,
    pub unit: Option<String>,
    pub value: Option<f64>,
    pub display: String,
    pub quality: TagQuality,
}

/// One gauge per numeric tag of a device, in tag order
pub fn gauges(device: &DeviceRecord) -> Vec<Gauge> {
    device
        .tags
        .iter()
        .filter(|t| matches!(t.data_type, TagDataType::Float | TagDataType::Integer))
        .map(|t| Gauge {
            tag_id: t.id.clone(),
            name: t.name.clone(),
            unit: t.unit.clone(),
            value: t.value.as_f64(),
            display: match &t.unit {
                Some(unit) if t.value.is_available() => format!("{} {}", t.value, unit),
                _ => t.value.to_string(),
            },
            quality: t.quality,
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartPoint {
    pub time_ms: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChartSeries {
    pub tag_id: String,
    pub points: Vec<ChartPoint>,
    pub min: Option<f64>,
    pub max: Option<f64>,
    pub avg: Option<f64>,
    pub latest: Option<f64>,
}

/// Chart series for a tag's history. Non-numeric samples are skipped; stats
/// are computed over the full history before downsampling.
pub fn chart_series(tag_id: &str, history: &[DataPoint], max_points: usize) -> ChartSeries {
    let points: Vec<ChartPoint> = history
        .iter()
        .filter_map(|p| {
            p.value.as_f64().map(|value| ChartPoint {
                time_ms: p.timestamp.timestamp_millis(),
                value,
            })
        })
        .collect();

    let latest = points.last().map(|p| p.value);
    let (min, max, avg) = if points.is_empty() {
        (None, None, None)
    } else {
        let min = points.iter().map(|p| p.value).fold(f64::INFINITY, f64::min);
        let max = points.iter().map(|p| p.value).fold(f64::NEG_INFINITY, f64::max);
        let avg = points.iter().map(|p| p.value).sum::<f64>() / points.len() as f64;
        (Some(min), Some(max), Some(avg))
    };

    ChartSeries {
        tag_id: tag_id.to_string(),
        points: downsample(points, max_points),
        min,
        max,
        avg,
        latest,
    }
}

/// Bucket averaging; each bucket keeps its middle timestamp. A `max_points`
/// of 0 keeps every point.
fn downsample(points: Vec<ChartPoint>, max_points: usize) -> Vec<ChartPoint> {
    if max_points == 0 || points.len() <= max_points {
        return points;
    }

    let bucket_size = points.len().div_ceil(max_points);
    points
        .chunks(bucket_size)
        .map(|chunk| ChartPoint {
            time_ms: chunk[chunk.len() / 2].time_ms,
            value: chunk.iter().map(|p| p.value).sum::<f64>() / chunk.len() as f64,
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusSummary {
    pub total: usize,
    pub online: usize,
    pub offline: usize,
    pub error: usize,
    pub connection: ConnectionSnapshot,
}

pub fn status_summary(devices: &DeviceMap, connection: ConnectionSnapshot) -> StatusSummary {
    let count = |status: DeviceStatus| devices.values().filter(|d| d.status == status).count();
    StatusSummary {
        total: devices.len(),
        online: count(DeviceStatus::Online),
        offline: count(DeviceStatus::Offline),
        error: count(DeviceStatus::Error),
        connection,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::application::connection_state::ConnectionState;
    use crate::domain::tag::{DeviceTag, TagValue};
    use chrono::TimeZone;
    use std::collections::HashMap;
    use std::sync::Arc;

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn map(devices: Vec<DeviceRecord>) -> DeviceMap {
        devices
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect::<HashMap<_, _>>()
    }

    fn point(secs: i64, value: TagValue) -> DataPoint {
        DataPoint {
            timestamp: at(secs),
            value,
            quality: TagQuality::Good,
        }
    }

    #[test]
    fn test_device_rows_sorted_by_name() {
        let devices = map(vec![
            DeviceRecord::new("dev-2", "Pump", "pump", DeviceStatus::Online),
            DeviceRecord::new("dev-1", "Compressor", "compressor", DeviceStatus::Error),
            DeviceRecord::new("dev-3", "Pump", "pump", DeviceStatus::Offline),
        ]);

        let rows = device_rows(&devices);
        let ids: Vec<&str> = rows.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, vec!["dev-1", "dev-2", "dev-3"]);
        assert_eq!(rows[0].status_label, "Error");
    }

    #[test]
    fn test_gauges_show_numeric_tags_only() {
        let mut pressure = DeviceTag::new("t1", "dev-1", TagDataType::Float, TagValue::Float(4.5), at(0));
        pressure.unit = Some("bar".to_string());
        let mut broken = DeviceTag::new("t2", "dev-1", TagDataType::Integer, TagValue::Unavailable, at(0));
        broken.unit = Some("rpm".to_string());
        let label = DeviceTag::new(
            "t3",
            "dev-1",
            TagDataType::String,
            TagValue::Text("auto".to_string()),
            at(0),
        );
        let device = DeviceRecord::new("dev-1", "Pump", "pump", DeviceStatus::Online).with_tags(
            vec![pressure, broken, label],
            at(0),
        );

        let gauges = gauges(&device);
        assert_eq!(gauges.len(), 2);
        assert_eq!(gauges[0].display, "4.5 bar");
        assert_eq!(gauges[1].value, None);
        assert_eq!(gauges[1].display, "N/A");
    }

    #[test]
    fn test_chart_series_stats_and_skips() {
        let history = vec![
            point(0, TagValue::Float(10.0)),
            point(1, TagValue::Unavailable),
            point(2, TagValue::Float(12.0)),
            point(3, TagValue::Float(9.0)),
        ];

        let series = chart_series("t1", &history, DEFAULT_MAX_CHART_POINTS);
        let values: Vec<f64> = series.points.iter().map(|p| p.value).collect();
        assert_eq!(values, vec![10.0, 12.0, 9.0]);
        assert_eq!(series.min, Some(9.0));
        assert_eq!(series.max, Some(12.0));
        assert_eq!(series.latest, Some(9.0));
        assert!((series.avg.unwrap() - 31.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_chart_series_empty_history() {
        let series = chart_series("t1", &[], 10);
        assert!(series.points.is_empty());
        assert_eq!(series.min, None);
        assert_eq!(series.latest, None);
    }

    #[test]
    fn test_downsample_averages_buckets() {
        let history: Vec<DataPoint> = (0..10).map(|i| point(i, TagValue::Integer(i))).collect();

        let series = chart_series("t1", &history, 5);
        assert_eq!(series.points.len(), 5);
        assert_eq!(series.points[0].value, 0.5);
        assert_eq!(series.points[0].time_ms, at(1).timestamp_millis());
        assert_eq!(series.max, Some(9.0));
    }

    #[test]
    fn test_status_summary_counts() {
        let devices = map(vec![
            DeviceRecord::new("dev-1", "A", "pump", DeviceStatus::Online),
            DeviceRecord::new("dev-2", "B", "pump", DeviceStatus::Online),
            DeviceRecord::new("dev-3", "C", "pump", DeviceStatus::Error),
        ]);
        let connection = ConnectionSnapshot {
            state: ConnectionState::Connected,
            attempts: 0,
        };

        let summary = status_summary(&devices, connection);
        assert_eq!(summary.total, 3);
        assert_eq!(summary.online, 2);
        assert_eq!(summary.offline, 0);
        assert_eq!(summary.error, 1);
        assert_eq!(summary.connection.state, ConnectionState::Connected);
    }
}
