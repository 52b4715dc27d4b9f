// Device state store - Single source of truth for live device and tag state
use crate::application::history::{HistoryBuffer, DEFAULT_HISTORY_CAPACITY};
use crate::domain::device::{DeviceRecord, DeviceStatus};
use crate::domain::events::{DataUpdate, InboundEvent, StatusUpdate};
use crate::domain::tag::{DataPoint, DeviceTag};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::broadcast;

const CHANGE_CHANNEL_CAPACITY: usize = 256;

/// Immutable snapshot of all devices. Every mutation swaps in a new map and a
/// new record for the touched device, so `Arc::ptr_eq` detects changes.
pub type DeviceMap = HashMap<String, Arc<DeviceRecord>>;

/// Change notifications fanned out to views
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum StoreChange {
    #[serde(rename_all = "camelCase")]
    DevicesReplaced { count: usize },
    #[serde(rename_all = "camelCase")]
    DeviceUpserted { device_id: String },
    #[serde(rename_all = "camelCase")]
    DeviceRemoved { device_id: String },
    #[serde(rename_all = "camelCase")]
    TagsUpdated { device_id: String, tag_ids: Vec<String> },
    #[serde(rename_all = "camelCase")]
    StatusChanged { device_id: String, status: DeviceStatus },
}

#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
    pub history_capacity: usize,
    /// Drop inbound events older than the last one applied to the same device
    pub reject_stale_updates: bool,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            reject_stale_updates: true,
        }
    }
}

/// History of one tag, remembered together with the device that reported it
struct TagHistory {
    device_id: String,
    points: HistoryBuffer<DataPoint>,
}

#[derive(Default)]
struct StoreState {
    devices: Arc<DeviceMap>,
    history: HashMap<String, TagHistory>,
    last_event_at: HashMap<String, DateTime<Utc>>,
}

impl StoreState {
    /// Drop history and stale-guard entries of devices no longer in the map
    fn prune(&mut self) {
        let devices = self.devices.clone();
        self.history.retain(|_, h| devices.contains_key(&h.device_id));
        self.last_event_at.retain(|id, _| devices.contains_key(id));
    }
}

pub struct DeviceStore {
    options: StoreOptions,
    state: RwLock<StoreState>,
    changes: broadcast::Sender<StoreChange>,
}

impl DeviceStore {
    pub fn new(options: StoreOptions) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CHANNEL_CAPACITY);
        Self {
            options,
            state: RwLock::new(StoreState::default()),
            changes,
        }
    }

    /// Receive a notification for every applied mutation
    pub fn subscribe(&self) -> broadcast::Receiver<StoreChange> {
        self.changes.subscribe()
    }

    pub fn devices(&self) -> Arc<DeviceMap> {
        self.read().devices.clone()
    }

    pub fn device(&self, device_id: &str) -> Option<Arc<DeviceRecord>> {
        self.read().devices.get(device_id).cloned()
    }

    /// Snapshot of a tag's history, oldest first; empty if nothing was recorded
    pub fn tag_history(&self, tag_id: &str) -> Vec<DataPoint> {
        self.read()
            .history
            .get(tag_id)
            .map(|h| h.points.to_vec())
            .unwrap_or_default()
    }

    /// Replace every device with a snapshot (initial load). History survives
    /// only for devices present in the new snapshot.
    pub fn set_devices(&self, devices: Vec<DeviceRecord>) {
        let next: DeviceMap = devices
            .into_iter()
            .map(|d| (d.id.clone(), Arc::new(d)))
            .collect();
        let count = next.len();

        {
            let mut state = self.write();
            state.devices = Arc::new(next);
            state.prune();
        }
        tracing::info!("Loaded {} devices into store", count);
        self.notify(StoreChange::DevicesReplaced { count });
    }

    /// Insert or replace a single device
    pub fn update_device(&self, device: DeviceRecord) {
        let device_id = device.id.clone();
        {
            let mut state = self.write();
            let mut next = (*state.devices).clone();
            next.insert(device_id.clone(), Arc::new(device));
            state.devices = Arc::new(next);
        }
        self.notify(StoreChange::DeviceUpserted { device_id });
    }

    /// Forget a device together with the history of its tags
    pub fn remove_device(&self, device_id: &str) -> bool {
        {
            let mut state = self.write();
            if !state.devices.contains_key(device_id) {
                return false;
            }
            let mut next = (*state.devices).clone();
            next.remove(device_id);
            state.devices = Arc::new(next);
            state.prune();
        }
        self.notify(StoreChange::DeviceRemoved {
            device_id: device_id.to_string(),
        });
        true
    }

    /// Replace the tag list of a known device and record history.
    /// Unknown device ids are ignored; returns whether anything changed.
    ///
    /// `event_at` is the server timestamp of the event carrying the update.
    /// When given it stamps the record and feeds the out-of-order guard;
    /// otherwise the record is stamped with the current time.
    pub fn update_device_tags(
        &self,
        device_id: &str,
        mut tags: Vec<DeviceTag>,
        event_at: Option<DateTime<Utc>>,
    ) -> bool {
        let at = event_at.unwrap_or_else(Utc::now);
        let tag_ids: Vec<String> = tags.iter().map(|t| t.id.clone()).collect();
        {
            let mut state = self.write();
            let Some(current) = state.devices.get(device_id).cloned() else {
                tracing::debug!("Ignoring tag update for unknown device {}", device_id);
                return false;
            };
            if self.is_stale(&state, device_id, event_at) {
                return false;
            }

            for tag in tags.iter_mut() {
                if tag.device_id.is_empty() {
                    tag.device_id = device_id.to_string();
                }
            }

            let capacity = self.options.history_capacity;
            for tag in &tags {
                let history = state.history.entry(tag.id.clone()).or_insert_with(|| TagHistory {
                    device_id: device_id.to_string(),
                    points: HistoryBuffer::new(capacity),
                });
                history.device_id = device_id.to_string();
                history.points.push(tag.data_point());
            }

            let mut next = (*state.devices).clone();
            next.insert(device_id.to_string(), Arc::new(current.with_tags(tags, at)));
            state.devices = Arc::new(next);
            if let Some(event_at) = event_at {
                state.last_event_at.insert(device_id.to_string(), event_at);
            }
        }

        self.notify(StoreChange::TagsUpdated {
            device_id: device_id.to_string(),
            tag_ids,
        });
        true
    }

    /// Change the status of a known device; tags are left untouched.
    /// `event_at` behaves as in [`DeviceStore::update_device_tags`].
    pub fn update_device_status(
        &self,
        device_id: &str,
        status: DeviceStatus,
        event_at: Option<DateTime<Utc>>,
    ) -> bool {
        let at = event_at.unwrap_or_else(Utc::now);
        {
            let mut state = self.write();
            let Some(current) = state.devices.get(device_id).cloned() else {
                tracing::debug!("Ignoring status update for unknown device {}", device_id);
                return false;
            };
            if self.is_stale(&state, device_id, event_at) {
                return false;
            }

            let mut next = (*state.devices).clone();
            next.insert(device_id.to_string(), Arc::new(current.with_status(status, at)));
            state.devices = Arc::new(next);
            if let Some(event_at) = event_at {
                state.last_event_at.insert(device_id.to_string(), event_at);
            }
        }

        tracing::debug!("Device {} is now {}", device_id, status.label());
        self.notify(StoreChange::StatusChanged {
            device_id: device_id.to_string(),
            status,
        });
        true
    }

    /// Apply an inbound real-time event
    pub fn apply_event(&self, event: InboundEvent) -> bool {
        match event {
            InboundEvent::DataUpdate(DataUpdate {
                device_id,
                tags,
                timestamp,
            }) => self.update_device_tags(&device_id, tags, Some(timestamp)),
            InboundEvent::DeviceStatus(StatusUpdate {
                device_id,
                status,
                timestamp,
            }) => self.update_device_status(&device_id, status, Some(timestamp)),
            InboundEvent::Pong => false,
        }
    }

    fn is_stale(&self, state: &StoreState, device_id: &str, event_at: Option<DateTime<Utc>>) -> bool {
        if !self.options.reject_stale_updates {
            return false;
        }
        match (event_at, state.last_event_at.get(device_id)) {
            (Some(event_at), Some(last)) if event_at < *last => {
                tracing::warn!(
                    "Discarding out-of-order event for {}: {} is older than {}",
                    device_id,
                    event_at,
                    last
                );
                true
            }
            _ => false,
        }
    }

    fn notify(&self, change: StoreChange) {
        // No receivers is fine
        let _ = self.changes.send(change);
    }

    fn read(&self) -> RwLockReadGuard<'_, StoreState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, StoreState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for DeviceStore {
    fn default() -> Self {
        Self::new(StoreOptions::default())
    }
}
