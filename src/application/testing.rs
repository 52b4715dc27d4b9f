// In-memory backend and transport used by unit tests
use crate::application::scada_api::{ApiError, ScadaApi};
use crate::application::transport::{Transport, TransportError, TransportEvent, TransportLink};
use crate::domain::device::DeviceRecord;
use crate::domain::events::OutboundCommand;
use crate::domain::widget::{LayoutChange, LayoutPatch, Widget, WidgetDraft, WidgetPatch};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::{mpsc, Notify};

#[derive(Default)]
pub struct FakeApi {
    pub devices: Mutex<Vec<DeviceRecord>>,
    pub widgets: Mutex<Vec<Widget>>,
    pub layout_calls: Mutex<Vec<Vec<LayoutChange>>>,
    pub fail: AtomicBool,
    pub next_id: AtomicUsize,
    /// When set, `list_widgets` waits for a notification before answering
    pub gate: Option<Arc<Notify>>,
}

impl FakeApi {
    pub fn with_widgets(widgets: Vec<Widget>) -> Self {
        Self {
            widgets: Mutex::new(widgets),
            ..Default::default()
        }
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    fn check(&self, path: &str) -> Result<(), ApiError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(ApiError::Request {
                path: path.to_string(),
                message: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl ScadaApi for FakeApi {
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, ApiError> {
        self.check("/api/devices")?;
        Ok(self.devices.lock().unwrap().clone())
    }

    async fn list_widgets(&self) -> Result<Vec<Widget>, ApiError> {
        if let Some(gate) = &self.gate {
            gate.notified().await;
        }
        self.check("/api/widgets")?;
        Ok(self.widgets.lock().unwrap().clone())
    }

    async fn create_widget(&self, draft: &WidgetDraft) -> Result<Widget, ApiError> {
        self.check("/api/widgets")?;
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) + 99;
        let widget = Widget {
            id: format!("w-{}", id),
            widget_type: draft.widget_type.clone(),
            layout: draft.layout,
            config: draft.config.clone(),
            title: draft.title.clone(),
            visible: true,
            refresh_interval: draft.refresh_interval,
        };
        self.widgets.lock().unwrap().push(widget.clone());
        Ok(widget)
    }

    async fn update_widget(&self, id: &str, patch: &WidgetPatch) -> Result<Widget, ApiError> {
        let path = format!("/api/widgets/{}", id);
        self.check(&path)?;
        let mut widgets = self.widgets.lock().unwrap();
        let Some(widget) = widgets.iter_mut().find(|w| w.id == id) else {
            return Err(ApiError::Status {
                path,
                status: 404,
                body: "not found".to_string(),
            });
        };
        if let Some(layout) = patch.layout {
            widget.layout = layout;
        }
        if let Some(config) = &patch.config {
            widget.config = config.clone();
        }
        if let Some(title) = &patch.title {
            widget.title = title.clone();
        }
        if let Some(visible) = patch.visible {
            widget.visible = visible;
        }
        if let Some(interval) = patch.refresh_interval {
            widget.refresh_interval = Some(interval);
        }
        Ok(widget.clone())
    }

    async fn delete_widget(&self, id: &str) -> Result<(), ApiError> {
        self.check(&format!("/api/widgets/{}", id))?;
        self.widgets.lock().unwrap().retain(|w| w.id != id);
        Ok(())
    }

    async fn update_layout(&self, patches: &[LayoutPatch<'_>]) -> Result<(), ApiError> {
        self.check("/api/widgets/batch-update-layout")?;
        self.layout_calls.lock().unwrap().push(
            patches
                .iter()
                .map(|p| LayoutChange {
                    widget_id: p.widget_id.to_string(),
                    layout: p.layout,
                })
                .collect(),
        );
        Ok(())
    }
}

/// Accepts every connection and keeps it open; outbound commands are recorded
#[derive(Default)]
pub struct IdleTransport {
    peers: Mutex<Vec<(mpsc::Receiver<OutboundCommand>, mpsc::Sender<TransportEvent>)>>,
}

impl IdleTransport {
    pub fn sent(&self) -> Vec<OutboundCommand> {
        let mut peers = self.peers.lock().unwrap();
        let mut sent = Vec::new();
        for (commands, _) in peers.iter_mut() {
            while let Ok(command) = commands.try_recv() {
                sent.push(command);
            }
        }
        sent
    }
}

#[async_trait]
impl Transport for IdleTransport {
    async fn open(&self) -> Result<TransportLink, TransportError> {
        let (outbound, commands) = mpsc::channel(16);
        let (events, inbound) = mpsc::channel(16);
        self.peers.lock().unwrap().push((commands, events));
        Ok(TransportLink { outbound, inbound })
    }
}
