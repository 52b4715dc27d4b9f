// Repository trait for the SCADA backend's REST API
use crate::domain::device::DeviceRecord;
use crate::domain::widget::{LayoutPatch, Widget, WidgetDraft, WidgetPatch};
use async_trait::async_trait;

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("request to {path} failed: {message}")]
    Request { path: String, message: String },

    #[error("{path} returned {status}: {body}")]
    Status {
        path: String,
        status: u16,
        body: String,
    },

    #[error("failed to decode response from {path}: {message}")]
    Decode { path: String, message: String },
}

impl ApiError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, ApiError::Status { status: 404, .. })
    }
}

#[async_trait]
pub trait ScadaApi: Send + Sync {
    /// Device snapshot used for the initial store load
    async fn list_devices(&self) -> Result<Vec<DeviceRecord>, ApiError>;

    async fn list_widgets(&self) -> Result<Vec<Widget>, ApiError>;

    async fn create_widget(&self, draft: &WidgetDraft) -> Result<Widget, ApiError>;

    async fn update_widget(&self, id: &str, patch: &WidgetPatch) -> Result<Widget, ApiError>;

    async fn delete_widget(&self, id: &str) -> Result<(), ApiError>;

    /// Persist several layout changes in one request
    async fn update_layout(&self, patches: &[LayoutPatch<'_>]) -> Result<(), ApiError>;
}
