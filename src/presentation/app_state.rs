// Application state for HTTP handlers
use crate::application::connection_manager::ConnectionManager;
use crate::application::device_store::DeviceStore;
use crate::application::widget_store::WidgetStore;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub connection: ConnectionManager,
    pub devices: Arc<DeviceStore>,
    pub widgets: Arc<WidgetStore>,
}
