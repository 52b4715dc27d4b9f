// Domain layer - Devices, tags, widgets and real-time event shapes
pub mod device;
pub mod events;
pub mod tag;
pub mod widget;
