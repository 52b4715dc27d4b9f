// Presentation layer - HTTP surface and view models
pub mod app_state;
pub mod events_stream;
pub mod handlers;
pub mod views;
