// Application layer - Stores, connection lifecycle and the ports they depend on
pub mod connection_manager;
pub mod connection_state;
pub mod device_store;
pub mod history;
pub mod scada_api;
#[cfg(test)]
pub mod testing;
pub mod timer;
pub mod transport;
pub mod widget_store;
