// Application layer - Store, poller and telemetry routing
pub mod control_backend;
pub mod control_store;
pub mod error;
pub mod status_poller;
pub mod telemetry_demux;
