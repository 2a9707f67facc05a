// Infrastructure layer - External dependencies and adapters
pub mod broker_adapter;
pub mod config;
pub mod http_backend;
