// Presentation layer - Operator API over the control store
pub mod app_state;
pub mod handlers;
