// Domain layer - Plain data owned by the control store
pub mod control;
pub mod ring_buffer;
pub mod simulation;
pub mod telemetry;
