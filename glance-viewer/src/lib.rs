//! # glance-viewer — stream viewer
//!
//! Connects to a `glance-server`, receives the frame stream, optionally
//! writes the newest frame to disk, and forwards tunable changes typed on
//! stdin back to the server.

pub mod commands;
pub mod config;
