//! # glance-server — Screen Stream Server
//!
//! Listens for Glance viewers, authenticates them against a shared
//! secret, and pushes a freshly captured frame to all of them on every
//! tick. Stops itself once no viewer has been connected for the idle
//! window.
//!
//! Capture and encoding are delegated: the server re-reads an encoded
//! image file that an external capture tool keeps up to date.

pub mod config;
pub mod source;
