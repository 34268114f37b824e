//! # proxima-server
//!
//! HTTP and WebSocket server library for the proxima proximity telemetry
//! service.
//!
//! This library provides the API handlers, the maintenance scheduler and
//! state management for proxima.

#![forbid(unsafe_code)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]

pub mod api;
pub mod logging;
pub mod scheduler;
pub mod state;
