//! Operator tooling for the service ticket SLA engine.
//!
//! - [`replay`]: drive a desk from a timed JSON script
//! - [`render`]: terminal tables for policies, dashboards and replays

#![allow(clippy::uninlined_format_args)]

pub mod render;
pub mod replay;
