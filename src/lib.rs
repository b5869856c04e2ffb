//! Driver drowsiness dashboards
//!
//! Client side of the drowsiness detection API: session handling, shared
//! polling of device and fleet resources, and the reductions that turn raw
//! readings into dashboard state.

pub mod api;
pub mod config;
pub mod dashboard;
pub mod errors;
pub mod forms;
pub mod histogram;
pub mod mock;
pub mod models;
pub mod navigation;
pub mod output;
pub mod polling;
pub mod reducer;
pub mod render;
pub mod scoring;
pub mod session;
