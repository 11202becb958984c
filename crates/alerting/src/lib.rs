//! Alerting System
//!
//! Drives the drowsy and yawn audio channels from per-frame alert decisions
//! and keeps a short history of started alerts.

mod audio;
mod manager;

pub use audio::{AlertSound, AudioChannel, TimedChannel};
pub use manager::{AlertConfig, AlertEvent, AlertManager};
