//! Alert Manager Implementation

use chrono::{DateTime, Utc};
use dms::AlertKind;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::{debug, info};

use crate::audio::{AlertSound, AudioChannel, TimedChannel};

/// Alert configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AlertConfig {
    /// Sound played when the driver is drowsy
    pub drowsy_sound: String,
    /// Length of the drowsy sound (milliseconds)
    pub drowsy_duration_ms: u64,
    /// Sound played when the driver keeps yawning
    pub yawn_sound: String,
    /// Length of the yawn sound (milliseconds)
    pub yawn_duration_ms: u64,
    /// Started alerts kept in history
    pub history_limit: usize,
}

impl Default for AlertConfig {
    fn default() -> Self {
        Self {
            drowsy_sound: "alarm.mp3".to_string(),
            drowsy_duration_ms: 3000,
            yawn_sound: "song1.mp3".to_string(),
            yawn_duration_ms: 8000,
            history_limit: 100,
        }
    }
}

/// An alert sound that was started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlertEvent {
    pub kind: AlertKind,
    /// Frame that triggered the sound
    pub sequence: u64,
    pub started_at: DateTime<Utc>,
    /// Whether a yawn sound was cut off to make room
    pub preempted_yawn: bool,
}

/// Owns both audio channels and decides what plays.
///
/// A sound that is already playing is never restarted, and the drowsy alarm
/// always wins the audio over the yawn sound.
pub struct AlertManager {
    drowsy_sound: AlertSound,
    yawn_sound: AlertSound,
    drowsy_channel: Box<dyn AudioChannel>,
    yawn_channel: Box<dyn AudioChannel>,
    history: VecDeque<AlertEvent>,
    history_limit: usize,
}

impl AlertManager {
    /// Create a new alert manager with timed (device-less) channels
    pub fn new(config: AlertConfig) -> Self {
        Self::with_channels(
            config,
            Box::new(TimedChannel::new("drowsy")),
            Box::new(TimedChannel::new("yawn")),
        )
    }

    /// Create an alert manager around existing channels
    pub fn with_channels(
        config: AlertConfig,
        drowsy_channel: Box<dyn AudioChannel>,
        yawn_channel: Box<dyn AudioChannel>,
    ) -> Self {
        info!("Creating alert manager with config: {:?}", config);
        Self {
            drowsy_sound: AlertSound::new(
                config.drowsy_sound,
                Duration::from_millis(config.drowsy_duration_ms),
            ),
            yawn_sound: AlertSound::new(
                config.yawn_sound,
                Duration::from_millis(config.yawn_duration_ms),
            ),
            drowsy_channel,
            yawn_channel,
            history: VecDeque::with_capacity(config.history_limit.min(1024)),
            history_limit: config.history_limit,
        }
    }

    /// Act on the alert decided for a frame.
    ///
    /// Returns the event when a sound was started. `AlertKind::None` never
    /// stops a sound; playback runs to completion.
    pub fn handle(&mut self, alert: AlertKind, sequence: u64) -> Option<AlertEvent> {
        match alert {
            AlertKind::Drowsy => {
                if self.drowsy_channel.is_busy() {
                    return None;
                }
                self.drowsy_channel.play(&self.drowsy_sound);
                let preempted_yawn = self.yawn_channel.is_busy();
                if preempted_yawn {
                    info!("Drowsy alarm preempting yawn sound");
                    self.yawn_channel.stop();
                }
                Some(self.record(AlertKind::Drowsy, sequence, preempted_yawn))
            }
            AlertKind::Yawn => {
                if self.yawn_channel.is_busy() || self.drowsy_channel.is_busy() {
                    debug!("Yawn sound suppressed: audio busy");
                    return None;
                }
                self.yawn_channel.play(&self.yawn_sound);
                Some(self.record(AlertKind::Yawn, sequence, false))
            }
            AlertKind::None => None,
        }
    }

    fn record(&mut self, kind: AlertKind, sequence: u64, preempted_yawn: bool) -> AlertEvent {
        metrics::counter!("dms_alerts_started_total", "kind" => kind.as_str()).increment(1);
        info!("Alert started: {} (frame {})", kind.as_str(), sequence);

        let event = AlertEvent {
            kind,
            sequence,
            started_at: Utc::now(),
            preempted_yawn,
        };
        if self.history_limit > 0 {
            if self.history.len() >= self.history_limit {
                self.history.pop_front();
            }
            self.history.push_back(event.clone());
        }
        event
    }

    /// Most recent started alerts, newest first
    pub fn recent(&self, limit: usize) -> Vec<AlertEvent> {
        self.history.iter().rev().take(limit).cloned().collect()
    }

    /// Whether either channel is playing
    pub fn is_sounding(&self) -> bool {
        self.drowsy_channel.is_busy() || self.yawn_channel.is_busy()
    }

    /// Stop both channels and clear history
    pub fn clear(&mut self) {
        self.drowsy_channel.stop();
        self.yawn_channel.stop();
        self.history.clear();
    }
}

impl Default for AlertManager {
    fn default() -> Self {
        Self::new(AlertConfig::default())
    }
}
