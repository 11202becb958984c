//! Alert state tracking

use serde::{Deserialize, Serialize};

use crate::config::DmsConfig;
use crate::signals::FrameSignals;

/// Alert raised for a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertKind {
    #[default]
    None,
    /// Eyes closed for too many consecutive frames
    Drowsy,
    /// Mouth wide open for too many consecutive frames
    Yawn,
}

impl AlertKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AlertKind::None => "none",
            AlertKind::Drowsy => "drowsy",
            AlertKind::Yawn => "yawn",
        }
    }
}

/// Counters carried from frame to frame for the length of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AlertState {
    /// Consecutive frames with the eyes below the EAR threshold
    pub drowsy_counter: u32,
    /// Consecutive open-eye frames with the mouth above the MAR threshold
    pub yawn_counter: u32,
    /// Alert decided for the most recent frame
    pub current_alert: AlertKind,
}

impl AlertState {
    /// Advance the state by one frame.
    ///
    /// Drowsiness is checked first and, once active, the mouth is not looked
    /// at. While the eyes are closing but not yet long enough to alert, the
    /// yawn counter holds its value.
    pub fn step(self, signals: &FrameSignals, config: &DmsConfig) -> Self {
        let mut next = self;
        let eyes_closed = signals.avg_ear < config.ear_threshold;

        if eyes_closed {
            next.drowsy_counter = next.drowsy_counter.saturating_add(1);
        } else {
            next.drowsy_counter = 0;
        }

        if next.drowsy_counter >= config.ear_consec_frames {
            next.current_alert = AlertKind::Drowsy;
            return next;
        }

        if !eyes_closed {
            if signals.mar > config.mar_threshold {
                next.yawn_counter = next.yawn_counter.saturating_add(1);
            } else {
                next.yawn_counter = 0;
            }
        }

        next.current_alert = if next.yawn_counter >= config.mar_consec_frames {
            AlertKind::Yawn
        } else {
            AlertKind::None
        };
        next
    }

    /// Reset state (new session)
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
