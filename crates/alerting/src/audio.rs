//! Audio channel capability

use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A sound asset and how long it plays
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AlertSound {
    pub name: String,
    pub duration: Duration,
}

impl AlertSound {
    pub fn new(name: impl Into<String>, duration: Duration) -> Self {
        Self {
            name: name.into(),
            duration,
        }
    }
}

/// One exclusive audio output channel
pub trait AudioChannel: Send {
    /// Whether a sound is currently playing
    fn is_busy(&self) -> bool;

    /// Start playing `sound`, replacing whatever is playing
    fn play(&mut self, sound: &AlertSound);

    /// Stop playback
    fn stop(&mut self);
}

/// Channel that tracks playback by wall clock without an output device.
///
/// Busy from `play` until the sound's duration has elapsed or `stop` is called.
#[derive(Debug)]
pub struct TimedChannel {
    name: &'static str,
    busy_until: Option<Instant>,
}

impl TimedChannel {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            busy_until: None,
        }
    }
}

impl AudioChannel for TimedChannel {
    fn is_busy(&self) -> bool {
        self.busy_until.is_some_and(|until| Instant::now() < until)
    }

    fn play(&mut self, sound: &AlertSound) {
        info!(channel = self.name, sound = %sound.name, "Playing alert sound");
        self.busy_until = Some(Instant::now() + sound.duration);
    }

    fn stop(&mut self) {
        debug!(channel = self.name, "Stopping alert sound");
        self.busy_until = None;
    }
}
