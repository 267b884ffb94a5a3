//! Media elements
//!
//! A media element is a seekable, playable timeline that emits timing
//! events. Elements are shared (`Arc<dyn MediaElement>`) between the view
//! and at most one synchronizer, which claims them while mounted.

use super::probe::{probe_media, MediaMetadata};
use super::types::PlaybackError;
use parking_lot::Mutex;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::broadcast;

/// Timing events, in dispatch order
#[derive(Debug, Clone, PartialEq)]
pub enum MediaEvent {
    LoadedMetadata { duration: f64 },
    Play,
    Pause,
    Seeked { time: f64 },
    TimeUpdate { time: f64 },
    Ended,
    Error(String),
}

/// A playable media timeline
pub trait MediaElement: Send + Sync {
    fn label(&self) -> &str;

    /// Playback position in seconds
    fn current_time(&self) -> f64;

    /// Seek. Emits `Seeked`.
    fn set_current_time(&self, time: f64);

    /// None until metadata has loaded
    fn duration(&self) -> Option<f64>;

    fn is_paused(&self) -> bool;

    /// Start playback. Emits `Play` if the element was paused.
    fn play(&self);

    /// Pause playback. Emits `Pause` if the element was playing.
    fn pause(&self);

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent>;

    /// Number of live subscriptions
    fn listener_count(&self) -> usize;

    /// Claim exclusive synchronization rights. False if already claimed.
    fn try_claim(&self) -> bool;

    fn release_claim(&self);
}

#[derive(Debug, Clone, Copy)]
struct Clock {
    current_time: f64,
    duration: Option<f64>,
    paused: bool,
}

/// Tick-driven media element.
///
/// Time only moves when [`ClockedMedia::advance`] is called, so a host can
/// drive it from its own frame loop (or a test can step it exactly).
pub struct ClockedMedia {
    label: String,
    clock: Mutex<Clock>,
    claimed: AtomicBool,
    events: broadcast::Sender<MediaEvent>,
}

impl ClockedMedia {
    pub fn new(label: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            label: label.into(),
            clock: Mutex::new(Clock {
                current_time: 0.0,
                duration: None,
                paused: true,
            }),
            claimed: AtomicBool::new(false),
            events,
        }
    }

    /// Metadata arrived
    pub fn load_metadata(&self, duration: f64) {
        let duration = if duration.is_finite() { duration.max(0.0) } else { 0.0 };
        self.clock.lock().duration = Some(duration);
        self.emit(MediaEvent::LoadedMetadata { duration });
    }

    /// Load metadata from a local file
    pub fn load_probed(&self, path: &Path) -> Result<MediaMetadata, PlaybackError> {
        match probe_media(path) {
            Ok(metadata) => {
                self.load_metadata(metadata.duration);
                Ok(metadata)
            }
            Err(e) => {
                self.fail(e.to_string());
                Err(e)
            }
        }
    }

    /// The source failed to load
    pub fn fail(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("Media '{}' failed: {}", self.label, message);
        self.emit(MediaEvent::Error(message));
    }

    /// Advance the playhead by `dt` seconds if playing
    pub fn advance(&self, dt: f64) {
        let (time, ended) = {
            let mut clock = self.clock.lock();
            if clock.paused || dt <= 0.0 {
                return;
            }
            let end = clock.duration.unwrap_or(f64::INFINITY);
            clock.current_time = (clock.current_time + dt).min(end);
            let ended = clock.current_time >= end;
            if ended {
                clock.paused = true;
            }
            (clock.current_time, ended)
        };

        self.emit(MediaEvent::TimeUpdate { time });
        if ended {
            self.emit(MediaEvent::Pause);
            self.emit(MediaEvent::Ended);
        }
    }

    fn emit(&self, event: MediaEvent) {
        let _ = self.events.send(event);
    }
}

impl MediaElement for ClockedMedia {
    fn label(&self) -> &str {
        &self.label
    }

    fn current_time(&self) -> f64 {
        self.clock.lock().current_time
    }

    fn set_current_time(&self, time: f64) {
        let time = {
            let mut clock = self.clock.lock();
            let end = clock.duration.unwrap_or(f64::INFINITY);
            let time = if time.is_finite() { time.clamp(0.0, end) } else { 0.0 };
            clock.current_time = time;
            time
        };
        self.emit(MediaEvent::Seeked { time });
    }

    fn duration(&self) -> Option<f64> {
        self.clock.lock().duration
    }

    fn is_paused(&self) -> bool {
        self.clock.lock().paused
    }

    fn play(&self) {
        let restarted = {
            let mut clock = self.clock.lock();
            if !clock.paused {
                return;
            }
            clock.paused = false;
            // Playing from the end starts over
            let at_end = clock
                .duration
                .map(|d| clock.current_time >= d)
                .unwrap_or(false);
            if at_end {
                clock.current_time = 0.0;
            }
            at_end
        };

        if restarted {
            self.emit(MediaEvent::Seeked { time: 0.0 });
        }
        self.emit(MediaEvent::Play);
    }

    fn pause(&self) {
        {
            let mut clock = self.clock.lock();
            if clock.paused {
                return;
            }
            clock.paused = true;
        }
        self.emit(MediaEvent::Pause);
    }

    fn subscribe(&self) -> broadcast::Receiver<MediaEvent> {
        self.events.subscribe()
    }

    fn listener_count(&self) -> usize {
        self.events.receiver_count()
    }

    fn try_claim(&self) -> bool {
        self.claimed
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    fn release_claim(&self) {
        self.claimed.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(rx: &mut broadcast::Receiver<MediaEvent>) -> Vec<MediaEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_advance_only_while_playing() {
        let media = ClockedMedia::new("coach");
        media.load_metadata(10.0);
        media.advance(1.0);
        assert_eq!(media.current_time(), 0.0);

        media.play();
        media.advance(1.5);
        assert_eq!(media.current_time(), 1.5);
    }

    #[test]
    fn test_reaching_end_pauses() {
        let media = ClockedMedia::new("coach");
        media.load_metadata(2.0);
        let mut rx = media.subscribe();
        media.play();
        media.advance(5.0);

        assert_eq!(media.current_time(), 2.0);
        assert!(media.is_paused());
        assert_eq!(
            drain(&mut rx),
            vec![
                MediaEvent::Play,
                MediaEvent::TimeUpdate { time: 2.0 },
                MediaEvent::Pause,
                MediaEvent::Ended,
            ]
        );

        // Playing again starts over
        media.play();
        assert_eq!(media.current_time(), 0.0);
    }

    #[test]
    fn test_seek_clamps_and_emits() {
        let media = ClockedMedia::new("coach");
        media.load_metadata(8.0);
        let mut rx = media.subscribe();

        media.set_current_time(20.0);
        media.set_current_time(-1.0);

        assert_eq!(
            drain(&mut rx),
            vec![
                MediaEvent::Seeked { time: 8.0 },
                MediaEvent::Seeked { time: 0.0 },
            ]
        );
    }

    #[test]
    fn test_redundant_play_pause_are_silent() {
        let media = ClockedMedia::new("coach");
        let mut rx = media.subscribe();
        media.pause();
        media.play();
        media.play();
        assert_eq!(drain(&mut rx), vec![MediaEvent::Play]);
    }

    #[test]
    fn test_claim_is_exclusive() {
        let media = ClockedMedia::new("player");
        assert!(media.try_claim());
        assert!(!media.try_claim());
        media.release_claim();
        assert!(media.try_claim());
    }
}
