//! Playback synchronizer
//!
//! Keeps follower elements locked to a driver element. The driver is
//! authoritative: followers are told what to do and never write back.
//! Driver events are received through a subscription and applied in
//! dispatch order by [`PlaybackSynchronizer::pump`].

use super::media::{MediaElement, MediaEvent};
use super::types::{format_time, Overlay, OverlayState, PlaybackError, TrackRole};
use crate::utils::{AppError, Notice};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};

/// Seconds moved by the skip buttons
pub const SKIP_SECONDS: f64 = 5.0;

/// A media element that tracks the driver
#[derive(Clone)]
pub struct Follower {
    pub element: Arc<dyn MediaElement>,
    pub role: TrackRole,
    /// Overlay that must be enabled for the element to be shown
    pub gate: Option<Overlay>,
}

impl Follower {
    pub fn new(element: Arc<dyn MediaElement>, role: TrackRole) -> Self {
        Self {
            element,
            role,
            gate: None,
        }
    }

    /// Only shown (and played) while `overlay` is enabled
    pub fn gated_by(mut self, overlay: Overlay) -> Self {
        self.gate = Some(overlay);
        self
    }
}

/// Subscriptions held while mounted
struct Subscriptions {
    driver: broadcast::Receiver<MediaEvent>,
    followers: Vec<(TrackRole, broadcast::Receiver<MediaEvent>)>,
}

/// Driver/follower playback group
pub struct PlaybackSynchronizer {
    driver: Arc<dyn MediaElement>,
    driver_role: TrackRole,
    followers: Vec<Follower>,
    overlays: OverlayState,

    current_time: f64,
    duration: Option<f64>,
    is_playing: bool,

    notices: HashMap<TrackRole, Notice>,
    subscriptions: Option<Subscriptions>,
}

impl PlaybackSynchronizer {
    pub fn new(driver: Arc<dyn MediaElement>, driver_role: TrackRole) -> Self {
        Self {
            driver,
            driver_role,
            followers: Vec::new(),
            overlays: OverlayState::default(),
            current_time: 0.0,
            duration: None,
            is_playing: false,
            notices: HashMap::new(),
            subscriptions: None,
        }
    }

    /// Add a follower. When mounted the follower is claimed immediately.
    pub fn add_follower(&mut self, follower: Follower) -> Result<(), PlaybackError> {
        if let Some(subscriptions) = self.subscriptions.as_mut() {
            if !follower.element.try_claim() {
                return Err(PlaybackError::ElementAlreadyDriven(
                    follower.element.label().to_string(),
                ));
            }
            follower.element.set_current_time(self.driver.current_time());
            subscriptions
                .followers
                .push((follower.role, follower.element.subscribe()));
        }
        self.followers.push(follower);
        Ok(())
    }

    /// Claim every element and subscribe to the driver
    pub fn mount(&mut self) -> Result<(), PlaybackError> {
        if self.subscriptions.is_some() {
            return Ok(());
        }

        let elements: Vec<&Arc<dyn MediaElement>> = std::iter::once(&self.driver)
            .chain(self.followers.iter().map(|f| &f.element))
            .collect();

        for (index, element) in elements.iter().enumerate() {
            if !element.try_claim() {
                for claimed in &elements[..index] {
                    claimed.release_claim();
                }
                return Err(PlaybackError::ElementAlreadyDriven(
                    element.label().to_string(),
                ));
            }
        }

        self.subscriptions = Some(Subscriptions {
            driver: self.driver.subscribe(),
            followers: self
                .followers
                .iter()
                .map(|f| (f.role, f.element.subscribe()))
                .collect(),
        });

        // Metadata may have loaded before mounting
        self.duration = self.driver.duration();
        self.current_time = self.driver.current_time();
        self.is_playing = !self.driver.is_paused();

        tracing::debug!(
            "Mounted playback group '{}' with {} follower(s)",
            self.driver.label(),
            self.followers.len()
        );
        Ok(())
    }

    /// Drop subscriptions and release every claim. Idempotent.
    pub fn unmount(&mut self) {
        if self.subscriptions.take().is_none() {
            return;
        }
        self.driver.release_claim();
        for follower in &self.followers {
            follower.element.release_claim();
        }
        tracing::debug!("Unmounted playback group '{}'", self.driver.label());
    }

    pub fn is_mounted(&self) -> bool {
        self.subscriptions.is_some()
    }

    /// Apply every pending event. Returns the number of driver events.
    pub fn pump(&mut self) -> usize {
        let mut driver_events = Vec::new();
        let mut follower_events = Vec::new();

        let Some(subscriptions) = self.subscriptions.as_mut() else {
            return 0;
        };
        drain(&mut subscriptions.driver, &mut driver_events);
        for (role, rx) in subscriptions.followers.iter_mut() {
            let mut events = Vec::new();
            drain(rx, &mut events);
            follower_events.extend(events.into_iter().map(|e| (*role, e)));
        }

        let count = driver_events.len();
        for event in driver_events {
            self.handle_driver_event(event);
        }
        for (role, event) in follower_events {
            if let MediaEvent::Error(message) = event {
                self.record_load_error(role, &message);
            }
        }
        count
    }

    /// Wait for the next driver event and apply it, then drain anything
    /// else pending. Returns false once unmounted.
    pub async fn process_next(&mut self) -> bool {
        let event = {
            let Some(subscriptions) = self.subscriptions.as_mut() else {
                return false;
            };
            loop {
                match subscriptions.driver.recv().await {
                    Ok(event) => break event,
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!("Playback group lagged; skipped {} event(s)", skipped);
                    }
                    Err(RecvError::Closed) => return false,
                }
            }
        };
        self.handle_driver_event(event);
        self.pump();
        true
    }

    fn handle_driver_event(&mut self, event: MediaEvent) {
        match event {
            MediaEvent::LoadedMetadata { duration } => {
                self.duration = Some(duration);
                self.notices.remove(&self.driver_role);
            }
            MediaEvent::Play => {
                self.is_playing = true;
                let time = self.driver.current_time();
                for follower in &self.followers {
                    follower.element.set_current_time(time);
                    if self.is_visible(follower) {
                        follower.element.play();
                    }
                }
            }
            MediaEvent::Pause => {
                self.is_playing = false;
                for follower in &self.followers {
                    follower.element.pause();
                }
            }
            MediaEvent::Seeked { time } => {
                self.current_time = time;
                for follower in &self.followers {
                    follower.element.set_current_time(time);
                }
            }
            MediaEvent::TimeUpdate { time } => {
                self.current_time = time;
            }
            MediaEvent::Ended => {
                self.is_playing = false;
            }
            MediaEvent::Error(message) => {
                self.record_load_error(self.driver_role, &message);
            }
        }
    }

    fn is_visible(&self, follower: &Follower) -> bool {
        follower
            .gate
            .map(|overlay| self.overlays.is_enabled(overlay))
            .unwrap_or(true)
    }

    fn record_load_error(&mut self, role: TrackRole, message: &str) {
        tracing::error!("Media error ({:?}): {}", role, message);
        let notice = Notice::from(AppError::Unknown(role.load_error_message().to_string()));
        self.notices.insert(role, notice);
    }

    /// Play if paused, pause if playing. Returns whether the driver plays.
    pub fn toggle_play(&mut self) -> bool {
        if self.driver.is_paused() {
            self.driver.play();
        } else {
            self.driver.pause();
        }
        !self.driver.is_paused()
    }

    /// Seek everything to `fraction` of the duration
    pub fn seek_to_fraction(&mut self, fraction: f64) -> Result<f64, PlaybackError> {
        let duration = self.duration.ok_or(PlaybackError::MetadataNotLoaded)?;
        let fraction = if fraction.is_nan() { 0.0 } else { fraction.clamp(0.0, 1.0) };
        let time = fraction * duration;

        self.driver.set_current_time(time);
        for follower in &self.followers {
            follower.element.set_current_time(time);
        }
        self.current_time = time;
        Ok(time)
    }

    /// Move the driver by `delta` seconds; followers follow on `Seeked`
    pub fn skip(&mut self, delta: f64) -> Result<f64, PlaybackError> {
        let duration = self.duration.ok_or(PlaybackError::MetadataNotLoaded)?;
        let time = (self.driver.current_time() + delta).clamp(0.0, duration);
        self.driver.set_current_time(time);
        self.current_time = time;
        Ok(time)
    }

    pub fn skip_forward(&mut self) -> Result<f64, PlaybackError> {
        self.skip(SKIP_SECONDS)
    }

    pub fn skip_backward(&mut self) -> Result<f64, PlaybackError> {
        self.skip(-SKIP_SECONDS)
    }

    pub fn restart(&mut self) -> Result<(), PlaybackError> {
        self.seek_to_fraction(0.0).map(|_| ())
    }

    /// Flip an overlay and return its new value.
    ///
    /// Followers gated by the overlay are synced and started when revealed
    /// during playback, and paused when hidden.
    pub fn toggle_overlay(&mut self, overlay: Overlay) -> bool {
        let enabled = self.overlays.toggle(overlay);
        let time = self.driver.current_time();
        for follower in self.followers.iter().filter(|f| f.gate == Some(overlay)) {
            if enabled && self.is_playing {
                follower.element.set_current_time(time);
                follower.element.play();
            } else if !enabled {
                follower.element.pause();
            }
        }
        enabled
    }

    pub fn overlays(&self) -> OverlayState {
        self.overlays
    }

    pub fn is_overlay_enabled(&self, overlay: Overlay) -> bool {
        self.overlays.is_enabled(overlay)
    }

    pub fn current_time(&self) -> f64 {
        self.current_time
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration
    }

    pub fn is_playing(&self) -> bool {
        self.is_playing
    }

    /// Slider position in percent
    pub fn progress_percent(&self) -> f64 {
        match self.duration {
            Some(duration) if duration > 0.0 => {
                (self.current_time / duration * 100.0).clamp(0.0, 100.0)
            }
            _ => 0.0,
        }
    }

    /// `m:ss / m:ss`
    pub fn time_label(&self) -> String {
        format!(
            "{} / {}",
            format_time(self.current_time),
            format_time(self.duration.unwrap_or(0.0))
        )
    }

    pub fn followers(&self) -> &[Follower] {
        &self.followers
    }

    /// Visible load-error notices
    pub fn notices(&self) -> Vec<(TrackRole, &Notice)> {
        self.notices
            .iter()
            .filter(|(_, notice)| notice.is_visible())
            .map(|(role, notice)| (*role, notice))
            .collect()
    }

    pub fn notice(&self, role: TrackRole) -> Option<&Notice> {
        self.notices.get(&role)
    }

    pub fn dismiss_notice(&mut self, role: TrackRole) {
        if let Some(notice) = self.notices.get_mut(&role) {
            notice.dismiss();
        }
    }
}

impl Drop for PlaybackSynchronizer {
    fn drop(&mut self) {
        self.unmount();
    }
}

fn drain(rx: &mut broadcast::Receiver<MediaEvent>, out: &mut Vec<MediaEvent>) {
    loop {
        match rx.try_recv() {
            Ok(event) => out.push(event),
            Err(TryRecvError::Lagged(skipped)) => {
                tracing::warn!("Playback group lagged; skipped {} event(s)", skipped);
            }
            Err(TryRecvError::Empty) | Err(TryRecvError::Closed) => break,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playback::media::ClockedMedia;

    struct Group {
        coach: Arc<ClockedMedia>,
        player: Arc<ClockedMedia>,
        comparison: Arc<ClockedMedia>,
        sync: PlaybackSynchronizer,
    }

    fn group(duration: f64) -> Group {
        let coach = Arc::new(ClockedMedia::new("coach"));
        let player = Arc::new(ClockedMedia::new("player"));
        let comparison = Arc::new(ClockedMedia::new("comparison"));
        for media in [&coach, &player, &comparison] {
            media.load_metadata(duration);
        }

        let mut sync = PlaybackSynchronizer::new(coach.clone(), TrackRole::Coach);
        sync.add_follower(Follower::new(player.clone(), TrackRole::Player))
            .unwrap();
        sync.add_follower(
            Follower::new(comparison.clone(), TrackRole::Comparison).gated_by(Overlay::Skeleton),
        )
        .unwrap();
        sync.mount().unwrap();

        Group {
            coach,
            player,
            comparison,
            sync,
        }
    }

    #[test]
    fn test_seek_mirrors_immediately() {
        let mut g = group(100.0);

        let time = g.sync.seek_to_fraction(0.5).unwrap();

        assert_eq!(time, 50.0);
        assert_eq!(g.coach.current_time(), 50.0);
        assert_eq!(g.player.current_time(), 50.0);
        assert_eq!(g.comparison.current_time(), 50.0);
        assert_eq!(g.sync.progress_percent(), 50.0);
    }

    #[test]
    fn test_seek_fraction_is_clamped() {
        let mut g = group(20.0);
        assert_eq!(g.sync.seek_to_fraction(1.7).unwrap(), 20.0);
        assert_eq!(g.sync.seek_to_fraction(-0.3).unwrap(), 0.0);
    }

    #[test]
    fn test_seek_without_metadata() {
        let coach = Arc::new(ClockedMedia::new("coach"));
        let mut sync = PlaybackSynchronizer::new(coach, TrackRole::Coach);
        sync.mount().unwrap();
        assert_eq!(
            sync.seek_to_fraction(0.5),
            Err(PlaybackError::MetadataNotLoaded)
        );
        assert_eq!(sync.skip_forward(), Err(PlaybackError::MetadataNotLoaded));
    }

    #[test]
    fn test_pause_cascade_keeps_follower_time() {
        let mut g = group(30.0);
        g.sync.toggle_play();
        g.sync.pump();
        g.coach.advance(3.0);
        g.player.advance(2.5);
        g.sync.pump();

        g.sync.toggle_play();
        g.sync.pump();

        assert!(g.player.is_paused());
        assert!(g.comparison.is_paused());
        assert_eq!(g.player.current_time(), 2.5);
        assert!(!g.sync.is_playing());
        assert_eq!(g.sync.current_time(), 3.0);
    }

    #[test]
    fn test_comparison_plays_on_first_play() {
        let mut g = group(30.0);
        assert!(g.sync.is_overlay_enabled(Overlay::Skeleton));

        g.sync.toggle_play();
        g.sync.pump();

        assert!(!g.player.is_paused());
        assert!(!g.comparison.is_paused());
    }

    #[test]
    fn test_play_syncs_followers_and_respects_gate() {
        let mut g = group(30.0);
        assert!(!g.sync.toggle_overlay(Overlay::Skeleton));
        g.coach.set_current_time(4.0);
        g.sync.pump();
        g.player.set_current_time(12.0);

        g.sync.toggle_play();
        g.sync.pump();

        assert!(g.sync.is_playing());
        assert!(!g.player.is_paused());
        assert_eq!(g.player.current_time(), 4.0);
        // Hidden comparison video is synced but not played
        assert_eq!(g.comparison.current_time(), 4.0);
        assert!(g.comparison.is_paused());

        assert!(g.sync.toggle_overlay(Overlay::Skeleton));
        assert!(!g.comparison.is_paused());
        assert!(!g.sync.toggle_overlay(Overlay::Skeleton));
        assert!(g.comparison.is_paused());
    }

    #[test]
    fn test_skip_follows_through_seeked() {
        let mut g = group(12.0);
        assert_eq!(g.sync.skip_forward().unwrap(), 5.0);
        g.sync.pump();
        assert_eq!(g.player.current_time(), 5.0);

        assert_eq!(g.sync.skip(100.0).unwrap(), 12.0);
        assert_eq!(g.sync.skip_backward().unwrap(), 7.0);
        g.sync.pump();
        assert_eq!(g.player.current_time(), 7.0);
        assert_eq!(g.sync.time_label(), "0:07 / 0:12");
    }

    #[test]
    fn test_restart_and_double_toggle_round_trip() {
        let mut g = group(40.0);
        g.sync.seek_to_fraction(0.25).unwrap();
        g.sync.pump();
        let was_playing = g.sync.is_playing();

        g.sync.restart().unwrap();
        g.sync.toggle_play();
        g.sync.pump();
        g.sync.toggle_play();
        g.sync.pump();

        assert_eq!(g.sync.is_playing(), was_playing);
        assert_eq!(g.sync.current_time(), 0.0);
        assert_eq!(g.player.current_time(), 0.0);
    }

    #[test]
    fn test_overlay_has_no_timing_effect() {
        let mut g = group(10.0);
        g.sync.seek_to_fraction(0.3).unwrap();
        g.sync.toggle_overlay(Overlay::Grid);
        assert!(g.sync.is_overlay_enabled(Overlay::Grid));
        assert_eq!(g.coach.current_time(), 3.0);
        assert_eq!(g.player.current_time(), 3.0);
    }

    #[test]
    fn test_metadata_event_sets_duration() {
        let coach = Arc::new(ClockedMedia::new("coach"));
        let mut sync = PlaybackSynchronizer::new(coach.clone(), TrackRole::Coach);
        sync.mount().unwrap();
        assert_eq!(sync.duration(), None);
        assert_eq!(sync.progress_percent(), 0.0);

        coach.load_metadata(64.0);
        sync.pump();
        assert_eq!(sync.duration(), Some(64.0));
    }

    #[test]
    fn test_media_errors_are_per_role() {
        let mut g = group(10.0);
        g.comparison.fail("404");
        g.coach.fail("decode error");
        g.sync.pump();

        assert_eq!(
            g.sync.notice(TrackRole::Comparison).unwrap().message,
            "Error loading comparison video. Please try analyzing again."
        );
        assert_eq!(
            g.sync.notice(TrackRole::Coach).unwrap().message,
            "Error loading coach video."
        );
        assert!(g.sync.notice(TrackRole::Player).is_none());

        g.sync.dismiss_notice(TrackRole::Coach);
        assert_eq!(g.sync.notices().len(), 1);
    }

    #[test]
    fn test_unmount_releases_subscriptions_and_claims() {
        let mut g = group(10.0);
        let listeners = g.coach.listener_count();
        assert_eq!(listeners, 1);

        g.sync.unmount();
        g.sync.unmount();
        assert_eq!(g.coach.listener_count(), 0);
        assert!(!g.sync.is_mounted());

        // Events after unmount are not applied
        g.coach.set_current_time(6.0);
        assert_eq!(g.sync.pump(), 0);
        assert_eq!(g.player.current_time(), 0.0);

        g.sync.mount().unwrap();
        assert_eq!(g.coach.listener_count(), 1);
    }

    #[test]
    fn test_element_cannot_have_two_drivers() {
        let g = group(10.0);
        let mut other = PlaybackSynchronizer::new(g.player.clone(), TrackRole::Player);
        assert_eq!(
            other.mount(),
            Err(PlaybackError::ElementAlreadyDriven("player".to_string()))
        );
        assert!(!other.is_mounted());

        drop(g);
        let player = Arc::new(ClockedMedia::new("solo"));
        let mut sync = PlaybackSynchronizer::new(player.clone(), TrackRole::Player);
        sync.mount().unwrap();
        drop(sync);
        assert!(player.try_claim());
    }

    #[test]
    fn test_failed_mount_releases_partial_claims() {
        let coach = Arc::new(ClockedMedia::new("coach"));
        let player = Arc::new(ClockedMedia::new("player"));
        assert!(player.try_claim());

        let mut sync = PlaybackSynchronizer::new(coach.clone(), TrackRole::Coach);
        sync.add_follower(Follower::new(player, TrackRole::Player))
            .unwrap();
        assert!(sync.mount().is_err());
        assert!(coach.try_claim());
    }

    #[tokio::test]
    async fn test_process_next_applies_driver_events() {
        let mut g = group(10.0);
        g.coach.set_current_time(2.0);
        assert!(g.sync.process_next().await);
        assert_eq!(g.player.current_time(), 2.0);

        g.sync.unmount();
        assert!(!g.sync.process_next().await);
    }
}
