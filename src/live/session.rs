//! Capture session
//!
//! Owns one camera stream and one live channel, acquired and released as a
//! pair. The stream and channel only exist inside the `Active` phase, so a
//! channel without a camera (or the reverse) cannot be represented.
//!
//! The frame relay runs one capture-encode-send cycle per scheduler tick
//! and stops rescheduling as soon as the session leaves `Active`.

use super::feedback::{LiveFeedback, LiveView, RelayStats, RenderFrame};
use super::scheduler::FrameScheduler;
use super::state::{CameraErrorReason, CameraState};
use crate::capture::device::{classify_failure, default_selection};
use crate::capture::encoder::encode_frame_data_url;
use crate::capture::{
    CameraBackend, CaptureConstraints, CaptureSurface, DeviceDescriptor, MediaStream, RawFrame,
    Resolution,
};
use crate::config::ClientConfig;
use crate::stream::{ChannelConnector, ChannelEvent, FrameMessage, StreamChannel};
use crate::utils::{AppError, Notice};
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::sync::broadcast;

/// Errors returned by session operations
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SessionError {
    #[error("Camera is already active")]
    AlreadyActive,

    #[error("Upload the reference video before starting the camera")]
    NoSessionContext,

    #[error("{}", .0.user_message())]
    Camera(CameraErrorReason),
}

/// Events emitted by the session
#[derive(Debug, Clone)]
pub enum SessionEvent {
    StateChanged(CameraState),
    DevicesChanged(Vec<DeviceDescriptor>),
    FeedbackUpdated(LiveFeedback),
    NoticeRaised(Notice),
    ChannelStatus { connected: bool },
}

/// Capture and relay settings
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub preferred: Resolution,
    pub relaxed: Resolution,
    pub jpeg_quality: u8,
    pub degraded_after: Duration,
}

impl From<&ClientConfig> for SessionSettings {
    fn from(config: &ClientConfig) -> Self {
        Self {
            preferred: config.capture.preferred,
            relaxed: config.capture.relaxed,
            jpeg_quality: config.capture.jpeg_quality,
            degraded_after: config.stream.degraded_after(),
        }
    }
}

impl Default for SessionSettings {
    fn default() -> Self {
        SessionSettings::from(&ClientConfig::default())
    }
}

/// Resources held while the camera is active
struct ActiveResources {
    stream: Box<dyn MediaStream>,
    channel: Box<dyn StreamChannel>,
    /// When the channel was last seen disconnected (None = connected)
    disconnected_since: Option<Instant>,
}

enum Phase {
    Idle,
    Starting,
    Active(ActiveResources),
    Error(CameraErrorReason),
}

impl Phase {
    fn state(&self) -> CameraState {
        match self {
            Phase::Idle => CameraState::Idle,
            Phase::Starting => CameraState::Starting,
            Phase::Active(_) => CameraState::Active,
            Phase::Error(reason) => CameraState::Error(reason.clone()),
        }
    }
}

/// Live camera capture and frame relay
pub struct CaptureSession {
    backend: Arc<dyn CameraBackend>,
    connector: Arc<dyn ChannelConnector>,
    settings: SessionSettings,

    /// Reference video id frames are tagged with
    context_id: Option<String>,

    phase: Phase,
    devices: Vec<DeviceDescriptor>,
    devices_enumerated: bool,
    selected_device: Option<String>,
    surface: CaptureSurface,
    latest_frame: Option<RenderFrame>,
    feedback: LiveFeedback,
    notice: Option<Notice>,
    stats: RelayStats,
    event_tx: broadcast::Sender<SessionEvent>,
}

impl CaptureSession {
    pub fn new(
        backend: Arc<dyn CameraBackend>,
        connector: Arc<dyn ChannelConnector>,
        settings: SessionSettings,
    ) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            backend,
            connector,
            settings,
            context_id: None,
            phase: Phase::Idle,
            devices: Vec::new(),
            devices_enumerated: false,
            selected_device: None,
            surface: CaptureSurface::default(),
            latest_frame: None,
            feedback: LiveFeedback::default(),
            notice: None,
            stats: RelayStats::default(),
            event_tx,
        }
    }

    /// Set the session context id (reference video id).
    ///
    /// Clearing it while the camera is active stops the camera.
    pub fn set_context(&mut self, context_id: Option<String>) {
        if context_id.is_none() && matches!(self.phase, Phase::Active(_)) {
            self.stop();
        }
        self.context_id = context_id;
    }

    pub fn context_id(&self) -> Option<&str> {
        self.context_id.as_deref()
    }

    /// Whether the camera may be started
    pub fn is_enabled(&self) -> bool {
        self.context_id.is_some()
    }

    pub fn state(&self) -> CameraState {
        self.phase.state()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.event_tx.subscribe()
    }

    pub fn devices(&self) -> &[DeviceDescriptor] {
        &self.devices
    }

    pub fn selected_device(&self) -> Option<&str> {
        self.selected_device.as_deref()
    }

    pub fn latest_frame(&self) -> Option<&RenderFrame> {
        self.latest_frame.as_ref()
    }

    pub fn feedback(&self) -> &LiveFeedback {
        &self.feedback
    }

    pub fn notice(&self) -> Option<&Notice> {
        self.notice.as_ref()
    }

    pub fn dismiss_notice(&mut self) {
        if let Some(notice) = self.notice.as_mut() {
            notice.dismiss();
        }
    }

    pub fn stats(&self) -> RelayStats {
        self.stats
    }

    pub fn has_stream(&self) -> bool {
        matches!(self.phase, Phase::Active(_))
    }

    /// Whether the live channel is currently connected
    pub fn is_channel_connected(&self) -> bool {
        match &self.phase {
            Phase::Active(resources) => resources.channel.is_connected(),
            _ => false,
        }
    }

    /// Newest raw camera frame
    pub fn raw_frame(&self) -> Option<Arc<RawFrame>> {
        self.surface.snapshot()
    }

    /// What the preview should render
    pub fn current_view(&self) -> LiveView<'_> {
        match (&self.phase, &self.latest_frame) {
            (Phase::Active(_), Some(frame)) => LiveView::Annotated(frame),
            (Phase::Active(_), None) => LiveView::Raw,
            _ => LiveView::CameraOff,
        }
    }

    /// True when the camera is active but the channel has been down for
    /// longer than the configured threshold
    pub fn is_degraded(&self) -> bool {
        match &self.phase {
            Phase::Active(resources) => resources
                .disconnected_since
                .map(|since| since.elapsed() >= self.settings.degraded_after)
                .unwrap_or(false),
            _ => false,
        }
    }

    /// Re-enumerate cameras. Failures are logged and keep the previous list.
    pub async fn refresh_devices(&mut self) -> &[DeviceDescriptor] {
        match self.backend.enumerate().await {
            Ok(devices) => {
                let selection_present = self
                    .selected_device
                    .as_ref()
                    .map(|id| devices.iter().any(|d| &d.id == id))
                    .unwrap_or(false);
                if !selection_present {
                    self.selected_device = default_selection(&devices);
                }
                tracing::debug!("Found {} camera(s)", devices.len());
                self.devices = devices;
                self.emit(SessionEvent::DevicesChanged(self.devices.clone()));
            }
            Err(e) => {
                tracing::warn!("Failed to enumerate camera devices: {}", e);
            }
        }
        self.devices_enumerated = true;
        &self.devices
    }

    /// Choose the camera for the next start
    pub fn select_device(&mut self, device_id: impl Into<String>) -> Result<(), SessionError> {
        if matches!(self.phase, Phase::Starting | Phase::Active(_)) {
            return Err(SessionError::AlreadyActive);
        }
        self.selected_device = Some(device_id.into());
        Ok(())
    }

    /// Start the camera and open the live channel
    pub async fn start(&mut self) -> Result<(), SessionError> {
        if matches!(self.phase, Phase::Starting | Phase::Active(_)) {
            return Err(SessionError::AlreadyActive);
        }
        let context_id = self
            .context_id
            .clone()
            .ok_or(SessionError::NoSessionContext)?;

        if !self.devices_enumerated {
            self.refresh_devices().await;
        }

        self.notice = None;
        self.latest_frame = None;
        self.enter(Phase::Starting);

        let constraints = CaptureConstraints::new(self.selected_device.clone(), self.settings.preferred);
        tracing::info!(
            "Starting camera {:?} at {}x{}",
            constraints.device_id,
            constraints.ideal.width,
            constraints.ideal.height
        );

        let acquired = match self.backend.acquire(&constraints).await {
            Err(failure)
                if classify_failure(&failure) == CameraErrorReason::ConstraintsUnsatisfiable =>
            {
                let relaxed = constraints.relaxed(self.settings.relaxed);
                tracing::warn!(
                    "Camera cannot satisfy {}x{} ({}); retrying at {}x{}",
                    constraints.ideal.width,
                    constraints.ideal.height,
                    failure,
                    relaxed.ideal.width,
                    relaxed.ideal.height
                );
                self.backend.acquire(&relaxed).await
            }
            other => other,
        };

        let mut stream = match acquired {
            Ok(stream) => stream,
            Err(failure) => {
                tracing::error!("Camera error: {}", failure);
                return Err(self.fail(classify_failure(&failure)));
            }
        };

        if stream.video_track_count() == 0 {
            tracing::error!("Acquired stream has no video track");
            stream.stop_tracks();
            return Err(self.fail(CameraErrorReason::DeviceNotFound));
        }

        self.surface.attach(stream.frame_slot());
        let channel = self.connector.open();
        self.enter(Phase::Active(ActiveResources {
            stream,
            channel,
            disconnected_since: Some(Instant::now()),
        }));
        tracing::info!("Camera active; relaying frames for session {}", context_id);

        // Labels become available once permission is granted
        self.refresh_devices().await;
        Ok(())
    }

    /// Stop the camera. Idempotent; a no-op when idle.
    ///
    /// Teardown order: stop tracks, clear the surface, close the channel,
    /// discard feedback.
    pub fn stop(&mut self) {
        if matches!(self.phase, Phase::Idle) {
            return;
        }

        let previous = std::mem::replace(&mut self.phase, Phase::Idle);
        if let Phase::Active(mut resources) = previous {
            resources.stream.stop_tracks();
            self.surface.clear();
            resources.channel.close();
        } else {
            self.surface.clear();
        }

        self.latest_frame = None;
        self.feedback = LiveFeedback::default();
        self.notice = None;

        tracing::info!(
            "Camera stopped ({} sent, {} dropped)",
            self.stats.frames_sent,
            self.stats.frames_dropped
        );
        self.emit(SessionEvent::StateChanged(CameraState::Idle));
    }

    /// Switch cameras: full stop, then start with the new device
    pub async fn switch_device(&mut self, device_id: impl Into<String>) -> Result<(), SessionError> {
        let device_id = device_id.into();
        tracing::info!("Switching camera to {}", device_id);
        self.stop();
        self.selected_device = Some(device_id);
        self.start().await
    }

    /// One capture-encode-send cycle.
    ///
    /// Returns false once the session is no longer active, which ends the
    /// relay loop.
    pub fn relay_cycle(&mut self) -> bool {
        let (live, connected) = match &self.phase {
            Phase::Active(resources) => {
                (resources.stream.is_live(), resources.channel.is_connected())
            }
            _ => return false,
        };

        if !live {
            tracing::warn!("Camera stream ended unexpectedly");
            self.stop();
            self.raise_notice(Notice::from(AppError::DeviceBusy(
                "Camera stream ended. It may have been unplugged or taken by another application."
                    .to_string(),
            )));
            return false;
        }

        let Some(frame) = self.surface.snapshot() else {
            self.stats.cycles_skipped += 1;
            return true;
        };

        // Latest-frame-wins: nothing is queued for a channel that is down
        if !connected {
            self.stats.frames_dropped += 1;
            return true;
        }

        let Some(context_id) = self.context_id.clone() else {
            return true;
        };

        let data_url = match encode_frame_data_url(&frame, self.settings.jpeg_quality) {
            Ok(url) => url,
            Err(e) => {
                tracing::debug!("Dropping frame: {}", e);
                self.stats.frames_dropped += 1;
                return true;
            }
        };

        let Phase::Active(resources) = &mut self.phase else {
            return false;
        };
        let outcome = resources.channel.try_send_frame(FrameMessage {
            frame: data_url,
            coach_video_id: context_id,
        });

        if outcome.is_sent() {
            self.stats.frames_sent += 1;
        } else {
            self.stats.frames_dropped += 1;
        }
        true
    }

    /// Apply every pending channel event, in arrival order
    pub fn pump_channel_events(&mut self) -> usize {
        let mut events = Vec::new();
        if let Phase::Active(resources) = &mut self.phase {
            while let Some(event) = resources.channel.try_recv_event() {
                events.push(event);
            }
        }

        let count = events.len();
        for event in events {
            self.handle_channel_event(event);
        }
        count
    }

    /// Apply one inbound channel event
    pub fn handle_channel_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::Connected => {
                if let Phase::Active(resources) = &mut self.phase {
                    resources.disconnected_since = None;
                }
                tracing::info!("Live channel connected");
                self.emit(SessionEvent::ChannelStatus { connected: true });
            }
            ChannelEvent::Disconnected => {
                if let Phase::Active(resources) = &mut self.phase {
                    resources.disconnected_since.get_or_insert_with(Instant::now);
                }
                tracing::warn!("Live channel disconnected; raw video continues");
                self.emit(SessionEvent::ChannelStatus { connected: false });
            }
            ChannelEvent::Feedback(message) => {
                if !matches!(self.phase, Phase::Active(_)) {
                    tracing::debug!("Ignoring feedback received while camera is off");
                    return;
                }
                if let Some(image) = message.image() {
                    self.latest_frame = Some(RenderFrame::new(image));
                }
                self.feedback = LiveFeedback::from_message(&message);
                self.stats.feedback_received += 1;
                self.emit(SessionEvent::FeedbackUpdated(self.feedback.clone()));
            }
            ChannelEvent::ServerError(message) => {
                self.raise_notice(Notice::from(AppError::Channel(message)));
            }
            ChannelEvent::DeliveryFailed(reason) => {
                self.raise_notice(Notice::from(AppError::Channel(format!(
                    "Frame delivery failed: {}",
                    reason
                ))));
            }
        }
    }

    /// Run the relay loop until the session leaves `Active` or the
    /// scheduler stops
    pub async fn run(&mut self, scheduler: &mut dyn FrameScheduler) -> RelayStats {
        tracing::debug!("Frame relay loop started");
        while matches!(self.phase, Phase::Active(_)) {
            if !scheduler.next_frame().await {
                break;
            }
            self.pump_channel_events();
            if !self.relay_cycle() {
                break;
            }
        }
        tracing::debug!("Frame relay loop finished: {:?}", self.stats);
        self.stats
    }

    fn enter(&mut self, next: Phase) {
        let from = self.phase.state();
        let to = next.state();
        debug_assert!(
            from.can_transition_to(&to),
            "illegal camera transition {:?} -> {:?}",
            from,
            to
        );
        tracing::debug!("Camera state {:?} -> {:?}", from, to);
        self.phase = next;
        self.emit(SessionEvent::StateChanged(to));
    }

    fn fail(&mut self, reason: CameraErrorReason) -> SessionError {
        self.surface.clear();
        self.raise_notice(Notice::from(AppError::from(&reason)));
        self.enter(Phase::Error(reason.clone()));
        SessionError::Camera(reason)
    }

    fn raise_notice(&mut self, notice: Notice) {
        tracing::warn!("{}", notice.message);
        self.notice = Some(notice.clone());
        self.emit(SessionEvent::NoticeRaised(notice));
    }

    fn emit(&self, event: SessionEvent) {
        let _ = self.event_tx.send(event);
    }
}

impl Drop for CaptureSession {
    fn drop(&mut self) {
        self.stop();
    }
}
