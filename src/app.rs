//! Application context
//!
//! Created once at the application root and passed down explicitly.

use crate::api::ApiClient;
use crate::capture::CameraBackend;
use crate::config::ClientConfig;
use crate::live::{CaptureSession, IntervalScheduler, SessionSettings};
use crate::playback::{
    AnalysisTracker, Follower, MediaElement, Overlay, PlaybackError, PlaybackSynchronizer,
    TrackRole,
};
use crate::role::{Capability, Role};
use crate::stream::WsConnector;
use crate::utils::AppResult;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use uuid::Uuid;

/// Shared, read-only application state
pub struct AppContext {
    config: ClientConfig,
    role: Role,
    api: ApiClient,
    session_id: Uuid,
    initialized_at: DateTime<Utc>,
}

impl AppContext {
    /// Validate the configuration and build the context
    pub fn initialize(config: ClientConfig, role: Role) -> AppResult<Self> {
        config.validate()?;

        let context = Self {
            api: ApiClient::new(&config.api),
            config,
            role,
            session_id: Uuid::new_v4(),
            initialized_at: Utc::now(),
        };

        tracing::info!(
            "Initialized {:?} context {} (server {}, stream {})",
            context.role,
            context.session_id,
            context.config.api.base_url,
            context.config.stream.url
        );
        Ok(context)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn can(&self, capability: Capability) -> bool {
        self.role.can(capability)
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    pub fn initialized_at(&self) -> DateTime<Utc> {
        self.initialized_at
    }

    /// A capture session relaying over the configured websocket
    pub fn capture_session(&self, backend: Arc<dyn CameraBackend>) -> CaptureSession {
        CaptureSession::new(
            backend,
            Arc::new(WsConnector::from_config(&self.config.stream)),
            SessionSettings::from(&self.config),
        )
    }

    /// Frame scheduler at the configured refresh rate. Needs a runtime.
    pub fn frame_scheduler(&self) -> IntervalScheduler {
        IntervalScheduler::new(self.config.capture.frame_interval())
    }

    pub fn analysis_tracker(&self) -> AnalysisTracker {
        AnalysisTracker::new()
    }

    /// Mounted comparison group: coach drives, the player follows, and the
    /// comparison video follows while the skeleton overlay is shown
    pub fn comparison_group(
        &self,
        coach: Arc<dyn MediaElement>,
        player: Arc<dyn MediaElement>,
        comparison: Option<Arc<dyn MediaElement>>,
    ) -> Result<PlaybackSynchronizer, PlaybackError> {
        let mut group = PlaybackSynchronizer::new(coach, TrackRole::Coach);
        group.add_follower(Follower::new(player, TrackRole::Player))?;
        if let Some(comparison) = comparison {
            group.add_follower(
                Follower::new(comparison, TrackRole::Comparison).gated_by(Overlay::Skeleton),
            )?;
        }
        group.mount()?;
        Ok(group)
    }

    /// End of the application lifecycle
    pub fn shutdown(self) {
        let uptime = Utc::now() - self.initialized_at;
        tracing::info!(
            "Shutting down context {} after {}s",
            self.session_id,
            uptime.num_seconds()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::live::CameraState;
    use crate::playback::ClockedMedia;
    use crate::testing::{two_devices, MockBackend};

    #[test]
    fn test_initialize_rejects_invalid_config() {
        let mut config = ClientConfig::default();
        config.capture.jpeg_quality = 0;
        assert!(AppContext::initialize(config, Role::Coach).is_err());
    }

    #[test]
    fn test_capabilities_follow_role() {
        let context = AppContext::initialize(ClientConfig::default(), Role::Player).unwrap();
        assert!(context.can(Capability::RecordSession));
        assert!(!context.can(Capability::TeamOverview));
        context.shutdown();
    }

    #[tokio::test]
    async fn test_capture_session_starts_idle() {
        let context = AppContext::initialize(ClientConfig::default(), Role::Coach).unwrap();
        let session = context.capture_session(Arc::new(MockBackend::with_devices(two_devices())));
        assert_eq!(session.state(), CameraState::Idle);
        assert!(!session.is_enabled());
    }

    #[test]
    fn test_comparison_group() {
        let context = AppContext::initialize(ClientConfig::default(), Role::Coach).unwrap();
        let coach = Arc::new(ClockedMedia::new("coach"));
        let player = Arc::new(ClockedMedia::new("player"));
        let comparison = Arc::new(ClockedMedia::new("comparison"));
        coach.load_metadata(30.0);

        let mut group = context
            .comparison_group(coach, player.clone(), Some(comparison))
            .unwrap();

        assert!(group.is_mounted());
        assert_eq!(group.followers().len(), 2);
        assert_eq!(group.followers()[1].gate, Some(Overlay::Skeleton));
        group.seek_to_fraction(0.5).unwrap();
        assert_eq!(player.current_time(), 15.0);
    }
}
