//! coachcam - coach/player video comparison client.
//!
//! Two cores: a live capture session that relays camera frames to the
//! analysis server and renders the feedback it sends back, and a playback
//! synchronizer that keeps comparison videos locked to the coach video.

pub mod api;
pub mod app;
pub mod capture;
pub mod config;
pub mod live;
pub mod playback;
pub mod role;
pub mod stream;
pub mod utils;

#[cfg(test)]
pub(crate) mod testing;

pub use app::AppContext;
pub use config::ClientConfig;
pub use role::{Capability, Role};
pub use utils::{AppError, AppResult};

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Initialize tracing/logging. Safe to call more than once.
pub fn init_tracing() {
    let _ = tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "coachcam=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
