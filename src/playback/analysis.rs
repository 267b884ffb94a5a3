//! Analysis progress tracking
//!
//! The comparison view only tracks a remote analysis run; the work itself
//! happens behind [`AnalysisEndpoint`].

use crate::api::{AnalysisEndpoint, AnalysisRequest, AnalysisResult};
use crate::utils::{AppError, Notice};
use chrono::{DateTime, Utc};
use tokio::sync::broadcast;

/// Status of the current analysis run
#[derive(Debug, Clone, Default, PartialEq)]
pub enum AnalysisStatus {
    #[default]
    Idle,
    Running {
        started_at: DateTime<Utc>,
        /// Fraction complete, when the endpoint reports it
        progress: Option<f64>,
    },
    Completed(Box<AnalysisResult>),
    Failed(Notice),
}

/// Start/progress/complete/error surface for one analysis at a time
#[derive(Debug)]
pub struct AnalysisTracker {
    status: AnalysisStatus,
    event_tx: broadcast::Sender<AnalysisStatus>,
}

impl Default for AnalysisTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisTracker {
    pub fn new() -> Self {
        let (event_tx, _) = broadcast::channel(16);
        Self {
            status: AnalysisStatus::Idle,
            event_tx,
        }
    }

    pub fn status(&self) -> &AnalysisStatus {
        &self.status
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, AnalysisStatus::Running { .. })
    }

    pub fn subscribe(&self) -> broadcast::Receiver<AnalysisStatus> {
        self.event_tx.subscribe()
    }

    /// Begin a run. Returns false if one is already running.
    pub fn start(&mut self) -> bool {
        if self.is_running() {
            return false;
        }
        self.set(AnalysisStatus::Running {
            started_at: Utc::now(),
            progress: None,
        });
        true
    }

    /// Report progress in `[0, 1]`; ignored unless running
    pub fn progress(&mut self, fraction: f64) {
        if let AnalysisStatus::Running { started_at, .. } = self.status {
            self.set(AnalysisStatus::Running {
                started_at,
                progress: Some(fraction.clamp(0.0, 1.0)),
            });
        }
    }

    pub fn complete(&mut self, result: AnalysisResult) {
        self.set(AnalysisStatus::Completed(Box::new(result)));
    }

    pub fn error(&mut self, error: &AppError) {
        self.set(AnalysisStatus::Failed(Notice::from(error)));
    }

    /// Back to idle, discarding any result
    pub fn reset(&mut self) {
        self.set(AnalysisStatus::Idle);
    }

    pub fn result(&self) -> Option<&AnalysisResult> {
        match &self.status {
            AnalysisStatus::Completed(result) => Some(result.as_ref()),
            _ => None,
        }
    }

    fn set(&mut self, status: AnalysisStatus) {
        self.status = status.clone();
        let _ = self.event_tx.send(status);
    }
}

/// Run one analysis against `endpoint`, recording the outcome.
///
/// A run already in progress is left alone and `None` is returned.
pub async fn run_analysis(
    tracker: &mut AnalysisTracker,
    endpoint: &dyn AnalysisEndpoint,
    request: &AnalysisRequest,
) -> Option<Result<AnalysisResult, AppError>> {
    if !tracker.start() {
        tracing::warn!("Analysis already running; ignoring request");
        return None;
    }

    match endpoint.analyze(request).await {
        Ok(result) => {
            tracing::info!(
                "Analysis complete: accuracy {:.1}%, {} suggestion(s)",
                result.accuracy,
                result.suggestions.len()
            );
            tracker.complete(result.clone());
            Some(Ok(result))
        }
        Err(e) => {
            tracker.error(&e);
            Some(Err(e))
        }
    }
}
