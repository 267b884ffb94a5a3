//! User roles and what each role can see

use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Signed-in user role
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Coach,
    /// Unknown or missing roles fall back to player
    #[default]
    Player,
}

impl Role {
    /// Title shown next to the user's name
    pub fn title(&self) -> &'static str {
        match self {
            Role::Coach => "Head Coach",
            Role::Player => "Athlete",
        }
    }

    pub fn can(&self, capability: Capability) -> bool {
        CAPABILITIES
            .iter()
            .any(|(c, roles)| *c == capability && roles.contains(self))
    }

    /// Capabilities in navigation order
    pub fn capabilities(&self) -> Vec<Capability> {
        CAPABILITIES
            .iter()
            .filter(|(_, roles)| roles.contains(self))
            .map(|(c, _)| *c)
            .collect()
    }
}

impl FromStr for Role {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_lowercase().as_str() {
            "coach" => Role::Coach,
            _ => Role::Player,
        })
    }
}

/// A navigable section or role-gated action
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Capability {
    Dashboard,
    VideoAnalysis,
    LiveAnalysis,
    PerformanceReports,
    TeamOverview,
    TrainingSchedule,
    RecordSession,
    Settings,
    /// Session summary block in analysis reports
    SessionSummary,
}

impl Capability {
    pub fn label(&self) -> &'static str {
        match self {
            Capability::Dashboard => "Dashboard",
            Capability::VideoAnalysis => "Video Analysis",
            Capability::LiveAnalysis => "Live Analysis",
            Capability::PerformanceReports => "Performance Reports",
            Capability::TeamOverview => "Team Overview",
            Capability::TrainingSchedule => "Training Schedule",
            Capability::RecordSession => "Record Session",
            Capability::Settings => "Settings",
            Capability::SessionSummary => "Session Summary",
        }
    }

    /// Route, for navigable capabilities
    pub fn path(&self) -> Option<&'static str> {
        match self {
            Capability::Dashboard => Some("/dashboard"),
            Capability::VideoAnalysis => Some("/analysis"),
            Capability::LiveAnalysis => Some("/live"),
            Capability::PerformanceReports => Some("/reports"),
            Capability::TeamOverview => Some("/team"),
            Capability::TrainingSchedule => Some("/schedule"),
            Capability::RecordSession => Some("/record"),
            Capability::Settings => Some("/settings"),
            Capability::SessionSummary => None,
        }
    }
}

const BOTH: &[Role] = &[Role::Coach, Role::Player];

/// Role -> visible actions
const CAPABILITIES: &[(Capability, &[Role])] = &[
    (Capability::Dashboard, BOTH),
    (Capability::VideoAnalysis, BOTH),
    (Capability::LiveAnalysis, BOTH),
    (Capability::PerformanceReports, BOTH),
    (Capability::TeamOverview, &[Role::Coach]),
    (Capability::TrainingSchedule, BOTH),
    (Capability::RecordSession, &[Role::Player]),
    (Capability::Settings, BOTH),
    (Capability::SessionSummary, &[Role::Coach]),
];
