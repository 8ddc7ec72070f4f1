// Operator notifications: one alert on screen at a time, FIFO across producers

mod queue;

pub use queue::AlertQueue;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fmt;


/// Alert severity/behaviour. Only `Confirm` carries a command and blocks
/// outside-click dismissal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum AlertKind {
    Info,
    Success,
    Warning,
    Error,
    Confirm,
}

impl fmt::Display for AlertKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Info => "info",
            Self::Success => "success",
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Confirm => "confirm",
        };
        f.write_str(name)
    }
}

/// Consequential operation gated behind a confirm alert.
///
/// Captures everything needed to run the operation later, so nothing is
/// resolved against state that changed while the dialog was open.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum ConfirmAction {
    /// Remove a zone after bulk-deleting the listed resources
    DeleteZone {
        zone_id: String,
        resource_ids: Vec<String>,
    },
    DeleteResources { resource_ids: Vec<String> },
}

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Alert {
    /// Monotonic per-queue sequence number
    pub id: u64,
    pub kind: AlertKind,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<ConfirmAction>,
    pub raised_at: DateTime<Utc>,
}

impl Alert {
    pub fn is_confirm(&self) -> bool {
        self.kind == AlertKind::Confirm
    }
}

/// How the displayed alert was closed
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CloseReason {
    Dismissed,
    Confirmed,
    Cancelled,
}

/// Display transitions broadcast to presenters
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AlertEvent {
    Shown(Alert),
    Closed { id: u64, reason: CloseReason },
}
