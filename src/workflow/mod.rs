//! Allocation → dispatch state machine driven by the operator.
//!
//! ```text
//! Idle ──generate──▶ Planning ──ok──▶ Planned ──dispatch──▶ Dispatching ──ok──▶ Idle
//!                       │                │                       │
//!                       │ err            │ discard               │ err
//!                       ▼                ▼                       ▼
//!             Planned if a plan         Idle                  Planned
//!             was held, else Idle
//! ```
//!
//! Every change of plan, selection or dispatch status is mirrored into the
//! shared session as one whole snapshot. Backend failures never escape: they
//! become error alerts and the previous state is kept.

mod controller;

pub use controller::AllocationWorkflow;

use serde::Serialize;
use std::fmt;


#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowPhase {
    Idle,
    Planning,
    Planned,
    Dispatching,
}

impl WorkflowPhase {
    /// A backend call is outstanding
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Planning | Self::Dispatching)
    }
}

impl fmt::Display for WorkflowPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Idle => "idle",
            Self::Planning => "planning",
            Self::Planned => "planned",
            Self::Dispatching => "dispatching",
        };
        f.write_str(name)
    }
}
