//! Session handoff between views and execution contexts.
//!
//! The workflow controller mirrors its output into a single durable key.
//! Any other view (a report screen, a second console process) reads that key
//! on startup and follows later writes.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────┐      persist()       ┌──────────────────┐
//! │  AllocationWorkflow (ctx A) │ ───────────────────▶ │  SQLite key row  │
//! └─────────────────────────────┘                      │  value+revision  │
//!                                                      └──────────────────┘
//!                                                              │ revision poll
//!                                                              ▼
//!                                  ┌─────────────────────────────────────┐
//!                                  │  SessionStore (ctx B) run_watcher() │
//!                                  │  → broadcast SessionUpdate          │
//!                                  └─────────────────────────────────────┘
//!                                                              │
//!                                                              ▼
//!                                                    ReportView::follow()
//! ```
//!
//! Writes are whole-row replaces, so an observer never sees a plan paired
//! with zone data from another write.

use crate::model::{AllocationPlan, DisasterZone, Resource};
use serde::{Deserialize, Serialize};

mod report;
mod store;

pub use report::{ReportRow, ReportState, ReportView};
pub use store::{SessionStore, SessionUpdate};


/// Operation context shared across views.
///
/// Field names match the browser console's stored payload.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    #[serde(default)]
    pub allocation_plan: Option<AllocationPlan>,
    #[serde(default)]
    pub resources: Vec<Resource>,
    #[serde(default)]
    pub zones: Vec<DisasterZone>,
    #[serde(default)]
    pub selected_zone_id: Option<String>,
    #[serde(default)]
    pub dispatch_status: Option<String>,
}
