use super::{SessionSnapshot, SessionStore, SessionUpdate};
use anyhow::Result;
use tokio::sync::broadcast;
use tracing::{info, warn};

/// What a report screen shows
#[derive(Clone, Debug, PartialEq)]
pub enum ReportState {
    /// Nothing was ever stored under the session key
    NoActiveOperation,
    Operation(SessionSnapshot),
}

/// One allocation joined with its resource and zone details
#[derive(Clone, Debug, PartialEq)]
pub struct ReportRow {
    pub resource_id: String,
    pub resource_type: Option<String>,
    pub zone_id: String,
    pub hazard: Option<String>,
    pub distance_km: Option<f64>,
    pub eta_minutes: Option<f64>,
}

/// Standalone view over the shared session (the help-desk report screen).
///
/// Starts from whatever is stored, then follows writes from other contexts.
pub struct ReportView {
    state: ReportState,
    revision: Option<i64>,
}

impl ReportView {
    /// Read the stored snapshot as initial state
    pub fn open(store: &SessionStore) -> Result<Self> {
        let state = match store.load()? {
            Some(snapshot) => ReportState::Operation(snapshot),
            None => ReportState::NoActiveOperation,
        };
        Ok(Self {
            state,
            revision: None,
        })
    }

    pub fn state(&self) -> &ReportState {
        &self.state
    }

    /// Revision of the last applied cross-context update
    pub fn revision(&self) -> Option<i64> {
        self.revision
    }

    /// Replace the displayed state with a newer snapshot. Stale revisions are ignored.
    pub fn apply(&mut self, update: SessionUpdate) -> bool {
        if self.revision.is_some_and(|seen| update.revision <= seen) {
            return false;
        }
        self.revision = Some(update.revision);
        self.state = ReportState::Operation(update.snapshot);
        true
    }

    pub fn rows(&self) -> Vec<ReportRow> {
        let ReportState::Operation(snapshot) = &self.state else {
            return Vec::new();
        };
        let Some(plan) = &snapshot.allocation_plan else {
            return Vec::new();
        };

        plan.allocations
            .iter()
            .map(|alloc| ReportRow {
                resource_id: alloc.resource_id.clone(),
                resource_type: snapshot
                    .resources
                    .iter()
                    .find(|r| r.id == alloc.resource_id)
                    .map(|r| r.unit_type.clone()),
                zone_id: alloc.zone_id.clone(),
                hazard: snapshot
                    .zones
                    .iter()
                    .find(|z| z.id == alloc.zone_id)
                    .map(|z| z.hazard.to_string()),
                distance_km: alloc.distance_km,
                eta_minutes: alloc.eta_minutes,
            })
            .collect()
    }

    /// One-line status for logs and headless display
    pub fn summary(&self) -> String {
        match &self.state {
            ReportState::NoActiveOperation => "No active operation".to_string(),
            ReportState::Operation(snapshot) => match &snapshot.allocation_plan {
                Some(plan) => {
                    let mut line = format!(
                        "Plan: {} units, score {:.2}, {} unserved zones",
                        plan.unit_count(),
                        plan.total_score,
                        plan.unserved_zones.len()
                    );
                    if let Some(zone_id) = &snapshot.selected_zone_id {
                        line.push_str(&format!(", focus {}", zone_id));
                    }
                    line
                }
                None => match &snapshot.dispatch_status {
                    Some(status) => format!("No pending plan ({})", status),
                    None => "No pending plan".to_string(),
                },
            },
        }
    }

    /// Apply updates until the channel closes, calling `on_change` after each one
    pub async fn follow<F>(&mut self, mut updates: broadcast::Receiver<SessionUpdate>, mut on_change: F)
    where
        F: FnMut(&ReportView),
    {
        loop {
            match updates.recv().await {
                Ok(update) => {
                    if self.apply(update) {
                        info!(revision = ?self.revision, summary = %self.summary(), "Report updated");
                        on_change(self);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // Only the newest snapshot matters; the next recv delivers it
                    warn!(skipped = skipped, "Report view lagged, skipped updates");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}
