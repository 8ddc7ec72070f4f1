use super::WorkflowPhase;
use crate::alert::{AlertKind, AlertQueue, ConfirmAction};
use crate::backend::Backend;
use crate::config::WorkflowConfig;
use crate::model::AllocationPlan;
use crate::polling::{Dashboard, DashboardObserver, Poller};
use crate::session::{SessionSnapshot, SessionStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tracing::{debug, error, info, warn};

#[derive(Debug)]
struct WorkflowState {
    phase: WorkflowPhase,
    plan: Option<AllocationPlan>,
    selected_zone_id: Option<String>,
    dispatch_status: Option<String>,
    /// Bumped whenever the dispatch status is set, so a stale clear timer is a no-op
    status_generation: u64,
    /// Deleted while a plan or dispatch call was outstanding; reset when one starts
    removed_zone_ids: HashSet<String>,
    removed_resource_ids: HashSet<String>,
    /// Last tuple written to the session
    mirrored: Option<SessionSnapshot>,
}

impl WorkflowState {
    fn enter(&mut self, phase: WorkflowPhase) {
        self.phase = phase;
        self.removed_zone_ids.clear();
        self.removed_resource_ids.clear();
    }

    fn references_removed(&self, plan: &AllocationPlan) -> bool {
        self.removed_zone_ids.iter().any(|z| plan.references_zone(z))
            || self.removed_resource_ids.iter().any(|r| plan.references_resource(r))
    }

    /// Drop a held plan that points at deleted zones or units
    fn drop_removed_plan(&mut self) -> bool {
        let stale = self
            .plan
            .as_ref()
            .is_some_and(|p| self.references_removed(p));
        if stale {
            self.plan = None;
        }
        stale
    }

    /// Apply recorded deletions to the held plan.
    ///
    /// While a plan or dispatch call is outstanding the ids stay recorded and
    /// are checked when the call returns. Otherwise a plan using them is
    /// dropped right away. Returns true if the plan was dropped.
    fn settle_removal(&mut self) -> bool {
        if self.phase.is_busy() {
            debug!(phase = %self.phase, "Deletion recorded until the outstanding call returns");
            return false;
        }
        let dropped = self.drop_removed_plan();
        if dropped {
            info!("Allocation plan referenced deleted data, dropped");
            self.phase = WorkflowPhase::Idle;
        }
        self.removed_zone_ids.clear();
        self.removed_resource_ids.clear();
        dropped
    }

    fn snapshot(&self, dashboard: Dashboard) -> SessionSnapshot {
        SessionSnapshot {
            allocation_plan: self.plan.clone(),
            resources: dashboard.resources,
            zones: dashboard.zones,
            selected_zone_id: self.selected_zone_id.clone(),
            dispatch_status: self.dispatch_status.clone(),
        }
    }
}

/// Writes the workflow tuple into the shared session.
///
/// Registered with the poller so that a held plan is re-mirrored whenever a
/// cycle brings new zones or resources.
struct SessionMirror {
    session: Arc<SessionStore>,
    state: Arc<Mutex<WorkflowState>>,
}

impl SessionMirror {
    /// Runs under the state lock so writes land in the order the changes happened
    fn write(&self, state: &mut WorkflowState, dashboard: Dashboard) {
        let snapshot = state.snapshot(dashboard);
        match self.session.persist(&snapshot) {
            Ok(revision) => {
                debug!(revision = revision, "Session snapshot mirrored");
                state.mirrored = Some(snapshot);
            }
            Err(e) => warn!(error = %e, "Failed to mirror session snapshot"),
        }
    }
}

impl DashboardObserver for SessionMirror {
    fn dashboard_committed(&self, dashboard: &Dashboard) {
        let mut state = self.state.lock().unwrap();
        if state.plan.is_none() {
            return;
        }
        let unchanged = state.mirrored.as_ref().is_some_and(|m| {
            m.allocation_plan == state.plan
                && m.zones == dashboard.zones
                && m.resources == dashboard.resources
        });
        if !unchanged {
            debug!("Dashboard changed under a held plan");
            self.write(&mut state, dashboard.clone());
        }
    }
}

/// Operator-facing controller for planning, dispatch and destructive actions.
///
/// Reads zones and resources from the poller's dashboard, calls the backend,
/// reports every outcome through the alert queue and mirrors its state into
/// the session store.
pub struct AllocationWorkflow {
    backend: Arc<dyn Backend>,
    alerts: AlertQueue,
    poller: Arc<Poller>,
    dispatch_status_clear: Duration,
    reinforcement_delay: Duration,
    state: Arc<Mutex<WorkflowState>>,
    mirror: Arc<SessionMirror>,
}

impl AllocationWorkflow {
    pub fn new(
        backend: Arc<dyn Backend>,
        alerts: AlertQueue,
        poller: Arc<Poller>,
        session: Arc<SessionStore>,
        settings: &WorkflowConfig,
    ) -> Self {
        let state = Arc::new(Mutex::new(WorkflowState {
            phase: WorkflowPhase::Idle,
            plan: None,
            selected_zone_id: None,
            dispatch_status: None,
            status_generation: 0,
            removed_zone_ids: HashSet::new(),
            removed_resource_ids: HashSet::new(),
            mirrored: None,
        }));
        let mirror = Arc::new(SessionMirror {
            session,
            state: Arc::clone(&state),
        });
        poller.observe(mirror.clone());

        Self {
            backend,
            alerts,
            poller,
            dispatch_status_clear: settings.dispatch_status_clear(),
            reinforcement_delay: settings.reinforcement_delay(),
            state,
            mirror,
        }
    }

    pub fn phase(&self) -> WorkflowPhase {
        self.lock().phase
    }

    pub fn plan(&self) -> Option<AllocationPlan> {
        self.lock().plan.clone()
    }

    pub fn selected_zone_id(&self) -> Option<String> {
        self.lock().selected_zone_id.clone()
    }

    /// Transient dispatch confirmation, cleared automatically
    pub fn dispatch_status(&self) -> Option<String> {
        self.lock().dispatch_status.clone()
    }

    /// The tuple mirrored into the shared session
    pub fn snapshot(&self) -> SessionSnapshot {
        self.lock().snapshot(self.poller.dashboard())
    }

    /// Focus planning on one zone. Unknown zones are rejected with an info alert.
    pub fn select_zone(&self, zone_id: &str) -> bool {
        if !self.poller.dashboard().zones.iter().any(|z| z.id == zone_id) {
            self.alerts
                .enqueue_info("Unknown Zone", format!("Zone {} is not in the current snapshot.", zone_id));
            return false;
        }

        let mut state = self.lock();
        state.selected_zone_id = Some(zone_id.to_string());
        debug!(zone_id = %zone_id, "Zone selected");
        self.persist(&mut state);
        true
    }

    pub fn clear_selection(&self) {
        let mut state = self.lock();
        if state.selected_zone_id.take().is_some() {
            self.persist(&mut state);
        }
    }

    /// Ask the optimizer for a plan over current resources and zones (only
    /// the selected zone if one is focused).
    ///
    /// Returns the new plan. On failure the previously held plan stays.
    pub async fn generate_plan(&self) -> Option<AllocationPlan> {
        let dashboard = self.poller.dashboard();

        let selected = {
            let mut state = self.lock();
            if state.phase.is_busy() {
                debug!(phase = %state.phase, "Workflow busy, plan request ignored");
                return None;
            }

            let selected = state.selected_zone_id.clone();
            let has_zones = dashboard
                .zones
                .iter()
                .any(|z| selected.as_deref().map_or(true, |id| z.id == id));
            if !has_zones {
                drop(state);
                self.alerts.enqueue_info(
                    "No Active Zones",
                    "There are no disaster zones to plan for.",
                );
                return None;
            }

            state.enter(WorkflowPhase::Planning);
            selected
        };

        let zones: Vec<_> = dashboard
            .zones
            .into_iter()
            .filter(|z| selected.as_deref().map_or(true, |id| z.id == id))
            .collect();

        info!(
            zones = zones.len(),
            resources = dashboard.resources.len(),
            "Requesting allocation plan"
        );

        match self.backend.allocate(&dashboard.resources, &zones).await {
            Ok(plan) => {
                info!(
                    units = plan.unit_count(),
                    score = plan.total_score,
                    unserved = plan.unserved_zones.len(),
                    "Allocation plan ready"
                );
                let mut state = self.lock();
                if state.references_removed(&plan) {
                    warn!(
                        zones = ?state.removed_zone_ids,
                        resources = ?state.removed_resource_ids,
                        "Allocation plan references data deleted during planning, dropped"
                    );
                    let held_stale = state.drop_removed_plan();
                    state.phase = if state.plan.is_some() {
                        WorkflowPhase::Planned
                    } else {
                        WorkflowPhase::Idle
                    };
                    if held_stale {
                        self.persist(&mut state);
                    }
                    drop(state);
                    self.alerts.enqueue_info(
                        "Plan Outdated",
                        "Zones or units were removed while planning. Generate a new plan.",
                    );
                    return None;
                }
                state.plan = Some(plan.clone());
                state.phase = WorkflowPhase::Planned;
                self.persist(&mut state);
                Some(plan)
            }
            Err(e) => {
                error!(error = %e, "Allocation failed");
                {
                    let mut state = self.lock();
                    if state.drop_removed_plan() {
                        self.persist(&mut state);
                    }
                    state.phase = if state.plan.is_some() {
                        WorkflowPhase::Planned
                    } else {
                        WorkflowPhase::Idle
                    };
                }
                self.alerts.enqueue_alert(
                    "Allocation Failed",
                    "System was unable to calculate an optimal allocation plan at this time.",
                    AlertKind::Error,
                );
                None
            }
        }
    }

    /// Commit the held plan.
    ///
    /// On success the plan is cleared, a dispatch status is shown for a while
    /// and the snapshot is reloaded. On failure the plan stays for a retry.
    pub async fn dispatch(self: &Arc<Self>) -> bool {
        let plan = {
            let mut state = self.lock();
            if state.phase.is_busy() {
                debug!(phase = %state.phase, "Workflow busy, dispatch ignored");
                return false;
            }
            let Some(plan) = state.plan.clone() else {
                drop(state);
                self.alerts
                    .enqueue_info("No Plan", "Generate an allocation plan before dispatching.");
                return false;
            };
            state.enter(WorkflowPhase::Dispatching);
            plan
        };

        info!(units = plan.unit_count(), "Dispatching allocation plan");

        let receipt = match self.backend.dispatch(&plan).await {
            Ok(receipt) => receipt,
            Err(e) => {
                error!(error = %e, "Dispatch failed");
                {
                    let mut state = self.lock();
                    if state.drop_removed_plan() {
                        info!("Allocation plan referenced data deleted during dispatch, dropped");
                        state.phase = WorkflowPhase::Idle;
                        self.persist(&mut state);
                    } else {
                        state.phase = WorkflowPhase::Planned;
                    }
                }
                self.alerts.enqueue_alert(
                    "Dispatch Failed",
                    "The dispatch command could not be processed. Please check unit status.",
                    AlertKind::Error,
                );
                return false;
            }
        };

        let generation = {
            let mut state = self.lock();
            state.plan = None;
            state.phase = WorkflowPhase::Idle;
            state.dispatch_status = Some(receipt.message.clone());
            state.status_generation += 1;
            self.persist(&mut state);
            state.status_generation
        };

        info!(units = plan.unit_count(), message = %receipt.message, "Dispatch authorized");
        self.alerts.enqueue_alert(
            "🚀 MISSION AUTHORIZED",
            format!(
                "Successfully dispatched {} units to active disaster zones.\n\nAI Strategy: {}",
                plan.unit_count(),
                plan.rationale()
            ),
            AlertKind::Success,
        );

        let workflow = Arc::clone(self);
        let clear_after = self.dispatch_status_clear;
        tokio::spawn(async move {
            tokio::time::sleep(clear_after).await;
            let mut state = workflow.lock();
            if state.status_generation == generation && state.dispatch_status.is_some() {
                state.dispatch_status = None;
                workflow.persist(&mut state);
                debug!("Dispatch status cleared");
            }
        });

        self.poller.refresh().await;
        true
    }

    /// Drop the held plan without side effects
    pub fn discard(&self) -> bool {
        let mut state = self.lock();
        if state.phase.is_busy() || state.plan.is_none() {
            return false;
        }
        state.plan = None;
        state.phase = WorkflowPhase::Idle;
        info!("Allocation plan discarded");
        self.persist(&mut state);
        true
    }

    /// Request reserve units for the plan's unserved zones, then re-plan once
    /// after the configured delay.
    pub async fn request_reinforcements(self: &Arc<Self>) -> bool {
        let unserved = {
            let state = self.lock();
            if state.phase.is_busy() {
                debug!(phase = %state.phase, "Workflow busy, reinforcement request ignored");
                return false;
            }
            state
                .plan
                .as_ref()
                .map(|p| p.unserved_zones.clone())
                .unwrap_or_default()
        };

        if unserved.is_empty() {
            self.alerts.enqueue_info(
                "No Unserved Zones",
                "Every zone in the current plan is covered.",
            );
            return false;
        }

        info!(zones = ?unserved, "Requesting reinforcements");

        if let Err(e) = self.backend.request_reinforcements(&unserved).await {
            error!(error = %e, "Reinforcement request failed");
            self.alerts.enqueue_alert(
                "Reinforcement Failed",
                "National reserve units could not be requested. Please try again.",
                AlertKind::Error,
            );
            return false;
        }

        let workflow = Arc::clone(self);
        let delay = self.reinforcement_delay;
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let phase = workflow.phase();
            if phase.is_busy() {
                warn!(phase = %phase, "Workflow busy, re-plan with reinforcements dropped");
                return;
            }
            info!("Re-planning with reinforcements");
            workflow.generate_plan().await;
        });

        true
    }

    /// Ask the operator to confirm deleting a zone along with every known resource.
    ///
    /// Returns the confirm alert id.
    pub fn request_delete_zone(&self, zone_id: &str) -> Option<u64> {
        let dashboard = self.poller.dashboard();
        let Some(zone) = dashboard.zones.iter().find(|z| z.id == zone_id) else {
            self.alerts
                .enqueue_info("Unknown Zone", format!("Zone {} is not in the current snapshot.", zone_id));
            return None;
        };

        let resource_ids = dashboard.resources.iter().map(|r| r.id.clone()).collect();
        let id = self.alerts.enqueue_confirm(
            "⚠️ DELETE ALERT?",
            format!(
                "Type: {}\nSeverity: {}\n\nThis will remove the disaster alert and trigger resource cleanup. Continue?",
                zone.hazard, zone.severity
            ),
            ConfirmAction::DeleteZone {
                zone_id: zone.id.clone(),
                resource_ids,
            },
        );
        Some(id)
    }

    pub fn request_delete_resources(&self, resource_ids: Vec<String>) -> Option<u64> {
        if resource_ids.is_empty() {
            self.alerts
                .enqueue_info("Nothing Selected", "Select at least one unit to remove.");
            return None;
        }

        let id = self.alerts.enqueue_confirm(
            "⚠️ DELETE UNITS?",
            format!(
                "{} units will be removed from the simulation. Continue?",
                resource_ids.len()
            ),
            ConfirmAction::DeleteResources { resource_ids },
        );
        Some(id)
    }

    /// Accept the displayed confirm alert and run its command.
    ///
    /// Returns false if nothing confirmable was displayed or the command failed.
    pub async fn confirm_current(&self) -> bool {
        match self.alerts.confirm_current() {
            Some(action) => self.execute(action).await,
            None => false,
        }
    }

    async fn execute(&self, action: ConfirmAction) -> bool {
        match action {
            ConfirmAction::DeleteZone {
                zone_id,
                resource_ids,
            } => {
                info!(zone_id = %zone_id, resources = resource_ids.len(), "Deleting zone");
                let result = async {
                    if !resource_ids.is_empty() {
                        self.backend.delete_resources(&resource_ids).await?;
                    }
                    self.backend.delete_zone(&zone_id).await
                }
                .await;

                if let Err(e) = result {
                    error!(zone_id = %zone_id, error = %e, "Zone delete failed");
                    self.alerts.enqueue_alert(
                        "Error",
                        "Failed to remove data. Please try again.",
                        AlertKind::Error,
                    );
                    return false;
                }

                {
                    let mut state = self.lock();
                    state.removed_zone_ids.insert(zone_id.clone());
                    state.removed_resource_ids.extend(resource_ids.iter().cloned());
                    state.settle_removal();
                    if state.selected_zone_id.as_deref() == Some(zone_id.as_str()) {
                        state.selected_zone_id = None;
                    }
                    self.persist(&mut state);
                }

                self.poller.refresh().await;
                self.alerts.enqueue_alert(
                    "Success",
                    "Incident and related resources have been removed.",
                    AlertKind::Success,
                );
                true
            }
            ConfirmAction::DeleteResources { resource_ids } => {
                info!(resources = resource_ids.len(), "Deleting resources");
                if let Err(e) = self.backend.delete_resources(&resource_ids).await {
                    error!(error = %e, "Bulk resource delete failed");
                    self.alerts.enqueue_alert(
                        "Error",
                        "Failed to remove units. Please try again.",
                        AlertKind::Error,
                    );
                    return false;
                }

                {
                    let mut state = self.lock();
                    state.removed_resource_ids.extend(resource_ids.iter().cloned());
                    if state.settle_removal() {
                        self.persist(&mut state);
                    }
                }

                self.poller.refresh().await;
                self.alerts.enqueue_alert(
                    "Success",
                    format!("{} units have been removed.", resource_ids.len()),
                    AlertKind::Success,
                );
                true
            }
        }
    }

    /// Mark an SOS signal handled and reload
    pub async fn resolve_sos(&self, signal_id: &str) -> bool {
        if let Err(e) = self.backend.resolve_sos(signal_id).await {
            error!(sos_id = %signal_id, error = %e, "Failed to resolve SOS");
            self.alerts
                .enqueue_alert("Error", "Failed to resolve SOS signal.", AlertKind::Error);
            return false;
        }

        info!(sos_id = %signal_id, "SOS resolved");
        self.poller.refresh().await;
        self.alerts.enqueue_alert(
            "SOS RESOLVED",
            "Emergency signal cleared from tactical display.",
            AlertKind::Success,
        );
        true
    }

    fn lock(&self) -> MutexGuard<'_, WorkflowState> {
        self.state.lock().unwrap()
    }

    /// Mirror the state into the shared session
    fn persist(&self, state: &mut WorkflowState) {
        self.mirror.write(state, self.poller.dashboard());
    }
}
