//! In-memory backend double driven by the tests.

use super::Backend;
use crate::model::{
    Allocation, AllocationPlan, DispatchReceipt, DisasterZone, HazardType, Location, Resource,
    ResourceStatus, SafeArea, SimulationData, SosSignal,
};
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::sync::Notify;

pub(crate) fn zone(id: &str, hazard: &str, severity: f64) -> DisasterZone {
    DisasterZone {
        id: id.to_string(),
        hazard: HazardType::from(hazard.to_string()),
        severity,
        location: Location { lat: 20.5937, lng: 78.9629 },
        affected_population: 1000,
        status: "Active".to_string(),
    }
}

pub(crate) fn resource(id: &str) -> Resource {
    Resource {
        id: id.to_string(),
        unit_type: "Ambulance".to_string(),
        location: Location { lat: 19.076, lng: 72.8777 },
        capacity: 10,
        status: ResourceStatus::Available,
    }
}

pub(crate) fn sos(id: &str) -> SosSignal {
    SosSignal {
        id: id.to_string(),
        signal_type: "Medical".to_string(),
        status: "Active".to_string(),
        location: None,
    }
}

pub(crate) fn plan(pairs: &[(&str, &str)], unserved: &[&str]) -> AllocationPlan {
    AllocationPlan {
        allocations: pairs
            .iter()
            .map(|(resource_id, zone_id)| Allocation {
                resource_id: resource_id.to_string(),
                zone_id: zone_id.to_string(),
                distance_km: Some(10.0),
                eta_minutes: Some(15.0),
            })
            .collect(),
        total_score: 0.9,
        unserved_zones: unserved.iter().map(|z| z.to_string()).collect(),
        ai_rationale: Some("Closest units first".to_string()),
        computation_time_ms: Some(12.0),
    }
}

/// Backend whose answers are set by the test and whose calls are recorded.
#[derive(Default)]
pub(crate) struct ScriptedBackend {
    simulation: Mutex<SimulationData>,
    sos: Mutex<Vec<SosSignal>>,
    safe_areas: Mutex<Vec<SafeArea>>,
    plans: Mutex<VecDeque<Result<AllocationPlan, String>>>,
    fail_fetch: AtomicBool,
    fail_sos_fetch: AtomicBool,
    fail_safe_areas: AtomicBool,
    fail_dispatch: AtomicBool,
    fail_deletes: AtomicBool,
    fail_reinforcements: AtomicBool,
    fail_resolve: AtomicBool,
    fetch_gate: Mutex<Option<Arc<Notify>>>,
    allocate_gate: Mutex<Option<Arc<Notify>>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedBackend {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn set_zones(&self, zones: Vec<DisasterZone>) {
        self.simulation.lock().unwrap().zones = zones;
    }

    pub(crate) fn set_resources(&self, resources: Vec<Resource>) {
        self.simulation.lock().unwrap().resources = resources;
    }

    pub(crate) fn set_sos(&self, signals: Vec<SosSignal>) {
        *self.sos.lock().unwrap() = signals;
    }

    pub(crate) fn set_safe_areas(&self, areas: Vec<SafeArea>) {
        *self.safe_areas.lock().unwrap() = areas;
    }

    /// Queue the next optimizer answer; an empty queue yields an empty plan
    pub(crate) fn push_plan(&self, plan: AllocationPlan) {
        self.plans.lock().unwrap().push_back(Ok(plan));
    }

    pub(crate) fn push_plan_failure(&self) {
        self.plans
            .lock()
            .unwrap()
            .push_back(Err("optimizer unavailable".to_string()));
    }

    pub(crate) fn fail_fetch(&self, fail: bool) {
        self.fail_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_sos_fetch(&self, fail: bool) {
        self.fail_sos_fetch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_safe_areas(&self, fail: bool) {
        self.fail_safe_areas.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_dispatch(&self, fail: bool) {
        self.fail_dispatch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_reinforcements(&self, fail: bool) {
        self.fail_reinforcements.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn fail_resolve(&self, fail: bool) {
        self.fail_resolve.store(fail, Ordering::SeqCst);
    }

    /// Hold every simulation fetch until the returned gate is notified
    pub(crate) fn gate_fetches(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.fetch_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    /// Hold every optimizer call until the returned gate is notified
    pub(crate) fn gate_allocations(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.allocate_gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls whose name starts with `prefix`
    pub(crate) fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check(flag: &AtomicBool, what: &str) -> Result<()> {
        if flag.load(Ordering::SeqCst) {
            Err(anyhow!("{} failed: backend unavailable", what))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn fetch_simulation(&self) -> Result<SimulationData> {
        self.record("fetch_simulation".to_string());
        let gate = self.fetch_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        Self::check(&self.fail_fetch, "Simulation data read")?;
        Ok(self.simulation.lock().unwrap().clone())
    }

    async fn fetch_safe_areas(&self) -> Result<Vec<SafeArea>> {
        self.record("fetch_safe_areas".to_string());
        Self::check(&self.fail_safe_areas, "Safe area read")?;
        Ok(self.safe_areas.lock().unwrap().clone())
    }

    async fn fetch_sos_signals(&self) -> Result<Vec<SosSignal>> {
        self.record("fetch_sos".to_string());
        Self::check(&self.fail_sos_fetch, "SOS read")?;
        Ok(self.sos.lock().unwrap().clone())
    }

    async fn allocate(&self, resources: &[Resource], zones: &[DisasterZone]) -> Result<AllocationPlan> {
        let zone_ids: Vec<&str> = zones.iter().map(|z| z.id.as_str()).collect();
        self.record(format!("allocate:{}:{}", resources.len(), zone_ids.join(",")));
        let gate = self.allocate_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        match self.plans.lock().unwrap().pop_front() {
            Some(Ok(plan)) => Ok(plan),
            Some(Err(message)) => Err(anyhow!(message)),
            None => Ok(plan(&[], &[])),
        }
    }

    async fn dispatch(&self, plan: &AllocationPlan) -> Result<DispatchReceipt> {
        self.record(format!("dispatch:{}", plan.unit_count()));
        Self::check(&self.fail_dispatch, "Dispatch")?;
        Ok(DispatchReceipt {
            message: format!("{} units dispatched", plan.unit_count()),
        })
    }

    async fn resolve_sos(&self, signal_id: &str) -> Result<()> {
        self.record(format!("resolve_sos:{}", signal_id));
        Self::check(&self.fail_resolve, "SOS resolve")?;
        self.sos.lock().unwrap().retain(|s| s.id != signal_id);
        Ok(())
    }

    async fn delete_zone(&self, zone_id: &str) -> Result<()> {
        self.record(format!("delete_zone:{}", zone_id));
        Self::check(&self.fail_deletes, "Zone delete")?;
        self.simulation.lock().unwrap().zones.retain(|z| z.id != zone_id);
        Ok(())
    }

    async fn delete_resources(&self, resource_ids: &[String]) -> Result<()> {
        self.record(format!("delete_resources:{}", resource_ids.join(",")));
        Self::check(&self.fail_deletes, "Bulk resource delete")?;
        self.simulation
            .lock()
            .unwrap()
            .resources
            .retain(|r| !resource_ids.contains(&r.id));
        Ok(())
    }

    async fn request_reinforcements(&self, zone_ids: &[String]) -> Result<()> {
        self.record(format!("reinforcements:{}", zone_ids.join(",")));
        Self::check(&self.fail_reinforcements, "Reinforcement request")
    }
}
