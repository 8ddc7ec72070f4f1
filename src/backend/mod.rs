//! Simulation backend interface.
//!
//! The console treats the backend as a black box returning typed snapshots.
//! Everything that talks to it goes through the [`Backend`] trait so the
//! polling loop and the workflow controller can run against a test double.

use crate::model::{AllocationPlan, DispatchReceipt, DisasterZone, Resource, SafeArea, SimulationData, SosSignal};
use anyhow::Result;
use async_trait::async_trait;

mod http;

pub use http::HttpBackend;

#[cfg(test)]
pub(crate) mod scripted;

/// Operations consumed from the simulation backend.
///
/// Implementations are stateless: every call returns a fresh view of the
/// authoritative state or performs one mutation.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Current disaster zones and response resources
    async fn fetch_simulation(&self) -> Result<SimulationData>;

    async fn fetch_safe_areas(&self) -> Result<Vec<SafeArea>>;

    async fn fetch_sos_signals(&self) -> Result<Vec<SosSignal>>;

    /// Runs the external optimizer over the given resources and zones
    async fn allocate(&self, resources: &[Resource], zones: &[DisasterZone]) -> Result<AllocationPlan>;

    async fn dispatch(&self, plan: &AllocationPlan) -> Result<DispatchReceipt>;

    /// Marks a distress signal resolved; it should be gone from the next SOS read
    async fn resolve_sos(&self, signal_id: &str) -> Result<()>;

    async fn delete_zone(&self, zone_id: &str) -> Result<()>;

    async fn delete_resources(&self, resource_ids: &[String]) -> Result<()>;

    /// Asks for extra units to cover zones the optimizer left unserved
    async fn request_reinforcements(&self, zone_ids: &[String]) -> Result<()>;
}
