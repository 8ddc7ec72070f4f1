use serde::{Deserialize, Serialize};
use std::fmt;

/// Rationale shown when the optimizer does not explain its plan
pub const DEFAULT_RATIONALE: &str = "Resources optimized for maximum coverage and minimum ETA.";

/// Geographic position (WGS84 degrees)
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub lat: f64,
    pub lng: f64,
}

/// Hazard category reported by the backend.
///
/// Unknown categories are kept verbatim so a newer backend never breaks polling.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum HazardType {
    Flood,
    Cyclone,
    Earthquake,
    Landslide,
    HeatWave,
    Drought,
    Fire,
    Other(String),
}

impl From<String> for HazardType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Flood" => Self::Flood,
            "Cyclone" => Self::Cyclone,
            "Earthquake" => Self::Earthquake,
            "Landslide" => Self::Landslide,
            "Heat Wave" | "HeatWave" => Self::HeatWave,
            "Drought" => Self::Drought,
            "Fire" => Self::Fire,
            _ => Self::Other(value),
        }
    }
}

impl From<HazardType> for String {
    fn from(value: HazardType) -> Self {
        value.to_string()
    }
}

impl fmt::Display for HazardType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Flood => "Flood",
            Self::Cyclone => "Cyclone",
            Self::Earthquake => "Earthquake",
            Self::Landslide => "Landslide",
            Self::HeatWave => "Heat Wave",
            Self::Drought => "Drought",
            Self::Fire => "Fire",
            Self::Other(name) => name,
        };
        f.write_str(name)
    }
}

/// Operational state of a response unit
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ResourceStatus {
    Available,
    Deployed,
    Returning,
    EnRoute,
    Other(String),
}

impl From<String> for ResourceStatus {
    fn from(value: String) -> Self {
        match value.as_str() {
            "Available" => Self::Available,
            "Deployed" => Self::Deployed,
            "Returning" => Self::Returning,
            "EnRoute" | "En Route" => Self::EnRoute,
            _ => Self::Other(value),
        }
    }
}

impl From<ResourceStatus> for String {
    fn from(value: ResourceStatus) -> Self {
        match value {
            ResourceStatus::Available => "Available".to_string(),
            ResourceStatus::Deployed => "Deployed".to_string(),
            ResourceStatus::Returning => "Returning".to_string(),
            ResourceStatus::EnRoute => "EnRoute".to_string(),
            ResourceStatus::Other(status) => status,
        }
    }
}

/// Reported disaster incident. Owned by the backend; the console only observes it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DisasterZone {
    /// Stable, unique zone identifier
    pub id: String,

    #[serde(rename = "type")]
    pub hazard: HazardType,

    /// Higher is worse
    pub severity: f64,

    pub location: Location,

    #[serde(default)]
    pub affected_population: u64,

    /// Free-form operational tag (e.g. "Processing")
    #[serde(default)]
    pub status: String,
}

/// Deployable response unit (vehicle or team)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,

    #[serde(rename = "type")]
    pub unit_type: String,

    pub location: Location,

    #[serde(default)]
    pub capacity: u32,

    pub status: ResourceStatus,
}

/// Individual distress call, distinct from a zone
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SosSignal {
    pub id: String,

    #[serde(rename = "type")]
    pub signal_type: String,

    pub status: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SafeArea {
    pub id: String,

    #[serde(default)]
    pub name: String,

    pub location: Location,

    #[serde(default)]
    pub capacity: u32,
}

/// Zones and resources as returned by one snapshot read
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimulationData {
    #[serde(default)]
    pub zones: Vec<DisasterZone>,

    #[serde(default)]
    pub resources: Vec<Resource>,
}

/// Single resource-to-zone assignment inside a plan
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Allocation {
    pub resource_id: String,
    pub zone_id: String,

    #[serde(default)]
    pub distance_km: Option<f64>,

    #[serde(default)]
    pub eta_minutes: Option<f64>,
}

/// Optimizer output. Replaced wholesale on recompute, never patched in place.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AllocationPlan {
    pub allocations: Vec<Allocation>,

    /// Quality metric, higher is better
    pub total_score: f64,

    /// Zones the optimizer could not cover
    #[serde(default)]
    pub unserved_zones: Vec<String>,

    #[serde(default)]
    pub ai_rationale: Option<String>,

    /// How long the optimizer took, in milliseconds
    #[serde(default)]
    pub computation_time_ms: Option<f64>,
}

impl AllocationPlan {
    /// Number of units the plan would dispatch
    pub fn unit_count(&self) -> usize {
        self.allocations.len()
    }

    pub fn rationale(&self) -> &str {
        match self.ai_rationale.as_deref() {
            Some(text) if !text.trim().is_empty() => text,
            _ => DEFAULT_RATIONALE,
        }
    }

    /// True if any allocation targets the zone or the zone is listed as unserved
    pub fn references_zone(&self, zone_id: &str) -> bool {
        self.allocations.iter().any(|a| a.zone_id == zone_id)
            || self.unserved_zones.iter().any(|z| z == zone_id)
    }

    pub fn references_resource(&self, resource_id: &str) -> bool {
        self.allocations.iter().any(|a| a.resource_id == resource_id)
    }
}

/// Backend acknowledgement of a dispatch
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DispatchReceipt {
    pub message: String,
}

/// Anything carrying a stable identifier, for novelty tracking
pub trait Identified {
    fn id(&self) -> &str;
}

impl Identified for DisasterZone {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for SosSignal {
    fn id(&self) -> &str {
        &self.id
    }
}

impl Identified for Resource {
    fn id(&self) -> &str {
        &self.id
    }
}
