use super::Backend;
use crate::config::ApiConfig;
use crate::model::{
    AllocationPlan, DispatchReceipt, DisasterZone, Resource, SafeArea, SimulationData, SosSignal,
};
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct AllocateRequest<'a> {
    resources: &'a [Resource],
    zones: &'a [DisasterZone],
}

#[derive(Serialize)]
struct BulkDeleteRequest<'a> {
    ids: &'a [String],
}

#[derive(Serialize)]
struct ReinforcementRequest<'a> {
    zone_ids: &'a [String],
}

/// JSON-over-HTTP client for the simulation backend.
pub struct HttpBackend {
    http_client: Client,
    base_url: String,
}

impl HttpBackend {
    /// Build a client from the `[api]` configuration section.
    pub fn new(config: &ApiConfig) -> Result<Self> {
        let mut builder = Client::builder().user_agent("ndem-console/0.1");
        if let Some(secs) = config.request_timeout_seconds {
            builder = builder.timeout(Duration::from_secs(secs));
        }
        let http_client = builder.build().context("Failed to build HTTP client")?;

        Ok(Self {
            http_client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

/// Turn a non-2xx response into an error carrying status and body.
async fn ensure_success(response: Response, operation: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read body>".to_string());
    anyhow::bail!("{} failed with status {}: {}", operation, status, body);
}

#[async_trait]
impl Backend for HttpBackend {
    async fn fetch_simulation(&self) -> Result<SimulationData> {
        let response = self
            .http_client
            .get(self.url("/simulation/data"))
            .send()
            .await
            .context("Failed to send simulation data request")?;

        ensure_success(response, "Simulation data read")
            .await?
            .json::<SimulationData>()
            .await
            .context("Failed to parse simulation data response")
    }

    async fn fetch_safe_areas(&self) -> Result<Vec<SafeArea>> {
        let response = self
            .http_client
            .get(self.url("/simulation/safe-areas"))
            .send()
            .await
            .context("Failed to send safe area request")?;

        ensure_success(response, "Safe area read")
            .await?
            .json::<Vec<SafeArea>>()
            .await
            .context("Failed to parse safe area response")
    }

    async fn fetch_sos_signals(&self) -> Result<Vec<SosSignal>> {
        let response = self
            .http_client
            .get(self.url("/sos"))
            .send()
            .await
            .context("Failed to send SOS request")?;

        ensure_success(response, "SOS read")
            .await?
            .json::<Vec<SosSignal>>()
            .await
            .context("Failed to parse SOS response")
    }

    async fn allocate(&self, resources: &[Resource], zones: &[DisasterZone]) -> Result<AllocationPlan> {
        debug!(
            resources = resources.len(),
            zones = zones.len(),
            "Requesting allocation plan"
        );
        let response = self
            .http_client
            .post(self.url("/allocate"))
            .json(&AllocateRequest { resources, zones })
            .send()
            .await
            .context("Failed to send allocation request")?;

        ensure_success(response, "Allocation")
            .await?
            .json::<AllocationPlan>()
            .await
            .context("Failed to parse allocation plan")
    }

    async fn dispatch(&self, plan: &AllocationPlan) -> Result<DispatchReceipt> {
        let response = self
            .http_client
            .post(self.url("/dispatch"))
            .json(plan)
            .send()
            .await
            .context("Failed to send dispatch request")?;

        ensure_success(response, "Dispatch")
            .await?
            .json::<DispatchReceipt>()
            .await
            .context("Failed to parse dispatch response")
    }

    async fn resolve_sos(&self, signal_id: &str) -> Result<()> {
        let path = format!("/sos/{}/resolve", urlencoding::encode(signal_id));
        let response = self
            .http_client
            .post(self.url(&path))
            .send()
            .await
            .context("Failed to send SOS resolve request")?;

        ensure_success(response, "SOS resolve").await?;
        Ok(())
    }

    async fn delete_zone(&self, zone_id: &str) -> Result<()> {
        let path = format!("/disasters/{}", urlencoding::encode(zone_id));
        let response = self
            .http_client
            .delete(self.url(&path))
            .send()
            .await
            .context("Failed to send zone delete request")?;

        ensure_success(response, "Zone delete").await?;
        Ok(())
    }

    async fn delete_resources(&self, resource_ids: &[String]) -> Result<()> {
        let response = self
            .http_client
            .post(self.url("/resources/bulk-delete"))
            .json(&BulkDeleteRequest { ids: resource_ids })
            .send()
            .await
            .context("Failed to send bulk resource delete request")?;

        ensure_success(response, "Bulk resource delete").await?;
        Ok(())
    }

    async fn request_reinforcements(&self, zone_ids: &[String]) -> Result<()> {
        let response = self
            .http_client
            .post(self.url("/reinforcements"))
            .json(&ReinforcementRequest { zone_ids })
            .send()
            .await
            .context("Failed to send reinforcement request")?;

        ensure_success(response, "Reinforcement request").await?;
        Ok(())
    }
}
