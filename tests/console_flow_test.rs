// Integration tests: polling, workflow and session handoff against an HTTP backend

use mockito::{Matcher, Server, ServerGuard};
use ndem_console::alert::{AlertKind, AlertQueue};
use ndem_console::backend::{Backend, HttpBackend};
use ndem_console::config::{ApiConfig, WorkflowConfig};
use ndem_console::polling::{CycleOutcome, Poller};
use ndem_console::session::{ReportState, ReportView, SessionStore};
use ndem_console::workflow::{AllocationWorkflow, WorkflowPhase};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn zone_json(id: &str, hazard: &str, severity: u32) -> serde_json::Value {
    json!({
        "id": id,
        "type": hazard,
        "severity": severity,
        "location": {"lat": 19.0760, "lng": 72.8777},
        "affected_population": 5000,
        "status": "Active"
    })
}

fn resource_json(id: &str) -> serde_json::Value {
    json!({
        "id": id,
        "type": "Rescue Boat",
        "location": {"lat": 18.52, "lng": 73.85},
        "capacity": 12,
        "status": "Available"
    })
}

struct Console {
    alerts: AlertQueue,
    poller: Arc<Poller>,
    workflow: Arc<AllocationWorkflow>,
    dir: TempDir,
}

fn build_console(server: &ServerGuard) -> Console {
    let backend: Arc<dyn Backend> = Arc::new(
        HttpBackend::new(&ApiConfig {
            base_url: server.url(),
            request_timeout_seconds: Some(5),
        })
        .unwrap(),
    );

    let alerts = AlertQueue::new(Duration::ZERO);
    let poller = Arc::new(Poller::new(
        Arc::clone(&backend),
        alerts.clone(),
        Duration::from_secs(5),
    ));

    let dir = TempDir::new().unwrap();
    let session =
        Arc::new(SessionStore::open(dir.path().join("session.db"), "helpDeskData").unwrap());

    let workflow = Arc::new(AllocationWorkflow::new(
        backend,
        alerts.clone(),
        Arc::clone(&poller),
        session,
        &WorkflowConfig {
            dispatch_status_clear_seconds: 5,
            reinforcement_delay_ms: 50,
        },
    ));

    Console {
        alerts,
        poller,
        workflow,
        dir,
    }
}

async fn mock_static_reads(server: &mut ServerGuard) {
    server
        .mock("GET", "/sos")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
    server
        .mock("GET", "/simulation/safe-areas")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body("[]")
        .create_async()
        .await;
}

#[tokio::test]
async fn test_new_zone_alerted_once_after_initial_load() {
    let mut server = Server::new_async().await;
    mock_static_reads(&mut server).await;

    let first = server
        .mock("GET", "/simulation/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({"zones": [zone_json("z1", "Flood", 6)], "resources": [resource_json("r1")]})
                .to_string(),
        )
        .create_async()
        .await;

    let console = build_console(&server);
    console.poller.activate();

    assert_eq!(console.poller.run_cycle().await, CycleOutcome::Completed);
    assert!(console.alerts.is_idle());

    first.remove_async().await;
    server
        .mock("GET", "/simulation/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "zones": [zone_json("z1", "Flood", 6), zone_json("z2", "Landslide", 7)],
                "resources": [resource_json("r1")]
            })
            .to_string(),
        )
        .create_async()
        .await;

    console.poller.run_cycle().await;
    console.poller.run_cycle().await;

    let alert = console.alerts.current().unwrap();
    assert_eq!(alert.title, "NEW DISASTER DETECTED");
    assert_eq!(alert.kind, AlertKind::Warning);
    assert!(alert.message.starts_with("Type: Landslide\n"));
    assert!(console.alerts.pending().is_empty());
}

#[tokio::test]
async fn test_backend_outage_keeps_loop_alive() {
    let mut server = Server::new_async().await;
    mock_static_reads(&mut server).await;

    let outage = server
        .mock("GET", "/simulation/data")
        .with_status(503)
        .with_body("maintenance")
        .create_async()
        .await;

    let console = build_console(&server);
    console.poller.activate();

    assert_eq!(console.poller.run_cycle().await, CycleOutcome::Failed);
    let dashboard = console.poller.dashboard();
    assert!(dashboard.last_error.unwrap().contains("503"));
    assert!(console.alerts.is_idle());

    outage.remove_async().await;
    server
        .mock("GET", "/simulation/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"zones": [zone_json("z1", "Fire", 4)], "resources": []}).to_string())
        .create_async()
        .await;

    // Recovery cycle is still the silent initial load
    assert_eq!(console.poller.run_cycle().await, CycleOutcome::Completed);
    assert!(console.alerts.is_idle());
}

#[tokio::test]
async fn test_plan_reinforce_dispatch_and_report() {
    let mut server = Server::new_async().await;
    mock_static_reads(&mut server).await;
    server
        .mock("GET", "/simulation/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "zones": [zone_json("z1", "Flood", 6), zone_json("z5", "Cyclone", 9)],
                "resources": [resource_json("r1")]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let console = build_console(&server);
    console.poller.activate();
    console.poller.run_cycle().await;

    // Another execution context following the same session
    let report_store =
        SessionStore::open(console.dir.path().join("session.db"), "helpDeskData").unwrap();
    let mut report = ReportView::open(&report_store).unwrap();
    assert_eq!(report.state(), &ReportState::NoActiveOperation);

    let partial = server
        .mock("POST", "/allocate")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "allocations": [{"resource_id": "r1", "zone_id": "z1", "distance_km": 14.2, "eta_minutes": 21}],
                "total_score": 0.61,
                "unserved_zones": ["z5"],
                "ai_rationale": "Nearest boat to the flood zone"
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    let plan = console.workflow.generate_plan().await.unwrap();
    assert_eq!(plan.unserved_zones, vec!["z5"]);
    partial.assert_async().await;

    let update = report_store.check_for_changes().unwrap().unwrap();
    assert!(report.apply(update));
    assert_eq!(report.rows().len(), 1);
    assert_eq!(report.rows()[0].hazard.as_deref(), Some("Flood"));

    let reinforcements = server
        .mock("POST", "/reinforcements")
        .match_body(Matcher::PartialJson(json!({"zone_ids": ["z5"]})))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    partial.remove_async().await;
    let full = server
        .mock("POST", "/allocate")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "allocations": [
                    {"resource_id": "r1", "zone_id": "z1"},
                    {"resource_id": "ndrf-1", "zone_id": "z5"}
                ],
                "total_score": 0.93,
                "unserved_zones": []
            })
            .to_string(),
        )
        .expect(1)
        .create_async()
        .await;

    assert!(console.workflow.request_reinforcements().await);
    reinforcements.assert_async().await;

    let mut waited = Duration::ZERO;
    while console
        .workflow
        .plan()
        .is_some_and(|p| !p.unserved_zones.is_empty())
    {
        assert!(waited < Duration::from_secs(5), "re-plan never happened");
        tokio::time::sleep(Duration::from_millis(20)).await;
        waited += Duration::from_millis(20);
    }
    full.assert_async().await;

    server
        .mock("POST", "/dispatch")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({"message": "2 units en route"}).to_string())
        .create_async()
        .await;

    assert!(console.workflow.dispatch().await);
    assert!(console.workflow.plan().is_none());
    assert_eq!(console.workflow.phase(), WorkflowPhase::Idle);

    let authorized = console.alerts.current().unwrap();
    assert_eq!(authorized.kind, AlertKind::Success);
    assert!(authorized
        .message
        .ends_with("AI Strategy: Resources optimized for maximum coverage and minimum ETA."));

    let update = report_store.check_for_changes().unwrap().unwrap();
    report.apply(update);
    assert!(report.rows().is_empty());
    assert_eq!(report.summary(), "No pending plan (2 units en route)");
}

#[tokio::test]
async fn test_delete_zone_round_trip() {
    let mut server = Server::new_async().await;
    mock_static_reads(&mut server).await;
    server
        .mock("GET", "/simulation/data")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "zones": [zone_json("z1", "Flood", 6)],
                "resources": [resource_json("r1"), resource_json("r2")]
            })
            .to_string(),
        )
        .create_async()
        .await;
    server
        .mock("POST", "/allocate")
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "allocations": [{"resource_id": "r1", "zone_id": "z1"}],
                "total_score": 0.5
            })
            .to_string(),
        )
        .create_async()
        .await;

    let bulk_delete = server
        .mock("POST", "/resources/bulk-delete")
        .match_body(Matcher::PartialJson(json!({"ids": ["r1", "r2"]})))
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;
    let zone_delete = server
        .mock("DELETE", "/disasters/z1")
        .with_status(200)
        .with_body("{}")
        .expect(1)
        .create_async()
        .await;

    let console = build_console(&server);
    console.poller.activate();
    console.poller.run_cycle().await;
    console.workflow.generate_plan().await.unwrap();

    console.workflow.request_delete_zone("z1").unwrap();
    assert!(!console.alerts.dismiss_outside());
    assert!(console.workflow.plan().is_some());

    assert!(console.workflow.confirm_current().await);
    bulk_delete.assert_async().await;
    zone_delete.assert_async().await;

    assert!(console.workflow.plan().is_none());
    let done = console.alerts.current().unwrap();
    assert_eq!(done.title, "Success");
}
