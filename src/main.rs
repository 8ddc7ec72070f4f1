use anyhow::{bail, Context, Result};
use ndem_console::alert::{AlertEvent, AlertQueue};
use ndem_console::backend::{Backend, HttpBackend};
use ndem_console::config::{load_config, ConsoleConfig};
use ndem_console::polling::Poller;
use ndem_console::session::{ReportView, SessionStore};
use ndem_console::workflow::AllocationWorkflow;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "ndem_console=info".into()),
        )
        .init();

    info!("NDEM console starting...");

    let config = match std::env::var("NDEM_CONFIG") {
        Ok(path) => load_config(&path)?,
        Err(_) => ConsoleConfig::default(),
    };

    let mode = std::env::var("NDEM_MODE").unwrap_or_else(|_| "console".to_string());

    info!(
        mode = %mode,
        api_url = %config.api.base_url,
        session_db = %config.session.db_path.display(),
        session_key = %config.session.key,
        "Configuration loaded"
    );

    match mode.as_str() {
        "console" => run_console(config).await,
        "report" => run_report(config).await,
        other => bail!("Unknown NDEM_MODE '{}' (expected 'console' or 'report')", other),
    }
}

/// Operator console: poll, alert, and keep the workflow ready for commands
async fn run_console(config: ConsoleConfig) -> Result<()> {
    let backend: Arc<dyn Backend> =
        Arc::new(HttpBackend::new(&config.api).context("Failed to initialize backend client")?);

    let session = Arc::new(
        SessionStore::open(&config.session.db_path, &config.session.key)
            .context("Failed to initialize session store")?,
    );
    info!(context_id = %session.context_id(), "Session store initialized");

    let alerts = AlertQueue::new(config.alerts.close_transition());
    let presenter_handle = tokio::spawn(present_alerts(
        alerts.clone(),
        Duration::from_secs(config.alerts.display_seconds),
    ));

    let poller = Arc::new(Poller::new(
        Arc::clone(&backend),
        alerts.clone(),
        config.polling.interval(),
    ));

    // Held for operator commands; the headless console only mirrors its state
    let workflow = Arc::new(AllocationWorkflow::new(
        backend,
        alerts.clone(),
        Arc::clone(&poller),
        Arc::clone(&session),
        &config.workflow,
    ));

    // Session activation
    poller.start();
    info!(phase = %workflow.phase(), "Polling started");

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for ctrl_c signal")?;
    info!("Shutdown signal received");

    // Session deactivation
    poller.stop();
    presenter_handle.abort();

    let dashboard = poller.dashboard();
    info!(
        cycles = dashboard.cycle_count,
        errors = dashboard.error_count,
        "NDEM console stopped"
    );

    Ok(())
}

/// Headless presenter: log every displayed alert and close informational
/// ones after the display time. Confirm alerts wait for the operator.
async fn present_alerts(alerts: AlertQueue, display_for: Duration) {
    let mut events = alerts.subscribe();
    loop {
        match events.recv().await {
            Ok(AlertEvent::Shown(alert)) => {
                info!(
                    alert_id = alert.id,
                    kind = %alert.kind,
                    title = %alert.title,
                    message = %alert.message,
                    "Alert"
                );
                if !alert.is_confirm() {
                    let alerts = alerts.clone();
                    tokio::spawn(async move {
                        tokio::time::sleep(display_for).await;
                        // Only close it if the operator has not already
                        if alerts.current().is_some_and(|a| a.id == alert.id) {
                            alerts.dismiss_current();
                        }
                    });
                }
            }
            Ok(AlertEvent::Closed { .. }) => {}
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                warn!(skipped = skipped, "Alert presenter lagged");
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
}

/// Report view: show the shared operation and follow changes from the console
async fn run_report(config: ConsoleConfig) -> Result<()> {
    let session = Arc::new(
        SessionStore::open(&config.session.db_path, &config.session.key)
            .context("Failed to initialize session store")?,
    );

    let mut view = ReportView::open(&session).context("Failed to read session snapshot")?;
    info!(summary = %view.summary(), "Report view opened");
    for row in view.rows() {
        info!(
            resource_id = %row.resource_id,
            zone_id = %row.zone_id,
            eta_minutes = ?row.eta_minutes,
            "Allocation"
        );
    }

    let updates = session.subscribe();
    let watcher_handle = tokio::spawn(Arc::clone(&session).run_watcher(config.session.watch_interval()));

    tokio::select! {
        _ = view.follow(updates, |view| {
            for row in view.rows() {
                info!(
                    resource_id = %row.resource_id,
                    zone_id = %row.zone_id,
                    eta_minutes = ?row.eta_minutes,
                    "Allocation"
                );
            }
        }) => {}
        result = tokio::signal::ctrl_c() => {
            result.context("Failed to listen for ctrl_c signal")?;
            info!("Shutdown signal received");
        }
    }

    watcher_handle.abort();
    info!("Report view stopped");

    Ok(())
}
