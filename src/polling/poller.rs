use crate::alert::{AlertKind, AlertQueue};
use crate::backend::Backend;
use crate::model::{DisasterZone, Resource, SafeArea, SosSignal};
use crate::tracking::KnownIds;
use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Latest observed backend state, as shown on the operations dashboard.
#[derive(Clone, Debug, Default)]
pub struct Dashboard {
    pub zones: Vec<DisasterZone>,
    pub resources: Vec<Resource>,
    pub sos_signals: Vec<SosSignal>,
    pub safe_areas: Vec<SafeArea>,
    /// Forced on whenever a new SOS signal shows up
    pub sos_overlay_visible: bool,
    /// Last successful sync timestamp
    pub last_sync: Option<DateTime<Utc>>,
    /// Last fetch error message (cleared on success)
    pub last_error: Option<String>,
    pub cycle_count: u64,
    pub error_count: u64,
}

/// What happened to one polling cycle
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CycleOutcome {
    Completed,
    /// Another cycle was already in flight
    Skipped,
    /// A snapshot fetch failed; nothing was detected or alerted
    Failed,
    /// Polling was stopped while the cycle was in flight; results dropped
    Discarded,
    /// A manual refresh arrived mid-cycle; the running cycle fetches once more
    Queued,
}

/// Notified synchronously after every completed cycle, outside the dashboard lock
pub trait DashboardObserver: Send + Sync {
    fn dashboard_committed(&self, dashboard: &Dashboard);
}

struct Trackers {
    zones: KnownIds,
    sos: KnownIds,
}

/// Releases the single-flight flag when the cycle ends or its task is aborted
struct FlightGuard<'a>(&'a AtomicBool);

impl<'a> FlightGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

/// Polling loop for the operator session.
///
/// # Responsibilities
/// - Drive fetch → detect → alert cycles on a fixed interval
/// - Keep one remembered-id set per tracked kind
/// - Maintain the dashboard read model
/// - Start/stop with the operator session
pub struct Poller {
    backend: Arc<dyn Backend>,
    alerts: AlertQueue,
    poll_interval: Duration,
    trackers: Mutex<Trackers>,
    dashboard: Mutex<Dashboard>,
    in_flight: AtomicBool,
    /// Set by a refresh that found a cycle in flight; cleared when a cycle starts
    reload_requested: AtomicBool,
    active: AtomicBool,
    /// Bumped on every start/stop; a cycle only commits under the epoch it began in
    epoch: AtomicU64,
    handle: Mutex<Option<JoinHandle<()>>>,
    observers: Mutex<Vec<Arc<dyn DashboardObserver>>>,
}

impl Poller {
    pub fn new(backend: Arc<dyn Backend>, alerts: AlertQueue, poll_interval: Duration) -> Self {
        Self {
            backend,
            alerts,
            poll_interval,
            trackers: Mutex::new(Trackers {
                zones: KnownIds::new("zone"),
                sos: KnownIds::new("sos"),
            }),
            dashboard: Mutex::new(Dashboard::default()),
            in_flight: AtomicBool::new(false),
            reload_requested: AtomicBool::new(false),
            active: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            handle: Mutex::new(None),
            observers: Mutex::new(Vec::new()),
        }
    }

    /// Register an observer for committed dashboard updates
    pub fn observe(&self, observer: Arc<dyn DashboardObserver>) {
        self.observers.lock().unwrap().push(observer);
    }

    /// Snapshot of the dashboard read model
    pub fn dashboard(&self) -> Dashboard {
        self.dashboard.lock().unwrap().clone()
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    /// Operator toggle for the SOS overlay
    pub fn set_sos_overlay(&self, visible: bool) {
        self.dashboard.lock().unwrap().sos_overlay_visible = visible;
    }

    /// Activate polling (non-blocking).
    ///
    /// Spawns the loop: one cycle right away, then one per interval. Missed
    /// ticks are skipped rather than bursted. Restarting aborts any previous loop.
    pub fn start(self: &Arc<Self>) {
        let mut handle = self.handle.lock().unwrap();
        if let Some(old) = handle.take() {
            old.abort();
        }

        self.activate();

        let poller = Arc::clone(self);
        *handle = Some(tokio::spawn(async move {
            info!(
                interval_secs = poller.poll_interval.as_secs(),
                "Starting polling loop"
            );

            let mut ticker = interval(poller.poll_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

            loop {
                // First tick completes immediately
                ticker.tick().await;
                poller.run_cycle().await;
            }
        }));
    }

    /// Mark the session active without a timer; cycles then run only
    /// through [`refresh`](Self::refresh) or [`run_cycle`](Self::run_cycle).
    pub fn activate(&self) {
        self.epoch.fetch_add(1, Ordering::SeqCst);
        self.active.store(true, Ordering::SeqCst);
    }

    /// Deactivate polling.
    ///
    /// Stops the timer, makes any in-flight cycle discard its results and
    /// forgets remembered ids so the next activation starts with a silent
    /// initial load. Alerts already queued stay queued.
    pub fn stop(&self) {
        self.active.store(false, Ordering::SeqCst);
        self.epoch.fetch_add(1, Ordering::SeqCst);

        if let Some(handle) = self.handle.lock().unwrap().take() {
            handle.abort();
        }

        let mut trackers = self.trackers.lock().unwrap();
        trackers.zones.reset();
        trackers.sos.reset();

        info!("Polling stopped");
    }

    /// Out-of-band reload (after dispatch, delete, resolve).
    ///
    /// Always leads to a fetch that starts after this call. If a cycle is
    /// already in flight, that cycle runs once more before releasing the
    /// single-flight guard and this returns [`CycleOutcome::Queued`].
    /// Any number of refreshes during one cycle fold into one follow-up.
    pub async fn refresh(&self) -> CycleOutcome {
        self.reload_requested.store(true, Ordering::SeqCst);
        match self.run_cycle().await {
            CycleOutcome::Skipped => {
                debug!("Polling cycle in flight, reload queued");
                CycleOutcome::Queued
            }
            outcome => outcome,
        }
    }

    /// Run one fetch → detect → alert cycle, plus one follow-up pass if a
    /// refresh was requested while it ran. Ticks arriving mid-cycle are
    /// skipped, never queued.
    pub async fn run_cycle(&self) -> CycleOutcome {
        let mut outcome = CycleOutcome::Skipped;
        loop {
            let Some(flight) = FlightGuard::acquire(&self.in_flight) else {
                if outcome == CycleOutcome::Skipped {
                    debug!("Polling cycle already in flight, skipping");
                }
                return outcome;
            };

            self.reload_requested.store(false, Ordering::SeqCst);
            outcome = self.cycle_once().await;
            drop(flight);

            // Read after releasing the guard so a racing refresh is never lost
            if outcome == CycleOutcome::Discarded
                || !self.reload_requested.load(Ordering::SeqCst)
            {
                return outcome;
            }
            debug!("Running queued reload");
        }
    }

    async fn cycle_once(&self) -> CycleOutcome {
        let epoch = self.epoch.load(Ordering::SeqCst);

        let fetched = tokio::try_join!(
            self.backend.fetch_simulation(),
            self.backend.fetch_sos_signals()
        );

        let (data, signals) = match fetched {
            Ok(snapshots) => snapshots,
            Err(e) => {
                if !self.is_current(epoch) {
                    return CycleOutcome::Discarded;
                }
                warn!(error = %e, "Snapshot fetch failed, skipping detection");
                let mut dashboard = self.dashboard.lock().unwrap();
                dashboard.last_error = Some(e.to_string());
                dashboard.error_count += 1;
                return CycleOutcome::Failed;
            }
        };

        let new_sos = {
            let mut trackers = self.trackers.lock().unwrap();
            if !self.is_current(epoch) {
                debug!("Polling stopped mid-cycle, discarding snapshot");
                return CycleOutcome::Discarded;
            }

            let zone_changes = trackers.zones.observe(&data.zones);
            for zone_id in &zone_changes.new_ids {
                if let Some(zone) = data.zones.iter().find(|z| &z.id == zone_id) {
                    info!(zone_id = %zone.id, hazard = %zone.hazard, severity = zone.severity, "New disaster zone");
                    self.alerts.enqueue_alert(
                        "NEW DISASTER DETECTED",
                        format!(
                            "Type: {}\nLocation: [{:.2}, {:.2}]\nSeverity: Level {}",
                            zone.hazard, zone.location.lat, zone.location.lng, zone.severity
                        ),
                        AlertKind::Warning,
                    );
                }
            }
            if !zone_changes.removed_ids.is_empty() {
                debug!(removed = ?zone_changes.removed_ids, "Zones no longer reported");
            }

            let sos_changes = trackers.sos.observe(&signals);
            for signal_id in &sos_changes.new_ids {
                if let Some(signal) = signals.iter().find(|s| &s.id == signal_id) {
                    info!(sos_id = %signal.id, signal_type = %signal.signal_type, "New SOS signal");
                    self.alerts.enqueue_alert(
                        "🚨 CRITICAL SOS ACTIVATION",
                        format!(
                            "Type: {}\nStatus: {}\n\nImmediate deployment recommended.",
                            signal.signal_type, signal.status
                        ),
                        AlertKind::Error,
                    );
                }
            }
            if !sos_changes.removed_ids.is_empty() {
                debug!(removed = ?sos_changes.removed_ids, "SOS signals no longer reported");
            }

            !sos_changes.new_ids.is_empty()
        };

        let safe_areas = match self.backend.fetch_safe_areas().await {
            Ok(areas) => Some(areas),
            Err(e) => {
                // Display-only data; keep the previous list
                warn!(error = %e, "Safe area fetch failed");
                None
            }
        };

        if !self.is_current(epoch) {
            debug!("Polling stopped mid-cycle, discarding dashboard update");
            return CycleOutcome::Discarded;
        }

        let committed = {
            let mut dashboard = self.dashboard.lock().unwrap();
            debug!(
                zones = data.zones.len(),
                resources = data.resources.len(),
                sos = signals.len(),
                "Polling cycle completed"
            );
            dashboard.zones = data.zones;
            dashboard.resources = data.resources;
            dashboard.sos_signals = signals;
            if let Some(areas) = safe_areas {
                dashboard.safe_areas = areas;
            }
            if new_sos {
                dashboard.sos_overlay_visible = true;
            }
            dashboard.last_sync = Some(Utc::now());
            dashboard.last_error = None;
            dashboard.cycle_count += 1;
            dashboard.clone()
        };

        // Still inside the single-flight guard, so observers see commits in order
        let observers = self.observers.lock().unwrap().clone();
        for observer in observers {
            observer.dashboard_committed(&committed);
        }

        CycleOutcome::Completed
    }

    fn is_current(&self, epoch: u64) -> bool {
        self.active.load(Ordering::SeqCst) && self.epoch.load(Ordering::SeqCst) == epoch
    }
}
