use super::{Alert, AlertEvent, AlertKind, CloseReason, ConfirmAction};
use chrono::Utc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::{debug, info};

#[derive(Default)]
struct QueueState {
    pending: VecDeque<Alert>,

    /// Visible and interactive alert
    current: Option<Alert>,

    /// A dismissed alert is still animating out; nothing may be promoted yet
    closing: bool,

    next_id: u64,
}

struct Inner {
    state: Mutex<QueueState>,
    events: broadcast::Sender<AlertEvent>,
    close_transition: Duration,
}

/// Process-wide, single-flight alert channel.
///
/// Cloning yields another handle to the same queue; every producer (polling
/// loop, workflow controller, operator actions) gets one. All operations are
/// short in-memory critical sections and never fail or wait.
#[derive(Clone)]
pub struct AlertQueue {
    inner: Arc<Inner>,
}

impl AlertQueue {
    /// Create a queue whose dismissed alerts take `close_transition` to leave
    /// the screen before the next one is promoted.
    pub fn new(close_transition: Duration) -> Self {
        let (events, _) = broadcast::channel(256);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(QueueState::default()),
                events,
                close_transition,
            }),
        }
    }

    /// Queue an informational alert (info/success/warning/error)
    pub fn enqueue_alert(&self, title: impl Into<String>, message: impl Into<String>, kind: AlertKind) -> u64 {
        // A confirm alert without a command would be unconfirmable
        let kind = if kind == AlertKind::Confirm {
            AlertKind::Info
        } else {
            kind
        };
        self.push(kind, title.into(), message.into(), None)
    }

    pub fn enqueue_info(&self, title: impl Into<String>, message: impl Into<String>) -> u64 {
        self.enqueue_alert(title, message, AlertKind::Info)
    }

    /// Queue a confirm-gated alert carrying the command to run on acceptance
    pub fn enqueue_confirm(&self, title: impl Into<String>, message: impl Into<String>, action: ConfirmAction) -> u64 {
        self.push(AlertKind::Confirm, title.into(), message.into(), Some(action))
    }

    /// Close the displayed alert via its close/cancel control.
    ///
    /// Works for every kind; for a confirm alert this is an explicit cancel
    /// and its command is dropped.
    pub fn dismiss_current(&self) -> Option<Alert> {
        let mut state = self.lock();
        let alert = state.current.take()?;
        let reason = if alert.is_confirm() {
            CloseReason::Cancelled
        } else {
            CloseReason::Dismissed
        };
        self.begin_close(state, alert.id, reason);
        Some(alert)
    }

    /// Click outside the dialog. Ignored while a confirm alert is displayed.
    ///
    /// Returns true if an alert was closed.
    pub fn dismiss_outside(&self) -> bool {
        let state = self.lock();
        match state.current.as_ref().map(|a| (a.id, a.is_confirm())) {
            Some((id, false)) => {
                let mut state = state;
                state.current = None;
                self.begin_close(state, id, CloseReason::Dismissed);
                true
            }
            Some((id, true)) => {
                debug!(alert_id = id, "Outside click ignored on confirm alert");
                false
            }
            None => false,
        }
    }

    /// Accept the displayed confirm alert.
    ///
    /// Hands back its command for the caller to execute, then closes it. The
    /// command leaves the queue exactly once; a non-confirm alert is left
    /// untouched and `None` is returned.
    pub fn confirm_current(&self) -> Option<ConfirmAction> {
        let mut state = self.lock();
        if !state.current.as_ref().is_some_and(Alert::is_confirm) {
            return None;
        }
        let mut alert = state.current.take()?;
        let action = alert.action.take();
        info!(alert_id = alert.id, title = %alert.title, "Operator confirmed alert");
        self.begin_close(state, alert.id, CloseReason::Confirmed);
        action
    }

    /// Displayed alert, if any
    pub fn current(&self) -> Option<Alert> {
        self.lock().current.clone()
    }

    /// Alerts waiting behind the displayed one, in display order
    pub fn pending(&self) -> Vec<Alert> {
        self.lock().pending.iter().cloned().collect()
    }

    /// Nothing displayed, nothing closing, nothing pending
    pub fn is_idle(&self) -> bool {
        let state = self.lock();
        state.current.is_none() && !state.closing && state.pending.is_empty()
    }

    /// Subscribe to display transitions
    pub fn subscribe(&self) -> broadcast::Receiver<AlertEvent> {
        self.inner.events.subscribe()
    }

    fn lock(&self) -> MutexGuard<'_, QueueState> {
        self.inner.state.lock().unwrap()
    }

    fn push(&self, kind: AlertKind, title: String, message: String, action: Option<ConfirmAction>) -> u64 {
        let mut state = self.lock();
        state.next_id += 1;
        let id = state.next_id;

        debug!(alert_id = id, kind = %kind, title = %title, "Alert queued");

        state.pending.push_back(Alert {
            id,
            kind,
            title,
            message,
            action,
            raised_at: Utc::now(),
        });
        self.promote(&mut state);
        id
    }

    fn begin_close(&self, mut state: MutexGuard<'_, QueueState>, id: u64, reason: CloseReason) {
        let _ = self.inner.events.send(AlertEvent::Closed { id, reason });

        if self.inner.close_transition.is_zero() {
            self.promote(&mut state);
            return;
        }

        // Without a runtime there is nothing to animate; promote right away
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            self.promote(&mut state);
            return;
        };

        state.closing = true;
        drop(state);

        let queue = self.clone();
        let transition = self.inner.close_transition;
        handle.spawn(async move {
            tokio::time::sleep(transition).await;
            let mut state = queue.lock();
            state.closing = false;
            queue.promote(&mut state);
        });
    }

    /// Show the head of the queue if the screen is free
    fn promote(&self, state: &mut QueueState) {
        if state.current.is_some() || state.closing {
            return;
        }
        if let Some(next) = state.pending.pop_front() {
            debug!(alert_id = next.id, "Alert displayed");
            let _ = self.inner.events.send(AlertEvent::Shown(next.clone()));
            state.current = Some(next);
        }
    }
}

impl Default for AlertQueue {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}
