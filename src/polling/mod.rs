//! Fixed-interval fetch → detect → alert driver.
//!
//! A [`Poller`] runs only while the operator session is active. Activation
//! runs one cycle immediately, then one per interval. Each cycle:
//!
//! 1. Fetches zones/resources and SOS signals
//! 2. Diffs zones against the remembered ids, warning on each new one
//! 3. Diffs SOS signals, raising an error alert and showing the SOS overlay
//! 4. Refreshes safe areas
//! 5. Stamps the last successful sync
//!
//! A failed fetch skips detection entirely so the remembered ids carry over.
//! Cycles never overlap. A tick arriving mid-cycle is skipped. A manual
//! refresh arriving mid-cycle makes the running cycle fetch once more, so the
//! reload always reflects backend state from after the request.
//!
//! [`DashboardObserver`]s registered with [`Poller::observe`] are called after
//! every completed cycle with the committed dashboard.

mod poller;

pub use poller::{CycleOutcome, Dashboard, DashboardObserver, Poller};
