// Shared data model (zones, resources, SOS signals, plans)
pub mod model;

// Simulation backend client
pub mod backend;

// Novelty detection across polling cycles
pub mod tracking;

// Single-flight operator alert queue
pub mod alert;

// Fixed-interval fetch/detect/alert loop
pub mod polling;

// Allocation and dispatch workflow
pub mod workflow;

// Cross-view session persistence
pub mod session;

// Configuration loading
pub mod config;
