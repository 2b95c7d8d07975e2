#![allow(clippy::missing_errors_doc)] // Allow public functions without # Errors sections
#![allow(clippy::must_use_candidate)] // Allow methods without must_use when context is clear

//! # FMV Tracker Core
//!
//! Rust core of the FMV raffle tracker, designed to complement the
//! browser-side tracker userscript: same storage layout, same status
//! semantics, in a form that can run headless.
//!
//! ## Overview
//!
//! The tracker follows time-boxed raffles discovered from an external feed,
//! persists them durably keyed by `postId`, and drives each one through the
//! raffle gateway (token refresh, data fetch, optional claim, re-fetch)
//! until a winner is known or the raffle is confirmed inactive.
//!
//! ## Architecture
//!
//! - A sharded, invariant-preserving persistent store: one bucket per
//!   calendar day, an ownership index, and a day-set, all behind a plain
//!   string key-value boundary.
//! - A pure status model deriving the lifecycle phase and transport
//!   classification from raw fields.
//! - A resolution engine with a conservative retry policy (one
//!   refresh-and-resubmit on 401, permanent parking on 500) and two
//!   mutually exclusive claim gates.
//! - A cooperative single-producer scheduler: one canonical context runs
//!   the loops, every other context sharing the store stays a passive
//!   reader.
//! - A throttled read-only invariant auditor.
//!
//! ## Module Organization
//!
//! - [`models`] - raffle entity and sub-records
//! - [`storage`] - key-value boundary, sharded store, maintenance
//! - [`state_machine`] - phase and transport derivation
//! - [`orchestration`] - resolution engine, claim policies, manual actions
//! - [`scheduler`] - canonical-context gating and loops
//! - [`diagnostics`] - invariant auditor
//! - [`client`] - raffle gateway API boundary
//! - [`events`] - store invalidation signals
//! - [`config`] - configuration loading and validation
//! - [`error`] - structured error handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fmv_tracker::config::TrackerConfig;
//! use fmv_tracker::storage::{JsonFileKv, RaffleStore};
//! use std::sync::Arc;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! fmv_tracker::logging::init_tracing();
//!
//! let config = TrackerConfig::load()?;
//! let kv = Arc::new(JsonFileKv::open("fmv-tracker-store.json")?);
//! let store = Arc::new(RaffleStore::new(kv, config.storage.clone()));
//!
//! // Wire the store into a ResolutionEngine + Scheduler, or query it
//! // directly:
//! # let _ = store;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod constants;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod logging;
pub mod models;
pub mod orchestration;
pub mod scheduler;
pub mod state_machine;
pub mod storage;

pub use config::TrackerConfig;
pub use error::{Result, TrackerError};
pub use models::{CandidateRaffle, Raffle};
pub use orchestration::{ResolutionEngine, ScanSummary};
pub use scheduler::{DiscoverySource, Scheduler, SchedulerSettings};
pub use state_machine::{RafflePhase, Transport};
pub use storage::{KeyValueStore, RaffleStore};
