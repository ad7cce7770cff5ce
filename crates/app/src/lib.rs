//! # bodyscale-app
//!
//! Application layer: the acquisition use-case and **port definitions**
//! (traits).
//!
//! ## Responsibilities
//! - Define the **platform port** that BLE adapters implement:
//!   - `AdvertisementSource`: permissions, radio state, advertisement stream
//! - Recognise scales and decode their broadcasts (`protocol`, `payload`)
//! - Drive one **acquisition session**: listen, stabilize, derive metrics,
//!   report statuses, enforce the session deadline
//! - Orchestrate domain objects without knowing *how* the radio works
//!
//! ## Dependency rule
//! Depends on `bodyscale-domain` only (plus `tokio` for channels and timers).
//! Never imports adapter crates. Adapters depend on *this* crate, not the reverse.

pub mod acquisition;
pub mod config;
pub mod error;
pub mod payload;
pub mod ports;
pub mod protocol;
pub mod status;
