//! # bodyscale-domain
//!
//! Pure domain model for the bodyscale acquisition pipeline.
//!
//! ## Responsibilities
//! - Foundational types: fixed-point [`weight::Weight`], session ids,
//!   error conventions, timestamps
//! - Define **samples** decoded from scale advertisements
//! - Define the subject's anthropometric **profile**
//! - Run the **stabilization** state machine that turns noisy samples into
//!   one converged weight
//! - Derive **body-composition metrics** from a converged weight
//!
//! ## Dependency rule
//! This crate has **no internal dependencies**.
//! It must never import anything from `app`, adapters, or external IO crates.
//! All IO boundaries are expressed as traits in the `app` crate (ports).

pub mod error;
pub mod id;
pub mod time;
pub mod weight;

pub mod metrics;
pub mod profile;
pub mod sample;
pub mod stabilizer;
