//! Gated allowlist registration service for a Farcaster frame.
//!
//! Users pass a reputation score check, a follow check and a share step,
//! then are admitted into a capacity-limited registration list:
//! - Score and follow checks run against the social graph API
//! - Admission enforces capacity and uniqueness atomically in the store
//! - Status queries report remaining capacity for the current phase

pub mod api;
pub mod config;
pub mod error;
pub mod gate;
pub mod identity;
pub mod registry;
pub mod verification;

pub use config::Config;
pub use error::AllowlistError;
pub use gate::{AdmissionGate, AdmissionPolicy, AdmissionRequest, CapacityReport};
pub use registry::{Registration, RegistrationStatus, Store};
