//! Business verification service for a Stellar-compatible ledger.
//!
//! Given a wallet address and a business name, the service decides whether
//! the wallet shows sufficient on-chain commercial activity against
//! caller-supplied or default thresholds. Decisions are persisted, cached
//! and optionally pushed to a caller-supplied HTTP callback.
//!
//! The crate is organised around the [`verify::VerificationEngine`], which
//! wires the address validator, rate limiter, verification cache, allowance
//! gate, ledger scan, decision rule, upsert and webhook dispatcher into one
//! pipeline. [`service::ServiceBuilder`] assembles the engine behind the
//! HTTP surface.

pub mod address;
pub mod config;
pub mod error;
pub mod event;
pub mod http;
pub mod ledger;
pub mod service;
pub mod store;
pub mod verify;
pub mod webhook;

pub use config::ServiceConfig;
pub use error::{Error, Result};
pub use service::{RunningService, ServiceBuilder};
pub use verify::{VerificationEngine, VerifyOutcome, VerifyRequest};
