//! Verification engine for business wallets.
//!
//! # Pipeline
//!
//! ```text
//! verify request
//!       │
//!       ▼
//! ┌──────────────┐
//! │ Rate limiter │──refused──▶ 429
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ Address check│──invalid──▶ 400
//! └──────┬───────┘
//!        ▼
//! ┌──────────────┐
//! │ Cache lookup │────hit────▶ 200 (cached)
//! └──────┬───────┘
//!        ▼ miss
//! ┌──────────────┐
//! │ Allowance    │──blocked──▶ 403
//! └──────┬───────┘
//!        ▼
//!   Ledger scan ──▶ decide ──▶ upsert ──▶ bump usage ──▶ webhook ──▶ 200
//! ```

pub mod batch;
pub mod cache;
pub mod decision;
pub mod engine;

pub use batch::{BatchEntry, BatchEntryResult, BatchOutcome, BatchRequest};
pub use cache::{CacheHit, CacheStats, VerificationCache};
pub use decision::{decide, Decision, Thresholds, VerificationStatus};
pub use engine::{VerificationData, VerificationEngine, VerifyOutcome, VerifyRequest};
