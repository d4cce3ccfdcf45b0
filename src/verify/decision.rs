//! Threshold rule applied to scanned counters.

use crate::ledger::Counters;
use serde::{Deserialize, Serialize};

/// Minimum activity thresholds a wallet must meet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Thresholds {
    /// Minimum total payment count.
    pub min_total: u64,
    /// Minimum credited (incoming) payment count.
    pub min_credited: u64,
    /// Minimum distinct counterparty count.
    pub min_unique: u64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            min_total: 100,
            min_credited: 50,
            min_unique: 10,
        }
    }
}

/// Outcome status of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    /// All thresholds satisfied.
    Approved,
    /// At least one threshold missed.
    Rejected,
    /// Reserved for manual review flows; never produced by the rule.
    UnderReview,
}

/// A decision with its optional human-readable failure reason.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Decision {
    /// Outcome status.
    pub status: VerificationStatus,
    /// Concatenation of the failing predicates, in total → credited →
    /// unique order. `None` when approved.
    pub failure_reason: Option<String>,
}

impl Decision {
    /// Whether the wallet met every threshold.
    #[must_use]
    pub fn meets_requirements(&self) -> bool {
        self.status == VerificationStatus::Approved
    }
}

/// Apply the threshold rule to a wallet's counters.
///
/// Approved iff all three thresholds hold. The rejection wording is part of
/// the wire contract; callers test substrings of it.
#[must_use]
pub fn decide(counters: &Counters, thresholds: &Thresholds) -> Decision {
    let total_ok = counters.total >= thresholds.min_total;
    let credited_ok = counters.credited >= thresholds.min_credited;
    let unique_ok = counters.unique_counterparties >= thresholds.min_unique;

    if total_ok && credited_ok && unique_ok {
        return Decision {
            status: VerificationStatus::Approved,
            failure_reason: None,
        };
    }

    let mut reasons = Vec::new();
    if !total_ok && !credited_ok {
        reasons.push(format!(
            "Insufficient total ({}/{}) and credited ({}/{}) transactions",
            counters.total, thresholds.min_total, counters.credited, thresholds.min_credited
        ));
    } else if !total_ok {
        reasons.push(format!(
            "Insufficient transactions ({}/{})",
            counters.total, thresholds.min_total
        ));
    } else if !credited_ok {
        reasons.push(format!(
            "Insufficient credited transactions ({}/{})",
            counters.credited, thresholds.min_credited
        ));
    }
    if !unique_ok {
        reasons.push(format!(
            "Insufficient unique wallets ({}/{})",
            counters.unique_counterparties, thresholds.min_unique
        ));
    }

    Decision {
        status: VerificationStatus::Rejected,
        failure_reason: Some(reasons.join("; ")),
    }
}
