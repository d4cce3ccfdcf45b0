//! Wire types for the Horizon payments endpoint and counter accumulation.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Operation types counted as payments.
const PAYMENT_TYPES: &[&str] = &[
    "payment",
    "path_payment",
    "path_payment_strict_send",
    "path_payment_strict_receive",
];

/// One operation record from the payments endpoint.
///
/// Horizon emits many more fields; only the ones the scan consumes are
/// deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct PaymentRecord {
    /// Operation type discriminator.
    #[serde(rename = "type")]
    pub record_type: String,
    /// Sending account, when present.
    #[serde(default)]
    pub from: Option<String>,
    /// Receiving account, when present. The receiver for all four payment
    /// variants, including path payments.
    #[serde(default)]
    pub to: Option<String>,
    /// Cursor token for resuming pagination after this record.
    pub paging_token: String,
}

impl PaymentRecord {
    /// Whether this record is one of the counted payment types.
    #[must_use]
    pub fn is_payment(&self) -> bool {
        PAYMENT_TYPES.contains(&self.record_type.as_str())
    }
}

/// `_embedded` envelope of a Horizon collection page.
#[derive(Debug, Deserialize)]
pub struct Embedded {
    /// Records on this page.
    pub records: Vec<PaymentRecord>,
}

/// One page of the paginated payments listing.
#[derive(Debug, Deserialize)]
pub struct PaymentsPage {
    /// Embedded record collection.
    #[serde(rename = "_embedded")]
    pub embedded: Embedded,
}

/// Activity counters computed over a wallet's payment history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Counters {
    /// Payment operations observed.
    pub total: u64,
    /// Payments in which the scanned wallet was the receiver.
    pub credited: u64,
    /// Distinct counterparties other than the scanned wallet.
    pub unique_counterparties: u64,
}

/// Accumulates [`Counters`] over scanned payment records.
pub struct CounterAccumulator {
    wallet: String,
    total: u64,
    credited: u64,
    counterparties: HashSet<String>,
}

impl CounterAccumulator {
    /// Create an accumulator for the given wallet.
    #[must_use]
    pub fn new(wallet: &str) -> Self {
        Self {
            wallet: wallet.to_string(),
            total: 0,
            credited: 0,
            counterparties: HashSet::new(),
        }
    }

    /// Fold one record into the counters. Non-payment types are ignored.
    pub fn observe(&mut self, record: &PaymentRecord) {
        if !record.is_payment() {
            return;
        }

        self.total += 1;

        if record.to.as_deref() == Some(self.wallet.as_str()) {
            self.credited += 1;
        }

        let counterparty = if record.from.as_deref() == Some(self.wallet.as_str()) {
            record.to.as_deref()
        } else {
            record.from.as_deref()
        };
        if let Some(counterparty) = counterparty {
            if counterparty != self.wallet && !counterparty.is_empty() {
                self.counterparties.insert(counterparty.to_string());
            }
        }
    }

    /// Finish the scan and return the counters.
    #[must_use]
    pub fn finish(self) -> Counters {
        Counters {
            total: self.total,
            credited: self.credited,
            unique_counterparties: self.counterparties.len() as u64,
        }
    }
}
