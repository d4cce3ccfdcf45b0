//! Ledger access: paginated payment-history scans against a Horizon API.
//!
//! The scan walks `/accounts/{wallet}/payments` in descending order, 200
//! records per page, and folds every payment-type operation into three
//! counters: total payments, credited payments (wallet is the receiver) and
//! distinct counterparties. A hard cap of 10 000 records bounds scan cost.

mod client;
mod records;

pub use client::{HorizonClient, HorizonConfig, LedgerSource};
pub use records::{CounterAccumulator, Counters, PaymentRecord, PaymentsPage};
