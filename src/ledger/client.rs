//! Horizon ledger client: paginated payment-history scan.

use crate::error::{Error, Result};
use crate::ledger::records::{CounterAccumulator, Counters, PaymentsPage};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Records requested per page.
const PAGE_LIMIT: u32 = 200;

/// Hard upper bound on records scanned per wallet, capping scan cost.
const MAX_SCANNED_RECORDS: u64 = 10_000;

/// Source of payment-activity counters for a wallet.
///
/// The production implementation is [`HorizonClient`]; tests substitute a
/// scripted source.
#[async_trait]
pub trait LedgerSource: Send + Sync {
    /// Compute counters over the wallet's payment history.
    ///
    /// # Errors
    ///
    /// Returns [`Error::LedgerUnavailable`] on non-2xx responses or transport
    /// failures, and [`Error::LedgerTimeout`] when a page request times out.
    async fn fetch_payment_counters(&self, wallet: &str) -> Result<Counters>;
}

/// Configuration for the Horizon client.
#[derive(Debug, Clone)]
pub struct HorizonConfig {
    /// Base URL of the Horizon API, no trailing slash required.
    pub base_url: String,
    /// Per-page request timeout.
    pub timeout: Duration,
}

impl Default for HorizonConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.mainnet.minepi.com".to_string(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// HTTP client for a Horizon-style ledger API.
pub struct HorizonClient {
    client: reqwest::Client,
    base_url: String,
}

impl HorizonClient {
    /// Create a new client.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client fails to build.
    pub fn new(config: HorizonConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| Error::LedgerUnavailable(format!("failed to build client: {e}")))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Fetch one page. `Ok(None)` means the account was never funded (404).
    async fn fetch_page(&self, wallet: &str, cursor: Option<&str>) -> Result<Option<PaymentsPage>> {
        let mut url = format!(
            "{}/accounts/{}/payments?limit={}&order=desc",
            self.base_url, wallet, PAGE_LIMIT
        );
        if let Some(cursor) = cursor {
            url.push_str(&format!("&cursor={cursor}"));
        }

        debug!(url = %url, "fetching ledger page");

        let response = self.client.get(&url).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::LedgerTimeout
            } else {
                Error::LedgerUnavailable(e.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 404 {
            debug!(wallet = %wallet, "account not found on ledger");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "ledger returned error page");
            return Err(Error::LedgerUnavailable(format!(
                "ledger returned {status}: {body}"
            )));
        }

        let page: PaymentsPage = response
            .json()
            .await
            .map_err(|e| Error::LedgerUnavailable(format!("invalid ledger response: {e}")))?;
        Ok(Some(page))
    }
}

#[async_trait]
impl LedgerSource for HorizonClient {
    async fn fetch_payment_counters(&self, wallet: &str) -> Result<Counters> {
        let mut accumulator = CounterAccumulator::new(wallet);
        let mut cursor: Option<String> = None;
        let mut scanned: u64 = 0;

        loop {
            let Some(page) = self.fetch_page(wallet, cursor.as_deref()).await? else {
                // Never-funded accounts have an empty history.
                return Ok(Counters::default());
            };

            let records = &page.embedded.records;
            for record in records {
                accumulator.observe(record);
            }
            scanned += records.len() as u64;
            cursor = records.last().map(|r| r.paging_token.clone());

            // Terminate on a short page or once the scan cap is reached.
            if records.len() < PAGE_LIMIT as usize || scanned >= MAX_SCANNED_RECORDS {
                break;
            }
        }

        let counters = accumulator.finish();
        info!(
            wallet = %wallet,
            total = counters.total,
            credited = counters.credited,
            unique = counters.unique_counterparties,
            scanned,
            "ledger scan complete"
        );
        Ok(counters)
    }
}
