use std::time::Duration;

use tracing::{info, warn};

use super::client::{InfoTransport, RateLimitedClient};
use super::gaps::FetchRange;
use crate::models::record::Record;
use crate::utils::time::format_ms;

/// Sequential per-coin fetcher, paced to stay under the upstream request budget.
pub struct BackfillEngine<'a, T> {
    client: &'a RateLimitedClient<T>,
    pace: Duration,
}

impl<'a, T: InfoTransport> BackfillEngine<'a, T> {
    pub fn new(client: &'a RateLimitedClient<T>, pace: Duration) -> Self {
        BackfillEngine { client, pace }
    }

    /// Fetch `range` for every coin, keeping only records with `start <= time < end`.
    pub async fn backfill<R: Record>(&self, coins: &[String], range: FetchRange) -> Vec<R> {
        info!(
            "Fetching {} data from {} to {}",
            R::KIND,
            format_ms(range.start_ms),
            format_ms(range.end_ms)
        );

        let mut fetched = Vec::new();
        for (i, coin) in coins.iter().enumerate() {
            info!("Processing {} ({}/{})", coin, i + 1, coins.len());

            let records: Vec<R> = self
                .client
                .fetch_records::<R>(coin, range.start_ms, range.end_ms)
                .await
                .into_iter()
                .filter(|r| range.contains(r.time()))
                .collect();

            if records.is_empty() {
                warn!("No {} data for {}", R::KIND, coin);
            } else {
                info!("{}: {}", coin, R::describe(&records));
                fetched.extend(records);
            }

            tokio::time::sleep(self.pace).await;
        }

        info!("Fetched {} {} records in total", fetched.len(), R::KIND);
        fetched
    }

    /// Fetch only the newest record per coin for the latest completed hour.
    pub async fn fetch_latest<R: Record>(
        &self,
        coins: &[String],
        latest_hour: i64,
        now_ms: i64,
    ) -> Vec<R> {
        let (start_ms, end_ms) = R::KIND.latest_window(latest_hour, now_ms);
        info!("Fetching latest {} data for {}", R::KIND, format_ms(latest_hour));

        let mut fetched = Vec::new();
        for (i, coin) in coins.iter().enumerate() {
            info!("Processing {} ({}/{})", coin, i + 1, coins.len());

            let newest = self
                .client
                .fetch_records::<R>(coin, start_ms, end_ms)
                .await
                .into_iter()
                .filter(|r| r.time() >= start_ms && r.time() < end_ms)
                .max_by_key(|r| r.time());

            match newest {
                Some(record) => {
                    info!("{}: latest entry at {}", coin, format_ms(record.time()));
                    fetched.push(record);
                }
                None => warn!("No latest {} data for {}", R::KIND, coin),
            }

            tokio::time::sleep(self.pace).await;
        }
        fetched
    }
}
