//! Daily chart retention job.
//!
//! Once per day, after the exchange's close-of-market instant, fetches a
//! window of daily closes for every configured symbol and stores the most
//! recent trading days as one [`ChartRecord`] per symbol. Records are
//! replaced wholesale on every run.
//!
//! Scheduling happens on exchange-local civil time: the next run is the close
//! instant of the current local date, or of the next local date once that
//! instant has passed. Computing on the local date keeps the run at the same
//! wall-clock hour across DST changes.

use crate::clients::{DailyClose, QuoteProvider};
use crate::models::{ChartMetadata, ChartPoint, ChartRecord};
use crate::redis::MarketStore;
use crate::universe::SymbolUniverse;
use crate::utils::format_number;
use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

pub const CHART_INTERVAL: &str = "1d";
const NEW_YORK_TIMEZONE_LABEL: &str = "America/New_York (ET)";
const NEW_YORK_MARKET_HOURS_LABEL: &str = "9:30 AM - 4:00 PM ET (Regular Market Hours)";

/// Source of the current instant; tests substitute a scripted one
pub type Clock = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Metadata label for the exchange timezone
pub fn timezone_label(tz: Tz) -> String {
    if tz == chrono_tz::America::New_York {
        NEW_YORK_TIMEZONE_LABEL.to_string()
    } else {
        tz.name().to_string()
    }
}

/// Metadata label for the regular session of the exchange
pub fn market_hours_label(tz: Tz) -> String {
    if tz == chrono_tz::America::New_York {
        NEW_YORK_MARKET_HOURS_LABEL.to_string()
    } else {
        format!("Regular Market Hours ({})", tz.name())
    }
}

#[derive(Clone, Debug)]
pub struct ChartConfig {
    pub timezone: Tz,
    /// Exchange-local hour after which the trading day counts as closed
    pub close_hour: u32,
    /// Trading days kept per symbol
    pub chart_days: usize,
    /// Calendar days requested, wide enough to cover `chart_days` trading days
    pub buffer_days: u32,
    /// Pause after a failed run
    pub error_wait: Duration,
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::America::New_York,
            close_hour: 20,
            chart_days: 30,
            buffer_days: 45,
            error_wait: Duration::from_secs(300),
        }
    }
}

impl ChartConfig {
    fn metadata(&self) -> ChartMetadata {
        ChartMetadata {
            interval: CHART_INTERVAL.to_string(),
            period: format!("{}d", self.chart_days),
            timezone: timezone_label(self.timezone),
            market_hours: market_hours_label(self.timezone),
        }
    }
}

/// Close-of-market instant on `date` in `tz`
pub fn close_instant(date: NaiveDate, tz: Tz, close_hour: u32) -> Result<DateTime<Tz>> {
    let naive = date
        .and_hms_opt(close_hour, 0, 0)
        .ok_or_else(|| anyhow!("Invalid close hour {}", close_hour))?;
    tz.from_local_datetime(&naive)
        .earliest()
        .ok_or_else(|| anyhow!("{} does not exist in {}", naive, tz))
}

/// Next close-of-market instant strictly after `now`
pub fn next_run_time(now: DateTime<Tz>, close_hour: u32) -> Result<DateTime<Tz>> {
    let tz = now.timezone();
    let today = now.date_naive();
    let target = close_instant(today, tz, close_hour)?;
    if now < target {
        return Ok(target);
    }
    let tomorrow = today
        .succ_opt()
        .ok_or_else(|| anyhow!("No calendar day after {}", today))?;
    close_instant(tomorrow, tz, close_hour)
}

/// Whether `now` is at or after today's close instant
pub fn is_market_closed(now: DateTime<Tz>, close_hour: u32) -> bool {
    match close_instant(now.date_naive(), now.timezone(), close_hour) {
        Ok(close) => now >= close,
        Err(e) => {
            warn!("Cannot determine market close: {}", e);
            false
        }
    }
}

/// Keep the last `chart_days` non-missing closes, keyed by exchange-local date
pub fn retain_closes(closes: &[DailyClose], tz: Tz, chart_days: usize) -> BTreeMap<String, ChartPoint> {
    let by_date: BTreeMap<String, ChartPoint> = closes
        .iter()
        .filter_map(|bar| {
            let close = bar.close.filter(|c| c.is_finite())?;
            let date = bar.timestamp.with_timezone(&tz).format("%Y-%m-%d").to_string();
            Some((
                date,
                ChartPoint {
                    close: format_number(&close),
                },
            ))
        })
        .collect();

    let skip = by_date.len().saturating_sub(chart_days);
    by_date.into_iter().skip(skip).collect()
}

/// Build one record per symbol that has retained data, in universe order
pub fn build_records(
    universe: &SymbolUniverse,
    history: &HashMap<String, Vec<DailyClose>>,
    config: &ChartConfig,
    stored_at: &str,
) -> Vec<ChartRecord> {
    let mut records = Vec::new();
    for asset_class in crate::models::AssetClass::ALL {
        for symbol in universe.symbols(asset_class) {
            let Some(closes) = history.get(symbol) else {
                continue;
            };
            let chart_data = retain_closes(closes, config.timezone, config.chart_days);
            if chart_data.is_empty() {
                continue;
            }
            records.push(ChartRecord {
                asset_class,
                symbol: symbol.clone(),
                stored_at: stored_at.to_string(),
                chart_data,
                metadata: config.metadata(),
            });
        }
    }
    records
}

pub struct ChartRetention {
    provider: Arc<dyn QuoteProvider>,
    store: Arc<dyn MarketStore>,
    universe: SymbolUniverse,
    config: ChartConfig,
    clock: Clock,
}

impl ChartRetention {
    pub fn new(
        provider: Arc<dyn QuoteProvider>,
        store: Arc<dyn MarketStore>,
        universe: SymbolUniverse,
        config: ChartConfig,
    ) -> Self {
        Self {
            provider,
            store,
            universe,
            config,
            clock: Arc::new(Utc::now),
        }
    }

    #[cfg(test)]
    pub(crate) fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    fn now(&self) -> DateTime<Tz> {
        (self.clock)().with_timezone(&self.config.timezone)
    }

    /// Fetch the history window and overwrite every symbol's record.
    ///
    /// Returns the number of records stored.
    pub async fn collect_and_store(&self) -> Result<usize> {
        info!("Starting chart data collection...");

        let symbols = self.universe.all_symbols();
        let history = self
            .provider
            .get_daily_closes(&symbols, self.config.buffer_days)
            .await
            .with_context(|| {
                format!("Chart history fetch from {} failed", self.provider.provider_name())
            })?;

        let stored_at = self.now().format("%Y-%m-%d %H:%M:%S %Z").to_string();
        let records = build_records(&self.universe, &history, &self.config, &stored_at);

        for record in &records {
            let json = serde_json::to_string(record).context("Failed to serialize chart record")?;
            self.store
                .set(&record.key(), &json)
                .await
                .with_context(|| format!("Failed to store {}", record.key()))?;
        }

        let missing = symbols.len() - records.len();
        if missing > 0 {
            warn!("{} symbols had no chart data this run", missing);
        }
        info!("Chart data stored successfully ({} symbols)", records.len());
        Ok(records.len())
    }

    async fn wait_for_next_close(&self) -> Result<()> {
        let now = self.now();
        let next_run = next_run_time(now, self.config.close_hour)?;
        let wait = (next_run - now)
            .to_std()
            .context("Next run time is in the past")?;

        info!(
            "Waiting {:.2} hours until next chart data collection at {}",
            wait.as_secs_f64() / 3600.0,
            next_run
        );
        tokio::time::sleep(wait).await;
        Ok(())
    }

    /// Run forever: store now, then once after every market close
    pub async fn run(&self) {
        let mut collect = true;
        loop {
            let cycle = async {
                if collect {
                    self.collect_and_store().await?;
                }
                self.wait_for_next_close().await
            };

            match cycle.await {
                Ok(()) => {
                    collect = is_market_closed(self.now(), self.config.close_hour);
                    if !collect {
                        warn!("Market not fully closed yet, waiting for next cycle");
                    }
                }
                Err(e) => {
                    error!("Error storing chart data: {:#}", e);
                    tokio::time::sleep(self.config.error_wait).await;
                    collect = true;
                }
            }
        }
    }
}
