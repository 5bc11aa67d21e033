//! Configuration for market_publisher_rust

use anyhow::{anyhow, Context, Result};
use chrono_tz::Tz;
use std::env;
use std::str::FromStr;
use std::time::Duration;
use ticker_core::clients::{IndicatorEndpoints, YahooEndpoints};
use ticker_core::{ChartConfig, GovernorConfig, PacingJitter, StoreConfig, SymbolUniverse};

#[derive(Debug, Clone)]
pub struct Config {
    // Redis
    pub store: StoreConfig,

    // Symbols
    pub universe: SymbolUniverse,

    // Loop timing
    pub default_retry_delay: Duration,
    pub forex_interval: Duration,
    pub indicator_interval: Duration,
    pub restart_delay: Duration,

    // Rate limiting
    pub governor: GovernorConfig,
    pub pacing: PacingJitter,

    // Daily charts
    pub chart: ChartConfig,

    // Indicators
    pub total3_enabled: bool,

    // Upstream endpoints
    pub yahoo: YahooEndpoints,
    pub indicator_endpoints: IndicatorEndpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            store: StoreConfig::default(),
            universe: SymbolUniverse::default(),
            default_retry_delay: Duration::from_secs(5),
            forex_interval: Duration::from_secs(60),
            indicator_interval: Duration::from_secs(60),
            restart_delay: Duration::from_secs(5),
            governor: GovernorConfig::default(),
            pacing: PacingJitter::default(),
            chart: ChartConfig::default(),
            total3_enabled: true,
            yahoo: YahooEndpoints::default(),
            indicator_endpoints: IndicatorEndpoints::default(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();

        let default_retry_delay = env_secs("DEFAULT_RETRY_DELAY_SECS", 5)?;

        let timezone_name =
            env::var("EXCHANGE_TIMEZONE").unwrap_or_else(|_| "America/New_York".to_string());
        let timezone = Tz::from_str(&timezone_name).map_err(|_| {
            anyhow!(
                "Invalid EXCHANGE_TIMEZONE: {} (expected IANA tz like America/New_York)",
                timezone_name
            )
        })?;

        let config = Self {
            store: StoreConfig {
                host: env::var("REDIS_HOST").unwrap_or(defaults.store.host),
                port: env_number("REDIS_PORT", defaults.store.port)?,
                password: env::var("REDIS_PASSWORD").ok().filter(|p| !p.is_empty()),
                db: env_number("REDIS_DB", defaults.store.db)?,
                socket_timeout: env_secs("REDIS_SOCKET_TIMEOUT_SECS", 5)?,
                retry_on_timeout: env_flag(
                    "REDIS_RETRY_ON_TIMEOUT",
                    defaults.store.retry_on_timeout,
                )?,
            },

            universe: SymbolUniverse {
                index: parse_symbols("INDEX_SYMBOLS", defaults.universe.index),
                stock: parse_symbols("STOCK_SYMBOLS", defaults.universe.stock),
                crypto: parse_symbols("CRYPTO_SYMBOLS", defaults.universe.crypto),
                forex: parse_symbols("FOREX_SYMBOLS", defaults.universe.forex),
            },

            default_retry_delay,
            forex_interval: env_secs("FOREX_INTERVAL_SECS", 60)?,
            indicator_interval: env_secs("INDICATOR_INTERVAL_SECS", 60)?,
            restart_delay: env_secs("SUPERVISOR_RESTART_DELAY_SECS", 5)?,

            governor: GovernorConfig {
                error_threshold: env_number("ERROR_THRESHOLD", 5u32)?,
                default_delay: default_retry_delay,
                cooldown: env_secs("RATE_LIMIT_DELAY_SECS", 30)?,
            },
            pacing: PacingJitter {
                min: env_secs_f64("PACING_MIN_SECS", 1.0)?,
                max: env_secs_f64("PACING_MAX_SECS", 1.2)?,
            },

            chart: ChartConfig {
                timezone,
                close_hour: env_number("MARKET_CLOSE_HOUR", 20u32)?,
                chart_days: env_number("CHART_DAYS", 30usize)?,
                buffer_days: env_number("CHART_BUFFER_DAYS", 45u32)?,
                error_wait: env_secs("ERROR_WAIT_SECS", 300)?,
            },

            total3_enabled: env_flag("TOTAL3_ENABLED", true)?,

            yahoo: YahooEndpoints {
                base_url: env::var("YAHOO_BASE_URL").unwrap_or(defaults.yahoo.base_url),
                cookie_url: env::var("YAHOO_COOKIE_URL").unwrap_or(defaults.yahoo.cookie_url),
            },
            indicator_endpoints: IndicatorEndpoints {
                fear_greed_url: env::var("FEAR_GREED_URL")
                    .unwrap_or(defaults.indicator_endpoints.fear_greed_url),
                dominance_url: env::var("DOMINANCE_URL")
                    .unwrap_or(defaults.indicator_endpoints.dominance_url),
                total3_url: env::var("TOTAL3_URL")
                    .unwrap_or(defaults.indicator_endpoints.total3_url),
            },
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.pacing.min > self.pacing.max {
            return Err(anyhow!("PACING_MIN_SECS must be <= PACING_MAX_SECS"));
        }
        if self.governor.error_threshold < 1 {
            return Err(anyhow!("ERROR_THRESHOLD must be >= 1"));
        }
        if self.chart.close_hour >= 24 {
            return Err(anyhow!("MARKET_CLOSE_HOUR must be between 0 and 23"));
        }
        if self.chart.chart_days as u32 > self.chart.buffer_days {
            return Err(anyhow!("CHART_DAYS must be <= CHART_BUFFER_DAYS"));
        }
        if self.universe.all_symbols().is_empty() {
            return Err(anyhow!("At least one symbol must be configured"));
        }
        Ok(())
    }
}

/// Comma-separated symbol list with default fallback
fn parse_symbols(var_name: &str, default: Vec<String>) -> Vec<String> {
    match env::var(var_name) {
        Ok(raw) => split_csv(&raw),
        Err(_) => default,
    }
}

fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}

fn env_value(var_name: &str) -> Option<String> {
    env::var(var_name).ok()
}

fn env_number<T: FromStr>(var_name: &str, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    parse_number(var_name, env_value(var_name).as_deref(), default)
}

fn env_flag(var_name: &str, default: bool) -> Result<bool> {
    parse_flag(var_name, env_value(var_name).as_deref(), default)
}

fn env_secs(var_name: &str, default: u64) -> Result<Duration> {
    parse_number(var_name, env_value(var_name).as_deref(), default).map(Duration::from_secs)
}

fn env_secs_f64(var_name: &str, default: f64) -> Result<Duration> {
    parse_secs_f64(var_name, env_value(var_name).as_deref(), default)
}

/// Parse a numeric setting; an unset variable takes the default
fn parse_number<T: FromStr>(var_name: &str, raw: Option<&str>, default: T) -> Result<T>
where
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match raw {
        Some(val) => val.trim().parse().with_context(|| {
            format!(
                "{} must be a valid {}, got {:?}",
                var_name,
                std::any::type_name::<T>(),
                val
            )
        }),
        None => Ok(default),
    }
}

fn parse_flag(var_name: &str, raw: Option<&str>, default: bool) -> Result<bool> {
    let Some(val) = raw else {
        return Ok(default);
    };
    match val.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "y" | "on" => Ok(true),
        "0" | "false" | "no" | "n" | "off" => Ok(false),
        _ => Err(anyhow!("{} must be true or false, got {:?}", var_name, val)),
    }
}

/// Fractional seconds
fn parse_secs_f64(var_name: &str, raw: Option<&str>, default: f64) -> Result<Duration> {
    let secs = parse_number(var_name, raw, default)?;
    Duration::try_from_secs_f64(secs).map_err(|_| anyhow!("{} must be >= 0", var_name))
}
