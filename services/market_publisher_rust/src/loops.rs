//! The publisher's long-running loops.
//!
//! Each loop owns its own [`MarketPublisher`], so governor state is never
//! shared between loops. All loops share the injected provider, indicator
//! source and store.

use crate::config::Config;
use crate::supervisor::Supervisor;
use anyhow::Result;
use std::sync::Arc;
use ticker_core::clients::{IndicatorSource, QuoteProvider};
use ticker_core::{ChartRetention, Indicator, IndicatorPublisher, MarketPublisher, MarketStore};
use tracing::{error, info};

#[derive(Clone)]
pub struct LoopContext {
    pub provider: Arc<dyn QuoteProvider>,
    pub indicators: Arc<dyn IndicatorSource>,
    pub store: Arc<dyn MarketStore>,
    pub config: Arc<Config>,
}

impl LoopContext {
    fn publisher(&self) -> MarketPublisher {
        MarketPublisher::new(
            self.provider.clone(),
            self.store.clone(),
            self.config.governor.clone(),
            self.config.pacing.clone(),
        )
    }
}

/// Publish every asset group back to back
pub async fn all_markets_loop(ctx: LoopContext) {
    let mut publisher = ctx.publisher();
    loop {
        if let Err(e) = publisher.publish_all_markets(&ctx.config.universe).await {
            error!("All markets publishing error: {:#}", e);
            tokio::time::sleep(ctx.config.default_retry_delay).await;
        }
        // A cycle without pacing may never suspend
        tokio::task::yield_now().await;
    }
}

/// Publish the forex group on its own, faster cadence
pub async fn forex_loop(ctx: LoopContext) {
    let mut publisher = ctx.publisher();
    loop {
        let delay = match publisher.process_forex(&ctx.config.universe.forex).await {
            Ok(_) => ctx.config.forex_interval,
            Err(e) => {
                error!("Forex publishing error: {:#}", e);
                ctx.config.default_retry_delay
            }
        };
        tokio::time::sleep(delay).await;
    }
}

/// Indicators published in one cycle, in order
pub fn indicator_cycle(total3_enabled: bool) -> Vec<Indicator> {
    let mut cycle = vec![Indicator::FearGreed, Indicator::BtcDominance];
    if total3_enabled {
        // Needs the dominance reading fetched just before it
        cycle.push(Indicator::Total3);
    }
    cycle
}

async fn publish_indicators(publisher: &IndicatorPublisher, cycle: &[Indicator]) -> Result<()> {
    for indicator in cycle {
        publisher.publish(*indicator).await?;
    }
    Ok(())
}

/// Publish the sentiment indicators, stopping the cycle at the first failure
pub async fn indicator_loop(ctx: LoopContext) {
    let publisher = IndicatorPublisher::new(ctx.indicators.clone(), ctx.store.clone());
    let cycle = indicator_cycle(ctx.config.total3_enabled);
    loop {
        let delay = match publish_indicators(&publisher, &cycle).await {
            Ok(()) => ctx.config.indicator_interval,
            Err(e) => {
                error!("Market indicators publishing error: {:#}", e);
                ctx.config.default_retry_delay
            }
        };
        tokio::time::sleep(delay).await;
    }
}

/// Daily chart retention
pub async fn chart_loop(ctx: LoopContext) {
    let job = ChartRetention::new(
        ctx.provider.clone(),
        ctx.store.clone(),
        ctx.config.universe.clone(),
        ctx.config.chart.clone(),
    );
    job.run().await;
}

/// Start every loop under `supervisor`
pub fn spawn_all(supervisor: &mut Supervisor, ctx: LoopContext) {
    let all = ctx.clone();
    supervisor.spawn("all-markets", move || all_markets_loop(all.clone()));

    let forex = ctx.clone();
    supervisor.spawn("forex", move || forex_loop(forex.clone()));

    let indicators = ctx.clone();
    supervisor.spawn("indicators", move || indicator_loop(indicators.clone()));

    let chart = ctx;
    supervisor.spawn("chart", move || chart_loop(chart.clone()));

    info!("Started {} supervised loops", supervisor.loop_count());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_indicator_cycle_order() {
        assert_eq!(
            indicator_cycle(true),
            vec![Indicator::FearGreed, Indicator::BtcDominance, Indicator::Total3]
        );
        assert_eq!(
            indicator_cycle(false),
            vec![Indicator::FearGreed, Indicator::BtcDominance]
        );
    }
}
