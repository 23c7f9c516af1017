use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};

use crate::db::Store;
use crate::market::MarketDataClient;
use crate::notify::AlertDispatcher;
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{calc_spread, MediaPair, NotificationKind, PriceKind, SpotPrice};

/// Fixed-interval poll loop: persists price and spread history and fires the
/// recurring spread alerts. Target-price subscriptions are handled by the
/// NotificationEvaluator on its own timer.
pub struct PollingScheduler {
    period: Duration,
    spread_alert_pct: f64,
    market: MarketDataClient,
    store: Store,
    registry: SubscriptionRegistry,
    dispatcher: AlertDispatcher,
}

impl PollingScheduler {
    pub fn new(
        period: Duration,
        spread_alert_pct: f64,
        market: MarketDataClient,
        store: Store,
        registry: SubscriptionRegistry,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            period,
            spread_alert_pct,
            market,
            store,
            registry,
            dispatcher,
        }
    }

    /// Ticks are awaited sequentially, so a slow fetch can never overlap the
    /// next tick; Delay pushes the schedule back instead of bursting.
    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // consume immediate first tick

        info!(period_secs = self.period.as_secs(), "polling scheduler started");
        loop {
            ticker.tick().await;
            if let Err(e) = self.tick().await {
                error!("poll tick failed: {e}");
            }
        }
    }

    /// One tick. Spot is best-effort; the media pair is required — if it
    /// cannot be fetched the tick degrades to a logged no-op.
    async fn tick(&self) -> crate::error::Result<()> {
        match self.market.fetch_spot().await {
            Ok(spot) => {
                if let Err(e) = self.process_spot(spot).await {
                    warn!("spot leg of tick failed: {e}");
                }
            }
            Err(e) => warn!("spot fetch failed, skipping spot snapshots: {e}"),
        }

        let media = self.market.fetch_media_both().await?;
        self.process_media(media).await
    }

    /// Persist spot snapshots and alert `Spread` subscribers when the spot
    /// spread percentage crosses the threshold.
    pub async fn process_spot(&self, spot: SpotPrice) -> crate::error::Result<()> {
        self.store
            .insert_price_snapshot(PriceKind::Buy, spot.buy)
            .await?;
        self.store
            .insert_price_snapshot(PriceKind::Sell, spot.sell)
            .await?;

        let spread = calc_spread(spot.buy, spot.sell)?;
        if spread.pct > self.spread_alert_pct {
            let users: Vec<i64> = self
                .registry
                .list_active_by_kind(NotificationKind::Spread)
                .await?
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            if !users.is_empty() {
                let text = format!(
                    "Alerta de brecha: compra BOB {:.2}, venta BOB {:.2} — diferencia BOB {:.2} ({:.2}%)",
                    spot.buy, spot.sell, spread.diff, spread.pct
                );
                info!(pct = spread.pct, recipients = users.len(), "spot spread alert");
                self.dispatcher.broadcast(&users, &text).await;
            }
        }
        Ok(())
    }

    /// Persist media snapshots and the spread row, then alert `MediaSpread`
    /// subscribers. The snapshot write happens before any alert goes out. A
    /// zero or non-finite media buy aborts before the spread row is written.
    pub async fn process_media(&self, media: MediaPair) -> crate::error::Result<()> {
        self.store
            .insert_price_snapshot(PriceKind::MediaBuy, media.buy)
            .await?;
        self.store
            .insert_price_snapshot(PriceKind::MediaSell, media.sell)
            .await?;

        let spread = calc_spread(media.buy, media.sell)?;
        self.store
            .insert_spread_snapshot(media.buy, media.sell, spread.diff, spread.pct)
            .await?;

        if spread.pct > self.spread_alert_pct {
            let users: Vec<i64> = self
                .registry
                .list_active_by_kind(NotificationKind::MediaSpread)
                .await?
                .into_iter()
                .map(|(id, _)| id)
                .collect();
            if !users.is_empty() {
                let text = format!(
                    "Alerta de brecha media: compra BOB {:.2}, venta BOB {:.2} — diferencia BOB {:.2} ({:.2}%)",
                    media.buy, media.sell, spread.diff, spread.pct
                );
                info!(pct = spread.pct, recipients = users.len(), "media spread alert");
                self.dispatcher.broadcast(&users, &text).await;
            }
        }
        Ok(())
    }
}
