use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{info, warn};

use crate::market::MarketDataClient;
use crate::notify::AlertDispatcher;
use crate::subscriptions::SubscriptionRegistry;
use crate::types::{NotificationKind, SpotPrice, Subscription};

/// Target-price evaluation loop. Runs on its own timer, decoupled from the
/// polling scheduler, and only handles the one-shot buy/sell targets — the
/// recurring spread flags belong to the scheduler, which keeps one trigger
/// per condition and avoids duplicate alert storms.
pub struct NotificationEvaluator {
    period: Duration,
    market: MarketDataClient,
    registry: SubscriptionRegistry,
    dispatcher: AlertDispatcher,
}

impl NotificationEvaluator {
    pub fn new(
        period: Duration,
        market: MarketDataClient,
        registry: SubscriptionRegistry,
        dispatcher: AlertDispatcher,
    ) -> Self {
        Self {
            period,
            market,
            registry,
            dispatcher,
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        ticker.tick().await; // consume immediate first tick

        info!(period_secs = self.period.as_secs(), "notification evaluator started");
        loop {
            ticker.tick().await;
            if let Err(e) = self.run_once().await {
                warn!("evaluator run skipped: {e}");
            }
        }
    }

    /// One evaluation pass. A failed spot fetch skips the whole run.
    async fn run_once(&self) -> crate::error::Result<()> {
        let spot = self.market.fetch_spot().await?;
        self.evaluate(spot).await
    }

    /// Check every active subscription against the given spot price. Each
    /// user is evaluated in isolation; one failure never aborts the rest.
    pub async fn evaluate(&self, spot: SpotPrice) -> crate::error::Result<()> {
        let subs = self.registry.list_all_active().await?;
        for sub in subs {
            if let Err(e) = self.evaluate_one(spot, &sub).await {
                warn!(user_id = sub.user_id, "subscription evaluation failed: {e}");
            }
        }
        Ok(())
    }

    /// Buy targets fire when the price rises to or through the target (>=),
    /// sell targets when it falls to or through it (<=) — buy and sell move
    /// in opposite directions relative to a favorable trade. Firing
    /// deactivates the flag, so each target alerts exactly once.
    async fn evaluate_one(&self, spot: SpotPrice, sub: &Subscription) -> crate::error::Result<()> {
        if sub.notify_buy {
            if let Some(target) = sub.buy_target {
                if spot.buy >= target {
                    let text = format!(
                        "Objetivo de compra alcanzado: BOB {:.2} (tu objetivo: BOB {:.2})",
                        spot.buy, target
                    );
                    self.dispatcher.send(sub.user_id, &text).await;
                    self.registry
                        .set_flag(sub.user_id, NotificationKind::Buy, false, None)
                        .await?;
                }
            }
        }

        if sub.notify_sell {
            if let Some(target) = sub.sell_target {
                if spot.sell <= target {
                    let text = format!(
                        "Objetivo de venta alcanzado: BOB {:.2} (tu objetivo: BOB {:.2})",
                        spot.sell, target
                    );
                    self.dispatcher.send(sub.user_id, &text).await;
                    self.registry
                        .set_flag(sub.user_id, NotificationKind::Sell, false, None)
                        .await?;
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::db::store::memory_store;
    use crate::notify::testing::RecordingSender;
    use std::sync::Arc;

    fn test_config() -> Config {
        Config {
            bot_token: "test-token".to_string(),
            spot_url: "http://127.0.0.1:1/usdt".to_string(),
            media_base_url: "http://127.0.0.1:1/usdt/media/".to_string(),
            log_level: "info".to_string(),
            db_path: ":memory:".to_string(),
            api_port: 0,
            poll_interval_secs: 120,
            evaluator_interval_secs: 60,
            spread_alert_pct: 0.8,
            dialog_ttl_secs: 300,
        }
    }

    async fn evaluator_with(
        sender: Arc<RecordingSender>,
    ) -> (NotificationEvaluator, SubscriptionRegistry) {
        let store = memory_store().await;
        let registry = SubscriptionRegistry::new(store.clone());
        let evaluator = NotificationEvaluator::new(
            Duration::from_secs(60),
            MarketDataClient::new(&test_config()).unwrap(),
            registry.clone(),
            AlertDispatcher::new(sender),
        );
        (evaluator, registry)
    }

    fn spot(buy: f64, sell: f64) -> SpotPrice {
        SpotPrice { buy, sell }
    }

    #[tokio::test]
    async fn buy_target_fires_exactly_once_across_runs() {
        let sender = Arc::new(RecordingSender::default());
        let (evaluator, registry) = evaluator_with(sender.clone()).await;

        registry
            .set_flag(7, NotificationKind::Buy, true, Some(10.60))
            .await
            .unwrap();

        // Below target: nothing happens
        evaluator.evaluate(spot(10.55, 10.70)).await.unwrap();
        assert!(sender.sent.lock().unwrap().is_empty());

        // Crosses the target: fires and deactivates
        evaluator.evaluate(spot(10.62, 10.70)).await.unwrap();
        assert_eq!(sender.sent.lock().unwrap().len(), 1);

        // Same price again: the one-shot already fired
        evaluator.evaluate(spot(10.62, 10.70)).await.unwrap();
        assert_eq!(sender.sent.lock().unwrap().len(), 1);

        let subs = registry.list_all_active().await.unwrap();
        assert!(subs.is_empty(), "buy flag should be deactivated");
    }

    #[tokio::test]
    async fn buy_fires_when_price_equals_target() {
        let sender = Arc::new(RecordingSender::default());
        let (evaluator, registry) = evaluator_with(sender.clone()).await;

        registry
            .set_flag(7, NotificationKind::Buy, true, Some(10.60))
            .await
            .unwrap();
        evaluator.evaluate(spot(10.60, 10.70)).await.unwrap();
        assert_eq!(sender.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn sell_target_fires_on_the_falling_observation() {
        let sender = Arc::new(RecordingSender::default());
        let (evaluator, registry) = evaluator_with(sender.clone()).await;

        registry
            .set_flag(9, NotificationKind::Sell, true, Some(10.20))
            .await
            .unwrap();

        evaluator.evaluate(spot(10.50, 10.30)).await.unwrap();
        assert!(sender.sent.lock().unwrap().is_empty());

        evaluator.evaluate(spot(10.50, 10.18)).await.unwrap();
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 9);
    }

    #[tokio::test]
    async fn delivery_failure_still_deactivates_and_spares_other_users() {
        let sender = Arc::new(RecordingSender {
            fail_for: vec![1],
            ..Default::default()
        });
        let (evaluator, registry) = evaluator_with(sender.clone()).await;

        registry
            .set_flag(1, NotificationKind::Buy, true, Some(10.60))
            .await
            .unwrap();
        registry
            .set_flag(2, NotificationKind::Buy, true, Some(10.60))
            .await
            .unwrap();

        evaluator.evaluate(spot(10.62, 10.70)).await.unwrap();

        // User 2 got their alert despite user 1's dead chat
        let sent = sender.sent.lock().unwrap();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, 2);
        drop(sent);

        // One attempt per trigger: both one-shots are spent
        assert!(registry.list_all_active().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_spot_fetch_skips_the_run() {
        let sender = Arc::new(RecordingSender::default());
        let (evaluator, registry) = evaluator_with(sender.clone()).await;

        registry
            .set_flag(7, NotificationKind::Buy, true, Some(10.60))
            .await
            .unwrap();

        // test_config points the spot endpoint at a connection-refused port
        let result = evaluator.run_once().await;
        assert!(result.is_err());

        // Nothing dispatched, one-shot still armed for the next run
        assert!(sender.sent.lock().unwrap().is_empty());
        let subs = registry.list_all_active().await.unwrap();
        assert_eq!(subs.len(), 1);
        assert!(subs[0].notify_buy);
    }

    #[tokio::test]
    async fn spread_flags_are_ignored_by_the_evaluator() {
        let sender = Arc::new(RecordingSender::default());
        let (evaluator, registry) = evaluator_with(sender.clone()).await;

        registry
            .set_flag(5, NotificationKind::Spread, true, None)
            .await
            .unwrap();
        registry
            .set_flag(5, NotificationKind::MediaSpread, true, None)
            .await
            .unwrap();

        // Huge spread, but spread alerts belong to the scheduler
        evaluator.evaluate(spot(10.00, 12.00)).await.unwrap();
        assert!(sender.sent.lock().unwrap().is_empty());
    }
}
