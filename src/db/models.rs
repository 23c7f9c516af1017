/// Database row types for the snapshot and subscription tables.
/// Used by sqlx for typed queries.
use serde::Serialize;

use crate::types::Subscription;

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct PriceSnapshotRow {
    pub id: i64,
    pub kind: String,
    pub value: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow, Serialize)]
pub struct SpreadSnapshotRow {
    pub id: i64,
    pub buy: f64,
    pub sell: f64,
    pub diff: f64,
    pub pct: f64,
    pub created_at: i64,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct SubscriptionRow {
    pub user_id: i64,
    pub notify_buy: bool,
    pub buy_target: Option<f64>,
    pub notify_sell: bool,
    pub sell_target: Option<f64>,
    pub notify_spread: bool,
    pub notify_media_spread: bool,
}

impl From<SubscriptionRow> for Subscription {
    fn from(r: SubscriptionRow) -> Self {
        Subscription {
            user_id: r.user_id,
            notify_buy: r.notify_buy,
            buy_target: r.buy_target,
            notify_sell: r.notify_sell,
            sell_target: r.sell_target,
            notify_spread: r.notify_spread,
            notify_media_spread: r.notify_media_spread,
        }
    }
}
