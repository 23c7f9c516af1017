use std::time::{SystemTime, UNIX_EPOCH};

use crate::db::models::{PriceSnapshotRow, SpreadSnapshotRow, SubscriptionRow};
use crate::error::Result;
use crate::types::{NotificationKind, PriceKind, Subscription};

/// Durable state: price history, spread history and per-user subscription rows.
/// Cloning shares the underlying pool. Every subscription write is a single
/// upsert statement, so two writers for the same user can never interleave
/// into a mixed row; writers for different users do not block each other.
#[derive(Clone)]
pub struct Store {
    pool: sqlx::SqlitePool,
}

impl Store {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    // -- snapshots ----------------------------------------------------------

    pub async fn insert_price_snapshot(&self, kind: PriceKind, value: f64) -> Result<i64> {
        let res = sqlx::query(
            "INSERT INTO price_snapshots (kind, value, created_at) VALUES (?, ?, ?)",
        )
        .bind(kind.as_str())
        .bind(value)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn insert_spread_snapshot(
        &self,
        buy: f64,
        sell: f64,
        diff: f64,
        pct: f64,
    ) -> Result<i64> {
        let res = sqlx::query(
            "INSERT INTO spread_snapshots (buy, sell, diff, pct, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(buy)
        .bind(sell)
        .bind(diff)
        .bind(pct)
        .bind(now_ts())
        .execute(&self.pool)
        .await?;
        Ok(res.last_insert_rowid())
    }

    pub async fn latest_spread_snapshot(&self) -> Result<Option<SpreadSnapshotRow>> {
        let row = sqlx::query_as::<_, SpreadSnapshotRow>(
            "SELECT id, buy, sell, diff, pct, created_at FROM spread_snapshots ORDER BY id DESC LIMIT 1",
        )
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn recent_spread_snapshots(&self, limit: i64) -> Result<Vec<SpreadSnapshotRow>> {
        let rows = sqlx::query_as::<_, SpreadSnapshotRow>(
            "SELECT id, buy, sell, diff, pct, created_at FROM spread_snapshots ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn latest_price_snapshot(&self, kind: PriceKind) -> Result<Option<PriceSnapshotRow>> {
        let row = sqlx::query_as::<_, PriceSnapshotRow>(
            "SELECT id, kind, value, created_at FROM price_snapshots WHERE kind = ? ORDER BY id DESC LIMIT 1",
        )
        .bind(kind.as_str())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn spread_snapshot_count(&self) -> Result<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM spread_snapshots")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    // -- subscriptions ------------------------------------------------------

    /// Upsert one flag (and its target, where the kind carries one) for a user.
    /// Each kind maps to a fixed statement; column names are never assembled
    /// at runtime.
    pub async fn upsert_subscription_flag(
        &self,
        user_id: i64,
        kind: NotificationKind,
        active: bool,
        target: Option<f64>,
    ) -> Result<()> {
        match kind {
            NotificationKind::Buy => {
                sqlx::query(
                    "INSERT INTO subscriptions (user_id, notify_buy, buy_target) VALUES (?, ?, ?) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                     notify_buy = excluded.notify_buy, buy_target = excluded.buy_target",
                )
                .bind(user_id)
                .bind(active)
                .bind(target)
                .execute(&self.pool)
                .await?;
            }
            NotificationKind::Sell => {
                sqlx::query(
                    "INSERT INTO subscriptions (user_id, notify_sell, sell_target) VALUES (?, ?, ?) \
                     ON CONFLICT(user_id) DO UPDATE SET \
                     notify_sell = excluded.notify_sell, sell_target = excluded.sell_target",
                )
                .bind(user_id)
                .bind(active)
                .bind(target)
                .execute(&self.pool)
                .await?;
            }
            NotificationKind::Spread => {
                sqlx::query(
                    "INSERT INTO subscriptions (user_id, notify_spread) VALUES (?, ?) \
                     ON CONFLICT(user_id) DO UPDATE SET notify_spread = excluded.notify_spread",
                )
                .bind(user_id)
                .bind(active)
                .execute(&self.pool)
                .await?;
            }
            NotificationKind::MediaSpread => {
                sqlx::query(
                    "INSERT INTO subscriptions (user_id, notify_media_spread) VALUES (?, ?) \
                     ON CONFLICT(user_id) DO UPDATE SET notify_media_spread = excluded.notify_media_spread",
                )
                .bind(user_id)
                .bind(active)
                .execute(&self.pool)
                .await?;
            }
        }
        Ok(())
    }

    /// Reset every flag and target for a user. The row survives; re-running
    /// against an already-clear (or absent) row changes nothing.
    pub async fn clear_subscription(&self, user_id: i64) -> Result<()> {
        sqlx::query(
            "UPDATE subscriptions SET \
             notify_buy = 0, buy_target = NULL, \
             notify_sell = 0, sell_target = NULL, \
             notify_spread = 0, notify_media_spread = 0 \
             WHERE user_id = ?",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn users_with_flag(&self, kind: NotificationKind) -> Result<Vec<i64>> {
        let sql = match kind {
            NotificationKind::Buy => "SELECT user_id FROM subscriptions WHERE notify_buy = 1",
            NotificationKind::Sell => "SELECT user_id FROM subscriptions WHERE notify_sell = 1",
            NotificationKind::Spread => "SELECT user_id FROM subscriptions WHERE notify_spread = 1",
            NotificationKind::MediaSpread => {
                "SELECT user_id FROM subscriptions WHERE notify_media_spread = 1"
            }
        };
        let ids: Vec<i64> = sqlx::query_scalar(sql).fetch_all(&self.pool).await?;
        Ok(ids)
    }

    pub async fn users_with_flag_and_target(
        &self,
        kind: NotificationKind,
    ) -> Result<Vec<(i64, Option<f64>)>> {
        let sql = match kind {
            NotificationKind::Buy => {
                "SELECT user_id, buy_target FROM subscriptions WHERE notify_buy = 1"
            }
            NotificationKind::Sell => {
                "SELECT user_id, sell_target FROM subscriptions WHERE notify_sell = 1"
            }
            // The spread kinds carry no target; NULL keeps the shape uniform.
            NotificationKind::Spread => {
                "SELECT user_id, NULL FROM subscriptions WHERE notify_spread = 1"
            }
            NotificationKind::MediaSpread => {
                "SELECT user_id, NULL FROM subscriptions WHERE notify_media_spread = 1"
            }
        };
        let rows: Vec<(i64, Option<f64>)> = sqlx::query_as(sql).fetch_all(&self.pool).await?;
        Ok(rows)
    }

    pub async fn all_active_subscriptions(&self) -> Result<Vec<Subscription>> {
        let rows = sqlx::query_as::<_, SubscriptionRow>(
            "SELECT user_id, notify_buy, buy_target, notify_sell, sell_target, \
             notify_spread, notify_media_spread \
             FROM subscriptions \
             WHERE notify_buy = 1 OR notify_sell = 1 OR notify_spread = 1 OR notify_media_spread = 1",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(Subscription::from).collect())
    }
}

fn now_ts() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_secs() as i64
}

#[cfg(test)]
pub(crate) async fn memory_store() -> Store {
    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .expect("migrations");
    Store::new(pool)
}
