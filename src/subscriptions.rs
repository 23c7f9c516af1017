use crate::db::Store;
use crate::error::Result;
use crate::types::{NotificationKind, Subscription};

/// CRUD over a user's notification flags, backed by the Store. All reads hit
/// the database directly — there is no cache layer to go stale.
#[derive(Clone)]
pub struct SubscriptionRegistry {
    store: Store,
}

impl SubscriptionRegistry {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// Turn a flag on or off. Targets only apply to Buy/Sell; deactivating a
    /// flag always clears its paired target so no stale target survives.
    pub async fn set_flag(
        &self,
        user_id: i64,
        kind: NotificationKind,
        active: bool,
        target: Option<f64>,
    ) -> Result<()> {
        let target = if active && kind.takes_target() {
            target
        } else {
            None
        };
        self.store
            .upsert_subscription_flag(user_id, kind, active, target)
            .await
    }

    /// Reset every flag and target for a user. Idempotent.
    pub async fn clear_all(&self, user_id: i64) -> Result<()> {
        self.store.clear_subscription(user_id).await
    }

    pub async fn list_active_by_kind(
        &self,
        kind: NotificationKind,
    ) -> Result<Vec<(i64, Option<f64>)>> {
        self.store.users_with_flag_and_target(kind).await
    }

    pub async fn list_all_active(&self) -> Result<Vec<Subscription>> {
        self.store.all_active_subscriptions().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::store::memory_store;

    async fn registry() -> SubscriptionRegistry {
        SubscriptionRegistry::new(memory_store().await)
    }

    #[tokio::test]
    async fn deactivating_clears_the_paired_target() {
        let reg = registry().await;
        reg.set_flag(7, NotificationKind::Buy, true, Some(10.60))
            .await
            .unwrap();
        // A stale target passed alongside a deactivation must not persist
        reg.set_flag(7, NotificationKind::Buy, false, Some(10.60))
            .await
            .unwrap();

        let subs = reg.store.all_active_subscriptions().await.unwrap();
        assert!(subs.is_empty());

        // Row still exists but holds no target
        reg.set_flag(7, NotificationKind::MediaSpread, true, None)
            .await
            .unwrap();
        let subs = reg.list_all_active().await.unwrap();
        assert_eq!(subs[0].buy_target, None);
    }

    #[tokio::test]
    async fn target_is_ignored_for_spread_kinds() {
        let reg = registry().await;
        reg.set_flag(3, NotificationKind::Spread, true, Some(99.0))
            .await
            .unwrap();
        let subs = reg.list_all_active().await.unwrap();
        assert!(subs[0].notify_spread);
        assert_eq!(subs[0].buy_target, None);
        assert_eq!(subs[0].sell_target, None);
    }

    #[tokio::test]
    async fn clear_all_twice_matches_clear_all_once() {
        let reg = registry().await;
        reg.set_flag(5, NotificationKind::Buy, true, Some(10.0))
            .await
            .unwrap();
        reg.set_flag(5, NotificationKind::Spread, true, None)
            .await
            .unwrap();

        reg.clear_all(5).await.unwrap();
        let after_once = reg.list_all_active().await.unwrap();
        reg.clear_all(5).await.unwrap();
        let after_twice = reg.list_all_active().await.unwrap();

        assert!(after_once.is_empty());
        assert_eq!(after_once, after_twice);
    }

    #[tokio::test]
    async fn concurrent_writes_for_different_users_both_land() {
        let reg = registry().await;
        let a = reg.set_flag(1, NotificationKind::Buy, true, Some(10.60));
        let b = reg.set_flag(2, NotificationKind::Sell, true, Some(10.20));
        let (ra, rb) = tokio::join!(a, b);
        ra.unwrap();
        rb.unwrap();

        let mut subs = reg.list_all_active().await.unwrap();
        subs.sort_by_key(|s| s.user_id);
        assert_eq!(subs.len(), 2);
        assert_eq!(subs[0].buy_target, Some(10.60));
        assert_eq!(subs[1].sell_target, Some(10.20));
    }

    #[tokio::test]
    async fn list_active_by_kind_reflects_committed_writes() {
        let reg = registry().await;
        reg.set_flag(1, NotificationKind::MediaSpread, true, None)
            .await
            .unwrap();
        let users = reg
            .list_active_by_kind(NotificationKind::MediaSpread)
            .await
            .unwrap();
        assert_eq!(users, vec![(1, None)]);

        reg.set_flag(1, NotificationKind::MediaSpread, false, None)
            .await
            .unwrap();
        let users = reg
            .list_active_by_kind(NotificationKind::MediaSpread)
            .await
            .unwrap();
        assert!(users.is_empty());
    }
}
