//! Admin notification feeds.
//!
//! Each feed is a JSON list under `notifications:<kind>` in the key-value
//! store, newest first and capped at `NOTIFICATION_CAP` entries. Updates are
//! read-modify-write; concurrent pushes may drop an entry.

use chrono::Utc;
use tracing::warn;

use emporium_core::notification::{mark_all_read, push_capped, Notification, NotificationKind};

use crate::kv::{KvResult, KvStore};

pub struct NotificationFeed {
    kv: KvStore,
    kind: NotificationKind,
}

impl NotificationFeed {
    pub fn new(kv: KvStore, kind: NotificationKind) -> Self {
        NotificationFeed { kv, kind }
    }

    fn key(&self) -> String {
        format!("notifications:{}", self.kind.as_str())
    }

    async fn load(&self) -> KvResult<Vec<Notification>> {
        Ok(self.kv.get_json(&self.key()).await?.unwrap_or_default())
    }

    pub async fn push(&self, entry: Notification) -> KvResult<()> {
        let mut feed = self.load().await?;
        push_capped(&mut feed, entry);
        self.kv.set_json(&self.key(), &feed, None).await
    }

    /// Up to `n` entries, newest first.
    pub async fn recent(&self, n: usize) -> KvResult<Vec<Notification>> {
        let mut feed = self.load().await?;
        feed.truncate(n);
        Ok(feed)
    }

    pub async fn mark_all_read(&self) -> KvResult<()> {
        let mut feed = self.load().await?;
        mark_all_read(&mut feed);
        self.kv.set_json(&self.key(), &feed, None).await
    }

    /// Pushes an entry, logging instead of failing. The triggering write has
    /// already committed.
    pub async fn notify(&self, entity_id: &str, summary: String) {
        let entry = Notification::new(entity_id, summary, Utc::now());
        if let Err(e) = self.push(entry).await {
            warn!(feed = self.kind.as_str(), entity_id = %entity_id, error = %e, "Failed to record notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use emporium_core::NOTIFICATION_CAP;

    #[tokio::test]
    async fn test_push_caps_and_orders_newest_first() {
        let feed = NotificationFeed::new(KvStore::memory(), NotificationKind::Orders);

        for i in 0..(NOTIFICATION_CAP + 3) {
            feed.notify(&format!("order-{i}"), format!("Order {i}")).await;
        }

        let all = feed.recent(100).await.unwrap();
        assert_eq!(all.len(), NOTIFICATION_CAP);
        assert_eq!(all[0].entity_id, format!("order-{}", NOTIFICATION_CAP + 2));

        let recent = feed.recent(5).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert!(recent.iter().all(|n| n.is_new));
    }

    #[tokio::test]
    async fn test_mark_all_read_keeps_entries() {
        let kv = KvStore::memory();
        let feed = NotificationFeed::new(kv.clone(), NotificationKind::Contacts);
        feed.notify("c-1", "New message".to_string()).await;

        feed.mark_all_read().await.unwrap();

        let entries = feed.recent(5).await.unwrap();
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].is_new);

        // Feeds are independent
        let users = NotificationFeed::new(kv, NotificationKind::Users);
        assert!(users.recent(5).await.unwrap().is_empty());
    }
}
