//! # Admin Notification Feeds
//!
//! Capped, most-recent-first feeds shown on the admin dashboard.
//!
//! ```text
//! push(new) → [new, e9, e8, ..., e1]   (e0 dropped once the cap of 10 is hit)
//! recent(5) → first five entries
//! mark_all_read → is_new = false everywhere
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::NOTIFICATION_CAP;

/// Which feed an entry belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Orders,
    Users,
    Contacts,
}

impl NotificationKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Orders => "orders",
            NotificationKind::Users => "users",
            NotificationKind::Contacts => "contacts",
        }
    }
}

/// One feed entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    /// Id of the order, user or contact application.
    pub entity_id: String,
    pub summary: String,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    pub is_new: bool,
}

impl Notification {
    pub fn new(entity_id: impl Into<String>, summary: impl Into<String>, now: DateTime<Utc>) -> Self {
        Notification {
            entity_id: entity_id.into(),
            summary: summary.into(),
            created_at: now,
            is_new: true,
        }
    }
}

/// Prepends `entry` and drops anything past the cap.
pub fn push_capped(feed: &mut Vec<Notification>, entry: Notification) {
    feed.insert(0, entry);
    feed.truncate(NOTIFICATION_CAP);
}

/// Clears the `is_new` flag on every entry.
pub fn mark_all_read(feed: &mut [Notification]) {
    for entry in feed.iter_mut() {
        entry.is_new = false;
    }
}
