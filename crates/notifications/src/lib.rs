//! In-app notifications and the unread-title dedup rule shared by the
//! low-stock and overdue alerting paths.

pub mod notification;

pub use notification::{plan_delivery, should_deliver, Notification, NotificationLevel};
