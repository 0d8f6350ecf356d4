use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use supplydesk_core::{Entity, NotificationId, UserId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NotificationLevel {
    #[default]
    Info,
    Warning,
    Error,
}

impl NotificationLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationLevel::Info => "info",
            NotificationLevel::Warning => "warning",
            NotificationLevel::Error => "error",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "info" => Some(NotificationLevel::Info),
            "warning" => Some(NotificationLevel::Warning),
            "error" => Some(NotificationLevel::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: NotificationId,
    pub recipient: UserId,
    pub title: String,
    pub message: String,
    pub url: Option<String>,
    pub level: NotificationLevel,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(
        recipient: UserId,
        title: impl Into<String>,
        message: impl Into<String>,
        level: NotificationLevel,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: NotificationId::new(),
            recipient,
            title: title.into(),
            message: message.into(),
            url: None,
            level,
            is_read: false,
            created_at,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// True when this is an unread notice for `recipient` with `title`.
    pub fn blocks(&self, recipient: UserId, title: &str) -> bool {
        !self.is_read && self.recipient == recipient && self.title == title
    }
}

impl Entity for Notification {
    type Id = NotificationId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// A notification is delivered unless the recipient still has an unread one
/// with the same title.
pub fn should_deliver<'a>(
    existing: impl IntoIterator<Item = &'a Notification>,
    recipient: UserId,
    title: &str,
) -> bool {
    !existing.into_iter().any(|n| n.blocks(recipient, title))
}

/// Filter `candidates` down to those that should actually be stored.
///
/// Candidates are checked against `existing` and against the ones already
/// accepted from the same batch.
pub fn plan_delivery(existing: &[Notification], candidates: Vec<Notification>) -> Vec<Notification> {
    let mut accepted: Vec<Notification> = Vec::with_capacity(candidates.len());
    for candidate in candidates {
        if should_deliver(existing.iter().chain(accepted.iter()), candidate.recipient, &candidate.title) {
            accepted.push(candidate);
        }
    }
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(recipient: UserId, title: &str) -> Notification {
        Notification::new(recipient, title, "msg", NotificationLevel::Warning, Utc::now())
    }

    #[test]
    fn unread_notice_with_same_title_blocks_delivery() {
        let user = UserId::new();
        let existing = vec![note(user, "Low Stock Alert: Paper")];
        assert!(!should_deliver(&existing, user, "Low Stock Alert: Paper"));
        assert!(should_deliver(&existing, user, "Low Stock Alert: Pens"));
        assert!(should_deliver(&existing, UserId::new(), "Low Stock Alert: Paper"));
    }

    #[test]
    fn read_notices_do_not_block() {
        let user = UserId::new();
        let mut n = note(user, "Overdue item: Projector");
        n.is_read = true;
        assert!(should_deliver(&[n], user, "Overdue item: Projector"));
    }

    #[test]
    fn batch_is_deduplicated_against_itself() {
        let user = UserId::new();
        let planned = plan_delivery(
            &[],
            vec![note(user, "Due soon: Chair"), note(user, "Due soon: Chair")],
        );
        assert_eq!(planned.len(), 1);
    }
}
