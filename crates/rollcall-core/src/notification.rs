//! Notifications: the inbox behind the read/unread badge.
//!
//! Inbound push messages are classified by title into a closed set of
//! categories before storage, so readers can group and filter without
//! re-parsing text.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

// ─── Category ────────────────────────────────────────────────────────────────

#[derive(
  Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum NotificationKind {
  /// Generic, untyped message.
  Text,
  NewVolunteerRequest,
  /// The recipient's own volunteer request was accepted or rejected.
  MyVolunteerRequestUpdate,
  AppreciationForVolunteering,
}

/// Map a notification title to its category.
///
/// Rules are case-sensitive substring tests evaluated in order; the first
/// match wins.
pub fn classify(title: &str) -> NotificationKind {
  if title.contains("you are now a volunteer") || title.contains("Request Rejected") {
    NotificationKind::MyVolunteerRequestUpdate
  } else if title.contains("New Volunteer Request") {
    NotificationKind::NewVolunteerRequest
  } else if title.contains("Thanks for volunteering") {
    NotificationKind::AppreciationForVolunteering
  } else {
    NotificationKind::Text
  }
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// A push message as delivered, before classification. Delivery is
/// at-least-once, so the same message may arrive more than once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingNotification {
  pub title:      String,
  pub body:       String,
  pub channel_id: String,
  /// Set by the producer when known; otherwise ingestion time is used.
  pub timestamp:  Option<DateTime<Utc>>,
}

/// A classified notification ready for insertion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNotification {
  pub title:      String,
  pub body:       String,
  pub kind:       NotificationKind,
  pub channel_id: String,
  pub timestamp:  DateTime<Utc>,
}

impl NewNotification {
  /// Classify `incoming`, leaving every field except the category as
  /// delivered. `now` fills a missing timestamp.
  pub fn classify(incoming: IncomingNotification, now: DateTime<Utc>) -> Self {
    Self {
      kind:       classify(&incoming.title),
      timestamp:  incoming.timestamp.unwrap_or(now),
      title:      incoming.title,
      body:       incoming.body,
      channel_id: incoming.channel_id,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
  pub id:         i64,
  pub title:      String,
  pub body:       String,
  pub kind:       NotificationKind,
  pub channel_id: String,
  pub timestamp:  DateTime<Utc>,
  pub is_read:    bool,
}
