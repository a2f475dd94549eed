use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

pub type MessageId = i64;

/// Label used for rows whose timestamp could not be read.
pub const UNKNOWN_DATE: &str = "Unknown date";

/// A row of the `messages` table as returned by the store.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MessageRow {
    pub id: MessageId,
    pub sender_id: String,
    #[serde(default)]
    pub name: Option<String>,
    pub text: String,
    #[serde(default)]
    pub is_broadcast: bool,
    #[serde(default)]
    pub inserted_at: Option<String>,
}

/// Insert payload for the `messages` table. The store assigns `id` and
/// `inserted_at`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct NewMessage {
    pub sender_id: String,
    pub name: String,
    pub text: String,
    pub is_broadcast: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Broadcast,
    Sent,
    Received,
}

/// The broadcast flag dominates; otherwise the message is ours iff the sender
/// is the current user.
pub fn classify(is_broadcast: bool, sender_id: &str, current_user_id: &str) -> MessageKind {
    if is_broadcast {
        MessageKind::Broadcast
    } else if sender_id == current_user_id {
        MessageKind::Sent
    } else {
        MessageKind::Received
    }
}

/// A message projected for rendering. Never persisted.
#[derive(Clone, Debug, PartialEq)]
pub struct ViewMessage {
    pub id: Option<MessageId>,
    pub text: String,
    pub kind: MessageKind,
    pub time: Option<String>,
    pub date: String,
    pub sender_id: Option<String>,
    pub name: Option<String>,
}

impl ViewMessage {
    pub fn from_row(row: &MessageRow, current_user_id: &str) -> Self {
        let stamp = row.inserted_at.as_deref().and_then(parse_timestamp);
        Self {
            id: Some(row.id),
            text: row.text.clone(),
            kind: classify(row.is_broadcast, &row.sender_id, current_user_id),
            time: stamp.map(|s| s.format("%H:%M").to_string()),
            date: stamp
                .map(|s| s.format("%Y-%m-%d").to_string())
                .unwrap_or_else(|| UNKNOWN_DATE.to_string()),
            sender_id: Some(row.sender_id.clone()),
            name: row.name.clone(),
        }
    }
}

/// Reads the stored timestamp in the zone it was stored in. Accepts RFC 3339
/// as well as the offset-less form a `timestamp` column serializes to.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    if let Ok(stamp) = DateTime::parse_from_rfc3339(raw) {
        return Some(stamp.naive_local());
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S%.f"))
        .ok()
}

#[derive(Clone, Debug, PartialEq)]
pub struct DateGroup {
    pub date: String,
    pub messages: Vec<ViewMessage>,
}

impl DateGroup {
    /// Long-form heading, e.g. `June 1, 2025`.
    pub fn heading(&self) -> String {
        NaiveDate::parse_from_str(&self.date, "%Y-%m-%d")
            .map(|d| d.format("%B %-d, %Y").to_string())
            .unwrap_or_else(|_| self.date.clone())
    }
}

/// Stable partition by date key. Groups appear in first-seen order and keep
/// arrival order internally.
pub fn group_by_date(messages: &[ViewMessage]) -> Vec<DateGroup> {
    let mut groups: Vec<DateGroup> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();

    for message in messages {
        match index.get(message.date.as_str()) {
            Some(&slot) => groups[slot].messages.push(message.clone()),
            None => {
                index.insert(message.date.as_str(), groups.len());
                groups.push(DateGroup {
                    date: message.date.clone(),
                    messages: vec![message.clone()],
                });
            }
        }
    }

    groups
}
