//! Live feed synchronizer.
//!
//! Reconciles the bulk snapshot taken when a user binds with the insert
//! events pushed afterwards, keeping one ordered, deduplicated and date-grouped
//! view model. Every bind starts a new generation; anything tagged with an
//! older generation belongs to a previous binding and is dropped.

use crate::models::message::{
    DateGroup, MessageId, MessageRow, ViewMessage, group_by_date,
};
use std::collections::{BTreeSet, HashSet};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FeedPhase {
    Unbound,
    /// Waiting for the snapshot; pushed rows are queued meanwhile.
    Bootstrapping,
    Live,
}

/// What a successfully applied change did to the view model.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FeedUpdate {
    pub appended: usize,
    pub senders_grew: bool,
}

pub struct FeedSynchronizer {
    user_id: Option<String>,
    generation: u64,
    phase: FeedPhase,
    messages: Vec<ViewMessage>,
    groups: Vec<DateGroup>,
    seen: HashSet<MessageId>,
    senders: BTreeSet<String>,
    pending: Vec<MessageRow>,
}

impl Default for FeedSynchronizer {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedSynchronizer {
    pub fn new() -> Self {
        Self {
            user_id: None,
            generation: 0,
            phase: FeedPhase::Unbound,
            messages: Vec::new(),
            groups: Vec::new(),
            seen: HashSet::new(),
            senders: BTreeSet::new(),
            pending: Vec::new(),
        }
    }

    /// Binds to `user_id`, dropping everything from the previous binding.
    /// Returns the generation the caller must tag snapshot and events with.
    pub fn bind(&mut self, user_id: &str) -> u64 {
        self.reset();
        self.user_id = Some(user_id.to_string());
        self.phase = FeedPhase::Bootstrapping;
        tracing::info!("Feed bound to {} (generation {})", user_id, self.generation);
        self.generation
    }

    pub fn unbind(&mut self) {
        if self.user_id.is_some() {
            tracing::info!("Feed unbound (generation {})", self.generation);
        }
        self.reset();
        self.phase = FeedPhase::Unbound;
    }

    fn reset(&mut self) {
        self.generation += 1;
        self.user_id = None;
        self.messages.clear();
        self.groups.clear();
        self.seen.clear();
        self.senders.clear();
        self.pending.clear();
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_current(&self, generation: u64) -> bool {
        self.user_id.is_some() && generation == self.generation
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn phase(&self) -> FeedPhase {
        self.phase
    }

    pub fn messages(&self) -> &[ViewMessage] {
        &self.messages
    }

    pub fn groups(&self) -> &[DateGroup] {
        &self.groups
    }

    pub fn sender_ids(&self) -> Vec<String> {
        self.senders.iter().cloned().collect()
    }

    /// Replaces the whole sequence with the snapshot, then drains whatever
    /// was pushed while the snapshot was in flight.
    pub fn apply_snapshot(&mut self, generation: u64, rows: Vec<MessageRow>) -> Option<FeedUpdate> {
        if !self.is_current(generation) {
            tracing::debug!(
                "Discarding stale snapshot (generation {}, current {})",
                generation,
                self.generation
            );
            return None;
        }
        if self.phase != FeedPhase::Bootstrapping {
            tracing::debug!("Ignoring repeated snapshot for generation {}", generation);
            return None;
        }

        self.messages.clear();
        self.seen.clear();
        let known_senders = self.senders.len();
        self.senders.clear();

        let queued = std::mem::take(&mut self.pending);
        let mut appended = 0;
        for row in rows.iter().chain(queued.iter()) {
            if self.push_row(row) {
                appended += 1;
            }
        }
        self.phase = FeedPhase::Live;
        self.groups = group_by_date(&self.messages);

        tracing::info!(
            "Snapshot applied: {} messages ({} queued during bootstrap)",
            self.messages.len(),
            queued.len()
        );
        Some(FeedUpdate {
            appended,
            senders_grew: self.senders.len() > known_senders,
        })
    }

    /// The snapshot could not be fetched. Goes live with whatever was queued
    /// so pushed rows still show up.
    pub fn snapshot_failed(&mut self, generation: u64) -> Option<FeedUpdate> {
        if !self.is_current(generation) || self.phase != FeedPhase::Bootstrapping {
            return None;
        }
        self.apply_snapshot(generation, Vec::new())
    }

    /// Applies one pushed insert. Returns `None` when nothing visible changed.
    pub fn apply_insert(&mut self, generation: u64, row: MessageRow) -> Option<FeedUpdate> {
        if !self.is_current(generation) {
            tracing::debug!("Discarding insert {} from generation {}", row.id, generation);
            return None;
        }
        match self.phase {
            FeedPhase::Unbound => None,
            FeedPhase::Bootstrapping => {
                self.pending.push(row);
                None
            }
            FeedPhase::Live => {
                let known_senders = self.senders.len();
                if !self.push_row(&row) {
                    tracing::debug!("Duplicate insert {} ignored", row.id);
                    return None;
                }
                self.groups = group_by_date(&self.messages);
                Some(FeedUpdate {
                    appended: 1,
                    senders_grew: self.senders.len() > known_senders,
                })
            }
        }
    }

    fn push_row(&mut self, row: &MessageRow) -> bool {
        let Some(user_id) = self.user_id.as_deref() else {
            return false;
        };
        if !self.seen.insert(row.id) {
            return false;
        }
        self.messages.push(ViewMessage::from_row(row, user_id));
        self.senders.insert(row.sender_id.clone());
        true
    }
}
