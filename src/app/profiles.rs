use crate::models::message::ViewMessage;
use std::collections::{HashMap, HashSet};

/// Maps sender ids to avatar URLs for rendering. Merge-only; the current
/// user's locally held avatar always wins over the looked-up one.
#[derive(Clone, Debug)]
pub struct ProfileResolver {
    placeholder: String,
    cache: HashMap<String, String>,
    own_id: Option<String>,
    local_avatar: Option<String>,
    requested: HashSet<String>,
    retry: bool,
}

impl ProfileResolver {
    pub fn new(placeholder: impl Into<String>) -> Self {
        Self {
            placeholder: placeholder.into(),
            cache: HashMap::new(),
            own_id: None,
            local_avatar: None,
            requested: HashSet::new(),
            retry: false,
        }
    }

    pub fn bind(&mut self, own_id: &str, local_avatar: Option<String>) {
        self.unbind();
        self.own_id = Some(own_id.to_string());
        self.local_avatar = local_avatar;
    }

    pub fn unbind(&mut self) {
        self.cache.clear();
        self.requested.clear();
        self.retry = false;
        self.own_id = None;
        self.local_avatar = None;
    }

    pub fn placeholder(&self) -> &str {
        &self.placeholder
    }

    pub fn local_avatar(&self) -> Option<&str> {
        self.local_avatar.as_deref()
    }

    pub fn set_local_avatar(&mut self, url: String) {
        self.local_avatar = Some(url);
    }

    /// True when the sender set grew past what earlier lookups covered.
    pub fn needs_lookup(&self, sender_ids: &[String]) -> bool {
        sender_ids.iter().any(|id| !self.requested.contains(id))
    }

    pub fn mark_requested(&mut self, sender_ids: &[String]) {
        self.requested.extend(sender_ids.iter().cloned());
        self.retry = false;
    }

    /// Makes `sender_ids` eligible for the next lookup again.
    pub fn forget_requested(&mut self, sender_ids: &[String]) {
        for id in sender_ids {
            self.requested.remove(id);
        }
        self.retry = true;
    }

    /// A lookup failed and should be reissued on the next feed change.
    pub fn wants_retry(&self) -> bool {
        self.retry
    }

    /// Merges a batched lookup. Requested ids with no stored avatar get the
    /// placeholder.
    pub fn merge(&mut self, requested: &[String], fetched: HashMap<String, Option<String>>) {
        for id in requested {
            let url = fetched
                .get(id)
                .cloned()
                .flatten()
                .filter(|url| !url.is_empty())
                .unwrap_or_else(|| self.placeholder.clone());
            self.cache.insert(id.clone(), url);
        }
        tracing::debug!("Profile cache holds {} avatars", self.cache.len());
    }

    pub fn avatar_for_sender(&self, sender_id: Option<&str>) -> &str {
        if let (Some(sender), Some(own)) = (sender_id, self.own_id.as_deref()) {
            if sender == own {
                if let Some(local) = self.local_avatar.as_deref() {
                    return local;
                }
            }
        }
        sender_id
            .and_then(|id| self.cache.get(id))
            .map(String::as_str)
            .unwrap_or(&self.placeholder)
    }

    pub fn avatar_for(&self, message: &ViewMessage) -> &str {
        self.avatar_for_sender(message.sender_id.as_deref())
    }
}
