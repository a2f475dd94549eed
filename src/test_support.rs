//! In-memory store, push channel and account service for driving the
//! reducer end to end without a network.

use crate::{
    app::context::Services,
    core::{
        account::{AccountService, LoginOutcome},
        realtime::{ChangeChannel, ChangeEvent, ChangeFilter, ChangeKind, Subscription},
        store::{FeedStore, StoreError},
    },
    models::{
        message::{MessageRow, NewMessage},
        setting::{CHAT_ACCESS_DISABLED, SettingRow},
    },
};
use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use std::{collections::HashMap, path::PathBuf, sync::Arc, time::Duration};
use tokio::sync::{mpsc, oneshot};

/// A unique path under the temp dir.
pub fn scratch_file(name: &str) -> PathBuf {
    static COUNTER: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
    let n = COUNTER.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
    std::env::temp_dir()
        .join(format!("hrooms-test-{}-{}", std::process::id(), n))
        .join(name)
}

struct Subscriber {
    filter: ChangeFilter,
    tx: mpsc::Sender<ChangeEvent>,
}

impl Subscriber {
    fn wants(&self, table: &str, kind: ChangeKind, row: &Value) -> bool {
        if self.filter.table != table || self.filter.kind != kind {
            return false;
        }
        let Some(filter) = &self.filter.filter else {
            return true;
        };
        match filter.split_once("=eq.") {
            Some((column, expected)) => row.get(column).and_then(Value::as_str) == Some(expected),
            None => false,
        }
    }
}

#[derive(Default)]
struct Inner {
    messages: Vec<MessageRow>,
    settings: HashMap<String, bool>,
    avatars: HashMap<String, Option<String>>,
    logins: HashMap<(String, String), LoginOutcome>,
    passwords: HashMap<String, String>,
    subscribers: Vec<Subscriber>,
    avatar_lookups: usize,
    fail_subscribe: bool,
    fail_fetch: bool,
    fail_insert: bool,
    fail_avatars: bool,
    reject_setting: bool,
    fetch_delay: Duration,
    write_delay: Duration,
}

impl Inner {
    fn append(&mut self, sender_id: &str, name: Option<String>, text: &str, is_broadcast: bool) -> MessageRow {
        let id = self.messages.len() as i64 + 1;
        let row = MessageRow {
            id,
            sender_id: sender_id.to_string(),
            name,
            text: text.to_string(),
            is_broadcast,
            inserted_at: Some(format!("2024-05-01T12:{:02}:00+00:00", id % 60)),
        };
        self.messages.push(row.clone());
        row
    }

    fn notify(&mut self, table: &str, kind: ChangeKind, row: Value) {
        for subscriber in &self.subscribers {
            if subscriber.tx.is_closed() || !subscriber.wants(table, kind, &row) {
                continue;
            }
            let event = ChangeEvent {
                table: table.to_string(),
                kind,
                new: row.clone(),
            };
            if subscriber.tx.try_send(event).is_err() {
                tracing::warn!("Test subscriber on {} is full", table);
            }
        }
    }

    fn write_setting(&mut self, key: &str, value: bool) {
        self.settings.insert(key.to_string(), value);
        let row = SettingRow {
            key: key.to_string(),
            value,
        };
        let row = serde_json::to_value(row).unwrap_or_default();
        self.notify("settings", ChangeKind::Update, row);
    }
}

pub struct MemoryBackend {
    inner: Mutex<Inner>,
}

impl MemoryBackend {
    pub fn new() -> Arc<Self> {
        let mut inner = Inner::default();
        inner.settings.insert(CHAT_ACCESS_DISABLED.to_string(), false);
        Arc::new(Self {
            inner: Mutex::new(inner),
        })
    }

    pub fn services(self: &Arc<Self>) -> Services {
        Services {
            store: self.clone(),
            channel: self.clone(),
            account: self.clone(),
        }
    }

    /// Stores a row without pushing it to subscribers.
    pub fn seed(&self, sender_id: &str, text: &str, is_broadcast: bool) -> MessageRow {
        self.inner.lock().append(sender_id, None, text, is_broadcast)
    }

    /// Stores a row and pushes it, as if another client had sent it.
    pub fn push(&self, sender_id: &str, text: &str) -> MessageRow {
        let mut inner = self.inner.lock();
        let row = inner.append(sender_id, None, text, false);
        let value = serde_json::to_value(&row).unwrap_or_default();
        inner.notify("messages", ChangeKind::Insert, value);
        row
    }

    pub fn messages(&self) -> Vec<MessageRow> {
        self.inner.lock().messages.clone()
    }

    pub fn setting(&self, key: &str) -> Option<bool> {
        self.inner.lock().settings.get(key).copied()
    }

    pub fn set_setting(&self, key: &str, value: bool) {
        self.inner.lock().write_setting(key, value);
    }

    pub fn set_avatar(&self, user_id: &str, url: Option<&str>) {
        self.inner
            .lock()
            .avatars
            .insert(user_id.to_string(), url.map(str::to_string));
    }

    pub fn add_login(&self, username: &str, password: &str, outcome: LoginOutcome) {
        self.inner
            .lock()
            .logins
            .insert((username.to_string(), password.to_string()), outcome);
    }

    pub fn password_of(&self, user_id: &str) -> Option<String> {
        self.inner.lock().passwords.get(user_id).cloned()
    }

    /// Subscriptions on `table` whose handle is still alive.
    pub fn live_subscribers(&self, table: &str) -> usize {
        self.inner
            .lock()
            .subscribers
            .iter()
            .filter(|s| s.filter.table == table && !s.tx.is_closed())
            .count()
    }

    pub fn avatar_lookups(&self) -> usize {
        self.inner.lock().avatar_lookups
    }

    pub fn set_fail_subscribe(&self, fail: bool) {
        self.inner.lock().fail_subscribe = fail;
    }

    pub fn set_fail_fetch(&self, fail: bool) {
        self.inner.lock().fail_fetch = fail;
    }

    pub fn set_fail_insert(&self, fail: bool) {
        self.inner.lock().fail_insert = fail;
    }

    pub fn set_fail_avatars(&self, fail: bool) {
        self.inner.lock().fail_avatars = fail;
    }

    /// Delay before message inserts and avatar uploads complete.
    pub fn set_write_delay(&self, delay: Duration) {
        self.inner.lock().write_delay = delay;
    }

    async fn write_pause(&self) {
        let delay = self.inner.lock().write_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    pub fn set_reject_setting(&self, reject: bool) {
        self.inner.lock().reject_setting = reject;
    }

    /// Delay applied after the snapshot is read.
    pub fn set_fetch_delay(&self, delay: Duration) {
        self.inner.lock().fetch_delay = delay;
    }
}

#[async_trait]
impl FeedStore for MemoryBackend {
    async fn fetch_messages(&self) -> Result<Vec<MessageRow>, StoreError> {
        let (rows, delay, fail) = {
            let inner = self.inner.lock();
            (inner.messages.clone(), inner.fetch_delay, inner.fail_fetch)
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        if fail {
            return Err(StoreError::Connectivity("store offline".to_string()));
        }
        Ok(rows)
    }

    async fn insert_message(&self, message: &NewMessage) -> Result<(), StoreError> {
        self.write_pause().await;
        let mut inner = self.inner.lock();
        if inner.fail_insert {
            return Err(StoreError::Rejected {
                status: 500,
                message: "insert failed".to_string(),
            });
        }
        let row = inner.append(
            &message.sender_id,
            Some(message.name.clone()),
            &message.text,
            message.is_broadcast,
        );
        let value = serde_json::to_value(&row).map_err(|e| StoreError::Decode(e.to_string()))?;
        inner.notify("messages", ChangeKind::Insert, value);
        Ok(())
    }

    async fn fetch_avatars(
        &self,
        user_ids: &[String],
    ) -> Result<HashMap<String, Option<String>>, StoreError> {
        let mut inner = self.inner.lock();
        inner.avatar_lookups += 1;
        if inner.fail_avatars {
            return Err(StoreError::Connectivity("users table unreachable".to_string()));
        }
        Ok(user_ids
            .iter()
            .filter_map(|id| inner.avatars.get(id).map(|url| (id.clone(), url.clone())))
            .collect())
    }

    async fn fetch_setting(&self, key: &str) -> Result<Option<bool>, StoreError> {
        Ok(self.setting(key))
    }

    async fn update_setting(&self, key: &str, value: bool) -> Result<(), StoreError> {
        let mut inner = self.inner.lock();
        if inner.reject_setting {
            return Err(StoreError::Rejected {
                status: 403,
                message: "permission denied".to_string(),
            });
        }
        inner.write_setting(key, value);
        Ok(())
    }
}

#[async_trait]
impl ChangeChannel for MemoryBackend {
    async fn subscribe(&self, filter: ChangeFilter) -> Result<Subscription, StoreError> {
        let mut inner = self.inner.lock();
        if inner.fail_subscribe {
            return Err(StoreError::Connectivity("realtime unavailable".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        let (shutdown_tx, _shutdown_rx) = oneshot::channel();
        inner.subscribers.push(Subscriber { filter, tx });
        Ok(Subscription::new(rx, shutdown_tx))
    }
}

#[async_trait]
impl AccountService for MemoryBackend {
    async fn check_login(&self, username: &str, password: &str) -> Result<LoginOutcome, StoreError> {
        Ok(self
            .inner
            .lock()
            .logins
            .get(&(username.to_string(), password.to_string()))
            .cloned()
            .unwrap_or(LoginOutcome::Rejected))
    }

    async fn change_password(&self, user_id: &str, new_password: &str) -> Result<(), StoreError> {
        self.inner
            .lock()
            .passwords
            .insert(user_id.to_string(), new_password.to_string());
        Ok(())
    }

    async fn upload_avatar(
        &self,
        user_id: &str,
        extension: &str,
        _bytes: Vec<u8>,
    ) -> Result<String, StoreError> {
        self.write_pause().await;
        Ok(format!("memory://profile-pictures/{}/profile.{}", user_id, extension))
    }

    async fn set_profile_picture(&self, user_id: &str, url: &str) -> Result<(), StoreError> {
        self.set_avatar(user_id, Some(url));
        Ok(())
    }
}
