//! Background work spawned on the tokio runtime. Every task reports back to
//! the event loop through `AppEvent`s; none of them touch the view model.

use crate::{
    app::{compose::ComposeKind, context::Services},
    core::{
        account::{AccountService, avatar_extension},
        realtime::{ChangeFilter, Subscription},
        store::{FeedStore, StoreError},
    },
    events::app_event::{AppEvent, AuthEvent, FeedEvent, SendEvent, SettingsEvent},
    models::{
        message::{MessageRow, NewMessage},
        setting::{CHAT_ACCESS_DISABLED, SettingRow},
    },
};
use std::{path::PathBuf, sync::Arc};
use tokio::{sync::mpsc, task::JoinHandle};

async fn post(tx: &mpsc::Sender<AppEvent>, event: AppEvent) -> bool {
    if tx.send(event).await.is_err() {
        tracing::error!("Failed to send event to UI thread: channel is closed.");
        return false;
    }
    true
}

/// Runs one feed binding: subscribes to message inserts, then fetches the
/// snapshot while already forwarding pushed rows. Rows pushed before the
/// snapshot lands are queued by the synchronizer. Aborting the task drops
/// the subscription.
pub fn spawn_feed(services: Services, tx: mpsc::Sender<AppEvent>, generation: u64) -> JoinHandle<()> {
    tokio::spawn(async move {
        let subscription = match services
            .channel
            .subscribe(ChangeFilter::message_inserts())
            .await
        {
            Ok(subscription) => Some(subscription),
            Err(error) => {
                tracing::error!("Message subscription failed: {}", error);
                post(&tx, AppEvent::Feed(FeedEvent::ChannelError { generation, error })).await;
                None
            }
        };

        let fetch = async {
            let result = services.store.fetch_messages().await;
            post(&tx, AppEvent::Feed(FeedEvent::Snapshot { generation, result })).await;
        };
        let pump = forward_inserts(subscription, &tx, generation);
        tokio::join!(fetch, pump);
    })
}

async fn forward_inserts(
    subscription: Option<Subscription>,
    tx: &mpsc::Sender<AppEvent>,
    generation: u64,
) {
    let Some(mut subscription) = subscription else {
        return;
    };
    while let Some(event) = subscription.next().await {
        match event.decode::<MessageRow>() {
            Ok(row) => {
                if !post(tx, AppEvent::Feed(FeedEvent::Inserted { generation, row })).await {
                    break;
                }
            }
            Err(e) => tracing::warn!("Skipping undecodable message row: {}", e),
        }
    }
    tracing::warn!("Message subscription for generation {} ended", generation);
    post(
        tx,
        AppEvent::Feed(FeedEvent::ChannelError {
            generation,
            error: StoreError::Connectivity("live updates stopped".to_string()),
        }),
    )
    .await;
}

/// Watches the shared `chat_access_disabled` setting for the whole process.
pub fn spawn_settings_watch(services: Services, tx: mpsc::Sender<AppEvent>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let subscription = services
            .channel
            .subscribe(ChangeFilter::setting_updates(CHAT_ACCESS_DISABLED))
            .await;

        let initial = services.store.fetch_setting(CHAT_ACCESS_DISABLED).await;
        post(&tx, AppEvent::Settings(SettingsEvent::Loaded(initial))).await;

        let mut subscription = match subscription {
            Ok(subscription) => subscription,
            Err(e) => {
                tracing::error!("Settings subscription failed: {}", e);
                post(&tx, AppEvent::Settings(SettingsEvent::ChannelError(e))).await;
                return;
            }
        };
        while let Some(event) = subscription.next().await {
            match event.decode::<SettingRow>() {
                Ok(row) if row.key == CHAT_ACCESS_DISABLED => {
                    if !post(&tx, AppEvent::Settings(SettingsEvent::Changed(row.value))).await {
                        break;
                    }
                }
                Ok(row) => tracing::debug!("Ignoring update for setting {}", row.key),
                Err(e) => tracing::warn!("Skipping undecodable settings row: {}", e),
            }
        }
    })
}

pub fn spawn_profile_lookup(
    store: Arc<dyn FeedStore>,
    tx: mpsc::Sender<AppEvent>,
    generation: u64,
    requested: Vec<String>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = store.fetch_avatars(&requested).await;
        post(
            &tx,
            AppEvent::ProfilesLoaded {
                generation,
                requested,
                result,
            },
        )
        .await;
    })
}

/// `generation` is the session binding the send was issued under.
pub fn spawn_send(
    store: Arc<dyn FeedStore>,
    tx: mpsc::Sender<AppEvent>,
    generation: u64,
    kind: ComposeKind,
    message: NewMessage,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = store.insert_message(&message).await;
        post(
            &tx,
            AppEvent::Send(SendEvent::Finished {
                generation,
                kind,
                result,
            }),
        )
        .await;
    })
}

/// Writes the desired value directly; no read-modify-write.
pub fn spawn_toggle_access(
    store: Arc<dyn FeedStore>,
    tx: mpsc::Sender<AppEvent>,
    disabled: bool,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let event = match store.update_setting(CHAT_ACCESS_DISABLED, disabled).await {
            Ok(()) => SettingsEvent::Changed(disabled),
            Err(e) => SettingsEvent::UpdateFailed(e),
        };
        post(&tx, AppEvent::Settings(event)).await;
    })
}

pub fn spawn_login(
    account: Arc<dyn AccountService>,
    tx: mpsc::Sender<AppEvent>,
    username: String,
    password: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = account.check_login(&username, &password).await;
        post(&tx, AppEvent::Auth(AuthEvent::LoginFinished(result))).await;
    })
}

pub fn spawn_change_password(
    account: Arc<dyn AccountService>,
    tx: mpsc::Sender<AppEvent>,
    user_id: String,
    new_password: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = account.change_password(&user_id, &new_password).await;
        post(&tx, AppEvent::Auth(AuthEvent::PasswordChanged(result))).await;
    })
}

/// Uploads the picture, records its URL on the user row and reports the URL.
pub fn spawn_avatar_update(
    account: Arc<dyn AccountService>,
    tx: mpsc::Sender<AppEvent>,
    generation: u64,
    user_id: String,
    path: PathBuf,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let result = async {
            let bytes = tokio::fs::read(&path)
                .await
                .map_err(|e| format!("Could not read {}: {}", path.display(), e))?;
            let url = account
                .upload_avatar(&user_id, &avatar_extension(&path), bytes)
                .await
                .map_err(|e| e.to_string())?;
            account
                .set_profile_picture(&user_id, &url)
                .await
                .map_err(|e| e.to_string())?;
            Ok::<_, String>(url)
        }
        .await;
        post(&tx, AppEvent::Auth(AuthEvent::AvatarUpdated { generation, result })).await;
    })
}
