use super::state::{AppState, ChatView, LoginForm, PasswordForm};
use crate::{
    app::{
        compose::{ComposeKind, Draft},
        config::Config,
        context::AppContext,
        feed::FeedUpdate,
        tasks,
    },
    core::{account::LoginOutcome, store::StoreError},
    events::app_event::{Action, AppEvent, AuthEvent, FeedEvent, SendEvent, SettingsEvent},
    models::{message::NewMessage, user::Session},
    utils::typewriter::Typewriter,
};
use std::{collections::HashMap, path::PathBuf};

/// Applies one event to the application. All view-model mutation happens
/// here, on the UI thread.
pub fn reduce(state: &mut AppState, ctx: &mut AppContext, event: AppEvent) {
    match event {
        AppEvent::ConfigLoaded(result) => handle_config_loaded(ctx, result),
        AppEvent::SessionRestored(result) => handle_session_restored(state, ctx, result),
        AppEvent::Auth(auth_event) => handle_auth_event(state, ctx, auth_event),
        AppEvent::Feed(feed_event) => handle_feed_event(ctx, feed_event),
        AppEvent::Settings(settings_event) => handle_settings_event(ctx, settings_event),
        AppEvent::ProfilesLoaded {
            generation,
            requested,
            result,
        } => handle_profiles_loaded(ctx, generation, requested, result),
        AppEvent::Send(SendEvent::Finished {
            generation,
            kind,
            result,
        }) => handle_send_finished(state, ctx, generation, kind, result),
        AppEvent::Action(action) => handle_action(state, ctx, action),
    }
}

fn handle_config_loaded(ctx: &mut AppContext, result: Result<Config, eyre::Report>) {
    match result {
        Ok(config) => ctx.apply_config(config),
        Err(e) => {
            tracing::error!("Failed to load config: {}. Using defaults.", e);
            let config = ctx.config.clone();
            ctx.apply_config(config);
        }
    }

    let identity = ctx.identity.clone();
    let tx = ctx.event_tx.clone();
    tokio::spawn(async move {
        let restored = identity.load().await;
        tx.send(AppEvent::SessionRestored(restored)).await.ok();
    });
}

fn handle_session_restored(
    state: &mut AppState,
    ctx: &mut AppContext,
    result: Result<Option<Session>, eyre::Report>,
) {
    match result {
        Ok(Some(session)) => enter_chat(state, ctx, session),
        Ok(None) => *state = AppState::LoggedOut(LoginForm::new()),
        Err(e) => {
            tracing::warn!("Could not restore session: {}. Showing login.", e);
            *state = AppState::LoggedOut(LoginForm::new());
        }
    }
}

fn enter_chat(state: &mut AppState, ctx: &mut AppContext, session: Session) {
    tracing::info!("Entering chat as {} ({})", session.id, session.role.as_str());
    ctx.bind_session(session);
    *state = AppState::LoggedIn(ChatView::new(ctx.config.max_message_chars));
}

fn persist_session(ctx: &AppContext, session: Session) {
    let identity = ctx.identity.clone();
    tokio::spawn(async move {
        if let Err(e) = identity.store(&session).await {
            tracing::error!("Failed to store session: {}", e);
        }
    });
}

fn forget_session(ctx: &AppContext) {
    let identity = ctx.identity.clone();
    tokio::spawn(async move {
        if let Err(e) = identity.clear().await {
            tracing::error!("Failed to clear session: {}", e);
        }
    });
}

fn handle_auth_event(state: &mut AppState, ctx: &mut AppContext, event: AuthEvent) {
    match event {
        AuthEvent::LoginFinished(result) => handle_login_finished(state, ctx, result),
        AuthEvent::PasswordChanged(result) => {
            let AppState::ChangePassword(form) = state else {
                return;
            };
            match result {
                Ok(()) => {
                    forget_session(ctx);
                    ctx.show_notice("Password Updated", "Password updated. Please log in again.");
                    *state = AppState::LoggedOut(LoginForm::new());
                }
                Err(e) => {
                    form.in_progress = false;
                    tracing::error!("Password change failed: {}", e);
                    ctx.show_notice("Password Change Failed", format!("Password change failed: {}", e));
                }
            }
        }
        AuthEvent::AvatarUpdated { generation, result } => {
            if !ctx.feed.is_current(generation) {
                tracing::debug!("Discarding avatar update from generation {}", generation);
                return;
            }
            if let AppState::LoggedIn(view) = state {
                view.upload_in_progress = false;
                if result.is_ok() {
                    view.avatar_path.clear();
                }
            }
            match result {
                Ok(url) => {
                    let Some(session) = ctx.session.as_mut() else {
                        return;
                    };
                    session.profile_picture = Some(url.clone());
                    let session = session.clone();
                    ctx.profiles.set_local_avatar(url);
                    persist_session(ctx, session);
                    ctx.show_notice("Settings", "Profile picture updated!");
                }
                Err(e) => {
                    tracing::error!("Profile picture update failed: {}", e);
                    ctx.show_notice("Upload Failed", "Failed to upload image.");
                }
            }
        }
    }
}

fn handle_login_finished(
    state: &mut AppState,
    ctx: &mut AppContext,
    result: Result<LoginOutcome, StoreError>,
) {
    let AppState::LoggedOut(form) = state else {
        return;
    };
    form.in_progress = false;

    match result {
        Ok(LoginOutcome::Authenticated(session)) => {
            persist_session(ctx, session.clone());
            let reveal = Typewriter::access_granted(&form.username);
            *state = AppState::Granting { session, reveal };
        }
        Ok(LoginOutcome::PasswordChangeRequired { user_id }) => {
            *state = AppState::ChangePassword(PasswordForm {
                user_id,
                new_password: String::new(),
                show_password: false,
                in_progress: false,
            });
        }
        Ok(LoginOutcome::Rejected) => show_wrong_credentials(ctx),
        Err(e) => {
            tracing::error!("Login failed: {}", e);
            show_wrong_credentials(ctx);
        }
    }
}

fn show_wrong_credentials(ctx: &mut AppContext) {
    ctx.show_notice(
        "Authentication Failed",
        "The codename or password is incorrect.\nPlease try again.",
    );
}

fn handle_feed_event(ctx: &mut AppContext, event: FeedEvent) {
    match event {
        FeedEvent::Snapshot { generation, result } => {
            let update = match result {
                Ok(rows) => ctx.feed.apply_snapshot(generation, rows),
                Err(e) => {
                    if ctx.feed.is_current(generation) {
                        tracing::error!("Failed to fetch messages: {}", e);
                    }
                    ctx.feed.snapshot_failed(generation)
                }
            };
            if let Some(update) = update {
                resolve_profiles(ctx, generation, &update);
            }
        }
        FeedEvent::Inserted { generation, row } => {
            if let Some(update) = ctx.feed.apply_insert(generation, row) {
                resolve_profiles(ctx, generation, &update);
            }
        }
        FeedEvent::ChannelError { generation, error } => {
            if !ctx.feed.is_current(generation) {
                return;
            }
            tracing::error!("Live updates unavailable: {}", error);
            ctx.feed_error = Some(format!("Live updates unavailable: {}", error));
        }
    }
}

/// Runs a batched avatar lookup when the sender set grew or the previous
/// lookup failed.
fn resolve_profiles(ctx: &mut AppContext, generation: u64, update: &FeedUpdate) {
    if !update.senders_grew && !ctx.profiles.wants_retry() {
        return;
    }
    let ids = ctx.feed.sender_ids();
    if !ctx.profiles.needs_lookup(&ids) {
        return;
    }
    let Some(services) = &ctx.services else {
        return;
    };
    ctx.profiles.mark_requested(&ids);
    tasks::spawn_profile_lookup(
        services.store.clone(),
        ctx.event_tx.clone(),
        generation,
        ids,
    );
}

fn handle_profiles_loaded(
    ctx: &mut AppContext,
    generation: u64,
    requested: Vec<String>,
    result: Result<HashMap<String, Option<String>>, StoreError>,
) {
    if !ctx.feed.is_current(generation) {
        tracing::debug!("Discarding avatars for stale generation {}", generation);
        return;
    }
    match result {
        Ok(fetched) => ctx.profiles.merge(&requested, fetched),
        Err(e) => {
            tracing::error!("Failed to fetch user profiles: {}", e);
            ctx.profiles.forget_requested(&requested);
        }
    }
}

fn handle_settings_event(ctx: &mut AppContext, event: SettingsEvent) {
    match event {
        SettingsEvent::Loaded(Ok(Some(disabled))) | SettingsEvent::Changed(disabled) => {
            ctx.gate.set_chat_access_disabled(disabled);
        }
        SettingsEvent::Loaded(Ok(None)) => {
            tracing::warn!("Chat access setting row is missing; assuming enabled.");
        }
        SettingsEvent::Loaded(Err(e)) => {
            tracing::error!("Failed to fetch chat access setting: {}", e);
        }
        SettingsEvent::UpdateFailed(e) => {
            if e.is_authorization() {
                tracing::warn!("Store refused the chat access change: {}", e);
            } else {
                tracing::error!("Failed to update chat access setting: {}", e);
            }
            ctx.show_notice("Settings", "Failed to update chat access setting.");
        }
        SettingsEvent::ChannelError(e) => {
            tracing::error!("Chat access updates unavailable: {}", e);
        }
    }
}

fn handle_send_finished(
    state: &mut AppState,
    ctx: &AppContext,
    generation: u64,
    kind: ComposeKind,
    result: Result<(), StoreError>,
) {
    if !ctx.feed.is_current(generation) {
        tracing::debug!("Discarding {:?} send result from generation {}", kind, generation);
        return;
    }
    let AppState::LoggedIn(view) = state else {
        return;
    };
    let composer = match kind {
        ComposeKind::Chat => &mut view.chat,
        ComposeKind::Broadcast => &mut view.broadcast,
    };
    composer.finish_submit(result.is_ok());
    match result {
        Ok(()) => view.last_error = None,
        Err(e) => {
            tracing::error!("Failed to send {:?} message: {}", kind, e);
            view.last_error = Some(format!("Failed to send: {}", e));
        }
    }
}

fn handle_action(state: &mut AppState, ctx: &mut AppContext, action: Action) {
    match action {
        Action::Login => start_login(state, ctx),
        Action::ChangePassword => start_password_change(state, ctx),
        Action::RevealFinished => {
            if matches!(state, AppState::Granting { .. }) {
                if let AppState::Granting { session, .. } =
                    std::mem::replace(state, AppState::Startup)
                {
                    enter_chat(state, ctx, session);
                }
            }
        }
        Action::Logout => {
            if let Some(session) = &ctx.session {
                tracing::info!("Logging out {}", session.id);
            }
            ctx.unbind_session();
            forget_session(ctx);
            *state = AppState::LoggedOut(LoginForm::new());
        }
        Action::SendMessage => send_message(state, ctx),
        Action::SendBroadcast => send_broadcast(state, ctx),
        Action::ToggleAccess(disabled) => {
            if !ctx.gate.can_moderate() {
                return;
            }
            if let Some(services) = &ctx.services {
                tasks::spawn_toggle_access(services.store.clone(), ctx.event_tx.clone(), disabled);
            }
        }
        Action::SaveProfilePicture(path) => save_profile_picture(state, ctx, path),
        Action::DismissNotice => ctx.notice = None,
    }
}

fn start_login(state: &mut AppState, ctx: &mut AppContext) {
    let AppState::LoggedOut(form) = state else {
        return;
    };
    if form.in_progress || form.username.trim().is_empty() || form.password.is_empty() {
        return;
    }
    let Some(services) = &ctx.services else {
        form.error = Some("Store is not configured. Check your config file.".to_string());
        return;
    };
    form.in_progress = true;
    form.error = None;
    tasks::spawn_login(
        services.account.clone(),
        ctx.event_tx.clone(),
        form.username.trim().to_string(),
        form.password.clone(),
    );
}

fn start_password_change(state: &mut AppState, ctx: &mut AppContext) {
    let AppState::ChangePassword(form) = state else {
        return;
    };
    if form.in_progress || form.new_password.is_empty() {
        return;
    }
    let Some(services) = &ctx.services else {
        return;
    };
    form.in_progress = true;
    tasks::spawn_change_password(
        services.account.clone(),
        ctx.event_tx.clone(),
        form.user_id.clone(),
        form.new_password.clone(),
    );
}

fn send_message(state: &mut AppState, ctx: &mut AppContext) {
    let AppState::LoggedIn(view) = state else {
        return;
    };
    let (Some(session), Some(services)) = (&ctx.session, &ctx.services) else {
        return;
    };
    if !ctx.gate.can_send() {
        tracing::debug!("Send blocked by access gate");
        return;
    }
    match view.chat.begin_submit() {
        Draft::Ready(text) => {
            tasks::spawn_send(
                services.store.clone(),
                ctx.event_tx.clone(),
                ctx.feed.generation(),
                ComposeKind::Chat,
                NewMessage {
                    sender_id: session.id.clone(),
                    name: session.display_name().to_string(),
                    text,
                    is_broadcast: false,
                },
            );
        }
        Draft::TooLong { limit } => {
            ctx.show_notice(
                "Message Too Long",
                format!("Maximum character limit of {} reached.", limit),
            );
        }
        Draft::Empty | Draft::Busy => {}
    }
}

fn send_broadcast(state: &mut AppState, ctx: &mut AppContext) {
    let AppState::LoggedIn(view) = state else {
        return;
    };
    let (Some(session), Some(services)) = (&ctx.session, &ctx.services) else {
        return;
    };
    if !ctx.gate.can_moderate() {
        return;
    }
    if let Draft::Ready(text) = view.broadcast.begin_submit() {
        tasks::spawn_send(
            services.store.clone(),
            ctx.event_tx.clone(),
            ctx.feed.generation(),
            ComposeKind::Broadcast,
            NewMessage {
                sender_id: session.id.clone(),
                name: session.display_name().to_string(),
                text,
                is_broadcast: true,
            },
        );
    }
}

fn save_profile_picture(state: &mut AppState, ctx: &mut AppContext, path: PathBuf) {
    let AppState::LoggedIn(view) = state else {
        return;
    };
    if view.upload_in_progress || path.as_os_str().is_empty() {
        return;
    }
    let (Some(session), Some(services)) = (&ctx.session, &ctx.services) else {
        return;
    };
    view.upload_in_progress = true;
    tasks::spawn_avatar_update(
        services.account.clone(),
        ctx.event_tx.clone(),
        ctx.feed.generation(),
        session.id.clone(),
        path,
    );
}
