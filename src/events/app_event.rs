use crate::{
    app::{compose::ComposeKind, config::Config},
    core::{account::LoginOutcome, store::StoreError},
    models::{message::MessageRow, user::Session},
};
use std::{collections::HashMap, path::PathBuf};

#[derive(Debug)]
pub enum AppEvent {
    ConfigLoaded(Result<Config, eyre::Report>),
    SessionRestored(Result<Option<Session>, eyre::Report>),
    Auth(AuthEvent),
    Feed(FeedEvent),
    Settings(SettingsEvent),
    ProfilesLoaded {
        generation: u64,
        requested: Vec<String>,
        result: Result<HashMap<String, Option<String>>, StoreError>,
    },
    Send(SendEvent),
    Action(Action),
}

#[derive(Debug)]
pub enum AuthEvent {
    LoginFinished(Result<LoginOutcome, StoreError>),
    PasswordChanged(Result<(), StoreError>),
    AvatarUpdated {
        generation: u64,
        result: Result<String, String>,
    },
}

/// Traffic for one feed binding, tagged with its generation.
#[derive(Debug)]
pub enum FeedEvent {
    Snapshot {
        generation: u64,
        result: Result<Vec<MessageRow>, StoreError>,
    },
    Inserted {
        generation: u64,
        row: MessageRow,
    },
    ChannelError {
        generation: u64,
        error: StoreError,
    },
}

#[derive(Debug)]
pub enum SettingsEvent {
    Loaded(Result<Option<bool>, StoreError>),
    Changed(bool),
    UpdateFailed(StoreError),
    ChannelError(StoreError),
}

#[derive(Debug)]
pub enum SendEvent {
    Finished {
        generation: u64,
        kind: ComposeKind,
        result: Result<(), StoreError>,
    },
}

/// Requests coming from the rendering layer.
#[derive(Debug, Clone, PartialEq)]
pub enum Action {
    Login,
    ChangePassword,
    RevealFinished,
    Logout,
    SendMessage,
    SendBroadcast,
    ToggleAccess(bool),
    SaveProfilePicture(PathBuf),
    DismissNotice,
}
