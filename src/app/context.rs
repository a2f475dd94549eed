use crate::{
    app::{
        config::Config, feed::FeedSynchronizer, gate::AccessGate, profiles::ProfileResolver,
        session::IdentityHolder, tasks,
    },
    core::{
        account::AccountService,
        realtime::{ChangeChannel, RealtimeClient},
        store::{FeedStore, RestStore},
    },
    events::app_event::AppEvent,
    models::user::Session,
};
use std::sync::Arc;
use tokio::{sync::mpsc, task::JoinHandle};

/// External collaborators the core talks to.
#[derive(Clone)]
pub struct Services {
    pub store: Arc<dyn FeedStore>,
    pub channel: Arc<dyn ChangeChannel>,
    pub account: Arc<dyn AccountService>,
}

impl Services {
    pub fn connect(config: &Config) -> Result<Self, eyre::Report> {
        let endpoint = config.store_endpoint()?;
        let store = RestStore::new(endpoint.clone())?;
        let channel = RealtimeClient::new(&endpoint)?;
        tracing::info!("Using store at {}", endpoint.base_url);
        Ok(Self {
            store: Arc::new(store.clone()),
            channel: Arc::new(channel),
            account: Arc::new(store),
        })
    }
}

/// A blocking, modal-style message for hard failures.
#[derive(Clone, Debug, PartialEq)]
pub struct Notice {
    pub title: String,
    pub body: String,
}

/// Top-level context. Owns the session and every long-lived subscription;
/// the session only changes through `bind_session`/`unbind_session`.
pub struct AppContext {
    pub config: Config,
    pub identity: IdentityHolder,
    pub services: Option<Services>,
    pub session: Option<Session>,
    pub gate: AccessGate,
    pub feed: FeedSynchronizer,
    pub profiles: ProfileResolver,
    pub notice: Option<Notice>,
    /// Set while live updates are unavailable.
    pub feed_error: Option<String>,
    pub event_tx: mpsc::Sender<AppEvent>,
    feed_task: Option<JoinHandle<()>>,
    settings_task: Option<JoinHandle<()>>,
}

impl AppContext {
    pub fn new(config: Config, identity: IdentityHolder, event_tx: mpsc::Sender<AppEvent>) -> Self {
        Self {
            gate: AccessGate::new(config.privileged_bypass_gate),
            profiles: ProfileResolver::new(config.placeholder_avatar_url.clone()),
            config,
            identity,
            services: None,
            session: None,
            feed: FeedSynchronizer::new(),
            notice: None,
            feed_error: None,
            event_tx,
            feed_task: None,
            settings_task: None,
        }
    }

    #[cfg(test)]
    pub fn with_services(mut self, services: Services) -> Self {
        self.services = Some(services);
        self
    }

    /// Adopts a freshly loaded config. Only valid before the first bind.
    pub fn apply_config(&mut self, config: Config) {
        self.gate.set_privileged_bypass(config.privileged_bypass_gate);
        self.profiles = ProfileResolver::new(config.placeholder_avatar_url.clone());
        if self.services.is_none() {
            match Services::connect(&config) {
                Ok(services) => self.services = Some(services),
                Err(e) => tracing::error!("Store unavailable: {}", e),
            }
        }
        self.config = config;
    }

    /// Binds every per-user component to `session`, releasing the previous
    /// binding first.
    pub fn bind_session(&mut self, session: Session) {
        self.release_feed();
        self.feed_error = None;
        self.gate.bind(session.role.clone());
        self.profiles
            .bind(&session.id, session.profile_picture.clone());
        let generation = self.feed.bind(&session.id);
        self.session = Some(session);

        if let Some(services) = &self.services {
            self.feed_task = Some(tasks::spawn_feed(
                services.clone(),
                self.event_tx.clone(),
                generation,
            ));
        } else {
            tracing::error!("No store configured; feed stays empty.");
        }
        self.ensure_settings_watch();
    }

    pub fn unbind_session(&mut self) {
        self.release_feed();
        self.feed.unbind();
        self.gate.unbind();
        self.profiles.unbind();
        self.feed_error = None;
        self.session = None;
    }

    /// Cancels the message subscription and any snapshot still in flight.
    fn release_feed(&mut self) {
        if let Some(task) = self.feed_task.take() {
            task.abort();
            tracing::debug!("Released feed binding");
        }
    }

    /// Starts the process-wide settings subscription once.
    pub fn ensure_settings_watch(&mut self) {
        if self.settings_task.is_some() {
            return;
        }
        if let Some(services) = &self.services {
            self.settings_task = Some(tasks::spawn_settings_watch(
                services.clone(),
                self.event_tx.clone(),
            ));
        }
    }

    pub fn show_notice(&mut self, title: impl Into<String>, body: impl Into<String>) {
        self.notice = Some(Notice {
            title: title.into(),
            body: body.into(),
        });
    }
}

impl Drop for AppContext {
    fn drop(&mut self) {
        self.release_feed();
        if let Some(task) = self.settings_task.take() {
            task.abort();
        }
    }
}
