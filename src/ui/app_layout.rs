use crate::{
    app::{
        config::{self, Config},
        context::AppContext,
        reducer,
        session::IdentityHolder,
        state::{AppState, ChatView},
    },
    events::app_event::{Action, AppEvent},
    ui::{
        chat::{chat_bar, chat_log},
        dm_controls, login, notice, settings,
    },
};
use eframe::egui::{self, Align, Color32, Layout, RichText, SidePanel, TopBottomPanel};
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

pub struct App {
    state: AppState,
    ctx: AppContext,
    event_rx: mpsc::Receiver<AppEvent>,
    startup_task_spawned: bool,
    last_frame: Instant,
}

impl App {
    pub fn new(cc: &eframe::CreationContext<'_>) -> Self {
        egui_extras::install_image_loaders(&cc.egui_ctx);
        cc.egui_ctx.set_visuals(egui::Visuals::dark());

        let (event_tx, event_rx) = mpsc::channel(256);
        let identity = IdentityHolder::new().unwrap_or_else(|e| {
            tracing::warn!("No config directory for the session file: {}", e);
            IdentityHolder::with_path("session.json")
        });

        Self {
            state: AppState::Startup,
            ctx: AppContext::new(Config::default(), identity, event_tx),
            event_rx,
            startup_task_spawned: false,
            last_frame: Instant::now(),
        }
    }
}

impl eframe::App for App {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.apply_settings(ctx);

        while let Ok(event) = self.event_rx.try_recv() {
            reducer::reduce(&mut self.state, &mut self.ctx, event);
        }

        let elapsed = self.last_frame.elapsed();
        self.last_frame = Instant::now();
        let animating = self.advance_typewriters(elapsed);

        let mut actions = Vec::new();
        match &mut self.state {
            AppState::Startup => {
                if !self.startup_task_spawned {
                    self.startup_task_spawned = true;
                    let tx = self.ctx.event_tx.clone();
                    tokio::spawn(async move {
                        let result = config::load().await;
                        tx.send(AppEvent::ConfigLoaded(result)).await.ok();
                    });
                }
                draw_loading_ui(ctx, "Starting...");
            }
            AppState::LoggedOut(form) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    login::draw_login(ui, form, &mut actions);
                });
            }
            AppState::ChangePassword(form) => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    login::draw_password_change(ui, form, &mut actions);
                });
            }
            AppState::Granting { reveal, .. } => {
                egui::CentralPanel::default().show(ctx, |ui| {
                    login::draw_reveal(ui, reveal, &mut actions);
                });
            }
            AppState::LoggedIn(view) => draw_logged_in(ctx, view, &self.ctx, &mut actions),
        }

        if let Some(current) = &self.ctx.notice {
            notice::draw_notice(ctx, current, &mut actions);
        }

        for action in actions {
            reducer::reduce(&mut self.state, &mut self.ctx, AppEvent::Action(action));
        }

        if animating {
            ctx.request_repaint();
        } else {
            ctx.request_repaint_after(Duration::from_millis(100));
        }
    }
}

impl App {
    fn apply_settings(&mut self, ctx: &egui::Context) {
        let mut style = (*ctx.style()).clone();
        style.text_styles.iter_mut().for_each(|(_, font_id)| {
            font_id.size = self.ctx.config.font_size;
        });
        ctx.set_style(style);
    }

    /// Returns true while a reveal is still typing.
    fn advance_typewriters(&mut self, elapsed: Duration) -> bool {
        let writer = match &mut self.state {
            AppState::LoggedOut(form) => &mut form.banner,
            AppState::Granting { reveal, .. } => reveal,
            _ => return false,
        };
        writer.advance(elapsed);
        !writer.is_finished()
    }
}

fn draw_loading_ui(ctx: &egui::Context, message: &str) {
    egui::CentralPanel::default().show(ctx, |ui| {
        ui.centered_and_justified(|ui| {
            ui.with_layout(Layout::top_down(Align::Center), |ui| {
                ui.heading(message);
                ui.add_space(10.0);
                ui.spinner();
            });
        });
    });
}

fn draw_logged_in(
    ctx: &egui::Context,
    view: &mut ChatView,
    app: &AppContext,
    actions: &mut Vec<Action>,
) {
    TopBottomPanel::top("top_panel").show(ctx, |ui| {
        ui.horizontal(|ui| {
            ui.label(
                RichText::new(chrono::Local::now().format("%H:%M").to_string()).monospace(),
            );
            ui.heading(RichText::new("HROOMS").strong());
            ui.with_layout(Layout::right_to_left(Align::Center), |ui| {
                if ui.button("Logout").clicked() {
                    actions.push(Action::Logout);
                }
                if ui.button("⚙").on_hover_text("Settings").clicked() {
                    view.show_settings = !view.show_settings;
                }
                if let Some(session) = &app.session {
                    ui.label(session.display_name());
                }
            });
        });
        if let Some(error) = &app.feed_error {
            ui.colored_label(Color32::YELLOW, format!("⚠ {}", error));
        }
    });

    TopBottomPanel::bottom("bottom_panel").show(ctx, |ui| {
        chat_bar::draw_chat_bar(
            ui,
            &mut view.chat,
            &app.gate,
            app.config.max_message_chars,
            &view.last_error,
            actions,
        );
    });

    if app.gate.can_moderate() {
        SidePanel::right("dm_controls_panel")
            .min_width(180.0)
            .default_width(220.0)
            .show(ctx, |ui| {
                dm_controls::draw_dm_controls(ui, view, app.gate.chat_access_disabled(), actions);
            });
    }

    egui::CentralPanel::default().show(ctx, |ui| {
        chat_log::draw_chat_log(ui, &app.feed, &app.profiles);
    });

    if view.show_settings {
        let avatar = app
            .profiles
            .local_avatar()
            .unwrap_or(app.profiles.placeholder());
        settings::draw_settings_window(ctx, view, avatar, actions);
    }
}
