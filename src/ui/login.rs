use crate::{
    app::state::{LoginForm, PasswordForm},
    events::app_event::Action,
    utils::typewriter::Typewriter,
};
use eframe::egui::{self, Align, Color32, Key, Layout, RichText, TextEdit};

const TERMINAL_GREEN: Color32 = Color32::from_rgb(0x4a, 0xf6, 0x26);

fn terminal_text(ui: &mut egui::Ui, text: &str) {
    ui.label(RichText::new(text).monospace().color(TERMINAL_GREEN));
}

pub fn draw_login(ui: &mut egui::Ui, form: &mut LoginForm, actions: &mut Vec<Action>) {
    ui.with_layout(Layout::top_down(Align::Center), |ui| {
        ui.add_space(ui.available_height() * 0.15);
        ui.heading(RichText::new("HROOMS").strong());
        ui.add_space(10.0);
        terminal_text(ui, form.banner.output());
        ui.add_space(20.0);

        ui.label("Codename");
        let username = ui.add(
            TextEdit::singleline(&mut form.username)
                .hint_text("Enter codename...")
                .desired_width(240.0),
        );
        ui.label("Password");
        let password = ui.add(
            TextEdit::singleline(&mut form.password)
                .password(!form.show_password)
                .hint_text("Enter password...")
                .desired_width(240.0),
        );
        ui.checkbox(&mut form.show_password, "Show password");

        let enter_pressed = (username.lost_focus() || password.lost_focus())
            && ui.input(|i| i.key_pressed(Key::Enter));
        let can_submit =
            !form.in_progress && !form.username.trim().is_empty() && !form.password.is_empty();

        ui.add_space(10.0);
        if ui
            .add_enabled(can_submit, egui::Button::new("Deploy"))
            .clicked()
            || (enter_pressed && can_submit)
        {
            actions.push(Action::Login);
        }
        if form.in_progress {
            ui.spinner();
        }
        if let Some(err) = &form.error {
            ui.colored_label(Color32::RED, err);
        }
    });
}

pub fn draw_password_change(ui: &mut egui::Ui, form: &mut PasswordForm, actions: &mut Vec<Action>) {
    ui.with_layout(Layout::top_down(Align::Center), |ui| {
        ui.add_space(ui.available_height() * 0.2);
        ui.heading("Password Change Required");
        ui.label("Set a new password before continuing.");
        ui.add_space(10.0);
        let response = ui.add(
            TextEdit::singleline(&mut form.new_password)
                .password(!form.show_password)
                .hint_text("New password...")
                .desired_width(240.0),
        );
        ui.checkbox(&mut form.show_password, "Show password");

        let enter_pressed = response.lost_focus() && ui.input(|i| i.key_pressed(Key::Enter));
        let can_submit = !form.in_progress && !form.new_password.is_empty();
        if ui
            .add_enabled(can_submit, egui::Button::new("Update Password"))
            .clicked()
            || (enter_pressed && can_submit)
        {
            actions.push(Action::ChangePassword);
        }
        if form.in_progress {
            ui.spinner();
        }
    });
}

/// Plays the access-granted lines. Escape skips ahead.
pub fn draw_reveal(ui: &mut egui::Ui, reveal: &mut Typewriter, actions: &mut Vec<Action>) {
    if ui.input(|i| i.key_pressed(Key::Escape)) {
        reveal.finish();
    }
    ui.with_layout(Layout::top_down(Align::Min), |ui| {
        ui.add_space(40.0);
        terminal_text(ui, reveal.output());
    });
    if reveal.is_finished() {
        actions.push(Action::RevealFinished);
    }
}
