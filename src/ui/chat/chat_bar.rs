use crate::{
    app::{compose::Composer, gate::AccessGate},
    events::app_event::Action,
    models::user::Role,
};
use eframe::egui::{self, Color32};

pub fn draw_chat_bar(
    ui: &mut egui::Ui,
    composer: &mut Composer,
    gate: &AccessGate,
    max_chars: usize,
    last_error: &Option<String>,
    actions: &mut Vec<Action>,
) {
    let can_send = gate.can_send();
    ui.add_space(4.0);
    ui.horizontal(|ui| {
        let hint = match gate.role() {
            Some(Role::ReadOnly) => "Read-only access.",
            _ if !can_send => "Chat access is currently disabled.",
            _ => "Enter message...",
        };
        let response = ui.add_enabled(
            can_send,
            egui::TextEdit::singleline(&mut composer.buffer)
                .char_limit(max_chars)
                .hint_text(hint)
                .desired_width(ui.available_width() - 80.0),
        );
        let enter_pressed =
            response.lost_focus() && ui.input(|i| i.key_pressed(egui::Key::Enter));
        let ready = can_send && !composer.in_flight() && !composer.buffer.trim().is_empty();
        if ui.add_enabled(ready, egui::Button::new("Send")).clicked() || (enter_pressed && ready) {
            actions.push(Action::SendMessage);
        }
        if composer.in_flight() {
            ui.spinner();
        }
    });
    ui.add_space(4.0);
    if let Some(error) = last_error {
        ui.colored_label(Color32::RED, error);
    }
}
