use crate::{app::state::ChatView, events::app_event::Action};
use eframe::egui::{self, Color32, Key, RichText, TextEdit};

/// Moderation panel shown to admins and DMs.
pub fn draw_dm_controls(
    ui: &mut egui::Ui,
    view: &mut ChatView,
    chat_access_disabled: bool,
    actions: &mut Vec<Action>,
) {
    ui.heading("DM CONTROLS");
    ui.separator();

    let mut disabled = chat_access_disabled;
    if ui.checkbox(&mut disabled, "Disable chat access").changed() {
        actions.push(Action::ToggleAccess(disabled));
    }
    if chat_access_disabled {
        ui.label(RichText::new("Regular members cannot send.").color(Color32::YELLOW));
    }

    ui.add_space(12.0);
    ui.label("Broadcast");
    let response = ui.add(
        TextEdit::multiline(&mut view.broadcast.buffer)
            .hint_text("Message to everyone...")
            .desired_rows(3),
    );
    let ctrl_enter = response.has_focus()
        && ui.input(|i| i.modifiers.command && i.key_pressed(Key::Enter));
    let busy = view.broadcast.in_flight();
    if ui
        .add_enabled(!busy, egui::Button::new("Send Broadcast"))
        .clicked()
        || (ctrl_enter && !busy)
    {
        actions.push(Action::SendBroadcast);
    }
    if busy {
        ui.spinner();
    }
}
