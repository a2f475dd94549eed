use crate::{app::context::Notice, events::app_event::Action};
use eframe::egui::{self, Align2, Key};

pub fn draw_notice(ctx: &egui::Context, notice: &Notice, actions: &mut Vec<Action>) {
    egui::Window::new(notice.title.as_str())
        .collapsible(false)
        .resizable(false)
        .anchor(Align2::CENTER_CENTER, [0.0, 0.0])
        .show(ctx, |ui| {
            ui.label(notice.body.as_str());
            ui.add_space(8.0);
            let enter = ui.input(|i| i.key_pressed(Key::Enter));
            if ui.button("OK").clicked() || enter {
                actions.push(Action::DismissNotice);
            }
        });
}
