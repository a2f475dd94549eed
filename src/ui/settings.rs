use crate::{app::state::ChatView, events::app_event::Action};
use eframe::egui::{self, Image, Vec2};
use std::path::PathBuf;

pub fn draw_settings_window(
    ctx: &egui::Context,
    view: &mut ChatView,
    current_avatar: &str,
    actions: &mut Vec<Action>,
) {
    let mut open = view.show_settings;
    egui::Window::new("Settings")
        .open(&mut open)
        .collapsible(false)
        .show(ctx, |ui| {
            ui.heading("Profile Picture");
            ui.add(
                Image::new(current_avatar)
                    .max_size(Vec2::splat(96.0))
                    .corner_radius(48.0),
            );
            ui.add_space(6.0);
            ui.label("Image file:");
            ui.text_edit_singleline(&mut view.avatar_path);

            ui.horizontal(|ui| {
                let can_save = !view.upload_in_progress && !view.avatar_path.trim().is_empty();
                if ui.add_enabled(can_save, egui::Button::new("Save")).clicked() {
                    actions.push(Action::SaveProfilePicture(PathBuf::from(
                        view.avatar_path.trim(),
                    )));
                }
                if ui.button("Close").clicked() {
                    view.show_settings = false;
                }
                if view.upload_in_progress {
                    ui.spinner();
                }
            });
        });
    view.show_settings &= open;
}
