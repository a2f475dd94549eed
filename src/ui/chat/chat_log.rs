use crate::{
    app::{feed::FeedSynchronizer, profiles::ProfileResolver},
    models::message::{MessageKind, ViewMessage},
};
use eframe::egui::{self, Align, Color32, Image, Layout, RichText, ScrollArea, Vec2};

const AVATAR_SIZE: f32 = 32.0;
const BROADCAST_COLOR: Color32 = Color32::from_rgb(0xff, 0xb3, 0x00);

pub fn draw_chat_log(ui: &mut egui::Ui, feed: &FeedSynchronizer, profiles: &ProfileResolver) {
    ScrollArea::vertical()
        .id_salt("chat_log_scroll_area")
        .stick_to_bottom(true)
        .auto_shrink([false, false])
        .show(ui, |ui| {
            for group in feed.groups() {
                ui.add_space(6.0);
                ui.vertical_centered(|ui| {
                    ui.label(RichText::new(group.heading()).color(Color32::from_gray(140)));
                });
                for message in &group.messages {
                    match message.kind {
                        MessageKind::Broadcast => draw_broadcast(ui, message),
                        MessageKind::Sent => {
                            ui.with_layout(Layout::right_to_left(Align::TOP), |ui| {
                                draw_message(ui, message, "You", profiles);
                            });
                        }
                        MessageKind::Received => {
                            let name = message.name.as_deref().unwrap_or("Anonymous");
                            ui.horizontal_wrapped(|ui| {
                                draw_message(ui, message, name, profiles);
                            });
                        }
                    }
                }
            }
        });
}

fn draw_broadcast(ui: &mut egui::Ui, message: &ViewMessage) {
    ui.vertical_centered(|ui| {
        ui.label(
            RichText::new(format!("[BROADCAST] {}", message.text))
                .strong()
                .color(BROADCAST_COLOR),
        );
    });
}

fn draw_message(ui: &mut egui::Ui, message: &ViewMessage, label: &str, profiles: &ProfileResolver) {
    ui.set_min_height(AVATAR_SIZE);
    ui.add(
        Image::new(profiles.avatar_for(message))
            .max_size(Vec2::splat(AVATAR_SIZE))
            .corner_radius(AVATAR_SIZE / 2.0),
    );
    ui.label(RichText::new(label).strong());
    let time = message
        .time
        .clone()
        .unwrap_or_else(|| chrono::Local::now().format("%H:%M").to_string());
    ui.label(RichText::new(time).color(Color32::from_gray(128)));
    ui.label(message.text.as_str());
}
