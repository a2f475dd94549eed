pub mod app_layout;
pub mod chat;
pub mod dm_controls;
pub mod login;
pub mod notice;
pub mod settings;
