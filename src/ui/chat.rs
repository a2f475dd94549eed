pub mod chat_bar;
pub mod chat_log;
