pub mod message;
pub mod setting;
pub mod user;
