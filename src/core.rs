pub mod account;
pub mod realtime;
pub mod store;
