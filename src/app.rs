pub mod compose;
pub mod config;
pub mod context;
pub mod feed;
pub mod gate;
pub mod profiles;
pub mod reducer;
pub mod session;
pub mod state;
pub mod tasks;
