pub mod api;
pub mod client;
pub mod config;
pub mod errors;
pub mod events;
pub mod protocol;
pub mod subscription;
pub mod token;
mod utils;
