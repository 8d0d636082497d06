pub mod config;
pub mod feed;
pub mod follow;
pub mod media;
pub mod server;
