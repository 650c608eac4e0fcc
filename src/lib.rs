pub mod app;
pub mod blog;
pub mod cli;
pub mod config;
pub mod journaling;
pub mod storage;

pub use app::BlogApp;
pub use config::{AppConfig, ConfigLoader, ConfigPaths};
