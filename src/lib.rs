pub mod acquire;
pub mod catalog;
pub mod config;
pub mod db;
pub mod enrich;
pub mod export;
pub mod ids;
pub mod models;
pub mod training;

/// Application name for XDG paths
pub const APP_NAME: &str = "hitscope";
