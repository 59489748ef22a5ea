pub mod api;
pub mod app;
pub mod config;
pub mod exporters;
pub mod gap_fill;
pub mod importers;
pub mod models;
pub mod services;
pub mod utils;
