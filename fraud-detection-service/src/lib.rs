pub mod agent;
pub mod analytics;
pub mod config;
pub mod gateway;
pub mod models;
pub mod presentation;
pub mod samples;
pub mod service;
pub mod telemetry;
pub mod tools;
pub mod vector;

pub use config::AppConfig;
pub use service::{AppState, build_router, create_app};
