//! Rainbow interaction engine: likes, bookmarks, nested comments and
//! emoji reactions over a document store with atomic single-document
//! update operators. The HTTP layer lives in the consuming service;
//! this crate only exposes the typed services and their error surface.

pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod utils;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// 初始化日志 (消费方没有自己的订阅器时调用)
pub fn init_tracing(log_level: &str) {
    let filter = std::env::var("LOG_LEVEL").unwrap_or_else(|_| log_level.to_string());
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(filter))
        .with(tracing_subscriber::fmt::layer())
        .try_init();
}
