pub mod aggregator;
pub mod chat;
pub mod config;
pub mod constants;
pub mod error;
pub mod facebook;
pub mod google_ads;
pub mod http;
pub mod logging;
pub mod mapper;
pub mod models;
pub mod provider;
pub mod server;
pub mod window;
