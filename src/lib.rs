pub mod api;
pub mod app;
pub mod cache;
pub mod client;
pub mod config;
pub mod consumption;
pub mod fetch_error;
pub mod meter;
pub mod price;
pub mod reconciler;
pub mod scheduler;
pub mod sensor;
pub mod services;
