pub mod api;
pub mod config;
pub mod error;
pub mod geo;
pub mod models;
pub mod observability;
pub mod platform;
pub mod presentation;
pub mod services;
pub mod state;
