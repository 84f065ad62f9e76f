pub mod config;
pub mod error;
pub mod handlers;
pub mod model;
pub mod models;
pub mod pipeline;
