//! Forecast HTTP service

pub mod api;
pub mod config;
pub mod error;
