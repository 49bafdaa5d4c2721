//! Infra Monitor - a fleet monitoring service
//!
//! Keeps an inventory of servers in SQLite, drives a per-server state machine
//! that simulates their health and load, and exposes both over a JSON API and
//! a Prometheus scrape endpoint.

pub mod api;
pub mod app;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod internal_metrics;
pub mod simulation;
pub mod store;
pub mod task_manager;
pub mod ticker;

pub use crate::core::*;
