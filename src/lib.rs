//! Slidegen: Resumable Slide Image Generation
//!
//! Turns a stored slide outline plus a chosen visual style into one generated
//! image per page. Jobs persist per-page status as they go, survive partial
//! failures and process restarts, and report progress to any number of observers.

pub mod api;
pub mod cli;
pub mod config;
pub mod error;
pub mod generation;
pub mod logging;
pub mod provider;
pub mod retry;
pub mod store;
pub mod types;
