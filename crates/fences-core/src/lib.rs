//! Core domain + application logic for the fences bot.
//!
//! This crate is intentionally framework-agnostic. Telegram and the document
//! store live behind ports (traits) implemented in adapter crates; the JSON
//! file store ships here as the default adapter.

pub mod broadcast;
pub mod config;
pub mod directory;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod gate;
pub mod logging;
pub mod messaging;
pub mod monitor;
pub mod session;
pub mod store;
pub mod texts;

pub use errors::{Error, ErrorClass, Result};
