//! Paperfetch Core Library
//!
//! Fetches full-text PDFs for a list of DOIs by walking a prioritized chain of
//! providers (open-access APIs, repository search pages, mirror-rotating
//! shadow libraries) until one yields a file that passes validation.
//!
//! # Architecture
//!
//! - [`config`] - TOML configuration and validation
//! - [`parser`] - RIS bibliography input
//! - [`provider`] - Provider trait, built-in providers, and the registry
//! - [`routing`] - Per-provider proxy routing and shared HTTP clients
//! - [`download`] - Batch engine, payload fetch, validation, attempt log
//! - [`report`] - Text and JSON run reports

// Clippy lints - strict for library code
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod download;
pub mod parser;
pub mod provider;
pub mod report;
pub mod routing;
mod user_agent;

#[cfg(test)]
mod test_support;

// Re-export commonly used types
pub use config::{ConfigError, FetchConfig};
pub use download::{
    Attempt, AttemptStatus, BatchOutcome, BatchSummary, DownloadEngine, DownloadResult,
    EngineError, EngineOptions, ResultStatus,
};
pub use parser::{BibEntry, Metadata, load_ris, parse_ris};
pub use provider::{Provider, ProviderError, ProviderRegistry, Resolved};
pub use routing::{HttpPool, RoutedClient, RoutingPolicy};
pub use user_agent::BROWSER_USER_AGENT;
