//! Amazon Q Business API tools
//!
//! Helpers for building applications on the Amazon Q Business API.
//!
//! # Features
//!
//! - **API façade**: typed records and lazily paginated async streams for
//!   applications, indices, data sources, documents and conversations, plus
//!   chat, chat controls, user aliases and custom data source uploads
//! - **Token exchange**: OIDC sign-in followed by the IAM Identity Center
//!   token exchange and an STS role assumption, yielding credentials that
//!   carry the signed-in user's identity
//! - **Demo web app**: per-request sign-in handshake with an injectable
//!   session store

#![forbid(unsafe_code)]

pub mod cli;
pub mod config;
pub mod error;
pub mod federation;
pub mod handshake;
pub mod oidc;
pub mod qbusiness;
pub mod random;
pub mod session;
pub mod web;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level`.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level.to_ascii_lowercase()))
        .map_err(|e| Error::Config(format!("Invalid log level {level:?}: {e}")))?;

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber
            .with(fmt::layer().json())
            .try_init()
            .map_err(|e| Error::Config(e.to_string())),
        _ => subscriber
            .with(fmt::layer())
            .try_init()
            .map_err(|e| Error::Config(e.to_string())),
    }
}
