// SPDX-License-Identifier: MIT OR Apache-2.0
//! Startup configuration parsing: env vars and the `CH_SOURCES`/`CREDHUB-REF`
//! source descriptor blob (§6).

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod server_config;
mod sources;

pub use error::ConfigError;
pub use server_config::{load, load_from, JsonCredentialFetcher, ServerConfig, VarLookup, DEFAULT_PORT};
pub use sources::{parse_sources, validate_sources};
