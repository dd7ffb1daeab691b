// SPDX-License-Identifier: MIT OR Apache-2.0
//! The git-backed property source (spec §3 component E, §4.2, §4.3, §4.4, §4.5).
//!
//! Each configured git descriptor becomes a local [`Repository`] working
//! tree plus a resolved [`auth::AuthMethod`]; [`GitSource`] ties the two
//! together with file discovery and property parsing to implement
//! `chub_domain::Source`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod auth;
mod credential_helper;
mod discovery;
mod error;
mod repository;
mod source;
mod token;

pub use auth::{validate, AuthMethod, ValidatedDescriptor};
pub use credential_helper::{
    drain_stdin, parse_stdin_request, render_get_response, CredentialRegistry, CredentialsRequest,
};
pub use discovery::{discover, locate_import};
pub use error::GitError;
pub use repository::{repo_path_fragment, AuthInjection, Branch, Repository};
pub use source::GitSource;
pub use token::{CredhubSecretFetcher, MiWifTokenProvider, SpnTokenProvider, TokenProvider};
