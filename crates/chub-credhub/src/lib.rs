// SPDX-License-Identifier: MIT OR Apache-2.0
//! The credhub-backed property source (spec §3 component G, §4.6, §4.7).
//!
//! A process-wide singleton [`CredhubSource`] re-lists a [`CredentialsIndex`]
//! on every request against an opaque [`SecretStoreClient`], then resolves,
//! adds, deletes, and lists secrets scoped by `(app, profile, label)`.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod error;
mod index;
mod source;
mod store;

pub use error::CredhubError;
pub use index::CredentialsIndex;
pub use source::{CredhubSource, SecretName};
pub use store::{HttpSecretStoreClient, SecretStoreClient};
