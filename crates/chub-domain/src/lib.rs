// SPDX-License-Identifier: MIT OR Apache-2.0
//! Shared wire types and the [`Source`] trait for config-hub.
//!
//! This crate has no behavior of its own: it is the vocabulary that
//! `chub-git`, `chub-credhub`, and `chub-aggregator` share — the source
//! descriptor JSON shape (§6), the property-layer response
//! shape, and the `Source` trait every backend implements.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod descriptor;
mod response;

pub use descriptor::{CredhubDescriptor, GitDescriptor, SourceDescriptor};
pub use response::{PropertySource, Response};

use async_trait::async_trait;
use chub_error::ChubError;

/// A backend contributing property layers to an aggregated response.
///
/// Implemented by `GitSource` and `CredhubSource`. The aggregator (`chub-aggregator`)
/// holds a `Vec<Box<dyn Source>>` in configured order and fans a single
/// request out to all of them.
#[async_trait]
pub trait Source: Send + Sync {
    /// Diagnostic name for this source (e.g. the git URI, or `"credhub"`).
    fn name(&self) -> String;

    /// Resolve property layers for the given `(apps, profiles, label)` tuple.
    ///
    /// `label` is `None` when the caller did not request one; sources that
    /// need a default (git's `defaultLabel`, credhub's implicit `master`)
    /// apply it internally.
    async fn find_properties(
        &self,
        apps: &[String],
        profiles: &[String],
        label: Option<&str>,
    ) -> Result<Vec<PropertySource>, ChubError>;

    /// An optional human-readable diagnostic report (e.g. branch listing).
    ///
    /// Returns `None` for sources with nothing meaningful to report. Async
    /// because `GitSource`'s report re-lists remote branches.
    async fn dashboard_report(&self) -> Option<String> {
        None
    }
}
