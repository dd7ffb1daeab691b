// SPDX-License-Identifier: MIT OR Apache-2.0
//! Fan-out aggregation across registered property sources (spec component H).
//!
//! [`Aggregator`] holds every configured `chub-git`/`chub-credhub` source and
//! answers a single `(applications, profiles, label)` request two ways: a
//! flattened layer list for the plain config-server endpoint, and a merged
//! typed map for the format-specific endpoints.

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod aggregator;
mod merge;

pub use aggregator::Aggregator;
pub use merge::merge_map;
