//! Object storage core for Cask.
//!
//! This crate implements the storage engine behind a Cask deployment:
//! bucket management with versioned access policies, multipart uploads
//! that assemble staged parts into final objects, and an asynchronous
//! batch engine for bulk upload, delete, copy, move and metadata jobs.
//! Everything runs in-process over pluggable object and metadata stores,
//! with in-memory implementations (plus disk spillover for large
//! payloads) provided out of the box.
//!
//! # Architecture
//!
//! ```text
//!         Cask (provider)
//!        /       |        \
//!       v        v         v
//!  bucket ops  MultipartCoordinator  BatchEngine (worker pool)
//!       \        |         /
//!        v       v        v
//!   MetadataStore      ObjectStore
//!   (records)          (payloads, spillover)
//! ```

pub mod auth;
pub mod batch;
mod bucket;
pub mod config;
pub mod error;
pub mod model;
pub mod multipart;
pub mod policy;
pub mod provider;
pub mod store;
pub mod utils;
pub mod validation;

pub use config::CaskConfig;
pub use error::{CaskError, CaskResult};
pub use provider::Cask;
