//! Package resolution layer
//!
//! This module defines the capability contract every package source satisfies
//! and the aggregate resolver that composes several sources into one.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//! │   Source 0   │   │   Source 1   │   │   Source N   │
//! │ (resolvers)  │   │ (resolvers)  │   │ (resolvers)  │
//! └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!        └──────────────────┼──────────────────┘
//!                           ▼
//!                  ┌─────────────────┐
//!                  │    Aggregate    │──▶ merged versions, owner lookup
//!                  │ (fan-out, cache)│
//!                  └─────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`aggregate`]: Composes multiple resolvers with partial-failure tolerance
//! - [`error`]: Error types shared by every resolver
//! - [`fan_out`]: Concurrent "wait for all, then decide" helper
//! - [`traits`]: The `PackageResolver` and `DownloadSizeProvider` contracts
//! - [`types`]: Download parameters passed through to sources

pub mod aggregate;
pub mod error;
pub mod fan_out;
pub mod traits;
pub mod types;

pub use aggregate::{AggregateResolver, ResolvedOwner};
pub use error::{AggregateError, ResolverError};
pub use traits::{DownloadSizeProvider, PackageResolver};
pub use types::{ProgressSink, VerificationInfo};
