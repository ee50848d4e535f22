//! Package source implementations

pub mod directory;
pub mod http;
pub mod metadata;
pub mod transfer;

pub use directory::DirectoryResolver;
pub use http::HttpReleaseResolver;
pub use metadata::{ReleaseItem, ReleaseMetadata};
