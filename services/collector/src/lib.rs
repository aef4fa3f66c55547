//! Source configuration, raw fetching and the memoizing dataset cache.

pub mod cache;
pub mod config;
pub mod error;
pub mod source;

pub use cache::{CacheEntry, Dataset, DatasetCache, DatasetState, SourceIdentity};
pub use config::Config;
pub use error::FetchError;
pub use source::{fetch_source, save_to_fs, RawArtifact, SourceLocation};
