//! Data access: sources, retry, response caching and error taxonomy.

pub mod cache;
pub mod client;
pub mod error;
pub mod source;

pub use client::DataClient;
pub use error::FetchError;
pub use source::{DataSource, FixtureSource, HttpSource, Source};
