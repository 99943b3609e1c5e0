//! Crawled show records and their identifier normalization.

mod types;

pub use types::*;
