//! Listing source: HTTP adapter, markup extraction and the shared rate limiter.

mod eztv;
mod extract;
mod rate_limiter;
mod types;

pub use eztv::EztvSource;
pub use extract::{extract_external_id, parse_listing};
pub use rate_limiter::{RateLimitStatus, RateLimiter, TokenBucket};
pub use types::*;
