//! Page acquisition for the extract stages.
//!
//! The scraping mechanism itself is a black box behind [`PageFetcher`]:
//! `fetch(url) → html`, with authentication as a side effect of
//! [`Authenticator::ensure_session`]. Around that sit the pieces the
//! pipeline owns: a bounded-concurrency dispatcher with rate limiting,
//! and capped exponential backoff with full jitter.

mod backoff;
mod dispatch;
mod error;
mod fetcher;
mod session;

pub use backoff::{retry, retry_with_backoff, BackoffPolicy};
pub use dispatch::{Dispatcher, FetchOutcome};
pub use error::FetchError;
pub use fetcher::{HttpFetcher, PageFetcher};
pub use session::{Authenticator, NullAuthenticator, SessionLogin};
