//! Feed aggregation pipeline.
//!
//! A batch of [`SourceDescriptor`]s goes in, one merged list of
//! [`FeedItem`]s comes out:
//!
//! - [`fetcher`] - HTTP retrieval of a single source with size and time limits
//! - [`decoder`] - RSS/Atom/JSON Feed decoding behind the [`FeedDecoder`] seam
//! - [`normalize`] - mapping decoded entries into display-ready items
//! - [`pool`] - bounded-parallelism batch runner
//! - [`aggregate`] - fan-out, dedup, sort and failure accounting
//!
//! # Example
//!
//! ```ignore
//! let fetcher = HttpFetcher::new(reqwest::Client::new());
//! let aggregator = Aggregator::new(fetcher, WorkerPool::default());
//! let outcome = aggregator.aggregate(&sources, &CancellationToken::new()).await?;
//! ```

pub mod aggregate;
pub mod decoder;
pub mod fetcher;
pub mod normalize;
pub mod pool;
mod types;

pub use aggregate::{AggregateError, Aggregation, Aggregator};
pub use decoder::{DecodeError, FeedDecoder, FeedRsDecoder};
pub use fetcher::{
    FetchError, HttpFetcher, SourceFetcher, DEFAULT_TIMEOUT, DEFAULT_USER_AGENT, MAX_FEED_SIZE,
};
pub use normalize::normalize;
pub use pool::{PoolError, WorkerPool};
pub use types::{ChannelMeta, DecodedFeed, FeedItem, RawItem, SourceDescriptor};
