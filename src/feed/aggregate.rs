use std::collections::HashSet;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::feed::fetcher::{FetchError, SourceFetcher};
use crate::feed::pool::{PoolError, WorkerPool};
use crate::feed::types::{FeedItem, SourceDescriptor};

/// Batch-level outcome classifications.
///
/// Individual source errors never cross this boundary; they are logged and
/// counted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AggregateError {
    /// Every source failed (or there were no sources)
    #[error("no content available: all feeds failed")]
    NoContent,
    /// Some sources failed; the items that did arrive are still returned
    #[error("partial content: missing {missing} feeds")]
    PartialContent { missing: usize },
    /// The batch could not be scheduled
    #[error("no content available: {0}")]
    Pool(#[from] PoolError),
    /// The caller cancelled the batch before it finished
    #[error("aggregation cancelled")]
    Cancelled,
}

/// Items from one aggregation pass, newest first, unique by link.
#[derive(Debug, Clone)]
pub struct Aggregation {
    pub items: Vec<FeedItem>,
    /// Sources that failed to fetch or decode
    pub failed: usize,
    /// Sources submitted
    pub total: usize,
}

impl Aggregation {
    pub fn is_partial(&self) -> bool {
        self.failed > 0
    }

    /// [`AggregateError::PartialContent`] when any source failed.
    pub fn error(&self) -> Option<AggregateError> {
        self.is_partial().then_some(AggregateError::PartialContent {
            missing: self.failed,
        })
    }

    /// Splits into items and the partial-content classification, if any.
    pub fn into_parts(self) -> (Vec<FeedItem>, Option<AggregateError>) {
        let error = self.error();
        (self.items, error)
    }
}

/// Fans sources out across a [`WorkerPool`] and folds the results into one
/// deduplicated, recency-ordered collection.
///
/// Holds no state between calls.
pub struct Aggregator<F> {
    fetcher: F,
    pool: WorkerPool,
}

impl<F: SourceFetcher> Aggregator<F> {
    pub fn new(fetcher: F, pool: WorkerPool) -> Self {
        Self { fetcher, pool }
    }

    /// Fetches every source and merges their items.
    ///
    /// Results are collated in input order, so when two sources carry the
    /// same link the earlier source's item is kept regardless of which fetch
    /// finished first. The merged items are stably sorted newest first.
    ///
    /// # Errors
    ///
    /// - [`AggregateError::NoContent`] - every source failed, or `sources` is empty
    /// - [`AggregateError::Pool`] - the pool refused the batch
    /// - [`AggregateError::Cancelled`] - `cancel` fired; in-flight requests are dropped
    ///
    /// Partial failure is not an error here: inspect [`Aggregation::error`].
    pub async fn aggregate(
        &self,
        sources: &[SourceDescriptor],
        cancel: &CancellationToken,
    ) -> Result<Aggregation, AggregateError> {
        let batch = self
            .pool
            .run(sources, |source| self.fetcher.fetch(source));

        let results = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(total = sources.len(), "Aggregation cancelled");
                return Err(AggregateError::Cancelled);
            }
            results = batch => results?,
        };

        collate(sources, results)
    }
}

/// Single-threaded pass over the finished batch: count failures, drop
/// repeated links (first seen wins), classify, sort.
fn collate(
    sources: &[SourceDescriptor],
    results: Vec<Result<Vec<FeedItem>, FetchError>>,
) -> Result<Aggregation, AggregateError> {
    let total = sources.len();
    let mut failed = 0;
    let mut seen: HashSet<String> = HashSet::new();
    let mut items: Vec<FeedItem> = Vec::with_capacity(total.saturating_mul(10));

    for (source, result) in sources.iter().zip(results) {
        match result {
            Ok(fetched) => {
                for item in fetched {
                    if seen.insert(item.link.clone()) {
                        items.push(item);
                    }
                }
            }
            Err(e) => {
                failed += 1;
                tracing::warn!(url = %source.url, error = %e, "Failed to get feed");
            }
        }
    }

    if failed == total {
        tracing::warn!(total = total, "No feeds could be fetched");
        return Err(AggregateError::NoContent);
    }

    // sort_by is stable: equal timestamps keep source/encounter order
    items.sort_by(|a, b| b.published_at.cmp(&a.published_at));

    tracing::info!(
        total = total,
        failed = failed,
        items = items.len(),
        "Aggregated feeds"
    );

    Ok(Aggregation {
        items,
        failed,
        total,
    })
}
