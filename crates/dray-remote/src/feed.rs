use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};

/// Snapshot of what a screen should show for one remote collection.
///
/// In a settled snapshot (`loading == false`) either `error` holds the
/// message of the last failed fetch or `items` is the latest successful
/// result. While a fetch is in flight, `items` and `error` keep their
/// previous settled values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UiState<T> {
    pub loading: bool,
    pub items: Vec<T>,
    pub error: Option<String>,
}

impl<T> Default for UiState<T> {
    fn default() -> Self {
        Self {
            loading: false,
            items: Vec::new(),
            error: None,
        }
    }
}

impl<T> UiState<T> {
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.loading
    }
}

/// One remote collection the feed can (re)fetch in full.
#[async_trait]
pub trait RecordSource: Send + Sync {
    type Record: Clone + Send;

    async fn fetch(&self) -> anyhow::Result<Vec<Self::Record>>;
}

struct FeedInner<T> {
    state: UiState<T>,
    /// Sequence stamped on the most recently issued refresh. Only the
    /// fetch carrying this stamp may publish its outcome.
    issued: u64,
}

/// Publishes the tri-state view of one remote collection.
///
/// The source is injected at construction and the feed is the only
/// writer; readers take `snapshot()` copies, so every transition is
/// atomic from their side. Overlapping refreshes are resolved by
/// sequence number: each refresh stamps itself when issued, and a
/// completion whose stamp is no longer the newest is discarded, so the
/// published items always come from the newest issued fetch once it
/// lands. Fetches run to completion; there is no cancellation.
pub struct RemoteFeed<S: RecordSource> {
    source: S,
    inner: Mutex<FeedInner<S::Record>>,
}

impl<S: RecordSource> RemoteFeed<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            inner: Mutex::new(FeedInner {
                state: UiState::default(),
                issued: 0,
            }),
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> UiState<S::Record> {
        self.inner.lock().state.clone()
    }

    /// Fetches the collection and publishes the outcome.
    ///
    /// The loading transition happens before the first await, so a
    /// caller polling `snapshot()` right after spawning `refresh()`
    /// observes `loading == true` with the previous items still
    /// readable. A failed fetch records its message and keeps the
    /// previous items.
    pub async fn refresh(&self) {
        let seq = {
            let mut inner = self.inner.lock();
            inner.issued += 1;
            inner.state.loading = true;
            inner.state.error = None;
            inner.issued
        };

        let outcome = self.source.fetch().await;

        let mut inner = self.inner.lock();
        if seq != inner.issued {
            debug!(seq, newest = inner.issued, "discarding superseded fetch completion");
            return;
        }

        inner.state.loading = false;
        match outcome {
            Ok(items) => {
                debug!(seq, items = items.len(), "fetch succeeded");
                inner.state.items = items;
                inner.state.error = None;
            }
            Err(error) => {
                let message = format!("{error:#}");
                warn!(seq, error = %message, "fetch failed");
                inner.state.error = Some(message);
            }
        }
    }
}
