//! Async query abstraction for data fetching with caching support.
//!
//! Inspired by TanStack Query, this module provides a `Query<T>` type that
//! encapsulates async data fetching, loading states, and error handling.
//!
//! Unlike a plain loading flag, a query keeps its last data while a refetch
//! is in flight or after a refetch fails, so a list never blanks out during
//! a background refresh. Data can also be seeded (from a persisted snapshot)
//! or patched in place by the owner.
//!
//! # Example
//!
//! ```ignore
//! let api = client.clone();
//! let mut query = Query::new(move || {
//!     let api = api.clone();
//!     async move { api.list().await.map_err(|e| e.to_string()) }
//! });
//!
//! // Start fetching
//! query.fetch();
//!
//! // In event loop tick
//! if query.poll().is_some() {
//!     // State changed, trigger re-render
//! }
//!
//! // In render
//! match query.state() {
//!     QueryState::Loading => render_spinner(),
//!     QueryState::Success(data) => render_data(data),
//!     QueryState::Error(e) => render_error(e),
//!     QueryState::Idle => {}
//! }
//! ```

use futures::future::BoxFuture;
use std::future::Future;
use std::time::{Duration, Instant};
use tokio::sync::mpsc;

/// What the query has to show, borrowed for rendering
#[derive(Debug, Clone, PartialEq)]
pub enum QueryState<'a, T> {
  /// Query has not been started
  Idle,
  /// First fetch in flight, nothing to show yet
  Loading,
  /// Data available (possibly stale, possibly refreshing)
  Success(&'a T),
  /// Fetch failed and there is no data to fall back on
  Error(&'a str),
}

/// Result of a completed fetch, reported by `poll`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryEvent {
  Fetched,
  Failed,
}

/// A factory function that creates futures for fetching data
type FetcherFn<T> = Box<dyn Fn() -> BoxFuture<'static, Result<T, String>> + Send + Sync>;

/// Async query for data fetching with state management.
///
/// Query<T> encapsulates:
/// - The fetching logic (via a closure)
/// - Last known data, in-flight flag and last error
/// - Async result handling via channels
/// - Stale time tracking for cache invalidation
pub struct Query<T> {
  data: Option<T>,
  error: Option<String>,
  fetcher: FetcherFn<T>,
  receiver: Option<mpsc::UnboundedReceiver<Result<T, String>>>,
  fetched_at: Option<Instant>,
  stale_time: Duration,
}

impl<T: Send + 'static> Query<T> {
  /// Create a new query with the given fetcher function.
  ///
  /// The fetcher is a closure that returns a future. It will be called
  /// each time `fetch()` or `refetch()` is invoked.
  pub fn new<F, Fut>(fetcher: F) -> Self
  where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<T, String>> + Send + 'static,
  {
    Self {
      data: None,
      error: None,
      fetcher: Box::new(move || Box::pin(fetcher())),
      receiver: None,
      fetched_at: None,
      stale_time: Duration::from_secs(60), // Default 1 minute
    }
  }

  /// Set the stale time for this query.
  ///
  /// After this duration, the data is considered stale and `is_stale()` returns true.
  pub fn with_stale_time(mut self, duration: Duration) -> Self {
    self.stale_time = duration;
    self
  }

  /// Get the current state of the query.
  pub fn state(&self) -> QueryState<'_, T> {
    match (&self.data, &self.error) {
      (Some(data), _) => QueryState::Success(data),
      (None, _) if self.is_fetching() => QueryState::Loading,
      (None, Some(error)) => QueryState::Error(error),
      (None, None) => QueryState::Idle,
    }
  }

  /// Get the data if any has been fetched or seeded.
  pub fn data(&self) -> Option<&T> {
    self.data.as_ref()
  }

  /// Check if the first fetch is still running.
  pub fn is_loading(&self) -> bool {
    self.data.is_none() && self.is_fetching()
  }

  /// Check if any fetch is in flight, including background refetches.
  pub fn is_fetching(&self) -> bool {
    self.receiver.is_some()
  }

  /// Check if the last fetch failed.
  pub fn is_error(&self) -> bool {
    self.error.is_some()
  }

  /// Get the error message if the last fetch failed.
  pub fn error(&self) -> Option<&str> {
    self.error.as_deref()
  }

  /// Check if the data is stale (older than stale_time, seeded, or invalidated).
  pub fn is_stale(&self) -> bool {
    match &self.data {
      Some(_) => self
        .fetched_at
        .map(|t| t.elapsed() > self.stale_time)
        .unwrap_or(true),
      None => true,
    }
  }

  /// Start fetching data if not already fetching.
  ///
  /// This is a no-op if a fetch is already in flight.
  pub fn fetch(&mut self) {
    if self.is_fetching() {
      return;
    }
    self.start_fetch();
  }

  /// Fetch only when there is no fresh data.
  pub fn fetch_if_stale(&mut self) {
    if self.is_stale() {
      self.fetch();
    }
  }

  /// Force a refetch, even if already fetching or data exists.
  pub fn refetch(&mut self) {
    // Cancel any pending fetch by dropping the receiver
    self.receiver = None;
    self.start_fetch();
  }

  /// Mark the data stale without fetching.
  pub fn invalidate(&mut self) {
    self.fetched_at = None;
  }

  /// Install data that was not fetched by this query (e.g. a snapshot).
  /// Seeded data is stale until the next successful fetch.
  pub fn seed(&mut self, data: T) {
    self.data = Some(data);
    self.fetched_at = None;
  }

  /// Modify the current data in place. Returns false if there is none.
  pub fn update_data(&mut self, f: impl FnOnce(&mut T)) -> bool {
    match &mut self.data {
      Some(data) => {
        f(data);
        true
      }
      None => false,
    }
  }

  /// Poll for results from a pending fetch.
  ///
  /// Returns the kind of result if one arrived. Call this in your event loop
  /// tick handler.
  pub fn poll(&mut self) -> Option<QueryEvent> {
    let receiver = self.receiver.as_mut()?;

    // Try to receive without blocking
    match receiver.try_recv() {
      Ok(Ok(data)) => {
        self.data = Some(data);
        self.error = None;
        self.fetched_at = Some(Instant::now());
        self.receiver = None;
        Some(QueryEvent::Fetched)
      }
      Ok(Err(error)) => {
        self.error = Some(error);
        self.receiver = None;
        Some(QueryEvent::Failed)
      }
      Err(mpsc::error::TryRecvError::Empty) => None,
      Err(mpsc::error::TryRecvError::Disconnected) => {
        // Sender dropped without sending - treat as error
        self.error = Some("Query was cancelled".to_string());
        self.receiver = None;
        Some(QueryEvent::Failed)
      }
    }
  }

  /// Internal: start the fetch operation
  fn start_fetch(&mut self) {
    let (tx, rx) = mpsc::unbounded_channel();
    self.receiver = Some(rx);

    let future = (self.fetcher)();
    tokio::spawn(async move {
      let result = future.await;
      // Ignore send errors - receiver may have been dropped
      let _ = tx.send(result);
    });
  }
}

// Query is not Clone because the fetcher is boxed and receiver is owned.

impl<T: std::fmt::Debug> std::fmt::Debug for Query<T> {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Query")
      .field("data", &self.data)
      .field("error", &self.error)
      .field("fetching", &self.receiver.is_some())
      .field("fetched_at", &self.fetched_at)
      .field("stale_time", &self.stale_time)
      .finish_non_exhaustive()
  }
}
