//! The single owner of the cached pattern list.
//!
//! Every view reads patterns from, and sends mutations through, one
//! `PatternStore`. Mutations run as spawned tasks; their outcomes come back
//! over a channel and are applied to the cached list in `poll`, which the
//! owning view calls on each tick. Nothing else writes to the list.
//!
//! What a successful mutation does to the list is decided by the configured
//! `CachePolicy`:
//! - `Patch` rewrites the list from the server's response, by id
//! - `Refetch` invalidates the list and fetches it again
//!
//! Failed mutations never touch the list; they are queued as
//! `MutationError`s for the view to show.

#[cfg(test)]
pub(crate) mod memory;

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::api::{
  ApiError, ApiResult, PatternApi, PatternQueryKey, ProxyPattern, ProxyPatternCreate,
  ProxyPatternUpdate,
};
use crate::cache::{CacheSource, CacheStorage};
use crate::config::{CacheConfig, CachePolicy};
use crate::query::{Query, QueryEvent};

/// Store tuning, normally taken from `CacheConfig`
#[derive(Debug, Clone, Copy)]
pub struct StoreOptions {
  pub stale_time: Duration,
  pub policy: CachePolicy,
}

impl Default for StoreOptions {
  fn default() -> Self {
    Self::from(&CacheConfig::default())
  }
}

impl From<&CacheConfig> for StoreOptions {
  fn from(config: &CacheConfig) -> Self {
    Self {
      stale_time: Duration::from_secs(config.stale_secs),
      policy: config.policy,
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
  Create,
  Update,
  Delete,
}

impl MutationKind {
  fn verb(self) -> &'static str {
    match self {
      MutationKind::Create => "create",
      MutationKind::Update => "update",
      MutationKind::Delete => "delete",
    }
  }
}

/// A mutation the server did not accept
#[derive(Debug)]
pub struct MutationError {
  pub kind: MutationKind,
  /// Target pattern, `None` for creates
  pub id: Option<i64>,
  pub error: ApiError,
}

impl fmt::Display for MutationError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self.id {
      Some(id) => write!(f, "{} of pattern {} failed: {}", self.kind.verb(), id, self.error),
      None => write!(f, "{} failed: {}", self.kind.verb(), self.error),
    }
  }
}

impl std::error::Error for MutationError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    Some(&self.error)
  }
}

/// Completed mutation, sent back from the spawned task
#[derive(Debug)]
enum MutationOutcome {
  Created(ApiResult<ProxyPattern>),
  Updated { id: i64, result: ApiResult<ProxyPattern> },
  Deleted { id: i64, result: ApiResult<()> },
}

pub struct PatternStore<A: PatternApi, S: CacheStorage> {
  api: Arc<A>,
  storage: S,
  policy: CachePolicy,
  list: Query<Vec<ProxyPattern>>,
  source: Option<CacheSource>,
  outcome_tx: mpsc::UnboundedSender<MutationOutcome>,
  outcome_rx: mpsc::UnboundedReceiver<MutationOutcome>,
  in_flight: usize,
  /// A patch landed while a list fetch was running; that fetch may predate it
  refetch_after_load: bool,
  errors: Vec<MutationError>,
}

impl<A: PatternApi, S: CacheStorage> PatternStore<A, S> {
  /// Create the store, seeding the list from the persisted snapshot if any.
  /// Nothing is fetched until `load` is called.
  pub fn new(api: Arc<A>, storage: S, options: StoreOptions) -> Self {
    let fetch_api = Arc::clone(&api);
    let mut list = Query::new(move || {
      let api = Arc::clone(&fetch_api);
      async move { api.list().await.map_err(|e| e.to_string()) }
    })
    .with_stale_time(options.stale_time);

    let mut source = None;
    match storage.get_query_result::<ProxyPattern, _>(&PatternQueryKey::List) {
      Ok(Some(snapshot)) => {
        info!(
          count = snapshot.entities.len(),
          cached_at = %snapshot.cached_at,
          "seeding pattern list from snapshot"
        );
        list.seed(snapshot.entities);
        source = Some(CacheSource::Snapshot);
      }
      Ok(None) => {}
      Err(e) => warn!(error = %e, "failed to read pattern snapshot"),
    }

    let (outcome_tx, outcome_rx) = mpsc::unbounded_channel();

    Self {
      api,
      storage,
      policy: options.policy,
      list,
      source,
      outcome_tx,
      outcome_rx,
      in_flight: 0,
      refetch_after_load: false,
      errors: Vec::new(),
    }
  }

  pub fn api(&self) -> Arc<A> {
    Arc::clone(&self.api)
  }

  /// The cached list in server order (empty until loaded)
  pub fn patterns(&self) -> &[ProxyPattern] {
    self.list.data().map(|v| v.as_slice()).unwrap_or(&[])
  }

  pub fn get(&self, id: i64) -> Option<&ProxyPattern> {
    self.patterns().iter().find(|p| p.id == id)
  }

  pub fn list(&self) -> &Query<Vec<ProxyPattern>> {
    &self.list
  }

  /// Where the list on screen came from, `None` before anything arrived
  pub fn source(&self) -> Option<CacheSource> {
    self.source
  }

  pub fn pending_mutations(&self) -> usize {
    self.in_flight
  }

  /// Fetch the list unless the cached copy is still fresh.
  pub fn load(&mut self) {
    self.list.fetch_if_stale();
  }

  /// Fetch the list regardless of freshness.
  pub fn refresh(&mut self) {
    self.list.refetch();
  }

  pub fn create(&mut self, body: ProxyPatternCreate) {
    debug!(pattern = %body.pattern, enabled = body.enabled, "create proxy pattern");
    let api = Arc::clone(&self.api);
    self.spawn(async move { MutationOutcome::Created(api.create(body).await) });
  }

  /// Send a partial update. An empty update is dropped without a request.
  pub fn update(&mut self, id: i64, body: ProxyPatternUpdate) {
    if body.is_empty() {
      debug!(id, "skipping empty update");
      return;
    }
    debug!(id, ?body, "update proxy pattern");
    let api = Arc::clone(&self.api);
    self.spawn(async move {
      let result = api.update(id, body).await;
      MutationOutcome::Updated { id, result }
    });
  }

  pub fn delete(&mut self, id: i64) {
    debug!(id, "delete proxy pattern");
    let api = Arc::clone(&self.api);
    self.spawn(async move {
      let result = api.delete(id).await;
      MutationOutcome::Deleted { id, result }
    });
  }

  /// Errors from failed mutations since the last call, oldest first.
  pub fn take_errors(&mut self) -> Vec<MutationError> {
    std::mem::take(&mut self.errors)
  }

  /// Apply completed fetches and mutations. Returns true if anything changed.
  pub fn poll(&mut self) -> bool {
    let mut changed = false;

    if let Some(event) = self.list.poll() {
      changed = true;
      self.on_list_event(event);
    }

    while let Ok(outcome) = self.outcome_rx.try_recv() {
      self.in_flight = self.in_flight.saturating_sub(1);
      self.apply(outcome);
      changed = true;
    }

    changed
  }

  fn spawn<F>(&mut self, task: F)
  where
    F: Future<Output = MutationOutcome> + Send + 'static,
  {
    self.in_flight += 1;
    let tx = self.outcome_tx.clone();
    tokio::spawn(async move {
      // The store may be gone by the time the call returns
      let _ = tx.send(task.await);
    });
  }

  fn on_list_event(&mut self, event: QueryEvent) {
    match event {
      QueryEvent::Fetched => {
        debug!(count = self.patterns().len(), "pattern list fetched");
        self.source = Some(CacheSource::Network);
        self.persist();
        if std::mem::take(&mut self.refetch_after_load) {
          self.list.refetch();
        }
      }
      QueryEvent::Failed => {
        warn!(error = ?self.list.error(), "pattern list fetch failed");
        // The failed fetch did not overwrite anything, so earlier patches stand
        self.refetch_after_load = false;
        if self.list.data().is_some() && self.source != Some(CacheSource::Network) {
          self.source = Some(CacheSource::Offline);
        }
      }
    }
  }

  fn apply(&mut self, outcome: MutationOutcome) {
    match outcome {
      MutationOutcome::Created(Ok(created)) => {
        info!(id = created.id, pattern = %created.pattern, "proxy pattern created");
        self.on_success(move |list| match list.iter_mut().find(|p| p.id == created.id) {
          Some(existing) => *existing = created,
          None => list.push(created),
        });
      }
      MutationOutcome::Updated {
        result: Ok(updated),
        ..
      } => {
        info!(id = updated.id, "proxy pattern updated");
        self.on_success(move |list| {
          if let Some(existing) = list.iter_mut().find(|p| p.id == updated.id) {
            *existing = updated;
          }
        });
      }
      MutationOutcome::Deleted { id, result: Ok(()) } => {
        info!(id, "proxy pattern deleted");
        self.on_success(move |list| list.retain(|p| p.id != id));
      }
      MutationOutcome::Created(Err(error)) => self.fail(MutationKind::Create, None, error),
      MutationOutcome::Updated {
        id,
        result: Err(error),
      } => self.fail(MutationKind::Update, Some(id), error),
      MutationOutcome::Deleted {
        id,
        result: Err(error),
      } => self.fail(MutationKind::Delete, Some(id), error),
    }
  }

  fn on_success(&mut self, patch: impl FnOnce(&mut Vec<ProxyPattern>)) {
    match self.policy {
      CachePolicy::Refetch => {
        self.list.invalidate();
        self.list.refetch();
      }
      CachePolicy::Patch => {
        if !self.list.update_data(patch) {
          // Nothing cached to patch yet
          self.list.refetch();
          return;
        }
        if self.list.is_fetching() {
          self.refetch_after_load = true;
        }
        self.persist();
      }
    }
  }

  fn fail(&mut self, kind: MutationKind, id: Option<i64>, error: ApiError) {
    warn!(
      %error,
      id = ?id,
      status = ?error.status(),
      transport = error.is_transport(),
      "{} failed",
      kind.verb()
    );
    let error = MutationError { kind, id, error };
    self.errors.push(error);
  }

  fn persist(&self) {
    if let Some(patterns) = self.list.data() {
      if let Err(e) = self
        .storage
        .store_query_result(&PatternQueryKey::List, patterns)
      {
        warn!(error = %e, "failed to persist pattern snapshot");
      }
    }
  }
}
