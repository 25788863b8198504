//! In-memory pattern service for tests.

use std::sync::Mutex;
use std::time::Duration;

use crate::api::{
  ApiError, ApiResult, PatternApi, ProxyPattern, ProxyPatternCreate, ProxyPatternUpdate,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
  List,
  Create(ProxyPatternCreate),
  Read(i64),
  Update(i64, ProxyPatternUpdate),
  Delete(i64),
}

#[derive(Default)]
struct Inner {
  patterns: Vec<ProxyPattern>,
  next_id: i64,
  calls: Vec<Call>,
  fail_next: Option<(u16, String)>,
  list_delay: Duration,
}

/// Behaves like the real service: ids are assigned sequentially and never
/// reused, unknown ids are 404s.
#[derive(Default)]
pub struct MemoryApi {
  inner: Mutex<Inner>,
}

impl MemoryApi {
  pub fn with_patterns(patterns: Vec<ProxyPattern>) -> Self {
    let next_id = patterns.iter().map(|p| p.id).max().unwrap_or(0) + 1;
    Self {
      inner: Mutex::new(Inner {
        patterns,
        next_id,
        ..Inner::default()
      }),
    }
  }

  pub fn calls(&self) -> Vec<Call> {
    self.inner.lock().unwrap().calls.clone()
  }

  pub fn clear_calls(&self) {
    self.inner.lock().unwrap().calls.clear();
  }

  pub fn patterns(&self) -> Vec<ProxyPattern> {
    self.inner.lock().unwrap().patterns.clone()
  }

  /// Fail the next call, whatever it is, with this status
  pub fn fail_next(&self, status: u16, message: &str) {
    self.inner.lock().unwrap().fail_next = Some((status, message.to_string()));
  }

  /// Delay list responses. The list is captured before the delay.
  pub fn set_list_delay(&self, delay: Duration) {
    self.inner.lock().unwrap().list_delay = delay;
  }

  fn record(&self, call: Call) -> Result<std::sync::MutexGuard<'_, Inner>, ApiError> {
    let mut inner = self.inner.lock().unwrap();
    inner.calls.push(call);
    match inner.fail_next.take() {
      Some((status, message)) => Err(ApiError::Status { status, message }),
      None => Ok(inner),
    }
  }
}

impl PatternApi for MemoryApi {
  async fn list(&self) -> ApiResult<Vec<ProxyPattern>> {
    let (patterns, delay) = {
      let inner = self.record(Call::List)?;
      (inner.patterns.clone(), inner.list_delay)
    };
    if !delay.is_zero() {
      tokio::time::sleep(delay).await;
    }
    Ok(patterns)
  }

  async fn create(&self, body: ProxyPatternCreate) -> ApiResult<ProxyPattern> {
    let mut inner = self.record(Call::Create(body.clone()))?;
    let created = ProxyPattern::new(inner.next_id, body.pattern, body.enabled);
    inner.next_id += 1;
    inner.patterns.push(created.clone());
    Ok(created)
  }

  async fn read(&self, id: i64) -> ApiResult<ProxyPattern> {
    let inner = self.record(Call::Read(id))?;
    inner
      .patterns
      .iter()
      .find(|p| p.id == id)
      .cloned()
      .ok_or(ApiError::NotFound { id })
  }

  async fn update(&self, id: i64, body: ProxyPatternUpdate) -> ApiResult<ProxyPattern> {
    let mut inner = self.record(Call::Update(id, body.clone()))?;
    let pattern = inner
      .patterns
      .iter_mut()
      .find(|p| p.id == id)
      .ok_or(ApiError::NotFound { id })?;
    body.apply_to(pattern);
    Ok(pattern.clone())
  }

  async fn delete(&self, id: i64) -> ApiResult<()> {
    let mut inner = self.record(Call::Delete(id))?;
    let before = inner.patterns.len();
    inner.patterns.retain(|p| p.id != id);
    if inner.patterns.len() == before {
      return Err(ApiError::NotFound { id });
    }
    Ok(())
  }
}
