use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// How the recorder interprets a pattern's text
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternType {
  /// Matched against stream titles
  #[default]
  Regex,
  /// Matched against stream URLs
  Url,
}

impl PatternType {
  pub fn label(self) -> &'static str {
    match self {
      PatternType::Regex => "regex",
      PatternType::Url => "url",
    }
  }
}

/// A proxy pattern as returned by the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyPattern {
  pub id: i64,
  pub pattern: String,
  pub enabled: bool,
  #[serde(default)]
  pub pattern_type: PatternType,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created_at: Option<DateTime<Utc>>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub updated_at: Option<DateTime<Utc>>,
}

impl ProxyPattern {
  /// Pattern with only the fields every server returns
  #[cfg(test)]
  pub fn new(id: i64, pattern: impl Into<String>, enabled: bool) -> Self {
    Self {
      id,
      pattern: pattern.into(),
      enabled,
      pattern_type: PatternType::default(),
      created_at: None,
      updated_at: None,
    }
  }
}

/// Request body for creating a pattern. The server assigns the id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyPatternCreate {
  pub pattern: String,
  pub enabled: bool,
}

impl ProxyPatternCreate {
  /// New patterns start enabled
  pub fn enabled(pattern: impl Into<String>) -> Self {
    Self {
      pattern: pattern.into(),
      enabled: true,
    }
  }
}

/// Partial update body. Fields left as `None` are omitted from the PATCH
/// and keep their server-side value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyPatternUpdate {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub pattern: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub enabled: Option<bool>,
}

impl ProxyPatternUpdate {
  pub fn enabled(enabled: bool) -> Self {
    Self {
      pattern: None,
      enabled: Some(enabled),
    }
  }

  pub fn full(pattern: impl Into<String>, enabled: bool) -> Self {
    Self {
      pattern: Some(pattern.into()),
      enabled: Some(enabled),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.pattern.is_none() && self.enabled.is_none()
  }

  /// Apply this update to a local copy
  #[cfg(test)]
  pub fn apply_to(&self, target: &mut ProxyPattern) {
    if let Some(pattern) = &self.pattern {
      target.pattern = pattern.clone();
    }
    if let Some(enabled) = self.enabled {
      target.enabled = enabled;
    }
  }
}
