use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::error::ClientError;

use super::key::ResourceKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheStatus {
    Idle,
    Loading,
    Success,
    Error,
}

/// Snapshot of one cached resource.
///
/// `data` is only ever replaced as a whole, so a snapshot never mixes two
/// server responses.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub key: ResourceKey,
    pub data: Option<Arc<Value>>,
    pub status: CacheStatus,
    /// When the current `data` arrived (monotonic, drives staleness)
    pub last_fetched_at: Option<Instant>,
    /// Wall-clock time of the same moment, for display
    pub fetched_at: Option<DateTime<Utc>>,
    /// Set by invalidation; forces the next read to refetch
    pub stale: bool,
    pub stale_after: Duration,
    pub error: Option<ClientError>,
}

impl CacheEntry {
    pub fn new(key: ResourceKey, stale_after: Duration) -> Self {
        Self {
            key,
            data: None,
            status: CacheStatus::Idle,
            last_fetched_at: None,
            fetched_at: None,
            stale: false,
            stale_after,
            error: None,
        }
    }

    pub fn data(&self) -> Option<&Value> {
        self.data.as_deref()
    }

    pub fn is_success(&self) -> bool {
        self.status == CacheStatus::Success
    }

    pub fn is_error(&self) -> bool {
        self.status == CacheStatus::Error
    }

    /// Fresh entries are served without a network call
    pub fn is_fresh(&self, now: Instant) -> bool {
        if self.status != CacheStatus::Success || self.stale {
            return false;
        }
        match self.last_fetched_at {
            Some(at) => now.saturating_duration_since(at) < self.stale_after,
            None => false,
        }
    }

    /// Result view for callers that want `?` instead of inspecting status
    pub fn into_result(self) -> Result<Arc<Value>, ClientError> {
        if let Some(error) = self.error.filter(|_| self.status == CacheStatus::Error) {
            return Err(error);
        }
        self.data
            .ok_or_else(|| ClientError::Decode(format!("no data cached for {}", self.key)))
    }

    pub(crate) fn store(&mut self, value: Arc<Value>, stale: bool) {
        self.data = Some(value);
        self.status = CacheStatus::Success;
        self.last_fetched_at = Some(Instant::now());
        self.fetched_at = Some(Utc::now());
        self.stale = stale;
        self.error = None;
    }

    /// Keeps the last good data (stale-while-error)
    pub(crate) fn fail(&mut self, error: ClientError) {
        self.status = CacheStatus::Error;
        self.error = Some(error);
    }
}
