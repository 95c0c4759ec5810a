use std::fmt;
use std::sync::Arc;

use serde_json::Value;
use tokio::sync::watch;

use crate::error::ClientError;
use crate::gateway::{HttpMethod, RequestOptions};

use super::key::{Invalidation, ResourceKey};

type ApplyFn = dyn Fn(Option<&Value>) -> Value + Send + Sync;

/// Local replacement applied to a cached entry before the server confirms a write
#[derive(Clone)]
pub struct OptimisticUpdate {
    pub key: ResourceKey,
    apply: Arc<ApplyFn>,
}

impl OptimisticUpdate {
    /// `apply` receives the current data (if any) and returns the full replacement
    pub fn new<F>(key: impl Into<ResourceKey>, apply: F) -> Self
    where
        F: Fn(Option<&Value>) -> Value + Send + Sync + 'static,
    {
        Self {
            key: key.into(),
            apply: Arc::new(apply),
        }
    }

    pub(crate) fn apply(&self, current: Option<&Value>) -> Value {
        (self.apply)(current)
    }
}

impl fmt::Debug for OptimisticUpdate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OptimisticUpdate")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// A write against the backend plus the cache consequences it declares
#[derive(Debug, Clone)]
pub struct MutationIntent {
    pub path: String,
    pub method: HttpMethod,
    pub body: Option<Value>,
    pub invalidates: Vec<Invalidation>,
    pub optimistic: Option<OptimisticUpdate>,
}

impl MutationIntent {
    pub fn new(method: HttpMethod, path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            method,
            body: None,
            invalidates: Vec::new(),
            optimistic: None,
        }
    }

    pub fn post(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Post, path).with_body(body)
    }

    pub fn put(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Put, path).with_body(body)
    }

    pub fn patch(path: impl Into<String>, body: Value) -> Self {
        Self::new(HttpMethod::Patch, path).with_body(body)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, path)
    }

    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    pub fn invalidates(mut self, invalidation: impl Into<Invalidation>) -> Self {
        self.invalidates.push(invalidation.into());
        self
    }

    pub fn invalidates_prefix(self, path: impl AsRef<str>) -> Self {
        self.invalidates(Invalidation::prefix(path))
    }

    pub fn optimistic(mut self, update: OptimisticUpdate) -> Self {
        self.optimistic = Some(update);
        self
    }

    pub(crate) fn request_options(&self) -> RequestOptions {
        let options = RequestOptions::new(self.method);
        match &self.body {
            Some(body) => options.with_body(body.clone()),
            None => options,
        }
    }
}

/// Lifecycle of one mutation: `Pending` moves to exactly one terminal state
#[derive(Debug, Clone)]
pub enum MutationState {
    Pending,
    Committed(Value),
    Failed(ClientError),
}

impl MutationState {
    pub fn is_pending(&self) -> bool {
        matches!(self, MutationState::Pending)
    }

    pub fn is_committed(&self) -> bool {
        matches!(self, MutationState::Committed(_))
    }

    pub fn error(&self) -> Option<&ClientError> {
        match self {
            MutationState::Failed(error) => Some(error),
            _ => None,
        }
    }

    pub fn into_result(self) -> Result<Value, ClientError> {
        match self {
            MutationState::Committed(value) => Ok(value),
            MutationState::Failed(error) => Err(error),
            MutationState::Pending => Err(ClientError::Decode("mutation has not settled".to_string())),
        }
    }
}

impl From<Result<Value, ClientError>> for MutationState {
    fn from(result: Result<Value, ClientError>) -> Self {
        match result {
            Ok(value) => MutationState::Committed(value),
            Err(error) => MutationState::Failed(error),
        }
    }
}

/// Handle to a write running in the background
#[derive(Debug, Clone)]
pub struct Mutation {
    state: watch::Receiver<MutationState>,
}

impl Mutation {
    pub(crate) fn new(state: watch::Receiver<MutationState>) -> Self {
        Self { state }
    }

    /// Current state without waiting
    pub fn state(&self) -> MutationState {
        self.state.borrow().clone()
    }

    /// Waits for a terminal state. A task that died before settling reports `Pending`.
    pub async fn settled(mut self) -> MutationState {
        loop {
            let pending = self.state.borrow().is_pending();
            if !pending || self.state.changed().await.is_err() {
                break;
            }
        }
        let state = self.state.borrow().clone();
        state
    }
}
