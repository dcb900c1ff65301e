// Copyright (c) 2025 - Cowboy AI, Inc.
//! Single-assignment deferred cell
//!
//! `Deferred<T>` is the read side and `Resolver<T>` the write side. A
//! resolver is consumed by resolution, so a value can be assigned at most
//! once. Dropping an unused resolver fails the cell with
//! `ResolutionError::Abandoned` so that nothing waits forever.

use parking_lot::Mutex;
use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::warn;

use crate::deployment::ResourceId;

/// Failure to produce a deferred value
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolutionError {
    /// The engine reported a failure for the named source
    #[error("{source_name}: {message}")]
    Failed {
        source_name: String,
        message: String,
    },

    /// The resolver was dropped without assigning a value
    #[error("{0} was never resolved")]
    Abandoned(String),

    /// A transform applied to a resolved value failed
    #[error("transform failed: {0}")]
    Transform(String),
}

impl ResolutionError {
    /// Failure reported for a named source (resource, lookup, secret...)
    pub fn failed(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        ResolutionError::Failed {
            source_name: source_name.into(),
            message: message.into(),
        }
    }
}

type Continuation<T> = Box<dyn FnOnce(Result<T, ResolutionError>) + Send>;

enum CellState<T> {
    Pending(Vec<Continuation<T>>),
    Resolved(Result<T, ResolutionError>),
}

struct Cell<T> {
    label: String,
    state: Mutex<CellState<T>>,
}

impl<T: Clone + Send + 'static> Cell<T> {
    fn new(label: String, state: CellState<T>) -> Arc<Self> {
        Arc::new(Self {
            label,
            state: Mutex::new(state),
        })
    }

    fn settle(&self, result: Result<T, ResolutionError>) {
        let continuations = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Resolved(_) => {
                    warn!(value = %self.label, "Ignoring second resolution of deferred value");
                    return;
                }
                CellState::Pending(waiting) => {
                    let waiting = std::mem::take(waiting);
                    *state = CellState::Resolved(result.clone());
                    waiting
                }
            }
        };

        for continuation in continuations {
            continuation(result.clone());
        }
    }

    fn subscribe(&self, continuation: Continuation<T>) {
        let resolved = {
            let mut state = self.state.lock();
            match &mut *state {
                CellState::Pending(waiting) => {
                    waiting.push(continuation);
                    return;
                }
                CellState::Resolved(result) => result.clone(),
            }
        };
        continuation(resolved);
    }
}

/// A value resolved later by the provisioning engine
///
/// Cloning is cheap: clones share the same cell.
pub struct Deferred<T> {
    cell: Arc<Cell<T>>,
    dependencies: BTreeSet<ResourceId>,
}

impl<T> Clone for Deferred<T> {
    fn clone(&self) -> Self {
        Self {
            cell: Arc::clone(&self.cell),
            dependencies: self.dependencies.clone(),
        }
    }
}

impl<T> fmt::Debug for Deferred<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let status = match &*self.cell.state.lock() {
            CellState::Pending(_) => "pending",
            CellState::Resolved(Ok(_)) => "resolved",
            CellState::Resolved(Err(_)) => "failed",
        };
        write!(
            f,
            "Deferred<{}>({}, {}, deps={})",
            std::any::type_name::<T>(),
            self.cell.label,
            status,
            self.dependencies.len()
        )
    }
}

/// Write side of a pending `Deferred`
pub struct Resolver<T: Clone + Send + 'static> {
    cell: Option<Arc<Cell<T>>>,
}

impl<T: Clone + Send + 'static> Resolver<T> {
    /// Resolve with a value
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    /// Resolve with a failure
    pub fn fail(self, error: ResolutionError) {
        self.settle(Err(error));
    }

    /// Resolve with either outcome
    pub fn settle(mut self, result: Result<T, ResolutionError>) {
        if let Some(cell) = self.cell.take() {
            cell.settle(result);
        }
    }
}

impl<T: Clone + Send + 'static> Drop for Resolver<T> {
    fn drop(&mut self) {
        if let Some(cell) = self.cell.take() {
            let label = cell.label.clone();
            cell.settle(Err(ResolutionError::Abandoned(label)));
        }
    }
}

impl<T: Clone + Send + 'static> Deferred<T> {
    /// A deferred that is already resolved
    pub fn ready(value: T) -> Self {
        Self {
            cell: Cell::new("ready".to_string(), CellState::Resolved(Ok(value))),
            dependencies: BTreeSet::new(),
        }
    }

    /// A deferred that has already failed
    pub fn failed(error: ResolutionError) -> Self {
        Self {
            cell: Cell::new("failed".to_string(), CellState::Resolved(Err(error))),
            dependencies: BTreeSet::new(),
        }
    }

    /// A pending deferred and the resolver that will complete it
    pub fn pending() -> (Self, Resolver<T>) {
        Self::pending_labeled("deferred")
    }

    /// A pending deferred with a label used in logs and abandonment errors
    pub fn pending_labeled(label: impl Into<String>) -> (Self, Resolver<T>) {
        let cell = Cell::new(label.into(), CellState::Pending(Vec::new()));
        let resolver = Resolver {
            cell: Some(Arc::clone(&cell)),
        };
        (
            Self {
                cell,
                dependencies: BTreeSet::new(),
            },
            resolver,
        )
    }

    /// Register a continuation, run once the value is known
    ///
    /// Runs immediately when the value is already resolved.
    pub fn on_resolved<F>(&self, f: F)
    where
        F: FnOnce(Result<T, ResolutionError>) + Send + 'static,
    {
        self.cell.subscribe(Box::new(f));
    }

    /// Current outcome, if resolution already happened
    pub fn peek(&self) -> Option<Result<T, ResolutionError>> {
        match &*self.cell.state.lock() {
            CellState::Pending(_) => None,
            CellState::Resolved(result) => Some(result.clone()),
        }
    }

    /// Whether the value (or its failure) is known
    pub fn is_resolved(&self) -> bool {
        matches!(&*self.cell.state.lock(), CellState::Resolved(_))
    }

    /// Apply a pure function once the value is known
    pub fn map<U, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        let (out, resolver) = Deferred::pending_labeled(format!("{}.map", self.cell.label));
        self.on_resolved(move |result| resolver.settle(result.map(f)));
        out.with_dependencies(self.dependencies.iter().cloned())
    }

    /// Apply a fallible function once the value is known
    pub fn and_then<U, E, F>(&self, f: F) -> Deferred<U>
    where
        U: Clone + Send + 'static,
        E: fmt::Display,
        F: FnOnce(T) -> Result<U, E> + Send + 'static,
    {
        let (out, resolver) = Deferred::pending_labeled(format!("{}.and_then", self.cell.label));
        self.on_resolved(move |result| {
            resolver.settle(
                result.and_then(|value| f(value).map_err(|e| ResolutionError::Transform(e.to_string()))),
            )
        });
        out.with_dependencies(self.dependencies.iter().cloned())
    }

    /// Wait for resolution without blocking the thread
    pub async fn resolved(&self) -> Result<T, ResolutionError> {
        let (tx, rx) = futures::channel::oneshot::channel();
        self.on_resolved(move |result| {
            let _ = tx.send(result);
        });
        match rx.await {
            Ok(result) => result,
            Err(_) => Err(ResolutionError::Abandoned(self.cell.label.clone())),
        }
    }

    /// Record that this value derives from `resource`
    pub fn with_dependency(mut self, resource: ResourceId) -> Self {
        self.dependencies.insert(resource);
        self
    }

    /// Record several source resources
    pub fn with_dependencies(mut self, resources: impl IntoIterator<Item = ResourceId>) -> Self {
        self.dependencies.extend(resources);
        self
    }

    /// Resources this value derives from
    pub fn dependencies(&self) -> &BTreeSet<ResourceId> {
        &self.dependencies
    }
}

impl<T: Clone + Send + 'static> From<T> for Deferred<T> {
    fn from(value: T) -> Self {
        Deferred::ready(value)
    }
}

impl From<&str> for Deferred<String> {
    fn from(value: &str) -> Self {
        Deferred::ready(value.to_string())
    }
}
