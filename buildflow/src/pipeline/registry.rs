//! Registry of builds known to an orchestrator.

use dashmap::DashMap;
use parking_lot::RwLock;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use uuid::Uuid;

use crate::cancellation::CancellationToken;
use crate::core::{Build, PipelineStage};
use crate::stages::StageInputs;

/// Shared state of one build.
///
/// The build record is only written by the task driving the build, plus
/// `retry_stage` while no task is running. The running flag enforces that.
#[derive(Debug)]
pub struct BuildHandle {
    id: Uuid,
    build: RwLock<Build>,
    cancel: Arc<CancellationToken>,
    sequence: Arc<AtomicU64>,
    running: AtomicBool,
}

impl BuildHandle {
    /// Wraps a new build.
    #[must_use]
    pub fn new(build: Build) -> Self {
        Self {
            id: build.id,
            build: RwLock::new(build),
            cancel: Arc::new(CancellationToken::new()),
            sequence: Arc::new(AtomicU64::new(0)),
            running: AtomicBool::new(false),
        }
    }

    /// Returns the build id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Returns a copy of the build record.
    #[must_use]
    pub fn snapshot(&self) -> Build {
        let mut build = self.build.read().clone();
        build.cancelled = self.cancel.is_cancelled();
        build
    }

    /// Applies `f` to the build record.
    pub fn update<R>(&self, f: impl FnOnce(&mut Build) -> R) -> R {
        f(&mut self.build.write())
    }

    /// Returns what stage workers see of the build.
    #[must_use]
    pub fn inputs(&self) -> StageInputs {
        let build = self.build.read();
        StageInputs {
            description: build.description.clone(),
            options: build.options.clone(),
            artifacts: build.artifacts.clone(),
        }
    }

    /// Returns the cancellation token.
    #[must_use]
    pub fn cancel_token(&self) -> Arc<CancellationToken> {
        Arc::clone(&self.cancel)
    }

    /// Returns the event sequence counter.
    #[must_use]
    pub fn sequence(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.sequence)
    }

    /// Marks the build as running.
    ///
    /// Returns false when it already was.
    pub fn try_start(&self) -> bool {
        self.running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }

    /// Rewinds the build to `stage` and marks it running, unless a task
    /// already drives it.
    ///
    /// Clearing the cancellation and taking the running flag happen under
    /// the record's lock, so a [`cancel`](Self::cancel) that returns after
    /// this call is never lost.
    pub fn try_restart(&self, stage: PipelineStage) -> bool {
        let mut build = self.build.write();
        if !self.try_start() {
            return false;
        }
        self.cancel.reset();
        build.rewind(stage);
        true
    }

    /// Requests cancellation. Returns false when it was already requested.
    pub fn cancel(&self, reason: &str) -> bool {
        let mut build = self.build.write();
        let first = self.cancel.cancel(reason);
        if first {
            build.cancelled = true;
        }
        first
    }

    /// Marks the build as idle.
    pub fn finish(&self) {
        self.running.store(false, Ordering::SeqCst);
    }

    /// Returns whether a task is driving the build.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Concurrent map from build id to handle.
#[derive(Debug, Default)]
pub struct BuildRegistry {
    builds: DashMap<Uuid, Arc<BuildHandle>>,
}

impl BuildRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `build` and returns its handle.
    pub fn insert(&self, build: Build) -> Arc<BuildHandle> {
        let handle = Arc::new(BuildHandle::new(build));
        self.builds.insert(handle.id(), Arc::clone(&handle));
        handle
    }

    /// Looks up a build.
    #[must_use]
    pub fn get(&self, id: Uuid) -> Option<Arc<BuildHandle>> {
        self.builds.get(&id).map(|entry| Arc::clone(entry.value()))
    }

    /// Unregisters a build and returns its handle.
    pub fn remove(&self, id: Uuid) -> Option<Arc<BuildHandle>> {
        self.builds.remove(&id).map(|(_, handle)| handle)
    }

    /// Returns every registered id.
    #[must_use]
    pub fn ids(&self) -> Vec<Uuid> {
        self.builds.iter().map(|entry| *entry.key()).collect()
    }

    /// Returns the number of builds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.builds.len()
    }

    /// Returns true when no build is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.builds.is_empty()
    }
}
