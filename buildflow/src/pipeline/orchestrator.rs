//! Sequencing of the five stages for every build.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::{BuildHandle, BuildRegistry, BuildStream};
use crate::client::{BackoffClient, ModelInvoker, RateLimitCountdown};
use crate::config::PipelineConfig;
use crate::core::{Build, BuildOptions, PipelineStage, ProgressEvent};
use crate::errors::{BuildflowError, StageError};
use crate::events::{EventSink, NoOpEventSink, StageReporter};
use crate::observability::StageTimer;
use crate::stages::{
    Architect, CodeGenerator, Deployer, DeploymentEngine, RequirementsAnalyzer, StageWorker,
    UiGenerator,
};

/// Events buffered between a build task and its consumer.
const EVENT_BUFFER: usize = 1;

struct Inner {
    client: BackoffClient,
    workers: Vec<Arc<dyn StageWorker>>,
    engine: DeploymentEngine,
    registry: BuildRegistry,
    sink: Arc<dyn EventSink>,
}

impl Inner {
    fn worker(&self, stage: PipelineStage) -> &dyn StageWorker {
        self.workers[stage.index()].as_ref()
    }
}

/// Runs builds through analyzing, architecting, generating, deploying and
/// designing.
///
/// Each build is driven by its own task and reports through the
/// [`BuildStream`] returned when it starts. The orchestrator is cheap to
/// clone; clones share the registry.
#[derive(Clone)]
pub struct Orchestrator {
    inner: Arc<Inner>,
}

impl Orchestrator {
    /// Returns a builder wired to the two external collaborators.
    #[must_use]
    pub fn builder(
        invoker: Arc<dyn ModelInvoker>,
        deployer: Arc<dyn Deployer>,
    ) -> OrchestratorBuilder {
        OrchestratorBuilder::new(invoker, deployer)
    }

    /// Starts a new build of `description`.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn start_build(&self, description: impl Into<String>, options: BuildOptions) -> BuildStream {
        let handle = self.inner.registry.insert(Build::new(description, options));
        let started = handle.try_start();
        debug_assert!(started, "a fresh build cannot be running");
        info!(build_id = %handle.id(), "Build created");
        self.spawn(handle, PipelineStage::Analyzing)
    }

    /// Re-runs `stage` of a stored build and every stage after it.
    ///
    /// An unknown or still-running build yields a stream holding a single
    /// stage error.
    ///
    /// # Panics
    ///
    /// Panics when called outside a tokio runtime.
    pub fn retry_stage(&self, build_id: Uuid, stage: PipelineStage) -> BuildStream {
        let Some(handle) = self.inner.registry.get(build_id) else {
            warn!(build_id = %build_id, stage = %stage, "Retry of unknown build");
            return BuildStream::rejected(build_id, stage, &BuildflowError::UnknownBuild(build_id));
        };
        if !handle.try_restart(stage) {
            warn!(build_id = %build_id, stage = %stage, "Retry of running build");
            return BuildStream::rejected(build_id, stage, &BuildflowError::BuildRunning(build_id));
        }

        info!(build_id = %build_id, stage = %stage, "Retrying build");
        self.spawn(handle, stage)
    }

    /// Requests cancellation of a build.
    ///
    /// # Errors
    ///
    /// Returns [`BuildflowError::UnknownBuild`] when no such build exists.
    pub fn cancel_build(&self, build_id: Uuid) -> Result<(), BuildflowError> {
        let handle = self
            .inner
            .registry
            .get(build_id)
            .ok_or(BuildflowError::UnknownBuild(build_id))?;
        if handle.cancel("Cancelled by request") {
            info!(build_id = %build_id, "Build cancelled");
        }
        Ok(())
    }

    /// Returns a snapshot of a build.
    #[must_use]
    pub fn build(&self, build_id: Uuid) -> Option<Build> {
        self.inner.registry.get(build_id).map(|h| h.snapshot())
    }

    /// Returns whether a task is still driving the build.
    ///
    /// A cancelled build's stream ends before its task does.
    #[must_use]
    pub fn is_running(&self, build_id: Uuid) -> bool {
        self.inner
            .registry
            .get(build_id)
            .is_some_and(|h| h.is_running())
    }

    /// Returns the ids of every known build.
    #[must_use]
    pub fn build_ids(&self) -> Vec<Uuid> {
        self.inner.registry.ids()
    }

    /// Tears down a build's hosted deployment and forgets it.
    ///
    /// The generated interface is dropped with it. Local fallbacks only
    /// lose their stored result.
    ///
    /// # Errors
    ///
    /// Returns [`BuildflowError::UnknownBuild`] or
    /// [`BuildflowError::BuildRunning`], or the deployer's error.
    pub async fn teardown(&self, build_id: Uuid) -> Result<(), BuildflowError> {
        let handle = self
            .inner
            .registry
            .get(build_id)
            .ok_or(BuildflowError::UnknownBuild(build_id))?;
        if handle.is_running() {
            return Err(BuildflowError::BuildRunning(build_id));
        }
        let Some(deployment) = handle.snapshot().artifacts.deployment else {
            return Ok(());
        };

        self.inner.engine.teardown(&deployment).await?;
        handle.update(|build| {
            build.artifacts.deployment = None;
            build.artifacts.ui = None;
        });
        info!(
            build_id = %build_id,
            provider = %deployment.provider,
            deployment_id = %deployment.deployment_id,
            "Deployment torn down"
        );
        Ok(())
    }

    /// Removes a finished build from the registry and returns its last state.
    ///
    /// Hosted deployments are left alone; call [`teardown`](Self::teardown)
    /// first to remove them.
    ///
    /// # Errors
    ///
    /// Returns [`BuildflowError::UnknownBuild`] or
    /// [`BuildflowError::BuildRunning`].
    pub fn forget(&self, build_id: Uuid) -> Result<Build, BuildflowError> {
        let handle = self
            .inner
            .registry
            .get(build_id)
            .ok_or(BuildflowError::UnknownBuild(build_id))?;
        // Holding the running flag keeps a retry from starting meanwhile.
        if !handle.try_start() {
            return Err(BuildflowError::BuildRunning(build_id));
        }
        self.inner.registry.remove(build_id);
        info!(build_id = %build_id, "Build forgotten");
        Ok(handle.snapshot())
    }

    /// Returns the shared rate-limit countdown.
    #[must_use]
    pub fn countdown(&self) -> &RateLimitCountdown {
        self.inner.client.countdown()
    }

    /// Seconds until the model client makes its next attempt.
    #[must_use]
    pub fn seconds_remaining(&self) -> u64 {
        self.inner.client.seconds_remaining()
    }

    fn spawn(&self, handle: Arc<BuildHandle>, from: PipelineStage) -> BuildStream {
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let stream = BuildStream::new(handle.id(), rx, handle.cancel_token());
        let span = info_span!("build", build_id = %handle.id(), from = %from);
        tokio::spawn(drive(Arc::clone(&self.inner), handle, from, tx).instrument(span));
        stream
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("builds", &self.inner.registry.len())
            .field("workers", &self.inner.workers)
            .finish_non_exhaustive()
    }
}

async fn drive(
    inner: Arc<Inner>,
    handle: Arc<BuildHandle>,
    from: PipelineStage,
    tx: mpsc::Sender<ProgressEvent>,
) {
    let build_id = handle.id();
    let base = StageReporter::new(
        build_id,
        from,
        tx,
        handle.cancel_token(),
        handle.sequence(),
        Arc::clone(&inner.sink),
    );
    // Declared after the reporter so the build is idle before its stream ends.
    let _running = RunningGuard(Arc::clone(&handle));

    for &stage in from.remaining() {
        if base.is_cancelled() {
            break;
        }
        let reporter = base.for_stage(stage);
        handle.update(|build| build.enter(stage));
        reporter.send(ProgressEvent::started(build_id, stage)).await;

        let timer = StageTimer::start(build_id, stage);
        let inputs = handle.inputs();
        let result = match inputs.artifacts.missing_prerequisites(stage).first() {
            Some(&missing) => Err(StageError::Prerequisite { stage, missing }),
            None => AssertUnwindSafe(inner.worker(stage).run(&inputs, &reporter))
                .catch_unwind()
                .await
                .unwrap_or_else(|panic| Err(StageError::Internal(panic_message(panic.as_ref())))),
        };

        match result {
            Ok(_) if reporter.is_cancelled() => {
                timer.finish("cancelled");
                break;
            }
            Ok(artifact) => {
                let summary = artifact.to_json();
                handle.update(|build| build.complete(artifact));
                let duration_ms = timer.finish("complete");
                reporter
                    .send(
                        ProgressEvent::completed(build_id, stage, summary, duration_ms)
                            .with_usage(reporter.usage()),
                    )
                    .await;
            }
            Err(error) if error.is_cancelled() => {
                timer.finish("cancelled");
                break;
            }
            Err(error) => {
                let message = error.to_string();
                warn!(
                    build_id = %build_id,
                    stage = %stage,
                    kind = error.kind(),
                    error = %message,
                    "Stage failed"
                );
                handle.update(|build| build.fail(stage, message.clone()));
                timer.finish("error");
                reporter
                    .send(ProgressEvent::failed(build_id, stage, &message, error.to_dict()))
                    .await;
                break;
            }
        }
    }

    let build = handle.snapshot();
    info!(
        build_id = %build_id,
        finished = build.is_finished(),
        cancelled = build.cancelled,
        failed = build.last_error.is_some(),
        "Build task ended"
    );
}

/// Marks the build idle when its task ends, including by panic.
struct RunningGuard(Arc<BuildHandle>);

impl Drop for RunningGuard {
    fn drop(&mut self) {
        self.0.finish();
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    panic
        .downcast_ref::<&str>()
        .map(ToString::to_string)
        .or_else(|| panic.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "stage worker panicked".to_string())
}

/// Builder for [`Orchestrator`].
pub struct OrchestratorBuilder {
    invoker: Arc<dyn ModelInvoker>,
    deployer: Arc<dyn Deployer>,
    config: PipelineConfig,
    sink: Arc<dyn EventSink>,
    overrides: Vec<Arc<dyn StageWorker>>,
}

impl OrchestratorBuilder {
    /// Creates a builder with the default configuration.
    #[must_use]
    pub fn new(invoker: Arc<dyn ModelInvoker>, deployer: Arc<dyn Deployer>) -> Self {
        Self {
            invoker,
            deployer,
            config: PipelineConfig::default(),
            sink: Arc::new(NoOpEventSink),
            overrides: Vec::new(),
        }
    }

    /// Sets the configuration.
    #[must_use]
    pub fn config(mut self, config: PipelineConfig) -> Self {
        self.config = config;
        self
    }

    /// Sets the observer that receives a copy of every event.
    #[must_use]
    pub fn event_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Replaces the built-in worker for `worker.stage()`.
    #[must_use]
    pub fn worker(mut self, worker: Arc<dyn StageWorker>) -> Self {
        self.overrides.push(worker);
        self
    }

    /// Builds the orchestrator.
    ///
    /// # Errors
    ///
    /// Returns [`BuildflowError::Config`] when the configuration is invalid.
    pub fn build(self) -> Result<Orchestrator, BuildflowError> {
        self.config.validate()?;
        let PipelineConfig {
            client: client_config,
            stages,
            deployment,
            ..
        } = self.config;

        let client = BackoffClient::new(self.invoker, client_config);
        let engine = DeploymentEngine::new(self.deployer, deployment.providers, deployment.local_port);
        let mut workers: Vec<Arc<dyn StageWorker>> = vec![
            Arc::new(RequirementsAnalyzer::new(client.clone(), stages.validation_retries)),
            Arc::new(Architect::new(client.clone(), stages.validation_retries)),
            Arc::new(CodeGenerator::new(client.clone(), stages.repair_iterations)),
            Arc::new(engine.clone()),
            Arc::new(UiGenerator::new(client.clone())),
        ];
        for worker in self.overrides {
            let index = worker.stage().index();
            workers[index] = worker;
        }

        Ok(Orchestrator {
            inner: Arc::new(Inner {
                client,
                workers,
                engine,
                registry: BuildRegistry::new(),
                sink: self.sink,
            }),
        })
    }
}

impl std::fmt::Debug for OrchestratorBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OrchestratorBuilder")
            .field("config", &self.config)
            .field("overrides", &self.overrides)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::ArchitectureDocument;
    use crate::core::{EventKind, StageArtifact};
    use crate::stages::StageInputs;
    use crate::testing::{fixtures, ScriptedInvoker, StaticDeployer};
    use async_trait::async_trait;
    use futures::StreamExt;

    #[derive(Debug)]
    struct Exploding;

    #[async_trait]
    impl StageWorker for Exploding {
        fn stage(&self) -> PipelineStage {
            PipelineStage::Analyzing
        }

        async fn run(
            &self,
            _inputs: &StageInputs,
            _reporter: &StageReporter,
        ) -> Result<StageArtifact, StageError> {
            panic!("worker exploded");
        }
    }

    #[derive(Debug)]
    struct FixedArchitect;

    #[async_trait]
    impl StageWorker for FixedArchitect {
        fn stage(&self) -> PipelineStage {
            PipelineStage::Architecting
        }

        async fn run(
            &self,
            inputs: &StageInputs,
            _reporter: &StageReporter,
        ) -> Result<StageArtifact, StageError> {
            let spec = inputs.requirements(self.stage())?;
            let doc: ArchitectureDocument = fixtures::architecture_document(spec);
            Ok(doc.into())
        }
    }

    async fn settle(orchestrator: &Orchestrator, id: Uuid) {
        while orchestrator.is_running(id) {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
    }

    fn orchestrator(deployer: Arc<StaticDeployer>) -> Orchestrator {
        Orchestrator::builder(Arc::new(ScriptedInvoker::new()), deployer)
            .build()
            .unwrap()
    }

    fn seeded(orchestrator: &Orchestrator, deployment: bool) -> Uuid {
        let spec = fixtures::requirements_spec(3);
        let arch = fixtures::architecture_document(&spec);
        let code = fixtures::code_bundle(&arch, &[true]);
        let dep = fixtures::deployment_result(code.id);
        let ui = fixtures::generated_ui(&spec, &dep);
        let handle = orchestrator
            .inner
            .registry
            .insert(Build::new(fixtures::SUPPORT_BOT, BuildOptions::new()));
        handle.update(|build| {
            build.complete(spec.into());
            build.complete(arch.into());
            build.complete(code.into());
            if deployment {
                build.complete(dep.into());
                build.complete(ui.into());
            }
        });
        handle.id()
    }

    #[test]
    fn test_cancel_unknown_build() {
        let orchestrator = orchestrator(Arc::new(StaticDeployer::new()));
        let id = Uuid::new_v4();

        let err = orchestrator.cancel_build(id).unwrap_err();
        assert!(matches!(err, BuildflowError::UnknownBuild(u) if u == id));
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = PipelineConfig::new().with_providers(["vercel", " "]);
        let result = Orchestrator::builder(
            Arc::new(ScriptedInvoker::new()),
            Arc::new(StaticDeployer::new()),
        )
        .config(config)
        .build();

        assert!(matches!(result, Err(BuildflowError::Config(_))));
    }

    #[tokio::test]
    async fn test_teardown_clears_deployment_and_ui() {
        let deployer = Arc::new(StaticDeployer::new());
        let orchestrator = orchestrator(Arc::clone(&deployer));
        let id = seeded(&orchestrator, true);

        orchestrator.teardown(id).await.unwrap();

        assert_eq!(deployer.teardowns(), vec!["dep-vercel"]);
        let build = orchestrator.build(id).unwrap();
        assert!(build.artifacts.deployment.is_none());
        assert!(build.artifacts.ui.is_none());
        assert!(build.artifacts.code.is_some());
    }

    #[tokio::test]
    async fn test_teardown_without_deployment_is_noop() {
        let deployer = Arc::new(StaticDeployer::new());
        let orchestrator = orchestrator(Arc::clone(&deployer));
        let id = seeded(&orchestrator, false);

        orchestrator.teardown(id).await.unwrap();
        assert!(deployer.teardowns().is_empty());
    }

    #[tokio::test]
    async fn test_retry_of_running_build_is_rejected() {
        let orchestrator = orchestrator(Arc::new(StaticDeployer::new()));
        let id = seeded(&orchestrator, false);
        let handle = orchestrator.inner.registry.get(id).unwrap();
        assert!(handle.try_start());

        let events: Vec<_> = orchestrator
            .retry_stage(id, PipelineStage::Deploying)
            .collect()
            .await;

        assert_eq!(events.len(), 1);
        assert!(events[0].is_error());
        assert_eq!(events[0].message(), Some("Build is already running"));
        assert_eq!(events[0].payload["details"]["kind"], "build_running");
        assert!(orchestrator.teardown(id).await.is_err());
    }

    #[tokio::test]
    async fn test_worker_panic_fails_stage_and_frees_build() {
        let orchestrator = Orchestrator::builder(
            Arc::new(ScriptedInvoker::new()),
            Arc::new(StaticDeployer::new()),
        )
        .worker(Arc::new(Exploding))
        .build()
        .unwrap();

        let stream = orchestrator.start_build(fixtures::SUPPORT_BOT, BuildOptions::new());
        let id = stream.build_id();
        let events: Vec<_> = stream.collect().await;

        assert_eq!(events.len(), 2);
        assert_eq!(events[1].message(), Some("Internal error: worker exploded"));
        assert_eq!(events[1].payload["details"]["kind"], "internal");
        assert!(!orchestrator.is_running(id));
        let build = orchestrator.build(id).unwrap();
        assert_eq!(build.last_error.map(|e| e.stage), Some(PipelineStage::Analyzing));

        let retried: Vec<_> = orchestrator
            .retry_stage(id, PipelineStage::Analyzing)
            .collect()
            .await;
        assert_eq!(retried.len(), 2);
        assert_eq!(retried[1].payload["details"]["kind"], "internal");
    }

    #[tokio::test]
    async fn test_worker_override_replaces_builtin() {
        let invoker = Arc::new(ScriptedInvoker::new());
        let orchestrator = Orchestrator::builder(invoker.clone(), Arc::new(StaticDeployer::new()))
            .worker(Arc::new(FixedArchitect))
            .build()
            .unwrap();
        let id = seeded(&orchestrator, false);

        let events: Vec<_> = orchestrator
            .retry_stage(id, PipelineStage::Architecting)
            .collect()
            .await;

        assert_eq!(events[1].kind, EventKind::StageComplete);
        assert_eq!(events[1].stage, PipelineStage::Architecting);
        assert_eq!(invoker.call_count("architecture"), 0);
        // No script for the code generator, so the build stops there.
        assert_eq!(events.last().map(|e| e.stage), Some(PipelineStage::Generating));
        assert!(orchestrator.build(id).unwrap().artifacts.architecture.is_some());
    }

    #[tokio::test]
    async fn test_cancel_right_after_retry_is_kept() {
        let deployer = Arc::new(StaticDeployer::new().succeed("vercel"));
        let orchestrator = orchestrator(Arc::clone(&deployer));
        let id = seeded(&orchestrator, false);

        let stream = orchestrator.retry_stage(id, PipelineStage::Deploying);
        orchestrator.cancel_build(id).unwrap();
        let events: Vec<_> = stream.collect().await;
        settle(&orchestrator, id).await;

        assert!(events.is_empty());
        assert!(deployer.deploy_calls().is_empty());
        let build = orchestrator.build(id).unwrap();
        assert!(build.cancelled);
        assert!(build.artifacts.deployment.is_none());
    }

    #[tokio::test]
    async fn test_forget_removes_idle_build() {
        let orchestrator = orchestrator(Arc::new(StaticDeployer::new()));
        let id = seeded(&orchestrator, true);

        let last = orchestrator.forget(id).unwrap();
        assert!(last.artifacts.deployment.is_some());
        assert!(orchestrator.build_ids().is_empty());
        assert!(orchestrator.build(id).is_none());
        assert!(matches!(
            orchestrator.forget(id),
            Err(BuildflowError::UnknownBuild(u)) if u == id
        ));
    }

    #[tokio::test]
    async fn test_forget_refuses_running_build() {
        let orchestrator = orchestrator(Arc::new(StaticDeployer::new()));
        let id = seeded(&orchestrator, false);
        assert!(orchestrator.inner.registry.get(id).unwrap().try_start());

        assert!(matches!(
            orchestrator.forget(id),
            Err(BuildflowError::BuildRunning(u)) if u == id
        ));
        assert_eq!(orchestrator.build_ids(), vec![id]);
    }

    #[tokio::test]
    async fn test_build_ids_lists_builds() {
        let orchestrator = orchestrator(Arc::new(StaticDeployer::new()));
        let id = seeded(&orchestrator, false);

        assert_eq!(orchestrator.build_ids(), vec![id]);
        assert!(orchestrator.build(Uuid::new_v4()).is_none());
        assert_eq!(orchestrator.seconds_remaining(), 0);
    }
}
