//! End-to-end build scenarios against scripted collaborators.

#[cfg(test)]
mod tests {
    use crate::artifacts::{AgentPattern, DeploymentStatus};
    use crate::client::InvokeError;
    use crate::config::{ClientConfig, PipelineConfig};
    use crate::core::{BuildOptions, EventKind, PipelineStage, ProgressEvent, TokenUsage};
    use crate::events::CollectingEventSink;
    use crate::pipeline::{BuildStream, Orchestrator};
    use crate::testing::{
        assert_failed_at, assert_nothing_after, assert_ordered, assert_stages_completed,
        completed_stages, fixtures, Script, ScriptedInvoker, StaticDeployer,
    };
    use futures::StreamExt;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::sync::Arc;
    use std::time::Duration;
    use uuid::Uuid;

    use PipelineStage::{Analyzing, Architecting, Deploying, Designing, Generating};

    fn scripted() -> Arc<ScriptedInvoker> {
        let invoker = Arc::new(ScriptedInvoker::new());
        invoker.always(
            "requirements",
            Script::json(fixtures::requirements_json(4))
                .with_reasoning("The user wants a customer support agent")
                .with_usage(TokenUsage::new(100, 50, 0)),
        );
        invoker.always("architecture", Script::json(fixtures::architecture_json()));
        invoker.always(
            "code",
            Script::json(fixtures::code_bundle_json(&[true, true])).with_code("def answer(q):"),
        );
        invoker.always("ui", Script::json(json!({"theme": "light", "components": []})));
        invoker
    }

    fn config() -> PipelineConfig {
        PipelineConfig::new()
            .with_providers(["vercel"])
            .with_client(ClientConfig::new().with_initial_delay_ms(1).with_max_delay_ms(5))
    }

    struct Harness {
        orchestrator: Orchestrator,
        invoker: Arc<ScriptedInvoker>,
        deployer: Arc<StaticDeployer>,
        sink: Arc<CollectingEventSink>,
    }

    fn harness(invoker: Arc<ScriptedInvoker>, deployer: StaticDeployer, config: PipelineConfig) -> Harness {
        let deployer = Arc::new(deployer);
        let sink = Arc::new(CollectingEventSink::new());
        let orchestrator = Orchestrator::builder(invoker.clone(), deployer.clone())
            .config(config)
            .event_sink(sink.clone())
            .build()
            .unwrap();
        Harness {
            orchestrator,
            invoker,
            deployer,
            sink,
        }
    }

    async fn drain(stream: BuildStream) -> (Uuid, Vec<ProgressEvent>) {
        let id = stream.build_id();
        (id, stream.collect().await)
    }

    async fn settle(orchestrator: &Orchestrator, id: Uuid) {
        while orchestrator.is_running(id) {
            tokio::time::sleep(Duration::from_millis(1)).await;
        }
    }

    #[tokio::test]
    async fn test_full_build() {
        let h = harness(scripted(), StaticDeployer::new().succeed("vercel"), config());

        let (id, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        assert_stages_completed(&events, &PipelineStage::ALL);
        assert_ordered(&events);
        assert_eq!(events[0].sequence, 0);
        assert_eq!(events[0].kind, EventKind::StageStarted);
        assert!(events.iter().all(|e| e.build_id == id));
        assert_eq!(h.sink.len(), events.len());

        let reasoning = events
            .iter()
            .find(|e| e.kind == EventKind::Reasoning)
            .unwrap();
        assert_eq!(reasoning.stage, Analyzing);
        let fragment = events
            .iter()
            .find(|e| e.kind == EventKind::CodeFragment)
            .unwrap();
        assert_eq!(fragment.stage, Generating);

        let analyzed = events
            .iter()
            .find(|e| e.kind == EventKind::StageComplete && e.stage == Analyzing)
            .unwrap();
        assert_eq!(analyzed.usage.map(|u| u.total()), Some(150));
        assert!(analyzed.payload["durationMs"].is_number());
        assert_eq!(analyzed.payload["artifact"]["agentName"], "Support Helper");

        let build = h.orchestrator.build(id).unwrap();
        assert!(build.is_finished());
        assert!(build.last_error.is_none());
        assert!(!build.cancelled);
        assert_eq!(build.current_stage, Some(Designing));

        let a = &build.artifacts;
        let spec = a.requirements.as_ref().unwrap();
        let arch = a.architecture.as_ref().unwrap();
        let code = a.code.as_ref().unwrap();
        let deployment = a.deployment.as_ref().unwrap();
        let ui = a.ui.as_ref().unwrap();
        assert_eq!(spec.description, fixtures::SUPPORT_BOT);
        assert_eq!(arch.requirements_id, spec.id);
        assert_eq!(code.architecture_id, arch.id);
        assert!(code.validated);
        assert_eq!(code.debug_iterations, 0);
        assert_eq!(deployment.code_bundle_id, code.id);
        assert_eq!(deployment.status, DeploymentStatus::Live);
        assert!(!deployment.fallback_used);
        assert_eq!(ui.deployment_id, deployment.id);
        assert_eq!(ui.components.len(), 4);
        assert_eq!(
            ui.public_url.as_deref(),
            Some("https://support-helper.vercel.app/ui")
        );
        assert_eq!(h.deployer.deploy_calls(), vec!["vercel"]);
        assert_eq!(h.invoker.total_calls(), 4);
    }

    #[tokio::test]
    async fn test_transient_error_retried_once() {
        let invoker = scripted();
        invoker.push(
            "requirements",
            Script::error(InvokeError::status(503, "Service overloaded")),
        );
        let config = config().with_client(
            ClientConfig::new()
                .with_max_retries(1)
                .with_initial_delay_ms(1)
                .with_max_delay_ms(5),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config);

        let (_, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        assert_eq!(h.invoker.call_count("requirements"), 2);
        assert_eq!(completed_stages(&events), PipelineStage::ALL.to_vec());
        assert_eq!(h.orchestrator.seconds_remaining(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_absurd_server_wait_does_not_wedge_build() {
        let invoker = scripted();
        invoker.push(
            "requirements",
            Script::error(InvokeError::status(429, "Please retry in 10000000000000000000s")),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());

        let (id, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        assert_eq!(h.invoker.call_count("requirements"), 2);
        assert_eq!(completed_stages(&events), PipelineStage::ALL.to_vec());
        assert!(!h.orchestrator.is_running(id));
        assert_eq!(h.orchestrator.seconds_remaining(), 0);
    }

    #[tokio::test]
    async fn test_persistent_invalid_output_halts_at_analyzing() {
        let invoker = scripted();
        invoker.always("requirements", Script::json(fixtures::requirements_json(42)));
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());

        let (id, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        assert_eq!(h.invoker.call_count("requirements"), 3);
        assert_eq!(h.invoker.call_count("architecture"), 0);
        assert_failed_at(&events, Analyzing, "complexityScore");
        assert_nothing_after(&events, Analyzing);
        assert!(completed_stages(&events).is_empty());

        let retries: Vec<_> = events
            .iter()
            .filter(|e| e.kind == EventKind::Progress)
            .filter_map(ProgressEvent::message)
            .filter(|m| m.starts_with("Output failed validation"))
            .collect();
        assert_eq!(retries.len(), 3);

        let build = h.orchestrator.build(id).unwrap();
        let failure = build.last_error.unwrap();
        assert_eq!(failure.stage, Analyzing);
        assert!(build.artifacts.requirements.is_none());
    }

    #[tokio::test]
    async fn test_fatal_error_stops_build() {
        let invoker = scripted();
        invoker.push(
            "architecture",
            Script::error(InvokeError::status(401, "Invalid API key")),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());

        let (_, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        assert_eq!(h.invoker.call_count("architecture"), 1);
        assert_failed_at(&events, Architecting, "Invalid API key");
        assert_nothing_after(&events, Architecting);
        let error = events.last().unwrap();
        assert_eq!(error.payload["details"]["kind"], "fatal_api");
        assert_eq!(error.payload["details"]["status"], 401);
    }

    #[tokio::test]
    async fn test_retry_of_unknown_build() {
        let h = harness(scripted(), StaticDeployer::new(), config());

        let (_, events) = drain(h.orchestrator.retry_stage(Uuid::new_v4(), Generating)).await;

        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::StageError);
        assert_eq!(events[0].stage, Generating);
        assert_eq!(events[0].message(), Some("Build not found"));
        assert_eq!(h.invoker.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_resumes_from_failed_stage() {
        let invoker = scripted();
        invoker.push(
            "architecture",
            Script::error(InvokeError::status(400, "Bad request")),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());

        let (id, first) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;
        assert_failed_at(&first, Architecting, "Bad request");
        let spec_id = h
            .orchestrator
            .build(id)
            .and_then(|b| b.artifacts.requirements)
            .map(|s| s.id)
            .unwrap();

        let (retried_id, second) = drain(h.orchestrator.retry_stage(id, Architecting)).await;

        assert_eq!(retried_id, id);
        assert_stages_completed(&second, &[Architecting, Generating, Deploying, Designing]);
        assert_ordered(&second);
        assert!(second[0].sequence > first.last().unwrap().sequence);
        assert_eq!(h.invoker.call_count("requirements"), 1);

        let build = h.orchestrator.build(id).unwrap();
        assert!(build.is_finished());
        assert!(build.last_error.is_none());
        assert_eq!(build.artifacts.requirements.map(|s| s.id), Some(spec_id));
    }

    #[tokio::test]
    async fn test_retry_without_prerequisites_fails() {
        let invoker = scripted();
        invoker.push(
            "architecture",
            Script::error(InvokeError::status(400, "Bad request")),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());
        let (id, _) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        let (_, events) = drain(h.orchestrator.retry_stage(id, Generating)).await;

        assert_failed_at(&events, Generating, "missing architecting artifact");
        assert_eq!(h.invoker.call_count("code"), 0);
        let error = events.last().unwrap();
        assert_eq!(error.payload["details"]["kind"], "prerequisite_missing");
    }

    #[tokio::test]
    async fn test_generating_requires_requirements() {
        let invoker = scripted();
        invoker.push(
            "requirements",
            Script::error(InvokeError::status(400, "Bad request")),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());
        let (id, _) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        let (_, events) = drain(h.orchestrator.retry_stage(id, Generating)).await;

        assert_failed_at(&events, Generating, "Cannot run generating: missing analyzing artifact");
        assert_eq!(events.last().unwrap().payload["details"]["missing"], "analyzing");
        assert_eq!(h.invoker.call_count("code"), 0);
    }

    #[tokio::test]
    async fn test_cancellation_mid_stage() {
        let invoker = scripted();
        invoker.push(
            "architecture",
            Script::json(fixtures::architecture_json()).delayed(Duration::from_secs(30)),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());

        let mut stream = h
            .orchestrator
            .start_build(fixtures::SUPPORT_BOT, BuildOptions::new());
        let id = stream.build_id();
        let mut events = Vec::new();
        while let Some(event) = stream.next().await {
            let reached = event.kind == EventKind::StageStarted && event.stage == Architecting;
            events.push(event);
            if reached {
                break;
            }
        }

        h.orchestrator.cancel_build(id).unwrap();
        events.extend(stream.collect::<Vec<_>>().await);
        settle(&h.orchestrator, id).await;

        assert_eq!(completed_stages(&events), vec![Analyzing]);
        assert!(events.iter().all(|e| !e.is_error()));
        assert_nothing_after(&events, Architecting);

        let build = h.orchestrator.build(id).unwrap();
        assert!(build.cancelled);
        assert!(build.last_error.is_none());
        assert!(build.artifacts.architecture.is_none());
        assert_eq!(h.invoker.call_count("code"), 0);
        // A second cancel is accepted.
        assert!(h.orchestrator.cancel_build(id).is_ok());
    }

    #[tokio::test]
    async fn test_retry_after_cancellation() {
        let invoker = scripted();
        invoker.push(
            "code",
            Script::json(fixtures::code_bundle_json(&[true])).delayed(Duration::from_secs(30)),
        );
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());

        let mut stream = h
            .orchestrator
            .start_build(fixtures::SUPPORT_BOT, BuildOptions::new());
        let id = stream.build_id();
        while let Some(event) = stream.next().await {
            if event.kind == EventKind::StageStarted && event.stage == Generating {
                break;
            }
        }
        h.orchestrator.cancel_build(id).unwrap();
        drop(stream);
        settle(&h.orchestrator, id).await;

        let (_, events) = drain(h.orchestrator.retry_stage(id, Generating)).await;

        assert_stages_completed(&events, &[Generating, Deploying, Designing]);
        let build = h.orchestrator.build(id).unwrap();
        assert!(!build.cancelled);
        assert!(build.is_finished());
        assert_eq!(h.invoker.call_count("code"), 2);
    }

    #[tokio::test]
    async fn test_dropped_stream_does_not_cancel() {
        let h = harness(scripted(), StaticDeployer::new().succeed("vercel"), config());

        let stream = h
            .orchestrator
            .start_build(fixtures::SUPPORT_BOT, BuildOptions::new());
        let id = stream.build_id();
        drop(stream);
        settle(&h.orchestrator, id).await;

        let build = h.orchestrator.build(id).unwrap();
        assert!(build.is_finished());
        assert!(!build.cancelled);
    }

    #[tokio::test]
    async fn test_repair_exhaustion_continues_pipeline() {
        let invoker = scripted();
        invoker.always("code", Script::json(fixtures::code_bundle_json(&[true, false])));
        invoker.always("repair", Script::json(fixtures::code_bundle_json(&[false, false])));
        let h = harness(
            invoker,
            StaticDeployer::new().succeed("vercel"),
            config().with_repair_iterations(2),
        );

        let (id, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        assert_stages_completed(&events, &PipelineStage::ALL);
        assert_eq!(h.invoker.call_count("repair"), 2);
        let test_results = events
            .iter()
            .filter(|e| e.kind == EventKind::TestResult)
            .count();
        assert_eq!(test_results, 6);

        let code = h.orchestrator.build(id).unwrap().artifacts.code.unwrap();
        assert!(!code.validated);
        assert_eq!(code.debug_iterations, 2);
        let report = code.failure_report.unwrap();
        assert_eq!(report.unresolved_issues.len(), 2);
    }

    #[tokio::test]
    async fn test_every_provider_failing_falls_back_to_local() {
        let h = harness(
            scripted(),
            StaticDeployer::new().fail("vercel", "quota exceeded"),
            config().with_providers(["vercel", "fly"]),
        );

        let (id, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        assert_stages_completed(&events, &PipelineStage::ALL);
        assert_eq!(h.deployer.deploy_calls(), vec!["vercel", "fly"]);
        let build = h.orchestrator.build(id).unwrap();
        let deployment = build.artifacts.deployment.unwrap();
        assert!(deployment.is_local());
        assert!(deployment.fallback_used);
        assert_eq!(deployment.endpoint, "http://localhost:8080");
        assert!(!deployment.local_instructions.is_empty());
        assert_eq!(
            build.artifacts.ui.unwrap().public_url.as_deref(),
            Some("http://localhost:8080/ui")
        );
    }

    #[tokio::test]
    async fn test_build_options_override_providers() {
        let h = harness(
            scripted(),
            StaticDeployer::new().succeed("vercel").succeed("fly"),
            config(),
        );

        let options = BuildOptions::new()
            .with_providers(["fly"])
            .with_name("Order Buddy");
        let (id, _) = drain(h.orchestrator.start_build(fixtures::SUPPORT_BOT, options)).await;

        assert_eq!(h.deployer.deploy_calls(), vec!["fly"]);
        let build = h.orchestrator.build(id).unwrap();
        assert_eq!(
            build.artifacts.requirements.unwrap().agent_name,
            "Order Buddy"
        );
    }

    #[tokio::test]
    async fn test_support_bot_architecture() {
        let invoker = scripted();
        let mut requirements = fixtures::requirements_json(9);
        requirements["integrations"] = json!([
            {"name": "Zendesk", "authType": "api_key"},
            {"name": "Shopify", "authType": "oauth"}
        ]);
        invoker.always("requirements", Script::json(requirements));
        let h = harness(invoker, StaticDeployer::new().succeed("vercel"), config());

        let (id, events) = drain(
            h.orchestrator
                .start_build(fixtures::SUPPORT_BOT, BuildOptions::new()),
        )
        .await;

        let architected = events
            .iter()
            .find(|e| e.kind == EventKind::StageComplete && e.stage == Architecting)
            .unwrap();
        let artifact = &architected.payload["artifact"];
        assert!(artifact["multiAgentStrategy"].is_object());
        assert_eq!(artifact["integrationSpecs"].as_array().map(Vec::len), Some(2));

        let arch = h
            .orchestrator
            .build(id)
            .unwrap()
            .artifacts
            .architecture
            .unwrap();
        assert_eq!(arch.pattern, AgentPattern::MultiAgent);
        assert!(!arch.multi_agent_strategy.unwrap().agents.is_empty());
        assert_eq!(arch.integration_specs.len(), 2);
    }

    #[tokio::test]
    async fn test_concurrent_builds_are_independent() {
        let h = harness(scripted(), StaticDeployer::new().succeed("vercel"), config());

        let first = h
            .orchestrator
            .start_build("build a support bot", BuildOptions::new());
        let second = h
            .orchestrator
            .start_build("build a sales bot", BuildOptions::new());
        let ((a, a_events), (b, b_events)) = tokio::join!(drain(first), drain(second));

        assert_ne!(a, b);
        assert_stages_completed(&a_events, &PipelineStage::ALL);
        assert_stages_completed(&b_events, &PipelineStage::ALL);
        assert!(a_events.iter().all(|e| e.build_id == a));
        assert_eq!(h.orchestrator.build_ids().len(), 2);
    }
}
