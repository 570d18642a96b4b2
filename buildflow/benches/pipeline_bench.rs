//! Benchmarks for document validation and a scripted build.

use buildflow::config::{ClientConfig, PipelineConfig};
use buildflow::contracts::{parse_code_bundle, validate_architecture, validate_requirements};
use buildflow::core::BuildOptions;
use buildflow::pipeline::Orchestrator;
use buildflow::testing::{fixtures, Script, ScriptedInvoker, StaticDeployer};
use criterion::{black_box, criterion_group, criterion_main, Criterion};
use futures::StreamExt;
use serde_json::json;
use std::sync::Arc;

fn validation_benchmark(c: &mut Criterion) {
    let requirements = fixtures::requirements_json(6);
    let invalid = fixtures::requirements_json(42);
    let architecture = fixtures::architecture_json();
    let bundle = fixtures::code_bundle_json(&[true, false, true, true]);

    c.bench_function("validate_requirements", |b| {
        b.iter(|| validate_requirements(black_box(&requirements)))
    });
    c.bench_function("validate_requirements_invalid", |b| {
        b.iter(|| validate_requirements(black_box(&invalid)))
    });
    c.bench_function("validate_architecture", |b| {
        b.iter(|| validate_architecture(black_box(&architecture)))
    });
    c.bench_function("parse_code_bundle", |b| {
        b.iter(|| parse_code_bundle(black_box(&bundle)))
    });
}

fn build_benchmark(c: &mut Criterion) {
    let Ok(runtime) = tokio::runtime::Runtime::new() else {
        return;
    };
    let invoker = Arc::new(ScriptedInvoker::new());
    invoker.always("requirements", Script::json(fixtures::requirements_json(4)));
    invoker.always("architecture", Script::json(fixtures::architecture_json()));
    invoker.always("code", Script::json(fixtures::code_bundle_json(&[true, true])));
    invoker.always("ui", Script::json(json!({"components": []})));
    let Ok(orchestrator) = Orchestrator::builder(invoker, Arc::new(StaticDeployer::new().succeed("vercel")))
        .config(
            PipelineConfig::new()
                .with_providers(["vercel"])
                .with_client(ClientConfig::new().with_max_retries(0)),
        )
        .build()
    else {
        return;
    };

    c.bench_function("scripted_build", |b| {
        b.iter(|| {
            runtime.block_on(async {
                let events = orchestrator
                    .start_build(fixtures::SUPPORT_BOT, BuildOptions::new())
                    .count()
                    .await;
                black_box(events)
            })
        })
    });
}

criterion_group!(benches, validation_benchmark, build_benchmark);
criterion_main!(benches);
