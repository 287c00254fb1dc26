// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Orchestrator behavior end to end: partial-failure tolerance, total
// failure, concurrency bounds, cancellation, deadlines, and aggregation.

use aegis_gateway_core::domain::config::{
    CacheConfig, CircuitParams, QueuePolicy, RateLimitParams,
};
use aegis_gateway_core::{
    CacheInvalidationPolicy, CanonicalRequest, CanonicalResponse, FinishReason, GatewayError,
    MetricsRecorder, ProviderAdapter, ProviderId, ProviderRegistry, ResilienceExecutor,
    ResilienceParams, ResponseCache, TokenUsage,
};
use aegis_gateway_swarm::{
    AggregationStrategy, JobError, JobOptions, JobStatus, RoleBinding, RoleRegistry,
    SwarmOrchestrator, TaskSpec,
};
use async_trait::async_trait;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// In-process backend that counts calls and tracks peak concurrency.
struct MockAdapter {
    id: ProviderId,
    fail_with: Option<GatewayError>,
    delay: Option<Duration>,
    calls: AtomicU32,
    in_flight: AtomicU32,
    peak: AtomicU32,
}

impl MockAdapter {
    fn succeeding(id: &str) -> Arc<Self> {
        Arc::new(Self::raw(id, None, None))
    }

    fn failing(id: &str, error: GatewayError) -> Arc<Self> {
        Arc::new(Self::raw(id, Some(error), None))
    }

    fn slow(id: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self::raw(id, None, Some(delay)))
    }

    fn raw(id: &str, fail_with: Option<GatewayError>, delay: Option<Duration>) -> Self {
        Self {
            id: id.into(),
            fail_with,
            delay,
            calls: AtomicU32::new(0),
            in_flight: AtomicU32::new(0),
            peak: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }

    fn peak(&self) -> u32 {
        self.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProviderAdapter for MockAdapter {
    fn identifier(&self) -> ProviderId {
        self.id.clone()
    }

    fn model(&self) -> &str {
        "mock-model"
    }

    async fn execute(&self, request: &CanonicalRequest) -> Result<CanonicalResponse, GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(error) = &self.fail_with {
            return Err(error.clone());
        }
        Ok(CanonicalResponse {
            content: format!("echo: {}", request.messages[0].content),
            usage: TokenUsage { prompt_tokens: 3, completion_tokens: 4, total_tokens: 7 },
            provider: self.id.clone(),
            model: "mock-model".to_string(),
            cached: false,
            latency: Duration::ZERO,
            finish_reason: FinishReason::Stop,
        })
    }

    async fn health_check(&self) -> Result<(), GatewayError> {
        Ok(())
    }
}

fn params() -> ResilienceParams {
    ResilienceParams {
        max_retries: 0,
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(50),
        timeout: Duration::from_secs(5),
        circuit: CircuitParams {
            failure_threshold: 1000,
            window: Duration::from_secs(60),
            open_duration: Duration::from_secs(60),
        },
        rate_limit: RateLimitParams {
            capacity: 10_000,
            refill_per_second: 10_000,
            queue: QueuePolicy::FailFast,
        },
        fallbacks: Vec::new(),
    }
}

fn executor(adapters: &[Arc<MockAdapter>]) -> Arc<ResilienceExecutor> {
    let pairs: Vec<_> =
        adapters.iter().map(|adapter| (Arc::clone(adapter), params())).collect();
    executor_with(&pairs)
}

fn executor_with(adapters: &[(Arc<MockAdapter>, ResilienceParams)]) -> Arc<ResilienceExecutor> {
    let mut registry = ProviderRegistry::new();
    for (adapter, params) in adapters {
        registry.register(Arc::clone(adapter) as Arc<dyn ProviderAdapter>, params.clone());
    }
    let recorder = Arc::new(MetricsRecorder::new());
    let cache = Arc::new(ResponseCache::with_store(
        &CacheConfig::default(),
        Arc::clone(&recorder),
        None,
    ));
    Arc::new(ResilienceExecutor::new(
        Arc::new(registry),
        cache,
        recorder,
        CacheInvalidationPolicy::Keep,
    ))
}

fn orchestrator(
    adapters: &[Arc<MockAdapter>],
    roles: RoleRegistry,
) -> Arc<SwarmOrchestrator> {
    Arc::new(SwarmOrchestrator::new(executor(adapters), Arc::new(roles)))
}

#[tokio::test]
async fn partial_failure_completes_with_survivors() {
    let good = MockAdapter::succeeding("good");
    let bad = MockAdapter::failing("bad", GatewayError::ProviderInternal("500".into()));
    let synth = MockAdapter::succeeding("synth");

    let mut roles = RoleRegistry::uniform("synth".into());
    for role in ["researcher", "editor", "summarizer"] {
        roles.insert(role, RoleBinding::new("good".into()));
    }
    for role in ["critic", "skeptic"] {
        roles.insert(role, RoleBinding::new("bad".into()));
    }
    // The failing provider retries before giving up, so the failures the
    // report carries are exhausted retry budgets, not one-shot rejections.
    let mut bad_params = params();
    bad_params.max_retries = 2;
    let exec = executor_with(&[
        (Arc::clone(&good), params()),
        (Arc::clone(&bad), bad_params),
        (Arc::clone(&synth), params()),
    ]);
    let orch = Arc::new(SwarmOrchestrator::new(exec, Arc::new(roles)));

    let specs = ["researcher", "critic", "skeptic", "editor", "summarizer"]
        .iter()
        .map(|role| TaskSpec::new(*role, format!("work for {role}")))
        .collect();
    let job = orch.submit(specs, JobOptions::default()).unwrap();
    let report = orch.result(job).await.unwrap();

    assert_eq!(report.status, JobStatus::PartiallyCompleted);
    assert!(!report.cancelled);
    assert_eq!(report.failed.len(), 2);
    let mut failed_labels: Vec<&str> = report.failed.iter().map(|f| f.label.as_str()).collect();
    failed_labels.sort_unstable();
    assert_eq!(failed_labels, ["critic", "skeptic"]);
    assert!(report.failed.iter().all(|f| f.kind == "provider_internal"));
    // Each failing sub-task burned its full budget: initial call + 2 retries.
    assert_eq!(bad.calls(), 6);

    // Synthesis ran over the three survivors.
    let synthesis = report.synthesis.expect("synthesis output");
    assert_eq!(synthesis.provider, "synth".into());
    assert_eq!(synth.calls(), 1);
    assert_eq!(good.calls(), 3);

    // Usage sums the three sub-tasks plus synthesis.
    assert_eq!(report.usage.total_tokens, 7 * 4);
}

#[tokio::test]
async fn total_failure_skips_synthesis() {
    let bad = MockAdapter::failing("bad", GatewayError::ProviderInternal("down".into()));
    let synth = MockAdapter::succeeding("synth");

    let mut roles = RoleRegistry::uniform("synth".into());
    roles.insert("worker", RoleBinding::new("bad".into()));
    let orch = orchestrator(&[Arc::clone(&bad), Arc::clone(&synth)], roles);

    let specs = (0..3).map(|i| TaskSpec::new("worker", format!("t{i}"))).collect();
    let job = orch.submit(specs, JobOptions::default()).unwrap();
    let report = orch.result(job).await.unwrap();

    assert_eq!(report.status, JobStatus::Failed);
    assert!(report.synthesis.is_none());
    assert_eq!(report.failed.len(), 3);
    assert_eq!(synth.calls(), 0, "synthesis must not run with zero survivors");
}

#[tokio::test]
async fn concurrency_stays_within_bound() {
    let good = MockAdapter::slow("good", Duration::from_millis(40));
    let mut roles = RoleRegistry::uniform("good".into());
    roles.insert("worker", RoleBinding::new("good".into()));
    let orch = orchestrator(&[Arc::clone(&good)], roles);

    let specs = (0..8).map(|i| TaskSpec::new("worker", format!("t{i}"))).collect();
    let options = JobOptions {
        max_concurrency: 2,
        aggregation: AggregationStrategy::Concatenate,
        ..Default::default()
    };
    let job = orch.submit(specs, options).unwrap();
    let report = orch.result(job).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert!(good.peak() <= 2, "peak concurrency {} exceeds bound", good.peak());
    assert_eq!(good.calls(), 8);
}

#[tokio::test]
async fn cancellation_stops_new_dispatches() {
    let slow = MockAdapter::slow("slow", Duration::from_millis(300));
    let mut roles = RoleRegistry::uniform("slow".into());
    roles.insert("worker", RoleBinding::new("slow".into()));
    let orch = orchestrator(&[Arc::clone(&slow)], roles);

    let specs = (0..10).map(|i| TaskSpec::new("worker", format!("t{i}"))).collect();
    let options = JobOptions { max_concurrency: 3, ..Default::default() };
    let job = orch.submit(specs, options).unwrap();

    tokio::time::sleep(Duration::from_millis(50)).await;
    orch.cancel(job).unwrap();
    let report = orch.result(job).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.status, JobStatus::Failed);
    assert!(report.synthesis.is_none());
    assert!(slow.calls() <= 3, "pending tasks were dispatched after cancel");
    assert!(report.failed.iter().all(|f| f.kind == "cancelled"));
}

#[tokio::test]
async fn deadline_cancels_the_job() {
    let slow = MockAdapter::slow("slow", Duration::from_millis(500));
    let mut roles = RoleRegistry::uniform("slow".into());
    roles.insert("worker", RoleBinding::new("slow".into()));
    let orch = orchestrator(&[Arc::clone(&slow)], roles);

    let specs = (0..2).map(|i| TaskSpec::new("worker", format!("t{i}"))).collect();
    let options = JobOptions { deadline: Some(Duration::from_millis(50)), ..Default::default() };
    let job = orch.submit(specs, options).unwrap();
    let report = orch.result(job).await.unwrap();

    assert!(report.cancelled);
    assert_eq!(report.status, JobStatus::Failed);
}

#[tokio::test]
async fn concatenate_merges_locally() {
    let good = MockAdapter::succeeding("good");
    let synth = MockAdapter::succeeding("synth");
    let mut roles = RoleRegistry::uniform("synth".into());
    roles.insert("alpha", RoleBinding::new("good".into()));
    roles.insert("beta", RoleBinding::new("good".into()));
    let orch = orchestrator(&[Arc::clone(&good), Arc::clone(&synth)], roles);

    let specs = vec![TaskSpec::new("alpha", "a"), TaskSpec::new("beta", "b")];
    let options =
        JobOptions { aggregation: AggregationStrategy::Concatenate, ..Default::default() };
    let job = orch.submit(specs, options).unwrap();
    let report = orch.result(job).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    let merged = report.synthesis.expect("concatenated output");
    assert_eq!(merged.provider, "aggregate".into());
    assert!(merged.content.contains("## alpha"));
    assert!(merged.content.contains("## beta"));
    assert_eq!(synth.calls(), 0, "no model call for local concatenation");
}

#[tokio::test]
async fn synthesis_failure_keeps_task_derived_status() {
    let good = MockAdapter::succeeding("good");
    let synth = MockAdapter::failing("synth", GatewayError::ProviderInternal("merge down".into()));
    let mut roles = RoleRegistry::uniform("synth".into());
    roles.insert("worker", RoleBinding::new("good".into()));
    let orch = orchestrator(&[Arc::clone(&good), Arc::clone(&synth)], roles);

    let specs = vec![TaskSpec::new("worker", "a"), TaskSpec::new("worker", "b")];
    let job = orch.submit(specs, JobOptions::default()).unwrap();
    let report = orch.result(job).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert!(report.synthesis.is_none());
    let failure = report.synthesis_error.expect("synthesis diagnostic");
    assert_eq!(failure.label, "synthesis");
    assert_eq!(failure.kind, "provider_internal");
}

#[tokio::test]
async fn provider_override_routes_past_the_role_binding() {
    let good = MockAdapter::succeeding("good");
    let alt = MockAdapter::succeeding("alt");
    let mut roles = RoleRegistry::uniform("good".into());
    roles.insert("worker", RoleBinding::new("good".into()));
    let orch = orchestrator(&[Arc::clone(&good), Arc::clone(&alt)], roles);

    let specs = vec![TaskSpec::new("worker", "a").with_provider("alt".into())];
    let options =
        JobOptions { aggregation: AggregationStrategy::Concatenate, ..Default::default() };
    let job = orch.submit(specs, options).unwrap();
    let report = orch.result(job).await.unwrap();

    assert_eq!(report.status, JobStatus::Completed);
    assert_eq!(alt.calls(), 1);
    assert_eq!(good.calls(), 0);
}

#[tokio::test]
async fn submission_is_validated_up_front() {
    let good = MockAdapter::succeeding("good");
    let mut roles = RoleRegistry::uniform("good".into());
    roles.insert("worker", RoleBinding::new("good".into()));
    let orch = orchestrator(&[Arc::clone(&good)], roles);

    assert!(matches!(
        orch.submit(Vec::new(), JobOptions::default()),
        Err(JobError::EmptyJob)
    ));
    assert!(matches!(
        orch.submit(vec![TaskSpec::new("ghost", "x")], JobOptions::default()),
        Err(JobError::UnknownRole(role)) if role == "ghost"
    ));
    assert_eq!(good.calls(), 0, "rejected jobs must not dispatch");
}

#[tokio::test]
async fn unknown_job_ids_are_reported() {
    let good = MockAdapter::succeeding("good");
    let orch = orchestrator(&[good], RoleRegistry::uniform("good".into()));

    let missing = aegis_gateway_swarm::JobId::new();
    assert!(matches!(orch.status(missing), Err(JobError::NotFound(_))));
    assert!(matches!(orch.result(missing).await, Err(JobError::NotFound(_))));
    assert!(matches!(orch.cancel(missing), Err(JobError::NotFound(_))));
}
