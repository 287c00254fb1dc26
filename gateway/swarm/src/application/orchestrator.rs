// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Swarm Orchestrator
//
// Fans one job out into labeled sub-tasks, runs them concurrently under a
// semaphore bound, tolerates partial failure, and merges the successful
// outputs. Every model call, sub-task or synthesis, goes through the same
// resilience executor; the orchestrator owns no transport and no retry
// logic of its own.

use crate::application::roles::{RoleBinding, RoleRegistry};
use crate::domain::job::{
    derived_status, AggregationStrategy, FailedTask, JobError, JobId, JobOptions, JobReport,
    JobStatus, SwarmTask, TaskSpec, TaskStatus,
};
use aegis_gateway_core::{
    CanonicalRequest, CanonicalResponse, FinishReason, GatewayError, Message, ProviderId,
    ResilienceExecutor, TemplateEngine, TokenUsage,
};
use chrono::Utc;
use dashmap::DashMap;
use metrics::{counter, histogram};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Notify, Semaphore};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Provider tag on locally concatenated aggregates (no model call involved).
const AGGREGATE_PROVIDER: &str = "aggregate";

/// Shared state for one in-flight or finished job.
struct JobCell {
    id: JobId,
    options: JobOptions,
    tasks: Mutex<Vec<SwarmTask>>,
    cancel: CancellationToken,
    done: Notify,
    report: Mutex<Option<JobReport>>,
    submitted_at: Instant,
}

/// Coordinates fan-out jobs. Cheap to share; all methods take `&self`.
pub struct SwarmOrchestrator {
    executor: Arc<ResilienceExecutor>,
    roles: Arc<RoleRegistry>,
    templates: TemplateEngine,
    jobs: DashMap<JobId, Arc<JobCell>>,
}

impl SwarmOrchestrator {
    pub fn new(executor: Arc<ResilienceExecutor>, roles: Arc<RoleRegistry>) -> Self {
        Self { executor, roles, templates: TemplateEngine::new(), jobs: DashMap::new() }
    }

    /// Submit a job. Validates up front: an empty job or an unknown role is
    /// rejected before any sub-task is dispatched.
    pub fn submit(
        self: &Arc<Self>,
        specs: Vec<TaskSpec>,
        options: JobOptions,
    ) -> Result<JobId, JobError> {
        if specs.is_empty() {
            return Err(JobError::EmptyJob);
        }
        let mut bindings = Vec::with_capacity(specs.len());
        for spec in &specs {
            let binding = self
                .roles
                .resolve(&spec.role)
                .ok_or_else(|| JobError::UnknownRole(spec.role.clone()))?;
            bindings.push(binding.clone());
        }

        let tasks: Vec<SwarmTask> = specs.into_iter().map(SwarmTask::new).collect();
        let cell = Arc::new(JobCell {
            id: JobId::new(),
            options,
            tasks: Mutex::new(tasks),
            cancel: CancellationToken::new(),
            done: Notify::new(),
            report: Mutex::new(None),
            submitted_at: Instant::now(),
        });
        let id = cell.id;
        self.jobs.insert(id, Arc::clone(&cell));

        info!(job = %id, tasks = bindings.len(), "job submitted");
        counter!("swarm_jobs_submitted_total").increment(1);

        let orchestrator = Arc::clone(self);
        tokio::spawn(async move {
            orchestrator.run_job(cell, bindings).await;
        });

        Ok(id)
    }

    /// Current status. Derived from task states while running; read from the
    /// stored report once finished.
    pub fn status(&self, job: JobId) -> Result<JobStatus, JobError> {
        let cell = self.jobs.get(&job).ok_or(JobError::NotFound(job))?;
        if let Some(report) = cell.report.lock().as_ref() {
            return Ok(report.status);
        }
        let status = derived_status(&cell.tasks.lock());
        Ok(status)
    }

    /// Wait for the job to finish and return its report.
    pub async fn result(&self, job: JobId) -> Result<JobReport, JobError> {
        let cell =
            Arc::clone(self.jobs.get(&job).ok_or(JobError::NotFound(job))?.value());
        loop {
            let notified = cell.done.notified();
            tokio::pin!(notified);
            // Register before checking, so a completion landing in between
            // still wakes us.
            notified.as_mut().enable();
            if let Some(report) = cell.report.lock().clone() {
                return Ok(report);
            }
            notified.await;
        }
    }

    /// Cancel a job. Tasks already in flight resolve with a cancellation
    /// error; pending tasks are never dispatched. Idempotent.
    pub fn cancel(&self, job: JobId) -> Result<(), JobError> {
        let cell = self.jobs.get(&job).ok_or(JobError::NotFound(job))?;
        cell.cancel.cancel();
        debug!(job = %job, "cancellation requested");
        Ok(())
    }

    /// Drop a finished job's state. No-op while the job is still running.
    pub fn forget(&self, job: JobId) {
        let finished =
            self.jobs.get(&job).is_some_and(|cell| cell.report.lock().is_some());
        if finished {
            self.jobs.remove(&job);
        }
    }

    async fn run_job(self: Arc<Self>, cell: Arc<JobCell>, bindings: Vec<RoleBinding>) {
        if let Some(deadline) = cell.options.deadline {
            let cancel = cell.cancel.clone();
            let job = cell.id;
            tokio::spawn(async move {
                tokio::select! {
                    _ = tokio::time::sleep(deadline) => {
                        warn!(job = %job, deadline_ms = deadline.as_millis() as u64, "deadline elapsed, cancelling");
                        cancel.cancel();
                    }
                    _ = cancel.cancelled() => {}
                }
            });
        }

        let semaphore = Arc::new(Semaphore::new(cell.options.max_concurrency.max(1)));
        let mut join_set = JoinSet::new();
        let task_count = cell.tasks.lock().len();

        for idx in 0..task_count {
            let orchestrator = Arc::clone(&self);
            let cell = Arc::clone(&cell);
            let binding = bindings[idx].clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let outcome = orchestrator.run_task(&cell, idx, binding, semaphore).await;
                (idx, outcome)
            });
        }

        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok((idx, outcome)) => {
                    let mut tasks = cell.tasks.lock();
                    let task = &mut tasks[idx];
                    task.ended_at = Some(Utc::now());
                    match outcome {
                        Ok(response) => {
                            task.status = TaskStatus::Succeeded;
                            task.result = Some(response);
                        }
                        Err(error) => {
                            task.status = TaskStatus::Failed;
                            task.error = Some(error);
                        }
                    }
                }
                Err(join_error) => {
                    warn!(job = %cell.id, error = %join_error, "sub-task aborted");
                }
            }
        }

        // A panicked sub-task leaves its slot non-terminal; sweep it into a
        // failure so the derived status stays well-defined.
        {
            let mut tasks = cell.tasks.lock();
            for task in tasks.iter_mut().filter(|t| !t.status.is_terminal()) {
                task.status = TaskStatus::Failed;
                task.error = Some(GatewayError::Cancelled);
                task.ended_at = Some(Utc::now());
            }
        }

        let report = self.finalize(&cell).await;
        let status = report.status;
        *cell.report.lock() = Some(report);
        cell.cancel.cancel();
        cell.done.notify_waiters();

        let elapsed = cell.submitted_at.elapsed();
        counter!("swarm_jobs_total", "status" => status_label(status)).increment(1);
        histogram!("swarm_job_duration_seconds").record(elapsed.as_secs_f64());
        info!(job = %cell.id, status = ?status, elapsed_ms = elapsed.as_millis() as u64, "job finished");
    }

    async fn run_task(
        &self,
        cell: &JobCell,
        idx: usize,
        binding: RoleBinding,
        semaphore: Arc<Semaphore>,
    ) -> Result<CanonicalResponse, GatewayError> {
        let permit = tokio::select! {
            _ = cell.cancel.cancelled() => return Err(GatewayError::Cancelled),
            permit = semaphore.acquire_owned() => {
                permit.map_err(|_| GatewayError::Cancelled)?
            }
        };
        // The permit may have raced a cancellation; a cancelled job must not
        // start new work.
        if cell.cancel.is_cancelled() {
            return Err(GatewayError::Cancelled);
        }

        let (label, payload, provider) = {
            let mut tasks = cell.tasks.lock();
            let task = &mut tasks[idx];
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
            let provider =
                task.provider_override.clone().unwrap_or_else(|| binding.provider.clone());
            (task.label.clone(), task.payload.clone(), provider)
        };

        let prompt = self
            .templates
            .render(&binding.template, &json!({ "role": label, "payload": payload }))?;
        let request = CanonicalRequest::builder()
            .message(Message::user(prompt))
            .params(binding.params.clone())
            .build();

        let outcome = tokio::select! {
            _ = cell.cancel.cancelled() => Err(GatewayError::Cancelled),
            result = self.executor.execute(&provider, &request) => result,
        };
        drop(permit);
        counter!(
            "swarm_tasks_total",
            "outcome" => if outcome.is_ok() { "succeeded" } else { "failed" }
        )
        .increment(1);
        outcome
    }

    /// Build the final report: derived status, failure diagnostics, summed
    /// usage, and the aggregated output when any sub-task succeeded.
    async fn finalize(&self, cell: &JobCell) -> JobReport {
        let tasks = cell.tasks.lock().clone();
        let cancelled = cell.cancel.is_cancelled();
        let status = derived_status(&tasks);

        let failed: Vec<FailedTask> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Failed)
            .map(|t| {
                let (kind, message) = match &t.error {
                    Some(error) => (error.kind().to_string(), error.to_string()),
                    None => ("unknown".to_string(), "no error recorded".to_string()),
                };
                FailedTask { label: t.label.clone(), kind, message }
            })
            .collect();

        let mut usage = TokenUsage::default();
        let successes: Vec<&SwarmTask> = tasks
            .iter()
            .filter(|t| t.status == TaskStatus::Succeeded && t.result.is_some())
            .collect();
        for task in &successes {
            if let Some(response) = &task.result {
                usage.add(&response.usage);
            }
        }

        let mut synthesis = None;
        let mut synthesis_error = None;
        if !cancelled && !successes.is_empty() {
            match cell.options.aggregation {
                AggregationStrategy::Synthesize => {
                    match self.synthesize(&successes, &failed).await {
                        Ok(response) => {
                            usage.add(&response.usage);
                            synthesis = Some(response);
                        }
                        Err(error) => {
                            warn!(job = %cell.id, error = %error, "synthesis failed");
                            synthesis_error = Some(FailedTask {
                                label: "synthesis".to_string(),
                                kind: error.kind().to_string(),
                                message: error.to_string(),
                            });
                        }
                    }
                }
                AggregationStrategy::Concatenate => {
                    synthesis = Some(concatenate(&successes, usage));
                }
            }
        }

        JobReport {
            id: cell.id,
            status,
            cancelled,
            synthesis,
            synthesis_error,
            failed,
            tasks,
            usage,
            elapsed: cell.submitted_at.elapsed(),
        }
    }

    /// One extra canonical call that merges the successful outputs. Runs
    /// under the same resilience treatment as any sub-task.
    async fn synthesize(
        &self,
        successes: &[&SwarmTask],
        failed: &[FailedTask],
    ) -> Result<CanonicalResponse, GatewayError> {
        let binding = self.roles.synthesizer();
        let outputs: Vec<serde_json::Value> = successes
            .iter()
            .filter_map(|t| {
                t.result
                    .as_ref()
                    .map(|r| json!({ "label": t.label, "content": r.content }))
            })
            .collect();
        let failed_labels: Vec<&str> = failed.iter().map(|f| f.label.as_str()).collect();

        let prompt = self
            .templates
            .render(&binding.template, &json!({ "outputs": outputs, "failed": failed_labels }))?;
        let request = CanonicalRequest::builder()
            .message(Message::user(prompt))
            .params(binding.params.clone())
            .build();
        self.executor.execute(&binding.provider, &request).await
    }
}

/// Local label-prefixed merge; no model call, so usage is just the sum
/// already accumulated from the sub-tasks.
fn concatenate(successes: &[&SwarmTask], usage: TokenUsage) -> CanonicalResponse {
    let mut content = String::new();
    for task in successes {
        if let Some(response) = &task.result {
            content.push_str("## ");
            content.push_str(&task.label);
            content.push('\n');
            content.push_str(&response.content);
            content.push_str("\n\n");
        }
    }

    CanonicalResponse {
        content,
        usage,
        provider: ProviderId::new(AGGREGATE_PROVIDER),
        model: AGGREGATE_PROVIDER.to_string(),
        cached: false,
        latency: Duration::ZERO,
        finish_reason: FinishReason::Stop,
    }
}

fn status_label(status: JobStatus) -> &'static str {
    match status {
        JobStatus::Pending => "pending",
        JobStatus::Running => "running",
        JobStatus::Completed => "completed",
        JobStatus::PartiallyCompleted => "partially_completed",
        JobStatus::Failed => "failed",
    }
}
