//! Structured observability hooks for the dispatch lifecycle.
//!
//! This module provides:
//! - A trigger-scoped tracing span via `trigger_span`
//! - Emission functions for key lifecycle events: parse, resolution, skip, creation
//!
//! Events are emitted at `info!` level; skips are `warn!`.

use tracing::{info, warn};

/// Span carrying the pipeline name of the trigger being processed.
///
/// Attach it with `tracing::Instrument` so it stays correct across awaits:
///
/// ```ignore
/// dispatch_trigger(..).instrument(trigger_span("build-and-publish")).await
/// ```
pub fn trigger_span(pipeline: &str) -> tracing::Span {
    tracing::info_span!("runbot.trigger", pipeline = %pipeline)
}

/// Emit event: a trigger line was parsed.
pub fn emit_trigger_parsed(pipeline: &str, named_args: usize, positional_args: usize) {
    info!(
        event = "trigger.parsed",
        pipeline = %pipeline,
        named_args = named_args,
        positional_args = positional_args,
    );
}

/// Emit event: pipeline found in a namespace.
pub fn emit_pipeline_resolved(pipeline: &str, namespace: &str) {
    info!(event = "pipeline.resolved", pipeline = %pipeline, namespace = %namespace);
}

/// Emit event: service account chosen.
pub fn emit_identity_resolved(service_account: &str, namespace: &str) {
    info!(event = "identity.resolved", service_account = %service_account, namespace = %namespace);
}

/// Emit event: trigger skipped (warning level).
pub fn emit_trigger_skipped(pipeline: &str, reason: &dyn std::fmt::Display) {
    warn!(event = "trigger.skipped", pipeline = %pipeline, reason = %reason);
}

/// Emit event: PipelineRun created.
pub fn emit_run_created(pipeline: &str, namespace: &str, run_name: &str) {
    info!(
        event = "run.created",
        pipeline = %pipeline,
        namespace = %namespace,
        run_name = %run_name,
    );
}

/// Emit event: all triggers of a comment processed.
pub fn emit_dispatch_finished(total: usize, dispatched: usize, skipped: usize) {
    info!(
        event = "dispatch.finished",
        total = total,
        dispatched = dispatched,
        skipped = skipped,
    );
}
