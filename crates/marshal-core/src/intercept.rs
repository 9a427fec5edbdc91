use crate::api::{CoordinationApi, NotifyRequest, PreflightRequest, WorkItem};
use crate::config::CoordinationConfig;
use crate::decision::{PendingDecision, Rejection};
use crate::error::{ApiError, InterceptError};
use crate::invocation::CommandInvocation;
use crate::related::{self, IssueGraph, RelatedWorkItem};
use crate::reserve::{ReconcileOutcome, Reconciler};
use crate::runner::{ProcessRunner, RunOutput};
use crate::sync::{self, SyncManager, SyncReport};
use std::path::Path;

/// Exit code for a rejected invocation. The underlying tool never ran,
/// so there is no tool exit code to forward.
pub const REJECTED_EXIT_CODE: i32 = 2;

/// Everything one intercepted invocation produced, for the binary to
/// render. Warnings never change `exit_code`; only a rejection or the
/// underlying tool's own exit does.
#[derive(Debug, Default)]
pub struct InterceptOutcome {
    pub run: Option<RunOutput>,
    pub rejection: Option<Rejection>,
    pub reconcile: Option<ReconcileOutcome>,
    pub sync: Option<SyncReport>,
    pub related: Vec<RelatedWorkItem>,
    pub notified: Vec<WorkItem>,
    pub warnings: Vec<String>,
    pub exit_code: i32,
}

/// Orchestrates one tracker invocation: pre-flight approval,
/// close-claim gating, reservation reconciliation, tool execution,
/// post-run sync, related-work discovery, and override notifications,
/// strictly in that order.
pub struct Interceptor<'a, A: CoordinationApi, R: ProcessRunner> {
    api: &'a A,
    runner: &'a R,
    config: &'a CoordinationConfig,
    repo_root: &'a Path,
}

impl<'a, A: CoordinationApi, R: ProcessRunner> Interceptor<'a, A, R> {
    pub fn new(
        api: &'a A,
        runner: &'a R,
        config: &'a CoordinationConfig,
        repo_root: &'a Path,
    ) -> Self {
        Self {
            api,
            runner,
            config,
            repo_root,
        }
    }

    pub fn intercept(
        &self,
        invocation: &CommandInvocation,
    ) -> Result<InterceptOutcome, InterceptError> {
        let mut outcome = InterceptOutcome::default();

        if invocation.override_message.is_some() && invocation.bead_id().is_none() {
            outcome.warnings.push(
                "override given without a target bead; nobody will be notified".to_string(),
            );
        }

        let (mut decision, in_flight) = self.preflight(invocation, &mut outcome)?;

        if invocation.is_close() {
            if let Some(bead_id) = invocation.bead_id() {
                decision = decision.apply_close_claims(
                    bead_id,
                    &in_flight,
                    &self.config.workspace_id,
                    invocation.override_message.as_deref(),
                );
            }
        }

        if let PendingDecision::Rejected(rejection) = decision {
            outcome.rejection = Some(rejection);
            outcome.exit_code = REJECTED_EXIT_CODE;
            return Ok(outcome);
        }

        if self.config.auto_reserve.enabled {
            outcome.reconcile = Some(self.reconcile(&mut outcome.warnings));
        }

        let run = self.runner.run(
            &self.config.tracker_bin,
            &invocation.cleaned,
            self.repo_root,
        )?;
        let succeeded = run.succeeded();
        outcome.exit_code = run.exit_code;
        outcome.run = Some(run);

        if succeeded && invocation.is_mutating() {
            let report = SyncManager::new(
                self.api,
                self.runner,
                &self.config.workspace_id,
                &self.config.repo_id,
                &self.config.alias,
                &self.config.tracker_bin,
                self.repo_root,
            )
            .run();
            if let Some(warning) = &report.warning {
                outcome.warnings.push(warning.clone());
            }
            outcome.sync = Some(report);
        }

        if succeeded && invocation.is_close() {
            if let Some(bead_id) = invocation.bead_id() {
                let graph = IssueGraph::load(&sync::export_path(self.repo_root));
                outcome.related =
                    related::discover(&graph, bead_id, &in_flight, &self.config.workspace_id);
            }
        }

        if let PendingDecision::OverrideApplied(directive) = decision {
            // Best effort: the override already took effect, a lost
            // note cannot roll it back.
            for item in directive.notify {
                let request = NotifyRequest {
                    to_workspace_id: item.workspace_id.clone(),
                    from_alias: self.config.alias.clone(),
                    from_human_name: self.config.human_name.clone(),
                    bead_id: item.bead_id.clone(),
                    message: directive.message.clone(),
                };
                if self.api.notify(&request).is_ok() {
                    outcome.notified.push(item);
                }
            }
        }

        Ok(outcome)
    }

    /// Pre-flight approval. Only a gone registration is fatal; any
    /// other failure degrades to an approved-with-warning pass so the
    /// remote service cannot wedge local work.
    fn preflight(
        &self,
        invocation: &CommandInvocation,
        outcome: &mut InterceptOutcome,
    ) -> Result<(PendingDecision, Vec<WorkItem>), InterceptError> {
        let request = PreflightRequest {
            workspace_id: self.config.workspace_id.clone(),
            repo_id: self.config.repo_id.clone(),
            alias: self.config.alias.clone(),
            human_name: self.config.human_name.clone(),
            repo_origin: self.config.repo_origin.clone(),
            role: self.config.role.clone(),
            command_line: invocation.command_line(),
        };

        match self.api.preflight(&request) {
            Ok(response) => {
                let in_flight = response.context.beads_in_progress.clone();
                let decision = PendingDecision::Unevaluated.apply_preflight(
                    &response,
                    invocation.override_message.as_deref(),
                    invocation.bead_id(),
                    &self.config.workspace_id,
                );
                Ok((decision, in_flight))
            }
            Err(ApiError::Gone) => Err(InterceptError::IdentityGone),
            Err(err) => {
                outcome
                    .warnings
                    .push(format!("pre-flight check failed: {err}"));
                Ok((PendingDecision::Approved, Vec::new()))
            }
        }
    }

    fn reconcile(&self, warnings: &mut Vec<String>) -> ReconcileOutcome {
        let status = match self.runner.run(
            "git",
            &[
                "status".to_string(),
                "--porcelain".to_string(),
                "-z".to_string(),
            ],
            self.repo_root,
        ) {
            Ok(output) if output.succeeded() => output,
            Ok(output) => {
                warnings.push(format!(
                    "git status failed with exit code {}",
                    output.exit_code
                ));
                return ReconcileOutcome::default();
            }
            Err(err) => {
                warnings.push(format!("git status failed: {err}"));
                return ReconcileOutcome::default();
            }
        };

        let entries = match marshal_vcs::parse_porcelain(status.stdout.as_bytes()) {
            Ok(entries) => entries,
            Err(err) => {
                warnings.push(format!("cannot parse git status: {err}"));
                return ReconcileOutcome::default();
            }
        };

        Reconciler::new(
            self.api,
            &self.config.repo_id,
            &self.config.alias,
            self.config.auto_reserve.ttl_secs,
        )
        .reconcile(&entries, self.config.auto_reserve.include_untracked)
    }
}
