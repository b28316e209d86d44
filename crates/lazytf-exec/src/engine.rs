use std::sync::mpsc;
use std::sync::mpsc::Receiver;
use std::sync::mpsc::Sender;
use std::time::Duration;
use std::time::Instant;

use lazytf_core::authorize_start;
use lazytf_core::AccountRegistry;
use lazytf_core::ApplyConfirmation;
use lazytf_core::BlockReason;
use lazytf_core::CancelStep;
use lazytf_core::ExecutionId;
use lazytf_core::ExecutionSlot;
use lazytf_core::ExitReason;
use lazytf_core::LineCategory;
use lazytf_core::OperationKind;
use lazytf_core::RiskClass;
use lazytf_core::Settings;
use thiserror::Error;
use tracing::info;
use tracing::warn;

use crate::commands::TerraformAdapter;
use crate::contracts::ExecRequest;
use crate::contracts::OperationAdapter;
use crate::contracts::WorkerEvent;
use crate::contracts::WorkerEventKind;
use crate::executor::ProcessControl;
use crate::executor::ProcessLauncher;
use crate::executor::RuntimeLauncher;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StartError {
    #[error(transparent)]
    Blocked(#[from] BlockReason),
    #[error("{0} does not run an external process")]
    NotAProcess(&'static str),
}

/// Terminal outcome of one execution, reported once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletedExecution {
    pub id: ExecutionId,
    pub account: String,
    pub kind: OperationKind,
    pub reason: ExitReason,
}

/// Owns the single execution slot: gated start, two-stage cancel, and the worker queue.
pub struct CommandExecutionEngine {
    launcher: Box<dyn ProcessLauncher>,
    adapter: Box<dyn OperationAdapter>,
    slot: ExecutionSlot,
    control: Option<Box<dyn ProcessControl>>,
    events_tx: Sender<WorkerEvent>,
    events_rx: Receiver<WorkerEvent>,
    finished: Vec<CompletedExecution>,
    grace: Duration,
}

impl CommandExecutionEngine {
    pub fn new(
        launcher: Box<dyn ProcessLauncher>,
        adapter: Box<dyn OperationAdapter>,
        grace: Duration,
    ) -> Self {
        let (events_tx, events_rx) = mpsc::channel();
        Self {
            launcher,
            adapter,
            slot: ExecutionSlot::new(),
            control: None,
            events_tx,
            events_rx,
            finished: Vec::new(),
            grace,
        }
    }

    /// Real processes with the binaries and grace period from `settings`.
    pub fn runtime(settings: &Settings) -> Self {
        Self::new(
            Box::new(RuntimeLauncher),
            Box::new(TerraformAdapter::from_settings(settings)),
            settings.cancel_grace(),
        )
    }

    pub fn slot(&self) -> &ExecutionSlot {
        &self.slot
    }

    pub fn is_busy(&self) -> bool {
        self.slot.is_busy()
    }

    pub fn grace(&self) -> Duration {
        self.grace
    }

    pub fn adapter_name(&self) -> &'static str {
        self.adapter.name()
    }

    pub fn push_notice(&mut self, category: LineCategory, text: impl Into<String>) {
        self.slot.output_mut().push_notice(category, text);
    }

    /// Gate, then spawn. A blocked request leaves the slot untouched apart from a notice.
    /// A spawn failure still returns the id; its outcome is reported by the next `tick`.
    pub fn start(
        &mut self,
        registry: &AccountRegistry,
        kind: OperationKind,
        account: &str,
        confirmation: Option<&ApplyConfirmation>,
        now: Instant,
    ) -> Result<ExecutionId, StartError> {
        self.launch(registry, kind, account, confirmation, None, now)
    }

    /// Runs `terraform workspace select` for the account, under the same gate as `start`.
    pub fn select_workspace(
        &mut self,
        registry: &AccountRegistry,
        account: &str,
        workspace: &str,
        now: Instant,
    ) -> Result<ExecutionId, StartError> {
        self.launch(
            registry,
            OperationKind::WorkspaceSelect,
            account,
            None,
            Some(workspace),
            now,
        )
    }

    fn launch(
        &mut self,
        registry: &AccountRegistry,
        kind: OperationKind,
        account: &str,
        confirmation: Option<&ApplyConfirmation>,
        workspace: Option<&str>,
        now: Instant,
    ) -> Result<ExecutionId, StartError> {
        let request = match self.preflight(registry, kind, account, confirmation, workspace) {
            Ok(request) => request,
            Err(err) => {
                warn!(account, operation = kind.label(), reason = %err, "operation blocked");
                self.push_notice(
                    LineCategory::Error,
                    format!("Cannot run {}: {err}", kind.label()),
                );
                return Err(err);
            }
        };

        let id = self.slot.begin();
        self.control = None;
        self.push_notice(
            LineCategory::Notice,
            format!("Running `{}` in {}", kind.label(), request.cwd.display()),
        );
        if kind.uses_var_files() {
            if let Some(files) = registry
                .get(account)
                .and_then(|entry| entry.resolution())
                .filter(|resolution| !resolution.var_files.is_empty())
                .map(|resolution| {
                    resolution
                        .var_files
                        .iter()
                        .map(|file| file.path.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                })
            {
                self.push_notice(LineCategory::Notice, format!("Using var files: {files}"));
            }
        }

        info!(
            execution = %id,
            account,
            operation = kind.label(),
            command = %request.display_command(),
            cwd = %request.cwd.display(),
            "starting operation"
        );
        match self.launcher.launch(id, &request, self.events_tx.clone()) {
            Ok(control) => {
                self.control = Some(control);
                self.slot.mark_running(id, account, kind, now);
            }
            Err(err) => {
                let message = err.to_string();
                warn!(execution = %id, error = %message, "spawn failed");
                self.slot
                    .mark_spawn_failed(id, account, kind, now, message.clone());
                let reason = ExitReason::SpawnFailed { message };
                self.push_outcome(kind, &reason);
                self.finished.push(CompletedExecution {
                    id,
                    account: account.to_string(),
                    kind,
                    reason,
                });
            }
        }
        Ok(id)
    }

    fn preflight(
        &self,
        registry: &AccountRegistry,
        kind: OperationKind,
        account: &str,
        confirmation: Option<&ApplyConfirmation>,
        workspace: Option<&str>,
    ) -> Result<ExecRequest, StartError> {
        authorize_start(registry, &self.slot, account, kind, confirmation).into_result()?;
        let entry = registry
            .get(account)
            .ok_or_else(|| BlockReason::AccountNotFound(account.to_string()))?;

        if matches!(
            kind.risk_class(),
            RiskClass::Execution | RiskClass::Destructive
        ) {
            if let Some(resolution) = entry.resolution() {
                if !resolution.composition_dir.is_dir() {
                    return Err(BlockReason::PathResolution {
                        account: account.to_string(),
                        path: resolution.composition_dir.clone(),
                    }
                    .into());
                }
            }
        }

        let request = match (kind, workspace) {
            (OperationKind::WorkspaceSelect, Some(workspace)) => {
                self.adapter.select_workspace(entry, workspace)
            }
            _ => self.adapter.build(kind, entry, registry.base_dir()),
        };
        request.ok_or(StartError::NotAProcess(kind.label()))
    }

    /// First call interrupts, the second force-kills.
    pub fn cancel(&mut self, now: Instant) -> CancelStep {
        let step = self.slot.request_cancel(now);
        match step {
            CancelStep::Interrupt => {
                info!(grace_secs = self.grace.as_secs(), "graceful cancel requested");
                self.push_notice(
                    LineCategory::Warning,
                    "Graceful cancel requested. Sending SIGINT...",
                );
                self.push_notice(
                    LineCategory::Warning,
                    format!(
                        "Press `c` again to force kill. Forcing automatically after {}s.",
                        self.grace.as_secs()
                    ),
                );
                if let Some(control) = self.control.as_mut() {
                    if let Err(err) = control.interrupt() {
                        warn!(error = %err, "interrupt delivery failed");
                        self.push_notice(
                            LineCategory::Error,
                            format!("Could not interrupt the process: {err}"),
                        );
                    }
                }
            }
            CancelStep::ForceKill => self.force_kill(),
            CancelStep::AlreadyForcing => {
                self.push_notice(LineCategory::Info, "Force kill already in progress.");
            }
            CancelStep::NotRunning => {
                self.push_notice(LineCategory::Info, "Nothing is running.");
            }
        }
        step
    }

    fn force_kill(&mut self) {
        warn!("force kill requested");
        self.push_notice(
            LineCategory::Error,
            "Force kill requested. This may leave Terraform state locked.",
        );
        if let Some(control) = self.control.as_mut() {
            if let Err(err) = control.kill() {
                warn!(error = %err, "kill delivery failed");
                self.push_notice(
                    LineCategory::Error,
                    format!("Could not kill the process: {err}"),
                );
            }
        }
    }

    /// Drains the worker queue in arrival order, then enforces the grace period.
    pub fn tick(&mut self, now: Instant) -> Vec<CompletedExecution> {
        let mut completed = std::mem::take(&mut self.finished);
        while let Ok(event) = self.events_rx.try_recv() {
            if !self.slot.accepts_output_from(event.execution) {
                continue;
            }
            let reason = match event.kind {
                WorkerEventKind::Line(line) => {
                    self.slot.output_mut().push_process(line);
                    None
                }
                WorkerEventKind::Exited { code } => self.slot.observe_exit(event.execution, code),
                WorkerEventKind::WaitFailed { message } => {
                    self.slot.observe_wait_failure(event.execution, message)
                }
            };
            if let Some(reason) = reason {
                completed.extend(self.complete(event.execution, reason));
            }
        }

        if self.slot.escalate_if_expired(now, self.grace) {
            self.push_notice(
                LineCategory::Warning,
                format!(
                    "Grace period of {}s expired without exit.",
                    self.grace.as_secs()
                ),
            );
            self.force_kill();
        }
        completed
    }

    fn complete(&mut self, id: ExecutionId, reason: ExitReason) -> Option<CompletedExecution> {
        self.control = None;
        let current = self.slot.current()?;
        let (account, kind) = (current.account().to_string(), current.kind());
        info!(
            execution = %id,
            account = account.as_str(),
            operation = kind.label(),
            outcome = %reason.describe(),
            "operation finished"
        );
        self.push_outcome(kind, &reason);
        Some(CompletedExecution {
            id,
            account,
            kind,
            reason,
        })
    }

    fn push_outcome(&mut self, kind: OperationKind, reason: &ExitReason) {
        let category = if reason.is_success() {
            LineCategory::Summary
        } else {
            LineCategory::Error
        };
        self.push_notice(
            category,
            format!("`{}` {}", kind.label(), reason.describe()),
        );
    }

    /// Completed -> Idle.
    pub fn acknowledge(&mut self) -> bool {
        self.slot.acknowledge()
    }
}
