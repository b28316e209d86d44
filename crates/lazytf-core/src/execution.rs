use std::fmt;
use std::time::Duration;
use std::time::Instant;

use super::output::OutputBuffer;
use super::safety::OperationKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ExecutionId(pub u64);

impl fmt::Display for ExecutionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExitReason {
    Exited { code: Option<i32>, cancelled: bool },
    Killed,
    SpawnFailed { message: String },
    WaitFailed { message: String },
}

impl ExitReason {
    pub fn is_success(&self) -> bool {
        matches!(
            self,
            Self::Exited {
                code: Some(0),
                cancelled: false
            }
        )
    }

    pub fn describe(&self) -> String {
        match self {
            Self::Exited {
                code: Some(0),
                cancelled: false,
            } => "succeeded".to_string(),
            Self::Exited {
                code,
                cancelled: true,
            } => format!("cancelled (exit code {})", code.unwrap_or(-1)),
            Self::Exited { code, .. } => format!("failed with exit code {}", code.unwrap_or(-1)),
            Self::Killed => "failed: killed".to_string(),
            Self::SpawnFailed { message } => format!("failed to start: {message}"),
            Self::WaitFailed { message } => format!("failed while waiting: {message}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionPhase {
    Idle,
    Running,
    CancelRequested { since: Instant },
    ForceKilling,
    Completed(ExitReason),
}

impl ExecutionPhase {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::CancelRequested { .. } => "cancelling (graceful)",
            Self::ForceKilling => "cancelling (forced)",
            Self::Completed(reason) if reason.is_success() => "completed",
            Self::Completed(_) => "failed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelStep {
    Interrupt,
    ForceKill,
    AlreadyForcing,
    NotRunning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecutionState {
    id: ExecutionId,
    account: String,
    kind: OperationKind,
    started_at: Instant,
    phase: ExecutionPhase,
}

impl ExecutionState {
    pub fn id(&self) -> ExecutionId {
        self.id
    }

    pub fn account(&self) -> &str {
        &self.account
    }

    pub fn kind(&self) -> OperationKind {
        self.kind
    }

    pub fn started_at(&self) -> Instant {
        self.started_at
    }

    pub fn phase(&self) -> &ExecutionPhase {
        &self.phase
    }

    pub fn is_live(&self) -> bool {
        !matches!(self.phase, ExecutionPhase::Completed(_))
    }

    pub fn exit_reason(&self) -> Option<&ExitReason> {
        match &self.phase {
            ExecutionPhase::Completed(reason) => Some(reason),
            _ => None,
        }
    }

    pub fn request_cancel(&mut self, now: Instant) -> CancelStep {
        match self.phase {
            ExecutionPhase::Running => {
                self.phase = ExecutionPhase::CancelRequested { since: now };
                CancelStep::Interrupt
            }
            ExecutionPhase::CancelRequested { .. } => {
                self.phase = ExecutionPhase::ForceKilling;
                CancelStep::ForceKill
            }
            ExecutionPhase::ForceKilling => CancelStep::AlreadyForcing,
            ExecutionPhase::Idle | ExecutionPhase::Completed(_) => CancelStep::NotRunning,
        }
    }

    pub fn escalate_if_expired(&mut self, now: Instant, grace: Duration) -> bool {
        match self.phase {
            ExecutionPhase::CancelRequested { since } if now.duration_since(since) >= grace => {
                self.phase = ExecutionPhase::ForceKilling;
                true
            }
            _ => false,
        }
    }

    pub fn observe_exit(&mut self, code: Option<i32>) -> Option<ExitReason> {
        let reason = match self.phase {
            ExecutionPhase::Running | ExecutionPhase::Idle => ExitReason::Exited {
                code,
                cancelled: false,
            },
            ExecutionPhase::CancelRequested { .. } => ExitReason::Exited {
                code,
                cancelled: true,
            },
            ExecutionPhase::ForceKilling => ExitReason::Killed,
            ExecutionPhase::Completed(_) => return None,
        };
        self.phase = ExecutionPhase::Completed(reason.clone());
        Some(reason)
    }

    pub fn observe_wait_failure(&mut self, message: String) -> Option<ExitReason> {
        let reason = match self.phase {
            ExecutionPhase::ForceKilling => ExitReason::Killed,
            ExecutionPhase::Completed(_) => return None,
            _ => ExitReason::WaitFailed { message },
        };
        self.phase = ExecutionPhase::Completed(reason.clone());
        Some(reason)
    }
}

#[derive(Debug, Clone)]
pub struct ExecutionSlot {
    current: Option<ExecutionState>,
    output: OutputBuffer,
    next_id: u64,
}

impl Default for ExecutionSlot {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionSlot {
    pub fn new() -> Self {
        Self {
            current: None,
            output: OutputBuffer::new(),
            next_id: 1,
        }
    }

    pub fn current(&self) -> Option<&ExecutionState> {
        self.current.as_ref()
    }

    pub fn active(&self) -> Option<&ExecutionState> {
        self.current.as_ref().filter(|state| state.is_live())
    }

    pub fn is_busy(&self) -> bool {
        self.active().is_some()
    }

    pub fn phase(&self) -> ExecutionPhase {
        self.current
            .as_ref()
            .map(|state| state.phase.clone())
            .unwrap_or(ExecutionPhase::Idle)
    }

    pub fn output(&self) -> &OutputBuffer {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut OutputBuffer {
        &mut self.output
    }

    // Must not be called while an execution is live.
    pub fn begin(&mut self) -> ExecutionId {
        debug_assert!(!self.is_busy(), "begin called while an execution is live");
        self.current = None;
        self.output.clear();
        let id = ExecutionId(self.next_id);
        self.next_id += 1;
        id
    }

    pub fn mark_running(
        &mut self,
        id: ExecutionId,
        account: impl Into<String>,
        kind: OperationKind,
        now: Instant,
    ) {
        self.current = Some(ExecutionState {
            id,
            account: account.into(),
            kind,
            started_at: now,
            phase: ExecutionPhase::Running,
        });
    }

    pub fn mark_spawn_failed(
        &mut self,
        id: ExecutionId,
        account: impl Into<String>,
        kind: OperationKind,
        now: Instant,
        message: impl Into<String>,
    ) {
        self.current = Some(ExecutionState {
            id,
            account: account.into(),
            kind,
            started_at: now,
            phase: ExecutionPhase::Completed(ExitReason::SpawnFailed {
                message: message.into(),
            }),
        });
    }

    pub fn request_cancel(&mut self, now: Instant) -> CancelStep {
        match self.current.as_mut() {
            Some(state) => state.request_cancel(now),
            None => CancelStep::NotRunning,
        }
    }

    pub fn escalate_if_expired(&mut self, now: Instant, grace: Duration) -> bool {
        self.current
            .as_mut()
            .is_some_and(|state| state.escalate_if_expired(now, grace))
    }

    pub fn observe_exit(&mut self, id: ExecutionId, code: Option<i32>) -> Option<ExitReason> {
        self.current
            .as_mut()
            .filter(|state| state.id == id)?
            .observe_exit(code)
    }

    pub fn observe_wait_failure(&mut self, id: ExecutionId, message: String) -> Option<ExitReason> {
        self.current
            .as_mut()
            .filter(|state| state.id == id)?
            .observe_wait_failure(message)
    }

    pub fn accepts_output_from(&self, id: ExecutionId) -> bool {
        self.current.as_ref().is_some_and(|state| state.id == id)
    }

    pub fn acknowledge(&mut self) -> bool {
        if self.current.as_ref().is_some_and(|state| !state.is_live()) {
            self.current = None;
            return true;
        }
        false
    }
}
