use std::path::Path;
use std::path::PathBuf;

use lazytf_core::AccountEntry;
use lazytf_core::ClassifiedLine;
use lazytf_core::ExecutionId;
use lazytf_core::OperationKind;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecRequest {
    pub cwd: PathBuf,
    pub program: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

impl ExecRequest {
    pub fn display_command(&self) -> String {
        let mut parts = Vec::with_capacity(self.args.len() + 1);
        parts.push(self.program.as_str());
        parts.extend(self.args.iter().map(String::as_str));
        parts.join(" ")
    }
}

/// Turns an operation on an account into a concrete command line.
pub trait OperationAdapter {
    fn name(&self) -> &'static str;

    /// `None` when the operation runs in-process or the account cannot supply what it needs.
    fn build(
        &self,
        kind: OperationKind,
        entry: &AccountEntry,
        base_dir: &Path,
    ) -> Option<ExecRequest>;

    /// Switches the account's composition to the named workspace.
    fn select_workspace(&self, _entry: &AccountEntry, _workspace: &str) -> Option<ExecRequest> {
        None
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEventKind {
    Line(ClassifiedLine),
    Exited { code: Option<i32> },
    WaitFailed { message: String },
}

/// One item on the queue from a worker to the event loop. Items for one execution
/// arrive in the order they were produced and the terminal item is always last.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerEvent {
    pub execution: ExecutionId,
    pub kind: WorkerEventKind,
}
