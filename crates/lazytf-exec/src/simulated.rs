use std::io;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::sync::PoisonError;

use lazytf_core::ExecutionId;
use lazytf_core::OutputClassifier;

use crate::contracts::ExecRequest;
use crate::contracts::WorkerEvent;
use crate::contracts::WorkerEventKind;
use crate::executor::ProcessControl;
use crate::executor::ProcessLauncher;
use crate::executor::SpawnError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Interrupt,
    Kill,
}

#[derive(Debug, Default)]
struct Recorded {
    launches: Vec<(ExecutionId, ExecRequest)>,
    signals: Vec<(ExecutionId, Signal)>,
    events: Option<Sender<WorkerEvent>>,
    classifier: OutputClassifier,
    fail_next: Option<String>,
}

/// Launcher that spawns nothing. It records what would have run and lets the caller
/// feed synthetic worker events. Clones share the same record.
#[derive(Debug, Clone, Default)]
pub struct SimulatedLauncher {
    inner: Arc<Mutex<Recorded>>,
}

impl SimulatedLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    fn record(&self) -> MutexGuard<'_, Recorded> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The next launch fails as if the executable could not be started.
    pub fn fail_next_spawn(&self, message: impl Into<String>) {
        self.record().fail_next = Some(message.into());
    }

    pub fn requests(&self) -> Vec<ExecRequest> {
        self.record()
            .launches
            .iter()
            .map(|(_, request)| request.clone())
            .collect()
    }

    pub fn last_execution(&self) -> Option<ExecutionId> {
        self.record().launches.last().map(|(id, _)| *id)
    }

    pub fn signals(&self) -> Vec<(ExecutionId, Signal)> {
        self.record().signals.clone()
    }

    pub fn emit_line(&self, id: ExecutionId, text: impl Into<String>) {
        let mut record = self.record();
        let line = record.classifier.classify_line(text.into());
        send(&record, id, WorkerEventKind::Line(line));
    }

    pub fn exit(&self, id: ExecutionId, code: Option<i32>) {
        send(&self.record(), id, WorkerEventKind::Exited { code });
    }

    pub fn wait_failed(&self, id: ExecutionId, message: impl Into<String>) {
        send(
            &self.record(),
            id,
            WorkerEventKind::WaitFailed {
                message: message.into(),
            },
        );
    }
}

fn send(record: &Recorded, execution: ExecutionId, kind: WorkerEventKind) {
    if let Some(events) = &record.events {
        let _ = events.send(WorkerEvent { execution, kind });
    }
}

impl ProcessLauncher for SimulatedLauncher {
    fn launch(
        &self,
        id: ExecutionId,
        request: &ExecRequest,
        events: Sender<WorkerEvent>,
    ) -> Result<Box<dyn ProcessControl>, SpawnError> {
        let mut record = self.record();
        record.launches.push((id, request.clone()));
        if let Some(message) = record.fail_next.take() {
            return Err(SpawnError::Rejected(message));
        }
        record.events = Some(events);
        record.classifier.reset();
        Ok(Box::new(SimulatedControl {
            id,
            inner: Arc::clone(&self.inner),
        }))
    }
}

struct SimulatedControl {
    id: ExecutionId,
    inner: Arc<Mutex<Recorded>>,
}

impl ProcessControl for SimulatedControl {
    fn interrupt(&mut self) -> io::Result<()> {
        self.push(Signal::Interrupt);
        Ok(())
    }

    fn kill(&mut self) -> io::Result<()> {
        self.push(Signal::Kill);
        Ok(())
    }
}

impl SimulatedControl {
    fn push(&self, signal: Signal) {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .signals
            .push((self.id, signal));
    }
}
