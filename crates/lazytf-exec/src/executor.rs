use std::io;
use std::io::Read;
use std::process::Command;
use std::process::Stdio;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::sync::mpsc;
use std::sync::mpsc::Sender;
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use std::time::Instant;

use lazytf_core::ExecutionId;
use lazytf_core::OutputClassifier;
use thiserror::Error;
use tracing::debug;
use tracing::warn;

use crate::contracts::ExecRequest;
use crate::contracts::WorkerEvent;
use crate::contracts::WorkerEventKind;
use crate::lines::LineAssembler;

const READ_CHUNK: usize = 2048;
const POLL_EXIT: Duration = Duration::from_millis(50);
/// How long output may keep arriving after the child itself has exited. Descendants that
/// still hold the pipes are not waited for beyond this.
const DRAIN_AFTER_EXIT: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum SpawnError {
    #[error("could not start `{program}`: {source}")]
    Io {
        program: String,
        #[source]
        source: io::Error,
    },
    #[error("worker thread for `{program}` exited before reporting")]
    WorkerLost { program: String },
    #[error("{0}")]
    Rejected(String),
}

/// Signal delivery to a running process. Termination is observed by the worker, not here.
pub trait ProcessControl: Send {
    fn interrupt(&mut self) -> io::Result<()>;
    fn kill(&mut self) -> io::Result<()>;
}

/// Starts the process for a request and streams its events into `events`.
pub trait ProcessLauncher {
    fn launch(
        &self,
        id: ExecutionId,
        request: &ExecRequest,
        events: Sender<WorkerEvent>,
    ) -> Result<Box<dyn ProcessControl>, SpawnError>;
}

/// Runs real OS processes, one worker thread per execution.
#[derive(Debug, Default, Clone, Copy)]
pub struct RuntimeLauncher;

impl ProcessLauncher for RuntimeLauncher {
    fn launch(
        &self,
        id: ExecutionId,
        request: &ExecRequest,
        events: Sender<WorkerEvent>,
    ) -> Result<Box<dyn ProcessControl>, SpawnError> {
        let (spawned_tx, spawned_rx) = mpsc::channel();
        let exited = Arc::new(AtomicBool::new(false));
        let worker_exited = Arc::clone(&exited);
        let worker_request = request.clone();

        thread::Builder::new()
            .name(format!("lazytf-worker-{}", id.0))
            .spawn(move || run_worker(id, worker_request, events, spawned_tx, worker_exited))
            .map_err(|source| SpawnError::Io {
                program: request.program.clone(),
                source,
            })?;

        let pid = spawned_rx.recv().map_err(|_| SpawnError::WorkerLost {
            program: request.program.clone(),
        })??;
        debug!(execution = %id, pid, "process spawned");
        Ok(Box::new(ChildControl { pid, exited }))
    }
}

fn run_worker(
    id: ExecutionId,
    request: ExecRequest,
    events: Sender<WorkerEvent>,
    spawned: Sender<Result<u32, SpawnError>>,
    exited: Arc<AtomicBool>,
) {
    let mut command = Command::new(&request.program);
    command
        .args(&request.args)
        .current_dir(&request.cwd)
        .envs(request.env.iter().map(|(key, value)| (key, value)))
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // Own process group, so signals reach everything the command starts.
        command.process_group(0);
    }

    let mut child = match command.spawn() {
        Ok(child) => child,
        Err(source) => {
            let _ = spawned.send(Err(SpawnError::Io {
                program: request.program,
                source,
            }));
            return;
        }
    };
    let _ = spawned.send(Ok(child.id()));

    let (line_tx, line_rx) = mpsc::channel::<String>();
    if let Some(stdout) = child.stdout.take() {
        spawn_reader(stdout, line_tx.clone());
    }
    if let Some(stderr) = child.stderr.take() {
        spawn_reader(stderr, line_tx.clone());
    }
    drop(line_tx);

    let mut classifier = OutputClassifier::new();
    let mut status = None;
    let mut drain_until = None;
    loop {
        match line_rx.recv_timeout(POLL_EXIT) {
            Ok(line) => {
                let event = WorkerEvent {
                    execution: id,
                    kind: WorkerEventKind::Line(classifier.classify_line(line)),
                };
                // Keep draining even if nobody listens so the child never blocks on a full pipe.
                let _ = events.send(event);
            }
            Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }

        if status.is_none() {
            match child.try_wait() {
                Ok(Some(exit)) => {
                    status = Some(Ok(exit));
                    drain_until = Some(Instant::now() + DRAIN_AFTER_EXIT);
                }
                Ok(None) => {}
                Err(err) => {
                    status = Some(Err(err));
                    drain_until = Some(Instant::now());
                }
            }
        }
        if drain_until.is_some_and(|deadline| Instant::now() >= deadline) {
            debug!(execution = %id, "output still open after exit; detaching readers");
            break;
        }
    }
    drop(line_rx);

    let status = match status {
        Some(status) => status,
        None => child.wait(),
    };
    exited.store(true, Ordering::SeqCst);
    let kind = match status {
        Ok(status) => WorkerEventKind::Exited {
            code: status.code(),
        },
        Err(err) => {
            warn!(execution = %id, error = %err, "waiting for process failed");
            WorkerEventKind::WaitFailed {
                message: err.to_string(),
            }
        }
    };
    let _ = events.send(WorkerEvent {
        execution: id,
        kind,
    });
}

fn spawn_reader<R>(mut stream: R, lines: Sender<String>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut assembler = LineAssembler::new();
        let mut buf = [0_u8; READ_CHUNK];
        loop {
            match stream.read(&mut buf) {
                Ok(0) => break,
                Ok(n) => {
                    for line in assembler.push(&buf[..n]) {
                        if lines.send(line).is_err() {
                            return;
                        }
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            }
        }
        if let Some(tail) = assembler.finish() {
            let _ = lines.send(tail);
        }
    });
}

struct ChildControl {
    pid: u32,
    exited: Arc<AtomicBool>,
}

impl ChildControl {
    fn still_running(&self) -> bool {
        !self.exited.load(Ordering::SeqCst)
    }
}

impl ProcessControl for ChildControl {
    fn interrupt(&mut self) -> io::Result<()> {
        if !self.still_running() {
            return Ok(());
        }
        platform::interrupt(self.pid)
    }

    fn kill(&mut self) -> io::Result<()> {
        if !self.still_running() {
            return Ok(());
        }
        platform::kill(self.pid)
    }
}

#[cfg(unix)]
mod platform {
    use std::io;

    pub(super) fn interrupt(pid: u32) -> io::Result<()> {
        send(pid, libc::SIGINT)
    }

    pub(super) fn kill(pid: u32) -> io::Result<()> {
        send(pid, libc::SIGKILL)
    }

    /// Signals the whole process group led by `pid`.
    fn send(pid: u32, signal: libc::c_int) -> io::Result<()> {
        let pgid = libc::pid_t::try_from(pid)
            .map_err(|_| io::Error::new(io::ErrorKind::InvalidInput, "pid out of range"))?;
        // SAFETY: kill(2) has no memory-safety preconditions.
        if unsafe { libc::kill(-pgid, signal) } == 0 {
            return Ok(());
        }
        let err = io::Error::last_os_error();
        if err.raw_os_error() == Some(libc::ESRCH) {
            return Ok(());
        }
        Err(err)
    }
}

#[cfg(not(unix))]
mod platform {
    use std::io;
    use std::process::Command;
    use std::process::Stdio;

    pub(super) fn interrupt(pid: u32) -> io::Result<()> {
        taskkill(pid, false)
    }

    pub(super) fn kill(pid: u32) -> io::Result<()> {
        taskkill(pid, true)
    }

    fn taskkill(pid: u32, force: bool) -> io::Result<()> {
        let pid = pid.to_string();
        let mut command = Command::new("taskkill");
        command.args(["/PID", pid.as_str(), "/T"]);
        if force {
            command.arg("/F");
        }
        let status = command
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(io::Error::other(format!("taskkill exited with {status}")))
        }
    }
}
