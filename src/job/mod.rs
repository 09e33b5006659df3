pub mod framer;
pub mod router;
pub mod transport;

use futures::StreamExt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

pub use framer::{strip_ansi, LineFramer};
pub use router::{parse_token_usage, RoutedLine, StreamRouter, Usage};
pub use transport::{
    MockTransport, PipeTransport, PtyTransport, SpawnRequest, SpawnedProcess, Transport,
    TransportKind,
};

/// Exit code reported for a job stopped through [`JobRunner::cancel`].
pub const CANCELLED_EXIT_CODE: i32 = 130;

const KILL_REAP_TIMEOUT: Duration = Duration::from_secs(2);

/// Environment that keeps the external tool from batching its output.
const UNBUFFERED_ENV: &[(&str, &str)] = &[("PYTHONUNBUFFERED", "1"), ("PYTHONIOENCODING", "utf-8")];

#[derive(Debug, Error)]
pub enum JobError {
    #[error("a job is already running")]
    Busy,
    #[error("cannot start a job with an empty command line")]
    EmptyCommand,
    #[error("failed to spawn `{program}`: {message}")]
    Spawn { program: String, message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JobExit {
    pub code: i32,
    pub cancelled: bool,
}

impl JobExit {
    pub fn success(&self) -> bool {
        self.code == 0 && !self.cancelled
    }
}

/// Everything a running job reports, in the order it was framed.
#[derive(Debug, Clone, PartialEq)]
pub enum JobEvent {
    Line(String),
    Usage(Usage),
    Exit(JobExit),
}

struct ActiveJob {
    cancel: CancellationToken,
    _driver: JoinHandle<()>,
}

/// Runs at most one external process at a time.
///
/// Callers check [`JobRunner::is_busy`] before [`JobRunner::start`]; a start
/// while busy is rejected with [`JobError::Busy`] and nothing is spawned.
pub struct JobRunner {
    transport: Arc<dyn Transport>,
    cwd: Option<PathBuf>,
    busy: Arc<AtomicBool>,
    active: Option<ActiveJob>,
}

impl JobRunner {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            cwd: None,
            busy: Arc::new(AtomicBool::new(false)),
            active: None,
        }
    }

    pub fn with_cwd(mut self, cwd: PathBuf) -> Self {
        self.cwd = Some(cwd);
        self
    }

    pub fn is_busy(&self) -> bool {
        self.busy.load(Ordering::SeqCst)
    }

    /// Spawns `argv` and streams its events into `events`. Must be called
    /// from within a tokio runtime.
    pub fn start(
        &mut self,
        argv: Vec<String>,
        events: mpsc::UnboundedSender<JobEvent>,
    ) -> Result<(), JobError> {
        if self.is_busy() {
            return Err(JobError::Busy);
        }
        if argv.is_empty() {
            return Err(JobError::EmptyCommand);
        }

        let request = SpawnRequest {
            argv,
            env: UNBUFFERED_ENV
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            cwd: self.cwd.clone(),
        };
        let process = self.transport.spawn(&request)?;
        tracing::info!(program = %request.argv[0], args = request.argv.len() - 1, "job started");

        self.busy.store(true, Ordering::SeqCst);
        let cancel = CancellationToken::new();
        let driver = tokio::spawn(drive(
            process,
            cancel.clone(),
            Arc::clone(&self.busy),
            events,
        ));
        self.active = Some(ActiveJob {
            cancel,
            _driver: driver,
        });
        Ok(())
    }

    /// Stops the running job. Returns `false` (and emits nothing) when idle.
    pub fn cancel(&mut self) -> bool {
        if !self.is_busy() {
            return false;
        }
        match self.active.as_ref() {
            Some(job) if !job.cancel.is_cancelled() => {
                job.cancel.cancel();
                tracing::info!("job cancellation requested");
                true
            }
            _ => false,
        }
    }
}

fn deliver(events: &mpsc::UnboundedSender<JobEvent>, routed: RoutedLine) {
    let event = match routed {
        RoutedLine::Display(line) => JobEvent::Line(line),
        RoutedLine::Usage(usage) => JobEvent::Usage(usage),
        RoutedLine::Suppressed => return,
    };
    let _ = events.send(event);
}

async fn kill_and_reap(process: SpawnedProcess) {
    let SpawnedProcess {
        mut killer, exit, ..
    } = process;
    if let Err(err) = killer.kill() {
        tracing::warn!(error = %err, "failed to kill job process");
    }
    if tokio::time::timeout(KILL_REAP_TIMEOUT, exit).await.is_err() {
        tracing::warn!("job process did not exit after kill");
    }
}

async fn drive(
    mut process: SpawnedProcess,
    cancel: CancellationToken,
    busy: Arc<AtomicBool>,
    events: mpsc::UnboundedSender<JobEvent>,
) {
    let mut framer = LineFramer::new();
    let mut router = StreamRouter::new();
    let mut cancelled = false;

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                break;
            }
            chunk = process.output.next() => match chunk {
                Some(Ok(bytes)) => {
                    for line in framer.push(&bytes) {
                        deliver(&events, router.route(&line));
                    }
                }
                Some(Err(err)) => {
                    tracing::debug!(error = %err, "job output stream failed");
                    break;
                }
                None => break,
            },
        }
    }

    let code = if cancelled {
        framer.clear();
        kill_and_reap(process).await;
        CANCELLED_EXIT_CODE
    } else {
        if let Some(rest) = framer.finish() {
            deliver(&events, router.route(&rest));
        }
        tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                cancelled = true;
                kill_and_reap(process).await;
                CANCELLED_EXIT_CODE
            }
            status = &mut process.exit => status.unwrap_or_else(|err| {
                tracing::warn!(error = %err, "failed to collect job exit status");
                -1
            }),
        }
    };

    tracing::info!(code, cancelled, "job finished");
    busy.store(false, Ordering::SeqCst);
    let _ = events.send(JobEvent::Exit(JobExit { code, cancelled }));
}
