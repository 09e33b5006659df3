use bytes::Bytes;
use futures::future::BoxFuture;
use futures::{FutureExt, Stream};
use portable_pty::{native_pty_system, ChildKiller, CommandBuilder, PtySize};
use serde::{Deserialize, Serialize};
use std::io::{self, Read};
use std::path::PathBuf;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{mpsc, oneshot};

use super::JobError;

pub type ByteStream = Pin<Box<dyn Stream<Item = io::Result<Bytes>> + Send>>;

const PTY_ROWS: u16 = 48;
const PTY_COLS: u16 = 512;
const READ_BUFFER_BYTES: usize = 4096;

/// What to launch: argument vector, extra environment and working directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpawnRequest {
    pub argv: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: Option<PathBuf>,
}

pub trait ProcessKiller: Send {
    fn kill(&mut self) -> io::Result<()>;
}

/// A launched process: its merged output bytes, its exit code, and a way to
/// stop it.
pub struct SpawnedProcess {
    pub output: ByteStream,
    pub exit: BoxFuture<'static, io::Result<i32>>,
    pub killer: Box<dyn ProcessKiller>,
}

pub trait Transport: Send + Sync {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, JobError>;
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportKind {
    #[default]
    Pty,
    Pipe,
}

impl TransportKind {
    pub fn build(self) -> Arc<dyn Transport> {
        match self {
            TransportKind::Pty => Arc::new(PtyTransport),
            TransportKind::Pipe => Arc::new(PipeTransport),
        }
    }
}

fn receiver_stream(mut rx: mpsc::UnboundedReceiver<io::Result<Bytes>>) -> ByteStream {
    Box::pin(futures::stream::poll_fn(move |cx| rx.poll_recv(cx)))
}

fn spawn_error(request: &SpawnRequest, message: impl ToString) -> JobError {
    JobError::Spawn {
        program: request.argv.first().cloned().unwrap_or_default(),
        message: message.to_string(),
    }
}

/// Runs the command attached to a pseudo-terminal so the tool behaves as if
/// interactive. Stdout and stderr arrive interleaved on one stream.
#[derive(Debug, Default)]
pub struct PtyTransport;

struct PtyKiller(Box<dyn ChildKiller + Send + Sync>);

impl ProcessKiller for PtyKiller {
    fn kill(&mut self) -> io::Result<()> {
        self.0.kill()
    }
}

impl Transport for PtyTransport {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, JobError> {
        let Some((program, args)) = request.argv.split_first() else {
            return Err(JobError::EmptyCommand);
        };

        let pair = native_pty_system()
            .openpty(PtySize {
                rows: PTY_ROWS,
                cols: PTY_COLS,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| spawn_error(request, e))?;

        let mut command = CommandBuilder::new(program);
        command.args(args);
        for (key, value) in &request.env {
            command.env(key, value);
        }
        if let Some(cwd) = &request.cwd {
            command.cwd(cwd);
        }

        let mut child = pair
            .slave
            .spawn_command(command)
            .map_err(|e| spawn_error(request, e))?;
        // The master only reports EOF once every slave handle is closed.
        drop(pair.slave);

        let mut reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| spawn_error(request, e))?;
        let killer = PtyKiller(child.clone_killer());
        let master = pair.master;

        let (tx, rx) = mpsc::unbounded_channel();
        std::thread::spawn(move || {
            let _master = master;
            let mut buf = [0u8; READ_BUFFER_BYTES];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                            break;
                        }
                    }
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    // Linux reports EIO on the master once the child hangs up.
                    Err(e) => {
                        tracing::trace!(error = %e, "pty reader stopped");
                        break;
                    }
                }
            }
        });

        let exit = tokio::task::spawn_blocking(move || child.wait())
            .map(|joined| match joined {
                Ok(Ok(status)) => Ok(status.exit_code() as i32),
                Ok(Err(e)) => Err(e),
                Err(e) => Err(io::Error::other(e)),
            })
            .boxed();

        Ok(SpawnedProcess {
            output: receiver_stream(rx),
            exit,
            killer: Box::new(killer),
        })
    }
}

/// Runs the command with piped stdout/stderr, merged in arrival order.
#[derive(Debug, Default)]
pub struct PipeTransport;

struct PipeKiller(Option<oneshot::Sender<()>>);

impl ProcessKiller for PipeKiller {
    fn kill(&mut self) -> io::Result<()> {
        if let Some(tx) = self.0.take() {
            let _ = tx.send(());
        }
        Ok(())
    }
}

async fn pump<R: AsyncRead + Unpin>(mut reader: R, tx: mpsc::UnboundedSender<io::Result<Bytes>>) {
    let mut buf = vec![0u8; READ_BUFFER_BYTES];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) => break,
            Ok(n) => {
                if tx.send(Ok(Bytes::copy_from_slice(&buf[..n]))).is_err() {
                    break;
                }
            }
            Err(e) => {
                let _ = tx.send(Err(e));
                break;
            }
        }
    }
}

impl Transport for PipeTransport {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, JobError> {
        let Some((program, args)) = request.argv.split_first() else {
            return Err(JobError::EmptyCommand);
        };

        let mut command = tokio::process::Command::new(program);
        command
            .args(args)
            .envs(request.env.iter().map(|(k, v)| (k.as_str(), v.as_str())))
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = &request.cwd {
            command.current_dir(cwd);
        }

        let mut child = command.spawn().map_err(|e| spawn_error(request, e))?;
        let (tx, rx) = mpsc::unbounded_channel();
        if let Some(stdout) = child.stdout.take() {
            tokio::spawn(pump(stdout, tx.clone()));
        }
        if let Some(stderr) = child.stderr.take() {
            tokio::spawn(pump(stderr, tx));
        }

        let (kill_tx, kill_rx) = oneshot::channel::<()>();
        let exit = async move {
            let status = tokio::select! {
                status = child.wait() => status?,
                Ok(()) = kill_rx => {
                    child.kill().await?;
                    child.wait().await?
                }
            };
            Ok::<i32, io::Error>(status.code().unwrap_or(-1))
        }
        .boxed();

        Ok(SpawnedProcess {
            output: receiver_stream(rx),
            exit,
            killer: Box::new(PipeKiller(Some(kill_tx))),
        })
    }
}

/// Scripted transport for tests: replays fixed chunks and an exit code, and
/// records every spawn request.
#[derive(Clone, Default)]
pub struct MockTransport {
    chunks: Vec<Vec<u8>>,
    exit_code: i32,
    hold_open: bool,
    spawned: Arc<Mutex<Vec<SpawnRequest>>>,
}

impl MockTransport {
    pub fn new(chunks: Vec<Vec<u8>>, exit_code: i32) -> Self {
        Self {
            chunks,
            exit_code,
            ..Self::default()
        }
    }

    /// After the scripted chunks, keep the process "running" until killed.
    pub fn held_open(mut self) -> Self {
        self.hold_open = true;
        self
    }

    pub fn spawned(&self) -> Vec<SpawnRequest> {
        self.spawned
            .lock()
            .map(|guard| guard.clone())
            .unwrap_or_default()
    }
}

struct MockKiller {
    output_tx: Option<mpsc::UnboundedSender<io::Result<Bytes>>>,
    exit_tx: Option<oneshot::Sender<()>>,
}

impl ProcessKiller for MockKiller {
    fn kill(&mut self) -> io::Result<()> {
        self.output_tx.take();
        self.exit_tx.take();
        Ok(())
    }
}

impl Transport for MockTransport {
    fn spawn(&self, request: &SpawnRequest) -> Result<SpawnedProcess, JobError> {
        if request.argv.is_empty() {
            return Err(JobError::EmptyCommand);
        }
        if let Ok(mut spawned) = self.spawned.lock() {
            spawned.push(request.clone());
        }

        let (tx, rx) = mpsc::unbounded_channel();
        for chunk in &self.chunks {
            let _ = tx.send(Ok(Bytes::from(chunk.clone())));
        }

        let (exit_tx, exit_rx) = oneshot::channel::<()>();
        let (exit, killer) = if self.hold_open {
            let exit_code = self.exit_code;
            let exit = async move {
                let _ = exit_rx.await;
                Ok(exit_code)
            }
            .boxed();
            let killer = MockKiller {
                output_tx: Some(tx),
                exit_tx: Some(exit_tx),
            };
            (exit, killer)
        } else {
            drop(tx);
            let killer = MockKiller {
                output_tx: None,
                exit_tx: None,
            };
            (futures::future::ready(Ok(self.exit_code)).boxed(), killer)
        };

        Ok(SpawnedProcess {
            output: receiver_stream(rx),
            exit,
            killer: Box::new(killer),
        })
    }
}
