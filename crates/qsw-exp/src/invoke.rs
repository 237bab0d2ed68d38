//! Process invocation for the external quantisation program.

use std::ffi::OsString;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender};
use std::thread;
use std::time::{Duration, Instant};

use qsw_core::{FailureKind, InvocationFailure};

use crate::protocol::{InvocationArguments, SENTINEL};

/// Default wall-clock budget for one invocation.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

const STDERR_CAP: usize = 4096;
const MAX_POLL: Duration = Duration::from_millis(50);

/// Runs one protocol invocation and returns its captured standard output.
pub trait Invoker: Send + Sync {
    /// Invokes the program for `args`. Blocks until the program exits or fails.
    fn invoke(&self, args: &InvocationArguments) -> Result<String, InvocationFailure>;
}

impl<F> Invoker for F
where
    F: Fn(&InvocationArguments) -> Result<String, InvocationFailure> + Send + Sync,
{
    fn invoke(&self, args: &InvocationArguments) -> Result<String, InvocationFailure> {
        self(args)
    }
}

/// [`Invoker`] that spawns the real executable.
#[derive(Debug, Clone)]
pub struct ProcessInvoker {
    program: PathBuf,
    timeout: Option<Duration>,
    require_success: bool,
}

impl ProcessInvoker {
    /// Invoker for `program` with the default timeout and no exit status check.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            timeout: Some(DEFAULT_TIMEOUT),
            require_success: false,
        }
    }

    /// Sets the per-invocation timeout; `None` waits forever.
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Treats a non-zero exit status as a failure when `enabled`.
    pub fn require_success(mut self, enabled: bool) -> Self {
        self.require_success = enabled;
        self
    }

    /// Runs the program with `args` followed by the sentinel and returns stdout.
    ///
    /// The timeout covers the whole invocation: a program that exits while a
    /// background child still holds its output pipes open times out as well.
    pub fn capture<I>(&self, args: I) -> Result<String, InvocationFailure>
    where
        I: IntoIterator<Item = OsString>,
    {
        let mut child = Command::new(&self.program)
            .args(args)
            .arg(SENTINEL)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| {
                InvocationFailure::new(
                    FailureKind::Spawn,
                    format!("{}: {err}", self.program.display()),
                )
            })?;
        let deadline = self
            .timeout
            .and_then(|timeout| Instant::now().checked_add(timeout));

        // Readers are never joined: a grandchild may hold the pipes past the deadline.
        let (tx, rx) = mpsc::channel();
        spawn_reader(child.stdout.take(), Stream::Stdout, tx.clone());
        spawn_reader(child.stderr.take(), Stream::Stderr, tx);

        let status = match deadline {
            Some(deadline) => child.wait_timeout(deadline.saturating_duration_since(Instant::now())),
            None => child.wait().map(Some),
        };
        let status = match status {
            Ok(Some(status)) => status,
            Ok(None) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(self.timed_out("killed"));
            }
            Err(err) => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(InvocationFailure::new(
                    FailureKind::Io,
                    format!("waiting for child: {err}"),
                ));
            }
        };

        let Some((stdout, mut stderr)) = collect_output(&rx, deadline)? else {
            tracing::warn!(program = %self.program.display(), "output still open after exit");
            return Err(self.timed_out("output still open"));
        };
        stderr.truncate(STDERR_CAP);
        let stderr = String::from_utf8_lossy(&stderr);
        if !stderr.trim().is_empty() {
            tracing::debug!(program = %self.program.display(), stderr = %stderr.trim_end(), "program stderr");
        }

        if !status.success() {
            if self.require_success {
                return Err(InvocationFailure::new(
                    FailureKind::ExitStatus,
                    describe_status(status, &stderr),
                ));
            }
            tracing::debug!(program = %self.program.display(), %status, "program exited unsuccessfully");
        }

        Ok(String::from_utf8_lossy(&stdout).into_owned())
    }

    fn timed_out(&self, what: &str) -> InvocationFailure {
        InvocationFailure::new(
            FailureKind::Timeout,
            format!(
                "{what} after {}s",
                self.timeout.unwrap_or_default().as_secs_f64()
            ),
        )
    }
}

impl Invoker for ProcessInvoker {
    fn invoke(&self, args: &InvocationArguments) -> Result<String, InvocationFailure> {
        self.capture(args.to_args())
    }
}

fn describe_status(status: ExitStatus, stderr: &str) -> String {
    let mut message = match status.code() {
        Some(code) => format!("exited with status {code}"),
        None => "terminated by signal".to_string(),
    };
    if let Some(line) = stderr.lines().rev().find(|line| !line.trim().is_empty()) {
        message.push_str(": ");
        message.push_str(line.trim());
    }
    message
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stream {
    Stdout,
    Stderr,
}

impl Stream {
    fn name(self) -> &'static str {
        match self {
            Stream::Stdout => "stdout",
            Stream::Stderr => "stderr",
        }
    }
}

type Chunk = (Stream, io::Result<Vec<u8>>);

fn spawn_reader<R>(stream: Option<R>, kind: Stream, tx: Sender<Chunk>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = Vec::new();
        let result = match stream {
            Some(mut stream) => stream.read_to_end(&mut buf).map(|_| buf),
            None => Ok(buf),
        };
        // The receiver is gone once the invocation has timed out.
        let _ = tx.send((kind, result));
    });
}

/// Waits for both streams to reach EOF. `Ok(None)` means the deadline passed first.
fn collect_output(
    rx: &Receiver<Chunk>,
    deadline: Option<Instant>,
) -> Result<Option<(Vec<u8>, Vec<u8>)>, InvocationFailure> {
    let mut stdout = None;
    let mut stderr = None;
    while stdout.is_none() || stderr.is_none() {
        let received = match deadline {
            Some(deadline) => rx.recv_timeout(deadline.saturating_duration_since(Instant::now())),
            None => rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
        };
        let (kind, result) = match received {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => return Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                return Err(InvocationFailure::new(
                    FailureKind::Io,
                    "output reader exited without a result",
                ))
            }
        };
        let bytes = result.map_err(|err| {
            InvocationFailure::new(FailureKind::Io, format!("reading {}: {err}", kind.name()))
        })?;
        match kind {
            Stream::Stdout => stdout = Some(bytes),
            Stream::Stderr => stderr = Some(bytes),
        }
    }
    Ok(stdout.zip(stderr))
}

/// Adds a bounded wait to [`Child`].
trait ChildExt {
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>>;
}

impl ChildExt for Child {
    fn wait_timeout(&mut self, timeout: Duration) -> io::Result<Option<ExitStatus>> {
        let start = Instant::now();
        let mut poll = Duration::from_millis(1);
        loop {
            if let Some(status) = self.try_wait()? {
                return Ok(Some(status));
            }
            let elapsed = start.elapsed();
            if elapsed >= timeout {
                return Ok(None);
            }
            thread::sleep(poll.min(timeout - elapsed));
            poll = (poll * 2).min(MAX_POLL);
        }
    }
}
