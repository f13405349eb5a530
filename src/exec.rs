use anyhow::{anyhow, Context, Result};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// An executable plus its invocation arguments, regardless of whether it
/// was located pre-built or produced by a build candidate.
#[derive(Debug, Clone)]
pub struct RunnableProgram {
    pub path: PathBuf,
    pub args: Vec<String>,
}

impl RunnableProgram {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            args: Vec::new(),
        }
    }

    pub fn with_args(path: impl Into<PathBuf>, args: &[&str]) -> Self {
        Self {
            path: path.into(),
            args: args.iter().map(|s| s.to_string()).collect(),
        }
    }
}

/// Captured output of one process run. Exit code zero is the sole success
/// signal; launch failures are folded in as exit code -1 so callers always
/// get this shape back instead of an error for that class of failure.
#[derive(Debug)]
pub struct ExecutionResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
}

impl ExecutionResult {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run `program` with `cwd` as its working directory, no shell involved.
/// Blocks until the process exits or the optional outer deadline fires.
pub fn run(cwd: &Path, program: &RunnableProgram, timeout: Option<Duration>) -> Result<ExecutionResult> {
    debug!(
        "exec {} {:?} cwd={} timeout={:?}",
        program.path.display(),
        program.args,
        cwd.display(),
        timeout
    );
    let started = Instant::now();

    let mut cmd = Command::new(&program.path);
    cmd.args(&program.args)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(e) => {
            return Ok(ExecutionResult {
                stdout: String::new(),
                stderr: format!("failed to launch {}: {e}", program.path.display()),
                exit_code: -1,
                duration: started.elapsed(),
            });
        }
    };

    let (status, stdout, stderr, timed_out) = capture(&mut child, timeout)?;

    let mut stderr = String::from_utf8_lossy(&stderr).into_owned();
    if timed_out {
        stderr.push_str("\nprocess exceeded the job deadline and was killed");
    }

    Ok(ExecutionResult {
        stdout: String::from_utf8_lossy(&stdout).into_owned(),
        stderr,
        exit_code: status.code().unwrap_or(-1),
        duration: started.elapsed(),
    })
}

/// Drain stdout/stderr on reader threads while waiting, so a chatty solver
/// can't deadlock on a full pipe buffer, and partial output survives a kill.
fn capture(
    child: &mut Child,
    timeout: Option<Duration>,
) -> Result<(ExitStatus, Vec<u8>, Vec<u8>, bool)> {
    let stdout_reader = child.stdout.take();
    let stderr_reader = child.stderr.take();

    let stdout_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut out) = stdout_reader {
            out.read_to_end(&mut buf).with_context(|| "read stdout")?;
        }
        Ok(buf)
    });

    let stderr_thread = std::thread::spawn(move || -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        if let Some(mut err) = stderr_reader {
            err.read_to_end(&mut buf).with_context(|| "read stderr")?;
        }
        Ok(buf)
    });

    let join = |t: std::thread::JoinHandle<Result<Vec<u8>>>, what: &str| -> Result<Vec<u8>> {
        t.join()
            .map_err(|_| anyhow!("{what} reader thread panicked"))?
    };

    let start = Instant::now();
    loop {
        if let Some(status) = child.try_wait().with_context(|| "try_wait")? {
            let stdout = join(stdout_thread, "stdout")?;
            let stderr = join(stderr_thread, "stderr")?;
            return Ok((status, stdout, stderr, false));
        }

        if let Some(limit) = timeout {
            if start.elapsed() > limit {
                warn!("process timed out after {:?}", limit);
                let _ = child.kill();
                let status = child.wait().with_context(|| "wait after kill")?;
                let stdout = join(stdout_thread, "stdout")?;
                let stderr = join(stderr_thread, "stderr")?;
                return Ok((status, stdout, stderr, true));
            }
        }

        std::thread::sleep(Duration::from_millis(50));
    }
}
