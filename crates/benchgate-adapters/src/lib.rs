//! Std adapters for benchgate.
//!
//! In clean-arch terms: this is where we touch the world.

use anyhow::Context;
use benchgate_error::ConfigError;
use benchgate_types::HostInfo;
use std::io::{self, Read};
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const WATCHDOG_POLL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone)]
pub struct CommandSpec {
    pub argv: Vec<String>,
    /// Kill the process, and everything it started, once this much wall time has passed.
    pub timeout: Option<Duration>,
    pub output_cap_bytes: usize,
}

impl CommandSpec {
    /// A program invoked with no arguments, as every measured executable is.
    pub fn bare(program: impl Into<String>) -> Self {
        Self {
            argv: vec![program.into()],
            timeout: None,
            output_cap_bytes: 64 * 1024,
        }
    }
}

#[derive(Debug, Clone)]
pub struct RunResult {
    /// `None` when the process was terminated by a signal.
    pub exit_code: Option<i32>,
    pub timed_out: bool,
    /// Empty when the run timed out.
    pub stdout: Vec<u8>,
}

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("command argv must not be empty")]
    EmptyArgv,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Runs one process to completion. Implementations block until the process exits.
pub trait ProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError>;
}

impl<P: ProcessRunner + ?Sized> ProcessRunner for &P {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        (**self).run(spec)
    }
}

/// Spawns with piped stdout. stderr is discarded.
///
/// On Unix the child leads its own process group, so a timeout also kills
/// whatever a wrapper script forked.
#[derive(Debug, Default, Clone)]
pub struct StdProcessRunner;

impl ProcessRunner for StdProcessRunner {
    fn run(&self, spec: &CommandSpec) -> Result<RunResult, AdapterError> {
        let (program, args) = spec.argv.split_first().ok_or(AdapterError::EmptyArgv)?;

        let start = Instant::now();
        let mut cmd = Command::new(program);
        cmd.args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null());

        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            cmd.process_group(0);
        }

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to spawn {:?}", spec.argv))?;

        let cap = spec.output_cap_bytes;
        let stdout = child.stdout.take();
        // Drain the pipe while waiting so a chatty child cannot fill it and stall.
        let out_handle = thread::spawn(move || stdout.map(|mut r| read_with_cap(&mut r, cap)));

        let (status, timed_out) = wait_with_deadline(&mut child, spec.timeout)
            .with_context(|| format!("failed to wait for {:?}", spec.argv))?;

        // After a timeout the pipe may still be held open by a process that
        // escaped the group; leave the reader to finish on its own.
        let stdout = if timed_out {
            Vec::new()
        } else {
            out_handle.join().ok().flatten().unwrap_or_default()
        };

        debug!(
            argv = ?spec.argv,
            wall_ms = start.elapsed().as_millis() as u64,
            exit_code = ?status.code(),
            timed_out,
            "process exited"
        );

        Ok(RunResult {
            exit_code: status.code(),
            timed_out,
            stdout,
        })
    }
}

fn wait_with_deadline(
    child: &mut Child,
    timeout: Option<Duration>,
) -> io::Result<(ExitStatus, bool)> {
    let Some(limit) = timeout else {
        return Ok((child.wait()?, false));
    };

    let deadline = Instant::now() + limit;
    loop {
        if let Some(status) = child.try_wait()? {
            return Ok((status, false));
        }
        if Instant::now() >= deadline {
            // The child may exit on its own between try_wait and kill; reap it either way.
            if let Err(err) = kill_tree(child) {
                warn!(%err, "kill after timeout failed");
            }
            return Ok((child.wait()?, true));
        }
        thread::sleep(WATCHDOG_POLL);
    }
}

/// SIGKILL the child's whole process group. The child is not yet reaped, so
/// its pid still names the group.
#[cfg(unix)]
#[allow(unsafe_code)]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    let pgid = libc::pid_t::try_from(child.id())
        .map_err(|_| io::Error::other("pid does not fit in pid_t"))?;
    // SAFETY: kill(2) takes plain integers and touches no memory of ours.
    let rc = unsafe { libc::kill(-pgid, libc::SIGKILL) };
    if rc == 0 {
        Ok(())
    } else {
        Err(io::Error::last_os_error())
    }
}

#[cfg(not(unix))]
fn kill_tree(child: &mut Child) -> io::Result<()> {
    child.kill()
}

fn read_with_cap<R: Read>(reader: &mut R, cap: usize) -> Vec<u8> {
    let mut buf: Vec<u8> = Vec::new();
    let mut tmp = [0u8; 8192];

    loop {
        match reader.read(&mut tmp) {
            Ok(0) => break,
            Ok(n) => {
                let take = cap.saturating_sub(buf.len()).min(n);
                buf.extend_from_slice(&tmp[..take]);
            }
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(_) => break,
        }
    }

    buf
}

/// Resolve a candidate identifier to an executable, before anything is spawned.
///
/// Bare names are looked up on `PATH`; anything with a separator is checked in place.
pub fn resolve_executable(program: &str) -> Result<PathBuf, ConfigError> {
    which::which(program).map_err(|e| ConfigError::ExecutableNotFound {
        path: program.to_string(),
        reason: e.to_string(),
    })
}

pub trait Clock {
    fn now_rfc3339(&self) -> String;
}

#[derive(Debug, Default, Clone)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_rfc3339(&self) -> String {
        use time::format_description::well_known::Rfc3339;
        time::OffsetDateTime::now_utc()
            .format(&Rfc3339)
            .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
    }
}

pub trait HostProbe {
    fn probe(&self) -> HostInfo;
}

#[derive(Debug, Default, Clone)]
pub struct StdHostProbe {
    /// Hostnames can identify machines in shared artifacts; opt in.
    pub include_hostname: bool,
}

impl HostProbe for StdHostProbe {
    fn probe(&self) -> HostInfo {
        let hostname = if self.include_hostname {
            hostname::get().ok().and_then(|h| h.into_string().ok())
        } else {
            None
        };
        HostInfo {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            cpu_count: u32::try_from(num_cpus::get()).ok(),
            hostname,
        }
    }
}
