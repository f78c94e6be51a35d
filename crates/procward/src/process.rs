//! A single supervised unit and its restart loop.
//!
//! A [`Process`] owns one program invocation (name, args, output sinks) and
//! drives a sequence of OS instances: every instance that exits on its own
//! with an exit code is relaunched while the restart flag is set. An instance
//! killed by a signal is never relaunched.
//!
//! All mutable state sits behind one mutex. The background watcher takes it
//! only to record transitions and to swap the instance record; it never holds
//! it while waiting on the child.
//!
//! Crash details and the final exit status are only observable through
//! [`Process::wait`]. A caller that never waits never sees them.

use std::fmt;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::os::unix::process::ExitStatusExt;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use tokio::process::{Child, Command};
use tokio::sync::{watch, Mutex};

use crate::error::{Error, ExitError, Result};

pub type ExitOutcome = std::result::Result<(), ExitError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
	Created,
	Running,
	Exited,
}

impl fmt::Display for Status {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Status::Created => "created",
			Status::Running => "running",
			Status::Exited => "exited",
		})
	}
}

/// Consistent view of a process taken under a single lock acquisition.
#[derive(Debug, Clone)]
pub struct ProcessInfo {
	pub pid: Option<u32>,
	pub name: String,
	pub args: Vec<String>,
	pub status: Status,
	pub started_at: Option<SystemTime>,
	pub restart_on_exit: bool,
}

pub struct Process {
	inner: Arc<Inner>,
}

struct Inner {
	name: String,
	args: Vec<String>,
	restart_delay: Duration,
	state: Mutex<State>,
	outcome: watch::Sender<Option<ExitOutcome>>,
}

struct State {
	status: Status,
	restart_on_exit: bool,
	instance: Option<Instance>,
	started_at: Option<SystemTime>,
	sinks: Option<Sinks>,
}

/// The live OS instance. Replaced wholesale on every relaunch.
struct Instance {
	pid: u32,
	kill: watch::Sender<bool>,
}

struct Sinks {
	stdout: File,
	stderr: File,
}

impl Process {
	pub fn new(stdout: File, stderr: File, name: impl Into<String>, args: Vec<String>) -> Self {
		Self::with_restart_delay(stdout, stderr, name, args, Duration::ZERO)
	}

	pub fn with_restart_delay(
		stdout: File,
		stderr: File,
		name: impl Into<String>,
		args: Vec<String>,
		restart_delay: Duration,
	) -> Self {
		let (outcome, _) = watch::channel(None);
		Self {
			inner: Arc::new(Inner {
				name: name.into(),
				args,
				restart_delay,
				state: Mutex::new(State {
					status: Status::Created,
					restart_on_exit: true,
					instance: None,
					started_at: None,
					sinks: Some(Sinks { stdout, stderr }),
				}),
				outcome,
			}),
		}
	}

	pub fn name(&self) -> &str {
		&self.inner.name
	}

	pub fn args(&self) -> &[String] {
		&self.inner.args
	}

	/// Launches the first instance and the watcher. Only valid from `Created`;
	/// on failure the status is left untouched.
	pub async fn start(&self) -> Result<()> {
		let mut state = self.inner.state.lock().await;
		if state.status != Status::Created {
			return Err(Error::AlreadyInState(state.status));
		}
		let (child, kill) = self.inner.launch(&mut state)?;
		drop(state);

		tokio::spawn(supervise(Arc::clone(&self.inner), child, kill));
		Ok(())
	}

	/// Disables restarts and asks the watcher to kill the live instance.
	/// Returns once the request is issued, not when the instance is gone.
	pub async fn terminate(&self) -> Result<()> {
		let mut state = self.inner.state.lock().await;
		if state.status != Status::Running {
			return Err(Error::AlreadyInState(state.status));
		}
		state.restart_on_exit = false;

		if let Some(instance) = &state.instance {
			if instance.kill.send(true).is_err() {
				// watcher already past this instance; the cleared flag stops the relaunch
				tracing::debug!(pid = instance.pid, "{}: instance already exited", self.inner.name);
			}
			tracing::info!(pid = instance.pid, "{}: terminating", self.inner.name);
		}
		Ok(())
	}

	/// Resolves once the process reaches `Exited`. Later calls return the
	/// same outcome immediately.
	pub async fn wait(&self) -> ExitOutcome {
		let mut rx = self.inner.outcome.subscribe();
		let resolved = rx
			.wait_for(Option::is_some)
			.await
			.ok()
			.and_then(|outcome| outcome.clone());
		resolved.unwrap_or_else(|| Err(ExitError::Wait("outcome channel closed".to_string())))
	}

	pub async fn pid(&self) -> Option<u32> {
		let state = self.inner.state.lock().await;
		state.instance.as_ref().map(|i| i.pid)
	}

	pub async fn status(&self) -> Status {
		self.inner.state.lock().await.status
	}

	pub async fn started(&self) -> Option<SystemTime> {
		self.inner.state.lock().await.started_at
	}

	pub async fn restart_on_exit(&self) -> bool {
		self.inner.state.lock().await.restart_on_exit
	}

	pub async fn set_restart_on_exit(&self, restart: bool) {
		self.inner.state.lock().await.restart_on_exit = restart;
	}

	pub async fn info(&self) -> ProcessInfo {
		let state = self.inner.state.lock().await;
		ProcessInfo {
			pid: state.instance.as_ref().map(|i| i.pid),
			name: self.inner.name.clone(),
			args: self.inner.args.clone(),
			status: state.status,
			started_at: state.started_at,
			restart_on_exit: state.restart_on_exit,
		}
	}

	/// Everything written to stdout so far. The sink stays open and
	/// positioned at its end.
	pub async fn stdout(&self) -> Result<String> {
		let state = self.inner.state.lock().await;
		let sinks = state
			.sinks
			.as_ref()
			.ok_or_else(|| Error::OutputClosed(self.inner.name.clone()))?;
		read_all(&sinks.stdout)
	}

	pub async fn stderr(&self) -> Result<String> {
		let state = self.inner.state.lock().await;
		let sinks = state
			.sinks
			.as_ref()
			.ok_or_else(|| Error::OutputClosed(self.inner.name.clone()))?;
		read_all(&sinks.stderr)
	}

	/// Drops this process's handles on its sinks. Running instances keep
	/// their own descriptors; later relaunches fail and later reads return
	/// [`Error::OutputClosed`].
	pub(crate) async fn release_output(&self) {
		self.inner.state.lock().await.sinks = None;
	}
}

fn read_all(mut file: &File) -> Result<String> {
	let mut buf = Vec::new();
	file.seek(SeekFrom::Start(0))?;
	let read = file.read_to_end(&mut buf);
	file.seek(SeekFrom::End(0))?;
	read?;
	Ok(String::from_utf8_lossy(&buf).into_owned())
}

impl Inner {
	/// Spawns a new OS instance bound to the sinks and records it as
	/// current. Must be called with the state lock held.
	fn launch(&self, state: &mut State) -> Result<(Child, watch::Receiver<bool>)> {
		let sinks = state
			.sinks
			.as_ref()
			.ok_or_else(|| Error::OutputClosed(self.name.clone()))?;
		let stdout = sinks.stdout.try_clone()?;
		let stderr = sinks.stderr.try_clone()?;

		let child = Command::new(&self.name)
			.args(&self.args)
			.stdin(Stdio::null())
			.stdout(Stdio::from(stdout))
			.stderr(Stdio::from(stderr))
			.spawn()
			.map_err(|source| Error::Spawn {
				name: self.name.clone(),
				source,
			})?;

		let pid = child.id().unwrap_or(0);
		let (kill_tx, kill_rx) = watch::channel(false);
		state.instance = Some(Instance { pid, kill: kill_tx });
		state.status = Status::Running;
		state.started_at = Some(SystemTime::now());

		tracing::info!(pid, "{}: started", self.name);
		Ok((child, kill_rx))
	}

	fn resolve(&self, outcome: ExitOutcome) {
		self.outcome.send_if_modified(|slot| {
			if slot.is_some() {
				return false;
			}
			*slot = Some(outcome);
			true
		});
	}
}

/// Watches successive instances until the process reaches `Exited`.
async fn supervise(inner: Arc<Inner>, mut child: Child, mut kill: watch::Receiver<bool>) {
	loop {
		let exit = tokio::select! {
			status = child.wait() => status,
			_ = kill.changed() => {
				if let Err(e) = child.start_kill() {
					tracing::debug!("{}: kill failed: {}", inner.name, e);
				}
				child.wait().await
			}
		};

		let outcome = classify(exit);
		let restartable = matches!(outcome, Ok(()) | Err(ExitError::Code(_)));

		if restartable && !inner.restart_delay.is_zero() && inner.state.lock().await.restart_on_exit {
			tokio::time::sleep(inner.restart_delay).await;
		}

		let mut state = inner.state.lock().await;
		if !restartable || !state.restart_on_exit {
			state.status = Status::Exited;
			drop(state);
			match &outcome {
				Ok(()) => tracing::info!("{}: exited", inner.name),
				Err(e) => tracing::info!("{}: exited ({})", inner.name, e),
			}
			inner.resolve(outcome);
			return;
		}

		match &outcome {
			Ok(()) => tracing::info!("{}: exited cleanly, restarting", inner.name),
			Err(e) => tracing::warn!("{}: {}, restarting", inner.name, e),
		}

		match inner.launch(&mut state) {
			Ok((next, next_kill)) => {
				child = next;
				kill = next_kill;
			}
			Err(e) => {
				state.status = Status::Exited;
				drop(state);
				tracing::warn!("{}: restart failed: {}", inner.name, e);
				inner.resolve(Err(ExitError::Respawn(error_chain(&e))));
				return;
			}
		}
	}
}

fn classify(exit: std::io::Result<ExitStatus>) -> ExitOutcome {
	match exit {
		Ok(status) if status.success() => Ok(()),
		Ok(status) => match (status.code(), status.signal()) {
			(Some(code), _) => Err(ExitError::Code(code)),
			(None, Some(signal)) => Err(ExitError::Signal(signal)),
			(None, None) => Err(ExitError::Code(-1)),
		},
		Err(e) => Err(ExitError::Wait(e.to_string())),
	}
}

fn error_chain(err: &Error) -> String {
	let mut msg = err.to_string();
	let mut source = std::error::Error::source(err);
	while let Some(cause) = source {
		msg.push_str(": ");
		msg.push_str(&cause.to_string());
		source = cause.source();
	}
	msg
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn classify_exit_statuses() {
		assert_eq!(classify(Ok(ExitStatus::from_raw(0))), Ok(()));
		// wait(2) encoding: exit code in the high byte, signal in the low bits
		assert_eq!(classify(Ok(ExitStatus::from_raw(3 << 8))), Err(ExitError::Code(3)));
		assert_eq!(classify(Ok(ExitStatus::from_raw(9))), Err(ExitError::Signal(9)));
		assert!(matches!(
			classify(Err(std::io::Error::other("gone"))),
			Err(ExitError::Wait(_))
		));
	}

	#[test]
	fn status_display() {
		assert_eq!(Status::Created.to_string(), "created");
		assert_eq!(Status::Running.to_string(), "running");
		assert_eq!(Status::Exited.to_string(), "exited");
	}

	#[test]
	fn error_chain_includes_source() {
		let err = Error::Spawn {
			name: "nope".into(),
			source: std::io::Error::new(std::io::ErrorKind::NotFound, "missing"),
		};
		assert_eq!(error_chain(&err), "failed to launch nope: missing");
	}
}
