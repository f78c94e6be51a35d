use crate::process::Status;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures returned directly by synchronous operations.
#[derive(thiserror::Error, Debug)]
pub enum Error {
	#[error("invalid configuration: {0}")]
	Validation(String),

	#[error("process with pid {0} not found")]
	NotFound(u32),

	#[error("failed to launch {name}")]
	Spawn {
		name: String,
		#[source]
		source: std::io::Error,
	},

	#[error("process is already {0}")]
	AlreadyInState(Status),

	#[error("cannot open log file {}", .path.display())]
	LogFile {
		path: std::path::PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("output of {0} is closed")]
	OutputClosed(String),

	#[error("manager is shut down")]
	ManagerClosed,

	#[error("i/o error")]
	Io(#[from] std::io::Error),

	#[error("{}", join_errors(.0))]
	Aggregate(Vec<Error>),
}

impl Error {
	/// Collapses a list of best-effort failures: none is success, one is
	/// returned as is, more are wrapped.
	pub fn aggregate(mut errors: Vec<Error>) -> Result<()> {
		match errors.len() {
			0 => Ok(()),
			1 => Err(errors.remove(0)),
			_ => Err(Error::Aggregate(errors)),
		}
	}
}

fn join_errors(errors: &[Error]) -> String {
	let parts: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
	format!("{} errors: {}", errors.len(), parts.join("; "))
}

/// Terminal outcome of a supervised process, delivered only through `wait`.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum ExitError {
	#[error("exit status {0}")]
	Code(i32),

	#[error("terminated by signal {}", signal_name(.0))]
	Signal(i32),

	#[error("restart failed: {0}")]
	Respawn(String),

	#[error("wait failed: {0}")]
	Wait(String),
}

fn signal_name(signal: &i32) -> String {
	match nix::sys::signal::Signal::try_from(*signal) {
		Ok(sig) => sig.as_str().to_string(),
		Err(_) => signal.to_string(),
	}
}
