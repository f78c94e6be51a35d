use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use tokio::sync::{Mutex, RwLock};

use crate::config::ManagerConfig;
use crate::error::{Error, Result};
use crate::logs;
use crate::persist::{self, ListEntry};
use crate::process::{ExitOutcome, Process, ProcessInfo, Status};

/// A registered process together with the log file it writes to.
pub struct ManagerProcess {
	process: Process,
	log_path: PathBuf,
	log_file: Mutex<Option<File>>,
}

impl ManagerProcess {
	pub fn process(&self) -> &Process {
		&self.process
	}

	pub fn log_path(&self) -> &Path {
		&self.log_path
	}

	pub fn name(&self) -> &str {
		self.process.name()
	}

	pub fn args(&self) -> &[String] {
		self.process.args()
	}

	pub async fn pid(&self) -> Option<u32> {
		self.process.pid().await
	}

	pub async fn status(&self) -> Status {
		self.process.status().await
	}

	pub async fn started(&self) -> Option<SystemTime> {
		self.process.started().await
	}

	pub async fn info(&self) -> ProcessInfo {
		self.process.info().await
	}

	pub async fn stdout(&self) -> Result<String> {
		self.process.stdout().await
	}

	pub async fn stderr(&self) -> Result<String> {
		self.process.stderr().await
	}

	pub async fn wait(&self) -> ExitOutcome {
		self.process.wait().await
	}

	/// Flushes and closes the log file. Returns `false` if it was already closed.
	pub async fn close_log(&self) -> Result<bool> {
		let Some(file) = self.log_file.lock().await.take() else {
			return Ok(false);
		};
		self.process.release_output().await;
		tokio::task::spawn_blocking(move || file.sync_all())
			.await
			.map_err(std::io::Error::other)??;
		Ok(true)
	}

	/// Terminates the process (an already exited one counts as done) and
	/// closes the log either way.
	async fn terminate(&self) -> Result<()> {
		let terminated = match self.process.terminate().await {
			Ok(()) | Err(Error::AlreadyInState(Status::Exited)) => Ok(()),
			Err(e) => Err(e),
		};
		let closed = self.close_log().await;
		terminated?;
		closed?;
		Ok(())
	}
}

/// Registry of supervised processes.
///
/// Entries are looked up by the PID of their current OS instance, which
/// changes whenever the process restarts.
pub struct Manager {
	config: ManagerConfig,
	registry: RwLock<Registry>,
}

#[derive(Default)]
struct Registry {
	entries: BTreeMap<u64, Arc<ManagerProcess>>,
	next_slot: u64,
	closed: bool,
}

impl Registry {
	/// Slot of the entry whose current instance has `pid`. An exited entry
	/// keeps its last PID, so a running entry that got the same PID reused
	/// wins over it.
	async fn find(&self, pid: u32) -> Option<u64> {
		let mut candidates = Vec::with_capacity(self.entries.len());
		for (slot, entry) in &self.entries {
			let info = entry.info().await;
			candidates.push((*slot, info.pid, info.status));
		}
		pick_slot(candidates, pid)
	}
}

fn pick_slot(candidates: impl IntoIterator<Item = (u64, Option<u32>, Status)>, pid: u32) -> Option<u64> {
	let mut fallback = None;
	for (slot, entry_pid, status) in candidates {
		if entry_pid != Some(pid) {
			continue;
		}
		if status == Status::Running {
			return Some(slot);
		}
		fallback.get_or_insert(slot);
	}
	fallback
}

impl Manager {
	/// Validates the configuration and, when renewal is enabled, relaunches
	/// every entry of the persisted process list.
	pub async fn create(config: ManagerConfig) -> Result<Arc<Self>> {
		let config = config.normalized();
		match std::fs::metadata(&config.logs_folder) {
			Ok(meta) if meta.is_dir() => {}
			Ok(_) => {
				return Err(Error::Validation(format!(
					"logs folder {} is not a directory",
					config.logs_folder.display()
				)))
			}
			Err(e) => {
				return Err(Error::Validation(format!(
					"logs folder {}: {}",
					config.logs_folder.display(),
					e
				)))
			}
		}

		let manager = Arc::new(Self {
			config,
			registry: RwLock::new(Registry::default()),
		});

		if manager.config.renew_old_processes {
			manager.renew().await?;
		}

		Ok(manager)
	}

	pub fn config(&self) -> &ManagerConfig {
		&self.config
	}

	async fn renew(&self) -> Result<()> {
		let list = persist::read_list(&self.config.processes_list_file)?;
		tracing::info!(
			"renewing {} process(es) from {}",
			list.len(),
			self.config.processes_list_file.display()
		);

		for entry in list {
			match self.add_process(&entry.name, &entry.args).await {
				Ok(_) => {}
				Err(e) if self.config.skip_failed_renewals => {
					tracing::warn!("skipping renewal of {}: {}", entry.name, e);
				}
				Err(e) => {
					let started = std::mem::take(&mut self.registry.write().await.entries);
					for err in terminate_entries(started.into_values()).await {
						tracing::warn!("cleanup after failed renewal: {}", err);
					}
					return Err(e);
				}
			}
		}
		Ok(())
	}

	/// Opens the log file, starts the process and registers it. Nothing is
	/// registered on failure.
	pub async fn add_process(&self, name: &str, args: &[String]) -> Result<Arc<ManagerProcess>> {
		if self.registry.read().await.closed {
			return Err(Error::ManagerClosed);
		}

		let log_path = logs::log_path(&self.config.logs_folder, name);
		let log_file = OpenOptions::new()
			.read(true)
			.append(true)
			.create(true)
			.open(&log_path)
			.map_err(|source| Error::LogFile {
				path: log_path.clone(),
				source,
			})?;

		let process = Process::with_restart_delay(
			log_file.try_clone()?,
			log_file.try_clone()?,
			name,
			args.to_vec(),
			self.config.restart_delay(),
		);
		process.start().await?;

		let entry = Arc::new(ManagerProcess {
			process,
			log_path,
			log_file: Mutex::new(Some(log_file)),
		});

		let mut registry = self.registry.write().await;
		if registry.closed {
			drop(registry);
			if let Err(e) = entry.terminate().await {
				tracing::warn!("{}: {}", name, e);
			}
			return Err(Error::ManagerClosed);
		}
		let slot = registry.next_slot;
		registry.next_slot += 1;
		registry.entries.insert(slot, Arc::clone(&entry));

		let pid = entry.pid().await.unwrap_or_default();
		tracing::info!(
			pid,
			log = %entry.log_path.display(),
			"{}: registered",
			name
		);
		Ok(entry)
	}

	/// Snapshot of all entries, in no particular order.
	pub async fn processes(&self) -> Vec<Arc<ManagerProcess>> {
		self.registry.read().await.entries.values().cloned().collect()
	}

	pub async fn process(&self, pid: u32) -> Result<Arc<ManagerProcess>> {
		let registry = self.registry.read().await;
		let slot = registry.find(pid).await.ok_or(Error::NotFound(pid))?;
		registry
			.entries
			.get(&slot)
			.cloned()
			.ok_or(Error::NotFound(pid))
	}

	/// Terminates the entry whose current instance has `pid`, closes its log
	/// and removes it. The registry stays locked throughout, so the entry
	/// cannot be relaunched after it is gone from the registry.
	pub async fn terminate_process(&self, pid: u32) -> Result<()> {
		let mut registry = self.registry.write().await;
		let slot = registry.find(pid).await.ok_or(Error::NotFound(pid))?;
		let entry = registry.entries.remove(&slot).ok_or(Error::NotFound(pid))?;
		entry.terminate().await?;
		tracing::info!(pid, "{}: removed", entry.name());
		Ok(())
	}

	/// Persists the registry (when renewal is enabled), then terminates and
	/// removes every entry. Keeps going past individual failures and reports
	/// them together. Calling it again is a no-op.
	pub async fn shutdown(&self) -> Result<()> {
		let entries: Vec<Arc<ManagerProcess>> = {
			let mut registry = self.registry.write().await;
			if registry.closed {
				return Ok(());
			}
			registry.closed = true;
			std::mem::take(&mut registry.entries).into_values().collect()
		};

		let mut errors = Vec::new();

		if self.config.renew_old_processes {
			let list: Vec<ListEntry> = entries
				.iter()
				.map(|e| ListEntry {
					name: e.name().to_string(),
					args: e.args().to_vec(),
				})
				.collect();
			match persist::write_list(&self.config.processes_list_file, &list) {
				Ok(()) => tracing::info!(
					"saved {} process(es) to {}",
					list.len(),
					self.config.processes_list_file.display()
				),
				Err(e) => errors.push(Error::Io(e)),
			}
		}

		errors.extend(terminate_entries(entries).await);
		Error::aggregate(errors)
	}
}

async fn terminate_entries(entries: impl IntoIterator<Item = Arc<ManagerProcess>>) -> Vec<Error> {
	let mut errors = Vec::new();
	for entry in entries {
		if let Err(e) = entry.terminate().await {
			tracing::warn!("{}: {}", entry.name(), e);
			errors.push(e);
		}
	}
	errors
}
