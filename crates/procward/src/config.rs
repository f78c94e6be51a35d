use serde::Deserialize;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_PROCESSES_LIST: &str = "processes.txt";

#[derive(Debug, Clone, Deserialize)]
pub struct ManagerConfig {
	#[serde(default = "default_logs_folder")]
	pub logs_folder: PathBuf,
	/// Persist the registry on shutdown and relaunch it on the next start.
	#[serde(default)]
	pub renew_old_processes: bool,
	#[serde(default)]
	pub processes_list_file: PathBuf,
	/// Pause between an instance exiting and its relaunch. Zero restarts immediately.
	#[serde(default)]
	pub restart_delay_ms: u64,
	/// Log and skip persisted entries that fail to relaunch instead of failing construction.
	#[serde(default)]
	pub skip_failed_renewals: bool,
}

impl Default for ManagerConfig {
	fn default() -> Self {
		Self {
			logs_folder: default_logs_folder(),
			renew_old_processes: false,
			processes_list_file: PathBuf::new(),
			restart_delay_ms: 0,
			skip_failed_renewals: false,
		}
	}
}

fn default_logs_folder() -> PathBuf {
	PathBuf::from("logs")
}

impl ManagerConfig {
	pub fn restart_delay(&self) -> Duration {
		Duration::from_millis(self.restart_delay_ms)
	}

	/// Cleans both paths and fills in the list file name when it is empty,
	/// `.` or the root.
	pub fn normalized(mut self) -> Self {
		self.logs_folder = clean_path(&self.logs_folder);
		let list = clean_path(&self.processes_list_file);
		self.processes_list_file = if list == Path::new(".") || list == Path::new("/") {
			PathBuf::from(DEFAULT_PROCESSES_LIST)
		} else {
			list
		};
		self
	}
}

/// Lexical cleanup: drops `.` segments, folds `..` where a parent is known,
/// and strips trailing separators. An empty path becomes `.`.
pub fn clean_path(path: &Path) -> PathBuf {
	let mut out: Vec<Component<'_>> = Vec::new();
	for component in path.components() {
		match component {
			Component::CurDir => {}
			Component::ParentDir => match out.last() {
				Some(Component::Normal(_)) => {
					out.pop();
				}
				Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
				_ => out.push(component),
			},
			other => out.push(other),
		}
	}
	if out.is_empty() {
		return PathBuf::from(".");
	}
	out.iter().collect()
}
