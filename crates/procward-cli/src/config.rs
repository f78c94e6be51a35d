use procward::ManagerConfig;
use serde::Deserialize;
use std::path::Path;

use crate::paths;

// ── config.toml (~/.config/procward/config.toml) ────────────────────────────

#[derive(Debug, Clone, Deserialize, Default)]
pub struct GlobalConfig {
	#[serde(default)]
	pub manager: ManagerConfig,
	#[serde(default)]
	pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
	#[serde(default = "default_level")]
	pub level: String,
}

impl Default for LogConfig {
	fn default() -> Self {
		Self { level: default_level() }
	}
}

fn default_level() -> String { "info".into() }

impl LogConfig {
	pub fn max_level(&self) -> tracing::Level {
		self.level.parse().unwrap_or(tracing::Level::INFO)
	}
}

pub fn parse(content: &str) -> Result<GlobalConfig, toml::de::Error> {
	toml::from_str(content)
}

/// Reads `path`, or the default location when `None`. A missing file gives
/// the defaults; an unreadable or malformed one warns and gives the defaults.
pub fn load_global_config(path: Option<&Path>) -> GlobalConfig {
	let path = path.map(Path::to_path_buf).unwrap_or_else(paths::config_path);
	if path.exists() {
		match std::fs::read_to_string(&path) {
			Ok(content) => match parse(&content) {
				Ok(config) => return config,
				Err(e) => eprintln!("warning: failed to parse {}: {}", path.display(), e),
			},
			Err(e) => eprintln!("warning: failed to read {}: {}", path.display(), e),
		}
	}
	GlobalConfig::default()
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::path::PathBuf;

	#[test]
	fn parse_full_config() {
		let config = parse(
			r#"
			[manager]
			logs_folder = "/var/log/procward"
			renew_old_processes = true
			processes_list_file = "/var/lib/procward/list.txt"
			restart_delay_ms = 250

			[log]
			level = "debug"
			"#,
		)
		.unwrap();
		assert_eq!(config.manager.logs_folder, PathBuf::from("/var/log/procward"));
		assert!(config.manager.renew_old_processes);
		assert_eq!(config.manager.restart_delay_ms, 250);
		assert_eq!(config.log.max_level(), tracing::Level::DEBUG);
	}

	#[test]
	fn parse_empty_config_uses_defaults() {
		let config = parse("").unwrap();
		assert_eq!(config.manager.logs_folder, PathBuf::from("logs"));
		assert!(!config.manager.renew_old_processes);
		assert_eq!(config.log.max_level(), tracing::Level::INFO);
	}

	#[test]
	fn unknown_level_falls_back_to_info() {
		let log = LogConfig { level: "chatty".into() };
		assert_eq!(log.max_level(), tracing::Level::INFO);
	}

	#[test]
	fn missing_file_gives_defaults() {
		let config = load_global_config(Some(Path::new("/nonexistent/procward/config.toml")));
		assert_eq!(config.manager.logs_folder, PathBuf::from("logs"));
	}
}
