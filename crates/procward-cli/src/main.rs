mod commands;
mod config;
mod paths;

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use owo_colors::OwoColorize;
use procward::{Manager, ManagerConfig, ShutdownCoordinator};

#[derive(Parser, Debug)]
#[command(name = "procward", version, about = "Interactive local process supervisor")]
struct Cli {
	/// Logs folder, created if missing
	#[arg(short = 'l', long = "logs")]
	logs: Option<PathBuf>,

	/// Relaunch the processes saved by the previous session and save them again on quit
	#[arg(long)]
	renew: bool,

	/// Process list file used for renewal
	#[arg(long)]
	list: Option<PathBuf>,

	/// Config file [default: ~/.config/procward/config.toml]
	#[arg(long)]
	config: Option<PathBuf>,
}

impl Cli {
	fn apply(&self, config: &mut ManagerConfig) {
		if let Some(logs) = &self.logs {
			config.logs_folder = logs.clone();
		}
		if self.renew {
			config.renew_old_processes = true;
		}
		if let Some(list) = &self.list {
			config.processes_list_file = list.clone();
		}
	}
}

#[tokio::main]
async fn main() {
	let cli = Cli::parse();
	let global_config = config::load_global_config(cli.config.as_deref());

	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_max_level(global_config.log.max_level())
		.init();

	let mut manager_config = global_config.manager.clone();
	cli.apply(&mut manager_config);

	if let Err(e) = std::fs::create_dir_all(&manager_config.logs_folder) {
		fail(&format!(
			"cannot create logs folder {}: {}",
			manager_config.logs_folder.display(),
			e
		));
	}

	let coordinator = ShutdownCoordinator::new();
	let manager = match Manager::create(manager_config).await {
		Ok(m) => m,
		Err(e) => fail(&commands::report(&e)),
	};
	coordinator.register(Arc::clone(&manager)).await;

	tokio::select! {
		_ = commands::run_loop(&manager) => {}
		res = ShutdownCoordinator::wait_for_signal() => {
			match res {
				Ok(()) => tracing::info!("interrupted, shutting down"),
				Err(e) => tracing::error!("signal handler failed: {}", e),
			}
		}
	}

	if let Err(e) = coordinator.shutdown().await {
		fail(&commands::report(&e));
	}
	println!("exit");
	// stdin's reader thread may still be blocked on a read
	std::process::exit(0);
}

fn fail(msg: &str) -> ! {
	eprintln!("{} {}", "error:".red().bold(), msg);
	std::process::exit(1);
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn flags_override_config() {
		let cli = Cli::parse_from(["procward", "-l", "/tmp/pw-logs", "--renew", "--list", "saved.txt"]);
		let mut config = ManagerConfig::default();
		cli.apply(&mut config);
		assert_eq!(config.logs_folder, PathBuf::from("/tmp/pw-logs"));
		assert!(config.renew_old_processes);
		assert_eq!(config.processes_list_file, PathBuf::from("saved.txt"));
	}

	#[test]
	fn no_flags_keep_config() {
		let cli = Cli::parse_from(["procward"]);
		let mut config = ManagerConfig {
			logs_folder: "/srv/logs".into(),
			renew_old_processes: true,
			..Default::default()
		};
		cli.apply(&mut config);
		assert_eq!(config.logs_folder, PathBuf::from("/srv/logs"));
		assert!(config.renew_old_processes);
	}
}
