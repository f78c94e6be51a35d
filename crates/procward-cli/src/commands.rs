use std::io::Write;

use owo_colors::OwoColorize;
use procward::{logs, Manager, Status};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

pub type Input = Lines<BufReader<Stdin>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command {
	Run,
	List,
	Kill,
	PrintLog,
	Quit,
	Help,
}

impl Command {
	pub fn parse(input: &str) -> Option<Self> {
		match input.trim() {
			"r" => Some(Command::Run),
			"l" => Some(Command::List),
			"k" => Some(Command::Kill),
			"p" => Some(Command::PrintLog),
			"q" => Some(Command::Quit),
			"h" => Some(Command::Help),
			_ => None,
		}
	}
}

/// Splits `name arg1 arg2 ...` on whitespace.
pub fn parse_run_line(line: &str) -> Option<(String, Vec<String>)> {
	let mut parts = line.split_whitespace();
	let name = parts.next()?.to_string();
	Some((name, parts.map(str::to_string).collect()))
}

pub fn parse_pid(line: &str) -> Result<u32, String> {
	let trimmed = line.trim();
	if trimmed.is_empty() {
		return Err("wrong process PID".to_string());
	}
	trimmed.parse().map_err(|_| "pid must be a number".to_string())
}

/// Formats an error with its chain of sources.
pub fn report(err: &dyn std::error::Error) -> String {
	let mut msg = err.to_string();
	let mut source = err.source();
	while let Some(cause) = source {
		msg.push_str(": ");
		msg.push_str(&cause.to_string());
		source = cause.source();
	}
	msg
}

/// Reads commands until `q` or end of input.
pub async fn run_loop(manager: &Manager) {
	let mut input = BufReader::new(tokio::io::stdin()).lines();
	println!("{} type '{}' for help", "Process manager,".bold(), "h".bold());

	loop {
		prompt("Command: ");
		let line = match input.next_line().await {
			Ok(Some(line)) => line,
			Ok(None) => return,
			Err(e) => {
				tracing::error!("failed to read input: {}", e);
				return;
			}
		};

		match Command::parse(&line) {
			Some(Command::Quit) => return,
			Some(cmd) => {
				if let Err(msg) = execute(cmd, manager, &mut input).await {
					println!("{}", msg.red());
				}
			}
			None if line.trim().is_empty() => {}
			None => println!("Command not found, type 'h' for help"),
		}
	}
}

async fn execute(cmd: Command, manager: &Manager, input: &mut Input) -> Result<(), String> {
	match cmd {
		Command::Run => cmd_run(manager, input).await,
		Command::List => {
			cmd_list(manager).await;
			Ok(())
		}
		Command::Kill => cmd_kill(manager, input).await,
		Command::PrintLog => cmd_print_log(manager, input).await,
		Command::Help => {
			print_help();
			Ok(())
		}
		Command::Quit => Ok(()),
	}
}

fn prompt(text: &str) {
	print!("{}", text);
	let _ = std::io::stdout().flush();
}

async fn read_line(input: &mut Input) -> Option<String> {
	input.next_line().await.ok().flatten()
}

async fn read_pid(input: &mut Input) -> Result<u32, String> {
	prompt("Enter process PID: ");
	let line = read_line(input).await.ok_or("wrong process PID")?;
	parse_pid(&line)
}

async fn cmd_run(manager: &Manager, input: &mut Input) -> Result<(), String> {
	prompt("Enter process name and arguments: ");
	let line = read_line(input).await.ok_or("wrong process name")?;
	let (name, args) = parse_run_line(&line).ok_or("wrong process name")?;

	let entry = manager.add_process(&name, &args).await.map_err(|e| report(&e))?;
	let pid = entry.pid().await.unwrap_or_default();
	println!("{} {} (pid {})", "started".green(), name.bold(), pid);
	Ok(())
}

async fn cmd_list(manager: &Manager) {
	println!(
		"{}",
		format!(
			"{:<8} {:<16} {:<24} {:<8} {:<20} {}",
			"PID", "NAME", "ARGS", "STATUS", "STARTED", "LOG FILE"
		)
		.cyan()
		.bold()
	);

	for entry in manager.processes().await {
		let info = entry.info().await;
		let pid = info.pid.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string());
		let started = info
			.started_at
			.map(logs::format_timestamp)
			.unwrap_or_else(|| "-".to_string());
		let status = match info.status {
			Status::Running => format!("{:<8}", info.status).green().to_string(),
			Status::Exited => format!("{:<8}", info.status).red().to_string(),
			Status::Created => format!("{:<8}", info.status).dimmed().to_string(),
		};
		println!(
			"{:<8} {:<16} {:<24} {} {:<20} {}",
			pid,
			info.name,
			info.args.join(" "),
			status,
			started,
			entry.log_path().display()
		);
	}
}

async fn cmd_kill(manager: &Manager, input: &mut Input) -> Result<(), String> {
	let pid = read_pid(input).await?;
	manager.terminate_process(pid).await.map_err(|e| report(&e))?;
	println!("{} {}", "killed".yellow(), pid);
	Ok(())
}

async fn cmd_print_log(manager: &Manager, input: &mut Input) -> Result<(), String> {
	let pid = read_pid(input).await?;
	let entry = manager.process(pid).await.map_err(|e| report(&e))?;
	let out = entry.stdout().await.map_err(|e| report(&e))?;
	print!("{}", out);
	if !out.ends_with('\n') {
		println!();
	}
	Ok(())
}

fn print_help() {
	println!("  {}  run process", "r".bold());
	println!("  {}  list processes", "l".bold());
	println!("  {}  kill process", "k".bold());
	println!("  {}  print process log", "p".bold());
	println!("  {}  kill all processes and quit", "q".bold());
	println!("  {}  help", "h".bold());
}
