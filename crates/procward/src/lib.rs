//! # procward
//!
//! Local process supervisor.
//!
//! Launch child processes, append their output to per-process log files,
//! relaunch them whenever they exit on their own, and terminate them by PID.
//! Optionally, the set of supervised processes is saved on shutdown and
//! relaunched by the next manager.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use procward::{Manager, ManagerConfig};
//!
//! # #[tokio::main]
//! # async fn main() -> procward::Result<()> {
//! std::fs::create_dir_all("logs")?;
//! let manager = Manager::create(ManagerConfig::default()).await?;
//!
//! let sleeper = manager.add_process("sleep", &["30".to_string()]).await?;
//! println!("{} writes to {}", sleeper.name(), sleeper.log_path().display());
//!
//! manager.shutdown().await?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod logs;
pub mod manager;
pub mod persist;
pub mod process;
pub mod shutdown;

pub use config::ManagerConfig;
pub use error::{Error, ExitError, Result};
pub use manager::{Manager, ManagerProcess};
pub use process::{ExitOutcome, Process, ProcessInfo, Status};
pub use shutdown::ShutdownCoordinator;
